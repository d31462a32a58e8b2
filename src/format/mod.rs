//! Container formats: TIFF/BigTIFF reading and pyramid writing, and the
//! OME-XML document embedded in the written pyramid.

pub mod ome;
pub mod tiff;

pub use ome::{ome_xml, OmeImage};
