//! Channel metadata.
//!
//! Channel names resolve to display and biological metadata through a
//! [`ChannelTable`]. The built-in table covers DAPI, the Opal 480-620 dyes and
//! the autofluorescence channel; a JSON file can replace it. Names not in the
//! table get the table's default descriptor, so resolution never fails.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::MosaicError;

/// Channel names used when none are supplied.
pub const DEFAULT_CHANNEL_NAMES: [&str; 6] = [
    "DAPI",
    "Opal 480",
    "Opal 520",
    "Opal 570",
    "Opal 620",
    "Sample AF",
];

/// Key of the fallback entry in a channel table file.
const DEFAULT_KEY: &str = "default";

// =============================================================================
// ChannelColor
// =============================================================================

/// Display colour, written as `RRGGBB` hex in tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChannelColor {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl ChannelColor {
    pub const WHITE: ChannelColor = ChannelColor::rgb(0xFF, 0xFF, 0xFF);

    pub const fn rgb(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    /// Parse `RRGGBB`, with or without a leading `#`.
    pub fn from_hex(hex: &str) -> Result<Self, String> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(format!("invalid colour '{hex}', expected RRGGBB"));
        }
        let value = u32::from_str_radix(digits, 16).map_err(|e| e.to_string())?;
        Ok(Self::rgb(
            (value >> 16) as u8,
            (value >> 8) as u8,
            value as u8,
        ))
    }

    /// Upper-case `RRGGBB`.
    pub fn hex(&self) -> String {
        format!("{:02X}{:02X}{:02X}", self.red, self.green, self.blue)
    }

    /// OME colour: RGBA packed big-end first into a signed 32-bit integer,
    /// fully opaque.
    pub fn ome_rgba(&self) -> i32 {
        i32::from_be_bytes([self.red, self.green, self.blue, 0xFF])
    }
}

impl fmt::Display for ChannelColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hex())
    }
}

impl TryFrom<String> for ChannelColor {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<ChannelColor> for String {
    fn from(color: ChannelColor) -> Self {
        color.hex()
    }
}

// =============================================================================
// Channel Table
// =============================================================================

/// Metadata for one channel name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub color: ChannelColor,
    pub fluor: String,
    /// Emission wavelength in nm
    #[serde(default)]
    pub emission: Option<u32>,
    /// Excitation wavelength in nm
    #[serde(default)]
    pub excitation: Option<u32>,
}

impl ChannelInfo {
    fn new(color: ChannelColor, fluor: &str, emission: u32, excitation: u32) -> Self {
        Self {
            color,
            fluor: fluor.to_string(),
            emission: Some(emission),
            excitation: Some(excitation),
        }
    }
}

/// Name → metadata lookup with a fallback entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelTable {
    entries: BTreeMap<String, ChannelInfo>,
    default: ChannelInfo,
}

impl ChannelTable {
    /// Table for Akoya Opal panels.
    pub fn builtin() -> Self {
        let entries = [
            ("DAPI", ChannelInfo::new(ChannelColor::rgb(0x00, 0x00, 0xFF), "DAPI", 461, 358)),
            ("Opal 480", ChannelInfo::new(ChannelColor::rgb(0x00, 0xFF, 0xFF), "Opal 480", 523, 494)),
            ("Opal 520", ChannelInfo::new(ChannelColor::rgb(0x00, 0xFF, 0x00), "Opal 520", 565, 494)),
            ("Opal 570", ChannelInfo::new(ChannelColor::rgb(0xFF, 0xFF, 0x00), "Opal 570", 570, 555)),
            ("Opal 620", ChannelInfo::new(ChannelColor::rgb(0xFF, 0x00, 0x00), "Opal 620", 620, 588)),
            ("Sample AF", ChannelInfo::new(ChannelColor::WHITE, "Autofluorescence", 500, 488)),
        ]
        .into_iter()
        .map(|(name, info)| (name.to_string(), info))
        .collect();

        Self {
            entries,
            default: Self::builtin_default(),
        }
    }

    fn builtin_default() -> ChannelInfo {
        ChannelInfo::new(ChannelColor::WHITE, "Unknown", 500, 488)
    }

    /// Parse a JSON object of `name → { color, fluor, emission?, excitation? }`.
    ///
    /// A `"default"` entry replaces the fallback descriptor.
    pub fn from_json_str(json: &str) -> Result<Self, String> {
        let mut entries: BTreeMap<String, ChannelInfo> =
            serde_json::from_str(json).map_err(|e| e.to_string())?;
        let default = entries
            .remove(DEFAULT_KEY)
            .unwrap_or_else(Self::builtin_default);
        Ok(Self { entries, default })
    }

    /// Load a table from a JSON file.
    pub fn from_path(path: &Path) -> Result<Self, MosaicError> {
        let table_error = |message: String| MosaicError::ChannelTable {
            path: path.to_path_buf(),
            message,
        };
        let json = std::fs::read_to_string(path).map_err(|e| table_error(e.to_string()))?;
        Self::from_json_str(&json).map_err(table_error)
    }

    pub fn get(&self, name: &str) -> Option<&ChannelInfo> {
        self.entries.get(name)
    }

    pub fn default_info(&self) -> &ChannelInfo {
        &self.default
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ChannelTable {
    fn default() -> Self {
        Self::builtin()
    }
}

// =============================================================================
// Resolution
// =============================================================================

/// Resolved metadata for one canvas channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelDescriptor {
    pub name: String,
    pub color: ChannelColor,
    pub fluor: String,
    pub emission: Option<u32>,
    pub excitation: Option<u32>,
}

/// Look up `name` by exact match, falling back to the table default.
pub fn resolve_channel(table: &ChannelTable, name: &str) -> ChannelDescriptor {
    let info = table.get(name).unwrap_or_else(|| table.default_info());
    ChannelDescriptor {
        name: name.to_string(),
        color: info.color,
        fluor: info.fluor.clone(),
        emission: info.emission,
        excitation: info.excitation,
    }
}

/// Names for `count` channels; missing names become `Channel {n}` (1-based).
pub fn channel_names(supplied: &[String], count: usize) -> Vec<String> {
    (0..count)
        .map(|i| {
            supplied
                .get(i)
                .cloned()
                .unwrap_or_else(|| format!("Channel {}", i + 1))
        })
        .collect()
}

/// Descriptors for `count` canvas channels, in canvas order.
pub fn resolve_channels(
    table: &ChannelTable,
    supplied: &[String],
    count: usize,
) -> Vec<ChannelDescriptor> {
    channel_names(supplied, count)
        .iter()
        .map(|name| resolve_channel(table, name))
        .collect()
}

// =============================================================================
// Tests
// =============================================================================
