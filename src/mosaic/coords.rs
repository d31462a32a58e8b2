//! Tile placement from file names.
//!
//! Tiles carry their canvas origin in the name as a bracketed pair, e.g.
//! `slide_[1024,2048]_component_data.tif` is placed at x = 1024, y = 2048.

use std::sync::OnceLock;

use regex::Regex;

fn coordinate_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\[(\d+),(\d+)\]").expect("Failed to compile coordinate regex")
    })
}

/// Extract the first `[x,y]` pair from a tile name.
///
/// Returns `None` when the name carries no pair, or when a number does not
/// fit in `u32`.
pub fn parse_coordinates(name: &str) -> Option<(u32, u32)> {
    let captures = coordinate_pattern().captures(name)?;
    let x = captures.get(1)?.as_str().parse().ok()?;
    let y = captures.get(2)?.as_str().parse().ok()?;
    Some((x, y))
}
