//! CLI command implementations

pub mod caps;
pub mod fill;
pub mod formats;

use anyhow::{bail, Context, Result};

/// Parses `WIDTHxHEIGHT`.
pub fn parse_size(s: &str) -> Result<(u32, u32)> {
    let Some((w, h)) = s.split_once(['x', 'X']) else {
        bail!("Invalid size '{s}', expected WIDTHxHEIGHT");
    };
    let w: u32 = w.trim().parse().with_context(|| format!("Invalid width in '{s}'"))?;
    let h: u32 = h.trim().parse().with_context(|| format!("Invalid height in '{s}'"))?;
    Ok((w, h))
}

/// Parses an `AARRGGBB` hex color, with or without `#` or `0x`.
pub fn parse_argb(s: &str) -> Result<u32> {
    let hex = s.trim().trim_start_matches('#').trim_start_matches("0x");
    let value = u32::from_str_radix(hex, 16).with_context(|| format!("Invalid color '{s}'"))?;
    Ok(if hex.len() <= 6 { 0xff00_0000 | value } else { value })
}

/// 64-bit FNV-1a hash.
pub fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0xcbf2_9ce4_8422_2325, |h, &b| {
        (h ^ b as u64).wrapping_mul(0x0000_0100_0000_01b3)
    })
}
