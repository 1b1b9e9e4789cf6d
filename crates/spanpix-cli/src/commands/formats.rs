//! Formats command.
//!
//! Prints the pixel format registry: storage size, alpha kind, tiers and
//! which tiers have native conversion routines.

use crate::FormatsArgs;
use anyhow::Result;
use spanpix_core::{FormatRegistry, PixelFormat};

/// Runs the formats command.
pub fn run(args: FormatsArgs, verbose: u8) -> Result<()> {
    let registry = FormatRegistry::scalar();
    let wanted = args.filter.as_deref().map(str::to_ascii_lowercase);

    println!(
        "{:<16} {:>5} {:>5} {:<14} {:<7} {}",
        "FORMAT", "BITS", "CHAN", "ALPHA", "TIER", "NATIVE"
    );
    let mut shown = 0;
    for &format in PixelFormat::ALL {
        if let Some(w) = &wanted {
            if !format.name().contains(w.as_str()) {
                continue;
            }
        }
        let native: Vec<String> = registry
            .descriptor(format)
            .direct_tiers()
            .iter()
            .map(|t| t.to_string())
            .collect();
        println!(
            "{:<16} {:>5} {:>5} {:<14} {:<7} {}",
            format.name(),
            format.bit_width().bits(),
            format.channel_bits(),
            format!("{:?}", format.alpha()),
            format.native_tier().to_string(),
            native.join(",")
        );
        if verbose > 0 {
            println!(
                "{:<16} lossless at {}, premultiplied as {}",
                "",
                format.lossless_tier(),
                format.premultiplied_counterpart().map(|f| f.name()).unwrap_or("-")
            );
        }
        shown += 1;
    }
    if verbose > 0 {
        println!("{shown} formats");
    }
    Ok(())
}
