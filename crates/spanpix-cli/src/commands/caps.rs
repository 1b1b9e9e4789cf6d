//! Caps command.

use crate::CapsArgs;
use anyhow::Result;
use spanpix_core::RasterConfig;
use spanpix_ops::backend::{self, Backend};

/// Runs the caps command.
pub fn run(args: CapsArgs, verbose: u8) -> Result<()> {
    let scalar;
    let backend = if args.scalar {
        scalar = Backend::scalar();
        &scalar
    } else {
        backend::backend()
    };
    print!("{}", backend::describe(backend));
    if verbose > 0 {
        println!("threads: {}", rayon::current_num_threads());
        println!("{:#?}", RasterConfig::global());
    }
    Ok(())
}
