//! # spanpix-core
//!
//! Core types for span compositing.
//!
//! This crate describes pixel memory and the values flowing through the
//! compositor; it performs no blending itself (see `spanpix-ops`).
//!
//! # Modules
//!
//! - [`channel`] - precision tiers and the [`Channel`] arithmetic trait
//! - [`format`] - the closed [`PixelFormat`] enumeration and its metadata
//! - [`registry`] - per-format fetch/store routines ([`FormatRegistry`])
//! - [`surface`] - borrowed destination and texture views
//! - [`span`] - coverage spans and coalescing
//! - [`color`] - solid colors with a declared precision
//! - [`config`] - [`RasterConfig`] thresholds and environment overrides
//!
//! # Example
//!
//! ```rust
//! use spanpix_core::{FormatRegistry, PixelFormat, Surface};
//!
//! let mut bytes = vec![0u8; 4 * 4 * 4];
//! let mut surface = Surface::new(&mut bytes, 4, 4, 16, PixelFormat::Argb32Premultiplied)?;
//!
//! let desc = FormatRegistry::scalar().descriptor(surface.format());
//! desc.store::<u8>(surface.row_mut(0), 1, &[[255, 0, 0, 255]]);
//! assert_eq!(&bytes[4..8], &0xffff_0000u32.to_ne_bytes());
//! # Ok::<(), spanpix_core::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod channel;
pub mod color;
pub mod config;
mod convert;
mod error;
pub mod format;
pub mod registry;
pub mod span;
pub mod surface;

pub use channel::{Accum, Channel, PrecisionTier};
pub use color::Color;
pub use config::{PAGE_SIZE, RasterConfig};
pub use error::{Error, Result};
pub use format::{AlphaKind, BitWidth, PixelFormat};
pub use registry::{ConvertInPlaceFn, FetchFn, FormatDescriptor, FormatRegistry, StoreFn};
pub use span::Span;
pub use surface::{Surface, TextureView};

/// Commonly used types.
pub mod prelude {
    pub use crate::channel::{Channel, PrecisionTier};
    pub use crate::color::Color;
    pub use crate::config::RasterConfig;
    pub use crate::format::PixelFormat;
    pub use crate::span::Span;
    pub use crate::surface::{Surface, TextureView};
}
