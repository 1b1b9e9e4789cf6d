//! # spanpix-ops
//!
//! Span compositing: paints sampled and blended onto destination rows.
//!
//! A fill takes a [`Paint`], the transform from paint space to device
//! space, a list of coverage [`Span`](spanpix_core::Span)s and a
//! [`CompositionMode`]. It is resolved once into an operator at a single
//! precision tier and then run over the spans, in order or partitioned
//! across a worker pool.
//!
//! # Modules
//!
//! - [`composite`] - the 24 composition modes and their tier tables
//! - [`dest`] - destination row access
//! - [`texture`] - texture sampling state machine
//! - [`gradient`] - linear, radial and conical gradients
//! - [`source`] - paints and resolved source samplers
//! - [`operator`] - operator resolution and per-run pipeline
//! - [`dispatch`] - span clipping, partitioning and worker pools
//! - [`backend`] - CPU capability detection and kernel substitution
//!
//! # Example
//!
//! ```rust
//! use spanpix_core::{Color, PixelFormat, Span, Surface};
//! use spanpix_math::Transform;
//! use spanpix_ops::{Compositor, CompositionMode, Gradient, Paint};
//!
//! let mut pixels = vec![0u8; 8 * 2 * 4];
//! let mut surface = Surface::new(&mut pixels, 8, 2, 32, PixelFormat::Rgba8888Premultiplied)?;
//! let ramp = Gradient::linear((0.0, 0.0), (8.0, 0.0))
//!     .with_stop(0.0, Color::BLACK)
//!     .with_stop(1.0, Color::WHITE);
//! let spans = [Span::full(0, 0, 8), Span::new(0, 1, 8, 128)];
//! Compositor::new().try_fill(
//!     &mut surface,
//!     &spans,
//!     &Paint::Gradient(ramp),
//!     &Transform::IDENTITY,
//!     CompositionMode::Source,
//! )?;
//! assert!(pixels[0] < pixels[28]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod compositor;
mod error;
pub mod backend;
pub mod composite;
pub mod dest;
pub mod dispatch;
pub mod gradient;
pub mod operator;
pub mod source;
pub mod texture;

pub use backend::{backend, init_backend, Backend, CpuCaps};
pub use composite::CompositionMode;
pub use compositor::{fill, Compositor};
pub use error::{OpsError, OpsResult};
pub use gradient::{Gradient, GradientStop, Spread};
pub use source::{Paint, Texture};
pub use texture::WrapMode;
