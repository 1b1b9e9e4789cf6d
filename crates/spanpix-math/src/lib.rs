//! # spanpix-math
//!
//! Coordinate math for span compositing.
//!
//! - [`Transform`] - 3x3 paint transform with classification and inversion
//! - [`fixed`] - 16.16 fixed-point coordinate stepping
//! - [`simd`] - `wide` kernels for the hottest per-pixel loops
//!
//! # Example
//!
//! ```rust
//! use spanpix_math::{Transform, TransformClass};
//!
//! let t = Transform::rotate(std::f64::consts::FRAC_PI_4);
//! assert_eq!(t.classify(), TransformClass::Affine);
//! assert!(t.is_fast_matrix(1e4));
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod fixed;
pub mod simd;
mod transform;

pub use transform::{Transform, TransformClass};
