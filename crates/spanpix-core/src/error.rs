//! Error types for spanpix-core.
//!
//! Errors only arise when constructing views over caller memory or when
//! parsing format names. Once a [`Surface`](crate::Surface) or
//! [`TextureView`](crate::TextureView) exists, every access through it is
//! in bounds and infallible.
//!
//! # Usage
//!
//! ```rust
//! use spanpix_core::{Error, PixelFormat, Surface};
//!
//! let mut bytes = vec![0u8; 16];
//! let err = Surface::new(&mut bytes, 4, 4, 16, PixelFormat::Argb32).unwrap_err();
//! assert!(err.is_buffer_too_small());
//! ```

use thiserror::Error;

/// Result type alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while describing pixel memory.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Width or height is zero where a non-empty buffer is required.
    #[error("invalid dimensions: {width}x{height}")]
    InvalidDimensions {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },

    /// Row stride is shorter than one row of pixels.
    #[error("stride {stride} is shorter than a {width}-pixel {format} row ({row_bytes} bytes)")]
    InvalidStride {
        /// Declared stride in bytes.
        stride: usize,
        /// Row width in pixels.
        width: u32,
        /// Bytes needed by one row.
        row_bytes: usize,
        /// Format name.
        format: &'static str,
    },

    /// Backing slice cannot hold the declared geometry.
    #[error("buffer too small: need {needed} bytes, got {actual}")]
    BufferTooSmall {
        /// Bytes required by width, height and stride.
        needed: usize,
        /// Bytes actually supplied.
        actual: usize,
    },

    /// Format name did not match any known format.
    #[error("unknown pixel format: {0}")]
    UnknownFormat(String),
}

impl Error {
    /// Creates an [`Error::InvalidDimensions`].
    #[inline]
    pub fn invalid_dimensions(width: u32, height: u32) -> Self {
        Self::InvalidDimensions { width, height }
    }

    /// Creates an [`Error::BufferTooSmall`].
    #[inline]
    pub fn buffer_too_small(needed: usize, actual: usize) -> Self {
        Self::BufferTooSmall { needed, actual }
    }

    /// Returns `true` for [`Error::BufferTooSmall`].
    pub fn is_buffer_too_small(&self) -> bool {
        matches!(self, Self::BufferTooSmall { .. })
    }

    /// Returns `true` for [`Error::InvalidDimensions`].
    pub fn is_invalid_dimensions(&self) -> bool {
        matches!(self, Self::InvalidDimensions { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = Error::buffer_too_small(64, 16);
        assert_eq!(err.to_string(), "buffer too small: need 64 bytes, got 16");
        assert!(err.is_buffer_too_small());
        assert!(!err.is_invalid_dimensions());
    }

    #[test]
    fn test_stride_message_names_format() {
        let err = Error::InvalidStride {
            stride: 8,
            width: 4,
            row_bytes: 16,
            format: "Argb32",
        };
        assert!(err.to_string().contains("Argb32"));
    }
}
