//! Error types for operator resolution.

use thiserror::Error;

/// Why a draw call could not be turned into an operator.
///
/// None of these reach the caller of [`crate::fill`]; a draw that fails to
/// resolve is skipped and logged.
#[derive(Error, Debug)]
pub enum OpsError {
    /// Texture paint with zero width or height.
    #[error("texture has no pixels ({width}x{height})")]
    EmptyTexture {
        /// Texture width.
        width: u32,
        /// Texture height.
        height: u32,
    },

    /// Paint transform cannot be inverted.
    #[error("paint transform is singular or not finite")]
    SingularTransform,

    /// Gradient paint without any color stop.
    #[error("gradient has no color stops")]
    NoGradientStops,

    /// Composition mode name not recognized.
    #[error("unknown composition mode: {0}")]
    UnknownMode(String),

    /// Invalid geometry passed through from the core types.
    #[error(transparent)]
    Core(#[from] spanpix_core::Error),
}

impl OpsError {
    /// Returns `true` if the draw has nothing to paint, as opposed to
    /// carrying an invalid parameter.
    pub fn is_degenerate(&self) -> bool {
        matches!(
            self,
            Self::EmptyTexture { .. } | Self::SingularTransform | Self::NoGradientStops
        )
    }
}

/// Result type for operator resolution.
pub type OpsResult<T> = Result<T, OpsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let e = OpsError::EmptyTexture { width: 0, height: 4 };
        assert_eq!(e.to_string(), "texture has no pixels (0x4)");
        assert!(e.is_degenerate());
    }

    #[test]
    fn test_core_conversion() {
        let e: OpsError = spanpix_core::Error::buffer_too_small(16, 8).into();
        assert!(!e.is_degenerate());
        assert!(matches!(e, OpsError::Core(ref c) if c.is_buffer_too_small()));
    }
}
