//! Pixel format enumeration and static metadata.
//!
//! [`PixelFormat`] is the closed set of memory layouts the compositor reads
//! and writes. The metadata here is pure data; the conversion functions live
//! in the [`registry`](crate::registry).
//!
//! # Layout conventions
//!
//! - 16- and 32-bit packed formats (`Rgb16`, `Argb32`, `Rgb30`, ...) are
//!   native-endian words, named from the most significant field down.
//! - `*8888`, `Rgb888` and `Bgr888` are byte-ordered, named in memory order.
//! - 24-bit packed formats (`Rgb666`, `Argb8565Premultiplied`, ...) are
//!   little-endian 3-byte words.
//! - 64- and 128-bit formats are four native-endian components in R, G, B, A
//!   order (`u16`, `f16` or `f32`).
//!
//! # Usage
//!
//! ```rust
//! use spanpix_core::{AlphaKind, PixelFormat, PrecisionTier};
//!
//! let fmt: PixelFormat = "argb32".parse().unwrap();
//! assert_eq!(fmt.alpha(), AlphaKind::Straight);
//! assert_eq!(fmt.bytes_per_pixel(), 4);
//! assert_eq!(PixelFormat::Rgb30.native_tier(), PrecisionTier::U16);
//! ```

use std::fmt;
use std::str::FromStr;

use crate::channel::PrecisionTier;
use crate::error::Error;

/// Storage size class of one pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BitWidth {
    /// One bit per pixel, eight pixels per byte.
    Bits1,
    /// One byte.
    Bits8,
    /// Two bytes.
    Bits16,
    /// Three bytes.
    Bits24,
    /// Four bytes.
    Bits32,
    /// Eight bytes.
    Bits64,
    /// Sixteen bytes.
    Bits128,
}

impl BitWidth {
    /// Bits per pixel.
    pub const fn bits(self) -> usize {
        match self {
            Self::Bits1 => 1,
            Self::Bits8 => 8,
            Self::Bits16 => 16,
            Self::Bits24 => 24,
            Self::Bits32 => 32,
            Self::Bits64 => 64,
            Self::Bits128 => 128,
        }
    }

    /// Bytes occupied by `width` pixels.
    #[inline]
    pub const fn row_bytes(self, width: usize) -> usize {
        (width * self.bits()).div_ceil(8)
    }
}

/// How a format stores alpha.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AlphaKind {
    /// No alpha; fetched pixels are opaque.
    None,
    /// Color channels are independent of alpha.
    Straight,
    /// Color channels are already multiplied by alpha.
    Premultiplied,
}

macro_rules! pixel_formats {
    ($($variant:ident => $name:literal,)+) => {
        /// Memory layout of a destination or texture pixel.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        #[repr(u8)]
        pub enum PixelFormat {
            $(
                #[doc = concat!("`", $name, "`")]
                $variant,
            )+
        }

        impl PixelFormat {
            /// Every format, in declaration order.
            pub const ALL: &'static [PixelFormat] = &[$(PixelFormat::$variant,)+];

            /// Number of formats.
            pub const COUNT: usize = Self::ALL.len();

            /// Lowercase identifier accepted by [`FromStr`].
            pub const fn name(self) -> &'static str {
                match self {
                    $(PixelFormat::$variant => $name,)+
                }
            }
        }
    };
}

pixel_formats! {
    Mono => "mono",
    MonoLsb => "mono-lsb",
    Alpha8 => "alpha8",
    Grayscale8 => "gray8",
    Rgb16 => "rgb16",
    Rgb555 => "rgb555",
    Rgb444 => "rgb444",
    Argb4444Premultiplied => "argb4444-pm",
    Grayscale16 => "gray16",
    Rgb888 => "rgb888",
    Bgr888 => "bgr888",
    Rgb666 => "rgb666",
    Argb8565Premultiplied => "argb8565-pm",
    Argb6666Premultiplied => "argb6666-pm",
    Rgb32 => "rgb32",
    Argb32 => "argb32",
    Argb32Premultiplied => "argb32-pm",
    Rgbx8888 => "rgbx8888",
    Rgba8888 => "rgba8888",
    Rgba8888Premultiplied => "rgba8888-pm",
    Rgb30 => "rgb30",
    A2Rgb30Premultiplied => "a2rgb30-pm",
    Bgr30 => "bgr30",
    A2Bgr30Premultiplied => "a2bgr30-pm",
    Rgbx64 => "rgbx64",
    Rgba64 => "rgba64",
    Rgba64Premultiplied => "rgba64-pm",
    Rgbx16F => "rgbx16f",
    Rgba16F => "rgba16f",
    Rgba16FPremultiplied => "rgba16f-pm",
    Rgbx32F => "rgbx32f",
    Rgba32F => "rgba32f",
    Rgba32FPremultiplied => "rgba32f-pm",
}

impl PixelFormat {
    /// Position in [`PixelFormat::ALL`].
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Storage size class.
    pub const fn bit_width(self) -> BitWidth {
        use PixelFormat::*;
        match self {
            Mono | MonoLsb => BitWidth::Bits1,
            Alpha8 | Grayscale8 => BitWidth::Bits8,
            Rgb16 | Rgb555 | Rgb444 | Argb4444Premultiplied | Grayscale16 => BitWidth::Bits16,
            Rgb888 | Bgr888 | Rgb666 | Argb8565Premultiplied | Argb6666Premultiplied => {
                BitWidth::Bits24
            }
            Rgb32 | Argb32 | Argb32Premultiplied | Rgbx8888 | Rgba8888 | Rgba8888Premultiplied
            | Rgb30 | A2Rgb30Premultiplied | Bgr30 | A2Bgr30Premultiplied => BitWidth::Bits32,
            Rgbx64 | Rgba64 | Rgba64Premultiplied | Rgbx16F | Rgba16F | Rgba16FPremultiplied => {
                BitWidth::Bits64
            }
            Rgbx32F | Rgba32F | Rgba32FPremultiplied => BitWidth::Bits128,
        }
    }

    /// Bytes per pixel, or 0 for sub-byte formats.
    #[inline]
    pub const fn bytes_per_pixel(self) -> usize {
        self.bit_width().bits() / 8
    }

    /// Alpha semantics.
    pub const fn alpha(self) -> AlphaKind {
        use PixelFormat::*;
        match self {
            Argb32 | Rgba8888 | Rgba64 | Rgba16F | Rgba32F => AlphaKind::Straight,
            Alpha8 | Argb4444Premultiplied | Argb8565Premultiplied | Argb6666Premultiplied
            | Argb32Premultiplied | Rgba8888Premultiplied | A2Rgb30Premultiplied
            | A2Bgr30Premultiplied | Rgba64Premultiplied | Rgba16FPremultiplied
            | Rgba32FPremultiplied => AlphaKind::Premultiplied,
            _ => AlphaKind::None,
        }
    }

    /// Returns `true` if the format stores an alpha channel.
    #[inline]
    pub const fn has_alpha(self) -> bool {
        !matches!(self.alpha(), AlphaKind::None)
    }

    /// Width in bits of the narrowest color channel.
    ///
    /// `Alpha8` reports its alpha channel.
    pub const fn channel_bits(self) -> u32 {
        use PixelFormat::*;
        match self {
            Mono | MonoLsb => 1,
            Rgb444 | Argb4444Premultiplied => 4,
            Rgb16 | Rgb555 | Argb8565Premultiplied => 5,
            Rgb666 | Argb6666Premultiplied => 6,
            Rgb30 | A2Rgb30Premultiplied | Bgr30 | A2Bgr30Premultiplied => 10,
            Grayscale16 | Rgbx64 | Rgba64 | Rgba64Premultiplied | Rgbx16F | Rgba16F
            | Rgba16FPremultiplied => 16,
            Rgbx32F | Rgba32F | Rgba32FPremultiplied => 32,
            _ => 8,
        }
    }

    /// Returns `true` for half and single float formats.
    #[inline]
    pub const fn is_float(self) -> bool {
        use PixelFormat::*;
        matches!(
            self,
            Rgbx16F | Rgba16F | Rgba16FPremultiplied | Rgbx32F | Rgba32F | Rgba32FPremultiplied
        )
    }

    /// Narrowest tier that represents every channel of the format.
    pub const fn native_tier(self) -> PrecisionTier {
        if self.is_float() {
            PrecisionTier::F32
        } else if self.channel_bits() > 8 {
            PrecisionTier::U16
        } else {
            PrecisionTier::U8
        }
    }

    /// Tier at which `store(fetch(bytes))` reproduces the bytes.
    ///
    /// Straight-alpha formats pass through premultiplication, which only
    /// the float tier undoes without loss.
    pub const fn lossless_tier(self) -> PrecisionTier {
        match self.alpha() {
            AlphaKind::Straight => PrecisionTier::F32,
            _ => self.native_tier(),
        }
    }

    /// Tier whose canonical `[C; 4]` pixel has exactly this layout.
    pub const fn canonical_tier(self) -> Option<PrecisionTier> {
        match self {
            PixelFormat::Rgba8888Premultiplied => Some(PrecisionTier::U8),
            PixelFormat::Rgba64Premultiplied => Some(PrecisionTier::U16),
            PixelFormat::Rgba32FPremultiplied => Some(PrecisionTier::F32),
            _ => None,
        }
    }

    /// Premultiplied format with the same channel layout as a straight one.
    pub const fn premultiplied_counterpart(self) -> Option<PixelFormat> {
        use PixelFormat::*;
        match self {
            Argb32 => Some(Argb32Premultiplied),
            Rgba8888 => Some(Rgba8888Premultiplied),
            Rgba64 => Some(Rgba64Premultiplied),
            Rgba16F => Some(Rgba16FPremultiplied),
            Rgba32F => Some(Rgba32FPremultiplied),
            _ => None,
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PixelFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        PixelFormat::ALL
            .iter()
            .copied()
            .find(|f| f.name() == wanted)
            .ok_or_else(|| Error::UnknownFormat(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_matches_position() {
        for (i, f) in PixelFormat::ALL.iter().enumerate() {
            assert_eq!(f.index(), i);
        }
        assert_eq!(PixelFormat::COUNT, 33);
    }

    #[test]
    fn test_parse_names() {
        for &f in PixelFormat::ALL {
            assert_eq!(f.name().parse::<PixelFormat>().unwrap(), f);
        }
        assert_eq!("ARGB32_PM".parse::<PixelFormat>().unwrap(), PixelFormat::Argb32Premultiplied);
        assert!("cmyk".parse::<PixelFormat>().is_err());
    }

    #[test]
    fn test_row_bytes() {
        assert_eq!(BitWidth::Bits1.row_bytes(9), 2);
        assert_eq!(BitWidth::Bits24.row_bytes(3), 9);
        assert_eq!(PixelFormat::Rgba32F.bit_width().row_bytes(2), 32);
    }

    #[test]
    fn test_tiers() {
        assert_eq!(PixelFormat::Rgb16.native_tier(), PrecisionTier::U8);
        assert_eq!(PixelFormat::A2Bgr30Premultiplied.native_tier(), PrecisionTier::U16);
        assert_eq!(PixelFormat::Rgba16F.native_tier(), PrecisionTier::F32);
        assert_eq!(PixelFormat::Argb32.lossless_tier(), PrecisionTier::F32);
        assert_eq!(PixelFormat::Argb32Premultiplied.lossless_tier(), PrecisionTier::U8);
    }

    #[test]
    fn test_counterparts_are_premultiplied() {
        for &f in PixelFormat::ALL {
            if let Some(pm) = f.premultiplied_counterpart() {
                assert_eq!(f.alpha(), AlphaKind::Straight);
                assert_eq!(pm.alpha(), AlphaKind::Premultiplied);
                assert_eq!(pm.bit_width(), f.bit_width());
            }
        }
    }
}
