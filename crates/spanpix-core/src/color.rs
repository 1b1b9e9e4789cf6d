//! Solid colors with a declared precision.
//!
//! A [`Color`] keeps the straight (unpremultiplied) channels exactly as
//! given and remembers which precision they were specified in. That
//! precision takes part in operator resolution: a color built from 16-bit
//! channels forces at least the 16-bit tier so it is never narrowed.
//!
//! ```rust
//! use spanpix_core::{Color, PrecisionTier};
//!
//! let c = Color::from_rgba8(255, 0, 0, 128);
//! assert_eq!(c.precision(), PrecisionTier::U8);
//! assert_eq!(c.premultiplied::<u8>(), [128, 0, 0, 128]);
//! ```

use crate::channel::{Channel, PrecisionTier, convert_pixel, premultiply};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Repr {
    U8([u8; 4]),
    U16([u16; 4]),
    F32([f32; 4]),
}

/// A straight-alpha RGBA color.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    repr: Repr,
}

impl Color {
    /// Fully transparent black.
    pub const TRANSPARENT: Color = Color::from_rgba8(0, 0, 0, 0);
    /// Opaque black.
    pub const BLACK: Color = Color::from_rgba8(0, 0, 0, 255);
    /// Opaque white.
    pub const WHITE: Color = Color::from_rgba8(255, 255, 255, 255);

    /// 8-bit straight color.
    pub const fn from_rgba8(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { repr: Repr::U8([r, g, b, a]) }
    }

    /// Opaque 8-bit color.
    pub const fn from_rgb8(r: u8, g: u8, b: u8) -> Self {
        Self::from_rgba8(r, g, b, 255)
    }

    /// 16-bit straight color.
    pub const fn from_rgba16(r: u16, g: u16, b: u16, a: u16) -> Self {
        Self { repr: Repr::U16([r, g, b, a]) }
    }

    /// Float straight color. Components may exceed 1.0.
    pub const fn from_rgba_f32(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { repr: Repr::F32([r, g, b, a]) }
    }

    /// 8-bit straight color from a packed `0xAARRGGBB` word; alpha is the
    /// top byte.
    pub const fn from_argb32(argb: u32) -> Self {
        Self::from_rgba8((argb >> 16) as u8, (argb >> 8) as u8, argb as u8, (argb >> 24) as u8)
    }

    /// Precision the color was specified in.
    pub fn precision(&self) -> PrecisionTier {
        match self.repr {
            Repr::U8(_) => PrecisionTier::U8,
            Repr::U16(_) => PrecisionTier::U16,
            Repr::F32(_) => PrecisionTier::F32,
        }
    }

    /// Straight channels converted to tier `C`.
    pub fn straight<C: Channel>(&self) -> [C; 4] {
        match self.repr {
            Repr::U8(p) => convert_pixel(p),
            Repr::U16(p) => convert_pixel(p),
            Repr::F32(p) => convert_pixel(p),
        }
    }

    /// Canonical premultiplied pixel at tier `C`.
    pub fn premultiplied<C: Channel>(&self) -> [C; 4] {
        premultiply(self.straight::<C>())
    }

    /// Returns `true` if alpha is at its maximum.
    pub fn is_opaque(&self) -> bool {
        match self.repr {
            Repr::U8(p) => p[3] == u8::MAX,
            Repr::U16(p) => p[3] == u16::MAX,
            Repr::F32(p) => p[3] >= 1.0,
        }
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::TRANSPARENT
    }
}
