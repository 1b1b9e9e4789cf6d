//! Channel types and precision tiers.
//!
//! Every compositing operation runs at one of three internal precisions.
//! The [`Channel`] trait is implemented for the channel type of each tier:
//!
//! | tier | channel | accumulator | maximum |
//! |------|---------|-------------|---------|
//! | [`PrecisionTier::U8`] | `u8` | `u32` | 255 |
//! | [`PrecisionTier::U16`] | `u16` | `u64` | 65535 |
//! | [`PrecisionTier::F32`] | `f32` | `f32` | 1.0 |
//!
//! A canonical pixel is `[C; 4]` in R, G, B, A order with premultiplied
//! alpha. Integer tiers divide by the channel maximum with correct rounding
//! and saturate; the float tier is unclamped except where a conversion to
//! an integer representation forces it.
//!
//! # Example
//!
//! ```rust
//! use spanpix_core::Channel;
//!
//! // 50% of 50% rounds to 64 in 8 bits.
//! assert_eq!(128u8.mul(128), 64);
//! assert_eq!(<u16 as Channel>::from_u8(255), 65535);
//! ```

use std::fmt;
use std::ops::Add;

use crate::registry::{FetchFn, FormatDescriptor, StoreFn};

/// Internal working precision of an operator.
///
/// Ordered by capacity: `U8 < U16 < F32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PrecisionTier {
    /// 8 bits per channel.
    U8,
    /// 16 bits per channel.
    U16,
    /// 32-bit float per channel.
    F32,
}

impl PrecisionTier {
    /// All tiers, narrowest first.
    pub const ALL: [Self; 3] = [Self::U8, Self::U16, Self::F32];

    /// Short lowercase name.
    pub fn name(self) -> &'static str {
        match self {
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::F32 => "f32",
        }
    }
}

impl fmt::Display for PrecisionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Wide accumulator used for intermediate products.
pub trait Accum: Copy + PartialOrd + Add<Output = Self> {
    /// Subtraction that stops at zero for integer accumulators.
    fn sub_sat(self, rhs: Self) -> Self;

    /// `self + self`.
    #[inline]
    fn twice(self) -> Self {
        self + self
    }
}

impl Accum for u32 {
    #[inline]
    fn sub_sat(self, rhs: Self) -> Self {
        self.saturating_sub(rhs)
    }
}

impl Accum for u64 {
    #[inline]
    fn sub_sat(self, rhs: Self) -> Self {
        self.saturating_sub(rhs)
    }
}

impl Accum for f32 {
    #[inline]
    fn sub_sat(self, rhs: Self) -> Self {
        self - rhs
    }
}

/// A color channel of one precision tier.
pub trait Channel:
    bytemuck::Pod + Default + PartialEq + PartialOrd + fmt::Debug + Send + Sync + 'static
{
    /// Tier this channel type implements.
    const TIER: PrecisionTier;
    /// Transparent / black.
    const ZERO: Self;
    /// Full intensity.
    const MAX: Self;

    /// Accumulator for products of two channels.
    type Acc: Accum;

    /// Exact product `a * b` in accumulator space.
    fn prod(a: Self, b: Self) -> Self::Acc;

    /// Divides an accumulated product by `MAX`, rounding and saturating.
    fn norm(acc: Self::Acc) -> Self;

    /// `MAX - self`.
    fn inv(self) -> Self;

    /// Addition, saturating at `MAX` for integer tiers.
    fn add_sat(self, rhs: Self) -> Self;

    /// Subtraction, saturating at zero for integer tiers.
    fn sub_sat(self, rhs: Self) -> Self;

    /// Addition that always clamps at `MAX`.
    fn plus(self, rhs: Self) -> Self;

    /// Converts an 8-bit coverage value into this tier.
    fn from_coverage(coverage: u8) -> Self;

    /// Expands an `n`-bit unsigned normalized value with maximum `max`.
    fn from_unorm(v: u32, max: u32) -> Self;

    /// Quantizes to an unsigned normalized value with maximum `max`.
    fn to_unorm(self, max: u32) -> u32;

    /// Converts from normalized float, clamping integer tiers.
    fn from_f32(v: f32) -> Self;

    /// Converts to normalized float.
    fn to_f32(self) -> f32;

    /// Undoes premultiplication of one color channel by `alpha`.
    ///
    /// Zero alpha yields zero.
    fn unpremultiply(self, alpha: Self) -> Self;

    /// Bilinear blend of four samples with weights out of 256.
    fn bilinear(tl: Self, tr: Self, bl: Self, br: Self, wx: u32, wy: u32) -> Self;

    /// This tier's fetch slot of a descriptor.
    fn fetch_slot(desc: &FormatDescriptor) -> Option<FetchFn<Self>>;

    /// This tier's store slot of a descriptor.
    fn store_slot(desc: &FormatDescriptor) -> Option<StoreFn<Self>>;

    /// Fills this tier's slots of a descriptor.
    fn set_slots(desc: &mut FormatDescriptor, fetch: FetchFn<Self>, store: StoreFn<Self>);

    /// Rounded product `self * rhs / MAX`.
    #[inline]
    fn mul(self, rhs: Self) -> Self {
        Self::norm(Self::prod(self, rhs))
    }

    /// Interpolates `a` toward `b`: `a * c + b * (1 - c)` with `c = coverage / 255`.
    #[inline]
    fn lerp(a: Self, b: Self, coverage: u8) -> Self {
        let c = Self::from_coverage(coverage);
        Self::norm(Self::prod(a, c) + Self::prod(b, c.inv()))
    }

    /// Converts from 8 bits.
    #[inline]
    fn from_u8(v: u8) -> Self {
        Self::from_unorm(v as u32, 255)
    }

    /// Converts to 8 bits with rounding.
    #[inline]
    fn to_u8(self) -> u8 {
        self.to_unorm(255) as u8
    }

    /// Converts from 16 bits.
    #[inline]
    fn from_u16(v: u16) -> Self {
        Self::from_unorm(v as u32, 65535)
    }

    /// Converts to 16 bits with rounding.
    #[inline]
    fn to_u16(self) -> u16 {
        self.to_unorm(65535) as u16
    }
}

// ============================================================================
// u8
// ============================================================================

/// Correctly rounded `x / 255` for `x <= 255 * 255 * 3`.
#[inline]
pub fn div255(x: u32) -> u32 {
    let y = x + 128;
    (y + (y >> 8)) >> 8
}

/// Correctly rounded `x / 65535` for `x <= 65535 * 65535 * 3`.
#[inline]
pub fn div65535(x: u64) -> u64 {
    let y = x + 32768;
    (y + (y >> 16)) >> 16
}

impl Channel for u8 {
    const TIER: PrecisionTier = PrecisionTier::U8;
    const ZERO: Self = 0;
    const MAX: Self = 255;
    type Acc = u32;

    #[inline]
    fn prod(a: Self, b: Self) -> u32 {
        a as u32 * b as u32
    }

    #[inline]
    fn norm(acc: u32) -> Self {
        div255(acc).min(255) as u8
    }

    #[inline]
    fn inv(self) -> Self {
        255 - self
    }

    #[inline]
    fn add_sat(self, rhs: Self) -> Self {
        self.saturating_add(rhs)
    }

    #[inline]
    fn sub_sat(self, rhs: Self) -> Self {
        self.saturating_sub(rhs)
    }

    #[inline]
    fn plus(self, rhs: Self) -> Self {
        self.saturating_add(rhs)
    }

    #[inline]
    fn from_coverage(coverage: u8) -> Self {
        coverage
    }

    #[inline]
    fn from_unorm(v: u32, max: u32) -> Self {
        if max == 255 {
            v as u8
        } else {
            ((v * 255 + max / 2) / max) as u8
        }
    }

    #[inline]
    fn to_unorm(self, max: u32) -> u32 {
        if max == 255 {
            self as u32
        } else {
            (self as u32 * max + 127) / 255
        }
    }

    #[inline]
    fn from_f32(v: f32) -> Self {
        (v.clamp(0.0, 1.0) * 255.0 + 0.5) as u8
    }

    #[inline]
    fn to_f32(self) -> f32 {
        self as f32 / 255.0
    }

    #[inline]
    fn unpremultiply(self, alpha: Self) -> Self {
        if alpha == 0 {
            0
        } else {
            ((self as u32 * 255 + alpha as u32 / 2) / alpha as u32).min(255) as u8
        }
    }

    #[inline]
    fn bilinear(tl: Self, tr: Self, bl: Self, br: Self, wx: u32, wy: u32) -> Self {
        let (ix, iy) = (256 - wx, 256 - wy);
        let sum = tl as u32 * (ix * iy)
            + tr as u32 * (wx * iy)
            + bl as u32 * (ix * wy)
            + br as u32 * (wx * wy);
        ((sum + 32768) >> 16) as u8
    }

    #[inline]
    fn fetch_slot(desc: &FormatDescriptor) -> Option<FetchFn<Self>> {
        desc.fetch8
    }

    #[inline]
    fn store_slot(desc: &FormatDescriptor) -> Option<StoreFn<Self>> {
        desc.store8
    }

    fn set_slots(desc: &mut FormatDescriptor, fetch: FetchFn<Self>, store: StoreFn<Self>) {
        desc.fetch8 = Some(fetch);
        desc.store8 = Some(store);
    }
}

// ============================================================================
// u16
// ============================================================================

impl Channel for u16 {
    const TIER: PrecisionTier = PrecisionTier::U16;
    const ZERO: Self = 0;
    const MAX: Self = 65535;
    type Acc = u64;

    #[inline]
    fn prod(a: Self, b: Self) -> u64 {
        a as u64 * b as u64
    }

    #[inline]
    fn norm(acc: u64) -> Self {
        div65535(acc).min(65535) as u16
    }

    #[inline]
    fn inv(self) -> Self {
        65535 - self
    }

    #[inline]
    fn add_sat(self, rhs: Self) -> Self {
        self.saturating_add(rhs)
    }

    #[inline]
    fn sub_sat(self, rhs: Self) -> Self {
        self.saturating_sub(rhs)
    }

    #[inline]
    fn plus(self, rhs: Self) -> Self {
        self.saturating_add(rhs)
    }

    #[inline]
    fn from_coverage(coverage: u8) -> Self {
        coverage as u16 * 257
    }

    #[inline]
    fn from_unorm(v: u32, max: u32) -> Self {
        match max {
            65535 => v as u16,
            255 => (v * 257) as u16,
            _ => ((v as u64 * 65535 + max as u64 / 2) / max as u64) as u16,
        }
    }

    #[inline]
    fn to_unorm(self, max: u32) -> u32 {
        if max == 65535 {
            self as u32
        } else {
            ((self as u64 * max as u64 + 32767) / 65535) as u32
        }
    }

    #[inline]
    fn from_f32(v: f32) -> Self {
        (v.clamp(0.0, 1.0) * 65535.0 + 0.5) as u16
    }

    #[inline]
    fn to_f32(self) -> f32 {
        self as f32 / 65535.0
    }

    #[inline]
    fn unpremultiply(self, alpha: Self) -> Self {
        if alpha == 0 {
            0
        } else {
            ((self as u64 * 65535 + alpha as u64 / 2) / alpha as u64).min(65535) as u16
        }
    }

    #[inline]
    fn bilinear(tl: Self, tr: Self, bl: Self, br: Self, wx: u32, wy: u32) -> Self {
        let (ix, iy) = ((256 - wx) as u64, (256 - wy) as u64);
        let (wx, wy) = (wx as u64, wy as u64);
        let sum = tl as u64 * (ix * iy)
            + tr as u64 * (wx * iy)
            + bl as u64 * (ix * wy)
            + br as u64 * (wx * wy);
        ((sum + 32768) >> 16) as u16
    }

    #[inline]
    fn fetch_slot(desc: &FormatDescriptor) -> Option<FetchFn<Self>> {
        desc.fetch16
    }

    #[inline]
    fn store_slot(desc: &FormatDescriptor) -> Option<StoreFn<Self>> {
        desc.store16
    }

    fn set_slots(desc: &mut FormatDescriptor, fetch: FetchFn<Self>, store: StoreFn<Self>) {
        desc.fetch16 = Some(fetch);
        desc.store16 = Some(store);
    }
}

// ============================================================================
// f32
// ============================================================================

impl Channel for f32 {
    const TIER: PrecisionTier = PrecisionTier::F32;
    const ZERO: Self = 0.0;
    const MAX: Self = 1.0;
    type Acc = f32;

    #[inline]
    fn prod(a: Self, b: Self) -> f32 {
        a * b
    }

    #[inline]
    fn norm(acc: f32) -> Self {
        acc
    }

    #[inline]
    fn inv(self) -> Self {
        1.0 - self
    }

    #[inline]
    fn add_sat(self, rhs: Self) -> Self {
        self + rhs
    }

    #[inline]
    fn sub_sat(self, rhs: Self) -> Self {
        self - rhs
    }

    #[inline]
    fn plus(self, rhs: Self) -> Self {
        (self + rhs).min(1.0)
    }

    #[inline]
    fn from_coverage(coverage: u8) -> Self {
        coverage as f32 / 255.0
    }

    #[inline]
    fn from_unorm(v: u32, max: u32) -> Self {
        v as f32 / max as f32
    }

    #[inline]
    fn to_unorm(self, max: u32) -> u32 {
        (self.clamp(0.0, 1.0) * max as f32).round() as u32
    }

    #[inline]
    fn from_f32(v: f32) -> Self {
        v
    }

    #[inline]
    fn to_f32(self) -> f32 {
        self
    }

    #[inline]
    fn unpremultiply(self, alpha: Self) -> Self {
        if alpha == 0.0 { 0.0 } else { self / alpha }
    }

    #[inline]
    fn bilinear(tl: Self, tr: Self, bl: Self, br: Self, wx: u32, wy: u32) -> Self {
        let fx = wx as f32 / 256.0;
        let fy = wy as f32 / 256.0;
        let top = tl * (1.0 - fx) + tr * fx;
        let bottom = bl * (1.0 - fx) + br * fx;
        top * (1.0 - fy) + bottom * fy
    }

    #[inline]
    fn fetch_slot(desc: &FormatDescriptor) -> Option<FetchFn<Self>> {
        desc.fetch_f32
    }

    #[inline]
    fn store_slot(desc: &FormatDescriptor) -> Option<StoreFn<Self>> {
        desc.store_f32
    }

    fn set_slots(desc: &mut FormatDescriptor, fetch: FetchFn<Self>, store: StoreFn<Self>) {
        desc.fetch_f32 = Some(fetch);
        desc.store_f32 = Some(store);
    }
}

// ============================================================================
// Pixel helpers
// ============================================================================

/// Premultiplies the color channels of a straight-alpha pixel.
#[inline]
pub fn premultiply<C: Channel>(px: [C; 4]) -> [C; 4] {
    let a = px[3];
    [px[0].mul(a), px[1].mul(a), px[2].mul(a), a]
}

/// Converts a premultiplied pixel back to straight alpha.
#[inline]
pub fn unpremultiply<C: Channel>(px: [C; 4]) -> [C; 4] {
    let a = px[3];
    [
        px[0].unpremultiply(a),
        px[1].unpremultiply(a),
        px[2].unpremultiply(a),
        a,
    ]
}

/// Converts a canonical pixel between tiers.
#[inline]
pub fn convert_pixel<S: Channel, D: Channel>(px: [S; 4]) -> [D; 4] {
    match (S::TIER, D::TIER) {
        (PrecisionTier::U8, _) => px.map(|c| D::from_u8(c.to_u8())),
        (PrecisionTier::U16, _) => px.map(|c| D::from_u16(c.to_u16())),
        (PrecisionTier::F32, _) => px.map(|c| D::from_f32(c.to_f32())),
    }
}
