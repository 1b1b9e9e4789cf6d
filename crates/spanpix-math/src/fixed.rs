//! 16.16 fixed-point coordinate stepping.
//!
//! Affine sampling walks source coordinates with a constant per-pixel
//! increment. When the whole walk fits in `i32` 16.16 fixed point the
//! sampler steps with integer adds; [`fits_fixed`] decides that once per
//! batch. Otherwise it falls back to computing each coordinate in `f64`.

/// 1.0 in 16.16.
pub const FIXED_ONE: i32 = 1 << 16;

/// 0.5 in 16.16.
pub const FIXED_HALF: i32 = 1 << 15;

/// Largest coordinate magnitude that still leaves room for a neighbor
/// sample (`+1`) without overflowing.
const FIXED_LIMIT: f64 = (i32::MAX >> 16) as f64 - 2.0;

/// Float coordinates are clamped to this magnitude before integer conversion.
const COORD_CLAMP: f64 = (1u64 << 40) as f64;

/// Converts to 16.16, rounding to the nearest step.
#[inline]
pub fn to_fixed(v: f64) -> i32 {
    (v * FIXED_ONE as f64).round() as i32
}

/// Integer part (floor) of a 16.16 value.
#[inline]
pub fn fixed_floor(v: i32) -> i32 {
    v >> 16
}

/// Fractional part of a 16.16 value in `0..65536`.
#[inline]
pub fn fixed_fract(v: i32) -> u32 {
    (v & 0xffff) as u32
}

/// Returns `true` if a walk of `len` steps of `delta` from `start` stays
/// representable in 16.16, for both its endpoints.
#[inline]
pub fn fits_fixed(start: f64, delta: f64, len: usize) -> bool {
    let end = start + delta * len as f64;
    start.is_finite()
        && end.is_finite()
        && start.abs() < FIXED_LIMIT
        && end.abs() < FIXED_LIMIT
        && (delta * FIXED_ONE as f64).abs() < i32::MAX as f64
}

/// Splits an `f64` coordinate into its floor and an 8-bit or 4-bit weight
/// scaled to `0..256`.
///
/// `weight_bits` is 8 or 4. Non-finite input maps to `(0, 0)`.
#[inline]
pub fn split_weight(v: f64, weight_bits: u32) -> (i64, u32) {
    if !v.is_finite() {
        return (0, 0);
    }
    let v = v.clamp(-COORD_CLAMP, COORD_CLAMP);
    let floor = v.floor();
    let frac = ((v - floor) * FIXED_ONE as f64) as u32;
    (floor as i64, quantize_weight(frac.min(0xffff), weight_bits))
}

/// Reduces a 16-bit fraction to `weight_bits` and rescales it to `0..256`.
#[inline]
pub fn quantize_weight(frac16: u32, weight_bits: u32) -> u32 {
    (frac16 >> (16 - weight_bits)) << (8 - weight_bits)
}
