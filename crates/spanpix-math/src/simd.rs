//! SIMD kernels for the compositing hot paths.
//!
//! This module provides vectorized versions of the most frequently executed
//! per-pixel routines using the `wide` crate for portable SIMD on stable
//! Rust. Every kernel is bit-identical to the scalar routine it replaces,
//! so a backend may swap them in freely.
//!
//! # Kernels
//!
//! - [`source_over_rgba8`], [`source_over_solid_rgba8`] - 8-bit source-over, two pixels per `u16x8`
//! - [`source_over_rgbaf32`], [`source_over_solid_rgbaf32`] - float source-over,
//!   one pixel per `f32x4`
//! - [`fetch_argb32`], [`store_argb32`], [`fetch_rgb32`], [`store_rgb32`] - red/blue
//!   swizzle, eight pixels per `u32x8`
//! - [`interpolate_4_rgba8`] - bilinear blend of four 8-bit pixels in `u32x4`
//!
//! # Example
//!
//! ```rust
//! use spanpix_math::simd::source_over_rgba8;
//!
//! let mut dst = [[0u8, 0, 255, 255]; 3];
//! source_over_rgba8(&mut dst, &[[255, 0, 0, 255]; 3], 128);
//! assert_eq!(dst[2], [128, 0, 127, 255]);
//! ```

use wide::{f32x4, u16x8, u32x4, u32x8};

// ============================================================================
// 8-bit source-over
// ============================================================================

/// Rounded `v / 255` per lane for `v <= 65025`.
#[inline]
fn div255_x8(v: u16x8) -> u16x8 {
    let y = v + u16x8::splat(128);
    (y + (y >> 8u32)) >> 8u32
}

#[inline]
fn widen_pair(a: [u8; 4], b: [u8; 4]) -> u16x8 {
    u16x8::new([
        a[0] as u16, a[1] as u16, a[2] as u16, a[3] as u16,
        b[0] as u16, b[1] as u16, b[2] as u16, b[3] as u16,
    ])
}

#[inline]
fn narrow_pair(v: u16x8) -> [[u8; 4]; 2] {
    let a = v.to_array();
    [
        [a[0] as u8, a[1] as u8, a[2] as u8, a[3] as u8],
        [a[4] as u8, a[5] as u8, a[6] as u8, a[7] as u8],
    ]
}

/// `s + d * (255 - alpha(s)) / 255` for a pair of already scaled pixels.
#[inline]
fn over_pair(s: u16x8, d: u16x8) -> u16x8 {
    let sa = s.to_array();
    let (ia, ib) = (255 - sa[3], 255 - sa[7]);
    let inv = u16x8::new([ia, ia, ia, ia, ib, ib, ib, ib]);
    (s + div255_x8(d * inv)).min(u16x8::splat(255))
}

#[inline]
fn scale_pair(s: u16x8, coverage: u8) -> u16x8 {
    if coverage == 255 {
        s
    } else {
        div255_x8(s * u16x8::splat(coverage as u16))
    }
}

/// 8-bit premultiplied source-over with the source scaled by coverage.
pub fn source_over_rgba8(dst: &mut [[u8; 4]], src: &[[u8; 4]], coverage: u8) {
    if coverage == 0 {
        return;
    }
    let n = dst.len().min(src.len());
    let (dst, src) = (&mut dst[..n], &src[..n]);
    let mut d_pairs = dst.chunks_exact_mut(2);
    let s_pairs = src.chunks_exact(2);
    let s_tail = s_pairs.remainder();
    for (d, s) in (&mut d_pairs).zip(s_pairs) {
        let out = over_pair(scale_pair(widen_pair(s[0], s[1]), coverage), widen_pair(d[0], d[1]));
        d.copy_from_slice(&narrow_pair(out));
    }
    if let (Some(d), Some(s)) = (d_pairs.into_remainder().first_mut(), s_tail.first()) {
        let out = over_pair(scale_pair(widen_pair(*s, [0; 4]), coverage), widen_pair(*d, [0; 4]));
        *d = narrow_pair(out)[0];
    }
}

/// 8-bit premultiplied source-over of one color across a run.
pub fn source_over_solid_rgba8(dst: &mut [[u8; 4]], color: [u8; 4], coverage: u8) {
    if coverage == 0 {
        return;
    }
    let s = scale_pair(widen_pair(color, color), coverage);
    let mut pairs = dst.chunks_exact_mut(2);
    for d in &mut pairs {
        d.copy_from_slice(&narrow_pair(over_pair(s, widen_pair(d[0], d[1]))));
    }
    if let Some(d) = pairs.into_remainder().first_mut() {
        *d = narrow_pair(over_pair(s, widen_pair(*d, [0; 4])))[0];
    }
}

// ============================================================================
// Float source-over
// ============================================================================

#[inline]
fn over_f32(s: f32x4, d: f32x4) -> f32x4 {
    let a = s.to_array()[3];
    s + d * f32x4::splat(1.0 - a)
}

/// Float premultiplied source-over with the source scaled by coverage.
pub fn source_over_rgbaf32(dst: &mut [[f32; 4]], src: &[[f32; 4]], coverage: u8) {
    if coverage == 0 {
        return;
    }
    let c = f32x4::splat(coverage as f32 / 255.0);
    for (d, s) in dst.iter_mut().zip(src) {
        let s = f32x4::new(*s) * c;
        *d = over_f32(s, f32x4::new(*d)).to_array();
    }
}

/// Float premultiplied source-over of one color across a run.
pub fn source_over_solid_rgbaf32(dst: &mut [[f32; 4]], color: [f32; 4], coverage: u8) {
    if coverage == 0 {
        return;
    }
    let s = f32x4::new(color) * f32x4::splat(coverage as f32 / 255.0);
    for d in dst.iter_mut() {
        *d = over_f32(s, f32x4::new(*d)).to_array();
    }
}

// ============================================================================
// Red/blue swizzle
// ============================================================================

/// Exchanges bytes 0 and 2 of every lane.
#[inline]
fn swap_rb(w: u32x8) -> u32x8 {
    (w & u32x8::splat(0xff00_ff00))
        | ((w >> 16u32) & u32x8::splat(0xff))
        | ((w & u32x8::splat(0xff)) << 16u32)
}

#[inline]
fn swap_rb_scalar(w: u32) -> u32 {
    (w & 0xff00_ff00) | ((w >> 16) & 0xff) | ((w & 0xff) << 16)
}

#[inline]
fn fetch_words(row: &[u8], x: usize, out: &mut [[u8; 4]], force: u32) {
    let bytes = &row[x * 4..(x + out.len()) * 4];
    let mut blocks = out.chunks_exact_mut(8);
    let mut src = bytes.chunks_exact(32);
    for (o, b) in (&mut blocks).zip(&mut src) {
        let mut words = [0u32; 8];
        for (w, c) in words.iter_mut().zip(b.chunks_exact(4)) {
            *w = u32::from_ne_bytes([c[0], c[1], c[2], c[3]]) | force;
        }
        for (px, w) in o.iter_mut().zip(swap_rb(u32x8::new(words)).to_array()) {
            *px = w.to_le_bytes();
        }
    }
    for (px, c) in blocks.into_remainder().iter_mut().zip(src.remainder().chunks_exact(4)) {
        *px = swap_rb_scalar(u32::from_ne_bytes([c[0], c[1], c[2], c[3]]) | force).to_le_bytes();
    }
}

#[inline]
fn store_words(row: &mut [u8], x: usize, src: &[[u8; 4]], force: u32) {
    let bytes = &mut row[x * 4..(x + src.len()) * 4];
    let mut dst = bytes.chunks_exact_mut(32);
    let mut blocks = src.chunks_exact(8);
    for (d, s) in (&mut dst).zip(&mut blocks) {
        let mut words = [0u32; 8];
        for (w, px) in words.iter_mut().zip(s) {
            *w = u32::from_le_bytes(*px);
        }
        let swapped = swap_rb(u32x8::new(words)).to_array();
        for (c, w) in d.chunks_exact_mut(4).zip(swapped) {
            c.copy_from_slice(&(w | force).to_ne_bytes());
        }
    }
    for (c, px) in dst.into_remainder().chunks_exact_mut(4).zip(blocks.remainder()) {
        c.copy_from_slice(&(swap_rb_scalar(u32::from_le_bytes(*px)) | force).to_ne_bytes());
    }
}

/// Native `0xAARRGGBB` words to canonical `[r, g, b, a]`.
pub fn fetch_argb32(row: &[u8], x: usize, out: &mut [[u8; 4]]) {
    fetch_words(row, x, out, 0);
}

/// Canonical `[r, g, b, a]` to native `0xAARRGGBB` words.
pub fn store_argb32(row: &mut [u8], x: usize, src: &[[u8; 4]]) {
    store_words(row, x, src, 0);
}

/// Native `0xffRRGGBB` words to canonical opaque pixels.
pub fn fetch_rgb32(row: &[u8], x: usize, out: &mut [[u8; 4]]) {
    fetch_words(row, x, out, 0xff00_0000);
}

/// Canonical pixels to native `0xffRRGGBB` words.
pub fn store_rgb32(row: &mut [u8], x: usize, src: &[[u8; 4]]) {
    store_words(row, x, src, 0xff00_0000);
}

// ============================================================================
// Bilinear
// ============================================================================

#[inline]
fn widen_u32(p: [u8; 4]) -> u32x4 {
    u32x4::new([p[0] as u32, p[1] as u32, p[2] as u32, p[3] as u32])
}

/// Blends four 8-bit pixels with weights `wx`, `wy` out of 256.
#[inline]
pub fn interpolate_4_rgba8(
    tl: [u8; 4],
    tr: [u8; 4],
    bl: [u8; 4],
    br: [u8; 4],
    wx: u32,
    wy: u32,
) -> [u8; 4] {
    let (ix, iy) = (256 - wx, 256 - wy);
    let sum = widen_u32(tl) * u32x4::splat(ix * iy)
        + widen_u32(tr) * u32x4::splat(wx * iy)
        + widen_u32(bl) * u32x4::splat(ix * wy)
        + widen_u32(br) * u32x4::splat(wx * wy);
    let r = ((sum + u32x4::splat(32768)) >> 16u32).to_array();
    [r[0] as u8, r[1] as u8, r[2] as u8, r[3] as u8]
}
