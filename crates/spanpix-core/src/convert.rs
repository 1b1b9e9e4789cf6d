//! Scalar fetch and store routines for every pixel format.
//!
//! Each routine converts a run of pixels starting at pixel `x` of one row
//! between the format's memory layout and canonical premultiplied
//! `[C; 4]` pixels. Routines are generic over the channel type and are
//! instantiated per tier by the [`registry`](crate::registry).
//!
//! Layouts are described by zero-sized marker types implementing
//! [`Packed`] (bit fields inside a 2, 3 or 4 byte word) or [`Quad`] (four
//! equal components), so every instantiation is a plain function pointer.

use half::f16;

use crate::channel::{Channel, premultiply, unpremultiply};
use crate::format::AlphaKind;

// ============================================================================
// Packed words
// ============================================================================

/// A bit field inside a packed pixel word.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Field {
    shift: u32,
    bits: u32,
}

impl Field {
    const fn new(shift: u32, bits: u32) -> Self {
        Self { shift, bits }
    }

    const NONE: Field = Field::new(0, 0);

    #[inline]
    const fn max(self) -> u32 {
        (1 << self.bits) - 1
    }

    #[inline]
    fn get(self, word: u32) -> u32 {
        (word >> self.shift) & self.max()
    }

    #[inline]
    fn put(self, value: u32) -> u32 {
        (value & self.max()) << self.shift
    }
}

/// Bit-field layout of a packed pixel format.
pub(crate) trait Packed {
    /// Bytes per pixel (2, 3 or 4).
    const BYTES: usize;
    /// Word is assembled in little-endian byte order instead of native.
    const LITTLE: bool;
    const R: Field;
    const G: Field;
    const B: Field;
    /// `Field::NONE` for opaque formats.
    const A: Field;
    /// Bits forced to one on store (padding in opaque formats).
    const FILL: u32;
    const ALPHA: AlphaKind;
}

#[inline]
fn read_word<L: Packed>(row: &[u8], i: usize) -> u32 {
    let o = i * L::BYTES;
    match L::BYTES {
        2 => {
            let b = [row[o], row[o + 1]];
            (if L::LITTLE { u16::from_le_bytes(b) } else { u16::from_ne_bytes(b) }) as u32
        }
        3 => row[o] as u32 | (row[o + 1] as u32) << 8 | (row[o + 2] as u32) << 16,
        _ => {
            let b = [row[o], row[o + 1], row[o + 2], row[o + 3]];
            if L::LITTLE { u32::from_le_bytes(b) } else { u32::from_ne_bytes(b) }
        }
    }
}

#[inline]
fn write_word<L: Packed>(row: &mut [u8], i: usize, word: u32) {
    let o = i * L::BYTES;
    match L::BYTES {
        2 => {
            let w = word as u16;
            let b = if L::LITTLE { w.to_le_bytes() } else { w.to_ne_bytes() };
            row[o..o + 2].copy_from_slice(&b);
        }
        3 => {
            row[o] = word as u8;
            row[o + 1] = (word >> 8) as u8;
            row[o + 2] = (word >> 16) as u8;
        }
        _ => {
            let b = if L::LITTLE { word.to_le_bytes() } else { word.to_ne_bytes() };
            row[o..o + 4].copy_from_slice(&b);
        }
    }
}

/// Fetches packed pixels into canonical premultiplied form.
pub(crate) fn fetch_packed<L: Packed, C: Channel>(row: &[u8], x: usize, out: &mut [[C; 4]]) {
    for (i, px) in out.iter_mut().enumerate() {
        let w = read_word::<L>(row, x + i);
        let a = if L::A.bits == 0 {
            C::MAX
        } else {
            C::from_unorm(L::A.get(w), L::A.max())
        };
        let p = [
            C::from_unorm(L::R.get(w), L::R.max()),
            C::from_unorm(L::G.get(w), L::G.max()),
            C::from_unorm(L::B.get(w), L::B.max()),
            a,
        ];
        *px = match L::ALPHA {
            AlphaKind::Straight => premultiply(p),
            _ => p,
        };
    }
}

/// Stores canonical pixels into a packed layout.
pub(crate) fn store_packed<L: Packed, C: Channel>(row: &mut [u8], x: usize, src: &[[C; 4]]) {
    for (i, px) in src.iter().enumerate() {
        let p = match L::ALPHA {
            AlphaKind::Straight => unpremultiply(*px),
            _ => *px,
        };
        let mut w = L::FILL
            | L::R.put(p[0].to_unorm(L::R.max()))
            | L::G.put(p[1].to_unorm(L::G.max()))
            | L::B.put(p[2].to_unorm(L::B.max()));
        if L::A.bits != 0 {
            w |= L::A.put(p[3].to_unorm(L::A.max()));
        }
        write_word::<L>(row, x + i, w);
    }
}

macro_rules! packed_layout {
    (
        $name:ident, bytes: $bytes:expr, little: $little:expr,
        r: ($rs:expr, $rb:expr), g: ($gs:expr, $gb:expr), b: ($bs:expr, $bb:expr),
        a: $a:expr, fill: $fill:expr, alpha: $alpha:ident
    ) => {
        pub(crate) struct $name;

        impl Packed for $name {
            const BYTES: usize = $bytes;
            const LITTLE: bool = $little;
            const R: Field = Field::new($rs, $rb);
            const G: Field = Field::new($gs, $gb);
            const B: Field = Field::new($bs, $bb);
            const A: Field = $a;
            const FILL: u32 = $fill;
            const ALPHA: AlphaKind = AlphaKind::$alpha;
        }
    };
}

packed_layout!(Rgb565, bytes: 2, little: false,
    r: (11, 5), g: (5, 6), b: (0, 5), a: Field::NONE, fill: 0, alpha: None);
packed_layout!(Rgb555, bytes: 2, little: false,
    r: (10, 5), g: (5, 5), b: (0, 5), a: Field::NONE, fill: 0, alpha: None);
packed_layout!(Rgb444, bytes: 2, little: false,
    r: (8, 4), g: (4, 4), b: (0, 4), a: Field::NONE, fill: 0, alpha: None);
packed_layout!(Argb4444Pm, bytes: 2, little: false,
    r: (8, 4), g: (4, 4), b: (0, 4), a: Field::new(12, 4), fill: 0, alpha: Premultiplied);
packed_layout!(Rgb888, bytes: 3, little: true,
    r: (0, 8), g: (8, 8), b: (16, 8), a: Field::NONE, fill: 0, alpha: None);
packed_layout!(Bgr888, bytes: 3, little: true,
    r: (16, 8), g: (8, 8), b: (0, 8), a: Field::NONE, fill: 0, alpha: None);
packed_layout!(Rgb666, bytes: 3, little: true,
    r: (12, 6), g: (6, 6), b: (0, 6), a: Field::NONE, fill: 0, alpha: None);
packed_layout!(Argb8565Pm, bytes: 3, little: true,
    r: (19, 5), g: (13, 6), b: (8, 5), a: Field::new(0, 8), fill: 0, alpha: Premultiplied);
packed_layout!(Argb6666Pm, bytes: 3, little: true,
    r: (12, 6), g: (6, 6), b: (0, 6), a: Field::new(18, 6), fill: 0, alpha: Premultiplied);
packed_layout!(Rgb32, bytes: 4, little: false,
    r: (16, 8), g: (8, 8), b: (0, 8), a: Field::NONE, fill: 0xff00_0000, alpha: None);
packed_layout!(Argb32, bytes: 4, little: false,
    r: (16, 8), g: (8, 8), b: (0, 8), a: Field::new(24, 8), fill: 0, alpha: Straight);
packed_layout!(Argb32Pm, bytes: 4, little: false,
    r: (16, 8), g: (8, 8), b: (0, 8), a: Field::new(24, 8), fill: 0, alpha: Premultiplied);
packed_layout!(Rgbx8888, bytes: 4, little: true,
    r: (0, 8), g: (8, 8), b: (16, 8), a: Field::NONE, fill: 0xff00_0000, alpha: None);
packed_layout!(Rgba8888, bytes: 4, little: true,
    r: (0, 8), g: (8, 8), b: (16, 8), a: Field::new(24, 8), fill: 0, alpha: Straight);
packed_layout!(Rgba8888Pm, bytes: 4, little: true,
    r: (0, 8), g: (8, 8), b: (16, 8), a: Field::new(24, 8), fill: 0, alpha: Premultiplied);
packed_layout!(Rgb30, bytes: 4, little: false,
    r: (20, 10), g: (10, 10), b: (0, 10), a: Field::NONE, fill: 0xc000_0000, alpha: None);
packed_layout!(A2Rgb30Pm, bytes: 4, little: false,
    r: (20, 10), g: (10, 10), b: (0, 10), a: Field::new(30, 2), fill: 0, alpha: Premultiplied);
packed_layout!(Bgr30, bytes: 4, little: false,
    r: (0, 10), g: (10, 10), b: (20, 10), a: Field::NONE, fill: 0xc000_0000, alpha: None);
packed_layout!(A2Bgr30Pm, bytes: 4, little: false,
    r: (0, 10), g: (10, 10), b: (20, 10), a: Field::new(30, 2), fill: 0, alpha: Premultiplied);

// ============================================================================
// Four-component formats
// ============================================================================

/// Storage type of one component of a four-component format.
pub(crate) trait Component {
    const SIZE: usize;
    fn load<C: Channel>(bytes: &[u8]) -> C;
    fn save<C: Channel>(value: C, bytes: &mut [u8]);
}

pub(crate) struct U16Comp;
pub(crate) struct F16Comp;
pub(crate) struct F32Comp;

impl Component for U16Comp {
    const SIZE: usize = 2;

    #[inline]
    fn load<C: Channel>(bytes: &[u8]) -> C {
        C::from_u16(u16::from_ne_bytes([bytes[0], bytes[1]]))
    }

    #[inline]
    fn save<C: Channel>(value: C, bytes: &mut [u8]) {
        bytes[..2].copy_from_slice(&value.to_u16().to_ne_bytes());
    }
}

impl Component for F16Comp {
    const SIZE: usize = 2;

    #[inline]
    fn load<C: Channel>(bytes: &[u8]) -> C {
        C::from_f32(f16::from_bits(u16::from_ne_bytes([bytes[0], bytes[1]])).to_f32())
    }

    #[inline]
    fn save<C: Channel>(value: C, bytes: &mut [u8]) {
        bytes[..2].copy_from_slice(&f16::from_f32(value.to_f32()).to_bits().to_ne_bytes());
    }
}

impl Component for F32Comp {
    const SIZE: usize = 4;

    #[inline]
    fn load<C: Channel>(bytes: &[u8]) -> C {
        C::from_f32(f32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    #[inline]
    fn save<C: Channel>(value: C, bytes: &mut [u8]) {
        bytes[..4].copy_from_slice(&value.to_f32().to_ne_bytes());
    }
}

/// Four components in R, G, B, A order.
pub(crate) trait Quad {
    type Comp: Component;
    const ALPHA: AlphaKind;
}

macro_rules! quad_layout {
    ($name:ident, $comp:ty, $alpha:ident) => {
        pub(crate) struct $name;

        impl Quad for $name {
            type Comp = $comp;
            const ALPHA: AlphaKind = AlphaKind::$alpha;
        }
    };
}

quad_layout!(Rgbx64, U16Comp, None);
quad_layout!(Rgba64, U16Comp, Straight);
quad_layout!(Rgba64Pm, U16Comp, Premultiplied);
quad_layout!(Rgbx16F, F16Comp, None);
quad_layout!(Rgba16F, F16Comp, Straight);
quad_layout!(Rgba16FPm, F16Comp, Premultiplied);
quad_layout!(Rgbx32F, F32Comp, None);
quad_layout!(Rgba32F, F32Comp, Straight);
quad_layout!(Rgba32FPm, F32Comp, Premultiplied);

pub(crate) fn fetch_quad<L: Quad, C: Channel>(row: &[u8], x: usize, out: &mut [[C; 4]]) {
    let size = <L::Comp as Component>::SIZE;
    let stride = size * 4;
    for (i, px) in out.iter_mut().enumerate() {
        let base = (x + i) * stride;
        let mut p = [C::ZERO; 4];
        for (c, v) in p.iter_mut().enumerate() {
            *v = L::Comp::load(&row[base + c * size..]);
        }
        *px = match L::ALPHA {
            AlphaKind::None => [p[0], p[1], p[2], C::MAX],
            AlphaKind::Straight => premultiply(p),
            AlphaKind::Premultiplied => p,
        };
    }
}

pub(crate) fn store_quad<L: Quad, C: Channel>(row: &mut [u8], x: usize, src: &[[C; 4]]) {
    let size = <L::Comp as Component>::SIZE;
    let stride = size * 4;
    for (i, px) in src.iter().enumerate() {
        let base = (x + i) * stride;
        let p = match L::ALPHA {
            AlphaKind::None => [px[0], px[1], px[2], C::MAX],
            AlphaKind::Straight => unpremultiply(*px),
            AlphaKind::Premultiplied => *px,
        };
        for (c, v) in p.iter().enumerate() {
            L::Comp::save(*v, &mut row[base + c * size..]);
        }
    }
}

// ============================================================================
// Single-channel formats
// ============================================================================

#[inline]
fn luma(px: [u32; 3]) -> u32 {
    (px[0] * 11 + px[1] * 16 + px[2] * 5 + 16) / 32
}

pub(crate) fn fetch_alpha8<C: Channel>(row: &[u8], x: usize, out: &mut [[C; 4]]) {
    for (px, &a) in out.iter_mut().zip(&row[x..]) {
        *px = [C::ZERO, C::ZERO, C::ZERO, C::from_u8(a)];
    }
}

pub(crate) fn store_alpha8<C: Channel>(row: &mut [u8], x: usize, src: &[[C; 4]]) {
    for (dst, px) in row[x..].iter_mut().zip(src) {
        *dst = px[3].to_u8();
    }
}

pub(crate) fn fetch_gray8<C: Channel>(row: &[u8], x: usize, out: &mut [[C; 4]]) {
    for (px, &g) in out.iter_mut().zip(&row[x..]) {
        let g = C::from_u8(g);
        *px = [g, g, g, C::MAX];
    }
}

pub(crate) fn store_gray8<C: Channel>(row: &mut [u8], x: usize, src: &[[C; 4]]) {
    for (dst, px) in row[x..].iter_mut().zip(src) {
        *dst = luma([px[0].to_unorm(255), px[1].to_unorm(255), px[2].to_unorm(255)]) as u8;
    }
}

pub(crate) fn fetch_gray16<C: Channel>(row: &[u8], x: usize, out: &mut [[C; 4]]) {
    for (i, px) in out.iter_mut().enumerate() {
        let o = (x + i) * 2;
        let g = C::from_u16(u16::from_ne_bytes([row[o], row[o + 1]]));
        *px = [g, g, g, C::MAX];
    }
}

pub(crate) fn store_gray16<C: Channel>(row: &mut [u8], x: usize, src: &[[C; 4]]) {
    for (i, px) in src.iter().enumerate() {
        let o = (x + i) * 2;
        let g = luma([px[0].to_unorm(65535), px[1].to_unorm(65535), px[2].to_unorm(65535)]);
        row[o..o + 2].copy_from_slice(&(g as u16).to_ne_bytes());
    }
}

/// Bit position of pixel `i` within its byte.
#[inline]
fn mono_bit<const LSB: bool>(i: usize) -> u32 {
    if LSB { (i & 7) as u32 } else { 7 - (i & 7) as u32 }
}

pub(crate) fn fetch_mono<const LSB: bool>(row: &[u8], x: usize, out: &mut [[u8; 4]]) {
    for (i, px) in out.iter_mut().enumerate() {
        let p = x + i;
        let v = if (row[p >> 3] >> mono_bit::<LSB>(p)) & 1 == 1 { 255 } else { 0 };
        *px = [v, v, v, 255];
    }
}

pub(crate) fn store_mono<const LSB: bool>(row: &mut [u8], x: usize, src: &[[u8; 4]]) {
    for (i, px) in src.iter().enumerate() {
        let p = x + i;
        let mask = 1u8 << mono_bit::<LSB>(p);
        if luma([px[0] as u32, px[1] as u32, px[2] as u32]) >= 128 {
            row[p >> 3] |= mask;
        } else {
            row[p >> 3] &= !mask;
        }
    }
}
