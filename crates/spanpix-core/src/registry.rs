//! Pixel format registry.
//!
//! The registry maps every [`PixelFormat`] to a [`FormatDescriptor`]: its
//! static metadata plus one optional conversion routine per precision tier.
//! A `None` slot means the format has no direct routine for that tier;
//! [`FormatDescriptor::fetch`] and [`FormatDescriptor::store`] then convert
//! through the universal 8-bit premultiplied intermediate, which every
//! format provides.
//!
//! # Architecture
//!
//! [`FormatRegistry::scalar`] returns the process-wide table of portable
//! routines. A compositing backend clones it and replaces individual slots
//! with vectorized routines before freezing its own copy; after that the
//! table is only read.
//!
//! # Example
//!
//! ```rust
//! use spanpix_core::{FormatRegistry, PixelFormat};
//!
//! let registry = FormatRegistry::scalar();
//! let desc = registry.descriptor(PixelFormat::Rgb16);
//! assert!(desc.fetch8.is_some());
//!
//! let row = 0x07e0u16.to_ne_bytes();
//! let mut out = [[0u16; 4]; 1];
//! desc.fetch(&row, 0, &mut out);
//! assert_eq!(out[0], [0, 65535, 0, 65535]);
//! ```

use std::fmt;
use std::sync::OnceLock;

use crate::channel::{Channel, PrecisionTier};
use crate::convert::{self, Packed, Quad};
use crate::format::{AlphaKind, BitWidth, PixelFormat};
use crate::surface::Surface;

/// Reads `out.len()` pixels starting at pixel `x` of `row`.
pub type FetchFn<C> = fn(row: &[u8], x: usize, out: &mut [[C; 4]]);

/// Writes `src.len()` pixels starting at pixel `x` of `row`.
pub type StoreFn<C> = fn(row: &mut [u8], x: usize, src: &[[C; 4]]);

/// Rewrites `width` pixels of a row into the premultiplied counterpart format.
pub type ConvertInPlaceFn = fn(row: &mut [u8], width: usize);

/// Pixels converted per step of the two-step fallback.
const FALLBACK_CHUNK: usize = 128;

/// Metadata and conversion slots of one pixel format.
#[derive(Clone, Copy)]
pub struct FormatDescriptor {
    /// Format described.
    pub format: PixelFormat,
    /// Storage size class.
    pub bit_width: BitWidth,
    /// Alpha semantics.
    pub alpha: AlphaKind,
    /// Fetch to 8-bit canonical.
    pub fetch8: Option<FetchFn<u8>>,
    /// Fetch to 16-bit canonical.
    pub fetch16: Option<FetchFn<u16>>,
    /// Fetch to float canonical.
    pub fetch_f32: Option<FetchFn<f32>>,
    /// Store from 8-bit canonical.
    pub store8: Option<StoreFn<u8>>,
    /// Store from 16-bit canonical.
    pub store16: Option<StoreFn<u16>>,
    /// Store from float canonical.
    pub store_f32: Option<StoreFn<f32>>,
    /// Premultiply a row in place, producing
    /// [`PixelFormat::premultiplied_counterpart`].
    pub convert_in_place: Option<ConvertInPlaceFn>,
}

impl fmt::Debug for FormatDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormatDescriptor")
            .field("format", &self.format)
            .field("bit_width", &self.bit_width)
            .field("alpha", &self.alpha)
            .field("tiers", &self.direct_tiers())
            .field("convert_in_place", &self.convert_in_place.is_some())
            .finish()
    }
}

impl FormatDescriptor {
    fn empty(format: PixelFormat) -> Self {
        Self {
            format,
            bit_width: format.bit_width(),
            alpha: format.alpha(),
            fetch8: None,
            fetch16: None,
            fetch_f32: None,
            store8: None,
            store16: None,
            store_f32: None,
            convert_in_place: None,
        }
    }

    fn with_tier<C: Channel>(mut self, fetch: FetchFn<C>, store: StoreFn<C>) -> Self {
        C::set_slots(&mut self, fetch, store);
        self
    }

    /// Tiers with a direct fetch and store routine.
    pub fn direct_tiers(&self) -> Vec<PrecisionTier> {
        let mut tiers = Vec::with_capacity(3);
        if self.fetch8.is_some() && self.store8.is_some() {
            tiers.push(PrecisionTier::U8);
        }
        if self.fetch16.is_some() && self.store16.is_some() {
            tiers.push(PrecisionTier::U16);
        }
        if self.fetch_f32.is_some() && self.store_f32.is_some() {
            tiers.push(PrecisionTier::F32);
        }
        tiers
    }

    /// Fetches pixels at tier `C`, falling back through 8 bits.
    #[inline]
    pub fn fetch<C: Channel>(&self, row: &[u8], x: usize, out: &mut [[C; 4]]) {
        if let Some(f) = C::fetch_slot(self) {
            f(row, x, out);
            return;
        }
        let Some(fetch8) = self.fetch8 else {
            out.fill([C::ZERO; 4]);
            return;
        };
        let mut tmp = [[0u8; 4]; FALLBACK_CHUNK];
        let mut at = x;
        for chunk in out.chunks_mut(FALLBACK_CHUNK) {
            let tmp = &mut tmp[..chunk.len()];
            fetch8(row, at, tmp);
            for (d, s) in chunk.iter_mut().zip(tmp.iter()) {
                *d = s.map(C::from_u8);
            }
            at += chunk.len();
        }
    }

    /// Stores pixels from tier `C`, falling back through 8 bits.
    #[inline]
    pub fn store<C: Channel>(&self, row: &mut [u8], x: usize, src: &[[C; 4]]) {
        if let Some(f) = C::store_slot(self) {
            f(row, x, src);
            return;
        }
        let Some(store8) = self.store8 else {
            return;
        };
        let mut tmp = [[0u8; 4]; FALLBACK_CHUNK];
        let mut at = x;
        for chunk in src.chunks(FALLBACK_CHUNK) {
            let tmp = &mut tmp[..chunk.len()];
            for (d, s) in tmp.iter_mut().zip(chunk) {
                *d = s.map(C::to_u8);
            }
            store8(row, at, tmp);
            at += chunk.len();
        }
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Table of descriptors indexed by [`PixelFormat::index`].
#[derive(Clone)]
pub struct FormatRegistry {
    descriptors: Vec<FormatDescriptor>,
}

impl fmt::Debug for FormatRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.descriptors.iter()).finish()
    }
}

impl FormatRegistry {
    /// Shared table of portable scalar routines.
    pub fn scalar() -> &'static FormatRegistry {
        static INSTANCE: OnceLock<FormatRegistry> = OnceLock::new();
        INSTANCE.get_or_init(FormatRegistry::build_scalar)
    }

    fn build_scalar() -> Self {
        let descriptors = PixelFormat::ALL.iter().map(|&f| scalar_descriptor(f)).collect();
        Self { descriptors }
    }

    /// Descriptor of `format`.
    #[inline]
    pub fn descriptor(&self, format: PixelFormat) -> &FormatDescriptor {
        &self.descriptors[format.index()]
    }

    /// All descriptors in [`PixelFormat::ALL`] order.
    pub fn descriptors(&self) -> &[FormatDescriptor] {
        &self.descriptors
    }

    /// Replaces the 8-bit fetch routine of `format`.
    pub fn set_fetch8(&mut self, format: PixelFormat, f: FetchFn<u8>) {
        self.descriptors[format.index()].fetch8 = Some(f);
    }

    /// Replaces the 8-bit store routine of `format`.
    pub fn set_store8(&mut self, format: PixelFormat, f: StoreFn<u8>) {
        self.descriptors[format.index()].store8 = Some(f);
    }

    /// Replaces the 16-bit fetch routine of `format`.
    pub fn set_fetch16(&mut self, format: PixelFormat, f: FetchFn<u16>) {
        self.descriptors[format.index()].fetch16 = Some(f);
    }

    /// Replaces the 16-bit store routine of `format`.
    pub fn set_store16(&mut self, format: PixelFormat, f: StoreFn<u16>) {
        self.descriptors[format.index()].store16 = Some(f);
    }

    /// Premultiplies a straight-alpha surface in place.
    ///
    /// Returns the new format, or `None` (surface untouched) when the
    /// format has no in-place conversion.
    pub fn convert_in_place(&self, surface: &mut Surface<'_>) -> Option<PixelFormat> {
        let format = surface.format();
        let target = format.premultiplied_counterpart()?;
        let convert = self.descriptor(format).convert_in_place?;
        let width = surface.width() as usize;
        for y in surface.rows() {
            convert(surface.row_mut(y), width);
        }
        surface.set_format(target);
        tracing::debug!(from = %format, to = %target, "converted surface in place");
        Some(target)
    }
}

// ============================================================================
// Scalar table
// ============================================================================

fn packed_u8<L: Packed>(format: PixelFormat) -> FormatDescriptor {
    FormatDescriptor::empty(format)
        .with_tier::<u8>(convert::fetch_packed::<L, u8>, convert::store_packed::<L, u8>)
}

fn packed_all<L: Packed>(format: PixelFormat) -> FormatDescriptor {
    packed_u8::<L>(format)
        .with_tier::<u16>(convert::fetch_packed::<L, u16>, convert::store_packed::<L, u16>)
        .with_tier::<f32>(convert::fetch_packed::<L, f32>, convert::store_packed::<L, f32>)
}

fn quad_all<L: Quad>(format: PixelFormat) -> FormatDescriptor {
    FormatDescriptor::empty(format)
        .with_tier::<u8>(convert::fetch_quad::<L, u8>, convert::store_quad::<L, u8>)
        .with_tier::<u16>(convert::fetch_quad::<L, u16>, convert::store_quad::<L, u16>)
        .with_tier::<f32>(convert::fetch_quad::<L, f32>, convert::store_quad::<L, f32>)
}

fn convert_rows<C: Channel>(fetch: FetchFn<C>, store: StoreFn<C>, row: &mut [u8], width: usize) {
    let mut buf = [[C::ZERO; 4]; 64];
    let mut x = 0;
    while x < width {
        let n = (width - x).min(buf.len());
        fetch(row, x, &mut buf[..n]);
        store(row, x, &buf[..n]);
        x += n;
    }
}

fn premultiply_argb32(row: &mut [u8], width: usize) {
    use convert::{Argb32, Argb32Pm};
    convert_rows::<u8>(
        convert::fetch_packed::<Argb32, u8>,
        convert::store_packed::<Argb32Pm, u8>,
        row,
        width,
    );
}

fn premultiply_rgba8888(row: &mut [u8], width: usize) {
    use convert::{Rgba8888, Rgba8888Pm};
    convert_rows::<u8>(
        convert::fetch_packed::<Rgba8888, u8>,
        convert::store_packed::<Rgba8888Pm, u8>,
        row,
        width,
    );
}

fn premultiply_rgba64(row: &mut [u8], width: usize) {
    use convert::{Rgba64, Rgba64Pm};
    convert_rows::<u16>(
        convert::fetch_quad::<Rgba64, u16>,
        convert::store_quad::<Rgba64Pm, u16>,
        row,
        width,
    );
}

fn premultiply_rgba16f(row: &mut [u8], width: usize) {
    use convert::{Rgba16F, Rgba16FPm};
    convert_rows::<f32>(
        convert::fetch_quad::<Rgba16F, f32>,
        convert::store_quad::<Rgba16FPm, f32>,
        row,
        width,
    );
}

fn premultiply_rgba32f(row: &mut [u8], width: usize) {
    use convert::{Rgba32F, Rgba32FPm};
    convert_rows::<f32>(
        convert::fetch_quad::<Rgba32F, f32>,
        convert::store_quad::<Rgba32FPm, f32>,
        row,
        width,
    );
}

fn scalar_descriptor(format: PixelFormat) -> FormatDescriptor {
    use convert as cv;
    use PixelFormat as F;

    let mut desc = match format {
        F::Mono => FormatDescriptor::empty(format)
            .with_tier::<u8>(cv::fetch_mono::<false>, cv::store_mono::<false>),
        F::MonoLsb => FormatDescriptor::empty(format)
            .with_tier::<u8>(cv::fetch_mono::<true>, cv::store_mono::<true>),
        F::Alpha8 => FormatDescriptor::empty(format)
            .with_tier::<u8>(cv::fetch_alpha8::<u8>, cv::store_alpha8::<u8>),
        F::Grayscale8 => FormatDescriptor::empty(format)
            .with_tier::<u8>(cv::fetch_gray8::<u8>, cv::store_gray8::<u8>),
        F::Grayscale16 => FormatDescriptor::empty(format)
            .with_tier::<u8>(cv::fetch_gray16::<u8>, cv::store_gray16::<u8>)
            .with_tier::<u16>(cv::fetch_gray16::<u16>, cv::store_gray16::<u16>)
            .with_tier::<f32>(cv::fetch_gray16::<f32>, cv::store_gray16::<f32>),
        F::Rgb16 => packed_u8::<cv::Rgb565>(format),
        F::Rgb555 => packed_u8::<cv::Rgb555>(format),
        F::Rgb444 => packed_u8::<cv::Rgb444>(format),
        F::Argb4444Premultiplied => packed_u8::<cv::Argb4444Pm>(format),
        F::Rgb888 => packed_u8::<cv::Rgb888>(format),
        F::Bgr888 => packed_u8::<cv::Bgr888>(format),
        F::Rgb666 => packed_u8::<cv::Rgb666>(format),
        F::Argb8565Premultiplied => packed_u8::<cv::Argb8565Pm>(format),
        F::Argb6666Premultiplied => packed_u8::<cv::Argb6666Pm>(format),
        F::Rgb32 => packed_u8::<cv::Rgb32>(format),
        F::Argb32 => packed_all::<cv::Argb32>(format),
        F::Argb32Premultiplied => packed_u8::<cv::Argb32Pm>(format),
        F::Rgbx8888 => packed_u8::<cv::Rgbx8888>(format),
        F::Rgba8888 => packed_all::<cv::Rgba8888>(format),
        F::Rgba8888Premultiplied => packed_u8::<cv::Rgba8888Pm>(format),
        F::Rgb30 => packed_all::<cv::Rgb30>(format),
        F::A2Rgb30Premultiplied => packed_all::<cv::A2Rgb30Pm>(format),
        F::Bgr30 => packed_all::<cv::Bgr30>(format),
        F::A2Bgr30Premultiplied => packed_all::<cv::A2Bgr30Pm>(format),
        F::Rgbx64 => quad_all::<cv::Rgbx64>(format),
        F::Rgba64 => quad_all::<cv::Rgba64>(format),
        F::Rgba64Premultiplied => quad_all::<cv::Rgba64Pm>(format),
        F::Rgbx16F => quad_all::<cv::Rgbx16F>(format),
        F::Rgba16F => quad_all::<cv::Rgba16F>(format),
        F::Rgba16FPremultiplied => quad_all::<cv::Rgba16FPm>(format),
        F::Rgbx32F => quad_all::<cv::Rgbx32F>(format),
        F::Rgba32F => quad_all::<cv::Rgba32F>(format),
        F::Rgba32FPremultiplied => quad_all::<cv::Rgba32FPm>(format),
    };

    desc.convert_in_place = match format {
        F::Argb32 => Some(premultiply_argb32 as ConvertInPlaceFn),
        F::Rgba8888 => Some(premultiply_rgba8888),
        F::Rgba64 => Some(premultiply_rgba64),
        F::Rgba16F => Some(premultiply_rgba16f),
        F::Rgba32F => Some(premultiply_rgba32f),
        _ => None,
    };
    desc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_format_has_universal_slots() {
        let registry = FormatRegistry::scalar();
        for &f in PixelFormat::ALL {
            let d = registry.descriptor(f);
            assert_eq!(d.format, f);
            assert!(d.fetch8.is_some(), "{f} lacks fetch8");
            assert!(d.store8.is_some(), "{f} lacks store8");
            assert!(
                d.direct_tiers().contains(&f.native_tier())
                    || f.native_tier() == PrecisionTier::U8
            );
        }
    }

    #[test]
    fn test_lossless_tier_has_direct_slots() {
        let registry = FormatRegistry::scalar();
        for &f in PixelFormat::ALL {
            let tiers = registry.descriptor(f).direct_tiers();
            assert!(tiers.contains(&f.lossless_tier()), "{f}: {tiers:?}");
        }
    }

    #[test]
    fn test_fallback_widens_through_u8() {
        let registry = FormatRegistry::scalar();
        let d = registry.descriptor(PixelFormat::Rgb888);
        assert!(d.fetch16.is_none());

        let row = [255u8, 128, 0, 1, 2, 3];
        let mut out = [[0u16; 4]; 2];
        d.fetch(&row, 0, &mut out);
        assert_eq!(out[0], [65535, 128 * 257, 0, 65535]);
        assert_eq!(out[1], [257, 2 * 257, 3 * 257, 65535]);

        let mut back = [0u8; 6];
        d.store(&mut back, 0, &out);
        assert_eq!(back, row);
    }

    #[test]
    fn test_fallback_handles_long_runs() {
        let registry = FormatRegistry::scalar();
        let d = registry.descriptor(PixelFormat::Bgr888);
        let width = FALLBACK_CHUNK * 2 + 5;
        let row: Vec<u8> = (0..width * 3).map(|i| (i * 7 % 256) as u8).collect();
        let mut wide = vec![[0f32; 4]; width];
        d.fetch(&row, 0, &mut wide);
        let mut back = vec![0u8; row.len()];
        d.store(&mut back, 0, &wide);
        assert_eq!(back, row);
    }

    #[test]
    fn test_convert_in_place() {
        let mut bytes = Vec::new();
        for px in [0x80ff_0000u32, 0xff00_ff00, 0x0012_3456] {
            bytes.extend_from_slice(&px.to_ne_bytes());
        }
        let mut surface = Surface::new(&mut bytes, 3, 1, 12, PixelFormat::Argb32).unwrap();
        let registry = FormatRegistry::scalar();
        assert_eq!(
            registry.convert_in_place(&mut surface),
            Some(PixelFormat::Argb32Premultiplied)
        );
        assert_eq!(surface.format(), PixelFormat::Argb32Premultiplied);
        assert_eq!(registry.convert_in_place(&mut surface), None);

        let words: Vec<u32> = bytes
            .chunks_exact(4)
            .map(|c| u32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        assert_eq!(words, vec![0x8080_0000, 0xff00_ff00, 0x0000_0000]);
    }
}
