//! Destination accessor.
//!
//! Moves destination pixels between their native bytes and the canonical
//! `[C; 4]` working representation of one precision tier. When the
//! destination layout already is the canonical pixel of that tier
//! ([`PixelFormat::canonical_tier`]) the accessor hands out a view into the
//! row instead of copying.

use std::marker::PhantomData;
use std::mem::size_of;

use spanpix_core::{Channel, FormatDescriptor, FormatRegistry, PixelFormat};

/// Fetches and stores destination pixels at tier `C`.
#[derive(Debug, Clone, Copy)]
pub struct DestinationAccessor<'r, C: Channel> {
    descriptor: &'r FormatDescriptor,
    direct: bool,
    _tier: PhantomData<C>,
}

impl<'r, C: Channel> DestinationAccessor<'r, C> {
    /// Accessor for `format` using the routines of `registry`.
    pub fn new(registry: &'r FormatRegistry, format: PixelFormat) -> Self {
        Self {
            descriptor: registry.descriptor(format),
            direct: format.canonical_tier() == Some(C::TIER),
            _tier: PhantomData,
        }
    }

    /// Destination format.
    #[inline]
    pub fn format(&self) -> PixelFormat {
        self.descriptor.format
    }

    /// Returns `true` if rows can be viewed as canonical pixels.
    #[inline]
    pub fn is_direct(&self) -> bool {
        self.direct
    }

    /// Reads `out.len()` pixels from column `x` of `row`.
    #[inline]
    pub fn fetch(&self, row: &[u8], x: usize, out: &mut [[C; 4]]) {
        self.descriptor.fetch(row, x, out);
    }

    /// Writes `src` to column `x` of `row`.
    #[inline]
    pub fn store(&self, row: &mut [u8], x: usize, src: &[[C; 4]]) {
        self.descriptor.store(row, x, src);
    }

    /// Canonical view of `len` pixels from column `x`.
    ///
    /// `None` if the format is not canonical for this tier or the bytes are
    /// not aligned for `C`; callers then stage through [`fetch`](Self::fetch)
    /// and [`store`](Self::store).
    #[inline]
    pub fn view<'a>(&self, row: &'a mut [u8], x: usize, len: usize) -> Option<&'a mut [[C; 4]]> {
        if !self.direct {
            return None;
        }
        let bpp = size_of::<[C; 4]>();
        let bytes = row.get_mut(x * bpp..(x + len) * bpp)?;
        bytemuck::try_cast_slice_mut(bytes).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_only_for_matching_tier() {
        let registry = FormatRegistry::scalar();
        let rgba8 = PixelFormat::Rgba8888Premultiplied;
        assert!(DestinationAccessor::<u8>::new(registry, rgba8).is_direct());
        assert!(!DestinationAccessor::<u16>::new(registry, rgba8).is_direct());
        let rgba_f32 = PixelFormat::Rgba32FPremultiplied;
        assert!(DestinationAccessor::<f32>::new(registry, rgba_f32).is_direct());
        let argb32 = PixelFormat::Argb32Premultiplied;
        assert!(!DestinationAccessor::<u8>::new(registry, argb32).is_direct());
    }

    #[test]
    fn test_view_aliases_row() {
        let registry = FormatRegistry::scalar();
        let acc = DestinationAccessor::<u8>::new(registry, PixelFormat::Rgba8888Premultiplied);
        let mut row = vec![0u8; 16];
        {
            let view = acc.view(&mut row, 1, 2).unwrap();
            view[0] = [1, 2, 3, 4];
            view[1] = [5, 6, 7, 8];
        }
        assert_eq!(row, [0, 0, 0, 0, 1, 2, 3, 4, 5, 6, 7, 8, 0, 0, 0, 0]);
        assert!(acc.view(&mut row, 3, 2).is_none());
    }

    #[test]
    fn test_staged_roundtrip() {
        let registry = FormatRegistry::scalar();
        let acc = DestinationAccessor::<u16>::new(registry, PixelFormat::Rgb16);
        let mut row = [0u8; 4];
        acc.store(&mut row, 1, &[[0, 65535, 0, 65535]]);
        assert_eq!(u16::from_ne_bytes([row[2], row[3]]), 0x07e0);
        let mut out = [[0u16; 4]; 2];
        acc.fetch(&row, 0, &mut out);
        assert_eq!(out, [[0, 0, 0, 65535], [0, 65535, 0, 65535]]);
    }
}
