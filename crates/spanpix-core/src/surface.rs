//! Borrowed views over caller-owned pixel memory.
//!
//! [`Surface`] is a writable destination; [`TextureView`] is a read-only
//! sampling source. Both describe `height` rows of `stride` bytes, the last
//! row of which may be truncated to its pixel payload. Geometry is checked
//! once at construction so row access afterwards is a plain slice.
//!
//! A surface can be split into disjoint horizontal bands with
//! [`Surface::split_at_row`]. Bands keep absolute row numbers, so a span at
//! row `y` addresses the same pixels before and after splitting.

use std::ops::Range;

use crate::error::{Error, Result};
use crate::format::PixelFormat;

/// Largest width or height accepted; sample coordinates are `i32`.
pub const MAX_DIMENSION: u32 = i32::MAX as u32 / 2;

fn validate(len: usize, width: u32, height: u32, stride: usize, format: PixelFormat) -> Result<()> {
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(Error::invalid_dimensions(width, height));
    }
    let row_bytes = format.bit_width().row_bytes(width as usize);
    if stride < row_bytes {
        return Err(Error::InvalidStride {
            stride,
            width,
            row_bytes,
            format: format.name(),
        });
    }
    let needed = match height {
        0 => 0,
        h => stride * (h as usize - 1) + row_bytes,
    };
    if len < needed {
        return Err(Error::buffer_too_small(needed, len));
    }
    Ok(())
}

/// Writable destination pixels.
#[derive(Debug)]
pub struct Surface<'a> {
    data: &'a mut [u8],
    width: u32,
    height: u32,
    stride: usize,
    format: PixelFormat,
    first_row: u32,
}

impl<'a> Surface<'a> {
    /// Wraps `data` as `height` rows of `stride` bytes.
    pub fn new(
        data: &'a mut [u8],
        width: u32,
        height: u32,
        stride: usize,
        format: PixelFormat,
    ) -> Result<Self> {
        validate(data.len(), width, height, stride, format)?;
        Ok(Self {
            data,
            width,
            height,
            stride,
            format,
            first_row: 0,
        })
    }

    /// Width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Number of rows in this surface or band.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Row pitch in bytes.
    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Pixel format.
    #[inline]
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub(crate) fn set_format(&mut self, format: PixelFormat) {
        self.format = format;
    }

    /// Absolute row numbers covered.
    #[inline]
    pub fn rows(&self) -> Range<u32> {
        self.first_row..self.first_row + self.height
    }

    /// Returns `true` if absolute row `y` belongs to this surface.
    #[inline]
    pub fn contains_row(&self, y: i32) -> bool {
        y >= 0 && self.rows().contains(&(y as u32))
    }

    #[inline]
    fn row_span(&self, y: u32) -> Range<usize> {
        debug_assert!(self.rows().contains(&y), "row {y} outside {:?}", self.rows());
        let start = (y - self.first_row) as usize * self.stride;
        start..start + self.format.bit_width().row_bytes(self.width as usize)
    }

    /// Pixel bytes of absolute row `y`.
    #[inline]
    pub fn row(&self, y: u32) -> &[u8] {
        let span = self.row_span(y);
        &self.data[span]
    }

    /// Mutable pixel bytes of absolute row `y`.
    #[inline]
    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let span = self.row_span(y);
        &mut self.data[span]
    }

    /// Backing bytes of this surface or band.
    pub fn bytes(&self) -> &[u8] {
        &self.data[..]
    }

    /// Shorter-lived surface over the same rows.
    pub fn reborrow(&mut self) -> Surface<'_> {
        Surface {
            data: &mut *self.data,
            width: self.width,
            height: self.height,
            stride: self.stride,
            format: self.format,
            first_row: self.first_row,
        }
    }

    /// Read-only view of the same pixels.
    pub fn as_texture(&self) -> TextureView<'_> {
        TextureView {
            data: &self.data[..],
            width: self.width,
            height: self.height,
            stride: self.stride,
            format: self.format,
        }
    }

    /// Splits into the rows above absolute row `y` and the rows from `y` on.
    ///
    /// `y` is clamped to the covered rows, so either half may be empty.
    pub fn split_at_row(self, y: u32) -> (Surface<'a>, Surface<'a>) {
        let y = y.clamp(self.first_row, self.first_row + self.height);
        let top_height = y - self.first_row;
        let offset = (top_height as usize * self.stride).min(self.data.len());
        let data = self.data;
        let (top, bottom) = data.split_at_mut(offset);
        (
            Surface {
                data: top,
                width: self.width,
                height: top_height,
                stride: self.stride,
                format: self.format,
                first_row: self.first_row,
            },
            Surface {
                data: bottom,
                width: self.width,
                height: self.height - top_height,
                stride: self.stride,
                format: self.format,
                first_row: y,
            },
        )
    }

    /// Splits into bands starting at each of the ascending absolute rows in
    /// `starts`. The first band begins at this surface's first row.
    pub fn split_into_bands(self, starts: &[u32]) -> Vec<Surface<'a>> {
        let mut bands = Vec::with_capacity(starts.len() + 1);
        let mut rest = self;
        for &y in starts {
            let (band, tail) = rest.split_at_row(y);
            bands.push(band);
            rest = tail;
        }
        bands.push(rest);
        bands
    }
}

/// Read-only pixels sampled by a texture paint.
#[derive(Debug, Clone, Copy)]
pub struct TextureView<'a> {
    data: &'a [u8],
    width: u32,
    height: u32,
    stride: usize,
    format: PixelFormat,
}

impl<'a> TextureView<'a> {
    /// Wraps `data` as `height` rows of `stride` bytes.
    pub fn new(
        data: &'a [u8],
        width: u32,
        height: u32,
        stride: usize,
        format: PixelFormat,
    ) -> Result<Self> {
        validate(data.len(), width, height, stride, format)?;
        Ok(Self {
            data,
            width,
            height,
            stride,
            format,
        })
    }

    /// Width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Pixel format.
    #[inline]
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Returns `true` if the texture has no pixels.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Pixel bytes of row `y`.
    #[inline]
    pub fn row(&self, y: u32) -> &'a [u8] {
        let start = y as usize * self.stride;
        &self.data[start..start + self.format.bit_width().row_bytes(self.width as usize)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_last_row_is_accepted() {
        let mut data = vec![0u8; 16 + 8];
        let s = Surface::new(&mut data, 2, 2, 16, PixelFormat::Argb32).unwrap();
        assert_eq!(s.row(1).len(), 8);
    }

    #[test]
    fn test_validation() {
        let mut data = vec![0u8; 10];
        let err = Surface::new(&mut data, 4, 1, 8, PixelFormat::Argb32).unwrap_err();
        assert!(matches!(err, Error::InvalidStride { row_bytes: 16, .. }));

        let err = TextureView::new(&data, 2, 2, 8, PixelFormat::Argb32).unwrap_err();
        assert!(err.is_buffer_too_small());

        let empty = TextureView::new(&[], 0, 0, 0, PixelFormat::Argb32).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_mono_row_bytes() {
        let data = [0u8; 4];
        let t = TextureView::new(&data, 9, 2, 2, PixelFormat::Mono).unwrap();
        assert_eq!(t.row(1).len(), 2);
    }

    #[test]
    fn test_bands_keep_absolute_rows() {
        let mut data: Vec<u8> = (0..6 * 4).map(|i| i as u8).collect();
        let s = Surface::new(&mut data, 1, 6, 4, PixelFormat::Argb32).unwrap();
        let mut bands = s.split_into_bands(&[2, 5]);
        assert_eq!(bands.len(), 3);
        assert_eq!(bands[0].rows(), 0..2);
        assert_eq!(bands[1].rows(), 2..5);
        assert_eq!(bands[2].rows(), 5..6);
        assert_eq!(bands[1].row(3), &[12, 13, 14, 15]);
        bands[2].row_mut(5).fill(0xaa);
        assert!(!bands[1].contains_row(5));
        assert!(bands[1].contains_row(4));
        drop(bands);
        assert_eq!(&data[20..], &[0xaa; 4]);
    }

    #[test]
    fn test_split_clamps() {
        let mut data = vec![0u8; 8];
        let s = Surface::new(&mut data, 1, 2, 4, PixelFormat::Argb32).unwrap();
        let (top, bottom) = s.split_at_row(10);
        assert_eq!(top.height(), 2);
        assert_eq!(bottom.height(), 0);
        assert_eq!(bottom.rows(), 2..2);
    }
}
