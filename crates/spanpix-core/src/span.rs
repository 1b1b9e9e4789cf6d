//! Coverage spans produced by a scanline rasterizer.
//!
//! A [`Span`] is a horizontal run of `len` pixels starting at `(x, y)`, all
//! with the same 8-bit coverage. The compositor never modifies spans; it
//! clips them to the destination, skips empty ones and merges touching runs
//! with [`coalesce`].

use std::iter::Peekable;
use std::ops::Range;
use std::slice;

/// A run of equally covered pixels on one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    /// First pixel column.
    pub x: i32,
    /// Row.
    pub y: i32,
    /// Number of pixels.
    pub len: u32,
    /// Coverage in `0..=255`.
    pub coverage: u8,
}

impl Span {
    /// Creates a span.
    pub const fn new(x: i32, y: i32, len: u32, coverage: u8) -> Self {
        Self { x, y, len, coverage }
    }

    /// Fully covered span.
    pub const fn full(x: i32, y: i32, len: u32) -> Self {
        Self::new(x, y, len, 255)
    }

    /// One past the last column.
    #[inline]
    pub fn end(&self) -> i64 {
        self.x as i64 + self.len as i64
    }

    /// Returns `true` if the span touches no pixel or has no coverage.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0 || self.coverage == 0
    }

    /// Columns of the span inside `0..width`, or `None` if nothing remains.
    #[inline]
    pub fn clip(&self, width: u32) -> Option<Range<usize>> {
        let start = (self.x as i64).clamp(0, width as i64);
        let end = self.end().clamp(0, width as i64);
        (start < end).then(|| start as usize..end as usize)
    }
}

/// Total pixels touched by non-empty spans.
pub fn pixel_count(spans: &[Span]) -> u64 {
    spans.iter().filter(|s| !s.is_empty()).map(|s| s.len as u64).sum()
}

/// Returns `true` if rows never decrease along the list.
pub fn is_sorted_by_row(spans: &[Span]) -> bool {
    spans.windows(2).all(|w| w[0].y <= w[1].y)
}

/// Iterator merging touching spans of equal row and coverage.
#[derive(Debug, Clone)]
pub struct Coalesce<'a> {
    spans: Peekable<slice::Iter<'a, Span>>,
}

impl Iterator for Coalesce<'_> {
    type Item = Span;

    fn next(&mut self) -> Option<Span> {
        let mut run = *self.spans.find(|s| !s.is_empty())?;
        while let Some(next) = self.spans.peek() {
            if next.is_empty() {
                self.spans.next();
                continue;
            }
            let joins = next.y == run.y
                && next.coverage == run.coverage
                && next.x as i64 == run.end();
            if !joins || run.len.checked_add(next.len).is_none() {
                break;
            }
            run.len += next.len;
            self.spans.next();
        }
        Some(run)
    }
}

/// Merges adjacent spans that continue each other and drops empty ones.
pub fn coalesce(spans: &[Span]) -> Coalesce<'_> {
    Coalesce {
        spans: spans.iter().peekable(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip() {
        assert_eq!(Span::full(-3, 0, 5).clip(10), Some(0..2));
        assert_eq!(Span::full(8, 0, 5).clip(10), Some(8..10));
        assert_eq!(Span::full(10, 0, 5).clip(10), None);
        assert_eq!(Span::full(-9, 0, 5).clip(10), None);
        assert_eq!(Span::full(i32::MAX, 0, u32::MAX).clip(10), None);
    }

    #[test]
    fn test_coalesce_merges_touching_runs() {
        let spans = [
            Span::new(0, 0, 4, 200),
            Span::new(4, 0, 2, 200),
            Span::new(6, 0, 1, 100),
            Span::new(7, 0, 0, 100),
            Span::new(7, 0, 3, 100),
            Span::new(0, 1, 2, 100),
            Span::new(5, 1, 2, 0),
        ];
        let merged: Vec<_> = coalesce(&spans).collect();
        assert_eq!(
            merged,
            vec![
                Span::new(0, 0, 6, 200),
                Span::new(6, 0, 4, 100),
                Span::new(0, 1, 2, 100),
            ]
        );
    }

    #[test]
    fn test_gap_prevents_merge() {
        let spans = [Span::full(0, 0, 2), Span::full(3, 0, 2)];
        assert_eq!(coalesce(&spans).count(), 2);
    }

    #[test]
    fn test_counts_and_order() {
        let spans = [Span::full(0, 0, 5), Span::new(0, 1, 7, 0), Span::full(0, 1, 3)];
        assert_eq!(pixel_count(&spans), 8);
        assert!(is_sorted_by_row(&spans));
        assert!(!is_sorted_by_row(&[Span::full(0, 2, 1), Span::full(0, 1, 1)]));
    }
}
