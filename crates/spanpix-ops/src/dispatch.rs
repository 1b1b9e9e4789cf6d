//! Span dispatch.
//!
//! [`SpanDispatcher`] walks a span list, clips each span to the destination
//! and hands the surviving runs to an [`Operator`]. Large fills onto
//! byte-addressable formats are partitioned into row-disjoint groups of
//! roughly equal pixel volume and run concurrently on a [`WorkerPool`];
//! the result is identical to running them in order because no two
//! partitions touch the same destination row.
//!
//! # Example
//!
//! ```rust
//! use spanpix_core::Span;
//! use spanpix_ops::dispatch::partition;
//!
//! let spans: Vec<Span> = (0..4).map(|y| Span::full(0, y, 10)).collect();
//! let parts = partition(&spans, 2);
//! assert_eq!(parts, vec![0..2, 2..4]);
//! ```

use std::ops::Range;

use spanpix_core::span::{coalesce, is_sorted_by_row, pixel_count};
use spanpix_core::{PixelFormat, RasterConfig, Span, Surface};
use tracing::trace;

use crate::backend::TierKernels;
use crate::operator::{Operator, Scratch};

// ============================================================================
// Worker pools
// ============================================================================

/// A job borrowed for the duration of one [`WorkerPool::run_scoped`] call.
pub type ScopedJob<'s> = Box<dyn FnOnce() + Send + 's>;

/// Runs batches of borrowed jobs to completion.
pub trait WorkerPool: Sync {
    /// Number of jobs the pool can run at once.
    fn max_workers(&self) -> usize;

    /// Runs every job and returns once all of them have finished.
    fn run_scoped<'s>(&self, jobs: Vec<ScopedJob<'s>>);
}

/// Runs jobs one after another on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlinePool;

impl WorkerPool for InlinePool {
    fn max_workers(&self) -> usize {
        1
    }

    fn run_scoped<'s>(&self, jobs: Vec<ScopedJob<'s>>) {
        for job in jobs {
            job();
        }
    }
}

/// The global rayon pool.
#[cfg(feature = "parallel")]
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalPool;

#[cfg(feature = "parallel")]
impl WorkerPool for GlobalPool {
    fn max_workers(&self) -> usize {
        rayon::current_num_threads()
    }

    fn run_scoped<'s>(&self, jobs: Vec<ScopedJob<'s>>) {
        rayon::scope(|s| {
            for job in jobs {
                s.spawn(move |_| job());
            }
        });
    }
}

#[cfg(feature = "parallel")]
impl WorkerPool for rayon::ThreadPool {
    fn max_workers(&self) -> usize {
        self.current_num_threads()
    }

    fn run_scoped<'s>(&self, jobs: Vec<ScopedJob<'s>>) {
        self.scope(|s| {
            for job in jobs {
                s.spawn(move |_| job());
            }
        });
    }
}

/// The pool fills use when none is given.
pub fn default_pool() -> &'static dyn WorkerPool {
    #[cfg(feature = "parallel")]
    {
        &GlobalPool
    }
    #[cfg(not(feature = "parallel"))]
    {
        &InlinePool
    }
}

// ============================================================================
// Partitioning
// ============================================================================

/// Splits row-sorted `spans` into at most `parts` ranges of near-equal
/// pixel volume.
///
/// Ranges only end where the row changes, so no row appears in two ranges.
/// Fewer ranges come back when there are not enough row changes.
pub fn partition(spans: &[Span], parts: usize) -> Vec<Range<usize>> {
    if parts <= 1 || spans.is_empty() {
        return vec![0..spans.len()];
    }
    let target = pixel_count(spans).div_ceil(parts as u64).max(1);
    let mut ranges = Vec::with_capacity(parts);
    let mut start = 0;
    let mut acc = 0u64;
    for i in 0..spans.len() {
        if !spans[i].is_empty() {
            acc += spans[i].len as u64;
        }
        let row_ends = i + 1 < spans.len() && spans[i + 1].y != spans[i].y;
        if row_ends && acc >= target && ranges.len() + 1 < parts {
            ranges.push(start..i + 1);
            start = i + 1;
            acc = 0;
        }
    }
    ranges.push(start..spans.len());
    ranges
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Feeds spans to an operator, in order or across a pool.
#[derive(Clone, Copy)]
pub struct SpanDispatcher<'p> {
    pool: &'p dyn WorkerPool,
    config: &'p RasterConfig,
}

impl<'p> SpanDispatcher<'p> {
    /// Creates a dispatcher over `pool`.
    pub fn new(pool: &'p dyn WorkerPool, config: &'p RasterConfig) -> Self {
        Self { pool, config }
    }

    /// Worker count a fill may use.
    pub fn workers(&self) -> usize {
        let pool = self.pool.max_workers().max(1);
        match self.config.max_workers {
            0 => pool,
            cap => pool.min(cap),
        }
    }

    /// Partitions for a fill of `spans` onto `format`, or `None` to run
    /// sequentially.
    pub fn plan(&self, format: PixelFormat, spans: &[Span]) -> Option<Vec<Range<usize>>> {
        let pixels = pixel_count(spans);
        if pixels < self.config.parallel_threshold || format.channel_bits() < 8 {
            return None;
        }
        let workers = self.workers();
        if workers < 2 || !is_sorted_by_row(spans) {
            return None;
        }
        let parts = partition(spans, workers);
        trace!(pixels, workers, partitions = parts.len(), "partitioned spans");
        (parts.len() > 1).then_some(parts)
    }

    /// Composites `spans` onto `surface` with `op`.
    pub fn dispatch<C: TierKernels>(
        &self,
        op: &Operator<'_, C>,
        surface: &mut Surface<'_>,
        spans: &[Span],
    ) {
        match self.plan(surface.format(), spans) {
            Some(parts) => self.run_partitioned(op, surface, spans, &parts),
            None => run_spans(op, surface, spans),
        }
    }

    fn run_partitioned<C: TierKernels>(
        &self,
        op: &Operator<'_, C>,
        surface: &mut Surface<'_>,
        spans: &[Span],
        parts: &[Range<usize>],
    ) {
        let starts: Vec<u32> = parts[1..].iter().map(|r| spans[r.start].y.max(0) as u32).collect();
        let bands = surface.reborrow().split_into_bands(&starts);
        let jobs: Vec<ScopedJob<'_>> = parts
            .iter()
            .zip(bands)
            .map(|(range, mut band)| {
                let spans = &spans[range.clone()];
                Box::new(move || run_spans(op, &mut band, spans)) as ScopedJob<'_>
            })
            .collect();
        self.pool.run_scoped(jobs);
    }
}

impl std::fmt::Debug for SpanDispatcher<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpanDispatcher")
            .field("workers", &self.workers())
            .field("config", self.config)
            .finish()
    }
}

/// Runs `spans` in order against the rows `surface` owns.
fn run_spans<C: TierKernels>(op: &Operator<'_, C>, surface: &mut Surface<'_>, spans: &[Span]) {
    let mut scratch = Scratch::<C>::new();
    let width = surface.width();
    for span in coalesce(spans) {
        if !surface.contains_row(span.y) {
            continue;
        }
        let Some(cols) = span.clip(width) else {
            continue;
        };
        let row = surface.row_mut(span.y as u32);
        op.blend_run(row, cols.start, span.y, cols.len(), span.coverage, &mut scratch);
    }
}
