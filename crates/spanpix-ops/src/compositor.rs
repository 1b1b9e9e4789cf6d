//! The fill entry point.
//!
//! # Usage
//!
//! ```rust
//! use spanpix_core::{Color, PixelFormat, Span, Surface};
//! use spanpix_math::Transform;
//! use spanpix_ops::{fill, CompositionMode, Paint};
//!
//! let mut pixels = vec![0u8; 4 * 4 * 4];
//! let mut surface = Surface::new(&mut pixels, 4, 4, 16, PixelFormat::Rgba8888Premultiplied)?;
//! let spans = [Span::full(0, 1, 4)];
//! let paint = Paint::Solid(Color::WHITE);
//! fill(&mut surface, &spans, &paint, &Transform::IDENTITY, CompositionMode::SourceOver);
//! assert_eq!(&pixels[16..20], &[255, 255, 255, 255]);
//! # Ok::<(), spanpix_core::Error>(())
//! ```

use spanpix_core::{RasterConfig, Span, Surface};
use spanpix_math::Transform;
use tracing::debug;

use crate::backend::{backend, Backend};
use crate::composite::CompositionMode;
use crate::dispatch::{default_pool, SpanDispatcher, WorkerPool};
use crate::error::OpsResult;
use crate::operator::resolve;
use crate::source::Paint;

/// Backend, configuration and worker pool used for fills.
#[derive(Clone, Copy)]
pub struct Compositor<'b> {
    backend: &'b Backend,
    config: &'b RasterConfig,
    pool: &'b dyn WorkerPool,
}

impl Compositor<'static> {
    /// The process-wide backend, environment configuration and default pool.
    pub fn new() -> Self {
        Self {
            backend: backend(),
            config: RasterConfig::global(),
            pool: default_pool(),
        }
    }
}

impl Default for Compositor<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'b> Compositor<'b> {
    /// Uses `backend` instead of the process-wide one.
    pub fn with_backend(mut self, backend: &'b Backend) -> Self {
        self.backend = backend;
        self
    }

    /// Uses `config` for thresholds.
    pub fn with_config(mut self, config: &'b RasterConfig) -> Self {
        self.config = config;
        self
    }

    /// Runs partitions on `pool`.
    pub fn with_pool(mut self, pool: &'b dyn WorkerPool) -> Self {
        self.pool = pool;
        self
    }

    /// Backend in use.
    pub fn backend(&self) -> &'b Backend {
        self.backend
    }

    /// Composites `paint` through `spans` onto `surface`.
    ///
    /// `transform` maps paint space to device space. Degenerate paints
    /// (empty texture, singular transform, gradient without stops) are
    /// reported and leave the surface untouched.
    pub fn try_fill(
        &self,
        surface: &mut Surface<'_>,
        spans: &[Span],
        paint: &Paint<'_>,
        transform: &Transform,
        mode: CompositionMode,
    ) -> OpsResult<()> {
        if spans.is_empty() || surface.width() == 0 || surface.height() == 0 {
            return Ok(());
        }
        let op = resolve(self.backend, paint, transform, surface.format(), mode, self.config)?;
        op.dispatch(&SpanDispatcher::new(self.pool, self.config), surface, spans);
        Ok(())
    }

    /// Like [`Compositor::try_fill`], with degenerate paints drawing
    /// nothing.
    pub fn fill(
        &self,
        surface: &mut Surface<'_>,
        spans: &[Span],
        paint: &Paint<'_>,
        transform: &Transform,
        mode: CompositionMode,
    ) {
        if let Err(e) = self.try_fill(surface, spans, paint, transform, mode) {
            debug!(error = %e, paint = paint.kind(), "fill skipped");
        }
    }
}

impl std::fmt::Debug for Compositor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compositor")
            .field("backend", self.backend)
            .field("config", self.config)
            .field("workers", &self.pool.max_workers())
            .finish()
    }
}

/// Fills with the process-wide [`Compositor`].
pub fn fill(
    surface: &mut Surface<'_>,
    spans: &[Span],
    paint: &Paint<'_>,
    transform: &Transform,
    mode: CompositionMode,
) {
    Compositor::new().fill(surface, spans, paint, transform, mode);
}
