//! Operator resolution.
//!
//! [`resolve`] turns one draw call (paint, transform, destination format,
//! composition mode) into an [`Operator`]: a source sampler, a destination
//! accessor and the solid and array composition functions, all at a single
//! precision tier. The tier is the wider of the destination's native
//! precision and the paint's, so neither end is narrowed.
//!
//! The operator is immutable once built and is shared by reference across
//! worker partitions.
//!
//! # Example
//!
//! ```rust
//! use spanpix_core::{Color, PixelFormat, PrecisionTier, RasterConfig};
//! use spanpix_math::Transform;
//! use spanpix_ops::backend::Backend;
//! use spanpix_ops::operator::resolve;
//! use spanpix_ops::{CompositionMode, Paint};
//!
//! let backend = Backend::scalar();
//! let paint = Paint::Solid(Color::from_rgba16(65535, 0, 0, 65535));
//! let op = resolve(
//!     &backend,
//!     &paint,
//!     &Transform::IDENTITY,
//!     PixelFormat::Argb32Premultiplied,
//!     CompositionMode::SourceOver,
//!     &RasterConfig::default(),
//! )?;
//! assert_eq!(op.tier(), PrecisionTier::U16);
//! # Ok::<(), spanpix_ops::OpsError>(())
//! ```

use spanpix_core::{PixelFormat, PrecisionTier, RasterConfig, Surface, Span, TextureView, PAGE_SIZE};
use spanpix_math::Transform;
use tracing::debug;

use crate::backend::{Backend, TierKernels};
use crate::composite::{ArrayFn, CompositionMode, SolidFn};
use crate::dest::DestinationAccessor;
use crate::dispatch::SpanDispatcher;
use crate::error::{OpsError, OpsResult};
use crate::gradient::GradientSampler;
use crate::source::{Paint, SourceSampler};
use crate::texture::{TextureSampler, WrapMode};

/// Staging buffers of one worker, one page each.
pub struct Scratch<C> {
    src: [[C; 4]; PAGE_SIZE],
    dst: [[C; 4]; PAGE_SIZE],
}

impl<C: TierKernels> Scratch<C> {
    /// Zeroed buffers.
    pub fn new() -> Self {
        Self {
            src: [[C::ZERO; 4]; PAGE_SIZE],
            dst: [[C::ZERO; 4]; PAGE_SIZE],
        }
    }
}

impl<C: TierKernels> Default for Scratch<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// Byte copy from a texture of the destination's own format.
#[derive(Debug, Clone, Copy)]
struct RawCopy<'a> {
    texture: TextureView<'a>,
    offset: (i64, i64),
    wrap: WrapMode,
    bpp: usize,
}

impl RawCopy<'_> {
    /// Copies `len` pixels if the source run lies inside one texture row.
    #[inline]
    fn copy(&self, row: &mut [u8], x: usize, y: i32, len: usize) -> bool {
        let (w, h) = (self.texture.width() as i64, self.texture.height() as i64);
        let (mut tx, mut ty) = (x as i64 + self.offset.0, y as i64 + self.offset.1);
        if self.wrap == WrapMode::Tile {
            tx = tx.rem_euclid(w);
            ty = ty.rem_euclid(h);
        }
        if tx < 0 || ty < 0 || ty >= h || tx + len as i64 > w {
            return false;
        }
        let src = self.texture.row(ty as u32);
        let start = tx as usize * self.bpp;
        let bytes = len * self.bpp;
        row[x * self.bpp..x * self.bpp + bytes].copy_from_slice(&src[start..start + bytes]);
        true
    }
}

/// Everything one draw call needs, at tier `C`.
#[derive(Debug)]
pub struct Operator<'a, C: TierKernels> {
    mode: CompositionMode,
    source: SourceSampler<'a, C>,
    dest: DestinationAccessor<'a, C>,
    solid: SolidFn<C>,
    array: ArrayFn<C>,
    raw_copy: Option<RawCopy<'a>>,
}

impl<'a, C: TierKernels> Operator<'a, C> {
    /// Builds the operator for a draw onto `dest`.
    pub fn new(
        backend: &'a Backend,
        paint: &Paint<'a>,
        transform: &Transform,
        dest: PixelFormat,
        mode: CompositionMode,
        config: &RasterConfig,
    ) -> OpsResult<Self> {
        let mut raw_copy = None;
        let source = match paint {
            Paint::Solid(color) => SourceSampler::Solid(color.premultiplied::<C>()),
            Paint::Gradient(gradient) => {
                SourceSampler::Gradient(GradientSampler::new(gradient, invert(transform)?)?)
            }
            Paint::Texture(texture) => {
                let view = texture.view;
                if view.is_empty() {
                    return Err(OpsError::EmptyTexture {
                        width: view.width(),
                        height: view.height(),
                    });
                }
                let inverse = invert(transform)?;
                if mode == CompositionMode::Source
                    && view.format() == dest
                    && dest.bytes_per_pixel() > 0
                {
                    raw_copy = inverse.integer_translation().map(|offset| RawCopy {
                        texture: view,
                        offset,
                        wrap: texture.wrap,
                        bpp: dest.bytes_per_pixel(),
                    });
                }
                let sampler = TextureSampler::new(
                    view,
                    backend.registry(),
                    inverse,
                    transform.max_scale(),
                    texture.wrap,
                    texture.smooth,
                    config,
                )
                .with_bilinear(backend.bilinear::<C>());
                debug!(state = ?sampler.state(), path = ?sampler.state().path(), "texture sampler");
                SourceSampler::Texture(sampler)
            }
        };
        let table = backend.composition::<C>();
        Ok(Self {
            mode,
            source,
            dest: DestinationAccessor::new(backend.registry(), dest),
            solid: table.solid(mode),
            array: table.array(mode),
            raw_copy,
        })
    }

    /// Composition mode.
    pub fn mode(&self) -> CompositionMode {
        self.mode
    }

    /// Source sampler.
    pub fn source(&self) -> &SourceSampler<'a, C> {
        &self.source
    }

    /// Destination accessor.
    pub fn destination(&self) -> &DestinationAccessor<'a, C> {
        &self.dest
    }

    /// Returns `true` if full-coverage runs are copied byte for byte.
    pub fn copies_raw(&self) -> bool {
        self.raw_copy.is_some()
    }

    /// Composites `len` pixels from column `x` of destination row `y`.
    ///
    /// `row` holds the destination bytes of row `y`; the run must lie
    /// inside it.
    pub fn blend_run(
        &self,
        row: &mut [u8],
        x: usize,
        y: i32,
        len: usize,
        coverage: u8,
        scratch: &mut Scratch<C>,
    ) {
        if coverage == 0 || len == 0 {
            return;
        }
        if coverage == 255 {
            if let Some(copy) = &self.raw_copy {
                if copy.copy(row, x, y, len) {
                    return;
                }
            }
        }
        let skip_fetch = coverage == 255 && !self.mode.reads_destination();
        let mut done = 0;
        while done < len {
            let n = (len - done).min(PAGE_SIZE);
            let px = x + done;
            if let Some(view) = self.dest.view(row, px, n) {
                self.blend_page(view, px, y, coverage, &mut scratch.src);
            } else {
                let dst = &mut scratch.dst[..n];
                if !skip_fetch {
                    self.dest.fetch(row, px, dst);
                }
                self.blend_page(dst, px, y, coverage, &mut scratch.src);
                self.dest.store(row, px, dst);
            }
            done += n;
        }
    }

    #[inline]
    fn blend_page(
        &self,
        dst: &mut [[C; 4]],
        x: usize,
        y: i32,
        coverage: u8,
        src: &mut [[C; 4]; PAGE_SIZE],
    ) {
        match self.source.solid() {
            Some(color) => (self.solid)(dst, color, coverage),
            None => {
                let src = &mut src[..dst.len()];
                self.source.fetch(x as i32, y, src);
                (self.array)(dst, src, coverage);
            }
        }
    }
}

fn invert(transform: &Transform) -> OpsResult<Transform> {
    transform.inverse().ok_or(OpsError::SingularTransform)
}

/// An operator at whichever tier resolution chose.
#[derive(Debug)]
pub enum ResolvedOperator<'a> {
    /// 8 bits per channel.
    U8(Operator<'a, u8>),
    /// 16 bits per channel.
    U16(Operator<'a, u16>),
    /// Float channels.
    F32(Operator<'a, f32>),
}

impl ResolvedOperator<'_> {
    /// Chosen tier.
    pub fn tier(&self) -> PrecisionTier {
        match self {
            Self::U8(_) => PrecisionTier::U8,
            Self::U16(_) => PrecisionTier::U16,
            Self::F32(_) => PrecisionTier::F32,
        }
    }

    /// Composition mode.
    pub fn mode(&self) -> CompositionMode {
        match self {
            Self::U8(op) => op.mode(),
            Self::U16(op) => op.mode(),
            Self::F32(op) => op.mode(),
        }
    }

    /// Returns `true` if full-coverage runs are copied byte for byte.
    pub fn copies_raw(&self) -> bool {
        match self {
            Self::U8(op) => op.copies_raw(),
            Self::U16(op) => op.copies_raw(),
            Self::F32(op) => op.copies_raw(),
        }
    }

    /// Runs the operator over `spans`.
    pub fn dispatch(
        &self,
        dispatcher: &SpanDispatcher<'_>,
        surface: &mut Surface<'_>,
        spans: &[Span],
    ) {
        match self {
            Self::U8(op) => dispatcher.dispatch(op, surface, spans),
            Self::U16(op) => dispatcher.dispatch(op, surface, spans),
            Self::F32(op) => dispatcher.dispatch(op, surface, spans),
        }
    }
}

/// Resolves a draw call onto a destination of format `dest`.
pub fn resolve<'a>(
    backend: &'a Backend,
    paint: &Paint<'a>,
    transform: &Transform,
    dest: PixelFormat,
    mode: CompositionMode,
    config: &RasterConfig,
) -> OpsResult<ResolvedOperator<'a>> {
    let tier = dest.native_tier().max(paint.precision(dest));
    let op = match tier {
        PrecisionTier::U8 => {
            ResolvedOperator::U8(Operator::new(backend, paint, transform, dest, mode, config)?)
        }
        PrecisionTier::U16 => {
            ResolvedOperator::U16(Operator::new(backend, paint, transform, dest, mode, config)?)
        }
        PrecisionTier::F32 => {
            ResolvedOperator::F32(Operator::new(backend, paint, transform, dest, mode, config)?)
        }
    };
    debug!(
        paint = paint.kind(),
        dest = %dest,
        mode = %mode,
        tier = %tier,
        raw_copy = op.copies_raw(),
        "resolved operator"
    );
    Ok(op)
}
