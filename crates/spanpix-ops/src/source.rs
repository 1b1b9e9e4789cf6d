//! Paint sources.
//!
//! [`Paint`] is what the caller draws with; [`SourceSampler`] is the
//! resolved, tier-specific producer of canonical source pixels.

use spanpix_core::{Channel, Color, PixelFormat, PrecisionTier, TextureView};

use crate::gradient::{Gradient, GradientKind, GradientSampler};
use crate::texture::{TextureSampler, WrapMode};

/// A texture paint.
#[derive(Debug, Clone, Copy)]
pub struct Texture<'a> {
    /// Source pixels.
    pub view: TextureView<'a>,
    /// Behavior outside the texture.
    pub wrap: WrapMode,
    /// Bilinear filtering when the transform is not a whole-pixel offset.
    pub smooth: bool,
}

impl<'a> Texture<'a> {
    /// Clamped, nearest-sampled texture.
    pub fn new(view: TextureView<'a>) -> Self {
        Self {
            view,
            wrap: WrapMode::Clamp,
            smooth: false,
        }
    }

    /// Sets the wrap mode.
    pub fn with_wrap(mut self, wrap: WrapMode) -> Self {
        self.wrap = wrap;
        self
    }

    /// Enables or disables bilinear filtering.
    pub fn with_smooth(mut self, smooth: bool) -> Self {
        self.smooth = smooth;
        self
    }
}

/// What a fill paints with.
#[derive(Debug, Clone)]
pub enum Paint<'a> {
    /// One color everywhere.
    Solid(Color),
    /// Color ramp.
    Gradient(Gradient),
    /// Sampled image.
    Texture(Texture<'a>),
}

impl Paint<'_> {
    /// Precision the paint needs when drawn onto `dest`.
    ///
    /// Solid colors keep the precision they were specified in and textures
    /// use their format's native precision. Gradients are evaluated at 8
    /// bits unless their stops or the destination need more.
    pub fn precision(&self, dest: PixelFormat) -> PrecisionTier {
        match self {
            Paint::Solid(c) => c.precision(),
            Paint::Gradient(g) => g.precision().max(dest.native_tier()),
            Paint::Texture(t) => t.view.format().native_tier(),
        }
    }

    /// Short name of the paint kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Paint::Solid(_) => "solid",
            Paint::Gradient(g) => match g.kind {
                GradientKind::Linear { .. } => "linear-gradient",
                GradientKind::Radial { .. } => "radial-gradient",
                GradientKind::Conical { .. } => "conical-gradient",
            },
            Paint::Texture(_) => "texture",
        }
    }
}

impl From<Color> for Paint<'_> {
    fn from(c: Color) -> Self {
        Paint::Solid(c)
    }
}

impl From<Gradient> for Paint<'_> {
    fn from(g: Gradient) -> Self {
        Paint::Gradient(g)
    }
}

impl<'a> From<Texture<'a>> for Paint<'a> {
    fn from(t: Texture<'a>) -> Self {
        Paint::Texture(t)
    }
}

/// Produces canonical source pixels at tier `C`.
#[derive(Debug, Clone)]
pub enum SourceSampler<'a, C: Channel> {
    /// Premultiplied constant.
    Solid([C; 4]),
    /// Gradient lookup.
    Gradient(GradientSampler),
    /// Texture walk.
    Texture(TextureSampler<'a, C>),
}

impl<C: Channel> SourceSampler<'_, C> {
    /// Samples device pixels `x..x + out.len()` of row `y`.
    #[inline]
    pub fn fetch(&self, x: i32, y: i32, out: &mut [[C; 4]]) {
        match self {
            SourceSampler::Solid(c) => out.fill(*c),
            SourceSampler::Gradient(g) => g.fetch(x, y, out),
            SourceSampler::Texture(t) => t.fetch(x, y, out),
        }
    }

    /// The constant color, if the source is solid.
    #[inline]
    pub fn solid(&self) -> Option<[C; 4]> {
        match self {
            SourceSampler::Solid(c) => Some(*c),
            _ => None,
        }
    }
}
