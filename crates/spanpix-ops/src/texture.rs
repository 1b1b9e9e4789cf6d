//! Texture sampling under a paint transform.
//!
//! A [`TextureSampler`] produces canonical pixels for a run of device
//! pixels. How it walks the texture is fixed once, when the sampler is
//! built, by classifying the transform into a [`SamplerState`]:
//!
//! | state | transform | filter |
//! |---|---|---|
//! | `Untransformed` / `TiledUntransformed` | identity or whole-pixel translation | any |
//! | `AffineNearest` / `AffineNearestTiled` | affine | nearest |
//! | `AffineBilinear` / `AffineBilinearTiled` | affine | bilinear |
//! | `Perspective` | projective | either |
//!
//! Sample points are pixel centers: device pixel `(x, y)` samples the
//! texture at the inverse-transformed `(x + 0.5, y + 0.5)`. Nearest
//! sampling takes the floor of that point; bilinear sampling blends the
//! four texels around it after subtracting `0.5`.
//!
//! Affine walks step in 16.16 fixed point when the coefficients and the
//! whole run fit (see [`spanpix_math::fixed::fits_fixed`]) and in `f64`
//! otherwise. Coordinates outside the texture are clamped to the edge or
//! wrapped, per [`WrapMode`]; no coordinate ever indexes outside the
//! texture.

use std::array;

use spanpix_core::{Channel, FormatDescriptor, FormatRegistry, RasterConfig, TextureView};
use spanpix_math::fixed::{
    fits_fixed, fixed_floor, fixed_fract, quantize_weight, split_weight, to_fixed,
};
use spanpix_math::Transform;

/// Blends four texels with weights out of 256.
pub type BilinearFn<C> =
    fn(tl: [C; 4], tr: [C; 4], bl: [C; 4], br: [C; 4], wx: u32, wy: u32) -> [C; 4];

/// Portable per-channel bilinear blend.
pub fn bilinear_scalar<C: Channel>(
    tl: [C; 4],
    tr: [C; 4],
    bl: [C; 4],
    br: [C; 4],
    wx: u32,
    wy: u32,
) -> [C; 4] {
    array::from_fn(|i| C::bilinear(tl[i], tr[i], bl[i], br[i], wx, wy))
}

/// Smallest magnitude of the homogeneous `w` used for a perspective divide.
const PERSPECTIVE_EPSILON: f64 = 1e-9;

/// Magnitude to which perspective sample points are clamped.
const PERSPECTIVE_CLAMP: f64 = 1e9;

/// Behavior outside the texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WrapMode {
    /// Repeat the nearest edge texel.
    #[default]
    Clamp,
    /// Repeat the texture periodically.
    Tile,
}

/// Sampling strategy chosen once per operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SamplerState {
    /// Direct row access with whole-pixel offsets.
    Untransformed,
    /// Direct row access wrapped modulo the texture size.
    TiledUntransformed,
    /// Constant-increment walk, nearest texel.
    AffineNearest,
    /// Constant-increment walk, nearest texel, wrapped.
    AffineNearestTiled,
    /// Constant-increment walk, four-texel blend.
    AffineBilinear,
    /// Constant-increment walk, four-texel blend, wrapped.
    AffineBilinearTiled,
    /// Per-pixel homogeneous divide.
    Perspective,
}

/// Cost class of a sampler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SamplingPath {
    /// Coordinates advance by a constant per pixel.
    FastAffine,
    /// Each pixel needs a divide.
    SlowPerspective,
}

impl SamplerState {
    /// Chooses the state for a device-to-texture transform.
    pub fn classify(inverse: &Transform, smooth: bool, wrap: WrapMode) -> Self {
        let tiled = wrap == WrapMode::Tile;
        if !inverse.is_affine() {
            Self::Perspective
        } else if inverse.integer_translation().is_some() {
            if tiled { Self::TiledUntransformed } else { Self::Untransformed }
        } else {
            match (smooth, tiled) {
                (false, false) => Self::AffineNearest,
                (false, true) => Self::AffineNearestTiled,
                (true, false) => Self::AffineBilinear,
                (true, true) => Self::AffineBilinearTiled,
            }
        }
    }

    /// Cost class.
    pub fn path(self) -> SamplingPath {
        match self {
            Self::Perspective => SamplingPath::SlowPerspective,
            _ => SamplingPath::FastAffine,
        }
    }
}

/// Samples a texture for runs of device pixels at tier `C`.
#[derive(Debug, Clone)]
pub struct TextureSampler<'a, C: Channel> {
    texture: TextureView<'a>,
    descriptor: &'a FormatDescriptor,
    inverse: Transform,
    state: SamplerState,
    wrap: WrapMode,
    smooth: bool,
    weight_bits: u32,
    fast_matrix: bool,
    offset: (i64, i64),
    bilinear: BilinearFn<C>,
}

impl<'a, C: Channel> TextureSampler<'a, C> {
    /// Creates a sampler.
    ///
    /// `inverse` maps device coordinates to texture coordinates; `zoom` is
    /// the magnification of the forward transform. The texture must not
    /// be empty.
    pub fn new(
        texture: TextureView<'a>,
        registry: &'a FormatRegistry,
        inverse: Transform,
        zoom: f64,
        wrap: WrapMode,
        smooth: bool,
        config: &RasterConfig,
    ) -> Self {
        debug_assert!(!texture.is_empty());
        let state = SamplerState::classify(&inverse, smooth, wrap);
        let offset = inverse.integer_translation().unwrap_or((0, 0));
        let weight_bits = if zoom > config.bilinear_high_zoom { 4 } else { 8 };
        Self {
            texture,
            descriptor: registry.descriptor(texture.format()),
            inverse,
            state,
            wrap,
            smooth,
            weight_bits,
            fast_matrix: inverse.is_fast_matrix(config.fast_matrix_limit),
            offset,
            bilinear: bilinear_scalar::<C>,
        }
    }

    /// Replaces the four-texel blend kernel.
    pub fn with_bilinear(mut self, kernel: BilinearFn<C>) -> Self {
        self.bilinear = kernel;
        self
    }

    /// Chosen state.
    pub fn state(&self) -> SamplerState {
        self.state
    }

    /// Bits of bilinear weight precision (8 or 4).
    pub fn weight_bits(&self) -> u32 {
        self.weight_bits
    }

    /// Samples device pixels `x..x + out.len()` of row `y`.
    pub fn fetch(&self, x: i32, y: i32, out: &mut [[C; 4]]) {
        match self.state {
            SamplerState::Untransformed | SamplerState::TiledUntransformed => {
                self.fetch_direct(x, y, out)
            }
            SamplerState::AffineNearest | SamplerState::AffineNearestTiled => {
                self.fetch_affine_nearest(x, y, out)
            }
            SamplerState::AffineBilinear | SamplerState::AffineBilinearTiled => {
                self.fetch_affine_bilinear(x, y, out)
            }
            SamplerState::Perspective => self.fetch_perspective(x, y, out),
        }
    }

    // ------------------------------------------------------------------------
    // Coordinates
    // ------------------------------------------------------------------------

    #[inline]
    fn wrap_coord(&self, v: i64, size: u32) -> u32 {
        match self.wrap {
            WrapMode::Clamp => v.clamp(0, size as i64 - 1) as u32,
            WrapMode::Tile => v.rem_euclid(size as i64) as u32,
        }
    }

    #[inline]
    fn wrap_x(&self, v: i64) -> u32 {
        self.wrap_coord(v, self.texture.width())
    }

    #[inline]
    fn wrap_y(&self, v: i64) -> u32 {
        self.wrap_coord(v, self.texture.height())
    }

    #[inline]
    fn texel(&self, row: &[u8], x: u32) -> [C; 4] {
        let mut px = [[C::ZERO; 4]; 1];
        self.descriptor.fetch(row, x as usize, &mut px);
        px[0]
    }

    /// Texels `x0` and `x1` of a row, in one fetch when adjacent.
    #[inline]
    fn texel_pair(&self, row: &[u8], x0: u32, x1: u32) -> ([C; 4], [C; 4]) {
        if x1 == x0 + 1 {
            let mut px = [[C::ZERO; 4]; 2];
            self.descriptor.fetch(row, x0 as usize, &mut px);
            (px[0], px[1])
        } else {
            (self.texel(row, x0), self.texel(row, x1))
        }
    }

    #[inline]
    fn sample_nearest(&self, sx: i64, sy: i64) -> [C; 4] {
        let row = self.texture.row(self.wrap_y(sy));
        self.texel(row, self.wrap_x(sx))
    }

    #[inline]
    fn sample_bilinear(&self, x0: i64, y0: i64, wx: u32, wy: u32) -> [C; 4] {
        let (tx0, tx1) = (self.wrap_x(x0), self.wrap_x(x0 + 1));
        let top = self.texture.row(self.wrap_y(y0));
        let bottom = self.texture.row(self.wrap_y(y0 + 1));
        let (tl, tr) = self.texel_pair(top, tx0, tx1);
        let (bl, br) = self.texel_pair(bottom, tx0, tx1);
        (self.bilinear)(tl, tr, bl, br, wx, wy)
    }

    // ------------------------------------------------------------------------
    // States
    // ------------------------------------------------------------------------

    fn fetch_direct(&self, x: i32, y: i32, out: &mut [[C; 4]]) {
        let (dx, dy) = self.offset;
        let width = self.texture.width() as i64;
        let row = self.texture.row(self.wrap_y(y as i64 + dy));
        let mut tx = x as i64 + dx;
        let mut rest = out;
        while !rest.is_empty() {
            let (run, fill) = match self.wrap {
                WrapMode::Tile => {
                    let start = tx.rem_euclid(width);
                    ((width - start).min(rest.len() as i64) as usize, Some(start))
                }
                WrapMode::Clamp if tx < 0 => ((-tx).min(rest.len() as i64) as usize, None),
                WrapMode::Clamp if tx >= width => (rest.len(), None),
                WrapMode::Clamp => ((width - tx).min(rest.len() as i64) as usize, Some(tx)),
            };
            let (head, tail) = rest.split_at_mut(run);
            match fill {
                Some(start) => self.descriptor.fetch(row, start as usize, head),
                None => head.fill(self.texel(row, self.wrap_x(tx))),
            }
            tx += run as i64;
            rest = tail;
        }
    }

    /// Start point and per-pixel step of an affine walk.
    #[inline]
    fn affine_walk(&self, x: i32, y: i32, bias: f64) -> ((f64, f64), (f64, f64)) {
        let (px, py) = self.inverse.map(x as f64 + 0.5, y as f64 + 0.5);
        let m = &self.inverse.m;
        ((px - bias, py - bias), (m[0][0], m[1][0]))
    }

    #[inline]
    fn use_fixed(&self, start: (f64, f64), step: (f64, f64), len: usize) -> bool {
        self.fast_matrix && fits_fixed(start.0, step.0, len) && fits_fixed(start.1, step.1, len)
    }

    fn fetch_affine_nearest(&self, x: i32, y: i32, out: &mut [[C; 4]]) {
        let (start, step) = self.affine_walk(x, y, 0.0);
        if self.use_fixed(start, step, out.len()) {
            let (mut fx, mut fy) = (to_fixed(start.0), to_fixed(start.1));
            let (sx, sy) = (to_fixed(step.0), to_fixed(step.1));
            for px in out.iter_mut() {
                *px = self.sample_nearest(fixed_floor(fx) as i64, fixed_floor(fy) as i64);
                fx += sx;
                fy += sy;
            }
        } else {
            for (i, px) in out.iter_mut().enumerate() {
                let (u, v) = (start.0 + step.0 * i as f64, start.1 + step.1 * i as f64);
                *px = self.sample_nearest(split_weight(u, 8).0, split_weight(v, 8).0);
            }
        }
    }

    fn fetch_affine_bilinear(&self, x: i32, y: i32, out: &mut [[C; 4]]) {
        let bits = self.weight_bits;
        let (start, step) = self.affine_walk(x, y, 0.5);
        if self.use_fixed(start, step, out.len()) {
            let (mut fx, mut fy) = (to_fixed(start.0), to_fixed(start.1));
            let (sx, sy) = (to_fixed(step.0), to_fixed(step.1));
            for px in out.iter_mut() {
                let wx = quantize_weight(fixed_fract(fx), bits);
                let wy = quantize_weight(fixed_fract(fy), bits);
                *px = self.sample_bilinear(fixed_floor(fx) as i64, fixed_floor(fy) as i64, wx, wy);
                fx += sx;
                fy += sy;
            }
        } else {
            for (i, px) in out.iter_mut().enumerate() {
                let (x0, wx) = split_weight(start.0 + step.0 * i as f64, bits);
                let (y0, wy) = split_weight(start.1 + step.1 * i as f64, bits);
                *px = self.sample_bilinear(x0, y0, wx, wy);
            }
        }
    }

    fn fetch_perspective(&self, x: i32, y: i32, out: &mut [[C; 4]]) {
        let cy = y as f64 + 0.5;
        for (i, px) in out.iter_mut().enumerate() {
            let cx = x as f64 + i as f64 + 0.5;
            let (hx, hy, w) = self.inverse.map_homogeneous(cx, cy);
            let w = if w.abs() < PERSPECTIVE_EPSILON {
                PERSPECTIVE_EPSILON.copysign(w)
            } else {
                w
            };
            let u = (hx / w).clamp(-PERSPECTIVE_CLAMP, PERSPECTIVE_CLAMP);
            let v = (hy / w).clamp(-PERSPECTIVE_CLAMP, PERSPECTIVE_CLAMP);
            *px = if self.smooth {
                let (x0, wx) = split_weight(u - 0.5, self.weight_bits);
                let (y0, wy) = split_weight(v - 0.5, self.weight_bits);
                self.sample_bilinear(x0, y0, wx, wy)
            } else {
                self.sample_nearest(split_weight(u, 8).0, split_weight(v, 8).0)
            };
        }
    }
}
