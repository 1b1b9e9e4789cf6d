//! Gradient paints.
//!
//! A [`Gradient`] is a list of color stops plus a geometry that maps each
//! point to a ramp parameter `t`:
//!
//! - **Linear** - projection of the point onto the start-to-end axis
//! - **Radial** - two-circle form: the largest `t` for which the point lies
//!   on the circle interpolated between the focal circle (`t = 0`) and the
//!   outer circle (`t = 1`). Points on no such circle are transparent.
//! - **Conical** - angle around a center, measured from a start angle, as a
//!   fraction of a full turn
//!
//! Colors are not evaluated per pixel. A [`GradientTable`] of
//! [`GRADIENT_TABLE_SIZE`] premultiplied entries is built once per draw and
//! `t` is reduced to an index with [`Spread`].
//!
//! # Example
//!
//! ```rust
//! use spanpix_core::Color;
//! use spanpix_ops::gradient::{Gradient, GradientTable, Spread};
//!
//! let g = Gradient::linear((0.0, 0.0), (100.0, 0.0))
//!     .with_stop(0.0, Color::WHITE)
//!     .with_stop(1.0, Color::BLACK);
//! let table = GradientTable::build(&g.stops).unwrap();
//! let mid = table.entry::<u8>(GradientTable::index(0.5, Spread::Pad));
//! assert_eq!(mid, [127, 127, 127, 255]);
//! ```

use std::f64::consts::TAU;

use spanpix_core::channel::{convert_pixel, premultiply};
use spanpix_core::{Channel, Color, PrecisionTier};
use spanpix_math::Transform;

use crate::error::{OpsError, OpsResult};

/// Entries in a gradient lookup table.
pub const GRADIENT_TABLE_SIZE: usize = 1024;

/// How `t` outside `[0, 1]` is mapped back into the ramp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Spread {
    /// Clamp to the end colors.
    #[default]
    Pad,
    /// Restart the ramp every period.
    Repeat,
    /// Mirror the ramp every other period.
    Reflect,
}

/// A color at a ramp position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientStop {
    /// Position in `[0, 1]`.
    pub position: f32,
    /// Straight (non-premultiplied) color.
    pub color: Color,
}

/// Geometry of a gradient in paint space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GradientKind {
    /// Axis from `start` (`t = 0`) to `end` (`t = 1`).
    Linear {
        /// Start point.
        start: (f64, f64),
        /// End point.
        end: (f64, f64),
    },
    /// Two-circle radial gradient.
    Radial {
        /// Center of the outer circle (`t = 1`).
        center: (f64, f64),
        /// Radius of the outer circle.
        radius: f64,
        /// Center of the focal circle (`t = 0`).
        focal: (f64, f64),
        /// Radius of the focal circle.
        focal_radius: f64,
    },
    /// Angular sweep.
    Conical {
        /// Center of the sweep.
        center: (f64, f64),
        /// Angle of `t = 0`, in radians.
        angle: f64,
    },
}

/// A gradient paint.
#[derive(Debug, Clone, PartialEq)]
pub struct Gradient {
    /// Geometry.
    pub kind: GradientKind,
    /// Color stops in any order.
    pub stops: Vec<GradientStop>,
    /// Spread outside `[0, 1]`.
    pub spread: Spread,
}

impl Gradient {
    fn new(kind: GradientKind) -> Self {
        Self {
            kind,
            stops: Vec::new(),
            spread: Spread::Pad,
        }
    }

    /// Linear gradient from `start` to `end`.
    pub fn linear(start: (f64, f64), end: (f64, f64)) -> Self {
        Self::new(GradientKind::Linear { start, end })
    }

    /// Radial gradient with the focal point at the center.
    pub fn radial(center: (f64, f64), radius: f64) -> Self {
        Self::radial_focal(center, radius, center, 0.0)
    }

    /// Two-circle radial gradient.
    pub fn radial_focal(
        center: (f64, f64),
        radius: f64,
        focal: (f64, f64),
        focal_radius: f64,
    ) -> Self {
        Self::new(GradientKind::Radial {
            center,
            radius,
            focal,
            focal_radius,
        })
    }

    /// Conical gradient around `center` starting at `angle` radians.
    pub fn conical(center: (f64, f64), angle: f64) -> Self {
        Self::new(GradientKind::Conical { center, angle })
    }

    /// Adds a stop.
    pub fn with_stop(mut self, position: f32, color: Color) -> Self {
        self.stops.push(GradientStop { position, color });
        self
    }

    /// Sets the spread.
    pub fn with_spread(mut self, spread: Spread) -> Self {
        self.spread = spread;
        self
    }

    /// Highest precision among the stop colors.
    pub fn precision(&self) -> PrecisionTier {
        self.stops
            .iter()
            .map(|s| s.color.precision())
            .max()
            .unwrap_or(PrecisionTier::U8)
    }
}

// ============================================================================
// Table
// ============================================================================

/// Premultiplied color ramp at 8 and 16 bits.
#[derive(Clone)]
pub struct GradientTable {
    rgba8: Vec<[u8; 4]>,
    rgba16: Vec<[u16; 4]>,
}

impl std::fmt::Debug for GradientTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GradientTable")
            .field("first", &self.rgba8.first())
            .field("last", &self.rgba8.last())
            .finish()
    }
}

impl GradientTable {
    /// Builds the ramp from stops.
    ///
    /// Positions are clamped to `[0, 1]` and sorted; colors are
    /// interpolated unpremultiplied and premultiplied per entry.
    pub fn build(stops: &[GradientStop]) -> OpsResult<Self> {
        if stops.is_empty() {
            return Err(OpsError::NoGradientStops);
        }
        let mut sorted: Vec<(f32, [f32; 4])> = stops
            .iter()
            .map(|s| {
                let p = if s.position.is_nan() { 0.0 } else { s.position.clamp(0.0, 1.0) };
                (p, s.color.straight::<f32>())
            })
            .collect();
        sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut rgba8 = Vec::with_capacity(GRADIENT_TABLE_SIZE);
        let mut rgba16 = Vec::with_capacity(GRADIENT_TABLE_SIZE);
        let mut seg = 0;
        for i in 0..GRADIENT_TABLE_SIZE {
            let t = i as f32 / (GRADIENT_TABLE_SIZE - 1) as f32;
            while seg + 1 < sorted.len() && sorted[seg + 1].0 < t {
                seg += 1;
            }
            let straight = interpolate(&sorted, seg, t);
            let px = premultiply(straight.map(|c| c.clamp(0.0, 1.0)));
            rgba8.push(convert_pixel::<f32, u8>(px));
            rgba16.push(convert_pixel::<f32, u16>(px));
        }
        Ok(Self { rgba8, rgba16 })
    }

    /// Table index of ramp parameter `t` under `spread`.
    #[inline]
    pub fn index(t: f64, spread: Spread) -> usize {
        const N: i64 = GRADIENT_TABLE_SIZE as i64;
        if !t.is_finite() {
            return 0;
        }
        let i = (t * (N - 1) as f64 + 0.5).floor().clamp(-1e15, 1e15) as i64;
        let i = match spread {
            Spread::Pad => i.clamp(0, N - 1),
            Spread::Repeat => i.rem_euclid(N),
            Spread::Reflect => {
                let m = i.rem_euclid(2 * N);
                if m < N { m } else { 2 * N - 1 - m }
            }
        };
        i as usize
    }

    /// Entry `i` at tier `C`. The float tier reads the 16-bit ramp.
    #[inline]
    pub fn entry<C: Channel>(&self, i: usize) -> [C; 4] {
        match C::TIER {
            PrecisionTier::U8 => convert_pixel(self.rgba8[i]),
            _ => convert_pixel(self.rgba16[i]),
        }
    }
}

fn interpolate(stops: &[(f32, [f32; 4])], seg: usize, t: f32) -> [f32; 4] {
    let (p0, c0) = stops[seg];
    if t <= p0 || seg + 1 == stops.len() {
        return c0;
    }
    let (p1, c1) = stops[seg + 1];
    if p1 <= p0 {
        return c1;
    }
    let f = ((t - p0) / (p1 - p0)).clamp(0.0, 1.0);
    [0, 1, 2, 3].map(|k| c0[k] + (c1[k] - c0[k]) * f)
}

// ============================================================================
// Sampler
// ============================================================================

/// Evaluates a gradient for runs of device pixels.
#[derive(Debug, Clone)]
pub struct GradientSampler {
    table: GradientTable,
    kind: GradientKind,
    spread: Spread,
    inverse: Transform,
}

impl GradientSampler {
    /// Creates a sampler; `inverse` maps device to paint coordinates.
    pub fn new(gradient: &Gradient, inverse: Transform) -> OpsResult<Self> {
        Ok(Self {
            table: GradientTable::build(&gradient.stops)?,
            kind: gradient.kind,
            spread: gradient.spread,
            inverse,
        })
    }

    /// Lookup table.
    pub fn table(&self) -> &GradientTable {
        &self.table
    }

    /// Returns `true` if runs step `t` by a constant instead of mapping
    /// every pixel.
    pub fn is_incremental(&self) -> bool {
        matches!(self.kind, GradientKind::Linear { .. }) && self.inverse.is_affine()
    }

    /// Samples device pixels `x..x + out.len()` of row `y`.
    pub fn fetch<C: Channel>(&self, x: i32, y: i32, out: &mut [[C; 4]]) {
        match self.kind {
            GradientKind::Linear { start, end } if self.is_incremental() => {
                self.fetch_linear_affine(start, end, x, y, out)
            }
            _ => {
                let cy = y as f64 + 0.5;
                for (i, px) in out.iter_mut().enumerate() {
                    let (u, v) = self.inverse.map(x as f64 + i as f64 + 0.5, cy);
                    *px = match self.param(u, v) {
                        Some(t) => self.table.entry(GradientTable::index(t, self.spread)),
                        None => [C::ZERO; 4],
                    };
                }
            }
        }
    }

    /// `t` grows by a constant per device pixel.
    fn fetch_linear_affine<C: Channel>(
        &self,
        start: (f64, f64),
        end: (f64, f64),
        x: i32,
        y: i32,
        out: &mut [[C; 4]],
    ) {
        let (ax, ay) = (end.0 - start.0, end.1 - start.1);
        let len2 = ax * ax + ay * ay;
        if len2 == 0.0 {
            out.fill(self.table.entry(GradientTable::index(0.0, self.spread)));
            return;
        }
        let (u, v) = self.inverse.map(x as f64 + 0.5, y as f64 + 0.5);
        let t0 = ((u - start.0) * ax + (v - start.1) * ay) / len2;
        let m = &self.inverse.m;
        let dt = (m[0][0] * ax + m[1][0] * ay) / len2;
        for (i, px) in out.iter_mut().enumerate() {
            *px = self.table.entry(GradientTable::index(t0 + dt * i as f64, self.spread));
        }
    }

    /// Ramp parameter at paint point `(u, v)`, `None` if undefined.
    fn param(&self, u: f64, v: f64) -> Option<f64> {
        if !u.is_finite() || !v.is_finite() {
            return None;
        }
        match self.kind {
            GradientKind::Linear { start, end } => {
                let (ax, ay) = (end.0 - start.0, end.1 - start.1);
                let len2 = ax * ax + ay * ay;
                if len2 == 0.0 {
                    return Some(0.0);
                }
                Some(((u - start.0) * ax + (v - start.1) * ay) / len2)
            }
            GradientKind::Radial {
                center,
                radius,
                focal,
                focal_radius,
            } => radial_param(u, v, center, radius, focal, focal_radius),
            GradientKind::Conical { center, angle } => {
                let a = (v - center.1).atan2(u - center.0);
                Some(((a - angle) / TAU).rem_euclid(1.0))
            }
        }
    }
}

/// Largest `t` with `|p - c(t)| = r(t)` and `r(t) >= 0`, where the circle
/// moves linearly from the focal circle to the outer one.
fn radial_param(
    u: f64,
    v: f64,
    center: (f64, f64),
    radius: f64,
    focal: (f64, f64),
    focal_radius: f64,
) -> Option<f64> {
    let (cdx, cdy) = (center.0 - focal.0, center.1 - focal.1);
    let dr = radius - focal_radius;
    let (pdx, pdy) = (u - focal.0, v - focal.1);
    let a = cdx * cdx + cdy * cdy - dr * dr;
    let b = pdx * cdx + pdy * cdy + focal_radius * dr;
    let c = pdx * pdx + pdy * pdy - focal_radius * focal_radius;
    let valid = |t: f64| focal_radius + t * dr >= 0.0;

    if a.abs() < 1e-12 {
        if b == 0.0 {
            return None;
        }
        let t = c / (2.0 * b);
        return valid(t).then_some(t);
    }
    let det = b * b - a * c;
    if det < 0.0 {
        return None;
    }
    let s = det.sqrt();
    let (t1, t2) = ((b + s) / a, (b - s) / a);
    let (hi, lo) = if t1 >= t2 { (t1, t2) } else { (t2, t1) };
    if valid(hi) {
        Some(hi)
    } else if valid(lo) {
        Some(lo)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn white_to_black() -> Gradient {
        Gradient::linear((0.0, 0.0), (100.0, 0.0))
            .with_stop(1.0, Color::BLACK)
            .with_stop(0.0, Color::WHITE)
    }

    #[test]
    fn test_no_stops_is_error() {
        let g = Gradient::linear((0.0, 0.0), (1.0, 0.0));
        assert!(matches!(GradientTable::build(&g.stops), Err(OpsError::NoGradientStops)));
    }

    #[test]
    fn test_table_ends_and_midpoint() {
        let table = GradientTable::build(&white_to_black().stops).unwrap();
        assert_eq!(table.entry::<u8>(0), [255, 255, 255, 255]);
        assert_eq!(table.entry::<u8>(GRADIENT_TABLE_SIZE - 1), [0, 0, 0, 255]);
        assert_eq!(table.entry::<u16>(0), [65535; 4]);
        let mid = GradientTable::index(0.5, Spread::Pad);
        assert_eq!(mid, 512);
        for spread in [Spread::Pad, Spread::Repeat, Spread::Reflect] {
            assert_eq!(GradientTable::index(0.5, spread), mid);
        }
    }

    #[test]
    fn test_single_stop_is_constant() {
        let g =
            Gradient::radial((0.0, 0.0), 5.0).with_stop(0.3, Color::from_rgba8(10, 20, 30, 255));
        let table = GradientTable::build(&g.stops).unwrap();
        assert_eq!(table.entry::<u8>(0), [10, 20, 30, 255]);
        assert_eq!(table.entry::<u8>(1023), [10, 20, 30, 255]);
    }

    #[test]
    fn test_entries_are_premultiplied() {
        let g = Gradient::linear((0.0, 0.0), (1.0, 0.0))
            .with_stop(0.0, Color::from_rgba8(255, 0, 0, 128));
        let table = GradientTable::build(&g.stops).unwrap();
        assert_eq!(table.entry::<u8>(7), [128, 0, 0, 128]);
    }

    #[test]
    fn test_spread_index() {
        assert_eq!(GradientTable::index(-0.5, Spread::Pad), 0);
        assert_eq!(GradientTable::index(1.5, Spread::Pad), 1023);
        assert_eq!(GradientTable::index(1.0, Spread::Repeat), 1023);
        assert_eq!(GradientTable::index(-1.0 / 1023.0, Spread::Repeat), 1023);
        assert_eq!(GradientTable::index(-1.0 / 1023.0, Spread::Reflect), 0);
        assert_eq!(GradientTable::index(f64::NAN, Spread::Reflect), 0);
    }

    #[test]
    fn test_linear_affine_matches_per_pixel() {
        let g = white_to_black().with_spread(Spread::Reflect);
        let inverse = Transform::rotate(0.4).inverse().unwrap();
        let s = GradientSampler::new(&g, inverse).unwrap();
        let mut fast = vec![[0u8; 4]; 64];
        s.fetch(-10, 7, &mut fast);
        for (i, px) in fast.iter().enumerate() {
            let (u, v) = inverse.map(-10.0 + i as f64 + 0.5, 7.5);
            let t = s.param(u, v).unwrap();
            let expected = s.table().entry::<u8>(GradientTable::index(t, Spread::Reflect));
            // Incremental t may round differently by one entry.
            assert!(px.iter().zip(&expected).all(|(a, b)| a.abs_diff(*b) <= 1), "{i}");
        }
    }

    #[test]
    fn test_linear_steps_under_scaled_rotation() {
        let g = Gradient::linear((-200.0, 0.0), (200.0, 100.0))
            .with_stop(0.0, Color::from_rgba8(255, 0, 0, 255))
            .with_stop(1.0, Color::from_rgba8(0, 0, 255, 128));
        let forwards = [
            Transform::scale(7.0, 7.0),
            Transform::rotate(0.9),
            Transform::rotate(0.9).then(&Transform::scale(7.0, 3.0)),
        ];
        for t in forwards {
            let inverse = t.inverse().unwrap();
            let s = GradientSampler::new(&g, inverse).unwrap();
            assert!(s.is_incremental(), "{t:?}");
            let mut fast = vec![[0u16; 4]; 96];
            s.fetch(-20, 11, &mut fast);
            for (i, px) in fast.iter().enumerate() {
                let (u, v) = inverse.map(-20.0 + i as f64 + 0.5, 11.5);
                let t = s.param(u, v).unwrap();
                let expected = s.table().entry::<u16>(GradientTable::index(t, Spread::Pad));
                // One table step apart at most.
                assert!(px.iter().zip(&expected).all(|(a, b)| a.abs_diff(*b) <= 200), "{i}");
            }
        }
    }

    #[test]
    fn test_projective_linear_maps_each_pixel() {
        let g = white_to_black();
        let p = Transform::from_rows([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.01, 0.0, 1.0]]);
        let s = GradientSampler::new(&g, p.inverse().unwrap()).unwrap();
        assert!(!s.is_incremental());
    }

    #[test]
    fn test_radial_simple() {
        let g = Gradient::radial((0.0, 0.0), 10.0);
        let s = GradientSampler::new(&g.with_stop(0.0, Color::WHITE), Transform::IDENTITY).unwrap();
        assert_relative_eq!(s.param(6.0, 8.0).unwrap(), 1.0);
        assert_relative_eq!(s.param(0.0, 5.0).unwrap(), 0.5);
    }

    #[test]
    fn test_radial_outside_cone_is_transparent() {
        // Focal circle larger than the outer circle and off to the side.
        let g = Gradient::radial_focal((0.0, 0.0), 1.0, (10.0, 0.0), 2.0)
            .with_stop(0.0, Color::WHITE);
        let s = GradientSampler::new(&g, Transform::IDENTITY).unwrap();
        assert_eq!(s.param(5.0, 50.0), None);
        let mut out = [[1u8; 4]; 1];
        s.fetch(5, 50, &mut out);
        assert_eq!(out[0], [0; 4]);
    }

    #[test]
    fn test_conical_quarter_turn() {
        let g = Gradient::conical((0.0, 0.0), 0.0).with_stop(0.0, Color::WHITE);
        let s = GradientSampler::new(&g, Transform::IDENTITY).unwrap();
        assert_relative_eq!(s.param(1.0, 0.0).unwrap(), 0.0);
        assert_relative_eq!(s.param(0.0, 1.0).unwrap(), 0.25);
        assert_relative_eq!(s.param(0.0, -1.0).unwrap(), 0.75);
    }
}
