//! 3x3 projective transform for paint coordinates.
//!
//! # Convention
//!
//! Matrices are stored in **row-major** order and use **column vectors**:
//!
//! ```text
//! | m00 m01 m02 |   | x |   | x' |
//! | m10 m11 m12 | * | y | = | y' |
//! | m20 m21 m22 |   | 1 |   | w  |
//! ```
//!
//! The mapped point is `(x' / w, y' / w)`. A transform is affine when the
//! bottom row is `(0, 0, 1)`.
//!
//! # Usage
//!
//! ```rust
//! use spanpix_math::{Transform, TransformClass};
//!
//! let t = Transform::scale(2.0, 2.0).then(&Transform::translate(10.0, 0.0));
//! assert_eq!(t.classify(), TransformClass::Scale);
//! assert_eq!(t.map(1.0, 1.0), (12.0, 2.0));
//!
//! let inv = t.inverse().unwrap();
//! assert_eq!(inv.map(12.0, 2.0), (1.0, 1.0));
//! ```

use glam::{DMat3, DVec3};

/// Determinant magnitude below which a transform is treated as singular.
const SINGULAR_EPSILON: f64 = 1e-12;

/// Structural class of a transform, from cheapest to most general.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TransformClass {
    /// No change.
    Identity,
    /// Pure translation.
    Translate,
    /// Axis-aligned scale plus translation.
    Scale,
    /// Rotation, shear or any other affine map.
    Affine,
    /// Non-trivial bottom row; needs a per-point divide.
    Projective,
}

/// A 3x3 projective transform.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Transform {
    /// Elements in row-major order: [row0, row1, row2]
    pub m: [[f64; 3]; 3],
}

impl Transform {
    /// Identity transform.
    pub const IDENTITY: Self = Self {
        m: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
    };

    /// Creates a transform from row arrays.
    #[inline]
    pub const fn from_rows(rows: [[f64; 3]; 3]) -> Self {
        Self { m: rows }
    }

    /// Affine transform `x' = a*x + c*y + e`, `y' = b*x + d*y + f`.
    #[inline]
    pub const fn affine(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self::from_rows([[a, c, e], [b, d, f], [0.0, 0.0, 1.0]])
    }

    /// Translation.
    pub const fn translate(dx: f64, dy: f64) -> Self {
        Self::affine(1.0, 0.0, 0.0, 1.0, dx, dy)
    }

    /// Axis-aligned scale.
    pub const fn scale(sx: f64, sy: f64) -> Self {
        Self::affine(sx, 0.0, 0.0, sy, 0.0, 0.0)
    }

    /// Counter-clockwise rotation about the origin (y axis pointing down).
    pub fn rotate(radians: f64) -> Self {
        let (s, c) = radians.sin_cos();
        Self::affine(c, s, -s, c, 0.0, 0.0)
    }

    /// Shear along both axes.
    pub const fn shear(sh: f64, sv: f64) -> Self {
        Self::affine(1.0, sv, sh, 1.0, 0.0, 0.0)
    }

    /// Applies `self` first, then `next`.
    pub fn then(&self, next: &Transform) -> Transform {
        Self::from_glam(next.to_glam() * self.to_glam())
    }

    /// Maps a point in homogeneous coordinates, returning `(x', y', w)`.
    #[inline]
    pub fn map_homogeneous(&self, x: f64, y: f64) -> (f64, f64, f64) {
        let m = &self.m;
        (
            m[0][0] * x + m[0][1] * y + m[0][2],
            m[1][0] * x + m[1][1] * y + m[1][2],
            m[2][0] * x + m[2][1] * y + m[2][2],
        )
    }

    /// Maps a point, dividing by `w` when projective.
    #[inline]
    pub fn map(&self, x: f64, y: f64) -> (f64, f64) {
        let (px, py, w) = self.map_homogeneous(x, y);
        if self.is_affine() { (px, py) } else { (px / w, py / w) }
    }

    /// Returns `true` if the bottom row is `(0, 0, 1)`.
    #[inline]
    pub fn is_affine(&self) -> bool {
        self.m[2] == [0.0, 0.0, 1.0]
    }

    /// Returns true if all elements are finite (not NaN or infinite).
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.m.iter().flatten().all(|x| x.is_finite())
    }

    /// Determinant.
    #[inline]
    pub fn determinant(&self) -> f64 {
        self.to_glam().determinant()
    }

    /// Inverse, or `None` when singular or non-finite.
    pub fn inverse(&self) -> Option<Transform> {
        if !self.is_finite() {
            return None;
        }
        if self.is_affine() {
            return self.affine_inverse();
        }
        let g = self.to_glam();
        let det = g.determinant();
        if !det.is_finite() || det.abs() < SINGULAR_EPSILON {
            return None;
        }
        let inv = Self::from_glam(g.inverse());
        inv.is_finite().then_some(inv)
    }

    /// 2x3 inverse; the bottom row stays exactly `(0, 0, 1)`.
    fn affine_inverse(&self) -> Option<Transform> {
        let [[a, b, tx], [c, d, ty], _] = self.m;
        let det = a * d - b * c;
        if !det.is_finite() || det.abs() < SINGULAR_EPSILON {
            return None;
        }
        let inv_det = 1.0 / det;
        let (ia, ib) = (d * inv_det, -b * inv_det);
        let (ic, id) = (-c * inv_det, a * inv_det);
        let inv = Transform::from_rows([
            [ia, ib, -(ia * tx + ib * ty)],
            [ic, id, -(ic * tx + id * ty)],
            [0.0, 0.0, 1.0],
        ]);
        inv.is_finite().then_some(inv)
    }

    /// Structural class.
    pub fn classify(&self) -> TransformClass {
        let m = &self.m;
        if !self.is_affine() {
            TransformClass::Projective
        } else if m[0][1] != 0.0 || m[1][0] != 0.0 {
            TransformClass::Affine
        } else if m[0][0] != 1.0 || m[1][1] != 1.0 {
            TransformClass::Scale
        } else if m[0][2] != 0.0 || m[1][2] != 0.0 {
            TransformClass::Translate
        } else {
            TransformClass::Identity
        }
    }

    /// Integer offsets if this is an identity or whole-pixel translation.
    pub fn integer_translation(&self) -> Option<(i64, i64)> {
        match self.classify() {
            TransformClass::Identity => Some((0, 0)),
            TransformClass::Translate => {
                let (dx, dy) = (self.m[0][2], self.m[1][2]);
                let whole = |v: f64| v.fract() == 0.0 && v.abs() < i32::MAX as f64;
                (whole(dx) && whole(dy)).then_some((dx as i64, dy as i64))
            }
            _ => None,
        }
    }

    /// Largest factor by which the linear part stretches a unit vector,
    /// estimated from the column lengths.
    pub fn max_scale(&self) -> f64 {
        let m = &self.m;
        let sx = m[0][0].hypot(m[1][0]);
        let sy = m[0][1].hypot(m[1][1]);
        sx.max(sy)
    }

    /// Returns `true` if the affine coefficients are small enough for
    /// 16.16 fixed-point stepping: every linear and translation term has
    /// magnitude below `limit`.
    pub fn is_fast_matrix(&self, limit: f64) -> bool {
        self.is_affine()
            && self.m[..2]
                .iter()
                .flatten()
                .all(|v| v.is_finite() && v.abs() < limit)
    }

    /// Converts to glam DMat3 (column-major).
    #[inline]
    pub fn to_glam(&self) -> DMat3 {
        let m = &self.m;
        DMat3::from_cols(
            DVec3::new(m[0][0], m[1][0], m[2][0]),
            DVec3::new(m[0][1], m[1][1], m[2][1]),
            DVec3::new(m[0][2], m[1][2], m[2][2]),
        )
    }

    /// Creates from glam DMat3.
    #[inline]
    pub fn from_glam(g: DMat3) -> Self {
        let c = g.to_cols_array_2d();
        Self::from_rows([
            [c[0][0], c[1][0], c[2][0]],
            [c[0][1], c[1][1], c[2][1]],
            [c[0][2], c[1][2], c[2][2]],
        ])
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_classify() {
        assert_eq!(Transform::IDENTITY.classify(), TransformClass::Identity);
        assert_eq!(Transform::translate(1.5, 0.0).classify(), TransformClass::Translate);
        assert_eq!(Transform::scale(2.0, 1.0).classify(), TransformClass::Scale);
        assert_eq!(Transform::shear(0.5, 0.0).classify(), TransformClass::Affine);
        let p = Transform::from_rows([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.001, 0.0, 1.0]]);
        assert_eq!(p.classify(), TransformClass::Projective);
    }

    #[test]
    fn test_integer_translation() {
        assert_eq!(Transform::translate(3.0, -2.0).integer_translation(), Some((3, -2)));
        assert_eq!(Transform::translate(0.5, 0.0).integer_translation(), None);
        assert_eq!(Transform::scale(2.0, 2.0).integer_translation(), None);
    }

    #[test]
    fn test_inverse_roundtrip() {
        let t = Transform::rotate(0.3)
            .then(&Transform::scale(1.5, 0.75))
            .then(&Transform::translate(7.0, -3.0));
        let inv = t.inverse().unwrap();
        let (x, y) = t.map(3.25, -1.5);
        let (bx, by) = inv.map(x, y);
        assert_relative_eq!(bx, 3.25, epsilon = 1e-9);
        assert_relative_eq!(by, -1.5, epsilon = 1e-9);
    }

    #[test]
    fn test_affine_inverse_stays_affine() {
        let cases = [
            Transform::scale(7.0, 7.0),
            Transform::scale(3.0, 49.0),
            Transform::rotate(0.7),
            Transform::rotate(1.1).then(&Transform::scale(7.0, 5.0)),
            Transform::scale(7.0, 7.0).then(&Transform::translate(13.0, -2.5)),
        ];
        for t in cases {
            let inv = t.inverse().unwrap();
            assert_eq!(inv.m[2], [0.0, 0.0, 1.0], "{t:?}");
            assert_ne!(inv.classify(), TransformClass::Projective);
            let (x, y) = t.map(4.5, -8.25);
            let (bx, by) = inv.map(x, y);
            assert_relative_eq!(bx, 4.5, epsilon = 1e-9);
            assert_relative_eq!(by, -8.25, epsilon = 1e-9);
        }
        assert_eq!(
            Transform::scale(7.0, 7.0).inverse().unwrap().classify(),
            TransformClass::Scale
        );
    }

    #[test]
    fn test_projective_inverse() {
        let p = Transform::from_rows([[1.0, 0.2, 3.0], [0.0, 1.0, 0.0], [0.001, 0.002, 1.0]]);
        let inv = p.inverse().unwrap();
        let (x, y) = p.map(10.0, 20.0);
        let (bx, by) = inv.map(x, y);
        assert_relative_eq!(bx, 10.0, epsilon = 1e-9);
        assert_relative_eq!(by, 20.0, epsilon = 1e-9);
    }

    #[test]
    fn test_singular() {
        assert!(Transform::scale(0.0, 1.0).inverse().is_none());
        assert!(Transform::translate(f64::NAN, 0.0).inverse().is_none());
    }

    #[test]
    fn test_fast_matrix() {
        assert!(Transform::scale(2.0, 2.0).is_fast_matrix(1e4));
        assert!(!Transform::translate(2e4, 0.0).is_fast_matrix(1e4));
        let p = Transform::from_rows([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.5, 0.0, 1.0]]);
        assert!(!p.is_fast_matrix(1e4));
    }

    #[test]
    fn test_max_scale() {
        assert_relative_eq!(Transform::scale(3.0, 0.5).max_scale(), 3.0);
        assert_relative_eq!(Transform::rotate(1.0).max_scale(), 1.0, epsilon = 1e-12);
    }
}
