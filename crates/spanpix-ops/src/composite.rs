//! Compositing functions on canonical premultiplied pixels.
//!
//! Every [`CompositionMode`] has, for each precision tier, a solid variant
//! ([`SolidFn`], one color across a run) and an array variant ([`ArrayFn`],
//! one source pixel per destination pixel). Both blend in place into the
//! destination run.
//!
//! # Coverage
//!
//! Coverage `0` leaves the destination untouched. For
//! [`SourceOver`](CompositionMode::SourceOver),
//! [`DestinationOver`](CompositionMode::DestinationOver),
//! [`SourceAtop`](CompositionMode::SourceAtop) and
//! [`Xor`](CompositionMode::Xor) the source is scaled by coverage before
//! blending. Every other mode blends at full strength and interpolates the
//! result with the old destination by coverage.
//!
//! # Porter-Duff Operations
//!
//! `Clear`, `Source`, `Destination`, the `*Over`, `*In`, `*Out`, `*Atop`
//! pairs and `Xor`.
//!
//! # Blend Modes
//!
//! `Plus` (saturating add) and the separable modes `Multiply` through
//! `Exclusion`. Their alpha is `sa + da - sa * da`.
//!
//! # Example
//!
//! ```rust
//! use spanpix_ops::composite::{CompositionMode, CompositionTable};
//!
//! let table = CompositionTable::<u8>::scalar();
//! let mut dst = [[0, 0, 255, 255]; 4];
//! table.solid(CompositionMode::SourceOver)(&mut dst, [255, 0, 0, 255], 128);
//! assert_eq!(dst[0], [128, 0, 127, 255]);
//! ```

use std::array;
use std::fmt;
use std::str::FromStr;

use spanpix_core::channel::Accum;
use spanpix_core::Channel;

use crate::error::OpsError;

/// Blends one color into a destination run.
pub type SolidFn<C> = fn(dst: &mut [[C; 4]], color: [C; 4], coverage: u8);

/// Blends a source run into a destination run of the same length.
pub type ArrayFn<C> = fn(dst: &mut [[C; 4]], src: &[[C; 4]], coverage: u8);

/// Per-pixel blend of one mode.
trait BlendOp {
    /// Source is scaled by coverage instead of interpolating the result.
    const SCALES_SOURCE: bool;

    fn blend<C: Channel>(s: [C; 4], d: [C; 4]) -> [C; 4];
}

// ============================================================================
// Modes
// ============================================================================

macro_rules! composition_modes {
    ($($variant:ident => $name:literal,)+) => {
        /// How source and destination combine.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        #[repr(u8)]
        pub enum CompositionMode {
            $(
                #[doc = concat!("`", $name, "`")]
                $variant,
            )+
        }

        impl CompositionMode {
            /// Every mode, in [`CompositionMode::index`] order.
            pub const ALL: &'static [CompositionMode] = &[$(CompositionMode::$variant,)+];

            /// Number of modes.
            pub const COUNT: usize = Self::ALL.len();

            /// Lowercase hyphenated name.
            pub const fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)+
                }
            }

            /// Returns `true` if the source is scaled by coverage before blending.
            pub const fn scales_source(self) -> bool {
                match self {
                    $(Self::$variant => <op::$variant as BlendOp>::SCALES_SOURCE,)+
                }
            }
        }

        impl<C: Channel> CompositionTable<C> {
            /// Portable scalar functions for every mode.
            pub fn scalar() -> Self {
                Self {
                    solid: [$(composite_solid::<C, op::$variant> as SolidFn<C>,)+],
                    array: [$(composite_array::<C, op::$variant> as ArrayFn<C>,)+],
                }
            }
        }
    };
}

composition_modes! {
    Clear => "clear",
    Source => "source",
    Destination => "destination",
    SourceOver => "source-over",
    DestinationOver => "destination-over",
    SourceIn => "source-in",
    DestinationIn => "destination-in",
    SourceOut => "source-out",
    DestinationOut => "destination-out",
    SourceAtop => "source-atop",
    DestinationAtop => "destination-atop",
    Xor => "xor",
    Plus => "plus",
    Multiply => "multiply",
    Screen => "screen",
    Overlay => "overlay",
    Darken => "darken",
    Lighten => "lighten",
    ColorDodge => "color-dodge",
    ColorBurn => "color-burn",
    HardLight => "hard-light",
    SoftLight => "soft-light",
    Difference => "difference",
    Exclusion => "exclusion",
}

impl CompositionMode {
    /// Position in [`CompositionMode::ALL`].
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Returns `false` if the result at full coverage ignores the destination.
    #[inline]
    pub const fn reads_destination(self) -> bool {
        !matches!(self, Self::Clear | Self::Source)
    }
}

impl Default for CompositionMode {
    fn default() -> Self {
        Self::SourceOver
    }
}

impl fmt::Display for CompositionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CompositionMode {
    type Err = OpsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        CompositionMode::ALL
            .iter()
            .copied()
            .find(|m| m.name() == wanted)
            .ok_or_else(|| OpsError::UnknownMode(s.to_string()))
    }
}

// ============================================================================
// Table
// ============================================================================

/// Solid and array functions for every mode at one tier.
#[derive(Clone, Copy)]
pub struct CompositionTable<C: Channel> {
    solid: [SolidFn<C>; CompositionMode::COUNT],
    array: [ArrayFn<C>; CompositionMode::COUNT],
}

impl<C: Channel> CompositionTable<C> {
    /// Solid variant of `mode`.
    #[inline]
    pub fn solid(&self, mode: CompositionMode) -> SolidFn<C> {
        self.solid[mode.index()]
    }

    /// Array variant of `mode`.
    #[inline]
    pub fn array(&self, mode: CompositionMode) -> ArrayFn<C> {
        self.array[mode.index()]
    }

    /// Replaces the solid variant of `mode`.
    pub fn set_solid(&mut self, mode: CompositionMode, f: SolidFn<C>) {
        self.solid[mode.index()] = f;
    }

    /// Replaces the array variant of `mode`.
    pub fn set_array(&mut self, mode: CompositionMode, f: ArrayFn<C>) {
        self.array[mode.index()] = f;
    }
}

impl<C: Channel> fmt::Debug for CompositionTable<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositionTable")
            .field("tier", &C::TIER)
            .field("modes", &CompositionMode::COUNT)
            .finish()
    }
}

// ============================================================================
// Drivers
// ============================================================================

#[inline]
fn scale<C: Channel>(px: [C; 4], coverage: u8) -> [C; 4] {
    let c = C::from_coverage(coverage);
    px.map(|v| v.mul(c))
}

#[inline]
fn lerp<C: Channel>(a: [C; 4], b: [C; 4], coverage: u8) -> [C; 4] {
    array::from_fn(|i| C::lerp(a[i], b[i], coverage))
}

fn composite_solid<C: Channel, O: BlendOp>(dst: &mut [[C; 4]], color: [C; 4], coverage: u8) {
    match coverage {
        0 => {}
        255 => dst.iter_mut().for_each(|d| *d = O::blend(color, *d)),
        c if O::SCALES_SOURCE => {
            let s = scale(color, c);
            dst.iter_mut().for_each(|d| *d = O::blend(s, *d));
        }
        c => dst.iter_mut().for_each(|d| *d = lerp(O::blend(color, *d), *d, c)),
    }
}

fn composite_array<C: Channel, O: BlendOp>(dst: &mut [[C; 4]], src: &[[C; 4]], coverage: u8) {
    let pairs = dst.iter_mut().zip(src);
    match coverage {
        0 => {}
        255 => pairs.for_each(|(d, s)| *d = O::blend(*s, *d)),
        c if O::SCALES_SOURCE => pairs.for_each(|(d, s)| *d = O::blend(scale(*s, c), *d)),
        c => pairs.for_each(|(d, s)| *d = lerp(O::blend(*s, *d), *d, c)),
    }
}

// ============================================================================
// Per-pixel math
// ============================================================================

#[inline]
fn full<C: Channel>(v: C) -> C::Acc {
    C::prod(v, C::MAX)
}

#[inline]
fn acc_max<A: PartialOrd>(a: A, b: A) -> A {
    if a >= b { a } else { b }
}

#[inline]
fn acc_min<A: PartialOrd>(a: A, b: A) -> A {
    if a <= b { a } else { b }
}

/// `a * fa + b * fb` per channel.
#[inline]
fn weighted<C: Channel>(a: [C; 4], fa: C, b: [C; 4], fb: C) -> [C; 4] {
    array::from_fn(|i| C::norm(C::prod(a[i], fa) + C::prod(b[i], fb)))
}

/// `sa + da - sa * da`.
#[inline]
fn union_alpha<C: Channel>(sa: C, da: C) -> C {
    C::norm((full(sa) + full(da)).sub_sat(C::prod(sa, da)))
}

/// Applies `f(s, d, sa, da)` to the color channels.
#[inline]
fn separable<C: Channel>(s: [C; 4], d: [C; 4], f: impl Fn(C, C, C, C) -> C) -> [C; 4] {
    let (sa, da) = (s[3], d[3]);
    [f(s[0], d[0], sa, da), f(s[1], d[1], sa, da), f(s[2], d[2], sa, da), union_alpha(sa, da)]
}

/// `s * (1 - da) + d * (1 - sa)`.
#[inline]
fn outside<C: Channel>(s: C, d: C, sa: C, da: C) -> C::Acc {
    C::prod(s, da.inv()) + C::prod(d, sa.inv())
}

#[inline]
fn via_f32<C: Channel>(s: C, d: C, sa: C, da: C, f: fn(f32, f32, f32, f32) -> f32) -> C {
    C::from_f32(f(s.to_f32(), d.to_f32(), sa.to_f32(), da.to_f32()))
}

fn color_dodge(s: f32, d: f32, sa: f32, da: f32) -> f32 {
    let sa_da = sa * da;
    let d_sa = d * sa;
    let rest = s * (1.0 - da) + d * (1.0 - sa);
    if s * da + d_sa > sa_da {
        sa_da + rest
    } else if s == sa || sa == 0.0 {
        rest
    } else {
        d_sa * sa / (sa - s) + rest
    }
}

fn color_burn(s: f32, d: f32, sa: f32, da: f32) -> f32 {
    let sa_da = sa * da;
    let s_da = s * da;
    let d_sa = d * sa;
    let rest = s * (1.0 - da) + d * (1.0 - sa);
    if s_da + d_sa < sa_da {
        rest
    } else if s == 0.0 {
        d_sa + rest
    } else {
        sa * (s_da + d_sa - sa_da) / s + rest
    }
}

fn soft_light(s: f32, d: f32, sa: f32, da: f32) -> f32 {
    let s2 = s * 2.0;
    let dn = if da != 0.0 { d / da } else { 0.0 };
    let rest = s * (1.0 - da) + d * (1.0 - sa);
    if s2 < sa {
        d * (sa + (s2 - sa) * (1.0 - dn)) + rest
    } else if 4.0 * d <= da {
        d * sa + da * (s2 - sa) * (((16.0 * dn - 12.0) * dn + 3.0) * dn) + rest
    } else {
        d * sa + da * (s2 - sa) * (dn.sqrt() - dn) + rest
    }
}

#[inline]
fn hard_light_channel<C: Channel>(s: C, d: C, sa: C, da: C) -> C {
    let rest = outside(s, d, sa, da);
    if full(s).twice() <= full(sa) {
        C::norm(C::prod(s, d).twice() + rest)
    } else {
        let screen = C::prod(da.sub_sat(d), sa.sub_sat(s)).twice();
        C::norm((C::prod(sa, da) + rest).sub_sat(screen))
    }
}

mod op {
    use super::*;

    macro_rules! blend_op {
        ($name:ident, $scales:expr, |$s:ident, $d:ident| $body:expr) => {
            pub(super) struct $name;

            impl BlendOp for $name {
                const SCALES_SOURCE: bool = $scales;

                #[inline]
                fn blend<C: Channel>($s: [C; 4], $d: [C; 4]) -> [C; 4] {
                    $body
                }
            }
        };
    }

    blend_op!(Clear, false, |_s, _d| [C::ZERO; 4]);
    blend_op!(Source, false, |s, _d| s);
    blend_op!(Destination, false, |_s, d| d);
    blend_op!(SourceOver, true, |s, d| {
        let ia = s[3].inv();
        array::from_fn(|i| s[i].add_sat(d[i].mul(ia)))
    });
    blend_op!(DestinationOver, true, |s, d| {
        let ia = d[3].inv();
        array::from_fn(|i| d[i].add_sat(s[i].mul(ia)))
    });
    blend_op!(SourceIn, false, |s, d| s.map(|c| c.mul(d[3])));
    blend_op!(DestinationIn, false, |s, d| d.map(|c| c.mul(s[3])));
    blend_op!(SourceOut, false, |s, d| s.map(|c| c.mul(d[3].inv())));
    blend_op!(DestinationOut, false, |s, d| d.map(|c| c.mul(s[3].inv())));
    blend_op!(SourceAtop, true, |s, d| weighted(s, d[3], d, s[3].inv()));
    blend_op!(DestinationAtop, false, |s, d| weighted(d, s[3], s, d[3].inv()));
    blend_op!(Xor, true, |s, d| weighted(s, d[3].inv(), d, s[3].inv()));
    blend_op!(Plus, false, |s, d| array::from_fn(|i| s[i].plus(d[i])));
    blend_op!(Multiply, false, |s, d| separable(s, d, |s, d, sa, da| {
        C::norm(C::prod(s, d) + outside(s, d, sa, da))
    }));
    blend_op!(Screen, false, |s, d| separable(s, d, |s, d, _, _| {
        C::norm((full(s) + full(d)).sub_sat(C::prod(s, d)))
    }));
    blend_op!(Overlay, false, |s, d| separable(s, d, |s, d, sa, da| {
        hard_light_channel(d, s, da, sa)
    }));
    blend_op!(Darken, false, |s, d| separable(s, d, |s, d, sa, da| {
        C::norm((full(s) + full(d)).sub_sat(acc_max(C::prod(s, da), C::prod(d, sa))))
    }));
    blend_op!(Lighten, false, |s, d| separable(s, d, |s, d, sa, da| {
        C::norm((full(s) + full(d)).sub_sat(acc_min(C::prod(s, da), C::prod(d, sa))))
    }));
    blend_op!(ColorDodge, false, |s, d| separable(s, d, |s, d, sa, da| {
        via_f32(s, d, sa, da, color_dodge)
    }));
    blend_op!(ColorBurn, false, |s, d| separable(s, d, |s, d, sa, da| {
        via_f32(s, d, sa, da, color_burn)
    }));
    blend_op!(HardLight, false, |s, d| separable(s, d, hard_light_channel));
    blend_op!(SoftLight, false, |s, d| separable(s, d, |s, d, sa, da| {
        via_f32(s, d, sa, da, soft_light)
    }));
    blend_op!(Difference, false, |s, d| separable(s, d, |s, d, sa, da| {
        let overlap = acc_min(C::prod(s, da), C::prod(d, sa));
        C::norm((full(s) + full(d)).sub_sat(overlap.twice()))
    }));
    blend_op!(Exclusion, false, |s, d| separable(s, d, |s, d, _, _| {
        C::norm((full(s) + full(d)).sub_sat(C::prod(s, d).twice()))
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const RED: [u8; 4] = [255, 0, 0, 255];
    const BLUE: [u8; 4] = [0, 0, 255, 255];

    fn blend8(mode: CompositionMode, s: [u8; 4], d: [u8; 4], coverage: u8) -> [u8; 4] {
        let mut dst = [d];
        CompositionTable::<u8>::scalar().array(mode)(&mut dst, &[s], coverage);
        dst[0]
    }

    fn blendf(mode: CompositionMode, s: [f32; 4], d: [f32; 4]) -> [f32; 4] {
        let mut dst = [d];
        CompositionTable::<f32>::scalar().solid(mode)(&mut dst, s, 255);
        dst[0]
    }

    #[test]
    fn test_names_roundtrip() {
        assert_eq!(CompositionMode::COUNT, 24);
        for (i, m) in CompositionMode::ALL.iter().enumerate() {
            assert_eq!(m.index(), i);
            assert_eq!(m.name().parse::<CompositionMode>().unwrap(), *m);
        }
        assert_eq!("Source_Over".parse::<CompositionMode>().unwrap(), CompositionMode::SourceOver);
        assert!("dissolve".parse::<CompositionMode>().is_err());
    }

    #[test]
    fn test_default_is_source_over() {
        assert_eq!(CompositionMode::default(), CompositionMode::SourceOver);
    }

    #[test]
    fn test_source_over_half_coverage() {
        assert_eq!(blend8(CompositionMode::SourceOver, RED, BLUE, 128), [128, 0, 127, 255]);
    }

    #[test]
    fn test_zero_coverage_is_identity() {
        let d = [10, 20, 30, 40];
        for &mode in CompositionMode::ALL {
            assert_eq!(blend8(mode, RED, d, 0), d, "{mode}");
            let mut dst = [[0.25f32, 0.5, 0.75, 1.0]];
            CompositionTable::<f32>::scalar().solid(mode)(&mut dst, [1.0; 4], 0);
            assert_eq!(dst[0], [0.25, 0.5, 0.75, 1.0], "{mode}");
        }
    }

    #[test]
    fn test_source_full_coverage_is_copy() {
        let s = [12, 34, 56, 78];
        assert_eq!(blend8(CompositionMode::Source, s, BLUE, 255), s);
        let mut dst = [[9u16; 4]; 3];
        let source = CompositionTable::<u16>::scalar().solid(CompositionMode::Source);
        source(&mut dst, [1, 2, 3, 4], 255);
        assert_eq!(dst, [[1, 2, 3, 4]; 3]);
    }

    #[test]
    fn test_porter_duff_opaque() {
        use CompositionMode::*;
        assert_eq!(blend8(Clear, RED, BLUE, 255), [0; 4]);
        assert_eq!(blend8(Destination, RED, BLUE, 255), BLUE);
        assert_eq!(blend8(DestinationOver, RED, BLUE, 255), BLUE);
        assert_eq!(blend8(SourceIn, RED, BLUE, 255), RED);
        assert_eq!(blend8(SourceOut, RED, BLUE, 255), [0; 4]);
        assert_eq!(blend8(SourceAtop, RED, BLUE, 255), RED);
        assert_eq!(blend8(Xor, RED, BLUE, 255), [0; 4]);
    }

    #[test]
    fn test_porter_duff_translucent() {
        use CompositionMode::*;
        let half = [128, 0, 0, 128];
        assert_eq!(blend8(SourceIn, half, [0, 0, 0, 0], 255), [0; 4]);
        assert_eq!(blend8(DestinationOut, half, BLUE, 255), [0, 0, 127, 127]);
        assert_eq!(blend8(Xor, half, [0; 4], 255), half);
    }

    #[test]
    fn test_plus_saturates() {
        assert_eq!(
            blend8(CompositionMode::Plus, [200, 100, 0, 200], [100, 100, 0, 100], 255),
            [255, 200, 0, 255]
        );
    }

    #[test]
    fn test_multiply_and_screen_opaque() {
        let s = [255, 128, 0, 255];
        let d = [128, 128, 128, 255];
        assert_eq!(blend8(CompositionMode::Multiply, s, d, 255), [128, 64, 0, 255]);
        assert_eq!(
            blend8(CompositionMode::Screen, [0, 128, 255, 255], d, 255),
            [128, 192, 255, 255]
        );
    }

    #[test]
    fn test_darken_lighten_difference() {
        let s = [200, 50, 0, 255];
        let d = [100, 100, 100, 255];
        assert_eq!(blend8(CompositionMode::Darken, s, d, 255), [100, 50, 0, 255]);
        assert_eq!(blend8(CompositionMode::Lighten, s, d, 255), [200, 100, 100, 255]);
        assert_eq!(blend8(CompositionMode::Difference, s, d, 255), [100, 50, 100, 255]);
    }

    #[test]
    fn test_separable_alpha_is_union() {
        let out = blend8(CompositionMode::Multiply, [0, 0, 0, 128], [0, 0, 0, 128], 255);
        assert_eq!(out[3], 192);
    }

    #[test]
    fn test_overlay_and_hard_light_float() {
        let s = [0.25, 0.75, 0.5, 1.0];
        let d = [0.5, 0.5, 0.25, 1.0];
        let hard = blendf(CompositionMode::HardLight, s, d);
        assert_relative_eq!(hard[0], 0.25, epsilon = 1e-6);
        assert_relative_eq!(hard[1], 0.75, epsilon = 1e-6);
        let overlay = blendf(CompositionMode::Overlay, s, d);
        assert_relative_eq!(overlay[0], 0.25, epsilon = 1e-6);
        assert_relative_eq!(overlay[2], 0.25, epsilon = 1e-6);
        assert_relative_eq!(overlay[3], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_dodge_burn_soft_light() {
        let out = blendf(CompositionMode::ColorDodge, [0.5, 1.0, 0.0, 1.0], [0.25, 0.0, 0.5, 1.0]);
        assert_relative_eq!(out[0], 0.5, epsilon = 1e-6);
        assert_relative_eq!(out[1], 0.0, epsilon = 1e-6);
        assert_relative_eq!(out[2], 0.5, epsilon = 1e-6);

        let out = blendf(CompositionMode::ColorBurn, [0.5, 0.0, 1.0, 1.0], [0.75, 0.5, 0.5, 1.0]);
        assert_relative_eq!(out[0], 0.5, epsilon = 1e-6);
        assert_relative_eq!(out[1], 0.0, epsilon = 1e-6);
        assert_relative_eq!(out[2], 0.5, epsilon = 1e-6);

        let out = blendf(CompositionMode::SoftLight, [0.5, 0.5, 0.5, 1.0], [0.3, 0.6, 0.9, 1.0]);
        assert_relative_eq!(out[0], 0.3, epsilon = 1e-6);
        assert_relative_eq!(out[2], 0.9, epsilon = 1e-6);
    }

    #[test]
    fn test_lerp_modes_interpolate_by_coverage() {
        let out = blend8(CompositionMode::Source, RED, BLUE, 128);
        assert_eq!(out, [128, 0, 127, 255]);
        let out = blend8(CompositionMode::Clear, RED, [200, 200, 200, 200], 64);
        assert_eq!(out, [150, 150, 150, 150]);
    }

    #[test]
    fn test_solid_matches_array() {
        let table = CompositionTable::<u16>::scalar();
        let color = [30000u16, 12000, 500, 40000];
        for &mode in CompositionMode::ALL {
            let mut a = [[1000u16, 20000, 30000, 50000]; 3];
            let mut b = a;
            table.solid(mode)(&mut a, color, 77);
            table.array(mode)(&mut b, &[color; 3], 77);
            assert_eq!(a, b, "{mode}");
        }
    }

    #[test]
    fn test_scales_source_set() {
        use CompositionMode::*;
        let scaled: Vec<_> = CompositionMode::ALL.iter().filter(|m| m.scales_source()).collect();
        assert_eq!(scaled, [&SourceOver, &DestinationOver, &SourceAtop, &Xor]);
    }
}
