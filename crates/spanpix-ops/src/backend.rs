//! Capability-based backend selection.
//!
//! A [`Backend`] bundles every routine a draw call dispatches through: the
//! format registry, the composition tables of each tier and the sampling
//! kernels. [`Backend::build`] starts from the portable scalar routines and
//! substitutes vectorized ones that the detected CPU supports. The
//! substitutes produce exactly the same bytes as the scalar code.
//!
//! The process-wide backend is installed once, by [`init_backend`] with an
//! injected [`CpuFeatureDetector`] or lazily by [`backend`] with
//! [`HostCpu`], and is read-only afterwards.
//!
//! # Example
//!
//! ```rust
//! use spanpix_ops::backend::{Backend, CpuCaps};
//!
//! let scalar = Backend::build(CpuCaps::NONE);
//! assert!(scalar.substituted().is_empty());
//!
//! let vector = Backend::build(CpuCaps { sse2: true, ..CpuCaps::NONE });
//! assert!(vector.substituted().contains(&"source-over/u8/array"));
//! ```

use std::fmt;
use std::sync::OnceLock;

use spanpix_core::config::simd_disabled;
use spanpix_core::{Channel, FormatRegistry, PixelFormat};
use spanpix_math::simd;
use tracing::debug;

use crate::composite::{CompositionMode, CompositionTable};
use crate::texture::{bilinear_scalar, BilinearFn};

/// Vector instruction sets relevant to the kernels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CpuCaps {
    /// x86 SSE2.
    pub sse2: bool,
    /// x86 SSE4.1.
    pub sse4_1: bool,
    /// x86 AVX2.
    pub avx2: bool,
    /// ARM NEON.
    pub neon: bool,
}

impl CpuCaps {
    /// No vector support; selects the scalar routines only.
    pub const NONE: CpuCaps = CpuCaps {
        sse2: false,
        sse4_1: false,
        avx2: false,
        neon: false,
    };

    /// Returns `true` if 128-bit integer and float vectors are available.
    pub fn has_vector(&self) -> bool {
        self.sse2 || self.neon
    }

    /// Names of the supported instruction sets.
    pub fn names(&self) -> Vec<&'static str> {
        [
            (self.sse2, "sse2"),
            (self.sse4_1, "sse4.1"),
            (self.avx2, "avx2"),
            (self.neon, "neon"),
        ]
        .into_iter()
        .filter_map(|(on, name)| on.then_some(name))
        .collect()
    }
}

impl fmt::Display for CpuCaps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = self.names();
        if names.is_empty() {
            f.write_str("scalar")
        } else {
            f.write_str(&names.join(" "))
        }
    }
}

/// Reports the capabilities a backend may rely on.
pub trait CpuFeatureDetector {
    /// Detected capabilities.
    fn detect(&self) -> CpuCaps;
}

/// Runtime detection on the current CPU.
///
/// Reports [`CpuCaps::NONE`] when `SPANPIX_DISABLE_SIMD` is set.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostCpu;

impl CpuFeatureDetector for HostCpu {
    fn detect(&self) -> CpuCaps {
        if simd_disabled() {
            debug!("vector routines disabled via SPANPIX_DISABLE_SIMD");
            return CpuCaps::NONE;
        }
        host_caps()
    }
}

#[cfg(target_arch = "x86_64")]
fn host_caps() -> CpuCaps {
    CpuCaps {
        sse2: is_x86_feature_detected!("sse2"),
        sse4_1: is_x86_feature_detected!("sse4.1"),
        avx2: is_x86_feature_detected!("avx2"),
        neon: false,
    }
}

#[cfg(target_arch = "aarch64")]
fn host_caps() -> CpuCaps {
    CpuCaps {
        neon: std::arch::is_aarch64_feature_detected!("neon"),
        ..CpuCaps::NONE
    }
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
fn host_caps() -> CpuCaps {
    CpuCaps::NONE
}

/// Fixed capabilities, for tests and reproducible runs.
#[derive(Debug, Clone, Copy)]
pub struct FixedCaps(pub CpuCaps);

impl CpuFeatureDetector for FixedCaps {
    fn detect(&self) -> CpuCaps {
        self.0
    }
}

// ============================================================================
// Backend
// ============================================================================

/// Routines used by every draw call.
#[derive(Clone)]
pub struct Backend {
    caps: CpuCaps,
    registry: FormatRegistry,
    composite8: CompositionTable<u8>,
    composite16: CompositionTable<u16>,
    composite_f32: CompositionTable<f32>,
    bilinear8: BilinearFn<u8>,
    substituted: Vec<&'static str>,
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backend")
            .field("caps", &self.caps)
            .field("substituted", &self.substituted)
            .finish()
    }
}

impl Backend {
    /// Builds a backend for `caps`.
    pub fn build(caps: CpuCaps) -> Self {
        let mut backend = Self {
            caps,
            registry: FormatRegistry::scalar().clone(),
            composite8: CompositionTable::scalar(),
            composite16: CompositionTable::scalar(),
            composite_f32: CompositionTable::scalar(),
            bilinear8: bilinear_scalar::<u8>,
            substituted: Vec::new(),
        };
        if caps.has_vector() {
            backend.install_vector();
        }
        debug!(caps = %caps, substituted = backend.substituted.len(), "built compositing backend");
        backend
    }

    /// Backend with only the portable routines.
    pub fn scalar() -> Self {
        Self::build(CpuCaps::NONE)
    }

    fn install_vector(&mut self) {
        use PixelFormat::{Argb32Premultiplied, Rgb32};

        self.registry.set_fetch8(Argb32Premultiplied, simd::fetch_argb32);
        self.registry.set_store8(Argb32Premultiplied, simd::store_argb32);
        self.registry.set_fetch8(Rgb32, simd::fetch_rgb32);
        self.registry.set_store8(Rgb32, simd::store_rgb32);
        self.substituted.extend([
            "fetch8/argb32-pm",
            "store8/argb32-pm",
            "fetch8/rgb32",
            "store8/rgb32",
        ]);

        let over = CompositionMode::SourceOver;
        self.composite8.set_solid(over, simd::source_over_solid_rgba8);
        self.composite8.set_array(over, simd::source_over_rgba8);
        self.composite_f32.set_solid(over, simd::source_over_solid_rgbaf32);
        self.composite_f32.set_array(over, simd::source_over_rgbaf32);
        self.substituted.extend([
            "source-over/u8/solid",
            "source-over/u8/array",
            "source-over/f32/solid",
            "source-over/f32/array",
        ]);

        self.bilinear8 = simd::interpolate_4_rgba8;
        self.substituted.push("bilinear/u8");

        for name in &self.substituted {
            debug!(entry = *name, "substituted vector routine");
        }
    }

    /// Capabilities the backend was built for.
    pub fn caps(&self) -> CpuCaps {
        self.caps
    }

    /// Format conversion routines.
    pub fn registry(&self) -> &FormatRegistry {
        &self.registry
    }

    /// Composition functions of tier `C`.
    pub fn composition<C: TierKernels>(&self) -> &CompositionTable<C> {
        C::composition(self)
    }

    /// Four-texel blend of tier `C`.
    pub fn bilinear<C: TierKernels>(&self) -> BilinearFn<C> {
        C::bilinear_kernel(self)
    }

    /// Names of the entries replaced by vector routines.
    pub fn substituted(&self) -> &[&'static str] {
        &self.substituted
    }
}

/// Channel types with kernels in a [`Backend`].
pub trait TierKernels: Channel {
    /// Composition table of this tier.
    fn composition(backend: &Backend) -> &CompositionTable<Self>;

    /// Bilinear kernel of this tier.
    fn bilinear_kernel(backend: &Backend) -> BilinearFn<Self>;
}

impl TierKernels for u8 {
    fn composition(backend: &Backend) -> &CompositionTable<u8> {
        &backend.composite8
    }

    fn bilinear_kernel(backend: &Backend) -> BilinearFn<u8> {
        backend.bilinear8
    }
}

impl TierKernels for u16 {
    fn composition(backend: &Backend) -> &CompositionTable<u16> {
        &backend.composite16
    }

    fn bilinear_kernel(_: &Backend) -> BilinearFn<u16> {
        bilinear_scalar::<u16>
    }
}

impl TierKernels for f32 {
    fn composition(backend: &Backend) -> &CompositionTable<f32> {
        &backend.composite_f32
    }

    fn bilinear_kernel(_: &Backend) -> BilinearFn<f32> {
        bilinear_scalar::<f32>
    }
}

// ============================================================================
// Process-wide instance
// ============================================================================

static BACKEND: OnceLock<Backend> = OnceLock::new();

/// Installs the process-wide backend using `detector`.
///
/// Only the first call builds anything; later calls return the installed
/// backend unchanged.
pub fn init_backend(detector: &dyn CpuFeatureDetector) -> &'static Backend {
    let mut installed = false;
    let backend = BACKEND.get_or_init(|| {
        installed = true;
        Backend::build(detector.detect())
    });
    if !installed {
        debug!("compositing backend already initialized");
    }
    backend
}

/// The process-wide backend, detected from the host CPU on first use.
pub fn backend() -> &'static Backend {
    BACKEND.get_or_init(|| Backend::build(HostCpu.detect()))
}

/// One line per backend entry that differs from the scalar build.
pub fn describe(backend: &Backend) -> String {
    let mut desc = format!("caps: {}\n", backend.caps());
    for name in backend.substituted() {
        desc.push_str(&format!("[+] {name}\n"));
    }
    desc
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vector() -> Backend {
        Backend::build(CpuCaps {
            sse2: true,
            ..CpuCaps::NONE
        })
    }

    #[test]
    fn test_scalar_build_substitutes_nothing() {
        let b = Backend::scalar();
        assert!(b.substituted().is_empty());
        assert_eq!(b.caps().to_string(), "scalar");
    }

    #[test]
    fn test_fixed_caps() {
        let caps = CpuCaps {
            neon: true,
            ..CpuCaps::NONE
        };
        assert_eq!(FixedCaps(caps).detect(), caps);
        assert_eq!(caps.names(), ["neon"]);
        assert!(caps.has_vector());
    }

    #[test]
    fn test_vector_swizzle_matches_scalar() {
        let (s, v) = (Backend::scalar(), vector());
        let row: Vec<u8> = (0..=255u8).cycle().take(4 * 37).collect();
        for format in [PixelFormat::Argb32Premultiplied, PixelFormat::Rgb32] {
            let mut a = vec![[0u8; 4]; 35];
            let mut b = a.clone();
            s.registry().descriptor(format).fetch(&row, 2, &mut a);
            v.registry().descriptor(format).fetch(&row, 2, &mut b);
            assert_eq!(a, b, "{format}");

            let mut ra = vec![0u8; row.len()];
            let mut rb = ra.clone();
            s.registry().descriptor(format).store(&mut ra, 1, &a);
            v.registry().descriptor(format).store(&mut rb, 1, &b);
            assert_eq!(ra, rb, "{format}");
        }
    }

    #[test]
    fn test_vector_source_over_matches_scalar() {
        let (s, v) = (Backend::scalar(), vector());
        let src: Vec<[u8; 4]> = (0..19u32)
            .map(|i| {
                let a = (i * 13 % 256) as u8;
                [a / 2, a / 3, a, a]
            })
            .collect();
        for coverage in [1, 100, 255] {
            let mut a: Vec<[u8; 4]> = (0..19u8).map(|i| [i * 7, i * 3, 200, 255 - i]).collect();
            let mut b = a.clone();
            s.composition::<u8>().array(CompositionMode::SourceOver)(&mut a, &src, coverage);
            v.composition::<u8>().array(CompositionMode::SourceOver)(&mut b, &src, coverage);
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_vector_bilinear_matches_scalar() {
        let (s, v) = (Backend::scalar(), vector());
        let (tl, tr) = ([255, 0, 10, 255], [0, 255, 20, 200]);
        let (bl, br) = ([9, 8, 7, 6], [100, 100, 100, 100]);
        for (wx, wy) in [(0, 0), (128, 64), (255, 1), (16, 240)] {
            assert_eq!(
                s.bilinear::<u8>()(tl, tr, bl, br, wx, wy),
                v.bilinear::<u8>()(tl, tr, bl, br, wx, wy)
            );
        }
    }

    fn blend_midpoint<C: TierKernels>(backend: &Backend, lo: C, hi: C) -> C {
        let kernel = backend.bilinear::<C>();
        kernel([lo; 4], [hi; 4], [lo; 4], [hi; 4], 128, 0)[0]
    }

    #[test]
    fn test_bilinear_kernel_per_tier() {
        for b in [Backend::scalar(), vector()] {
            assert_eq!(blend_midpoint::<u8>(&b, 0, 254), 127);
            assert_eq!(blend_midpoint::<u16>(&b, 0, 65534), 32767);
            assert_eq!(blend_midpoint::<f32>(&b, 0.0, 1.0), 0.5);
        }
    }

    #[test]
    fn test_init_backend_is_idempotent() {
        let first = init_backend(&FixedCaps(CpuCaps::NONE));
        let second = init_backend(&FixedCaps(CpuCaps {
            avx2: true,
            ..CpuCaps::NONE
        }));
        assert!(std::ptr::eq(first, second));
        assert!(std::ptr::eq(first, backend()));
    }

    #[test]
    fn test_describe_lists_entries() {
        let text = describe(&vector());
        assert!(text.starts_with("caps: sse2"));
        assert!(text.contains("[+] bilinear/u8"));
    }
}
