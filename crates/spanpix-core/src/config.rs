//! Runtime tuning for the compositor.
//!
//! [`RasterConfig`] carries the thresholds that decide between code paths.
//! Defaults suit interactive rendering; each field can be overridden from
//! the environment with [`RasterConfig::from_env`]:
//!
//! - `SPANPIX_PARALLEL_MIN_PIXELS` - pixel volume at which a fill is split across workers
//! - `SPANPIX_THREADS` - cap on worker partitions (0 = pool size)
//! - `SPANPIX_BILINEAR_ZOOM` - scale factor above which bilinear weights drop to 4 bits
//! - `SPANPIX_DISABLE_SIMD` - skip vectorized backend routines ("1" or "true")

use std::env;
use std::sync::OnceLock;

/// Pixels staged per batch; bounds every stack scratch buffer.
pub const PAGE_SIZE: usize = 2048;

/// Compositor thresholds.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RasterConfig {
    /// Minimum total span pixels before work is partitioned across workers.
    pub parallel_threshold: u64,
    /// Maximum number of partitions (0 = one per pool worker).
    pub max_workers: usize,
    /// Zoom factor above which bilinear weights use 4 bits instead of 8.
    pub bilinear_high_zoom: f64,
    /// Largest affine coefficient magnitude eligible for 16.16 stepping.
    pub fast_matrix_limit: f64,
}

impl Default for RasterConfig {
    fn default() -> Self {
        Self {
            parallel_threshold: 1 << 16,
            max_workers: 0,
            bilinear_high_zoom: 8.0,
            fast_matrix_limit: 1e4,
        }
    }
}

impl RasterConfig {
    /// Defaults overridden by `SPANPIX_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(v) = env_parse::<u64>("SPANPIX_PARALLEL_MIN_PIXELS") {
            config.parallel_threshold = v;
        }
        if let Some(v) = env_parse::<usize>("SPANPIX_THREADS") {
            config.max_workers = v;
        }
        if let Some(v) =
            env_parse::<f64>("SPANPIX_BILINEAR_ZOOM").filter(|z| z.is_finite() && *z >= 1.0)
        {
            config.bilinear_high_zoom = v;
        }
        config
    }

    /// Process-wide configuration read from the environment once.
    pub fn global() -> &'static RasterConfig {
        static INSTANCE: OnceLock<RasterConfig> = OnceLock::new();
        INSTANCE.get_or_init(RasterConfig::from_env)
    }

    /// Sets the parallel threshold.
    pub fn with_parallel_threshold(mut self, pixels: u64) -> Self {
        self.parallel_threshold = pixels;
        self
    }

    /// Sets the partition cap.
    pub fn with_max_workers(mut self, workers: usize) -> Self {
        self.max_workers = workers;
        self
    }

    /// Sets the bilinear zoom cut-over.
    pub fn with_bilinear_high_zoom(mut self, zoom: f64) -> Self {
        self.bilinear_high_zoom = zoom;
        self
    }
}

/// Check if vectorized routines are disabled via environment.
pub fn simd_disabled() -> bool {
    env::var("SPANPIX_DISABLE_SIMD")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let c = RasterConfig::default();
        assert_eq!(c.parallel_threshold, 65536);
        assert_eq!(c.max_workers, 0);
        assert_eq!(c.bilinear_high_zoom, 8.0);
    }

    #[test]
    fn test_builders() {
        let c = RasterConfig::default().with_parallel_threshold(0).with_max_workers(3);
        assert_eq!(c.parallel_threshold, 0);
        assert_eq!(c.max_workers, 3);
    }

    #[test]
    fn test_unset_env_parses_to_none() {
        assert_eq!(env_parse::<u64>("SPANPIX_TEST_UNSET_VARIABLE"), None);
    }
}
