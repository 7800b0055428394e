use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::probe::DEFAULT_PROBE_WORKERS;

pub const VISION_MAX_ATTEMPTS: usize = 3;
pub const VISION_BACKOFF_BASE_MS: u64 = 1000;
pub const NORMALIZER_TIMEOUT_MS: u64 = 10_000;
pub const NEARBY_RADII_PX: [f64; 5] = [15.0, 30.0, 60.0, 120.0, 200.0];
pub const NEARBY_ANGLE_STEP_DEG: u32 = 30;

pub const CONTEXT_SCOPED_CONFIDENCE: f64 = 0.95;
pub const SEMANTIC_EXACT_CONFIDENCE: f64 = 0.9;
pub const SEMANTIC_PARTIAL_CONFIDENCE: f64 = 0.85;
pub const NORMALIZED_CONFIDENCE: f64 = 0.8;
pub const NEARBY_CONFIDENCE: f64 = 0.75;

/// Tunables for [`crate::TargetResolver`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Concurrent read-only probes per tier
    pub probe_workers: usize,
    pub vision_attempts: usize,
    /// First retry delay; doubles on each further attempt
    pub vision_backoff_ms: u64,
    /// Bound on a single vision call
    pub vision_timeout_ms: u64,
    /// Bound on the term normalization call; past it the static table is used
    pub normalizer_timeout_ms: u64,
    pub nearby_radii: Vec<f64>,
    pub nearby_angle_step_deg: u32,
    pub viewport_margin: f64,
    /// Capture a screenshot per resolution when the caller supplies none
    pub capture_screenshots: bool,
    pub screenshot_dir: PathBuf,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            probe_workers: DEFAULT_PROBE_WORKERS,
            vision_attempts: VISION_MAX_ATTEMPTS,
            vision_backoff_ms: VISION_BACKOFF_BASE_MS,
            vision_timeout_ms: 60_000,
            normalizer_timeout_ms: NORMALIZER_TIMEOUT_MS,
            nearby_radii: NEARBY_RADII_PX.to_vec(),
            nearby_angle_step_deg: NEARBY_ANGLE_STEP_DEG,
            viewport_margin: perceiver_visual::VIEWPORT_MARGIN_PX,
            capture_screenshots: true,
            screenshot_dir: std::env::temp_dir().join("stepwright").join("screenshots"),
        }
    }
}

impl ResolverConfig {
    pub fn vision_backoff(&self) -> Duration {
        Duration::from_millis(self.vision_backoff_ms)
    }

    pub fn vision_timeout(&self) -> Duration {
        Duration::from_millis(self.vision_timeout_ms.max(1))
    }

    pub fn normalizer_timeout(&self) -> Duration {
        Duration::from_millis(self.normalizer_timeout_ms.max(1))
    }
}
