//! Visual side of target resolution.
//!
//! - [`ViewportValidator`]: authoritative viewport and coordinate bounds checks
//! - [`DetectionCache`]: TTL + LRU store of prior resolution results
//! - [`DetectionKey`] / [`ScreenshotFingerprint`]: cheap cache keys
//! - [`prepare_for_vision`]: screenshot downscaling and encoding for the vision model

pub mod cache;
pub mod clock;
pub mod errors;
pub mod fingerprint;
pub mod screenshot;
pub mod viewport;

pub use cache::{CacheConfig, CacheStats, DetectionCache, CACHE_CONFIDENCE_THRESHOLD};
pub use clock::{Clock, ManualClock, SystemClock};
pub use errors::VisualError;
pub use fingerprint::{DetectionKey, ScreenshotFingerprint, StableContext};
pub use screenshot::{prepare_for_vision, PreparedImage, MAX_VISION_DIMENSION};
pub use viewport::{ViewportValidator, VIEWPORT_MARGIN_PX};
