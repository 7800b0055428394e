use std::time::Duration;

use cdp_adapter::PageQuery;
use parking_lot::RwLock;
use stepwright_core_types::{Point, Viewport, FALLBACK_VIEWPORT};
use tracing::{debug, warn};

/// Tolerance applied around the viewport edges.
pub const VIEWPORT_MARGIN_PX: f64 = 10.0;
pub const VIEWPORT_REFRESH_ATTEMPTS: usize = 3;
const REFRESH_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Holds the one viewport that is valid right now.
///
/// The viewport is replaced wholesale on refresh; readers never observe a partial update.
pub struct ViewportValidator {
    current: RwLock<Viewport>,
    margin: f64,
}

impl ViewportValidator {
    pub fn new(margin: f64) -> Self {
        Self {
            current: RwLock::new(FALLBACK_VIEWPORT),
            margin,
        }
    }

    pub fn with_viewport(viewport: Viewport, margin: f64) -> Self {
        Self {
            current: RwLock::new(viewport),
            margin,
        }
    }

    pub fn current(&self) -> Viewport {
        *self.current.read()
    }

    pub fn margin(&self) -> f64 {
        self.margin
    }

    pub fn replace(&self, viewport: Viewport) {
        *self.current.write() = viewport;
    }

    pub fn is_within(&self, point: Point) -> bool {
        self.current.read().contains(point, self.margin)
    }

    /// Re-reads the page viewport; falls back to 1200x800@1 when the page never answers.
    pub async fn refresh(&self, page: &dyn PageQuery) -> Viewport {
        for attempt in 1..=VIEWPORT_REFRESH_ATTEMPTS {
            match page.viewport_metrics().await {
                Ok(vp) if vp.width > 0.0 && vp.height > 0.0 => {
                    debug!(width = vp.width, height = vp.height, dpr = vp.device_pixel_ratio, "viewport refreshed");
                    self.replace(vp);
                    return vp;
                }
                Ok(vp) => {
                    debug!(attempt, width = vp.width, height = vp.height, "page reported empty viewport");
                }
                Err(err) => {
                    debug!(attempt, error = %err, "viewport read failed");
                }
            }
            if attempt < VIEWPORT_REFRESH_ATTEMPTS {
                tokio::time::sleep(REFRESH_RETRY_DELAY).await;
            }
        }
        warn!("viewport unavailable, using fallback 1200x800");
        self.replace(FALLBACK_VIEWPORT);
        FALLBACK_VIEWPORT
    }
}

impl Default for ViewportValidator {
    fn default() -> Self {
        Self::new(VIEWPORT_MARGIN_PX)
    }
}
