//! Model-backed tiers: vision detection and the nearby search that repairs
//! vision points which miss the viewport or land on decoration.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cdp_adapter::ElementInfo;
use futures::FutureExt;
use stepwright_core_types::{ActionType, ExecCtx, Point, SourceTier};
use stepwright_llm::{enhanced_instruction, VisionDetection, VisionDetector, VisionRequest};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::config::{ResolverConfig, NEARBY_CONFIDENCE};
use crate::errors::LocatorError;
use crate::interactivity::{describe, is_interactive};
use crate::probe::{first_in_order, probe_selectors, Probe};
use crate::selectors::{is_input_like, search_input_selectors};
use crate::strategies::{TierInput, TierStrategy};
use crate::types::{Candidate, TierOutcome};

/// Asks the vision model for the target, retrying transient failures with
/// exponential backoff.
pub struct VisionTier {
    detector: Option<Arc<dyn VisionDetector>>,
    attempts: usize,
    backoff: Duration,
    call_timeout: Duration,
}

impl VisionTier {
    pub fn new(detector: Option<Arc<dyn VisionDetector>>, config: &ResolverConfig) -> Self {
        Self {
            detector,
            attempts: config.vision_attempts.max(1),
            backoff: config.vision_backoff(),
            call_timeout: config.vision_timeout(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.detector.is_some()
    }

    fn request(input: &TierInput<'_>) -> Option<VisionRequest> {
        let screenshot = input.screenshot?;
        let plan = input.plan;
        let target = input.target();
        let instruction = match plan.action_type {
            ActionType::Type => enhanced_instruction(plan.action_type, target),
            ActionType::Click if is_input_like(target) => {
                enhanced_instruction(plan.action_type, target)
            }
            _ => plan.effective_instruction(),
        };
        let previous_action = plan.context_hints.previous_action.clone().or_else(|| {
            Some(if input.ctx.step <= 1 {
                "navigation".to_string()
            } else {
                "user_action".to_string()
            })
        });
        Some(VisionRequest {
            screenshot: screenshot.to_path_buf(),
            instruction,
            page_url: Some(input.page_url.to_string()),
            page_title: Some(input.page_title.to_string()),
            previous_action,
            ui_context: plan.context_hints.ui_context.clone(),
        })
    }

    async fn detect_with_retry(
        &self,
        detector: &dyn VisionDetector,
        request: &VisionRequest,
        ctx: &ExecCtx,
    ) -> Result<VisionDetection, LocatorError> {
        let mut delay = self.backoff;
        let mut last_error = String::from("no attempt made");
        let mut made = 0usize;

        for attempt in 1..=self.attempts {
            ctx.ensure_active()?;
            made = attempt;
            let budget = self.call_timeout.min(ctx.remaining_time());
            let answered = tokio::select! {
                biased;
                _ = ctx.cancel_token.cancelled() => return Err(LocatorError::Cancelled),
                answered = timeout(budget, detector.detect(request)) => answered,
            };
            match answered {
                Ok(Ok(detection)) => {
                    debug!(attempt, found = detection.found, "vision call answered");
                    return Ok(detection);
                }
                Ok(Err(err)) => {
                    warn!(attempt, error = %err, "vision call failed");
                    last_error = err.to_string();
                    if !err.is_retryable() {
                        break;
                    }
                }
                Err(_) => {
                    warn!(attempt, timeout_ms = budget.as_millis() as u64, "vision call timed out");
                    last_error = format!("timed out after {} ms", budget.as_millis());
                }
            }

            if attempt < self.attempts {
                if ctx.remaining_time() <= delay {
                    last_error = format!("{} (no time left to retry)", last_error);
                    break;
                }
                tokio::select! {
                    _ = ctx.cancel_token.cancelled() => return Err(LocatorError::Cancelled),
                    _ = sleep(delay) => {}
                }
                delay = delay.saturating_mul(2);
            }
        }

        Err(LocatorError::VisionCallFailed {
            attempts: made,
            reason: last_error,
        })
    }

    /// Accepts the model's point only when it is on screen and lands on something usable.
    async fn validate(
        &self,
        detection: VisionDetection,
        input: &TierInput<'_>,
    ) -> Result<TierOutcome, LocatorError> {
        let primary = match detection.primary {
            Some(primary) if detection.found => primary,
            _ => {
                return Ok(TierOutcome::NoMatch(
                    detection
                        .error_message
                        .unwrap_or_else(|| "vision model found no matching element".into()),
                ))
            }
        };
        let point = primary.center;
        if !input.validator.is_within(point) {
            info!(x = point.x, y = point.y, "vision point outside viewport");
            return Ok(TierOutcome::Rejected {
                point,
                reason: LocatorError::OutOfViewport {
                    x: point.x,
                    y: point.y,
                },
            });
        }

        let hit = input.page.element_at(point).await?;
        match hit {
            Some(element) if is_interactive(&element, input.plan.action_type) => {
                let mut metadata = element.metadata(Some("vision".into()));
                metadata.element_type = Some(primary.element_type.clone());
                metadata.description = Some(primary.description.clone());
                metadata.interaction_type = Some(primary.interaction_type.clone());
                if metadata.visible_text.is_none() {
                    metadata.visible_text = primary.visible_text.clone();
                }
                Ok(TierOutcome::Accepted(Candidate {
                    tier: SourceTier::Vision,
                    point,
                    bounding_box: Some(primary.bounding_box),
                    confidence: primary.confidence,
                    element: Some(element),
                    metadata,
                }))
            }
            Some(element) => Ok(TierOutcome::Rejected {
                point,
                reason: LocatorError::NonInteractiveTarget {
                    x: point.x,
                    y: point.y,
                    detail: describe(&element),
                },
            }),
            None => Ok(TierOutcome::Rejected {
                point,
                reason: LocatorError::NonInteractiveTarget {
                    x: point.x,
                    y: point.y,
                    detail: "no element at point".into(),
                },
            }),
        }
    }
}

#[async_trait]
impl TierStrategy for VisionTier {
    async fn attempt(&self, input: &TierInput<'_>) -> Result<TierOutcome, LocatorError> {
        let Some(detector) = self.detector.as_deref() else {
            return Ok(TierOutcome::NoMatch("vision model not configured".into()));
        };
        let Some(request) = Self::request(input) else {
            return Ok(TierOutcome::NoMatch("no screenshot available".into()));
        };
        let detection = self.detect_with_retry(detector, &request, input.ctx).await?;
        self.validate(detection, input).await
    }

    fn tier(&self) -> SourceTier {
        SourceTier::Vision
    }
}

/// Looks for a usable element around a rejected vision point.
pub struct NearbySearch {
    radii: Vec<f64>,
    angle_step_deg: u32,
}

impl NearbySearch {
    pub fn new(config: &ResolverConfig) -> Self {
        Self {
            radii: config.nearby_radii.clone(),
            angle_step_deg: config.nearby_angle_step_deg.clamp(1, 360),
        }
    }

    fn ring(&self, origin: Point, radius: f64) -> Vec<Point> {
        (0..360)
            .step_by(self.angle_step_deg as usize)
            .map(|angle| origin.offset_polar(radius, angle as f64))
            .collect()
    }

    /// Search-input selectors first for input-like targets, then rings of hit tests.
    pub async fn search(
        &self,
        origin: Point,
        input: &TierInput<'_>,
    ) -> Result<TierOutcome, LocatorError> {
        if input.plan.action_type == ActionType::Type || is_input_like(input.target()) {
            let selectors = search_input_selectors();
            if let Some((candidate, element)) = probe_selectors(
                input.page,
                input.ctx,
                input.workers,
                &selectors,
                |el: &ElementInfo| input.accepts(el),
            )
            .await?
            {
                debug!(selector = %candidate.anchor, "nearby search matched a search input");
                return Ok(TierOutcome::Accepted(Candidate::from_element(
                    SourceTier::NearbySearch,
                    element,
                    NEARBY_CONFIDENCE,
                    candidate.anchor.to_string(),
                )));
            }
        }

        for radius in &self.radii {
            let points: Vec<Point> = self
                .ring(origin, *radius)
                .into_iter()
                .filter(|p| input.validator.is_within(*p))
                .collect();
            if points.is_empty() {
                continue;
            }
            let page = input.page;
            let mut probes: Vec<Probe<'_, ElementInfo>> = Vec::with_capacity(points.len());
            for point in points {
                probes.push(
                    async move {
                        match page.element_at(point).await {
                            Ok(hit) => hit.filter(|el| input.accepts(el)),
                            Err(err) => {
                                debug!(x = point.x, y = point.y, error = %err, "hit test failed");
                                None
                            }
                        }
                    }
                    .boxed(),
                );
            }
            let accepted = first_in_order(input.ctx, input.workers, probes).await?;
            if let Some(element) = accepted {
                info!(radius = *radius, tag = %element.tag, "nearby search found an element");
                return Ok(TierOutcome::Accepted(Candidate::from_element(
                    SourceTier::NearbySearch,
                    element,
                    NEARBY_CONFIDENCE,
                    format!("nearby:{}px", radius),
                )));
            }
        }

        Ok(TierOutcome::NoMatch(format!(
            "no interactive element near ({:.0}, {:.0})",
            origin.x, origin.y
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rings_have_twelve_points_at_thirty_degrees() {
        let search = NearbySearch::new(&ResolverConfig::default());
        let ring = search.ring(Point::new(100.0, 100.0), 15.0);
        assert_eq!(ring.len(), 12);
        assert!((ring[0].x - 115.0).abs() < 1e-9);
        assert!((ring[3].y - 115.0).abs() < 1e-9);
    }
}
