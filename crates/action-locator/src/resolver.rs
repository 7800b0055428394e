//! Target resolver with tier fallback orchestration

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use cdp_adapter::PageQuery;
use futures::stream::{self, StreamExt};
use perceiver_visual::{
    CacheConfig, DetectionCache, DetectionKey, ScreenshotFingerprint, StableContext,
    ViewportValidator,
};
use stepwright_core_types::{ActionPlan, ExecCtx, ResolutionResult, SourceTier};
use stepwright_llm::{TermNormalizer, VisionDetector};
use tracing::{debug, info, warn};

use crate::config::ResolverConfig;
use crate::errors::LocatorError;
use crate::metrics;
use crate::strategies::{
    ContextScopedTier, NormalizedTier, SemanticTier, TierInput, TierStrategy,
};
use crate::types::{Candidate, TierOutcome};
use crate::vision::{NearbySearch, VisionTier};

/// Resolves natural-language targets to validated on-screen points.
///
/// One resolver belongs to one test session: it owns the detection cache and the
/// viewport validator, and only ever reads from the page.
pub struct TargetResolver {
    config: ResolverConfig,
    cache: Arc<DetectionCache>,
    validator: Arc<ViewportValidator>,
    tiers: Vec<Arc<dyn TierStrategy>>,
    nearby: NearbySearch,
    screenshots: AtomicU64,
}

impl TargetResolver {
    pub fn new(
        config: ResolverConfig,
        normalizer: Arc<dyn TermNormalizer>,
        detector: Option<Arc<dyn VisionDetector>>,
    ) -> Self {
        let cache = Arc::new(DetectionCache::new(CacheConfig::default()));
        Self::with_cache(config, cache, normalizer, detector)
    }

    pub fn with_cache(
        config: ResolverConfig,
        cache: Arc<DetectionCache>,
        normalizer: Arc<dyn TermNormalizer>,
        detector: Option<Arc<dyn VisionDetector>>,
    ) -> Self {
        let tiers: Vec<Arc<dyn TierStrategy>> = vec![
            Arc::new(ContextScopedTier),
            Arc::new(SemanticTier),
            Arc::new(NormalizedTier::new(normalizer, config.normalizer_timeout())),
            Arc::new(VisionTier::new(detector, &config)),
        ];
        Self {
            validator: Arc::new(ViewportValidator::new(config.viewport_margin)),
            nearby: NearbySearch::new(&config),
            config,
            cache,
            tiers,
            screenshots: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<DetectionCache> {
        &self.cache
    }

    pub fn validator(&self) -> &Arc<ViewportValidator> {
        &self.validator
    }

    /// Resolves one plan. Never fails: exhaustion, cancellation and timeouts come
    /// back as `found = false` with the reason in `error_message`.
    ///
    /// `screenshot` is reused for the cache key and the vision call; without one the
    /// resolver captures its own when configured to.
    pub async fn resolve(
        &self,
        plan: &ActionPlan,
        page: &dyn PageQuery,
        ctx: &ExecCtx,
        screenshot: Option<&Path>,
    ) -> ResolutionResult {
        let started = Instant::now();
        info!(
            action_id = %ctx.action_id,
            step = ctx.step,
            action = %plan.action_type,
            target = %plan.search_text(),
            "resolving target"
        );

        let result = match self.run_tiers(plan, page, ctx, screenshot).await {
            Ok(result) => result,
            Err(err) => {
                warn!(
                    action_id = %ctx.action_id,
                    step = ctx.step,
                    error = %err,
                    "target not resolved"
                );
                ResolutionResult::not_found(err.to_string())
            }
        };

        let elapsed = started.elapsed();
        self.cache.record_detection(elapsed, &result);
        metrics::record_resolution(elapsed);
        result
    }

    /// Resolves several plans with bounded concurrency, in input order.
    pub async fn resolve_many(
        &self,
        plans: &[ActionPlan],
        page: &dyn PageQuery,
        ctx: &ExecCtx,
    ) -> Vec<ResolutionResult> {
        stream::iter(plans)
            .map(|plan| self.resolve(plan, page, ctx, None))
            .buffered(self.config.probe_workers.max(1))
            .collect()
            .await
    }

    async fn run_tiers(
        &self,
        plan: &ActionPlan,
        page: &dyn PageQuery,
        ctx: &ExecCtx,
        screenshot: Option<&Path>,
    ) -> Result<ResolutionResult, LocatorError> {
        ctx.ensure_active()?;
        self.validator.refresh(page).await;

        let page_url = match page.url().await {
            Ok(url) => url,
            Err(_) => plan.context_hints.page_url.clone().unwrap_or_default(),
        };
        let page_title = match page.title().await {
            Ok(title) => title,
            Err(_) => plan.context_hints.page_title.clone().unwrap_or_default(),
        };

        let screenshot: Option<PathBuf> = match screenshot {
            Some(path) => Some(path.to_path_buf()),
            None => self.capture(page, ctx).await,
        };
        let fingerprint = screenshot
            .as_deref()
            .map(ScreenshotFingerprint::of)
            .unwrap_or_else(ScreenshotFingerprint::missing);
        let key = DetectionKey::compute(
            &fingerprint,
            &plan.effective_instruction(),
            &StableContext {
                url: Some(page_url.clone()),
                title: Some(page_title.clone()),
                element_type: plan.context_hints.element_type.clone(),
            },
        );

        if let Some(hit) = self.cached(&key) {
            return Ok(hit);
        }

        let input = TierInput {
            plan,
            page,
            ctx,
            validator: &self.validator,
            screenshot: screenshot.as_deref(),
            page_url: &page_url,
            page_title: &page_title,
            workers: self.config.probe_workers.max(1),
        };

        let mut failures: Vec<String> = Vec::new();
        for tier in &self.tiers {
            ctx.ensure_active()?;
            let name = tier.name();
            debug!(tier = name, step = ctx.step, "trying tier");

            let outcome = match tier.attempt(&input).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    metrics::record_tier(name, "error");
                    if matches!(err, LocatorError::Cancelled | LocatorError::Timeout(_)) {
                        return Err(err);
                    }
                    warn!(tier = name, error = %err, "tier failed");
                    failures.push(format!("{}: {}", name, err));
                    continue;
                }
            };
            metrics::record_tier(name, outcome.label());

            match outcome {
                TierOutcome::Accepted(candidate) => return Ok(self.accept(key, candidate)),
                TierOutcome::Rejected { point, reason } => {
                    debug!(tier = name, reason = %reason, "point rejected, searching nearby");
                    failures.push(format!("{}: {}", name, reason));
                    let nearby = SourceTier::NearbySearch.name();
                    match self.nearby.search(point, &input).await {
                        Ok(TierOutcome::Accepted(candidate)) => {
                            metrics::record_tier(nearby, "accepted");
                            return Ok(self.accept(key, candidate));
                        }
                        Ok(other) => {
                            metrics::record_tier(nearby, other.label());
                            if let TierOutcome::NoMatch(reason) = other {
                                failures.push(format!("{}: {}", nearby, reason));
                            }
                        }
                        Err(err) => {
                            metrics::record_tier(nearby, "error");
                            if matches!(err, LocatorError::Cancelled | LocatorError::Timeout(_)) {
                                return Err(err);
                            }
                            failures.push(format!("{}: {}", nearby, err));
                        }
                    }
                }
                TierOutcome::NoMatch(reason) => {
                    debug!(tier = name, reason = %reason, "tier found nothing");
                    failures.push(format!("{}: {}", name, reason));
                }
            }
        }

        Err(LocatorError::ResolutionExhausted {
            target: plan.search_text().to_string(),
            attempts: failures.join("; "),
        })
    }

    /// Cache hit, provided its point still lies inside the current viewport.
    fn cached(&self, key: &DetectionKey) -> Option<ResolutionResult> {
        let tier = SourceTier::Cache.name();
        let Some(mut hit) = self.cache.get(key) else {
            metrics::record_tier(tier, "no_match");
            return None;
        };
        match hit.coordinates {
            Some(point) if self.validator.is_within(point) => {
                metrics::record_tier(tier, "accepted");
                info!(x = point.x, y = point.y, confidence = hit.confidence, "detection cache hit");
                hit.source_tier = Some(SourceTier::Cache);
                hit.element = None;
                Some(hit)
            }
            _ => {
                metrics::record_tier(tier, "rejected");
                debug!("cached point no longer inside the viewport");
                None
            }
        }
    }

    fn accept(&self, key: DetectionKey, candidate: Candidate) -> ResolutionResult {
        let result = candidate.into_result();
        if let Some(point) = result.coordinates {
            info!(
                tier = ?result.source_tier,
                x = point.x,
                y = point.y,
                confidence = result.confidence,
                "target resolved"
            );
        }
        if self.cache.put(key, result.clone()) {
            debug!("resolution cached");
        }
        result
    }

    async fn capture(&self, page: &dyn PageQuery, ctx: &ExecCtx) -> Option<PathBuf> {
        if !self.config.capture_screenshots {
            return None;
        }
        if let Err(err) = tokio::fs::create_dir_all(&self.config.screenshot_dir).await {
            warn!(error = %err, dir = %self.config.screenshot_dir.display(), "cannot create screenshot dir");
            return None;
        }
        let seq = self.screenshots.fetch_add(1, Ordering::Relaxed);
        let path = self
            .config
            .screenshot_dir
            .join(format!("step{:03}_{}.png", ctx.step, seq));
        match page.capture_screenshot(&path).await {
            Ok(()) => Some(path),
            Err(err) => {
                warn!(error = %err, "screenshot capture failed");
                None
            }
        }
    }
}
