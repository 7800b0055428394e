//! Selector-driven resolution tiers
//!
//! Three tiers in fallback order:
//! 1. Context-scoped - selectors confined to an open dropdown or dialog
//! 2. Semantic - text and attribute catalogue for the literal target
//! 3. Normalized - the same catalogue over alternative terms for the target

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cdp_adapter::{ElementInfo, PageQuery};
use perceiver_visual::ViewportValidator;
use stepwright_core_types::{ActionPlan, ExecCtx, SourceTier};
use stepwright_llm::{
    normalize_or_fallback, static_normalization, NormalizeRequest, TermNormalizer,
};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::config::{
    CONTEXT_SCOPED_CONFIDENCE, NORMALIZED_CONFIDENCE, SEMANTIC_EXACT_CONFIDENCE,
    SEMANTIC_PARTIAL_CONFIDENCE,
};
use crate::errors::LocatorError;
use crate::interactivity::is_interactive;
use crate::probe::probe_selectors;
use crate::selectors::{context_selectors, selectors_for};
use crate::types::{Candidate, SelectorCandidate, TierOutcome};

/// Everything a tier may look at for one resolution.
pub struct TierInput<'a> {
    pub plan: &'a ActionPlan,
    pub page: &'a dyn PageQuery,
    pub ctx: &'a ExecCtx,
    pub validator: &'a ViewportValidator,
    pub screenshot: Option<&'a Path>,
    pub page_url: &'a str,
    pub page_title: &'a str,
    pub workers: usize,
}

impl<'a> TierInput<'a> {
    pub fn target(&self) -> &'a str {
        self.plan.search_text()
    }

    pub fn has_context(&self) -> bool {
        self.plan.context_hints.ui_context.is_some()
    }

    /// Visible, inside the viewport and usable for the plan's action.
    pub fn accepts(&self, element: &ElementInfo) -> bool {
        element.visible
            && self.validator.is_within(element.center())
            && is_interactive(element, self.plan.action_type)
    }

    async fn first_match<'c>(
        &self,
        candidates: &'c [SelectorCandidate],
    ) -> Result<Option<(&'c SelectorCandidate, ElementInfo)>, LocatorError>
    where
        'a: 'c,
    {
        probe_selectors(self.page, self.ctx, self.workers, candidates, |el: &ElementInfo| {
            self.accepts(el)
        })
        .await
    }
}

/// One resolution tier.
#[async_trait]
pub trait TierStrategy: Send + Sync {
    async fn attempt(&self, input: &TierInput<'_>) -> Result<TierOutcome, LocatorError>;

    fn tier(&self) -> SourceTier;

    fn name(&self) -> &'static str {
        self.tier().name()
    }
}

fn is_exact_match(element: &ElementInfo, term: &str) -> bool {
    let term = term.trim();
    element.text.trim().eq_ignore_ascii_case(term)
        || element
            .aria_label
            .as_deref()
            .map(|l| l.trim().eq_ignore_ascii_case(term))
            .unwrap_or(false)
        || element
            .placeholder
            .as_deref()
            .map(|p| p.trim().eq_ignore_ascii_case(term))
            .unwrap_or(false)
}

/// Selectors scoped to the UI region opened by an earlier step.
#[derive(Debug, Default, Clone, Copy)]
pub struct ContextScopedTier;

#[async_trait]
impl TierStrategy for ContextScopedTier {
    async fn attempt(&self, input: &TierInput<'_>) -> Result<TierOutcome, LocatorError> {
        let Some(hint) = input.plan.context_hints.ui_context.as_ref() else {
            return Ok(TierOutcome::NoMatch("no open ui context".into()));
        };
        let candidates = context_selectors(hint, input.target());
        if candidates.is_empty() {
            return Ok(TierOutcome::NoMatch(format!(
                "no scoped selectors for a {} context",
                hint.ui_context_type
            )));
        }
        debug!(
            context = %hint.ui_context_type,
            opened_step = hint.opened_step,
            selectors = candidates.len(),
            "probing context-scoped selectors"
        );
        match input.first_match(&candidates).await? {
            Some((candidate, element)) => Ok(TierOutcome::Accepted(Candidate::from_element(
                SourceTier::ContextScoped,
                element,
                CONTEXT_SCOPED_CONFIDENCE,
                candidate.anchor.to_string(),
            ))),
            None => Ok(TierOutcome::NoMatch(format!(
                "nothing matched {}",
                hint.search_scope
            ))),
        }
    }

    fn tier(&self) -> SourceTier {
        SourceTier::ContextScoped
    }
}

/// Catalogue selectors for the literal target.
#[derive(Debug, Default, Clone, Copy)]
pub struct SemanticTier;

#[async_trait]
impl TierStrategy for SemanticTier {
    async fn attempt(&self, input: &TierInput<'_>) -> Result<TierOutcome, LocatorError> {
        let target = input.target();
        let candidates = selectors_for(input.plan.action_type, target, input.has_context());
        if candidates.is_empty() {
            return Ok(TierOutcome::NoMatch("empty target".into()));
        }
        match input.first_match(&candidates).await? {
            Some((candidate, element)) => {
                let confidence = if is_exact_match(&element, target) {
                    SEMANTIC_EXACT_CONFIDENCE
                } else {
                    SEMANTIC_PARTIAL_CONFIDENCE
                };
                debug!(selector = %candidate.anchor, strategy = candidate.strategy, "semantic match");
                Ok(TierOutcome::Accepted(Candidate::from_element(
                    SourceTier::Semantic,
                    element,
                    confidence,
                    candidate.anchor.to_string(),
                )))
            }
            None => Ok(TierOutcome::NoMatch(format!(
                "{} selectors, no visible interactive match",
                candidates.len()
            ))),
        }
    }

    fn tier(&self) -> SourceTier {
        SourceTier::Semantic
    }
}

/// Re-runs the semantic catalogue over alternative terms for the target.
pub struct NormalizedTier {
    normalizer: Arc<dyn TermNormalizer>,
    call_timeout: Duration,
}

impl NormalizedTier {
    pub fn new(normalizer: Arc<dyn TermNormalizer>, call_timeout: Duration) -> Self {
        Self {
            normalizer,
            call_timeout,
        }
    }

    /// Alternative terms, bounded by the call timeout and the step deadline.
    async fn terms(
        &self,
        request: &NormalizeRequest,
        ctx: &ExecCtx,
    ) -> Result<Vec<String>, LocatorError> {
        let budget = self.call_timeout.min(ctx.remaining_time());
        tokio::select! {
            biased;
            _ = ctx.cancel_token.cancelled() => Err(LocatorError::Cancelled),
            answered = timeout(budget, normalize_or_fallback(self.normalizer.as_ref(), request)) => {
                match answered {
                    Ok(terms) => Ok(terms),
                    Err(_) => {
                        warn!(
                            timeout_ms = budget.as_millis() as u64,
                            "term normalization timed out, using static synonyms"
                        );
                        Ok(static_normalization(&request.target))
                    }
                }
            }
        }
    }
}

#[async_trait]
impl TierStrategy for NormalizedTier {
    async fn attempt(&self, input: &TierInput<'_>) -> Result<TierOutcome, LocatorError> {
        let target = input.target();
        let request = NormalizeRequest {
            action: input.plan.action_type,
            target: target.to_string(),
            page_url: input.page_url.to_string(),
            page_title: input.page_title.to_string(),
        };
        let terms = self.terms(&request, input.ctx).await?;
        input.ctx.ensure_active()?;

        // anchors the semantic tier already probed
        let mut seen: HashSet<String> =
            selectors_for(input.plan.action_type, target, input.has_context())
                .iter()
                .map(|c| c.anchor.to_string())
                .collect();

        let mut tried = 0usize;
        for term in terms.iter().filter(|t| t.as_str() != target) {
            let candidates: Vec<SelectorCandidate> =
                selectors_for(input.plan.action_type, term, input.has_context())
                    .into_iter()
                    .filter(|c| seen.insert(c.anchor.to_string()))
                    .collect();
            if candidates.is_empty() {
                continue;
            }
            tried += 1;
            if let Some((candidate, element)) = input.first_match(&candidates).await? {
                debug!(term = %term, selector = %candidate.anchor, "normalized term matched");
                return Ok(TierOutcome::Accepted(Candidate::from_element(
                    SourceTier::Normalized,
                    element,
                    NORMALIZED_CONFIDENCE,
                    candidate.anchor.to_string(),
                )));
            }
        }
        Ok(TierOutcome::NoMatch(format!(
            "{} alternative term(s) tried, none matched",
            tried
        )))
    }

    fn tier(&self) -> SourceTier {
        SourceTier::Normalized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdp_adapter::mock::MockPage;
    use cdp_adapter::AnchorDescriptor;
    use stepwright_core_types::{BoundingBox, UiContextHint};
    use stepwright_llm::StaticNormalizer;
    use std::time::Duration;

    fn input<'a>(
        plan: &'a ActionPlan,
        page: &'a MockPage,
        ctx: &'a ExecCtx,
        validator: &'a ViewportValidator,
    ) -> TierInput<'a> {
        TierInput {
            plan,
            page,
            ctx,
            validator,
            screenshot: None,
            page_url: "https://app.example.com/",
            page_title: "Example App",
            workers: 4,
        }
    }

    fn button(handle: &str, text: &str, x: f64, y: f64) -> ElementInfo {
        ElementInfo::new(handle, "button", text).with_box(BoundingBox::new(x, y, 80.0, 24.0))
    }

    #[tokio::test]
    async fn semantic_prefers_exact_text_and_scores_it_higher() {
        let page = MockPage::new();
        page.add(
            AnchorDescriptor::text_exact("Save"),
            vec![button("sw-1", "Save", 10.0, 10.0)],
        );
        page.add(
            AnchorDescriptor::has_text("button:not([role='tab'])", "Save"),
            vec![button("sw-2", "Save draft", 200.0, 10.0)],
        );
        let plan = ActionPlan::click("Save");
        let ctx = ExecCtx::with_budget(1, Duration::from_secs(5));
        let validator = ViewportValidator::default();
        let outcome = SemanticTier.attempt(&input(&plan, &page, &ctx, &validator)).await.unwrap();
        let TierOutcome::Accepted(candidate) = outcome else {
            panic!("expected a match");
        };
        assert_eq!(candidate.element.unwrap().handle.0, "sw-1");
        assert_eq!(candidate.confidence, SEMANTIC_EXACT_CONFIDENCE);
    }

    #[tokio::test]
    async fn hidden_and_offscreen_matches_are_skipped() {
        let page = MockPage::new();
        page.add(
            AnchorDescriptor::text_exact("Save"),
            vec![
                button("sw-1", "Save", 10.0, 10.0).hidden(),
                button("sw-2", "Save", 3000.0, 10.0),
            ],
        );
        page.add(
            AnchorDescriptor::text_contains("Save"),
            vec![button("sw-3", "Save all", 50.0, 50.0)],
        );
        let plan = ActionPlan::click("Save");
        let ctx = ExecCtx::with_budget(1, Duration::from_secs(5));
        let validator = ViewportValidator::default();
        let outcome = SemanticTier.attempt(&input(&plan, &page, &ctx, &validator)).await.unwrap();
        let TierOutcome::Accepted(candidate) = outcome else {
            panic!("expected a match");
        };
        assert_eq!(candidate.element.unwrap().handle.0, "sw-3");
        assert_eq!(candidate.confidence, SEMANTIC_PARTIAL_CONFIDENCE);
    }

    #[tokio::test]
    async fn context_tier_needs_a_hint() {
        let page = MockPage::new();
        let plan = ActionPlan::click("Chatbot");
        let ctx = ExecCtx::with_budget(3, Duration::from_secs(5));
        let validator = ViewportValidator::default();
        let outcome = ContextScopedTier
            .attempt(&input(&plan, &page, &ctx, &validator))
            .await
            .unwrap();
        assert!(matches!(outcome, TierOutcome::NoMatch(_)));
        assert!(page.queries().is_empty());
    }

    #[tokio::test]
    async fn context_tier_finds_menu_items() {
        let page = MockPage::new();
        page.add(
            AnchorDescriptor::has_text("[role='menu'] [role='menuitem']", "Chatbot"),
            vec![ElementInfo::new("sw-5", "div", "Chatbot")
                .with_role("menuitem")
                .in_menu()],
        );
        let mut plan = ActionPlan::click("Chatbot");
        plan.context_hints.ui_context = Some(UiContextHint {
            ui_context_type: "dropdown".into(),
            opened_step: 2,
            ..UiContextHint::default()
        });
        let ctx = ExecCtx::with_budget(3, Duration::from_secs(5));
        let validator = ViewportValidator::default();
        let outcome = ContextScopedTier
            .attempt(&input(&plan, &page, &ctx, &validator))
            .await
            .unwrap();
        let TierOutcome::Accepted(candidate) = outcome else {
            panic!("expected a scoped match");
        };
        assert_eq!(candidate.tier, SourceTier::ContextScoped);
        assert_eq!(candidate.confidence, CONTEXT_SCOPED_CONFIDENCE);
    }

    #[tokio::test]
    async fn normalized_tier_tries_synonyms() {
        let page = MockPage::new();
        page.add(
            AnchorDescriptor::text_exact("login"),
            vec![ElementInfo::new("sw-8", "a", "login")],
        );
        let plan = ActionPlan::click("sign in");
        let ctx = ExecCtx::with_budget(1, Duration::from_secs(5));
        let validator = ViewportValidator::default();
        let tier = NormalizedTier::new(Arc::new(StaticNormalizer), Duration::from_secs(5));
        let outcome = tier.attempt(&input(&plan, &page, &ctx, &validator)).await.unwrap();
        let TierOutcome::Accepted(candidate) = outcome else {
            panic!("expected a synonym match");
        };
        assert_eq!(candidate.tier, SourceTier::Normalized);
        assert_eq!(candidate.confidence, NORMALIZED_CONFIDENCE);
        // the literal target is never re-probed
        let literal = page
            .queries()
            .iter()
            .filter(|q| q.as_str() == "text:exact:'sign in'")
            .count();
        assert_eq!(literal, 0);
    }
}
