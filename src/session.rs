//! Step session: the sequential loop that asks the tracker for scope, the resolver
//! for a target and the executor for the action, one step at a time.

use std::sync::Arc;
use std::time::Instant;

use action_locator::TargetResolver;
use action_primitives::{ActionError, ActionExecutor, ActionReport, CredentialProvider};
use anyhow::{Context, Result};
use cdp_adapter::PageDriver;
use chrono::{DateTime, Utc};
use perceiver_visual::DetectionCache;
use serde::Serialize;
use stepwright_core_types::{
    ActionId, ActionPlan, ActionType, ExecCtx, ExpectedUrl, NavigationOutcome, StepExecutionResult,
    StepStatus, TimingBreakdown,
};
use stepwright_llm::{
    OpenAiClient, OpenAiTermNormalizer, OpenAiVisionDetector, StaticNormalizer, TermNormalizer,
    UsageStats, VisionDetector,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use ui_context::UiContextTracker;

use crate::config::{Config, RunSettings};
use crate::metrics;
use crate::plan::{resolve_against, TestPlan};

/// Outcome of one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub name: String,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub results: Vec<StepExecutionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_usage: Option<UsageStats>,
}

impl RunReport {
    pub fn passed(&self) -> usize {
        self.results.iter().filter(|r| r.status.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.passed()
    }

    pub fn is_success(&self) -> bool {
        !self.results.is_empty() && self.failed() == 0
    }
}

/// One test run against one page.
///
/// Owns its resolver (and so its detection cache) and its UI context tracker, so
/// nothing leaks between sessions. Steps run strictly in order; a failed step is
/// recorded and the run continues unless `stop_on_failure` is set.
pub struct TestSession<P> {
    page: P,
    resolver: TargetResolver,
    executor: ActionExecutor,
    tracker: UiContextTracker,
    settings: RunSettings,
    base_url: Option<String>,
    cancel: CancellationToken,
    client: Option<Arc<OpenAiClient>>,
    navigation: Option<NavigationOutcome>,
    previous_action: Option<String>,
}

impl<P: PageDriver> TestSession<P> {
    pub fn new(
        page: P,
        resolver: TargetResolver,
        executor: ActionExecutor,
        tracker: UiContextTracker,
        settings: RunSettings,
    ) -> Self {
        Self {
            page,
            resolver,
            executor,
            tracker,
            base_url: settings.base_url.clone(),
            settings,
            cancel: CancellationToken::new(),
            client: None,
            navigation: None,
            previous_action: None,
        }
    }

    /// Builds the engine from configuration. Without model access the resolver
    /// runs without its vision tier and normalizes terms with static rules.
    pub fn from_config(
        page: P,
        config: &Config,
        credentials: Option<Arc<dyn CredentialProvider>>,
    ) -> Result<Self> {
        let client = match config.llm.openai_config() {
            Some(openai) => Some(Arc::new(
                OpenAiClient::new(openai).context("building the model client")?,
            )),
            None => {
                warn!("no model API key configured; vision detection is disabled");
                None
            }
        };

        let normalizer: Arc<dyn TermNormalizer> = match &client {
            Some(client) if config.llm.normalize_terms => {
                Arc::new(OpenAiTermNormalizer::new(Arc::clone(client)))
            }
            _ => Arc::new(StaticNormalizer),
        };
        let detector = client
            .as_ref()
            .map(|c| Arc::new(OpenAiVisionDetector::new(Arc::clone(c))) as Arc<dyn VisionDetector>);

        let cache = Arc::new(DetectionCache::new(config.resolver.cache.clone()));
        let resolver =
            TargetResolver::with_cache(config.resolver.tiers.clone(), cache, normalizer, detector);

        let mut executor = ActionExecutor::new(config.executor.clone());
        if let Some(credentials) = credentials {
            executor = executor.with_credentials(credentials);
        }
        let tracker = UiContextTracker::new(config.context.clone());

        let mut session = Self::new(page, resolver, executor, tracker, config.run.clone());
        session.client = client;
        Ok(session)
    }

    pub fn page(&self) -> &P {
        &self.page
    }

    pub fn resolver(&self) -> &TargetResolver {
        &self.resolver
    }

    pub fn tracker(&self) -> &UiContextTracker {
        &self.tracker
    }

    /// Cancelling this token stops the current step and skips the rest.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn into_page(self) -> P {
        self.page
    }

    pub async fn run(&mut self, plan: &TestPlan) -> RunReport {
        self.tracker.clear_all();
        self.resolver.cache().clear();
        self.navigation = None;
        self.previous_action = None;
        if plan.base_url.is_some() {
            self.base_url = plan.base_url.clone();
        }

        let started_at = Utc::now();
        let start = Instant::now();
        let run_ctx = ExecCtx::new(
            0,
            Instant::now() + self.settings.run_timeout(),
            self.cancel.child_token(),
        );
        info!(run = %plan.name, steps = plan.steps.len(), "starting test run");

        let mut results = Vec::with_capacity(plan.steps.len());
        for (index, step_plan) in plan.steps.iter().enumerate() {
            let step = index + 1;
            if let Err(err) = run_ctx.ensure_active() {
                warn!(step, error = %err, "run stopped before step");
                results.push(StepExecutionResult::error(
                    step,
                    step_plan.effective_instruction(),
                    step_plan.action_type,
                    TimingBreakdown::default(),
                    format!("not run: {}", err),
                ));
                continue;
            }

            let result = self
                .run_step(step, step_plan, plan.steps.get(index + 1), &run_ctx)
                .await;
            metrics::record_step(result.action_type.name(), result.status.name());
            let failed = !result.status.is_success();
            results.push(result);
            if failed && self.settings.stop_on_failure {
                warn!(step, "stopping run after failed step");
                break;
            }
        }

        let report = RunReport {
            name: plan.name.clone(),
            started_at,
            elapsed_ms: start.elapsed().as_millis() as u64,
            results,
            llm_usage: self.client.as_ref().map(|c| c.usage()),
        };
        info!(
            run = %report.name,
            passed = report.passed(),
            failed = report.failed(),
            elapsed_ms = report.elapsed_ms,
            "test run finished"
        );
        report
    }

    /// Runs one step. Never fails: resolution misses and executor errors become a
    /// failed [`StepExecutionResult`].
    pub async fn run_step(
        &mut self,
        step: usize,
        raw: &ActionPlan,
        next: Option<&ActionPlan>,
        run_ctx: &ExecCtx,
    ) -> StepExecutionResult {
        let total = Instant::now();
        let mut ctx = run_ctx.child(self.settings.step_timeout());
        ctx.step = step;
        ctx.action_id = ActionId::new();
        let mut timing = TimingBreakdown::default();

        let started = Instant::now();
        let plan = self.prepare(step, raw, next).await;
        timing.parse_ms = elapsed_ms(started);
        let instruction = plan.instruction.clone();
        info!(
            action_id = %ctx.action_id,
            step,
            action = plan.action_type.name(),
            instruction = %instruction,
            "running step"
        );

        let resolution = if plan.action_type.needs_target() {
            let started = Instant::now();
            let result = self.resolver.resolve(&plan, &self.page, &ctx, None).await;
            timing.resolve_ms = elapsed_ms(started);
            if !result.found {
                timing.total_ms = elapsed_ms(total);
                let message = result
                    .error_message
                    .clone()
                    .unwrap_or_else(|| format!("could not locate '{}'", plan.search_text()));
                self.record_failure(&plan);
                if let Err(abort) = ctx.ensure_active() {
                    warn!(step, error = %abort, "step aborted during resolution");
                    return StepExecutionResult::error(step, instruction, plan.action_type, timing, message);
                }
                warn!(step, target = %plan.search_text(), "step failed: target not resolved");
                return StepExecutionResult::failed(step, instruction, plan.action_type, timing, message);
            }
            Some(result)
        } else {
            None
        };

        let started = Instant::now();
        let outcome = self
            .executor
            .execute(&plan, resolution.as_ref(), &self.page, &ctx)
            .await;
        timing.execute_ms = elapsed_ms(started);
        timing.total_ms = elapsed_ms(total);

        match outcome {
            Ok(report) => {
                self.record_success(&plan, &report);
                StepExecutionResult::success(step, instruction, plan.action_type, timing)
            }
            Err(err) => {
                warn!(step, kind = err.kind(), error = %err, "step failed");
                self.record_failure(&plan);
                let message = err.to_string();
                match status_for(&err) {
                    StepStatus::Error => {
                        StepExecutionResult::error(step, instruction, plan.action_type, timing, message)
                    }
                    _ => StepExecutionResult::failed(step, instruction, plan.action_type, timing, message),
                }
            }
        }
    }

    /// Copy of `raw` with scope, navigation state and page hints filled in.
    async fn prepare(&mut self, step: usize, raw: &ActionPlan, next: Option<&ActionPlan>) -> ActionPlan {
        let mut plan = raw.clone();
        if plan.instruction.trim().is_empty() {
            plan.instruction = plan.effective_instruction();
        }
        if plan.action_type == ActionType::Navigate {
            let url = plan.value.clone().unwrap_or_else(|| plan.target.clone());
            plan.value = Some(resolve_against(self.base_url.as_deref(), &url));
        }

        self.tracker.purge_expired(step);
        self.tracker.analyze_step(step, &plan.instruction);
        let hints = &mut plan.context_hints;
        if hints.ui_context.is_none() {
            hints.ui_context = self.tracker.needs_context(step, &plan.instruction);
        }
        if plan.action_type == ActionType::Verify && hints.navigation.is_none() {
            hints.navigation = self.navigation.clone();
        }
        if hints.previous_action.is_none() {
            hints.previous_action = self.previous_action.clone();
        }
        if hints.next_action_target.is_none() {
            hints.next_action_target = next
                .map(|n| n.search_text().trim().to_string())
                .filter(|t| !t.is_empty());
        }
        if hints.page_url.is_none() {
            hints.page_url = self.page.url().await.ok();
        }
        if hints.page_title.is_none() {
            hints.page_title = self.page.title().await.ok();
        }
        plan
    }

    fn record_success(&mut self, plan: &ActionPlan, report: &ActionReport) {
        match plan.action_type {
            ActionType::Navigate => {
                self.navigation = Some(navigation_outcome(plan, true));
            }
            ActionType::Click if report.post_signals.navigated => {
                self.tracker.clear_all();
            }
            _ => {}
        }
        self.previous_action = Some(describe(plan));
    }

    fn record_failure(&mut self, plan: &ActionPlan) {
        if plan.action_type == ActionType::Navigate {
            self.navigation = Some(navigation_outcome(plan, false));
        }
        self.previous_action = Some(describe(plan));
    }
}

fn navigation_outcome(plan: &ActionPlan, succeeded: bool) -> NavigationOutcome {
    NavigationOutcome {
        succeeded,
        expected: plan
            .value
            .clone()
            .map(|value| ExpectedUrl::Exact { value }),
    }
}

fn describe(plan: &ActionPlan) -> String {
    format!("{} {}", plan.action_type, plan.search_text())
}

/// Cancellation, timeouts and page failures are errors of the run; everything
/// else is the step failing against the page as it is.
fn status_for(err: &ActionError) -> StepStatus {
    match err {
        ActionError::Interrupted(_) | ActionError::Timeout(_) | ActionError::Page(_) => StepStatus::Error,
        _ => StepStatus::Failed,
    }
}

fn elapsed_ms(since: Instant) -> u64 {
    since.elapsed().as_millis() as u64
}
