//! Action executor - turns a plan plus its resolved target into page input.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use cdp_adapter::PageDriver;
use chrono::Utc;
use stepwright_core_types::{ActionPlan, ActionType, ExecCtx, ResolutionResult};
use tracing::{debug, info, warn};

use crate::config::ExecutorConfig;
use crate::credentials::CredentialProvider;
use crate::errors::ActionError;
use crate::metrics;
use crate::primitives::click::click_with_strategies;
use crate::primitives::download::{is_download_trigger, DownloadWatch};
use crate::primitives::dropdown::{click_menu_item, ensure_menu_open, is_dropdown_item, is_dropdown_trigger};
use crate::primitives::navigate::execute_navigate;
use crate::primitives::pause;
use crate::primitives::type_text::execute_type_text;
use crate::primitives::upload::execute_upload;
use crate::primitives::verify::execute_verify;
use crate::primitives::wait::execute_wait;
use crate::types::{ActionReport, ClickTarget, Completion, Landing, PostSignals};

/// Executes one [`ActionPlan`] against a page.
///
/// The executor is the only component that mutates the page. It never resolves
/// targets itself; click and type plans must come with a [`ResolutionResult`].
#[derive(Clone, Default)]
pub struct ActionExecutor {
    config: ExecutorConfig,
    credentials: Option<Arc<dyn CredentialProvider>>,
}

impl std::fmt::Debug for ActionExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionExecutor")
            .field("config", &self.config)
            .field("credentials", &self.credentials.is_some())
            .finish()
    }
}

impl ActionExecutor {
    pub fn new(config: ExecutorConfig) -> Self {
        Self {
            config,
            credentials: None,
        }
    }

    pub fn with_credentials(mut self, credentials: Arc<dyn CredentialProvider>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Directory downloads land in: the browser's, else the configured one.
    pub fn download_dir(&self, page: &dyn PageDriver) -> PathBuf {
        page.download_dir()
            .unwrap_or_else(|| self.config.downloads_dir.clone())
    }

    pub async fn execute(
        &self,
        plan: &ActionPlan,
        resolution: Option<&ResolutionResult>,
        page: &dyn PageDriver,
        ctx: &ExecCtx,
    ) -> Result<ActionReport, ActionError> {
        let started_at = Utc::now();
        let start = Instant::now();
        info!(
            action_id = %ctx.action_id,
            step = ctx.step,
            action = plan.action_type.name(),
            target = %plan.target,
            "executing action"
        );

        let outcome = self.dispatch(plan, resolution, page, ctx).await;
        let elapsed = start.elapsed();
        metrics::record_action(plan.action_type.name(), outcome.is_ok(), elapsed);
        let completion = match outcome {
            Ok(completion) => completion,
            Err(err) => {
                warn!(
                    action_id = %ctx.action_id,
                    step = ctx.step,
                    action = plan.action_type.name(),
                    error = %err,
                    "action failed"
                );
                return Err(err);
            }
        };

        let signals = PostSignals {
            url_after: page.url().await.ok(),
            title_after: page.title().await.ok(),
            navigated: completion.navigated,
            download: completion.download,
        };
        let mut report = ActionReport::success(plan.action_type, started_at, elapsed.as_millis() as u64)
            .with_signals(signals);
        if let Some(strategy) = completion.strategy {
            report = report.with_strategy(strategy);
        }
        if let Some(detail) = completion.detail {
            report = report.with_detail(detail);
        }
        info!(
            action_id = %ctx.action_id,
            step = ctx.step,
            action = plan.action_type.name(),
            strategy = ?report.strategy,
            latency_ms = report.latency_ms,
            navigated = report.post_signals.navigated,
            "action completed"
        );
        Ok(report)
    }

    async fn dispatch(
        &self,
        plan: &ActionPlan,
        resolution: Option<&ResolutionResult>,
        page: &dyn PageDriver,
        ctx: &ExecCtx,
    ) -> Result<Completion, ActionError> {
        ctx.ensure_active()?;
        match plan.action_type {
            ActionType::Click => {
                let target = self.target(plan, resolution, page).await?;
                self.click(plan, &target, page, ctx).await
            }
            ActionType::Type => {
                let target = self.target(plan, resolution, page).await?;
                let text = plan
                    .value
                    .as_deref()
                    .ok_or_else(|| ActionError::InvalidPlan("type step without text".into()))?;
                execute_type_text(
                    page,
                    ctx,
                    &self.config,
                    &target,
                    text,
                    self.credentials.as_deref(),
                )
                .await
            }
            ActionType::Verify => {
                let kind = plan
                    .verification
                    .as_ref()
                    .ok_or_else(|| ActionError::InvalidPlan("verify step without a kind".into()))?;
                let expected = plan.value.as_deref().unwrap_or(&plan.target);
                let dir = self.download_dir(page);
                execute_verify(
                    page,
                    ctx,
                    &self.config,
                    kind,
                    expected,
                    plan.context_hints.navigation.as_ref(),
                    &dir,
                )
                .await
            }
            ActionType::Upload => {
                let file = plan
                    .value
                    .as_deref()
                    .ok_or_else(|| ActionError::InvalidPlan("upload step without a file".into()))?;
                execute_upload(page, ctx, &self.config, Path::new(file)).await
            }
            ActionType::Wait => execute_wait(page, ctx, &self.config, plan.wait.as_ref()).await,
            ActionType::Navigate => {
                let url = plan.value.as_deref().unwrap_or(&plan.target);
                execute_navigate(page, ctx, &self.config, url).await
            }
        }
    }

    async fn target(
        &self,
        plan: &ActionPlan,
        resolution: Option<&ResolutionResult>,
        page: &dyn PageDriver,
    ) -> Result<ClickTarget, ActionError> {
        let resolution = resolution.ok_or_else(|| {
            ActionError::InvalidPlan(format!(
                "{} step for '{}' has no resolved target",
                plan.action_type, plan.target
            ))
        })?;
        ClickTarget::from_resolution(resolution, page).await
    }

    /// Click with strategy fallback, then the follow-ups the target calls for:
    /// waiting out a navigation, awaiting a download or making sure a dropdown opened.
    pub async fn click(
        &self,
        plan: &ActionPlan,
        target: &ClickTarget,
        page: &dyn PageDriver,
        ctx: &ExecCtx,
    ) -> Result<Completion, ActionError> {
        let url_before = page.url().await.unwrap_or_default();
        let watch = if is_download_trigger(&plan.target, target.element.as_ref()) {
            let dir = self.download_dir(page);
            debug!(action_id = %ctx.action_id, dir = %dir.display(), "watching for a download");
            Some(DownloadWatch::start(dir).await)
        } else {
            None
        };

        let (strategy, landing) = if is_dropdown_item(plan) {
            click_menu_item(page, ctx, &self.config, &plan.target, target).await?
        } else {
            click_with_strategies(page, ctx, target, plan.force).await?
        };
        let mut completion = Completion::by(strategy);

        match landing {
            Landing::Navigated => {
                pause(ctx, self.config.navigation_settle()).await?;
                completion.navigated = true;
            }
            Landing::Completed => {
                if let Some(watch) = watch {
                    completion.download = watch
                        .wait(self.config.download_timeout(), self.config.download_poll(), ctx)
                        .await?;
                } else if is_dropdown_trigger(&plan.target) {
                    let retrigger = ensure_menu_open(page, ctx, &self.config, target).await?;
                    completion.detail = Some(match retrigger {
                        Some(name) => format!("menu opened after {}", name),
                        None => "menu opened".to_string(),
                    });
                }
                pause(ctx, self.config.click_settle()).await?;
            }
        }

        if !completion.navigated {
            let url_after = page.url().await.unwrap_or_default();
            if !url_before.is_empty() && url_after != url_before {
                debug!(action_id = %ctx.action_id, from = %url_before, to = %url_after, "click changed the url");
                completion.navigated = true;
            }
        }
        Ok(completion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdp_adapter::mock::MockPage;
    use cdp_adapter::ElementInfo;
    use std::time::Duration;
    use stepwright_core_types::{SourceTier, WaitMode};

    fn ctx() -> ExecCtx {
        ExecCtx::with_budget(1, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn click_without_resolution_is_an_invalid_plan() {
        let page = MockPage::new();
        let executor = ActionExecutor::new(ExecutorConfig::default().without_pauses());
        let err = executor
            .execute(&ActionPlan::click("Save"), None, &page, &ctx())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_plan");
    }

    #[tokio::test]
    async fn report_carries_strategy_and_signals() {
        let page = MockPage::new().with_title("Dashboard");
        let button = ElementInfo::new("sw-save", "button", "Save");
        page.place(button.clone());
        let resolution = ResolutionResult::found(SourceTier::Semantic, button.center(), Some(button.bounding_box), 1.0)
            .with_element(button.handle.clone());

        let executor = ActionExecutor::new(ExecutorConfig::default().without_pauses());
        let report = executor
            .execute(&ActionPlan::click("Save"), Some(&resolution), &page, &ctx())
            .await
            .unwrap();
        assert!(report.ok);
        assert_eq!(report.strategy.as_deref(), Some("regular_click"));
        assert_eq!(report.post_signals.title_after.as_deref(), Some("Dashboard"));
        assert!(!report.post_signals.navigated);
    }

    #[tokio::test]
    async fn wait_plans_need_no_target() {
        let page = MockPage::new();
        let executor = ActionExecutor::new(ExecutorConfig::default());
        let report = executor
            .execute(&ActionPlan::wait(WaitMode::Duration { ms: 5 }), None, &page, &ctx())
            .await
            .unwrap();
        assert_eq!(report.detail.as_deref(), Some("waited 5 ms"));
    }

    #[test]
    fn debug_output_hides_credentials() {
        let creds: crate::credentials::MapCredentials = [("svc.key", "s3cret")].into_iter().collect();
        let executor = ActionExecutor::default().with_credentials(Arc::new(creds));
        assert!(!format!("{:?}", executor).contains("s3cret"));
    }
}
