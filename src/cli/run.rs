use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use action_primitives::CredentialProvider;
use anyhow::{bail, Context, Result};
use cdp_adapter::ChromiumSession;
use clap::Args;
use stepwright_core_types::StepStatus;
use tokio::fs;
use tracing::{info, warn};

use super::context::CliContext;
use super::output::{print_structured, OutputFormat};
use crate::credentials::{load_credentials_file, ChainedCredentials, EnvCredentials};
use crate::metrics;
use crate::plan::TestPlan;
use crate::session::{RunReport, TestSession};

#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    /// Test plan file (YAML)
    pub plan: PathBuf,

    /// Run the browser without a window
    #[arg(long, conflicts_with = "headed")]
    pub headless: bool,

    /// Run the browser with a window
    #[arg(long)]
    pub headed: bool,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,

    /// YAML credentials file (`service: { key: value }`)
    #[arg(long, value_name = "FILE")]
    pub credentials: Option<PathBuf>,

    /// Stop at the first failed step
    #[arg(long)]
    pub stop_on_failure: bool,

    /// Base url for relative navigate steps
    #[arg(long)]
    pub base_url: Option<String>,

    /// Write Prometheus metrics here after the run
    #[arg(long, value_name = "FILE")]
    pub metrics_out: Option<PathBuf>,
}

pub async fn cmd_run(args: RunArgs, ctx: &CliContext, output: OutputFormat) -> Result<()> {
    let mut plan = TestPlan::load(&args.plan)
        .await
        .with_context(|| format!("loading {}", args.plan.display()))?;
    if let Some(base) = &args.base_url {
        plan.base_url = Some(base.clone());
        plan.validate()?;
    }

    let mut config = ctx.config().clone();
    if args.headless {
        config.browser.headless = true;
    } else if args.headed {
        config.browser.headless = false;
    }
    if args.stop_on_failure {
        config.run.stop_on_failure = true;
    }
    let credentials = credential_chain(args.credentials.as_deref()).await?;

    metrics::register_metrics();
    info!(plan = %plan.name, headless = config.browser.headless, "launching browser");
    let browser = ChromiumSession::launch(config.browser.clone())
        .await
        .context("launching Chromium")?;
    let page = browser.new_page().await.context("opening a browser tab")?;

    let report = {
        let mut session = TestSession::from_config(page, &config, Some(credentials))?;
        let token = session.cancel_token();
        let interrupt = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received; cancelling the run");
                token.cancel();
            }
        });
        let report = session.run(&plan).await;
        interrupt.abort();
        report
    };

    if let Err(err) = browser.close().await {
        warn!(%err, "browser did not shut down cleanly");
    }

    if let Some(path) = &args.metrics_out {
        write_metrics(path).await?;
    }

    let format = if args.json { OutputFormat::Json } else { output };
    if !print_structured(&report, &format)? {
        print!("{}", render_human(&report));
    }

    if !report.is_success() {
        bail!(
            "{} of {} steps did not pass",
            report.failed(),
            report.results.len()
        );
    }
    Ok(())
}

/// Credentials file first, then `STEPWRIGHT_CRED_*` variables.
async fn credential_chain(file: Option<&Path>) -> Result<Arc<dyn CredentialProvider>> {
    let mut providers: Vec<Box<dyn CredentialProvider>> = Vec::new();
    if let Some(path) = file {
        providers.push(Box::new(load_credentials_file(path).await?));
    }
    providers.push(Box::new(EnvCredentials));
    Ok(Arc::new(ChainedCredentials::new(providers)))
}

async fn write_metrics(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    fs::write(path, metrics::render()?)
        .await
        .with_context(|| format!("writing {}", path.display()))?;
    info!(path = %path.display(), "metrics written");
    Ok(())
}

pub(crate) fn render_human(report: &RunReport) -> String {
    let mut out = format!("Run: {}\n", report.name);
    for result in &report.results {
        let mark = match result.status {
            StepStatus::Success => "ok",
            StepStatus::Failed => "FAILED",
            StepStatus::Error => "ERROR",
        };
        out.push_str(&format!(
            "{:>3}. [{}] {} ({})\n",
            result.step_number,
            mark,
            result.instruction,
            humantime::format_duration(Duration::from_millis(result.timing.total_ms))
        ));
        if let Some(message) = &result.error_message {
            out.push_str(&format!("       {}\n", message));
        }
    }
    out.push_str(&format!(
        "{} passed, {} failed in {}\n",
        report.passed(),
        report.failed(),
        humantime::format_duration(Duration::from_millis(report.elapsed_ms))
    ));
    if let Some(usage) = &report.llm_usage {
        out.push_str(&format!(
            "model calls: {} ({} in / {} out tokens, ~${:.4})\n",
            usage.total_requests, usage.input_tokens, usage.output_tokens, usage.estimated_cost
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use stepwright_core_types::{ActionType, StepExecutionResult, TimingBreakdown};

    #[test]
    fn human_report_lists_each_step() {
        let timing = TimingBreakdown {
            total_ms: 1500,
            ..TimingBreakdown::default()
        };
        let report = RunReport {
            name: "login".into(),
            started_at: Utc::now(),
            elapsed_ms: 2000,
            results: vec![
                StepExecutionResult::success(1, "navigate to /login", ActionType::Navigate, timing),
                StepExecutionResult::failed(
                    2,
                    "click on Sign in",
                    ActionType::Click,
                    timing,
                    "Target 'Sign in' not resolved",
                ),
            ],
            llm_usage: None,
        };
        let text = render_human(&report);
        assert!(text.contains("  1. [ok] navigate to /login (1s 500ms)"));
        assert!(text.contains("  2. [FAILED] click on Sign in"));
        assert!(text.contains("Target 'Sign in' not resolved"));
        assert!(text.ends_with("1 passed, 1 failed in 2s\n"));
    }

    #[tokio::test]
    async fn metrics_file_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("metrics.prom");
        metrics::record_step("navigate", "success");
        write_metrics(&path).await.unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("stepwright_step_results_total{action=\"navigate\",status=\"success\"}"));
    }
}
