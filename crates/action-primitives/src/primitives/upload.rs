//! Upload primitive - hand a local file to the page's file input

use std::path::{Path, PathBuf};

use cdp_adapter::{AnchorDescriptor, ClickMode, ElementInfo, PageDriver};
use stepwright_core_types::ExecCtx;
use tracing::{debug, info};

use crate::config::ExecutorConfig;
use crate::errors::ActionError;
use crate::primitives::{first_visible, pause};
use crate::types::Completion;

const FILE_INPUT: &str = "input[type='file']";

fn upload_controls() -> Vec<AnchorDescriptor> {
    vec![
        AnchorDescriptor::css("[data-testid*='upload']"),
        AnchorDescriptor::css("[class*='upload']"),
        AnchorDescriptor::text_contains("Select files"),
        AnchorDescriptor::text_contains("Upload"),
        AnchorDescriptor::text_contains("Drop files"),
    ]
}

/// File inputs are usually hidden behind a styled control, so visibility is not required.
async fn file_input(page: &dyn PageDriver) -> Result<Option<ElementInfo>, ActionError> {
    Ok(page
        .query(&AnchorDescriptor::css(FILE_INPUT))
        .await?
        .into_iter()
        .next())
}

/// Uploads `file` through the first file input, clicking an upload control first
/// when the page has none yet.
pub async fn execute_upload(
    page: &dyn PageDriver,
    ctx: &ExecCtx,
    config: &ExecutorConfig,
    file: &Path,
) -> Result<Completion, ActionError> {
    ctx.ensure_active()?;
    let exists = tokio::fs::metadata(file)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false);
    if !exists {
        return Err(ActionError::InvalidPlan(format!(
            "upload file {} does not exist",
            file.display()
        )));
    }
    let files = [PathBuf::from(file)];

    if let Some(input) = file_input(page).await? {
        info!(action_id = %ctx.action_id, file = %file.display(), "setting file input");
        page.set_input_files(&input.handle, &files).await?;
        return Ok(Completion::by("file_input").with_detail(format!("uploaded {}", file.display())));
    }

    let controls = upload_controls();
    let Some((anchor, control)) = first_visible(page, &controls).await else {
        return Err(ActionError::NotFound(
            "no file input or upload control on the page".into(),
        ));
    };
    debug!(action_id = %ctx.action_id, anchor = %anchor, "clicking upload control");
    page.click_element(&control.handle, ClickMode::Force).await?;
    pause(ctx, config.click_settle()).await?;

    let Some(input) = file_input(page).await? else {
        return Err(ActionError::NotFound(format!(
            "upload control {} did not expose a file input",
            anchor
        )));
    };
    info!(action_id = %ctx.action_id, file = %file.display(), "setting file input after upload control");
    page.set_input_files(&input.handle, &files).await?;
    Ok(Completion::by("upload_control").with_detail(format!("uploaded {}", file.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdp_adapter::mock::{MockAction, MockPage, Reaction};
    use std::time::Duration;

    fn ctx() -> ExecCtx {
        ExecCtx::with_budget(6, Duration::from_secs(5))
    }

    fn sample_file(dir: &tempfile::TempDir) -> PathBuf {
        let path = dir.path().join("notes.pdf");
        std::fs::write(&path, b"%PDF-1.4").unwrap();
        path
    }

    #[tokio::test]
    async fn hidden_file_input_is_used_directly() {
        let dir = tempfile::tempdir().unwrap();
        let file = sample_file(&dir);
        let page = MockPage::new();
        let input = ElementInfo::new("sw-file", "input", "").hidden();
        page.add(AnchorDescriptor::css(FILE_INPUT), vec![input.clone()]);

        let done = execute_upload(&page, &ctx(), &ExecutorConfig::default(), &file)
            .await
            .unwrap();
        assert_eq!(done.strategy.as_deref(), Some("file_input"));
        assert_eq!(
            page.actions(),
            vec![MockAction::Upload {
                element: input.handle,
                files: vec![file],
            }]
        );
    }

    #[tokio::test]
    async fn upload_control_reveals_the_input() {
        let dir = tempfile::tempdir().unwrap();
        let file = sample_file(&dir);
        let page = MockPage::new();
        let control = ElementInfo::new("sw-drop", "div", "Drop files here");
        page.add(AnchorDescriptor::text_contains("Drop files"), vec![control.clone()]);
        page.on_activate(
            &control.handle,
            Reaction::Reveal {
                anchor: AnchorDescriptor::css(FILE_INPUT),
                elements: vec![ElementInfo::new("sw-file", "input", "").hidden()],
            },
        );

        let config = ExecutorConfig::default().without_pauses();
        let done = execute_upload(&page, &ctx(), &config, &file).await.unwrap();
        assert_eq!(done.strategy.as_deref(), Some("upload_control"));
    }

    #[tokio::test]
    async fn missing_file_is_an_invalid_plan() {
        let page = MockPage::new();
        let err = execute_upload(
            &page,
            &ctx(),
            &ExecutorConfig::default(),
            Path::new("/nonexistent/stepwright.pdf"),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), "invalid_plan");
    }

    #[tokio::test]
    async fn page_without_upload_affordance_fails() {
        let dir = tempfile::tempdir().unwrap();
        let file = sample_file(&dir);
        let page = MockPage::new();
        let err = execute_upload(&page, &ctx(), &ExecutorConfig::default(), &file)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }
}
