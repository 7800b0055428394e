//! Type text primitive - fill an input and check what it holds afterwards

use cdp_adapter::PageDriver;
use stepwright_core_types::ExecCtx;
use tracing::{debug, info, warn};

use crate::config::ExecutorConfig;
use crate::credentials::{resolve_placeholders, CredentialProvider};
use crate::errors::ActionError;
use crate::types::{ClickTarget, Completion};

/// Focuses the target, optionally clears it, inserts `text` and reads the value back.
///
/// `{cred:service.key}` placeholders are substituted first. Only character
/// counts are logged, never the text.
pub async fn execute_type_text(
    page: &dyn PageDriver,
    ctx: &ExecCtx,
    config: &ExecutorConfig,
    target: &ClickTarget,
    text: &str,
    credentials: Option<&dyn CredentialProvider>,
) -> Result<Completion, ActionError> {
    ctx.ensure_active()?;
    let element = target.element.as_ref().ok_or_else(|| {
        ActionError::NotFound(format!("no input element at {}", target.describe()))
    })?;

    let resolved = resolve_placeholders(text, credentials);
    if !resolved.unresolved.is_empty() {
        warn!(
            action_id = %ctx.action_id,
            unresolved = ?resolved.unresolved,
            "credential placeholders left unresolved"
        );
    }
    let expected_chars = resolved.text.chars().count();
    info!(
        action_id = %ctx.action_id,
        target = %target.describe(),
        chars = expected_chars,
        substituted = resolved.substituted,
        "typing text"
    );

    page.focus(&element.handle).await?;
    if config.clear_before_typing {
        page.clear(&element.handle).await?;
    }
    page.insert_text(&element.handle, &resolved.text).await?;
    ctx.ensure_active()?;

    let value = page.input_value(&element.handle).await?;
    let landed = if config.clear_before_typing {
        value == resolved.text
    } else {
        value.ends_with(&resolved.text)
    };
    if !landed {
        return Err(ActionError::ValueMismatch {
            expected_chars,
            actual_chars: value.chars().count(),
        });
    }
    debug!(action_id = %ctx.action_id, chars = expected_chars, "input value verified");

    let completion = Completion::by("fill").with_detail(format!("typed {} characters", expected_chars));
    Ok(completion)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::MapCredentials;
    use cdp_adapter::mock::{MockAction, MockPage};
    use cdp_adapter::ElementInfo;
    use std::time::Duration;

    fn ctx() -> ExecCtx {
        ExecCtx::with_budget(3, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn credentials_are_substituted_before_typing() {
        let page = MockPage::new();
        let input = ElementInfo::new("sw-email", "input", "").editable();
        let creds: MapCredentials = [("aihub.email", "qa@example.com")].into_iter().collect();

        let done = execute_type_text(
            &page,
            &ctx(),
            &ExecutorConfig::default(),
            &ClickTarget::element(input.clone()),
            "{cred:aihub.email}",
            Some(&creds),
        )
        .await
        .unwrap();
        assert_eq!(done.detail.as_deref(), Some("typed 14 characters"));
        assert!(page.actions().contains(&MockAction::Insert {
            element: input.handle,
            text: "qa@example.com".into(),
        }));
    }

    #[tokio::test]
    async fn mismatched_value_fails_with_counts_only() {
        let page = MockPage::new();
        let input = ElementInfo::new("sw-pw", "input", "").editable();
        page.override_value(&input.handle, "hunt");

        let err = execute_type_text(
            &page,
            &ctx(),
            &ExecutorConfig::default(),
            &ClickTarget::element(input),
            "hunter2",
            None,
        )
        .await
        .unwrap_err();
        match &err {
            ActionError::ValueMismatch {
                expected_chars,
                actual_chars,
            } => {
                assert_eq!(*expected_chars, 7);
                assert_eq!(*actual_chars, 4);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!err.to_string().contains("hunter2"));
    }

    #[tokio::test]
    async fn appending_keeps_existing_text() {
        let page = MockPage::new();
        let input = ElementInfo::new("sw-q", "textarea", "").editable();
        let config = ExecutorConfig {
            clear_before_typing: false,
            ..ExecutorConfig::default()
        };
        page.override_value(&input.handle, "hello world");
        execute_type_text(&page, &ctx(), &config, &ClickTarget::element(input.clone()), " world", None)
            .await
            .unwrap();
        assert!(!page
            .actions()
            .contains(&MockAction::Clear(input.handle.clone())));
    }

    #[tokio::test]
    async fn point_without_element_is_not_found() {
        let page = MockPage::new();
        let err = execute_type_text(
            &page,
            &ctx(),
            &ExecutorConfig::default(),
            &ClickTarget::at(stepwright_core_types::Point::new(1.0, 1.0)),
            "x",
            None,
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }
}
