use std::sync::Arc;
use std::time::Duration;

use action_primitives::metrics::strategy_count;
use action_primitives::{ActionExecutor, ExecutorConfig, MapCredentials};
use cdp_adapter::mock::{MockAction, MockPage, Reaction};
use cdp_adapter::{AnchorDescriptor, ElementInfo};
use stepwright_core_types::{
    ActionPlan, BoundingBox, ContextHints, ExecCtx, ExpectedUrl, NavigationOutcome, ResolutionResult,
    SourceTier, VerificationKind, WaitMode,
};

fn ctx(step: usize) -> ExecCtx {
    ExecCtx::with_budget(step, Duration::from_secs(10))
}

fn executor() -> ActionExecutor {
    ActionExecutor::new(ExecutorConfig::default().without_pauses())
}

fn resolved(el: &ElementInfo) -> ResolutionResult {
    ResolutionResult::found(SourceTier::Semantic, el.center(), Some(el.bounding_box), 0.95)
        .with_element(el.handle.clone())
}

fn menu(items: &[&str]) -> Vec<Reaction> {
    vec![
        Reaction::Reveal {
            anchor: AnchorDescriptor::css("[role='menu']"),
            elements: vec![ElementInfo::new("sw-menu", "div", "").with_role("menu")],
        },
        Reaction::Reveal {
            anchor: AnchorDescriptor::css("[role='menu'] [role='menuitem']"),
            elements: items
                .iter()
                .enumerate()
                .map(|(i, label)| {
                    ElementInfo::new(format!("sw-item-{}", i), "div", *label)
                        .with_role("menuitem")
                        .in_menu()
                })
                .collect(),
        },
    ]
}

#[tokio::test]
async fn dropdown_trigger_opens_its_menu() {
    let page = MockPage::new();
    let trigger = ElementInfo::new("sw-create", "button", "Create")
        .with_box(BoundingBox::new(20.0, 20.0, 90.0, 32.0));
    page.place(trigger.clone());
    for reaction in menu(&["APP", "Conversation", "Chatbot"]) {
        page.on_activate(&trigger.handle, reaction);
    }

    let report = executor()
        .execute(&ActionPlan::click("Create dropdown"), Some(&resolved(&trigger)), &page, &ctx(1))
        .await
        .unwrap();
    assert_eq!(report.strategy.as_deref(), Some("regular_click"));
    assert_eq!(report.detail.as_deref(), Some("menu opened"));
}

#[tokio::test]
async fn stubborn_dropdown_is_opened_by_keyboard() {
    let page = MockPage::new();
    let trigger = ElementInfo::new("sw-create", "button", "Create");
    page.place(trigger.clone());
    for reaction in menu(&["Chatbot"]) {
        page.on_key(cdp_adapter::Key::Enter, reaction);
    }

    let report = executor()
        .execute(&ActionPlan::click("Create dropdown"), Some(&resolved(&trigger)), &page, &ctx(1))
        .await
        .unwrap();
    assert_eq!(report.detail.as_deref(), Some("menu opened after key_enter"));
}

#[tokio::test]
async fn dropdown_that_never_opens_fails_the_step() {
    let page = MockPage::new();
    let trigger = ElementInfo::new("sw-create", "button", "Create");
    page.place(trigger.clone());
    let err = executor()
        .execute(&ActionPlan::click("Create dropdown"), Some(&resolved(&trigger)), &page, &ctx(1))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "context_mismatch");
}

#[tokio::test]
async fn menu_items_are_clicked_inside_the_menu() {
    let page = MockPage::new();
    let item = ElementInfo::new("sw-chatbot", "div", "Chatbot")
        .with_role("menuitem")
        .in_menu();
    page.add(
        AnchorDescriptor::has_text("[role='menu'] [role='menuitem']", "Chatbot"),
        vec![item.clone()],
    );
    let elsewhere = ElementInfo::new("sw-heading", "h2", "Chatbot");
    page.place(elsewhere.clone());

    let plan = ActionPlan::click("Chatbot").with_instruction("click on Chatbot from the dropdown");
    let report = executor()
        .execute(&plan, Some(&resolved(&elsewhere)), &page, &ctx(2))
        .await
        .unwrap();
    assert_eq!(report.strategy.as_deref(), Some("dropdown_force_click"));
    assert!(page.actions().contains(&MockAction::Click {
        element: item.handle,
        mode: cdp_adapter::ClickMode::Force,
    }));
}

#[tokio::test]
async fn navigation_during_click_counts_as_success() {
    let page = MockPage::new();
    let link = ElementInfo::new("sw-conv", "a", "New conversation");
    page.place(link.clone());
    page.on_activate(
        &link.handle,
        Reaction::Navigate {
            url: "https://app.example.com/converse/7".into(),
            title: "Conversation".into(),
        },
    );
    page.on_activate(&link.handle, Reaction::Interrupt);

    let before = strategy_count("click", "regular_click", "navigated");
    let report = executor()
        .execute(&ActionPlan::click("New conversation"), Some(&resolved(&link)), &page, &ctx(3))
        .await
        .unwrap();
    assert!(report.post_signals.navigated);
    assert_eq!(
        report.post_signals.url_after.as_deref(),
        Some("https://app.example.com/converse/7")
    );
    assert!(strategy_count("click", "regular_click", "navigated") > before);
}

#[tokio::test]
async fn export_click_waits_for_the_file() {
    let downloads = tempfile::tempdir().unwrap();
    let page = MockPage::new().with_download_dir(downloads.path());
    let button = ElementInfo::new("sw-export", "button", "Export CSV");
    page.place(button.clone());

    let target = downloads.path().join("results.csv");
    let writer = {
        let target = target.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(40)).await;
            std::fs::write(target, "id,name\n1,bot\n").unwrap();
        })
    };

    let report = executor()
        .execute(&ActionPlan::click("Export CSV"), Some(&resolved(&button)), &page, &ctx(4))
        .await
        .unwrap();
    writer.await.unwrap();
    assert_eq!(report.post_signals.download, Some(target));
}

#[tokio::test]
async fn missing_download_is_not_fatal() {
    let downloads = tempfile::tempdir().unwrap();
    let page = MockPage::new().with_download_dir(downloads.path());
    let button = ElementInfo::new("sw-export", "button", "Export");
    page.place(button.clone());

    let config = ExecutorConfig {
        download_timeout_ms: 50,
        ..ExecutorConfig::default().without_pauses()
    };
    let report = ActionExecutor::new(config)
        .execute(&ActionPlan::click("Download report"), Some(&resolved(&button)), &page, &ctx(4))
        .await
        .unwrap();
    assert!(report.ok);
    assert!(report.post_signals.download.is_none());
}

#[tokio::test]
async fn typing_substitutes_credentials() {
    let page = MockPage::new();
    let field = ElementInfo::new("sw-password", "input", "").editable();
    page.place(field.clone());
    let creds: MapCredentials = [("aihub.password", "correct horse")].into_iter().collect();

    let report = executor()
        .with_credentials(Arc::new(creds))
        .execute(
            &ActionPlan::type_text("password field", "{cred:aihub.password}"),
            Some(&resolved(&field)),
            &page,
            &ctx(5),
        )
        .await
        .unwrap();
    assert_eq!(report.detail.as_deref(), Some("typed 13 characters"));
    assert!(page.actions().contains(&MockAction::Insert {
        element: field.handle,
        text: "correct horse".into(),
    }));
}

#[tokio::test]
async fn typed_value_that_does_not_stick_fails() {
    let page = MockPage::new();
    let field = ElementInfo::new("sw-email", "input", "").editable();
    page.place(field.clone());
    page.override_value(&field.handle, "");

    let err = executor()
        .execute(
            &ActionPlan::type_text("email", "qa@example.com"),
            Some(&resolved(&field)),
            &page,
            &ctx(5),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "value_mismatch");
}

#[tokio::test]
async fn url_change_is_rejected_after_a_failed_navigation() {
    let page = MockPage::new().with_url("https://app.example.com/converse/1");
    let plan = ActionPlan::verify(VerificationKind::UrlChanged, "conversation").with_hints(ContextHints {
        navigation: Some(NavigationOutcome {
            succeeded: false,
            expected: Some(ExpectedUrl::Exact {
                value: "conversation".into(),
            }),
        }),
        ..ContextHints::default()
    });
    let err = executor().execute(&plan, None, &page, &ctx(6)).await.unwrap_err();
    assert_eq!(err.kind(), "verification_failed");

    let plan = ActionPlan::verify(VerificationKind::UrlChanged, "conversation");
    let report = executor().execute(&plan, None, &page, &ctx(6)).await.unwrap();
    assert_eq!(report.strategy.as_deref(), Some("url_changed"));
}

#[tokio::test]
async fn contains_elements_through_the_executor() {
    let page = MockPage::new();
    for label in ["APP", "Chatbot"] {
        page.add(
            AnchorDescriptor::has_text("[role='menu'] button", label),
            vec![ElementInfo::new(format!("sw-{}", label), "button", label).in_menu()],
        );
    }
    let plan = ActionPlan::verify(VerificationKind::ContainsElements, "APP, Conversation, Chatbot");
    let report = executor().execute(&plan, None, &page, &ctx(7)).await.unwrap();
    assert_eq!(report.detail.as_deref(), Some("found 2/3 entries, missing Conversation"));
}

#[tokio::test]
async fn upload_and_navigate_report_their_effects() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("faq.txt");
    std::fs::write(&file, "Q: A").unwrap();
    let page = MockPage::new().with_url("about:blank");
    page.add(
        AnchorDescriptor::css("input[type='file']"),
        vec![ElementInfo::new("sw-file", "input", "").hidden()],
    );

    let nav = executor()
        .execute(&ActionPlan::navigate("https://app.example.com/files"), None, &page, &ctx(8))
        .await
        .unwrap();
    assert!(nav.post_signals.navigated);

    let upload = executor()
        .execute(
            &ActionPlan::upload("file input", file.to_string_lossy()),
            None,
            &page,
            &ctx(9),
        )
        .await
        .unwrap();
    assert_eq!(upload.strategy.as_deref(), Some("file_input"));
}

#[test]
fn page_load_wait_runs_on_a_plain_thread() {
    let page = MockPage::new();
    let report = tokio_test::block_on(executor().execute(
        &ActionPlan::wait(WaitMode::PageLoad { timeout_ms: 1000 }),
        None,
        &page,
        &ctx(10),
    ))
    .unwrap();
    assert_eq!(report.detail.as_deref(), Some("page loaded"));
}
