use std::sync::Arc;
use std::time::{Duration, Instant};

use action_locator::{ResolverConfig, TargetResolver};
use action_primitives::{ActionExecutor, ExecutorConfig};
use async_trait::async_trait;
use cdp_adapter::mock::{MockAction, MockPage, Reaction};
use cdp_adapter::{AnchorDescriptor, ClickMode, ElementInfo};
use stepwright::{RunSettings, TestPlan, TestSession};
use stepwright_core_types::{ActionPlan, BoundingBox, StepStatus, VerificationKind, WaitMode};
use stepwright_llm::{LlmError, NormalizeRequest, StaticNormalizer, TermNormalizer};
use tempfile::TempDir;
use ui_context::{TrackerConfig, UiContextTracker};

const MENU_ITEMS: &str = "[role='menu'] [role='menuitem']";

fn session(page: MockPage, settings: RunSettings) -> (TestSession<MockPage>, TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = ResolverConfig {
        vision_backoff_ms: 1,
        screenshot_dir: dir.path().join("shots"),
        ..ResolverConfig::default()
    };
    let resolver = TargetResolver::new(config, Arc::new(StaticNormalizer), None);
    let executor = ActionExecutor::new(ExecutorConfig::default().without_pauses());
    let tracker = UiContextTracker::new(TrackerConfig::default());
    (
        TestSession::new(page, resolver, executor, tracker, settings),
        dir,
    )
}

/// A "Create" button whose menu holds a "Chatbot" item, plus a same-named link
/// outside the menu.
fn studio_page() -> (MockPage, ElementInfo) {
    let page = MockPage::new().with_url("https://app.example.com/studio");
    let trigger = ElementInfo::new("sw-create", "button", "Create")
        .with_box(BoundingBox::new(20.0, 20.0, 90.0, 32.0));
    page.add(
        AnchorDescriptor::has_text("button[aria-haspopup='true']:not([role='tab'])", "Create"),
        vec![trigger.clone()],
    );
    page.add(
        AnchorDescriptor::text_exact("Chatbot"),
        vec![ElementInfo::new("sw-nav-chatbot", "a", "Chatbot")
            .with_box(BoundingBox::new(20.0, 600.0, 80.0, 20.0))],
    );

    let item = ElementInfo::new("sw-item-chatbot", "div", "Chatbot")
        .with_role("menuitem")
        .in_menu()
        .with_box(BoundingBox::new(20.0, 60.0, 160.0, 28.0));
    page.on_activate(
        &trigger.handle,
        Reaction::Reveal {
            anchor: AnchorDescriptor::css("[role='menu']"),
            elements: vec![ElementInfo::new("sw-menu", "div", "")
                .with_role("menu")
                .with_box(BoundingBox::new(20.0, 56.0, 170.0, 120.0))],
        },
    );
    page.on_activate(
        &trigger.handle,
        Reaction::Reveal {
            anchor: AnchorDescriptor::css(MENU_ITEMS),
            elements: vec![item.clone()],
        },
    );
    page.on_activate(
        &trigger.handle,
        Reaction::Reveal {
            anchor: AnchorDescriptor::has_text(MENU_ITEMS, "Chatbot"),
            elements: vec![item.clone()],
        },
    );
    (page, item)
}

#[tokio::test]
async fn dropdown_item_is_picked_inside_the_menu_it_opened() {
    let (page, item) = studio_page();
    let (mut session, _dir) = session(page, RunSettings::default());
    let plan = TestPlan::new(
        "create chatbot",
        vec![
            ActionPlan::click("Create dropdown").with_instruction("click on Create dropdown"),
            ActionPlan::click("Chatbot").with_instruction("click on Chatbot from dropdown"),
        ],
    );

    let report = session.run(&plan).await;
    assert!(report.is_success(), "{:?}", report.results);

    let page = session.page();
    assert!(page
        .queries()
        .contains(&AnchorDescriptor::has_text(MENU_ITEMS, "Chatbot").to_string()));
    assert!(page.actions().contains(&MockAction::Click {
        element: item.handle,
        mode: ClickMode::Force,
    }));
    assert!(!page.actions().iter().any(|a| matches!(
        a,
        MockAction::Click { element, .. } if element.0 == "sw-nav-chatbot"
    )));
}

#[tokio::test]
async fn unresolved_target_fails_the_step_and_the_run_goes_on() {
    let page = MockPage::new();
    let (mut session, _dir) = session(page, RunSettings::default());
    let plan = TestPlan::new(
        "missing button",
        vec![
            ActionPlan::click("Launch rocket"),
            ActionPlan::navigate("https://app.example.com/settings"),
        ],
    );

    let report = session.run(&plan).await;
    assert_eq!(report.results.len(), 2);
    assert_eq!(report.results[0].status, StepStatus::Failed);
    assert!(report.results[0].error_message.is_some());
    assert_eq!(report.results[1].status, StepStatus::Success);
    assert_eq!(report.passed(), 1);
    assert!(!report.is_success());
    assert!(session
        .page()
        .actions()
        .contains(&MockAction::Goto("https://app.example.com/settings".into())));
}

#[tokio::test]
async fn url_check_fails_after_a_failed_navigation() {
    let page = MockPage::new().with_url("https://app.example.com/converse/12");
    let (mut session, _dir) = session(page, RunSettings::default());
    let plan = TestPlan::new(
        "conversation",
        vec![
            ActionPlan::navigate("ftp://files.example.com/converse"),
            ActionPlan::verify(VerificationKind::UrlChanged, "conversation"),
        ],
    );

    let report = session.run(&plan).await;
    assert_eq!(report.results[0].status, StepStatus::Failed);
    assert_eq!(report.results[1].status, StepStatus::Failed);
    let message = report.results[1].error_message.clone().unwrap_or_default();
    assert!(message.contains("last navigation failed"), "{}", message);
}

#[tokio::test]
async fn relative_navigation_joins_the_plan_base_url() {
    let page = MockPage::new();
    let (mut session, _dir) = session(page, RunSettings::default());
    let plan = TestPlan::new("relative", vec![ActionPlan::navigate("apps/new")])
        .with_base_url("https://app.example.com/studio/");

    let report = session.run(&plan).await;
    assert!(report.is_success(), "{:?}", report.results);
    assert_eq!(
        session.page().actions(),
        vec![MockAction::Goto("https://app.example.com/studio/apps/new".into())]
    );
}

#[tokio::test]
async fn each_run_starts_without_open_contexts() {
    let (page, _) = studio_page();
    let (mut session, _dir) = session(page, RunSettings::default());
    let opener = TestPlan::new(
        "open menu",
        vec![ActionPlan::click("Create dropdown").with_instruction("click on Create dropdown")],
    );
    assert!(session.run(&opener).await.is_success());
    assert!(!session.tracker().is_empty());

    let idle = TestPlan::new("idle", vec![ActionPlan::wait(WaitMode::Duration { ms: 1 })]);
    assert!(session.run(&idle).await.is_success());
    assert!(session.tracker().is_empty());
    assert!(session.resolver().cache().is_empty());
}

#[tokio::test]
async fn stop_on_failure_skips_the_remaining_steps() {
    let settings = RunSettings {
        stop_on_failure: true,
        ..RunSettings::default()
    };
    let (mut session, _dir) = session(MockPage::new(), settings);
    let plan = TestPlan::new(
        "strict",
        vec![
            ActionPlan::click("Launch rocket"),
            ActionPlan::navigate("https://app.example.com/settings"),
        ],
    );

    let report = session.run(&plan).await;
    assert_eq!(report.results.len(), 1);
    assert!(session.page().actions().is_empty());
}

#[tokio::test]
async fn cancelled_session_reports_every_step_as_not_run() {
    let (mut session, _dir) = session(MockPage::new(), RunSettings::default());
    session.cancel_token().cancel();
    let plan = TestPlan::new(
        "cancelled",
        vec![
            ActionPlan::navigate("https://app.example.com/"),
            ActionPlan::click("Create"),
        ],
    );

    let report = session.run(&plan).await;
    assert_eq!(report.results.len(), 2);
    for result in &report.results {
        assert_eq!(result.status, StepStatus::Error);
        assert!(result
            .error_message
            .as_deref()
            .unwrap_or_default()
            .starts_with("not run"));
    }
    assert!(session.page().actions().is_empty());
}

#[tokio::test]
async fn failed_opener_still_scopes_the_next_pick() {
    let page = MockPage::new().with_url("https://app.example.com/studio");
    page.add(
        AnchorDescriptor::text_exact("Chatbot"),
        vec![ElementInfo::new("sw-nav-chatbot", "a", "Chatbot")
            .with_box(BoundingBox::new(20.0, 600.0, 80.0, 20.0))],
    );
    let item = ElementInfo::new("sw-item-chatbot", "div", "Chatbot")
        .with_role("menuitem")
        .in_menu()
        .with_box(BoundingBox::new(20.0, 60.0, 160.0, 28.0));
    page.add(AnchorDescriptor::has_text(MENU_ITEMS, "Chatbot"), vec![item.clone()]);

    let (mut session, _dir) = session(page, RunSettings::default());
    let plan = TestPlan::new(
        "menu already open",
        vec![
            ActionPlan::click("Create dropdown").with_instruction("click on Create dropdown"),
            ActionPlan::click("Chatbot").with_instruction("click the Chatbot option"),
        ],
    );

    let report = session.run(&plan).await;
    assert_eq!(report.results[0].status, StepStatus::Failed);
    assert_eq!(report.results[1].status, StepStatus::Success, "{:?}", report.results[1]);
    let page = session.page();
    assert!(page.actions().contains(&MockAction::Click {
        element: item.handle,
        mode: ClickMode::Force,
    }));
    assert!(!page.actions().iter().any(|a| matches!(
        a,
        MockAction::Click { element, .. } if element.0 == "sw-nav-chatbot"
    )));
}

struct StalledNormalizer;

#[async_trait]
impl TermNormalizer for StalledNormalizer {
    async fn normalize(&self, request: &NormalizeRequest) -> Result<Vec<String>, LlmError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(vec![request.target.clone()])
    }
}

#[tokio::test]
async fn step_deadline_during_resolution_is_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = ResolverConfig {
        screenshot_dir: dir.path().join("shots"),
        ..ResolverConfig::default()
    };
    let resolver = TargetResolver::new(config, Arc::new(StalledNormalizer), None);
    let executor = ActionExecutor::new(ExecutorConfig::default().without_pauses());
    let tracker = UiContextTracker::new(TrackerConfig::default());
    let settings = RunSettings {
        step_timeout_secs: 1,
        ..RunSettings::default()
    };
    let mut session = TestSession::new(MockPage::new(), resolver, executor, tracker, settings);
    let plan = TestPlan::new("slow model", vec![ActionPlan::click("Launch rocket")]);

    let started = Instant::now();
    let report = session.run(&plan).await;
    assert!(started.elapsed() < Duration::from_secs(4));
    assert_eq!(report.results[0].status, StepStatus::Error);
    assert!(report.results[0]
        .error_message
        .as_deref()
        .unwrap_or_default()
        .contains("timeout"));
}
