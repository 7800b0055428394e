//! Dropdown handling: triggers that must visibly open a menu, and menu items that
//! need more persuasion than a regular click.

use cdp_adapter::{
    AdapterError, AnchorDescriptor, ClickMode, ElementInfo, Key, PageDriver, PageQuery,
};
use once_cell::sync::Lazy;
use regex::Regex;
use stepwright_core_types::{ActionPlan, ExecCtx};
use tracing::{debug, info, warn};

use crate::config::{ExecutorConfig, DROPDOWN_FORCE_ATTEMPTS};
use crate::errors::ActionError;
use crate::primitives::click::coordinate_click;
use crate::primitives::{pause, try_strategy, visible_matches};
use crate::types::{ClickTarget, Landing};

const TRIGGER_MARKERS: &[&str] = &["dropdown", "dropdown arrow", "create button", "dropdown button"];

static FROM_MENU: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bfrom\b.*\b(dropdown|menu)\b").expect("from-menu regex")
});

/// Containers whose presence means some menu is open.
pub const MENU_CONTAINERS: &[&str] = &[
    "[role='menu']",
    "[role='listbox']",
    "[role='combobox'][aria-expanded='true']",
    "[aria-expanded='true'] + [role='menu']",
    "[data-state='open'][role='menu']",
    "[data-state='open']",
    ".dropdown-menu",
    ".dropdown-content",
    "[class*='dropdown'][class*='open']",
    "[class*='menu'][class*='open']",
    "[data-testid*='dropdown']",
    "[data-testid*='menu']",
];

/// Items inside an open menu.
pub const MENU_ITEMS: &[&str] = &[
    "[role='menu'] [role='menuitem']",
    "[role='menu'] button",
    "[role='listbox'] [role='option']",
    "[aria-expanded='true'] + * [role='menuitem']",
    "[data-state='open'] [role='menuitem']",
    ".dropdown-menu [role='menuitem']",
    ".dropdown-menu button",
    ".dropdown-content button",
];

/// Scopes searched when re-locating a menu item right before clicking it.
const ITEM_SCOPES: &[&str] = &[
    "[role='menu'] [role='menuitem']",
    "[role='menu'] button",
    "[role='menu'] *",
    ".dropdown-menu *",
    ".dropdown-content *",
    "[data-testid*='menu'] *",
    "[data-testid*='dropdown'] *",
];

const CLICKABLE_PARENT_ROLES: &[&str] = &["menuitem", "button", "option"];

/// Fractions of the item width tried by the coordinate strategy.
const ITEM_CLICK_POINTS: [f64; 3] = [0.5, 0.3, 0.7];

const ITEM_KEYS: [Key; 3] = [Key::Enter, Key::Space, Key::ArrowDown];

pub fn is_dropdown_trigger(target: &str) -> bool {
    let lower = target.to_lowercase();
    TRIGGER_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// The step picks an entry from an already open dropdown.
pub fn is_dropdown_item(plan: &ActionPlan) -> bool {
    let scoped = plan
        .context_hints
        .ui_context
        .as_ref()
        .map(|hint| hint.ui_context_type == "dropdown")
        .unwrap_or(false);
    scoped || FROM_MENU.is_match(&plan.instruction)
}

/// A menu container is visible and shows at least one item; when `expected` is
/// non-empty one of the visible items must mention one of those labels.
pub async fn menu_is_open(page: &(impl PageQuery + ?Sized), expected: &[String]) -> bool {
    let mut container = None;
    for css in MENU_CONTAINERS {
        if let Ok(Some(_)) = page.find_visible(&AnchorDescriptor::css(*css)).await {
            container = Some(*css);
            break;
        }
    }
    let Some(container) = container else {
        debug!("no open menu container");
        return false;
    };

    let expected: Vec<String> = expected.iter().map(|item| item.to_lowercase()).collect();
    for css in MENU_ITEMS {
        let items = visible_matches(page, &AnchorDescriptor::css(*css), 5).await;
        if items.is_empty() {
            continue;
        }
        if expected.is_empty() {
            debug!(container, items = css, count = items.len(), "menu open with items");
            return true;
        }
        if let Some(item) = items.iter().find(|item| {
            let text = item.text.to_lowercase();
            expected.iter().any(|label| text.contains(label))
        }) {
            debug!(container, item = %item.text.trim(), "menu shows an expected item");
            return true;
        }
    }
    debug!(container, "menu container without recognizable items");
    false
}

/// Fresh handle for `term` inside an open menu, if one is there.
pub async fn locate_menu_item(page: &(impl PageQuery + ?Sized), term: &str) -> Option<ElementInfo> {
    for scope in ITEM_SCOPES {
        let anchor = AnchorDescriptor::has_text(*scope, term);
        match page.query(&anchor).await {
            Ok(found) => {
                if let Some(item) = found.into_iter().find(|el| el.visible && el.in_menu) {
                    debug!(anchor = %anchor, "menu item re-located");
                    return Some(item);
                }
            }
            Err(err) => debug!(anchor = %anchor, error = %err, "menu item probe failed"),
        }
    }
    None
}

async fn force_repeatedly(page: &dyn PageDriver, element: &ElementInfo) -> Result<(), AdapterError> {
    let mut last = AdapterError::internal("no force attempt made");
    for attempt in 1..=DROPDOWN_FORCE_ATTEMPTS {
        match page.click_element(&element.handle, ClickMode::Force).await {
            Ok(()) => return Ok(()),
            Err(err) if err.is_navigation_interrupted() => return Err(err),
            Err(err) => {
                debug!(attempt, error = %err, "forced item click failed");
                last = err;
            }
        }
    }
    Err(last)
}

async fn clickable_parent(
    page: &dyn PageDriver,
    element: &ElementInfo,
) -> Result<(), AdapterError> {
    let mut current = element.handle.clone();
    for _ in 0..2 {
        let Some(parent) = page.parent_of(&current).await? else {
            break;
        };
        let clickable = parent.cursor_pointer
            || CLICKABLE_PARENT_ROLES.iter().any(|role| parent.role_is(role));
        if parent.visible && parent.enabled && clickable {
            debug!(tag = %parent.tag, role = ?parent.role, "clicking clickable parent");
            return page.click_element(&parent.handle, ClickMode::Force).await;
        }
        current = parent.handle;
    }
    Err(AdapterError::not_found("no clickable parent"))
}

async fn click_points(page: &dyn PageDriver, target: &ClickTarget) -> Result<(), AdapterError> {
    let points = match &target.element {
        Some(el) if !el.bounding_box.is_empty() => ITEM_CLICK_POINTS
            .iter()
            .map(|fraction| el.bounding_box.point_at(*fraction))
            .collect(),
        _ => vec![target.point],
    };
    let mut last = AdapterError::internal("no point to click");
    for point in points {
        match coordinate_click(page, point).await {
            Ok(()) => return Ok(()),
            Err(err) if err.is_navigation_interrupted() => return Err(err),
            Err(err) => last = err,
        }
    }
    Err(last)
}

async fn keyboard_select(page: &dyn PageDriver, element: &ElementInfo) -> Result<(), AdapterError> {
    page.focus(&element.handle).await?;
    let mut last = AdapterError::internal("no key pressed");
    for key in ITEM_KEYS {
        match page.press_key(key).await {
            Ok(()) => return Ok(()),
            Err(err) if err.is_navigation_interrupted() => return Err(err),
            Err(err) => last = err,
        }
    }
    Err(last)
}

/// Clicks an entry of an open dropdown.
///
/// Waits for the menu to render, prefers a handle found inside a menu container,
/// then walks force clicks, synthetic events, a clickable parent, points across
/// the item and finally the keyboard.
pub async fn click_menu_item(
    page: &dyn PageDriver,
    ctx: &ExecCtx,
    config: &ExecutorConfig,
    term: &str,
    target: &ClickTarget,
) -> Result<(&'static str, Landing), ActionError> {
    pause(ctx, config.menu_render()).await?;
    let target = match locate_menu_item(page, term).await {
        Some(item) => ClickTarget::element(item),
        None => {
            debug!(term, "item not found inside a menu container, using resolved target");
            target.clone()
        }
    };
    info!(term, target = %target.describe(), "clicking dropdown item");

    let mut failures = Vec::new();
    if let Some(element) = target.element.as_ref() {
        if let Some(landing) = try_strategy(
            "dropdown_item",
            "dropdown_force_click",
            ctx,
            &mut failures,
            force_repeatedly(page, element),
        )
        .await?
        {
            return Ok(("dropdown_force_click", landing));
        }
        if let Some(landing) = try_strategy(
            "dropdown_item",
            "dropdown_script_click",
            ctx,
            &mut failures,
            page.dispatch_events(&element.handle, &["mousedown", "mouseup", "click"]),
        )
        .await?
        {
            return Ok(("dropdown_script_click", landing));
        }
        if let Some(landing) = try_strategy(
            "dropdown_item",
            "dropdown_parent_click",
            ctx,
            &mut failures,
            clickable_parent(page, element),
        )
        .await?
        {
            return Ok(("dropdown_parent_click", landing));
        }
    }
    if let Some(landing) = try_strategy(
        "dropdown_item",
        "dropdown_coordinate_click",
        ctx,
        &mut failures,
        click_points(page, &target),
    )
    .await?
    {
        return Ok(("dropdown_coordinate_click", landing));
    }
    if let Some(element) = target.element.as_ref() {
        if let Some(landing) = try_strategy(
            "dropdown_item",
            "dropdown_keyboard_select",
            ctx,
            &mut failures,
            keyboard_select(page, element),
        )
        .await?
        {
            return Ok(("dropdown_keyboard_select", landing));
        }
    }

    Err(ActionError::StrategyExhausted {
        action: "dropdown item click".into(),
        attempts: failures.join("; "),
    })
}

#[derive(Debug, Clone, Copy)]
enum Retrigger {
    HoverThenClick,
    DoubleClick,
    Key(Key),
}

impl Retrigger {
    fn name(&self) -> &'static str {
        match self {
            Retrigger::HoverThenClick => "hover_then_click",
            Retrigger::DoubleClick => "double_click",
            Retrigger::Key(Key::Enter) => "key_enter",
            Retrigger::Key(Key::Space) => "key_space",
            Retrigger::Key(_) => "key_arrow_down",
        }
    }

    async fn run(&self, page: &dyn PageDriver, element: &ElementInfo) -> Result<(), AdapterError> {
        match self {
            Retrigger::HoverThenClick => {
                page.hover(&element.handle).await?;
                page.click_element(&element.handle, ClickMode::Regular).await
            }
            Retrigger::DoubleClick => page.double_click(&element.handle).await,
            Retrigger::Key(key) => {
                page.focus(&element.handle).await?;
                page.press_key(*key).await
            }
        }
    }
}

const RETRIGGERS: [Retrigger; 5] = [
    Retrigger::HoverThenClick,
    Retrigger::DoubleClick,
    Retrigger::Key(Key::Enter),
    Retrigger::Key(Key::Space),
    Retrigger::Key(Key::ArrowDown),
];

/// After a trigger click: the menu must be open, otherwise alternate triggers
/// are tried, each followed by another strict check.
///
/// Returns the alternate trigger that opened the menu, if one was needed.
pub async fn ensure_menu_open(
    page: &dyn PageDriver,
    ctx: &ExecCtx,
    config: &ExecutorConfig,
    target: &ClickTarget,
) -> Result<Option<&'static str>, ActionError> {
    pause(ctx, config.menu_render()).await?;
    if menu_is_open(page, &config.expected_menu_items).await {
        info!(target = %target.describe(), "dropdown opened");
        return Ok(None);
    }
    warn!(target = %target.describe(), "dropdown did not open, trying alternate triggers");

    let Some(element) = target.element.as_ref() else {
        return Err(ActionError::ContextMismatch(format!(
            "dropdown {} did not open",
            target.describe()
        )));
    };

    let mut failures = Vec::new();
    for retrigger in RETRIGGERS {
        let landed = try_strategy(
            "dropdown_trigger",
            retrigger.name(),
            ctx,
            &mut failures,
            retrigger.run(page, element),
        )
        .await?;
        if landed.is_none() {
            continue;
        }
        pause(ctx, config.menu_render()).await?;
        if menu_is_open(page, &config.expected_menu_items).await {
            info!(retrigger = retrigger.name(), "alternate trigger opened the dropdown");
            return Ok(Some(retrigger.name()));
        }
        failures.push(format!("{}: menu still closed", retrigger.name()));
    }

    Err(ActionError::ContextMismatch(format!(
        "dropdown {} did not open ({})",
        target.describe(),
        failures.join("; ")
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdp_adapter::mock::{MockAction, MockPage, Reaction};
    use std::time::Duration;
    use stepwright_core_types::{BoundingBox, ContextHints, UiContextHint};

    fn ctx() -> ExecCtx {
        ExecCtx::with_budget(2, Duration::from_secs(5))
    }

    fn config() -> ExecutorConfig {
        ExecutorConfig::default().without_pauses()
    }

    fn open_menu(page: &MockPage, items: &[&str]) {
        page.add(
            AnchorDescriptor::css("[role='menu']"),
            vec![ElementInfo::new("sw-menu", "div", "").with_role("menu")],
        );
        page.add(
            AnchorDescriptor::css("[role='menu'] [role='menuitem']"),
            items
                .iter()
                .enumerate()
                .map(|(i, label)| {
                    ElementInfo::new(format!("sw-item-{i}"), "div", *label)
                        .with_role("menuitem")
                        .in_menu()
                })
                .collect(),
        );
    }

    #[test]
    fn trigger_and_item_phrasing() {
        assert!(is_dropdown_trigger("Create dropdown"));
        assert!(is_dropdown_trigger("the Create button"));
        assert!(!is_dropdown_trigger("Chatbot"));

        let item = ActionPlan::click("Chatbot").with_instruction("click on Chatbot from the dropdown");
        assert!(is_dropdown_item(&item));
        let plain = ActionPlan::click("Create dropdown");
        assert!(!is_dropdown_item(&plain));
        let hinted = ActionPlan::click("Chatbot").with_hints(ContextHints {
            ui_context: Some(UiContextHint {
                ui_context_type: "dropdown".into(),
                ..UiContextHint::default()
            }),
            ..ContextHints::default()
        });
        assert!(is_dropdown_item(&hinted));
    }

    #[tokio::test]
    async fn strict_check_requires_items() {
        let page = MockPage::new();
        assert!(!menu_is_open(&page, &[]).await);

        page.add(
            AnchorDescriptor::css("[role='menu']"),
            vec![ElementInfo::new("sw-menu", "div", "").with_role("menu")],
        );
        assert!(!menu_is_open(&page, &[]).await);

        open_menu(&page, &["Conversation", "Chatbot"]);
        assert!(menu_is_open(&page, &[]).await);
        assert!(menu_is_open(&page, &["chatbot".into()]).await);
        assert!(!menu_is_open(&page, &["Workflow".into()]).await);
    }

    #[tokio::test]
    async fn alternate_trigger_opens_a_stubborn_menu() {
        let page = MockPage::new();
        let trigger = ElementInfo::new("sw-create", "button", "Create");
        page.place(trigger.clone());
        page.on_key(
            Key::Enter,
            Reaction::Reveal {
                anchor: AnchorDescriptor::css("[role='menu']"),
                elements: vec![ElementInfo::new("sw-menu", "div", "").with_role("menu")],
            },
        );
        page.on_key(
            Key::Enter,
            Reaction::Reveal {
                anchor: AnchorDescriptor::css("[role='menu'] button"),
                elements: vec![ElementInfo::new("sw-app", "button", "App").in_menu()],
            },
        );

        let opened = ensure_menu_open(&page, &ctx(), &config(), &ClickTarget::element(trigger))
            .await
            .unwrap();
        assert_eq!(opened, Some("key_enter"));
        assert!(page.actions().contains(&MockAction::Key(Key::Enter)));
    }

    #[tokio::test]
    async fn menu_that_never_opens_is_a_context_mismatch() {
        let page = MockPage::new();
        let trigger = ElementInfo::new("sw-create", "button", "Create");
        page.place(trigger.clone());
        let err = ensure_menu_open(&page, &ctx(), &config(), &ClickTarget::element(trigger))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "context_mismatch");
    }

    #[tokio::test]
    async fn menu_item_prefers_a_handle_inside_the_menu() {
        let page = MockPage::new();
        let inside = ElementInfo::new("sw-in", "div", "Chatbot")
            .with_role("menuitem")
            .in_menu()
            .with_box(BoundingBox::new(100.0, 100.0, 120.0, 30.0));
        page.add(
            AnchorDescriptor::has_text("[role='menu'] [role='menuitem']", "Chatbot"),
            vec![inside.clone()],
        );
        let resolved = ClickTarget::element(ElementInfo::new("sw-out", "a", "Chatbot"));

        let (strategy, _) = click_menu_item(&page, &ctx(), &config(), "Chatbot", &resolved)
            .await
            .unwrap();
        assert_eq!(strategy, "dropdown_force_click");
        assert_eq!(
            page.actions(),
            vec![MockAction::Click {
                element: inside.handle,
                mode: ClickMode::Force
            }]
        );
    }

    #[tokio::test]
    async fn stale_item_handle_falls_back_to_synthetic_events() {
        let page = MockPage::new();
        let stale = ElementInfo::new("sw-stale", "div", "Chatbot")
            .with_box(BoundingBox::new(100.0, 100.0, 100.0, 20.0));
        let (strategy, _) = click_menu_item(
            &page,
            &ctx(),
            &config(),
            "Chatbot",
            &ClickTarget::element(stale.clone()),
        )
        .await
        .unwrap();
        assert_eq!(strategy, "dropdown_script_click");
        let forced = page
            .actions()
            .iter()
            .filter(|action| matches!(action, MockAction::Click { mode: ClickMode::Force, .. }))
            .count();
        assert_eq!(forced, DROPDOWN_FORCE_ATTEMPTS);
        assert!(page.actions().contains(&MockAction::Dispatch {
            element: stale.handle,
            events: vec!["mousedown".into(), "mouseup".into(), "click".into()],
        }));
    }
}
