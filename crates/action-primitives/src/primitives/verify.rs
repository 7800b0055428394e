//! Verify primitive - page-state assertions
//!
//! Each [`VerificationKind`] maps to a heuristic over URL, title and visible
//! elements. Most of them are OR-combinations of weak signals; the result says
//! whether the page looks like the step expects, not that it provably is.

use std::path::Path;

use cdp_adapter::{AnchorDescriptor, PageDriver, PageQuery};
use futures::{stream, StreamExt};
use stepwright_core_types::{ExecCtx, ExpectedUrl, NavigationOutcome, VerificationKind};
use tracing::{debug, info, warn};

use crate::config::ExecutorConfig;
use crate::errors::ActionError;
use crate::primitives::download::{download_notice, download_started, recent_downloads};
use crate::primitives::{first_visible, quote, visible_matches};
use crate::types::{Completion, VerificationOutcome};

const NAVIGATION_KEYWORDS: [&str; 7] = ["converse", "chat", "conversation", "apps", "edit", "create", "new"];

/// Menu-scoped selectors an expected dropdown entry must appear under.
const MENU_ENTRY_SCOPES: [&str; 9] = [
    "[role='menu'] [role='menuitem']",
    "[role='menu'] button",
    "[role='menu'] *",
    "[aria-expanded='true'] + * [role='menuitem']",
    "[aria-expanded='true'] + * button",
    "[data-state='open'] [role='menuitem']",
    ".dropdown-menu [role='menuitem']",
    ".dropdown-menu button",
    ".dropdown-content *",
];

/// Concurrent probes when several entries are checked at once.
const PROBE_CONCURRENCY: usize = 4;

const MODAL_SELECTORS: [&str; 6] = [
    "[role='dialog']",
    "[role='modal']",
    ".modal",
    ".dialog",
    "[data-testid*='modal']",
    "[data-testid*='dialog']",
];

const LEFT_PANEL: [&str; 8] = [
    "[class*='sidebar']",
    "[class*='nav']",
    "[class*='left']",
    "[class*='file']",
    "[data-testid*='sidebar']",
    "[data-testid*='nav']",
    "[data-testid*='left']",
    "[role='navigation']",
];

const CENTER_PANEL: [&str; 13] = [
    "main > div:first-child",
    "[class*='container'] > div:first-child",
    "[class*='content']",
    "[class*='center']",
    "[class*='main']",
    "[class*='document']",
    "[class*='preview']",
    "[data-testid*='content']",
    "[data-testid*='center']",
    "[data-testid*='main']",
    "[class*='upload']",
    "[class*='drop']",
    "main > div:nth-child(2)",
];

const CENTER_PANEL_TEXT: [&str; 2] = ["NO FILES ADDED YET", "Drop anywhere to upload"];

const RIGHT_PANEL: [&str; 11] = [
    "[class*='container'] > div:nth-child(2)",
    "[class*='chat']",
    "[class*='conversation']",
    "[class*='right']",
    "[class*='message']",
    "[data-testid*='chat']",
    "[data-testid*='conversation']",
    "[data-testid*='right']",
    "[data-testid*='message']",
    "[class*='prompt']",
    "main > div:last-child",
];

/// Checks `kind` against the current page.
///
/// `expected` is the step's free text (title fragment, element description,
/// comma-separated entries, process or item name, file type).
pub async fn check(
    page: &dyn PageDriver,
    config: &ExecutorConfig,
    kind: &VerificationKind,
    expected: &str,
    navigation: Option<&NavigationOutcome>,
    download_dir: &Path,
) -> VerificationOutcome {
    if let Err(err) = page.wait_for_load(config.verify_load_timeout()).await {
        debug!(error = %err, "page did not report load before verification");
    }
    let url = page.url().await.unwrap_or_default();
    let title = page.title().await.unwrap_or_default();
    debug!(kind = kind.name(), %url, %title, expected, "verifying");

    match kind {
        VerificationKind::PageLoaded => page_loaded(&url, &title, navigation),
        VerificationKind::TitleContains => {
            let passed = title.to_lowercase().contains(&expected.to_lowercase());
            VerificationOutcome::from_bool(passed, format!("title '{}'", title))
        }
        VerificationKind::UrlChanged => url_changed(&url, &title, expected, navigation),
        VerificationKind::ElementVisible => element_visible(page, expected).await,
        VerificationKind::ContainsElements => contains_elements(page, expected).await,
        VerificationKind::ModalAppeared => {
            let anchors: Vec<_> = MODAL_SELECTORS.iter().map(|css| AnchorDescriptor::css(*css)).collect();
            match first_visible(page, &anchors).await {
                Some((anchor, modal)) => VerificationOutcome::pass(format!(
                    "modal {} '{}'",
                    anchor,
                    modal.text.trim().chars().take(50).collect::<String>()
                )),
                None => VerificationOutcome::fail("no modal or dialog visible"),
            }
        }
        VerificationKind::ProcessStarted => process_started(page, &url, &title, expected).await,
        VerificationKind::CreationCompleted => creation_completed(page, &url, expected).await,
        VerificationKind::FileDownloaded => {
            file_downloaded(page, config, &url, expected, download_dir).await
        }
        VerificationKind::UrlRedirectWithPattern { prefix, suffix } => {
            url_redirect(&url, prefix, suffix)
        }
    }
}

/// Runs [`check`] and turns a failed check into [`ActionError::VerificationFailed`].
pub async fn execute_verify(
    page: &dyn PageDriver,
    ctx: &ExecCtx,
    config: &ExecutorConfig,
    kind: &VerificationKind,
    expected: &str,
    navigation: Option<&NavigationOutcome>,
    download_dir: &Path,
) -> Result<Completion, ActionError> {
    ctx.ensure_active()?;
    let outcome = check(page, config, kind, expected, navigation, download_dir).await;
    ctx.ensure_active()?;
    if outcome.passed {
        info!(action_id = %ctx.action_id, kind = kind.name(), detail = %outcome.detail, "verification passed");
        Ok(Completion::by(kind.name()).with_detail(outcome.detail))
    } else {
        warn!(action_id = %ctx.action_id, kind = kind.name(), detail = %outcome.detail, "verification failed");
        Err(ActionError::VerificationFailed {
            kind: kind.name().to_string(),
            detail: outcome.detail,
        })
    }
}

fn page_loaded(url: &str, title: &str, navigation: Option<&NavigationOutcome>) -> VerificationOutcome {
    let basic = url != "about:blank" && !title.is_empty();
    let Some(nav) = navigation.filter(|nav| !nav.succeeded) else {
        return VerificationOutcome::from_bool(basic, format!("url {} title '{}'", url, title));
    };
    match &nav.expected {
        Some(ExpectedUrl::PrefixSuffix { prefix, .. }) => {
            if !prefix.is_empty() && !url.to_lowercase().contains(&prefix.to_lowercase()) {
                VerificationOutcome::fail(format!(
                    "page loaded on {} but the last navigation failed and '{}' is missing",
                    url, prefix
                ))
            } else {
                VerificationOutcome::from_bool(basic, format!("url {} title '{}'", url, title))
            }
        }
        Some(ExpectedUrl::Exact { value }) => VerificationOutcome::fail(format!(
            "page loaded on {} but the expected navigation to '{}' did not happen",
            url, value
        )),
        None => VerificationOutcome::from_bool(basic, format!("url {} title '{}'", url, title)),
    }
}

fn context_keywords(expected: &str) -> Vec<&'static str> {
    let expected = expected.to_lowercase();
    let mut keywords = Vec::new();
    if expected.contains("conversation") {
        keywords.extend(["converse", "chat", "conversation"]);
    }
    if expected.contains("chatbot") {
        keywords.extend(["chatbot", "chat", "bot"]);
    }
    if expected.contains("app") {
        keywords.extend(["app", "apps"]);
    }
    if expected.contains("edit") {
        keywords.extend(["edit", "editor"]);
    }
    if expected.contains("new") || expected.contains("loading") {
        keywords.extend(["new", "create"]);
    }
    keywords
}

fn url_changed(
    url: &str,
    title: &str,
    expected: &str,
    navigation: Option<&NavigationOutcome>,
) -> VerificationOutcome {
    if navigation.map(|nav| !nav.succeeded).unwrap_or(false) {
        return VerificationOutcome::fail(format!("last navigation failed, still on {}", url));
    }
    let url_lower = url.to_lowercase();
    let title_lower = title.to_lowercase();
    let navigated = NAVIGATION_KEYWORDS.iter().any(|kw| url_lower.contains(kw));

    let keywords = context_keywords(expected);
    let context_match = if keywords.is_empty() {
        url_lower.contains(&expected.to_lowercase())
    } else {
        keywords
            .iter()
            .any(|kw| url_lower.contains(kw) || title_lower.contains(kw))
    };
    VerificationOutcome::from_bool(
        navigated && context_match,
        format!(
            "url {} (navigation keyword: {}, context match: {})",
            url, navigated, context_match
        ),
    )
}

fn panel_anchors(description: &str) -> Option<Vec<AnchorDescriptor>> {
    let lower = description.to_lowercase();
    let (panel, selectors, texts): (&str, &[&str], &[&str]) = if lower.contains("left panel") {
        ("left panel", &LEFT_PANEL, &[])
    } else if lower.contains("center panel") {
        ("center panel", &CENTER_PANEL, &CENTER_PANEL_TEXT)
    } else if lower.contains("right panel") {
        ("right panel", &RIGHT_PANEL, &["Sample Prompts"])
    } else {
        return None;
    };
    let mut anchors: Vec<AnchorDescriptor> =
        selectors.iter().map(|css| AnchorDescriptor::css(*css)).collect();
    anchors.extend(texts.iter().map(|text| AnchorDescriptor::text_exact(*text)));
    anchors.push(AnchorDescriptor::css(format!("[class*='{}']", panel)));
    anchors.push(AnchorDescriptor::css(format!("[data-testid*='{}']", panel)));
    anchors.push(AnchorDescriptor::text_contains(panel));
    Some(anchors)
}

fn slug(text: &str) -> String {
    text.trim().to_lowercase().replace(' ', "-")
}

fn visibility_anchors(description: &str) -> Vec<AnchorDescriptor> {
    let quoted = quote(description);
    let slugged = quote(&slug(description));
    let mut anchors = vec![
        AnchorDescriptor::text_contains(description),
        AnchorDescriptor::has_text("button", description),
        AnchorDescriptor::has_text("[role='button']", description),
        AnchorDescriptor::has_text("[role='tab']", description),
        AnchorDescriptor::has_text("[role='menuitem']", description),
        AnchorDescriptor::css(format!("[aria-label*='{}' i]", quoted)),
        AnchorDescriptor::css(format!("[title*='{}' i]", quoted)),
        AnchorDescriptor::css(format!("[data-testid*='{}']", slugged)),
        AnchorDescriptor::css(format!("[class*='{}']", slugged)),
        AnchorDescriptor::has_text("[class*='button']", description),
        AnchorDescriptor::has_text("[class*='dropdown']", description),
    ];
    anchors.extend(
        description
            .split_whitespace()
            .filter(|word| word.chars().count() > 2)
            .map(AnchorDescriptor::text_contains),
    );
    anchors
}

async fn element_visible(page: &(impl PageQuery + ?Sized), description: &str) -> VerificationOutcome {
    let description = description.trim();
    if description.is_empty() {
        return VerificationOutcome::fail("no element description");
    }
    if let Some(anchors) = panel_anchors(description) {
        return match first_visible(page, &anchors).await {
            Some((anchor, _)) => VerificationOutcome::pass(format!("panel found via {}", anchor)),
            None => VerificationOutcome::fail(format!("'{}' not found", description)),
        };
    }
    for anchor in visibility_anchors(description) {
        if let Some(el) = visible_matches(page, &anchor, 3).await.into_iter().next() {
            return VerificationOutcome::pass(format!(
                "'{}' visible via {}",
                el.text.trim().chars().take(50).collect::<String>(),
                anchor
            ));
        }
    }
    VerificationOutcome::fail(format!("'{}' not visible", description))
}

async fn menu_entry_visible(page: &(impl PageQuery + ?Sized), entry: &str) -> bool {
    for scope in MENU_ENTRY_SCOPES {
        let anchor = AnchorDescriptor::has_text(scope, entry);
        if !visible_matches(page, &anchor, 1).await.is_empty() {
            return true;
        }
    }
    false
}

async fn contains_elements(page: &(impl PageQuery + ?Sized), expected: &str) -> VerificationOutcome {
    let entries: Vec<&str> = expected
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .collect();
    if entries.is_empty() {
        return VerificationOutcome::pass("nothing to check");
    }
    let found: Vec<bool> = stream::iter(entries.iter().copied())
        .map(|entry| menu_entry_visible(page, entry))
        .buffered(PROBE_CONCURRENCY)
        .collect()
        .await;
    let missing: Vec<&str> = entries
        .iter()
        .zip(&found)
        .filter(|(_, hit)| !**hit)
        .map(|(entry, _)| *entry)
        .collect();
    let hits = found.len() - missing.len();
    let passed = hits * 2 >= entries.len();
    let mut detail = format!("found {}/{} entries", hits, entries.len());
    if !missing.is_empty() {
        detail.push_str(&format!(", missing {}", missing.join(", ")));
    }
    VerificationOutcome::from_bool(passed, detail)
}

fn keyword_hit<'a>(haystack: &str, keywords: &[&'a str]) -> Option<&'a str> {
    let haystack = haystack.to_lowercase();
    keywords
        .iter()
        .copied()
        .find(|kw| !kw.is_empty() && haystack.contains(kw))
}

async fn text_with_any(
    page: &(impl PageQuery + ?Sized),
    anchor: &AnchorDescriptor,
    words: &[&str],
    limit: usize,
) -> Option<String> {
    visible_matches(page, anchor, limit)
        .await
        .into_iter()
        .map(|el| el.text)
        .find(|text| keyword_hit(text, words).is_some())
}

async fn process_started(
    page: &(impl PageQuery + ?Sized),
    url: &str,
    title: &str,
    name: &str,
) -> VerificationOutcome {
    let name = name.trim();
    let lowered = name.to_lowercase();
    let slugged = quote(&slug(name));

    if let Some(kw) = keyword_hit(url, &["create", "new", "setup", "wizard", lowered.as_str()]) {
        return VerificationOutcome::pass(format!("url contains '{}'", kw));
    }

    if !name.is_empty() {
        let named = AnchorDescriptor::text_contains(name);
        if let Some(text) = text_with_any(page, &named, &["setup", "configuration", "wizard"], 5).await {
            return VerificationOutcome::pass(format!(
                "process ui '{}'",
                text.trim().chars().take(50).collect::<String>()
            ));
        }
    }
    let mut ui: Vec<AnchorDescriptor> = Vec::new();
    if !name.is_empty() {
        ui.extend([
            AnchorDescriptor::css(format!("[data-testid*='{0}'][data-testid*='setup']", slugged)),
            AnchorDescriptor::css(format!("[data-testid*='{0}'][data-testid*='config']", slugged)),
            AnchorDescriptor::css(format!("form[data-testid*='{}']", slugged)),
        ]);
    }
    ui.extend(
        [
            ".setup-wizard",
            ".configuration-form",
            ".creation-wizard",
            "input[placeholder*='name']",
            "input[placeholder*='title']",
            "textarea[placeholder*='description']",
        ]
        .into_iter()
        .map(AnchorDescriptor::css),
    );
    ui.extend(
        ["chatbot name", "bot configuration", "chatbot settings", "configure"]
            .into_iter()
            .map(AnchorDescriptor::text_contains),
    );
    if let Some((anchor, _)) = first_visible(page, &ui).await {
        return VerificationOutcome::pass(format!("process ui via {}", anchor));
    }

    if let Some(kw) = keyword_hit(title, &["create", "new", "setup", "configure", lowered.as_str()]) {
        return VerificationOutcome::pass(format!("title contains '{}'", kw));
    }

    let mut forms: Vec<AnchorDescriptor> = ["form[role='dialog']", "[role='dialog'] form", ".modal form", ".dialog form"]
        .into_iter()
        .map(AnchorDescriptor::css)
        .collect();
    if !name.is_empty() {
        forms.push(AnchorDescriptor::css(format!("form[data-testid*='{}']", slugged)));
    }
    forms.extend(["form", "dialog", "[role='dialog']"].into_iter().map(AnchorDescriptor::css));
    let form_words = [lowered.as_str(), "name", "title", "description", "configure"];
    for anchor in &forms {
        if text_with_any(page, anchor, &form_words, 1).await.is_some() {
            return VerificationOutcome::pass(format!("process form via {}", anchor));
        }
    }

    let mut indicators: Vec<AnchorDescriptor> = [
        ".loading",
        ".spinner",
        ".progress",
        "[aria-label*='loading']",
        "[aria-label*='progress']",
    ]
    .into_iter()
    .map(AnchorDescriptor::css)
    .collect();
    indicators.extend(
        ["loading", "creating", "setting up", "configuring"]
            .into_iter()
            .map(AnchorDescriptor::text_contains),
    );
    if let Some((anchor, _)) = first_visible(page, &indicators).await {
        return VerificationOutcome::pass(format!("progress indicator {}", anchor));
    }

    VerificationOutcome::fail(format!("no evidence that '{}' started", name))
}

async fn creation_completed(page: &(impl PageQuery + ?Sized), url: &str, name: &str) -> VerificationOutcome {
    let name = name.trim();
    let lowered = name.to_lowercase();

    if !name.is_empty() {
        let mut items = vec![AnchorDescriptor::text_contains(name)];
        items.extend(
            ["[role='listitem']", ".list-item", ".grid-item", ".card", ".tile", "tr", "li"]
                .into_iter()
                .map(AnchorDescriptor::css),
        );
        for anchor in &items {
            if let Some(text) = text_with_any(page, anchor, &[lowered.as_str()], 5).await {
                return VerificationOutcome::pass(format!(
                    "new item '{}'",
                    text.trim().chars().take(50).collect::<String>()
                ));
            }
        }
    }

    let mut notices: Vec<AnchorDescriptor> = [
        ".notification.success",
        ".alert.success",
        ".toast.success",
        "[role='alert']",
        ".message.success",
        ".banner.success",
    ]
    .into_iter()
    .map(AnchorDescriptor::css)
    .collect();
    notices.extend(
        ["success", "created", "completed", "done"]
            .into_iter()
            .map(AnchorDescriptor::text_contains),
    );
    if let Some((anchor, _)) = first_visible(page, &notices).await {
        return VerificationOutcome::pass(format!("success notice {}", anchor));
    }

    if let Some(kw) = keyword_hit(url, &[lowered.as_str(), "edit", "configure", "settings"]) {
        return VerificationOutcome::pass(format!("redirected to a page containing '{}'", kw));
    }

    let confirmations = [
        AnchorDescriptor::has_text("[role='dialog']", "created"),
        AnchorDescriptor::has_text("[role='dialog']", "success"),
        AnchorDescriptor::has_text(".modal", "created"),
        AnchorDescriptor::has_text(".dialog", "success"),
    ];
    if let Some((anchor, _)) = first_visible(page, &confirmations).await {
        return VerificationOutcome::pass(format!("confirmation {}", anchor));
    }

    VerificationOutcome::fail(format!("no sign that '{}' was created", name))
}

async fn file_downloaded(
    page: &(impl PageQuery + ?Sized),
    config: &ExecutorConfig,
    url: &str,
    file_type: &str,
    download_dir: &Path,
) -> VerificationOutcome {
    let file_type = file_type.trim();
    let recent = recent_downloads(download_dir, file_type, config.download_recent()).await;
    if let Some(first) = recent.first() {
        return VerificationOutcome::pass(format!(
            "{} recent file(s), e.g. {}",
            recent.len(),
            first.display()
        ));
    }
    if let Some(notice) = download_notice(page, file_type).await {
        return VerificationOutcome::pass(format!("download notice '{}'", notice));
    }
    if download_started(page).await {
        return VerificationOutcome::pass("download indicators present");
    }
    if let Some(kw) = keyword_hit(url, &["export", "download", "run", "result"]) {
        return VerificationOutcome::pass(format!("on a '{}' page", kw));
    }
    warn!(dir = %download_dir.display(), "no download evidence found, assuming success");
    VerificationOutcome::pass("no download evidence, assumed complete")
}

fn url_redirect(url: &str, prefix: &str, suffix: &str) -> VerificationOutcome {
    let lower = url.to_lowercase();
    let prefix_ok = prefix.is_empty() || lower.contains(&prefix.to_lowercase());
    let suffix_ok = suffix.is_empty() || lower.contains(&suffix.to_lowercase());
    let mut detail = format!("url {}", url);
    if !prefix_ok {
        detail.push_str(&format!(", missing prefix '{}'", prefix));
    }
    if !suffix_ok {
        detail.push_str(&format!(", missing suffix '{}'", suffix));
    }
    VerificationOutcome::from_bool(prefix_ok && suffix_ok, detail)
}
