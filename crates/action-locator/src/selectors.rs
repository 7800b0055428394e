//! Selector catalogue for the selector-driven tiers.
//!
//! Every generator returns candidates sorted by priority (lower first) with
//! duplicate anchors removed, so probing them in order gives the same answer as
//! a one-by-one scan.

use std::collections::HashSet;

use cdp_adapter::AnchorDescriptor;
use stepwright_core_types::{ActionType, UiContextHint};
use stepwright_llm::is_stop_word;

use crate::types::SelectorCandidate;

/// Scopes that hold the items of an open dropdown.
const DROPDOWN_SCOPES: &[(&str, &str)] = &[
    ("[role='menu'] [role='menuitem']", "menu_item"),
    ("[role='menu'] button", "menu_button"),
    ("[role='menu'] *", "menu_any"),
    ("[aria-expanded='true'] + * [role='menuitem']", "expanded_sibling_item"),
    ("[aria-expanded='true'] + * button", "expanded_sibling_button"),
    ("[class*='dropdown'][class*='open'] *", "open_dropdown_class"),
    ("[class*='menu'][style*='block'] *", "visible_menu_class"),
];

const MODAL_ROOTS: &[&str] = &["[role='dialog']", "[role='alertdialog']", ".modal"];

const LINK_HINTS: &[&str] = &["workspace", "sign in", "login"];
const INPUT_HINTS: &[&str] = &["query", "search", "input", "text", "message", "files"];
const DROPDOWN_HINTS: &[&str] = &["dropdown", "create"];
/// Widget words dropped from a target before matching visible text.
const WIDGET_WORDS: &[&str] = &["dropdown", "button", "arrow", "menu"];

const NOT_TOGGLE: &str = ":not([type='checkbox']):not([type='radio'])";

/// Inputs tried first when a vision point near a search box misses.
pub const SEARCH_INPUT_SELECTORS: &[&str] = &[
    "input[name=\"q\"]",
    "input[type=\"search\"]",
    "input[placeholder*=\"search\" i]",
    "input[aria-label*=\"search\" i]",
    "[role=\"searchbox\"]",
    "input[name=\"search\"]",
    "textarea[name=\"q\"]",
    "input[name=\"query\"]",
];

/// Escapes `text` for use inside a single-quoted CSS attribute value.
pub fn css_quote(text: &str) -> String {
    text.replace('\\', "\\\\").replace('\'', "\\'")
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

pub fn is_input_like(target: &str) -> bool {
    contains_any(&target.to_lowercase(), INPUT_HINTS)
}

pub fn is_link_target(target: &str) -> bool {
    contains_any(&target.to_lowercase(), LINK_HINTS)
}

pub fn is_dropdown_target(target: &str) -> bool {
    contains_any(&target.to_lowercase(), DROPDOWN_HINTS)
}

/// `"Create dropdown"` → `"Create"`. Returns the input when nothing would remain.
pub fn core_term(target: &str) -> String {
    let kept: Vec<&str> = target
        .split_whitespace()
        .filter(|w| !WIDGET_WORDS.contains(&w.to_lowercase().as_str()))
        .collect();
    if kept.is_empty() {
        target.trim().to_string()
    } else {
        kept.join(" ")
    }
}

fn finalize(mut candidates: Vec<SelectorCandidate>) -> Vec<SelectorCandidate> {
    candidates.sort_by_key(|c| c.priority);
    let mut seen = HashSet::new();
    candidates.retain(|c| seen.insert(c.anchor.to_string()));
    candidates
}

/// Selectors confined to the region an open context covers. Empty for context
/// types without a known scope.
pub fn context_selectors(hint: &UiContextHint, target: &str) -> Vec<SelectorCandidate> {
    let term = core_term(target);
    if term.is_empty() {
        return Vec::new();
    }
    let mut out = Vec::new();
    match hint.ui_context_type.as_str() {
        "dropdown" => {
            for (scope, strategy) in DROPDOWN_SCOPES {
                out.push(SelectorCandidate::new(
                    AnchorDescriptor::has_text(*scope, term.clone()),
                    0,
                    *strategy,
                ));
            }
        }
        "modal" | "popup" => {
            for root in MODAL_ROOTS {
                for (inner, strategy) in [
                    ("button", "dialog_button"),
                    ("[role='button']", "dialog_role_button"),
                    ("a", "dialog_link"),
                    ("*", "dialog_any"),
                ] {
                    out.push(SelectorCandidate::new(
                        AnchorDescriptor::has_text(format!("{} {}", root, inner), term.clone()),
                        0,
                        strategy,
                    ));
                }
            }
        }
        _ => {}
    }
    finalize(out)
}

/// Catalogue for clicking `target`. Exact text drops from priority 1 to 3 when a
/// context exists, so scoped hits are not undercut by look-alikes elsewhere.
pub fn click_selectors(target: &str, has_context: bool) -> Vec<SelectorCandidate> {
    let target = target.trim();
    if target.is_empty() {
        return Vec::new();
    }
    let lower = target.to_lowercase();
    let exact_priority = if has_context { 3 } else { 1 };
    let mut out = vec![
        SelectorCandidate::new(AnchorDescriptor::text_exact(target), exact_priority, "exact_text"),
        SelectorCandidate::new(
            AnchorDescriptor::text_contains(target),
            exact_priority + 1,
            "text_contains",
        ),
    ];

    if is_dropdown_target(target) {
        let core = core_term(target);
        out.extend([
            SelectorCandidate::new(
                AnchorDescriptor::has_text("button[aria-haspopup='true']:not([role='tab'])", core.clone()),
                1,
                "haspopup_button",
            ),
            SelectorCandidate::new(
                AnchorDescriptor::has_text("[aria-expanded]", core.clone()),
                1,
                "expandable",
            ),
            SelectorCandidate::new(
                AnchorDescriptor::has_text(
                    "button:has(svg), button[class*='arrow'], button[class*='chevron']",
                    core.clone(),
                ),
                2,
                "arrow_button",
            ),
            SelectorCandidate::new(
                AnchorDescriptor::has_text("[class*='dropdown']", core),
                3,
                "dropdown_class",
            ),
        ]);
    }

    out.extend([
        SelectorCandidate::new(
            AnchorDescriptor::has_text("button:not([role='tab'])", target),
            3,
            "button_not_tab",
        ),
        SelectorCandidate::new(
            AnchorDescriptor::has_text("[role='button']:not([role='tab'])", target),
            4,
            "role_button",
        ),
        SelectorCandidate::new(AnchorDescriptor::has_text("button", target), 5, "button"),
    ]);

    if is_link_target(target) {
        out.push(SelectorCandidate::new(
            AnchorDescriptor::has_text("a", target),
            5,
            "link",
        ));
        out.push(SelectorCandidate::new(
            AnchorDescriptor::css(format!("a[href*='{}']", css_quote(&lower.replace(' ', "")))),
            6,
            "link_href",
        ));
    }

    out.extend([
        SelectorCandidate::new(
            AnchorDescriptor::has_text("[role='menuitem']", target),
            6,
            "menuitem",
        ),
        SelectorCandidate::new(AnchorDescriptor::has_text("li", target), 7, "list_item"),
    ]);

    if is_input_like(target) {
        let quoted = css_quote(target);
        out.extend([
            SelectorCandidate::new(
                AnchorDescriptor::css(format!(
                    "input[placeholder*='{q}' i], textarea[placeholder*='{q}' i], [contenteditable='true'][placeholder*='{q}' i]",
                    q = quoted
                )),
                2,
                "placeholder",
            ),
            SelectorCandidate::new(
                AnchorDescriptor::css(format!(
                    "input[aria-label*='{q}' i], textarea[aria-label*='{q}' i]",
                    q = quoted
                )),
                3,
                "aria_label",
            ),
            SelectorCandidate::new(AnchorDescriptor::label(target), 4, "label"),
        ]);
    }

    out.extend([
        SelectorCandidate::new(AnchorDescriptor::has_text("[onclick]", target), 8, "onclick"),
        SelectorCandidate::new(
            AnchorDescriptor::has_text("div[role='button']", target),
            9,
            "div_role_button",
        ),
    ]);

    let words: Vec<&str> = target.split_whitespace().collect();
    if words.len() > 1 {
        let first = words[0];
        out.extend([
            SelectorCandidate::new(AnchorDescriptor::text_exact(first), 10, "first_word_exact"),
            SelectorCandidate::new(
                AnchorDescriptor::has_text("button", first),
                11,
                "first_word_button",
            ),
        ]);
        for word in words
            .iter()
            .filter(|w| w.len() > 2 && !is_stop_word(w))
        {
            out.push(SelectorCandidate::new(
                AnchorDescriptor::text_contains(*word),
                12,
                "partial_word",
            ));
        }
    }

    finalize(out)
}

/// Catalogue for the field of a `type` step. Only editable nodes are accepted
/// from these, so broad selectors are safe at the tail.
pub fn field_selectors(field: &str) -> Vec<SelectorCandidate> {
    let field = field.trim();
    if field.is_empty() {
        return Vec::new();
    }
    let lower = field.to_lowercase();
    let quoted = css_quote(field);
    let compact = css_quote(&lower.replace(' ', "").replace("field", ""));
    let mut out = Vec::new();

    if contains_any(&lower, &["message", "input", "text"]) {
        out.extend([
            SelectorCandidate::new(AnchorDescriptor::css("input[type='text']"), 1, "text_input"),
            SelectorCandidate::new(AnchorDescriptor::css("textarea"), 1, "textarea"),
            SelectorCandidate::new(
                AnchorDescriptor::css(
                    "input:not([type='checkbox']):not([type='radio']):not([type='submit']):not([type='button'])",
                ),
                2,
                "generic_text_input",
            ),
        ]);
    }
    if lower.contains("email") {
        out.extend([
            SelectorCandidate::new(AnchorDescriptor::css("input[type='email']"), 1, "email_type"),
            SelectorCandidate::new(AnchorDescriptor::css("input[name*='email']"), 2, "email_name"),
        ]);
    }
    if lower.contains("password") {
        out.extend([
            SelectorCandidate::new(
                AnchorDescriptor::css("input[type='password']"),
                1,
                "password_type",
            ),
            SelectorCandidate::new(
                AnchorDescriptor::css("input[name*='password']"),
                2,
                "password_name",
            ),
        ]);
    }

    out.extend([
        SelectorCandidate::new(
            AnchorDescriptor::css(format!(
                "input[placeholder*='{q}' i]{n}, textarea[placeholder*='{q}' i]",
                q = quoted,
                n = NOT_TOGGLE
            )),
            3,
            "placeholder",
        ),
        SelectorCandidate::new(
            AnchorDescriptor::css(format!("input[name*='{c}']{n}", c = compact, n = NOT_TOGGLE)),
            4,
            "name_attr",
        ),
        SelectorCandidate::new(
            AnchorDescriptor::css(format!("input[id*='{c}']{n}", c = compact, n = NOT_TOGGLE)),
            5,
            "id_attr",
        ),
        SelectorCandidate::new(
            AnchorDescriptor::css(format!(
                "input[aria-label*='{q}' i]{n}, textarea[aria-label*='{q}' i], [contenteditable='true'][aria-label*='{q}' i]",
                q = quoted,
                n = NOT_TOGGLE
            )),
            6,
            "aria_label",
        ),
        SelectorCandidate::new(AnchorDescriptor::label(field), 7, "label"),
        SelectorCandidate::new(AnchorDescriptor::css("input"), 20, "generic_input"),
        SelectorCandidate::new(AnchorDescriptor::css("textarea"), 21, "generic_textarea"),
        SelectorCandidate::new(
            AnchorDescriptor::css("[contenteditable='true']"),
            22,
            "contenteditable",
        ),
    ]);

    finalize(out)
}

/// Catalogue for `term` under `action`.
pub fn selectors_for(action: ActionType, term: &str, has_context: bool) -> Vec<SelectorCandidate> {
    match action {
        ActionType::Type => field_selectors(term),
        _ => click_selectors(term, has_context),
    }
}

pub fn search_input_selectors() -> Vec<SelectorCandidate> {
    SEARCH_INPUT_SELECTORS
        .iter()
        .enumerate()
        .map(|(i, css)| SelectorCandidate::new(AnchorDescriptor::css(*css), i as u8, "search_input"))
        .collect()
}
