use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use stepwright_core_types::UiContextHint;
use tracing::{debug, info};

use crate::model::{UiContext, UiElementType};
use crate::patterns::{
    any_match, extract_target, DROPDOWN_KEYWORDS, DROPDOWN_OPENERS, DROPDOWN_SCOPE_WORDS,
    MODAL_KEYWORDS, MODAL_OPENERS, SCOPED_ACTIONS,
};

pub const DEFAULT_CONTEXT_LIFETIME: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Steps a context stays eligible after the step that opened it.
    pub lifetime_steps: usize,
    /// Opened within this many steps: +3.
    pub recent_window: usize,
    /// Opened within this many steps: +1.
    pub stale_window: usize,
    pub keyword_weight: u32,
    pub recent_bonus: u32,
    pub stale_bonus: u32,
    pub dropdown_bonus: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            lifetime_steps: DEFAULT_CONTEXT_LIFETIME,
            recent_window: 3,
            stale_window: 5,
            keyword_weight: 2,
            recent_bonus: 3,
            stale_bonus: 1,
            dropdown_bonus: 3,
        }
    }
}

/// Per-session registry of open UI regions.
///
/// Owned by one test session and mutated only by its sequential step loop.
#[derive(Debug, Default)]
pub struct UiContextTracker {
    config: TrackerConfig,
    active: BTreeMap<String, UiContext>,
}

impl UiContextTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            active: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Records a new context when `instruction` opens one. Dropdown phrasing wins over modal phrasing.
    pub fn analyze_step(&mut self, step: usize, instruction: &str) -> Option<UiContext> {
        let lower = instruction.to_lowercase();
        let (element_type, keywords) = if any_match(&DROPDOWN_OPENERS, &lower) {
            (UiElementType::Dropdown, DROPDOWN_KEYWORDS)
        } else if any_match(&MODAL_OPENERS, &lower) {
            (UiElementType::Modal, MODAL_KEYWORDS)
        } else {
            return None;
        };

        let context = UiContext::opened(
            element_type,
            step,
            extract_target(instruction),
            self.config.lifetime_steps,
            keywords,
        );
        info!(
            step,
            context = %context.id,
            target = %context.target_description,
            "ui context opened"
        );
        self.active.insert(context.id.clone(), context.clone());
        Some(context)
    }

    /// Hint for a step whose phrasing depends on an open region ("… from dropdown", "… option").
    pub fn needs_context(&mut self, step: usize, instruction: &str) -> Option<UiContextHint> {
        let lower = instruction.to_lowercase();
        if !any_match(&SCOPED_ACTIONS, &lower) {
            return None;
        }
        let hint = self.relevant_context(step, instruction).map(UiContext::to_hint)?;
        debug!(
            step,
            context_type = %hint.ui_context_type,
            opened_step = hint.opened_step,
            "step scoped to ui context"
        );
        Some(hint)
    }

    /// Highest-scoring live context for `instruction`, purging expired ones first.
    pub fn relevant_context(&mut self, step: usize, instruction: &str) -> Option<&UiContext> {
        self.purge_expired(step);
        let lower = instruction.to_lowercase();

        let mut best: Option<(&UiContext, u32)> = None;
        for context in self.active.values() {
            let score = self.score(context, step, &lower);
            if score == 0 {
                continue;
            }
            let better = match best {
                None => true,
                Some((current, best_score)) => {
                    score > best_score
                        || (score == best_score && context.opened_at_step > current.opened_at_step)
                }
            };
            if better {
                best = Some((context, score));
            }
        }
        best.map(|(context, _)| context)
    }

    fn score(&self, context: &UiContext, step: usize, lower: &str) -> u32 {
        let cfg = &self.config;
        let mut score = context
            .keywords
            .iter()
            .filter(|k| lower.contains(k.as_str()))
            .count() as u32
            * cfg.keyword_weight;

        let distance = step.saturating_sub(context.opened_at_step);
        if distance <= cfg.recent_window {
            score += cfg.recent_bonus;
        } else if distance <= cfg.stale_window {
            score += cfg.stale_bonus;
        }

        if context.element_type == UiElementType::Dropdown
            && DROPDOWN_SCOPE_WORDS.iter().any(|w| lower.contains(w))
        {
            score += cfg.dropdown_bonus;
        }
        score
    }

    /// Drops contexts older than their lifetime; returns how many went.
    pub fn purge_expired(&mut self, step: usize) -> usize {
        let before = self.active.len();
        self.active.retain(|id, ctx| {
            let keep = !ctx.is_expired(step);
            if !keep {
                debug!(context = %id, opened_step = ctx.opened_at_step, step, "ui context expired");
            }
            keep
        });
        before - self.active.len()
    }

    pub fn close(&mut self, id: &str) -> Option<UiContext> {
        let closed = self.active.remove(id);
        if let Some(ctx) = &closed {
            debug!(context = %ctx.id, "ui context closed");
        }
        closed
    }

    /// Forgets every context. Called at the start of each run and after a navigating click.
    pub fn clear_all(&mut self) {
        if !self.active.is_empty() {
            debug!(count = self.active.len(), "clearing ui contexts");
        }
        self.active.clear();
    }

    pub fn active(&self) -> impl Iterator<Item = &UiContext> {
        self.active.values()
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn summary(&self) -> String {
        if self.active.is_empty() {
            return "No active UI contexts".to_string();
        }
        self.active
            .values()
            .map(|c| {
                format!(
                    "{} ({}) opened in step {}",
                    c.element_type, c.target_description, c.opened_at_step
                )
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> UiContextTracker {
        UiContextTracker::new(TrackerConfig::default())
    }

    #[test]
    fn dropdown_click_opens_context() {
        let mut t = tracker();
        let ctx = t.analyze_step(2, "click on Create dropdown").unwrap();
        assert_eq!(ctx.element_type, UiElementType::Dropdown);
        assert_eq!(ctx.target_description, "Create");
        assert_eq!(ctx.id, "dropdown_2");
        assert!(t.analyze_step(3, "type hello into search").is_none());
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn modal_patterns_open_modal_context() {
        let mut t = tracker();
        let ctx = t.analyze_step(1, "Click on Settings").unwrap();
        assert_eq!(ctx.element_type, UiElementType::Modal);
        assert!(ctx.keywords.contains("dialog"));
    }

    #[test]
    fn lifetime_window_is_inclusive() {
        let mut t = tracker();
        t.analyze_step(2, "click on Create dropdown");
        assert!(t.relevant_context(6, "click on Chatbot from dropdown").is_some());
        assert!(t.relevant_context(7, "click on Chatbot from dropdown").is_some());
        assert!(t.relevant_context(8, "click on Chatbot from dropdown").is_none());
        assert!(t.is_empty());
    }

    #[test]
    fn ties_go_to_the_most_recent_context() {
        let mut t = tracker();
        t.analyze_step(1, "open the dropdown");
        t.analyze_step(2, "open account menu");
        let ctx = t.relevant_context(3, "click Billing from dropdown").unwrap();
        assert_eq!(ctx.opened_at_step, 2);
    }

    #[test]
    fn higher_score_beats_recency() {
        let mut t = tracker();
        t.analyze_step(1, "click on Create dropdown");
        t.analyze_step(3, "open settings dialog");
        // dropdown: recent(+3) + "dropdown"(+2) + scope bonus(+3); modal: recent(+3)
        let ctx = t.relevant_context(4, "click Chatbot from dropdown").unwrap();
        assert_eq!(ctx.element_type, UiElementType::Dropdown);
    }

    #[test]
    fn unscoped_steps_get_no_hint() {
        let mut t = tracker();
        t.analyze_step(1, "click on Create dropdown");
        assert!(t.needs_context(2, "type hello into search").is_none());
        let hint = t.needs_context(2, "click on Chatbot from dropdown").unwrap();
        assert_eq!(hint.ui_context_type, "dropdown");
        assert_eq!(hint.target, "Create");
    }

    #[test]
    fn close_and_clear() {
        let mut t = tracker();
        t.analyze_step(1, "click on Create dropdown");
        t.analyze_step(2, "open profile modal");
        assert!(t.summary().contains("dropdown (Create) opened in step 1"));
        assert!(t.close("dropdown_1").is_some());
        assert!(t.close("dropdown_1").is_none());
        t.clear_all();
        assert_eq!(t.summary(), "No active UI contexts");
    }
}
