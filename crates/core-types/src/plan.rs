use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of interaction a step performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Navigate,
    Click,
    Type,
    Verify,
    Upload,
    Wait,
}

impl ActionType {
    pub fn name(&self) -> &'static str {
        match self {
            ActionType::Navigate => "navigate",
            ActionType::Click => "click",
            ActionType::Type => "type",
            ActionType::Verify => "verify",
            ActionType::Upload => "upload",
            ActionType::Wait => "wait",
        }
    }

    /// Whether the action needs an on-page target resolved before execution.
    pub fn needs_target(&self) -> bool {
        matches!(self, ActionType::Click | ActionType::Type)
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Closed set of verification algorithms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VerificationKind {
    PageLoaded,
    TitleContains,
    UrlChanged,
    ElementVisible,
    ContainsElements,
    ModalAppeared,
    ProcessStarted,
    CreationCompleted,
    FileDownloaded,
    UrlRedirectWithPattern { prefix: String, suffix: String },
}

impl VerificationKind {
    pub fn name(&self) -> &'static str {
        match self {
            VerificationKind::PageLoaded => "page_loaded",
            VerificationKind::TitleContains => "title_contains",
            VerificationKind::UrlChanged => "url_changed",
            VerificationKind::ElementVisible => "element_visible",
            VerificationKind::ContainsElements => "contains_elements",
            VerificationKind::ModalAppeared => "modal_appeared",
            VerificationKind::ProcessStarted => "process_started",
            VerificationKind::CreationCompleted => "creation_completed",
            VerificationKind::FileDownloaded => "file_downloaded",
            VerificationKind::UrlRedirectWithPattern { .. } => "url_redirect_with_pattern",
        }
    }
}

/// Wait behaviour for `wait` steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum WaitMode {
    Duration { ms: u64 },
    PageLoad { timeout_ms: u64 },
    /// Degraded to a fixed wait of `ms`.
    ElementVisible { ms: u64 },
}

/// Expected URL shape recorded for a navigation step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "pattern", rename_all = "snake_case")]
pub enum ExpectedUrl {
    PrefixSuffix { prefix: String, suffix: String },
    Exact { value: String },
}

/// Outcome of the most recent navigation step, handed to later verifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationOutcome {
    pub succeeded: bool,
    #[serde(default)]
    pub expected: Option<ExpectedUrl>,
}

/// Scope information exported by the UI context tracker for a step.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UiContextHint {
    pub ui_context_type: String,
    pub state: String,
    pub opened_step: usize,
    pub target: String,
    pub region_hint: String,
    pub search_scope: String,
    #[serde(default)]
    pub context_keywords: Vec<String>,
}

/// Hints attached to a plan by the orchestrator before resolution.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ContextHints {
    #[serde(default)]
    pub ui_context: Option<UiContextHint>,
    #[serde(default)]
    pub navigation: Option<NavigationOutcome>,
    #[serde(default)]
    pub next_action_target: Option<String>,
    #[serde(default)]
    pub page_url: Option<String>,
    #[serde(default)]
    pub page_title: Option<String>,
    #[serde(default)]
    pub previous_action: Option<String>,
    #[serde(default)]
    pub element_type: Option<String>,
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

/// Structured intent for one test step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionPlan {
    #[serde(rename = "action")]
    pub action_type: ActionType,

    /// Raw natural-language instruction the plan was parsed from
    #[serde(default)]
    pub instruction: String,

    /// Human description of the element to act on
    #[serde(default)]
    pub target: String,

    /// Field description for `type` steps
    #[serde(default)]
    pub field: Option<String>,

    /// Text to type, URL to open, file to upload or text to verify
    #[serde(default)]
    pub value: Option<String>,

    #[serde(default)]
    pub verification: Option<VerificationKind>,

    #[serde(default)]
    pub wait: Option<WaitMode>,

    /// Prefer forced clicks over regular ones
    #[serde(default)]
    pub force: bool,

    #[serde(default)]
    pub parameters: BTreeMap<String, serde_json::Value>,

    #[serde(default)]
    pub context_hints: ContextHints,
}

impl ActionPlan {
    pub fn new(action_type: ActionType, target: impl Into<String>) -> Self {
        Self {
            action_type,
            instruction: String::new(),
            target: target.into(),
            field: None,
            value: None,
            verification: None,
            wait: None,
            force: false,
            parameters: BTreeMap::new(),
            context_hints: ContextHints::default(),
        }
    }

    pub fn click(target: impl Into<String>) -> Self {
        let target = target.into();
        let instruction = format!("click on {}", target);
        Self::new(ActionType::Click, target).with_instruction(instruction)
    }

    pub fn type_text(field: impl Into<String>, text: impl Into<String>) -> Self {
        let field = field.into();
        let mut plan = Self::new(ActionType::Type, field.clone());
        plan.instruction = format!("type into {}", field);
        plan.field = Some(field);
        plan.value = Some(text.into());
        plan
    }

    pub fn navigate(url: impl Into<String>) -> Self {
        let url = url.into();
        let mut plan = Self::new(ActionType::Navigate, url.clone());
        plan.instruction = format!("navigate to {}", url);
        plan.value = Some(url);
        plan
    }

    pub fn verify(kind: VerificationKind, expected: impl Into<String>) -> Self {
        let expected = expected.into();
        let mut plan = Self::new(ActionType::Verify, expected.clone());
        plan.instruction = format!("verify {} {}", kind.name(), expected);
        plan.value = Some(expected);
        plan.verification = Some(kind);
        plan
    }

    pub fn upload(target: impl Into<String>, path: impl Into<String>) -> Self {
        let mut plan = Self::new(ActionType::Upload, target);
        plan.value = Some(path.into());
        plan
    }

    pub fn wait(mode: WaitMode) -> Self {
        let mut plan = Self::new(ActionType::Wait, String::new());
        plan.wait = Some(mode);
        plan
    }

    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = instruction.into();
        self
    }

    pub fn with_hints(mut self, hints: ContextHints) -> Self {
        self.context_hints = hints;
        self
    }

    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }

    /// Text the resolver should search for: the field for `type`, the target otherwise.
    pub fn search_text(&self) -> &str {
        match (&self.action_type, &self.field) {
            (ActionType::Type, Some(field)) if !field.trim().is_empty() => field,
            _ => &self.target,
        }
    }

    /// Instruction used for cache keys and prompts, falling back to a synthesized one.
    pub fn effective_instruction(&self) -> String {
        if self.instruction.trim().is_empty() {
            format!("{} {}", self.action_type.name(), self.search_text())
        } else {
            self.instruction.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_parses_from_yaml() {
        let raw = r#"
action: verify
instruction: "verify the url changed to a conversation"
value: conversation
verification:
  kind: url_changed
"#;
        let plan: ActionPlan = serde_yaml::from_str(raw).expect("plan");
        assert_eq!(plan.action_type, ActionType::Verify);
        assert_eq!(plan.verification, Some(VerificationKind::UrlChanged));
        assert!(plan.context_hints.navigation.is_none());
    }

    #[test]
    fn redirect_pattern_carries_fields() {
        let raw = r#"
action: verify
verification:
  kind: url_redirect_with_pattern
  prefix: "https://app.example.com"
  suffix: "/edit"
"#;
        let plan: ActionPlan = serde_yaml::from_str(raw).expect("plan");
        assert_eq!(
            plan.verification,
            Some(VerificationKind::UrlRedirectWithPattern {
                prefix: "https://app.example.com".into(),
                suffix: "/edit".into()
            })
        );
    }

    #[test]
    fn type_plans_search_for_the_field() {
        let plan = ActionPlan::type_text("Email", "user@example.com");
        assert_eq!(plan.search_text(), "Email");
        let click = ActionPlan::click("Create dropdown");
        assert_eq!(click.search_text(), "Create dropdown");
        assert_eq!(click.effective_instruction(), "click on Create dropdown");
    }
}
