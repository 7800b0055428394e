use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use stepwright_core_types::UiContextHint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UiElementType {
    Dropdown,
    Modal,
    Popup,
    Sidebar,
    Tab,
    Accordion,
    Tooltip,
}

impl UiElementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dropdown => "dropdown",
            Self::Modal => "modal",
            Self::Popup => "popup",
            Self::Sidebar => "sidebar",
            Self::Tab => "tab",
            Self::Accordion => "accordion",
            Self::Tooltip => "tooltip",
        }
    }
}

impl fmt::Display for UiElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UiState {
    Opened,
    Closed,
    Expanded,
    Collapsed,
}

impl UiState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Opened => "opened",
            Self::Closed => "closed",
            Self::Expanded => "expanded",
            Self::Collapsed => "collapsed",
        }
    }
}

/// A transient region opened by one step and consulted by later ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiContext {
    pub id: String,
    pub element_type: UiElementType,
    pub state: UiState,
    pub opened_at_step: usize,
    pub target_description: String,
    pub region_hint: String,
    pub expected_lifetime_steps: usize,
    pub keywords: BTreeSet<String>,
}

impl UiContext {
    pub fn opened(
        element_type: UiElementType,
        step: usize,
        target_description: impl Into<String>,
        lifetime: usize,
        keywords: &[&str],
    ) -> Self {
        Self {
            id: format!("{}_{}", element_type, step),
            element_type,
            state: UiState::Opened,
            opened_at_step: step,
            target_description: target_description.into(),
            region_hint: format!("{} opened in step {}", element_type, step),
            expected_lifetime_steps: lifetime,
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }

    /// Past its lifetime at `current_step`.
    pub fn is_expired(&self, current_step: usize) -> bool {
        current_step.saturating_sub(self.opened_at_step) > self.expected_lifetime_steps
    }

    pub fn to_hint(&self) -> UiContextHint {
        UiContextHint {
            ui_context_type: self.element_type.as_str().to_string(),
            state: self.state.as_str().to_string(),
            opened_step: self.opened_at_step,
            target: self.target_description.clone(),
            region_hint: self.region_hint.clone(),
            search_scope: format!(
                "within the {} that was opened in step {}",
                self.element_type, self.opened_at_step
            ),
            context_keywords: self.keywords.iter().cloned().collect(),
        }
    }
}
