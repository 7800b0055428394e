//! Element anchors understood by every page adapter.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Anchor descriptor for element targeting
///
/// Plain CSS cannot express "button whose text contains X", so text matching is a
/// separate dimension layered on top of an optional CSS scope:
/// - CSS selector
/// - CSS selector filtered by text (the `:has-text` idiom)
/// - Text content anywhere in the document (innermost match wins)
/// - ARIA role and accessible name
/// - Form control associated with a `<label>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnchorDescriptor {
    Css { css: String },
    CssText { css: String, text: String, exact: bool },
    Text { content: String, exact: bool },
    Aria { role: String, name: String },
    Label { text: String },
}

impl AnchorDescriptor {
    pub fn css(css: impl Into<String>) -> Self {
        AnchorDescriptor::Css { css: css.into() }
    }

    /// `css` elements whose text contains `text` (case-insensitive).
    pub fn has_text(css: impl Into<String>, text: impl Into<String>) -> Self {
        AnchorDescriptor::CssText {
            css: css.into(),
            text: text.into(),
            exact: false,
        }
    }

    pub fn text_exact(content: impl Into<String>) -> Self {
        AnchorDescriptor::Text {
            content: content.into(),
            exact: true,
        }
    }

    pub fn text_contains(content: impl Into<String>) -> Self {
        AnchorDescriptor::Text {
            content: content.into(),
            exact: false,
        }
    }

    pub fn aria(role: impl Into<String>, name: impl Into<String>) -> Self {
        AnchorDescriptor::Aria {
            role: role.into(),
            name: name.into(),
        }
    }

    pub fn label(text: impl Into<String>) -> Self {
        AnchorDescriptor::Label { text: text.into() }
    }

    /// JSON payload handed to the in-page query function.
    pub fn to_query_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{\"kind\":\"css\",\"css\":\"\"}".into())
    }
}

impl fmt::Display for AnchorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnchorDescriptor::Css { css } => write!(f, "css:{}", css),
            AnchorDescriptor::CssText { css, text, exact } => {
                if *exact {
                    write!(f, "css:{}:text-is('{}')", css, text)
                } else {
                    write!(f, "css:{}:has-text('{}')", css, text)
                }
            }
            AnchorDescriptor::Text { content, exact } => {
                if *exact {
                    write!(f, "text:exact:'{}'", content)
                } else {
                    write!(f, "text:partial:'{}'", content)
                }
            }
            AnchorDescriptor::Aria { role, name } => write!(f, "aria:{}[name='{}']", role, name),
            AnchorDescriptor::Label { text } => write!(f, "label:'{}'", text),
        }
    }
}
