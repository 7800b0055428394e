use serde::{Deserialize, Serialize};
use stepwright_core_types::{BoundingBox, ElementMetadata, ElementRef, Point};

/// Snapshot of one element as reported by the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementInfo {
    pub handle: ElementRef,
    pub tag: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub aria_label: Option<String>,
    #[serde(default)]
    pub aria_expanded: Option<bool>,
    #[serde(default)]
    pub test_id: Option<String>,
    #[serde(default)]
    pub class_name: String,
    #[serde(default)]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub input_type: Option<String>,
    #[serde(default)]
    pub href: Option<String>,
    #[serde(default)]
    pub data_target: Option<String>,
    pub bounding_box: BoundingBox,
    #[serde(default)]
    pub visible: bool,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub editable: bool,
    #[serde(default)]
    pub has_onclick: bool,
    #[serde(default)]
    pub cursor_pointer: bool,
    /// Inside a menu-like container (`[role=menu]`, `.dropdown-menu`, ...)
    #[serde(default)]
    pub in_menu: bool,
}

impl ElementInfo {
    /// Minimal visible, enabled element with the given tag and text.
    pub fn new(handle: impl Into<String>, tag: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            handle: ElementRef(handle.into()),
            tag: tag.into().to_ascii_lowercase(),
            role: None,
            text: text.into(),
            aria_label: None,
            aria_expanded: None,
            test_id: None,
            class_name: String::new(),
            placeholder: None,
            title: None,
            input_type: None,
            href: None,
            data_target: None,
            bounding_box: BoundingBox::new(0.0, 0.0, 80.0, 24.0),
            visible: true,
            enabled: true,
            editable: false,
            has_onclick: false,
            cursor_pointer: false,
            in_menu: false,
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn with_box(mut self, bounding_box: BoundingBox) -> Self {
        self.bounding_box = bounding_box;
        self
    }

    pub fn with_class(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = class_name.into();
        self
    }

    pub fn with_test_id(mut self, test_id: impl Into<String>) -> Self {
        self.test_id = Some(test_id.into());
        self
    }

    pub fn with_aria_label(mut self, label: impl Into<String>) -> Self {
        self.aria_label = Some(label.into());
        self
    }

    pub fn editable(mut self) -> Self {
        self.editable = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn in_menu(mut self) -> Self {
        self.in_menu = true;
        self
    }

    pub fn center(&self) -> Point {
        self.bounding_box.center()
    }

    pub fn role_is(&self, role: &str) -> bool {
        self.role
            .as_deref()
            .map(|r| r.eq_ignore_ascii_case(role))
            .unwrap_or(false)
    }

    pub fn metadata(&self, matched_by: Option<String>) -> ElementMetadata {
        let text = self.text.trim();
        ElementMetadata {
            tag_name: Some(self.tag.clone()),
            role: self.role.clone(),
            visible_text: (!text.is_empty()).then(|| text.chars().take(120).collect()),
            aria_label: self.aria_label.clone(),
            test_id: self.test_id.clone(),
            class_name: (!self.class_name.is_empty()).then(|| self.class_name.clone()),
            matched_by,
            ..ElementMetadata::default()
        }
    }
}
