//! Whether an element can receive the action a plan asks for.

use cdp_adapter::ElementInfo;
use stepwright_core_types::ActionType;

const CLICKABLE_TAGS: &[&str] = &["button", "a", "input", "select", "textarea"];
const CLICKABLE_ROLES: &[&str] = &["button", "link", "menuitem", "option", "tab"];
const NON_TEXT_INPUTS: &[&str] = &[
    "checkbox", "radio", "submit", "button", "file", "image", "reset", "hidden",
];

pub fn is_clickable(element: &ElementInfo) -> bool {
    if !element.enabled {
        return false;
    }
    CLICKABLE_TAGS.contains(&element.tag.as_str())
        || CLICKABLE_ROLES.iter().any(|role| element.role_is(role))
        || element.has_onclick
        || element.cursor_pointer
}

pub fn is_editable(element: &ElementInfo) -> bool {
    if !element.enabled {
        return false;
    }
    match element.tag.as_str() {
        "textarea" => true,
        "input" => !element
            .input_type
            .as_deref()
            .map(|t| NON_TEXT_INPUTS.contains(&t.to_ascii_lowercase().as_str()))
            .unwrap_or(false),
        _ => element.editable,
    }
}

/// Click needs a clickable node, type needs an editable one; other actions accept anything.
pub fn is_interactive(element: &ElementInfo, action: ActionType) -> bool {
    match action {
        ActionType::Click => is_clickable(element),
        ActionType::Type => is_editable(element),
        _ => true,
    }
}

/// Short description used in rejection messages.
pub fn describe(element: &ElementInfo) -> String {
    match element.role.as_deref() {
        Some(role) => format!("<{} role={}>", element.tag, role),
        None => format!("<{}>", element.tag),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn click_accepts_controls_roles_and_pointer_divs() {
        assert!(is_clickable(&ElementInfo::new("a", "button", "Go")));
        assert!(is_clickable(
            &ElementInfo::new("b", "div", "Chatbot").with_role("menuitem")
        ));
        let mut pointer = ElementInfo::new("c", "div", "Card");
        assert!(!is_clickable(&pointer));
        pointer.cursor_pointer = true;
        assert!(is_clickable(&pointer));
        assert!(!is_clickable(&ElementInfo::new("d", "button", "Off").disabled()));
    }

    #[test]
    fn type_needs_text_entry() {
        let mut input = ElementInfo::new("a", "input", "");
        assert!(is_editable(&input));
        input.input_type = Some("checkbox".into());
        assert!(!is_editable(&input));
        assert!(is_editable(&ElementInfo::new("b", "div", "").editable()));
        assert!(!is_editable(&ElementInfo::new("c", "span", "Message")));
        assert!(is_interactive(
            &ElementInfo::new("d", "span", "x"),
            ActionType::Verify
        ));
    }
}
