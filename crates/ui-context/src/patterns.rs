use once_cell::sync::Lazy;
use regex::Regex;

fn compile_all(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("context pattern"))
        .collect()
}

pub(crate) static DROPDOWN_OPENERS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile_all(&[
        r"click.*dropdown",
        r"open.*dropdown",
        r"expand.*dropdown",
        r"click.*create.*dropdown",
        r"click.*menu",
        r"open.*menu",
    ])
});

pub(crate) static MODAL_OPENERS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile_all(&[
        r"open.*modal",
        r"open.*dialog",
        r"show.*popup",
        r"click.*settings",
        r"click.*profile",
    ])
});

pub(crate) static SCOPED_ACTIONS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile_all(&[
        r"click.*from.*dropdown",
        r"select.*from.*dropdown",
        r"click.*from.*menu",
        r"select.*from.*menu",
        r"click.*button.*from.*dropdown",
        r"click.*option",
    ])
});

pub(crate) const DROPDOWN_KEYWORDS: &[&str] = &["dropdown", "menu", "option", "select"];
pub(crate) const MODAL_KEYWORDS: &[&str] = &["modal", "dialog", "popup"];

/// Words that tie an instruction to an open dropdown.
pub(crate) const DROPDOWN_SCOPE_WORDS: &[&str] = &["from", "dropdown", "option", "select"];

static CLICK_ON_REST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)click on\s*(.*)$").expect("click-on regex"));
static TRAILING_DROPDOWN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s+dropdown.*$").expect("dropdown suffix regex"));
static TRAILING_BUTTON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s+button.*$").expect("button suffix regex"));
static CLICK_TARGET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)click\s+(.*?)(?:\s+dropdown|\s+button|\s+from|$)").expect("click target regex")
});
static LEADING_VERB: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(click|open|select)\s+").expect("leading verb regex"));

pub(crate) fn any_match(patterns: &[Regex], text: &str) -> bool {
    patterns.iter().any(|p| p.is_match(text))
}

/// Target phrase of an instruction: `"click on Create dropdown"` → `"Create"`.
pub fn extract_target(instruction: &str) -> String {
    let trimmed = instruction.trim();
    if let Some(caps) = CLICK_ON_REST.captures(trimmed) {
        let rest = caps.get(1).map(|m| m.as_str()).unwrap_or_default().trim();
        let rest = TRAILING_DROPDOWN.replace(rest, "");
        let rest = TRAILING_BUTTON.replace(&rest, "");
        return rest.trim().to_string();
    }
    if let Some(caps) = CLICK_TARGET.captures(trimmed) {
        if let Some(m) = caps.get(1) {
            return m.as_str().trim().to_string();
        }
    }
    LEADING_VERB.replace(trimmed, "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn targets_are_extracted_without_widget_suffixes() {
        assert_eq!(extract_target("click on Create dropdown"), "Create");
        assert_eq!(extract_target("Click on Save button now"), "Save");
        assert_eq!(extract_target("click Workspaces from menu"), "Workspaces");
        assert_eq!(extract_target("open the settings"), "the settings");
        assert_eq!(extract_target("select Chatbot"), "Chatbot");
    }

    #[test]
    fn scoped_actions_are_recognized() {
        assert!(any_match(&SCOPED_ACTIONS, "click on chatbot from dropdown"));
        assert!(any_match(&SCOPED_ACTIONS, "click the second option"));
        assert!(!any_match(&SCOPED_ACTIONS, "type hello into search"));
    }
}
