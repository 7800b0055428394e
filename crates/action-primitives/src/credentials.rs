//! Credential placeholders in typed text.
//!
//! Plans may carry `{cred:service.key}` (also `{credential:..}` and `{creds:..}`)
//! instead of a secret. The executor swaps each placeholder for the provider's
//! value right before typing; unknown references are left untouched.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{(?:cred|credential|creds):([^}]+)\}").expect("credential placeholder regex")
});

/// Source of secrets keyed by `service.key`.
pub trait CredentialProvider: Send + Sync {
    fn get(&self, path: &str) -> Option<String>;
}

/// In-memory provider.
#[derive(Debug, Default, Clone)]
pub struct MapCredentials {
    values: HashMap<String, String>,
}

impl MapCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, value: impl Into<String>) {
        self.values.insert(path.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MapCredentials {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl CredentialProvider for MapCredentials {
    fn get(&self, path: &str) -> Option<String> {
        self.values.get(path).cloned()
    }
}

/// Text after placeholder substitution.
pub struct Resolved {
    pub text: String,
    pub substituted: usize,
    /// References the provider did not know, left verbatim in `text`
    pub unresolved: Vec<String>,
}

impl std::fmt::Debug for Resolved {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolved")
            .field("chars", &self.text.chars().count())
            .field("substituted", &self.substituted)
            .field("unresolved", &self.unresolved)
            .finish()
    }
}

pub fn has_placeholders(text: &str) -> bool {
    PLACEHOLDER.is_match(text)
}

pub fn resolve_placeholders(text: &str, provider: Option<&dyn CredentialProvider>) -> Resolved {
    let Some(provider) = provider else {
        return Resolved {
            text: text.to_string(),
            substituted: 0,
            unresolved: PLACEHOLDER
                .captures_iter(text)
                .map(|caps| caps[1].trim().to_string())
                .collect(),
        };
    };

    let mut substituted = 0;
    let mut unresolved = Vec::new();
    let resolved = PLACEHOLDER.replace_all(text, |caps: &Captures<'_>| {
        let path = caps[1].trim();
        match provider.get(path) {
            Some(value) => {
                substituted += 1;
                value
            }
            None => {
                unresolved.push(path.to_string());
                caps[0].to_string()
            }
        }
    });
    Resolved {
        text: resolved.into_owned(),
        substituted,
        unresolved,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> MapCredentials {
        [
            ("aihub.email", "qa@example.com"),
            ("aihub.password", "hunter2"),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn all_placeholder_spellings_resolve() {
        let creds = provider();
        let out = resolve_placeholders(
            "{cred:aihub.email} / {credential:aihub.password} / {creds: aihub.email }",
            Some(&creds),
        );
        assert_eq!(out.text, "qa@example.com / hunter2 / qa@example.com");
        assert_eq!(out.substituted, 3);
        assert!(out.unresolved.is_empty());
    }

    #[test]
    fn unknown_references_stay_verbatim() {
        let creds = provider();
        let out = resolve_placeholders("{cred:github.token}", Some(&creds));
        assert_eq!(out.text, "{cred:github.token}");
        assert_eq!(out.unresolved, vec!["github.token".to_string()]);
    }

    #[test]
    fn plain_text_passes_through() {
        assert!(!has_placeholders("hello {world}"));
        let out = resolve_placeholders("hello", None);
        assert_eq!(out.text, "hello");
        assert_eq!(out.substituted, 0);
    }

    #[test]
    fn debug_output_hides_the_secret() {
        let creds = provider();
        let out = resolve_placeholders("{cred:aihub.password}", Some(&creds));
        assert!(!format!("{:?}", out).contains("hunter2"));
    }
}
