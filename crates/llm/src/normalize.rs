//! Term normalization: human phrase → selector-friendly alternatives.

use std::sync::Arc;

use async_trait::async_trait;
use stepwright_core_types::ActionType;
use tracing::{debug, warn};

use crate::errors::LlmError;
use crate::openai::{ChatMessage, OpenAiClient};
use crate::utils::extract_json_object;

pub const MAX_NORMALIZED_TERMS: usize = 6;
pub const NORMALIZER_MAX_TOKENS: u32 = 100;
const NORMALIZER_TEMPERATURE: f32 = 0.1;

pub const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "he", "in", "is", "it",
    "its", "of", "on", "that", "the", "to", "was", "were", "will", "with", "would", "this", "these",
    "those", "they", "there", "their", "then", "than", "them", "can", "could", "should", "may",
    "might", "must", "shall", "do", "does", "did", "have", "had", "been", "being",
];

const SYNONYMS: &[(&str, &[&str])] = &[
    ("workspaces", &["workspace", "work space", "projects"]),
    ("create dropdown", &["create", "new", "add", "+"]),
    ("create", &["new", "add", "+"]),
    ("menu", &["navigation", "nav"]),
    ("sign in", &["login", "log in", "signin"]),
    ("my", &["my", "mine", "personal"]),
    ("conversation", &["chat", "conversation", "messaging"]),
];

pub fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(&word.to_lowercase().as_str())
}

fn strip_stop_words(text: &str) -> Vec<String> {
    text.split_whitespace()
        .filter(|w| !is_stop_word(w))
        .map(str::to_lowercase)
        .collect()
}

#[derive(Debug, Clone)]
pub struct NormalizeRequest {
    pub action: ActionType,
    pub target: String,
    pub page_url: String,
    pub page_title: String,
}

#[async_trait]
pub trait TermNormalizer: Send + Sync {
    async fn normalize(&self, request: &NormalizeRequest) -> Result<Vec<String>, LlmError>;
}

/// Case variants plus the synonym table, original first, no duplicates,
/// capped like model terms.
pub fn static_normalization(target: &str) -> Vec<String> {
    let mut terms = vec![target.to_string()];
    let lower = target.to_lowercase();
    if target != lower {
        terms.push(lower.clone());
    }
    let capitalized = capitalize(target);
    if target != capitalized {
        terms.push(capitalized);
    }
    let upper = target.to_uppercase();
    if target != upper {
        terms.push(upper);
    }
    for (key, values) in SYNONYMS {
        if lower.contains(key) {
            terms.extend(values.iter().map(|v| v.to_string()));
        }
    }
    let mut terms = dedup_in_order(terms);
    terms.truncate(MAX_NORMALIZED_TERMS);
    terms
}

fn capitalize(text: &str) -> String {
    let lower = text.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn dedup_in_order(terms: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(terms.len());
    for term in terms {
        if !out.contains(&term) {
            out.push(term);
        }
    }
    out
}

/// Filters stop words from model terms, puts `target` first and caps the list.
pub fn post_process_terms(raw_terms: &[String], target: &str) -> Vec<String> {
    let mut terms = Vec::new();
    for term in raw_terms {
        let words: Vec<&str> = term.split_whitespace().collect();
        let kept = strip_stop_words(term);
        if kept.is_empty() {
            continue;
        }
        if words.len() == 1 {
            terms.push(term.clone());
            continue;
        }
        let cleaned = kept.join(" ");
        let keep_original = term != &cleaned && words.len() <= 3;
        terms.push(cleaned);
        if keep_original {
            terms.push(term.clone());
        }
    }
    let mut terms = dedup_in_order(terms);
    terms.retain(|t| t != target);
    terms.insert(0, target.to_string());
    terms.truncate(MAX_NORMALIZED_TERMS);
    terms
}

/// Normalizer used when no model is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct StaticNormalizer;

#[async_trait]
impl TermNormalizer for StaticNormalizer {
    async fn normalize(&self, request: &NormalizeRequest) -> Result<Vec<String>, LlmError> {
        Ok(static_normalization(&request.target))
    }
}

pub struct OpenAiTermNormalizer {
    client: Arc<OpenAiClient>,
}

impl OpenAiTermNormalizer {
    pub fn new(client: Arc<OpenAiClient>) -> Self {
        Self { client }
    }

    fn prompt(request: &NormalizeRequest) -> String {
        let kept = strip_stop_words(&request.target);
        let clean = if kept.is_empty() {
            request.target.clone()
        } else {
            kept.join(" ")
        };
        format!(
            r#"You convert UI test instructions into terms that match element text and attributes.

Instruction: "{action} on {clean}"
Original target: "{target}"
Page: {title} ({url})

List 3-5 alternative terms for the same UI element: spelling and case variants,
singular/plural, common synonyms, abbreviations. Skip filler words such as "on",
"the", "to" or "from".

Reply with a JSON list of strings only, for example:
"sign in" -> ["sign in", "login", "log in", "signin", "Sign In"]
"create button" -> ["create", "Create", "new", "+", "add"]"#,
            action = request.action.name(),
            clean = clean,
            target = request.target,
            title = request.page_title,
            url = request.page_url,
        )
    }
}

fn parse_term_list(content: &str) -> Result<Vec<String>, LlmError> {
    if let Ok(list) = serde_json::from_str::<Vec<String>>(content.trim()) {
        return Ok(list);
    }
    let start = content.find('[');
    let end = content.rfind(']');
    match (start, end) {
        (Some(s), Some(e)) if s < e => serde_json::from_str::<Vec<String>>(&content[s..=e])
            .map_err(|err| LlmError::InvalidResponse(format!("term list: {err}"))),
        _ => {
            // some models answer {"terms": [...]}
            let obj = extract_json_object(content)
                .ok_or_else(|| LlmError::InvalidResponse("no term list in response".into()))?;
            let value: serde_json::Value = serde_json::from_str(&obj)
                .map_err(|err| LlmError::InvalidResponse(format!("term list: {err}")))?;
            value
                .get("terms")
                .and_then(|t| serde_json::from_value::<Vec<String>>(t.clone()).ok())
                .ok_or_else(|| LlmError::InvalidResponse("no term list in response".into()))
        }
    }
}

#[async_trait]
impl TermNormalizer for OpenAiTermNormalizer {
    async fn normalize(&self, request: &NormalizeRequest) -> Result<Vec<String>, LlmError> {
        let model = self.client.config().normalizer_model.clone();
        let content = self
            .client
            .complete(
                &model,
                vec![ChatMessage::user_text(Self::prompt(request))],
                NORMALIZER_MAX_TOKENS,
                NORMALIZER_TEMPERATURE,
            )
            .await?;
        let raw = parse_term_list(&content)?;
        let terms = post_process_terms(&raw, &request.target);
        debug!(target_text = %request.target, ?terms, "normalized target");
        Ok(terms)
    }
}

/// Model terms when available, otherwise the static table.
pub async fn normalize_or_fallback(
    normalizer: &dyn TermNormalizer,
    request: &NormalizeRequest,
) -> Vec<String> {
    match normalizer.normalize(request).await {
        Ok(terms) if !terms.is_empty() => terms,
        Ok(_) => static_normalization(&request.target),
        Err(err) => {
            warn!(error = %err, "term normalization failed, using static synonyms");
            static_normalization(&request.target)
        }
    }
}
