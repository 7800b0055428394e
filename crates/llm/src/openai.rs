use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::LlmError;

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_VISION_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_NORMALIZER_MODEL: &str = "gpt-4o-mini";

/// USD per 1k tokens used for the running cost estimate.
const INPUT_COST_PER_1K: f64 = 0.01;
const OUTPUT_COST_PER_1K: f64 = 0.03;

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub api_base: String,
    pub model: String,
    pub normalizer_model: String,
    pub timeout: Duration,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_VISION_MODEL.to_string(),
            normalizer_model: DEFAULT_NORMALIZER_MODEL.to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct UsageStats {
    pub total_requests: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub estimated_cost: f64,
}

impl UsageStats {
    pub fn cost_of(input_tokens: u64, output_tokens: u64) -> f64 {
        input_tokens as f64 * INPUT_COST_PER_1K / 1000.0
            + output_tokens as f64 * OUTPUT_COST_PER_1K / 1000.0
    }
}

#[derive(Default)]
struct UsageCounters {
    requests: AtomicU64,
    input_tokens: AtomicU64,
    output_tokens: AtomicU64,
}

/// Chat-completions client shared by the vision detector and the term normalizer.
pub struct OpenAiClient {
    client: Client,
    config: OpenAiConfig,
    usage: UsageCounters,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Result<Self, LlmError> {
        if config.api_key.trim().is_empty() {
            return Err(LlmError::MissingApiKey);
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| LlmError::Client(err.to_string()))?;
        Ok(Self {
            client,
            config,
            usage: UsageCounters::default(),
        })
    }

    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }

    pub fn usage(&self) -> UsageStats {
        let input = self.usage.input_tokens.load(Ordering::Relaxed);
        let output = self.usage.output_tokens.load(Ordering::Relaxed);
        UsageStats {
            total_requests: self.usage.requests.load(Ordering::Relaxed),
            input_tokens: input,
            output_tokens: output,
            estimated_cost: UsageStats::cost_of(input, output),
        }
    }

    /// One chat completion; returns the text of the first choice.
    pub(crate) async fn complete(
        &self,
        model: &str,
        messages: Vec<ChatMessage>,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, LlmError> {
        let url = format!(
            "{}/chat/completions",
            self.config.api_base.trim_end_matches('/')
        );
        let body = ChatCompletionRequest {
            model: model.to_string(),
            messages,
            max_tokens,
            temperature,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "<response unavailable>".to_string());
            warn!(target: "openai", status = status.as_u16(), "chat completion rejected");
            return Err(LlmError::Status {
                status: status.as_u16(),
                body: provider_message(&text),
            });
        }

        let response: ChatCompletionResponse = response.json().await?;
        self.usage.requests.fetch_add(1, Ordering::Relaxed);
        if let Some(usage) = &response.usage {
            self.usage
                .input_tokens
                .fetch_add(usage.prompt_tokens, Ordering::Relaxed);
            self.usage
                .output_tokens
                .fetch_add(usage.completion_tokens, Ordering::Relaxed);
            debug!(
                target: "openai",
                model,
                input_tokens = usage.prompt_tokens,
                output_tokens = usage.completion_tokens,
                cost = UsageStats::cost_of(usage.prompt_tokens, usage.completion_tokens),
                "chat completion usage"
            );
        }

        response
            .choices
            .first()
            .and_then(|choice| choice.message.content.as_text())
            .map(|text| text.trim().to_string())
            .ok_or_else(|| LlmError::InvalidResponse("response missing content".into()))
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatMessage {
    pub role: &'static str,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user_parts(parts: Vec<ContentPart>) -> Self {
        Self {
            role: "user",
            content: MessageContent::Parts(parts),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub(crate) enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
pub(crate) struct ImageUrl {
    pub url: String,
    pub detail: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
    #[serde(default)]
    usage: Option<ChatCompletionUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionMessage,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionMessage {
    content: ChatCompletionContent,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ChatCompletionContent {
    Text(String),
    Parts(Vec<ChatCompletionPart>),
}

impl ChatCompletionContent {
    fn as_text(&self) -> Option<String> {
        match self {
            ChatCompletionContent::Text(value) => Some(value.clone()),
            ChatCompletionContent::Parts(parts) => {
                let text = parts
                    .iter()
                    .filter_map(|part| part.text.as_deref())
                    .collect::<Vec<_>>()
                    .join("\n");
                (!text.is_empty()).then_some(text)
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionPart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatCompletionUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorMessage,
}

#[derive(Debug, Deserialize)]
struct ErrorMessage {
    #[serde(default)]
    message: Option<String>,
}

/// Provider error message when the body is the usual `{ "error": { "message" } }` envelope.
fn provider_message(raw: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(raw)
        .ok()
        .and_then(|env| env.error.message)
        .map(|m| m.trim().to_string())
        .unwrap_or_else(|| raw.chars().take(300).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_parts_serialize_in_chat_shape() {
        let msg = ChatMessage::user_parts(vec![
            ContentPart::Text {
                text: "find it".into(),
            },
            ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: "data:image/png;base64,AAAA".into(),
                    detail: "high",
                },
            },
        ]);
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["content"][0]["type"], "text");
        assert_eq!(value["content"][1]["type"], "image_url");
        assert_eq!(value["content"][1]["image_url"]["detail"], "high");
    }

    #[test]
    fn cost_estimate_uses_token_prices() {
        let cost = UsageStats::cost_of(1000, 1000);
        assert!((cost - 0.04).abs() < 1e-9);
    }

    #[test]
    fn empty_key_is_rejected() {
        assert!(matches!(
            OpenAiClient::new(OpenAiConfig::new("  ")),
            Err(LlmError::MissingApiKey)
        ));
    }

    #[test]
    fn provider_errors_are_unwrapped() {
        let raw = r#"{"error":{"message":" Rate limit reached ","type":"requests"}}"#;
        assert_eq!(provider_message(raw), "Rate limit reached");
        assert_eq!(provider_message("plain failure"), "plain failure");
    }
}
