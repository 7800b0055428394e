//! Configuration for stepwright runs.
//!
//! Loaded from YAML (see `cli::runtime::load_config`), then patched from the
//! environment. Each section maps onto the tunables of one engine crate.

use std::path::PathBuf;
use std::time::Duration;

use action_locator::ResolverConfig;
use action_primitives::ExecutorConfig;
use cdp_adapter::CdpConfig;
use perceiver_visual::CacheConfig;
use serde::{Deserialize, Serialize};
use stepwright_llm::openai::{DEFAULT_API_BASE, DEFAULT_NORMALIZER_MODEL, DEFAULT_VISION_MODEL};
use stepwright_llm::OpenAiConfig;
use tracing::{info, warn};
use ui_context::TrackerConfig;

pub const ENV_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_MODEL: &str = "STEPWRIGHT_MODEL";
pub const ENV_HEADLESS: &str = "STEPWRIGHT_HEADLESS";
pub const ENV_CHROME: &str = "STEPWRIGHT_CHROME";

const REDACTED: &str = "***";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmSettings,
    pub resolver: ResolverSettings,
    pub context: TrackerConfig,
    pub executor: ExecutorConfig,
    pub browser: CdpConfig,
    pub run: RunSettings,
}

/// Vision and normalizer model access.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub api_base: String,
    pub model: String,
    pub normalizer_model: String,
    /// Ask the model for alternative terms; otherwise the static rules are used
    pub normalize_terms: bool,
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_VISION_MODEL.to_string(),
            normalizer_model: DEFAULT_NORMALIZER_MODEL.to_string(),
            normalize_terms: true,
            timeout_secs: 60,
        }
    }
}

impl LlmSettings {
    /// Client settings, or `None` when models are disabled or no key is set.
    pub fn openai_config(&self) -> Option<OpenAiConfig> {
        if !self.enabled {
            return None;
        }
        let key = self.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty())?;
        let mut config = OpenAiConfig::new(key);
        config.api_base = self.api_base.trim_end_matches('/').to_string();
        config.model = self.model.clone();
        config.normalizer_model = self.normalizer_model.clone();
        config.timeout = Duration::from_secs(self.timeout_secs.max(1));
        Some(config)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverSettings {
    #[serde(flatten)]
    pub tiers: ResolverConfig,
    pub cache: CacheConfig,
}

/// Session-level policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    /// Budget for one step: resolution plus execution
    pub step_timeout_secs: u64,
    pub run_timeout_secs: u64,
    /// Stop at the first failed step instead of running the rest
    pub stop_on_failure: bool,
    /// Used for relative navigate targets when the plan has no base url
    pub base_url: Option<String>,
    pub output_dir: PathBuf,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            step_timeout_secs: 120,
            run_timeout_secs: 3600,
            stop_on_failure: false,
            base_url: None,
            output_dir: PathBuf::from("stepwright-output"),
        }
    }
}

impl RunSettings {
    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.step_timeout_secs.max(1))
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs.max(1))
    }
}

impl Config {
    /// Applies `OPENAI_API_KEY`, `STEPWRIGHT_MODEL`, `STEPWRIGHT_HEADLESS` and
    /// `STEPWRIGHT_CHROME` from the process environment.
    pub fn apply_env_overrides(&mut self) -> Vec<&'static str> {
        self.apply_overrides_from(|name| std::env::var(name).ok())
    }

    /// Same as [`Config::apply_env_overrides`] over an arbitrary lookup. Returns the
    /// names of the variables that took effect.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Vec<&'static str>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut applied = Vec::new();
        let value = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(key) = value(ENV_API_KEY) {
            self.llm.api_key = Some(key);
            applied.push(ENV_API_KEY);
        }
        if let Some(model) = value(ENV_MODEL) {
            self.llm.model = model;
            applied.push(ENV_MODEL);
        }
        if let Some(raw) = value(ENV_HEADLESS) {
            match parse_flag(&raw) {
                Some(headless) => {
                    self.browser.headless = headless;
                    applied.push(ENV_HEADLESS);
                }
                None => warn!(value = %raw, "ignoring unrecognised {}", ENV_HEADLESS),
            }
        }
        if let Some(path) = value(ENV_CHROME) {
            self.browser.executable = Some(PathBuf::from(path));
            applied.push(ENV_CHROME);
        }

        if !applied.is_empty() {
            info!(variables = ?applied, "applied environment overrides");
        }
        applied
    }

    /// Copy safe to print: secrets are masked.
    pub fn redacted(&self) -> Config {
        let mut copy = self.clone();
        if copy.llm.api_key.is_some() {
            copy.llm.api_key = Some(REDACTED.to_string());
        }
        copy
    }

    pub fn has_model_access(&self) -> bool {
        self.llm.openai_config().is_some()
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn sections_parse_from_yaml() {
        let raw = r#"
llm:
  model: gpt-4o
resolver:
  probe_workers: 2
  vision_attempts: 2
  cache:
    ttl_secs: 600
context:
  lifetime_steps: 7
executor:
  download_timeout_ms: 5000
  expected_menu_items: [APP, Chatbot]
browser:
  headless: false
run:
  stop_on_failure: true
"#;
        let config: Config = serde_yaml::from_str(raw).unwrap();
        assert_eq!(config.llm.model, "gpt-4o");
        assert_eq!(config.resolver.tiers.probe_workers, 2);
        assert_eq!(config.resolver.tiers.vision_attempts, 2);
        assert_eq!(config.resolver.cache.ttl_secs, 600);
        assert_eq!(config.resolver.cache.max_entries, CacheConfig::default().max_entries);
        assert_eq!(config.context.lifetime_steps, 7);
        assert_eq!(config.executor.download_timeout_ms, 5000);
        assert_eq!(config.executor.expected_menu_items, vec!["APP", "Chatbot"]);
        assert!(!config.browser.headless);
        assert!(config.run.stop_on_failure);
        assert_eq!(config.run.step_timeout_secs, 120);
    }

    #[test]
    fn env_overrides_patch_the_config() {
        let mut config = Config::default();
        let applied = config.apply_overrides_from(lookup(&[
            (ENV_API_KEY, "sk-test"),
            (ENV_MODEL, "gpt-4o"),
            (ENV_HEADLESS, "off"),
            (ENV_CHROME, "/opt/chrome/chrome"),
        ]));
        assert_eq!(applied.len(), 4);
        assert_eq!(config.llm.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.llm.model, "gpt-4o");
        assert!(!config.browser.headless);
        assert_eq!(config.browser.executable, Some(PathBuf::from("/opt/chrome/chrome")));
    }

    #[test]
    fn unparseable_headless_value_is_ignored() {
        let mut config = Config::default();
        let before = config.browser.headless;
        let applied = config.apply_overrides_from(lookup(&[(ENV_HEADLESS, "sometimes")]));
        assert!(applied.is_empty());
        assert_eq!(config.browser.headless, before);
    }

    #[test]
    fn model_access_needs_a_key_and_the_switch() {
        let mut config = Config::default();
        assert!(!config.has_model_access());
        config.llm.api_key = Some("  ".into());
        assert!(!config.has_model_access());
        config.llm.api_key = Some("sk-test".into());
        assert!(config.has_model_access());
        config.llm.enabled = false;
        assert!(!config.has_model_access());
    }

    #[test]
    fn redacted_copy_hides_the_key() {
        let mut config = Config::default();
        config.llm.api_key = Some("sk-live-123".into());
        let shown = serde_yaml::to_string(&config.redacted()).unwrap();
        assert!(!shown.contains("sk-live-123"));
        assert!(shown.contains(REDACTED));
    }
}
