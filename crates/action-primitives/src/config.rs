use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Pause after a successful click so the page can react.
pub const CLICK_SETTLE_MS: u64 = 1000;
/// Time a dropdown gets to render before it is inspected.
pub const MENU_RENDER_MS: u64 = 1000;
/// Pause after input that destroyed the execution context.
pub const NAVIGATION_SETTLE_MS: u64 = 2000;
pub const DOWNLOAD_TIMEOUT_MS: u64 = 10_000;
pub const DOWNLOAD_POLL_MS: u64 = 250;
/// Files modified this recently count as fresh downloads.
pub const DOWNLOAD_RECENT_SECS: u64 = 60;
pub const NAVIGATION_TIMEOUT_MS: u64 = 30_000;
/// Pause after `goto` before the landing page is read.
pub const NAVIGATE_SETTLE_MS: u64 = 1000;
pub const VERIFY_LOAD_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_WAIT_MS: u64 = 2000;
pub const DROPDOWN_FORCE_ATTEMPTS: usize = 3;

/// Executor tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub click_settle_ms: u64,
    pub menu_render_ms: u64,
    pub navigation_settle_ms: u64,
    pub download_timeout_ms: u64,
    pub download_poll_ms: u64,
    pub download_recent_secs: u64,
    pub navigation_timeout_ms: u64,
    pub navigate_settle_ms: u64,
    pub verify_load_timeout_ms: u64,
    pub default_wait_ms: u64,
    pub clear_before_typing: bool,
    /// Labels a freshly opened dropdown must show at least one of. Empty accepts any item.
    pub expected_menu_items: Vec<String>,
    /// Used when the page does not report its own download directory
    pub downloads_dir: PathBuf,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            click_settle_ms: CLICK_SETTLE_MS,
            menu_render_ms: MENU_RENDER_MS,
            navigation_settle_ms: NAVIGATION_SETTLE_MS,
            download_timeout_ms: DOWNLOAD_TIMEOUT_MS,
            download_poll_ms: DOWNLOAD_POLL_MS,
            download_recent_secs: DOWNLOAD_RECENT_SECS,
            navigation_timeout_ms: NAVIGATION_TIMEOUT_MS,
            navigate_settle_ms: NAVIGATE_SETTLE_MS,
            verify_load_timeout_ms: VERIFY_LOAD_TIMEOUT_MS,
            default_wait_ms: DEFAULT_WAIT_MS,
            clear_before_typing: true,
            expected_menu_items: Vec::new(),
            downloads_dir: PathBuf::from("downloads"),
        }
    }
}

impl ExecutorConfig {
    /// Same settings with every fixed pause removed. Timeouts are kept.
    pub fn without_pauses(mut self) -> Self {
        self.click_settle_ms = 0;
        self.menu_render_ms = 0;
        self.navigation_settle_ms = 0;
        self.navigate_settle_ms = 0;
        self.download_poll_ms = 10;
        self
    }

    pub fn click_settle(&self) -> Duration {
        Duration::from_millis(self.click_settle_ms)
    }

    pub fn menu_render(&self) -> Duration {
        Duration::from_millis(self.menu_render_ms)
    }

    pub fn navigation_settle(&self) -> Duration {
        Duration::from_millis(self.navigation_settle_ms)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_millis(self.download_timeout_ms)
    }

    pub fn download_poll(&self) -> Duration {
        Duration::from_millis(self.download_poll_ms.max(1))
    }

    pub fn download_recent(&self) -> Duration {
        Duration::from_secs(self.download_recent_secs)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub fn navigate_settle(&self) -> Duration {
        Duration::from_millis(self.navigate_settle_ms)
    }

    pub fn verify_load_timeout(&self) -> Duration {
        Duration::from_millis(self.verify_load_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let config: ExecutorConfig =
            serde_json::from_str(r#"{"expected_menu_items": ["Chatbot"]}"#).expect("config");
        assert_eq!(config.expected_menu_items, vec!["Chatbot".to_string()]);
        assert_eq!(config.download_timeout(), Duration::from_secs(10));
        assert!(config.clear_before_typing);
    }

    #[test]
    fn pauses_can_be_removed() {
        let config = ExecutorConfig::default().without_pauses();
        assert_eq!(config.click_settle(), Duration::ZERO);
        assert_eq!(config.download_timeout(), Duration::from_secs(10));
    }
}
