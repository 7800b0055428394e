//! Download triggers and detection of the files they produce.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use cdp_adapter::{AnchorDescriptor, ElementInfo, PageQuery};
use stepwright_core_types::ExecCtx;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::errors::ActionError;
use crate::primitives::{first_visible, pause};

const TRIGGER_WORDS: [&str; 3] = ["export", "download", "csv"];

/// Suffixes of files the browser is still writing.
const PARTIAL_SUFFIXES: [&str; 3] = ["crdownload", "part", "tmp"];

pub fn is_download_trigger(target: &str, element: Option<&ElementInfo>) -> bool {
    let lower = target.to_lowercase();
    if TRIGGER_WORDS.iter().any(|word| lower.contains(word)) {
        return true;
    }
    element
        .map(|el| {
            (el.tag == "button" && el.text.to_lowercase().contains("export"))
                || el.data_target.as_deref() == Some("submitButton")
        })
        .unwrap_or(false)
}

fn is_partial(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| PARTIAL_SUFFIXES.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

async fn list_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(err) => {
            debug!(dir = %dir.display(), error = %err, "download directory unreadable");
            return files;
        }
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files
}

/// Snapshot of a download directory taken before the triggering click.
#[derive(Debug, Clone)]
pub struct DownloadWatch {
    dir: PathBuf,
    before: HashSet<PathBuf>,
}

impl DownloadWatch {
    pub async fn start(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let before = list_files(&dir).await.into_iter().collect();
        Self { dir, before }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn new_file(&self) -> Option<PathBuf> {
        list_files(&self.dir)
            .await
            .into_iter()
            .find(|path| !self.before.contains(path) && !is_partial(path))
    }

    /// First finished file that appeared since [`DownloadWatch::start`].
    ///
    /// `Ok(None)` on timeout; only cancellation is an error.
    pub async fn wait(
        &self,
        timeout: Duration,
        poll: Duration,
        ctx: &ExecCtx,
    ) -> Result<Option<PathBuf>, ActionError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(path) = self.new_file().await {
                info!(file = %path.display(), "download finished");
                return Ok(Some(path));
            }
            if Instant::now() >= deadline {
                warn!(
                    dir = %self.dir.display(),
                    timeout_ms = timeout.as_millis() as u64,
                    "no download appeared, continuing"
                );
                return Ok(None);
            }
            pause(ctx, poll.max(Duration::from_millis(1))).await?;
        }
    }
}

fn notice_anchors(words: &[&str]) -> Vec<AnchorDescriptor> {
    let mut anchors = Vec::new();
    for word in words {
        anchors.push(AnchorDescriptor::has_text("[role='alert']", *word));
        anchors.push(AnchorDescriptor::has_text(".toast", *word));
        anchors.push(AnchorDescriptor::has_text(".notification", *word));
    }
    anchors
}

/// The page shows signs of a download in progress.
pub async fn download_started(page: &(impl PageQuery + ?Sized)) -> bool {
    let mut anchors = notice_anchors(&["download", "export"]);
    anchors.extend([
        AnchorDescriptor::css("[role='progressbar']"),
        AnchorDescriptor::css(".progress-bar"),
        AnchorDescriptor::css("[class*='progress']"),
        AnchorDescriptor::has_text("[role='dialog']", "download"),
        AnchorDescriptor::has_text("[role='dialog']", "save"),
        AnchorDescriptor::has_text("[role='dialog']", "file"),
    ]);
    if let Some((anchor, _)) = first_visible(page, &anchors).await {
        debug!(anchor = %anchor, "download indicator visible");
        return true;
    }
    match page.url().await {
        Ok(url) => ["download", "export", ".csv"]
            .iter()
            .any(|marker| url.contains(marker)),
        Err(_) => false,
    }
}

/// Toasts or alerts announcing a finished download of `file_type`.
pub async fn download_notice(page: &(impl PageQuery + ?Sized), file_type: &str) -> Option<String> {
    let mut words = vec!["success", "download", "export"];
    if !file_type.is_empty() && !words.contains(&file_type) {
        words.push(file_type);
    }
    first_visible(page, &notice_anchors(&words))
        .await
        .map(|(_, el)| el.text.trim().to_string())
}

/// Files in `dir` modified within `window`, preferring the `file_type` extension.
pub async fn recent_downloads(dir: &Path, file_type: &str, window: Duration) -> Vec<PathBuf> {
    let files: Vec<PathBuf> = list_files(dir)
        .await
        .into_iter()
        .filter(|path| !is_partial(path))
        .collect();
    let wanted = file_type.to_ascii_lowercase();
    let typed: Vec<PathBuf> = if wanted.is_empty() || wanted == "file" {
        files.clone()
    } else {
        files
            .iter()
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| ext.eq_ignore_ascii_case(&wanted))
                    .unwrap_or(false)
            })
            .cloned()
            .collect()
    };
    let candidates = if typed.is_empty() { files } else { typed };

    let now = SystemTime::now();
    let mut recent = Vec::new();
    for path in candidates {
        let Ok(meta) = tokio::fs::metadata(&path).await else {
            continue;
        };
        let fresh = meta
            .modified()
            .ok()
            .and_then(|modified| now.duration_since(modified).ok())
            .map(|age| age < window)
            .unwrap_or(false);
        if fresh {
            recent.push(path);
        }
    }
    recent
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdp_adapter::mock::MockPage;

    #[test]
    fn trigger_detection() {
        assert!(is_download_trigger("Export CSV button", None));
        assert!(is_download_trigger("Download report", None));
        assert!(!is_download_trigger("Save", None));

        let export = ElementInfo::new("sw-1", "button", "Export results");
        assert!(is_download_trigger("the blue button", Some(&export)));
        let mut submit = ElementInfo::new("sw-2", "div", "Go");
        submit.data_target = Some("submitButton".into());
        assert!(is_download_trigger("Go", Some(&submit)));
    }

    #[tokio::test]
    async fn watch_ignores_preexisting_and_partial_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("old.csv"), "a,b").unwrap();
        let watch = DownloadWatch::start(dir.path()).await;
        std::fs::write(dir.path().join("report.csv.crdownload"), "").unwrap();
        assert!(watch.new_file().await.is_none());

        std::fs::write(dir.path().join("report.csv"), "a,b").unwrap();
        let ctx = ExecCtx::with_budget(1, Duration::from_secs(5));
        let found = watch
            .wait(Duration::from_secs(1), Duration::from_millis(5), &ctx)
            .await
            .unwrap();
        assert_eq!(found, Some(dir.path().join("report.csv")));
    }

    #[tokio::test]
    async fn watch_times_out_quietly() {
        let dir = tempfile::tempdir().unwrap();
        let watch = DownloadWatch::start(dir.path()).await;
        let ctx = ExecCtx::with_budget(1, Duration::from_secs(5));
        let found = watch
            .wait(Duration::from_millis(30), Duration::from_millis(5), &ctx)
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn recent_files_prefer_the_requested_type() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.csv"), "x").unwrap();
        std::fs::write(dir.path().join("b.json"), "{}").unwrap();
        let csv = recent_downloads(dir.path(), "csv", Duration::from_secs(60)).await;
        assert_eq!(csv, vec![dir.path().join("a.csv")]);
        let fallback = recent_downloads(dir.path(), "xlsx", Duration::from_secs(60)).await;
        assert_eq!(fallback.len(), 2);
    }

    #[tokio::test]
    async fn progress_bar_or_url_signal_a_download() {
        let page = MockPage::new();
        assert!(!download_started(&page).await);
        page.add(
            AnchorDescriptor::css("[role='progressbar']"),
            vec![ElementInfo::new("sw-p", "div", "")],
        );
        assert!(download_started(&page).await);

        let page = MockPage::new().with_url("https://app.example.com/export/42");
        assert!(download_started(&page).await);
    }
}
