use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::time::UNIX_EPOCH;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Cheap identity of a screenshot file: modification time and size, never its bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScreenshotFingerprint(String);

impl ScreenshotFingerprint {
    pub const MISSING: &'static str = "missing";

    pub fn of(path: &Path) -> Self {
        match std::fs::metadata(path) {
            Ok(meta) => {
                let mtime = meta
                    .modified()
                    .ok()
                    .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                    .map(|d| d.as_secs())
                    .unwrap_or(0);
                Self::from_parts(mtime, meta.len())
            }
            Err(_) => Self::missing(),
        }
    }

    pub fn from_parts(mtime_secs: u64, size: u64) -> Self {
        Self(format!("{}_{}", mtime_secs, size))
    }

    pub fn missing() -> Self {
        Self(Self::MISSING.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScreenshotFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The part of the page context that identifies "the same situation" across runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StableContext {
    pub url: Option<String>,
    pub title: Option<String>,
    pub element_type: Option<String>,
}

impl StableContext {
    /// Sorted-key JSON of the fields that are present.
    fn canonical_json(&self) -> String {
        let mut map = BTreeMap::new();
        if let Some(url) = &self.url {
            map.insert("url", url.as_str());
        }
        if let Some(title) = &self.title {
            map.insert("title", title.as_str());
        }
        if let Some(element_type) = &self.element_type {
            map.insert("element_type", element_type.as_str());
        }
        serde_json::to_string(&map).unwrap_or_default()
    }
}

/// Key of a [`crate::DetectionCache`] entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DetectionKey(String);

impl DetectionKey {
    pub fn compute(
        fingerprint: &ScreenshotFingerprint,
        instruction: &str,
        context: &StableContext,
    ) -> Self {
        let instruction_hash = sha256_hex(instruction.as_bytes());
        let context_hash = sha256_hex(context.canonical_json().as_bytes());
        let combined = format!("{}_{}_{}", fingerprint, instruction_hash, context_hash);
        Self(sha256_hex(combined.as_bytes()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DetectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn ctx(url: &str) -> StableContext {
        StableContext {
            url: Some(url.to_string()),
            title: Some("Dashboard".to_string()),
            element_type: None,
        }
    }

    #[test]
    fn fingerprint_uses_size_and_mtime() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"12345").unwrap();
        let fp = ScreenshotFingerprint::of(file.path());
        assert!(fp.as_str().ends_with("_5"), "{}", fp);
        assert_ne!(fp.as_str(), ScreenshotFingerprint::MISSING);
    }

    #[test]
    fn absent_file_is_missing() {
        let fp = ScreenshotFingerprint::of(Path::new("/definitely/not/here.png"));
        assert_eq!(fp, ScreenshotFingerprint::missing());
    }

    #[test]
    fn key_depends_on_every_component() {
        let fp = ScreenshotFingerprint::from_parts(100, 2048);
        let base = DetectionKey::compute(&fp, "click on Save", &ctx("https://a.test/"));
        assert_eq!(
            base,
            DetectionKey::compute(&fp, "click on Save", &ctx("https://a.test/"))
        );
        assert_ne!(
            base,
            DetectionKey::compute(&fp, "click on Cancel", &ctx("https://a.test/"))
        );
        assert_ne!(
            base,
            DetectionKey::compute(&fp, "click on Save", &ctx("https://b.test/"))
        );
        let later = ScreenshotFingerprint::from_parts(101, 2048);
        assert_ne!(
            base,
            DetectionKey::compute(&later, "click on Save", &ctx("https://a.test/"))
        );
        assert_eq!(base.as_str().len(), 64);
    }
}
