//! Detection cache with TTL expiry and LRU bound
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use stepwright_core_types::ResolutionResult;
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::fingerprint::DetectionKey;

/// Results at or below this confidence are never cached.
pub const CACHE_CONFIDENCE_THRESHOLD: f64 = 0.7;
pub const DEFAULT_CACHE_ENTRIES: usize = 1000;
pub const DEFAULT_CACHE_TTL_SECS: u64 = 3600;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub max_entries: usize,
    pub ttl_secs: u64,
    pub min_confidence: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: DEFAULT_CACHE_ENTRIES,
            ttl_secs: DEFAULT_CACHE_TTL_SECS,
            min_confidence: CACHE_CONFIDENCE_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    result: ResolutionResult,
    inserted_at: Duration,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self, now: Duration) -> bool {
        now > self.inserted_at + self.ttl
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub total_detections: u64,
    pub successful_detections: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub hit_rate: f64,
    pub average_detection_ms: f64,
    pub average_confidence: f64,
    pub entries: usize,
}

#[derive(Default)]
struct Counters {
    total: u64,
    successful: u64,
    hits: u64,
    misses: u64,
    detection_ms_total: f64,
    confidence_total: f64,
}

struct Inner {
    entries: LruCache<DetectionKey, CacheEntry>,
    counters: Counters,
}

/// Key → [`ResolutionResult`] store consulted before any resolver tier runs.
///
/// Expired entries are dropped when read; [`DetectionCache::sweep`] removes them
/// proactively. Nothing is cleared automatically between runs.
pub struct DetectionCache {
    inner: Mutex<Inner>,
    config: CacheConfig,
    clock: Arc<dyn Clock>,
}

impl DetectionCache {
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        let capacity = NonZeroUsize::new(config.max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(Inner {
                entries: LruCache::new(capacity),
                counters: Counters::default(),
            }),
            config,
            clock,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn ttl(&self) -> Duration {
        Duration::from_secs(self.config.ttl_secs)
    }

    /// Unexpired entry for `key`, if any.
    pub fn get(&self, key: &DetectionKey) -> Option<ResolutionResult> {
        if !self.config.enabled {
            return None;
        }
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        let looked_up = inner
            .entries
            .get(key)
            .map(|entry| (entry.is_expired(now), entry.result.clone()));
        let hit = match looked_up {
            Some((false, result)) => Some(result),
            Some((true, _)) => {
                inner.entries.pop(key);
                debug!(key = %key, "detection cache entry expired");
                None
            }
            None => None,
        };
        if hit.is_some() {
            inner.counters.hits += 1;
        } else {
            inner.counters.misses += 1;
        }
        hit
    }

    /// Stores `result` when it was found with confidence above the threshold.
    /// Returns whether the entry was written.
    pub fn put(&self, key: DetectionKey, result: ResolutionResult) -> bool {
        if !self.config.enabled
            || !result.found
            || result.confidence <= self.config.min_confidence
        {
            return false;
        }
        let entry = CacheEntry {
            result: result.detached(),
            inserted_at: self.clock.now(),
            ttl: self.ttl(),
        };
        self.inner.lock().entries.put(key, entry);
        true
    }

    /// Records one resolution attempt for [`DetectionCache::stats`].
    pub fn record_detection(&self, elapsed: Duration, result: &ResolutionResult) {
        let mut inner = self.inner.lock();
        let counters = &mut inner.counters;
        counters.total += 1;
        counters.detection_ms_total += elapsed.as_secs_f64() * 1000.0;
        if result.found {
            counters.successful += 1;
            counters.confidence_total += result.confidence;
        }
    }

    /// Drops every expired entry; returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        let expired: Vec<DetectionKey> = inner
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            inner.entries.pop(key);
        }
        if !expired.is_empty() {
            debug!(removed = expired.len(), "swept expired detection cache entries");
        }
        expired.len()
    }

    pub fn clear(&self) {
        self.inner.lock().entries.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        let c = &inner.counters;
        let lookups = c.hits + c.misses;
        CacheStats {
            total_detections: c.total,
            successful_detections: c.successful,
            cache_hits: c.hits,
            cache_misses: c.misses,
            hit_rate: if lookups == 0 {
                0.0
            } else {
                c.hits as f64 / lookups as f64
            },
            average_detection_ms: if c.total == 0 {
                0.0
            } else {
                c.detection_ms_total / c.total as f64
            },
            average_confidence: if c.successful == 0 {
                0.0
            } else {
                c.confidence_total / c.successful as f64
            },
            entries: inner.entries.len(),
        }
    }
}

impl Default for DetectionCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::fingerprint::{ScreenshotFingerprint, StableContext};
    use stepwright_core_types::{Point, SourceTier};

    fn key(instruction: &str) -> DetectionKey {
        DetectionKey::compute(
            &ScreenshotFingerprint::from_parts(1, 2),
            instruction,
            &StableContext::default(),
        )
    }

    fn result(confidence: f64) -> ResolutionResult {
        ResolutionResult::found(SourceTier::Vision, Point::new(10.0, 20.0), None, confidence)
    }

    fn cache_with_clock() -> (DetectionCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let cache = DetectionCache::with_clock(CacheConfig::default(), clock.clone());
        (cache, clock)
    }

    #[test]
    fn ttl_boundary() {
        let (cache, clock) = cache_with_clock();
        assert!(cache.put(key("click on Save"), result(0.9)));

        clock.set(Duration::from_secs(3000));
        assert!(cache.get(&key("click on Save")).is_some());

        clock.set(Duration::from_secs(3700));
        assert!(cache.get(&key("click on Save")).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn low_confidence_and_misses_are_not_cached() {
        let (cache, _) = cache_with_clock();
        assert!(!cache.put(key("a"), result(0.7)));
        assert!(!cache.put(key("b"), ResolutionResult::not_found("nothing")));
        assert!(cache.put(key("c"), result(0.71)));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn sweep_removes_only_expired() {
        let (cache, clock) = cache_with_clock();
        cache.put(key("old"), result(0.9));
        clock.set(Duration::from_secs(3000));
        cache.put(key("new"), result(0.9));
        clock.set(Duration::from_secs(3601));
        assert_eq!(cache.sweep(), 1);
        assert!(cache.get(&key("new")).is_some());
    }

    #[test]
    fn bound_evicts_least_recently_used() {
        let clock = Arc::new(ManualClock::new());
        let cache = DetectionCache::with_clock(
            CacheConfig {
                max_entries: 2,
                ..CacheConfig::default()
            },
            clock,
        );
        cache.put(key("one"), result(0.9));
        cache.put(key("two"), result(0.9));
        cache.get(&key("one"));
        cache.put(key("three"), result(0.9));
        assert!(cache.get(&key("two")).is_none());
        assert!(cache.get(&key("one")).is_some());
    }

    #[test]
    fn stats_track_hits_and_detections() {
        let (cache, _) = cache_with_clock();
        cache.put(key("x"), result(0.9));
        cache.get(&key("x"));
        cache.get(&key("y"));
        cache.record_detection(Duration::from_millis(40), &result(0.8));
        cache.record_detection(Duration::from_millis(20), &ResolutionResult::not_found("no"));
        let stats = cache.stats();
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.cache_misses, 1);
        assert!((stats.hit_rate - 0.5).abs() < 1e-9);
        assert_eq!(stats.total_detections, 2);
        assert_eq!(stats.successful_detections, 1);
        assert!((stats.average_detection_ms - 30.0).abs() < 1e-6);
        assert!((stats.average_confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn clear_empties_entries() {
        let (cache, _) = cache_with_clock();
        cache.put(key("x"), result(0.9));
        cache.clear();
        assert!(cache.get(&key("x")).is_none());
    }
}
