//! LRU + TTL memoization of resolver outcomes, including failures.
//!
//! Ported from an `OrderedDict`-based cache: entries are kept in
//! insertion/access order, with `move_to_end` on touch and `popitem(last=false)`
//! on eviction. Time is injected via `Clock` so TTL edge cases are
//! deterministic in tests instead of relying on `thread::sleep`.

use crate::types::ResolutionResult;
use std::collections::{HashMap, VecDeque};
use std::time::{SystemTime, UNIX_EPOCH};

pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

pub struct UrlResolutionCache {
    max_size: usize,
    ttl_ms: u64,
    entries: HashMap<String, (ResolutionResult, u64)>,
    order: VecDeque<String>,
    clock: Box<dyn Clock>,
}

impl UrlResolutionCache {
    pub fn new(max_size: usize, ttl_secs: u64) -> Self {
        Self::with_clock(max_size, ttl_secs, Box::new(SystemClock))
    }

    pub fn with_clock(max_size: usize, ttl_secs: u64, clock: Box<dyn Clock>) -> Self {
        Self {
            max_size,
            ttl_ms: ttl_secs.saturating_mul(1000),
            entries: HashMap::new(),
            order: VecDeque::new(),
            clock,
        }
    }

    /// Returns `None` on miss or on a stale hit (which also evicts it).
    /// On a fresh hit, promotes the key to most-recently-used.
    pub fn get(&mut self, key: &str) -> Option<ResolutionResult> {
        let (result, inserted_at) = self.entries.get(key)?.clone();
        let now = self.clock.now_ms();
        if now.saturating_sub(inserted_at) > self.ttl_ms {
            self.remove(key);
            return None;
        }
        self.touch(key);
        Some(result)
    }

    pub fn put(&mut self, key: &str, result: ResolutionResult) {
        self.prune_expired();

        let now = self.clock.now_ms();
        if self.entries.contains_key(key) {
            self.entries.insert(key.to_string(), (result, now));
            self.touch(key);
            return;
        }

        if self.entries.len() >= self.max_size {
            if let Some(lru_key) = self.order.pop_front() {
                self.entries.remove(&lru_key);
            }
        }

        self.entries.insert(key.to_string(), (result, now));
        self.order.push_back(key.to_string());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn touch(&mut self, key: &str) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
        }
        self.order.push_back(key.to_string());
    }

    fn remove(&mut self, key: &str) {
        self.entries.remove(key);
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
        }
    }

    fn prune_expired(&mut self) {
        let now = self.clock.now_ms();
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, (_, ts))| now.saturating_sub(*ts) > self.ttl_ms)
            .map(|(k, _)| k.clone())
            .collect();
        for key in expired {
            self.remove(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ResolutionResult, ResolutionStatus};
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    struct FakeClock(Arc<AtomicU64>);
    impl Clock for FakeClock {
        fn now_ms(&self) -> u64 {
            self.0.load(Ordering::SeqCst)
        }
    }

    fn ok_result(url: &str) -> ResolutionResult {
        ResolutionResult {
            status: ResolutionStatus::Ok,
            resolved_url: Some(url.to_string()),
            search_query: url.to_string(),
            candidates_found: 1,
            selected_reason: Some("text_match".into()),
            elapsed_ms: 10,
            error_message: None,
            from_cache: false,
        }
    }

    fn cache_with_clock(max_size: usize, ttl_secs: u64) -> (UrlResolutionCache, Arc<AtomicU64>) {
        let time = Arc::new(AtomicU64::new(0));
        let clock = FakeClock(time.clone());
        (UrlResolutionCache::with_clock(max_size, ttl_secs, Box::new(clock)), time)
    }

    #[test]
    fn never_exceeds_max_size_and_evicts_lru() {
        let (mut cache, _time) = cache_with_clock(3, 3600);
        cache.put("a", ok_result("a"));
        cache.put("b", ok_result("b"));
        cache.put("c", ok_result("c"));
        cache.get("a");
        cache.put("d", ok_result("d"));

        assert_eq!(cache.len(), 3);
        assert!(cache.get("b").is_none()); // evicted: least recently touched
        assert!(cache.get("a").is_some());
        assert!(cache.get("c").is_some());
        assert!(cache.get("d").is_some());
    }

    #[test]
    fn ttl_expiry_is_exact_at_the_boundary() {
        let (mut cache, time) = cache_with_clock(10, 5);
        cache.put("k", ok_result("k"));

        time.store(5_000, Ordering::SeqCst);
        assert!(cache.get("k").is_some(), "exactly at ttl boundary should still hit");

        time.store(5_001, Ordering::SeqCst);
        assert!(cache.get("k").is_none(), "past ttl boundary should miss");
    }

    #[test]
    fn put_overwrites_and_promotes_existing_key() {
        let (mut cache, _time) = cache_with_clock(2, 3600);
        cache.put("x", ok_result("x-old"));
        cache.put("y", ok_result("y"));
        cache.put("x", ok_result("x-new"));
        cache.put("z", ok_result("z")); // should evict y, not x

        assert!(cache.get("y").is_none());
        let x = cache.get("x").unwrap();
        assert_eq!(x.resolved_url.as_deref(), Some("x-new"));
    }

    #[test]
    fn failures_and_timeouts_are_cached_too() {
        let (mut cache, _time) = cache_with_clock(10, 3600);
        let failed = ResolutionResult {
            status: ResolutionStatus::Failed,
            resolved_url: None,
            search_query: "zzz".into(),
            candidates_found: 0,
            selected_reason: None,
            elapsed_ms: 5,
            error_message: Some("no match".into()),
            from_cache: false,
        };
        cache.put("zzz", failed);
        assert_eq!(cache.get("zzz").unwrap().status, ResolutionStatus::Failed);
    }
}
