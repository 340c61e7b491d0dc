use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
struct CacheEntry {
    body: Arc<CachedBody>,
    created_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn new(body: CachedBody, ttl: Duration) -> Self {
        Self {
            body: Arc::new(body),
            created_at: Instant::now(),
            ttl,
        }
    }

    fn is_expired(&self) -> bool {
        self.created_at.elapsed() > self.ttl
    }
}

/// A serialized response body together with its strong entity tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedBody {
    pub body: Vec<u8>,
    pub etag: String,
}

impl CachedBody {
    pub fn new(body: Vec<u8>) -> Self {
        let etag = etag_for(&body);
        Self { body, etag }
    }

    /// True when an `If-None-Match` header value names this body.
    pub fn matches(&self, if_none_match: &str) -> bool {
        if_none_match.trim() == "*"
            || if_none_match
                .split(',')
                .map(|tag| tag.trim().trim_start_matches("W/"))
                .any(|tag| tag == self.etag)
    }
}

/// Quoted hex SHA-256 of the body.
pub fn etag_for(body: &[u8]) -> String {
    let digest = Sha256::digest(body);
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    format!("\"{hex}\"")
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub invalidations: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    invalidations: AtomicU64,
}

/// TTL cache of lesson read responses, keyed `{serie_id}/lessons` and
/// `{serie_id}/lessons/{lesson_id}`.
#[derive(Clone, Debug)]
pub struct ResponseCache {
    entries: Arc<DashMap<String, CacheEntry>>,
    /// Bumped by every invalidation of a series.
    generations: Arc<DashMap<String, u64>>,
    ttl: Duration,
    max_entries: usize,
    counters: Arc<Counters>,
}

impl ResponseCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            generations: Arc::new(DashMap::new()),
            ttl,
            max_entries: max_entries.max(1),
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn lessons_key(serie_id: &str) -> String {
        format!("{serie_id}/lessons")
    }

    pub fn lesson_key(serie_id: &str, lesson_id: &str) -> String {
        format!("{serie_id}/lessons/{lesson_id}")
    }

    pub fn get(&self, key: &str) -> Option<Arc<CachedBody>> {
        let Some(entry) = self.entries.get(key) else {
            debug!("Response cache miss (not found): {}", key);
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        };
        if entry.is_expired() {
            drop(entry);
            self.entries.remove(key);
            debug!("Response cache miss (expired): {}", key);
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }
        self.counters.hits.fetch_add(1, Ordering::Relaxed);
        Some(entry.body.clone())
    }

    pub fn insert(&self, key: String, body: Vec<u8>) -> Arc<CachedBody> {
        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_entries {
            warn!("Response cache full, evicting oldest entries");
            self.evict_oldest();
        }
        let entry = CacheEntry::new(CachedBody::new(body), self.ttl);
        let body = entry.body.clone();
        self.entries.insert(key, entry);
        body
    }

    /// Current invalidation generation of a series. Read it before loading the
    /// data that goes into [`ResponseCache::insert_if_current`].
    pub fn generation(&self, serie_id: &str) -> u64 {
        self.generations.get(serie_id).map(|g| *g).unwrap_or(0)
    }

    /// Caches `body` only if the series was not invalidated since
    /// `generation` was read. The body is returned either way.
    pub fn insert_if_current(
        &self,
        key: String,
        serie_id: &str,
        generation: u64,
        body: Vec<u8>,
    ) -> Arc<CachedBody> {
        // Holding the generation entry blocks invalidation until the insert is done.
        let current = self.generations.entry(serie_id.to_string()).or_insert(0);
        if *current != generation {
            debug!("Skipping stale cache fill for {}", key);
            return Arc::new(CachedBody::new(body));
        }
        self.insert(key, body)
    }

    /// Drops every entry whose key starts with `prefix`.
    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.starts_with(prefix));
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!("Response cache invalidated {} entries under {}", removed, prefix);
            self.counters
                .invalidations
                .fetch_add(removed as u64, Ordering::Relaxed);
        }
        removed
    }

    /// Everything cached for one series.
    pub fn invalidate_serie(&self, serie_id: &str) -> usize {
        *self.generations.entry(serie_id.to_string()).or_insert(0) += 1;
        self.invalidate_prefix(&format!("{serie_id}/"))
    }

    pub fn cleanup_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired());
        let cleaned = before.saturating_sub(self.entries.len());
        if cleaned > 0 {
            debug!("Cleaned up {} expired cache entries", cleaned);
        }
        cleaned
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            invalidations: self.counters.invalidations.load(Ordering::Relaxed),
        }
    }

    fn evict_oldest(&self) {
        // Drop the oldest tenth.
        let evict_count = (self.max_entries / 10).max(1);
        let mut entries: Vec<(String, Instant)> = self
            .entries
            .iter()
            .map(|e| (e.key().clone(), e.value().created_at))
            .collect();
        entries.sort_by_key(|(_, created)| *created);
        for (key, _) in entries.into_iter().take(evict_count) {
            self.entries.remove(&key);
        }
        self.counters
            .evictions
            .fetch_add(evict_count as u64, Ordering::Relaxed);
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(300), 1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn etag_is_quoted_sha256() {
        let tag = etag_for(b"hello");
        assert_eq!(
            tag,
            "\"2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824\""
        );
        let body = CachedBody::new(b"hello".to_vec());
        assert!(body.matches(&tag));
        assert!(body.matches(&format!("\"other\", W/{tag}")));
        assert!(body.matches("*"));
        assert!(!body.matches("\"other\""));
    }

    #[test]
    fn hit_miss_and_prefix_invalidation() {
        let cache = ResponseCache::default();
        let list = ResponseCache::lessons_key("s1");
        let one = ResponseCache::lesson_key("s1", "l1");
        let other = ResponseCache::lessons_key("s2");

        assert!(cache.get(&list).is_none());
        cache.insert(list.clone(), b"[]".to_vec());
        cache.insert(one.clone(), b"{}".to_vec());
        cache.insert(other.clone(), b"[]".to_vec());
        assert_eq!(cache.get(&list).unwrap().body, b"[]".to_vec());

        assert_eq!(cache.invalidate_serie("s1"), 2);
        assert!(cache.get(&one).is_none());
        assert!(cache.get(&other).is_some());

        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.invalidations, 2);
    }

    #[test]
    fn fill_started_before_invalidation_is_not_cached() {
        let cache = ResponseCache::default();
        let key = ResponseCache::lessons_key("s1");

        let before = cache.generation("s1");
        cache.invalidate_serie("s1");
        let body = cache.insert_if_current(key.clone(), "s1", before, b"[\"old\"]".to_vec());
        assert_eq!(body.body, b"[\"old\"]".to_vec());
        assert!(cache.get(&key).is_none());

        let fresh = cache.generation("s1");
        assert_eq!(fresh, before + 1);
        cache.insert_if_current(key.clone(), "s1", fresh, b"[]".to_vec());
        assert_eq!(cache.get(&key).unwrap().body, b"[]".to_vec());

        // Other series are unaffected.
        let other = ResponseCache::lessons_key("s2");
        cache.insert_if_current(other.clone(), "s2", cache.generation("s2"), b"[]".to_vec());
        assert!(cache.get(&other).is_some());
    }

    #[test]
    fn concurrent_invalidation_never_leaves_a_stale_fill() {
        let cache = ResponseCache::default();
        let key = ResponseCache::lessons_key("s1");
        for round in 0..200u64 {
            let generation = cache.generation("s1");
            let writer = {
                let cache = cache.clone();
                std::thread::spawn(move || cache.invalidate_serie("s1"))
            };
            cache.insert_if_current(key.clone(), "s1", generation, round.to_le_bytes().to_vec());
            writer.join().unwrap();
            assert!(cache.get(&key).is_none(), "stale body survived round {round}");
        }
    }

    #[test]
    fn expired_entries_are_misses() {
        let cache = ResponseCache::new(Duration::from_millis(0), 10);
        cache.insert("s1/lessons".into(), b"[]".to_vec());
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get("s1/lessons").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn full_cache_evicts_oldest() {
        let cache = ResponseCache::new(Duration::from_secs(60), 2);
        cache.insert("a".into(), vec![1]);
        std::thread::sleep(Duration::from_millis(2));
        cache.insert("b".into(), vec![2]);
        cache.insert("c".into(), vec![3]);
        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_none());
        assert_eq!(cache.stats().evictions, 1);
    }
}
