use std::collections::HashMap;
use std::sync::Mutex;

use fieldsignal_common::{Clock, SearchResult};

const TTL_SECONDS: i64 = 24 * 60 * 60;

/// 24h-TTL cache keyed by `(normalised_query, engine)`.
/// Concurrent readers, single writer per key — a plain mutex-guarded map is
/// sufficient/// acceptable").
pub struct SearchCache {
    entries: Mutex<HashMap<(String, String), CacheEntry>>,
}

struct CacheEntry {
    results: Vec<SearchResult>,
    inserted_at_unix: i64,
}

impl Default for SearchCache {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, query: &str, engine: &str, entity_name: &str, clock: &dyn Clock) -> Option<Vec<SearchResult>> {
        let key = (normalise_query(query, entity_name), engine.to_string());
        let entries = self.entries.lock().expect("search cache mutex poisoned");
        let entry = entries.get(&key)?;
        let now = clock.now().timestamp();
        if now - entry.inserted_at_unix > TTL_SECONDS {
            return None;
        }
        Some(entry.results.clone())
    }

    pub fn put(&self, query: &str, engine: &str, entity_name: &str, results: Vec<SearchResult>, clock: &dyn Clock) {
        let key = (normalise_query(query, entity_name), engine.to_string());
        let mut entries = self.entries.lock().expect("search cache mutex poisoned");
        entries.insert(
            key,
            CacheEntry {
                results,
                inserted_at_unix: clock.now().timestamp(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("search cache mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Strip casing, punctuation, and the entity name so semantically
/// equivalent queries hit the same cache key.
fn normalise_query(query: &str, entity_name: &str) -> String {
    let lowered = query.to_lowercase();
    let entity_lower = entity_name.to_lowercase();
    let without_entity = if entity_lower.is_empty() {
        lowered
    } else {
        lowered.replace(&entity_lower, "")
    };
    let cleaned: String = without_entity
        .chars()
        .map(|c| if c.is_alphanumeric() || c.is_whitespace() { c } else { ' ' })
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use fieldsignal_common::clock::FixedClock;

    fn result(url: &str) -> SearchResult {
        SearchResult {
            url: url.to_string(),
            title: "t".to_string(),
            snippet: "s".to_string(),
            rank: 1,
        }
    }

    #[test]
    fn semantically_equivalent_queries_hit_same_cache_key() {
        let cache = SearchCache::new();
        let clock = FixedClock::new(Utc::now());
        cache.put("Arsenal FC: procurement tender!", "google", "Arsenal FC", vec![result("https://a.example")], &clock);

        let hit = cache.get("arsenal fc procurement tender", "google", "Arsenal FC", &clock);
        assert!(hit.is_some());
    }

    #[test]
    fn expired_entries_are_not_returned() {
        let cache = SearchCache::new();
        let clock = FixedClock::new(Utc::now());
        cache.put("procurement tender", "google", "", vec![result("https://a.example")], &clock);
        clock.advance(24.0 * 60.0 * 60.0 + 1.0);
        assert!(cache.get("procurement tender", "google", "", &clock).is_none());
    }

    #[test]
    fn different_engine_is_a_cache_miss() {
        let cache = SearchCache::new();
        let clock = FixedClock::new(Utc::now());
        cache.put("procurement tender", "google", "", vec![result("https://a.example")], &clock);
        assert!(cache.get("procurement tender", "bing", "", &clock).is_none());
    }
}
