//! Expiring response storage.

use std::sync::RwLock;
use std::time::{Duration, Instant};

use bytes::Bytes;
use lru::LruCache;
use metrics::counter;
use tracing::debug;

use crate::infra::telemetry::{
    CACHE_EVICT_TOTAL, CACHE_EXPIRED_TOTAL, CACHE_HIT_TOTAL, CACHE_MISS_TOTAL,
};

use super::config::CacheConfig;
use super::keys::ResponseKey;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

/// A rendered response as it is replayed on a hit.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

struct Entry {
    response: CachedResponse,
    stored_at: Instant,
}

/// LRU-bounded map of responses that each live for `ttl`.
pub struct ResponseStore {
    ttl: Duration,
    responses: RwLock<LruCache<ResponseKey, Entry>>,
}

impl ResponseStore {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            ttl: config.ttl,
            responses: RwLock::new(LruCache::new(config.capacity_non_zero())),
        }
    }

    pub fn get(&self, key: &ResponseKey) -> Option<CachedResponse> {
        self.get_at(key, Instant::now())
    }

    /// Look up `key` as of `now`. An entry older than the window is dropped
    /// and reported as a miss.
    pub fn get_at(&self, key: &ResponseKey, now: Instant) -> Option<CachedResponse> {
        let mut responses = rw_write(&self.responses, SOURCE, "get");
        let fresh = match responses.get(key) {
            Some(entry) if now.saturating_duration_since(entry.stored_at) < self.ttl => {
                Some(entry.response.clone())
            }
            Some(_) => {
                responses.pop(key);
                counter!(CACHE_EXPIRED_TOTAL).increment(1);
                debug!(path = %key.path, "cached response expired");
                None
            }
            None => None,
        };
        drop(responses);

        match fresh {
            Some(response) => {
                counter!(CACHE_HIT_TOTAL).increment(1);
                Some(response)
            }
            None => {
                counter!(CACHE_MISS_TOTAL).increment(1);
                None
            }
        }
    }

    /// Store a response; returns the key pushed out by the capacity bound.
    pub fn set(&self, key: ResponseKey, response: CachedResponse) -> Option<ResponseKey> {
        self.set_at(key, response, Instant::now())
    }

    pub fn set_at(
        &self,
        key: ResponseKey,
        response: CachedResponse,
        now: Instant,
    ) -> Option<ResponseKey> {
        let entry = Entry {
            response,
            stored_at: now,
        };
        let evicted = rw_write(&self.responses, SOURCE, "set")
            .push(key.clone(), entry)
            .map(|(evicted_key, _)| evicted_key)
            .filter(|evicted_key| *evicted_key != key);

        if evicted.is_some() {
            counter!(CACHE_EVICT_TOTAL).increment(1);
        }
        evicted
    }

    pub fn clear(&self) {
        rw_write(&self.responses, SOURCE, "clear").clear();
    }

    pub fn len(&self) -> usize {
        rw_read(&self.responses, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(body: &'static str) -> CachedResponse {
        CachedResponse {
            status: 200,
            headers: vec![("content-type".to_string(), "text/html".to_string())],
            body: Bytes::from_static(body.as_bytes()),
        }
    }

    fn store(ttl_secs: u64, capacity: usize) -> ResponseStore {
        ResponseStore::new(&CacheConfig {
            enabled: true,
            ttl: Duration::from_secs(ttl_secs),
            capacity,
        })
    }

    #[test]
    fn entry_is_served_within_window() {
        let store = store(20, 8);
        let key = ResponseKey::new("/", None, None);
        let start = Instant::now();

        assert!(store.get_at(&key, start).is_none());
        store.set_at(key.clone(), response("first"), start);

        let hit = store
            .get_at(&key, start + Duration::from_secs(19))
            .expect("fresh entry");
        assert_eq!(hit.body, "first");
    }

    #[test]
    fn entry_expires_after_window() {
        let store = store(20, 8);
        let key = ResponseKey::new("/", None, None);
        let start = Instant::now();
        store.set_at(key.clone(), response("first"), start);

        assert!(store.get_at(&key, start + Duration::from_secs(20)).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn capacity_evicts_least_recently_used() {
        let store = store(20, 2);
        let a = ResponseKey::new("/", Some("page=1"), None);
        let b = ResponseKey::new("/", Some("page=2"), None);
        let c = ResponseKey::new("/", Some("page=3"), None);

        assert_eq!(store.set(a.clone(), response("a")), None);
        assert_eq!(store.set(b.clone(), response("b")), None);
        assert!(store.get(&a).is_some());
        assert_eq!(store.set(c, response("c")), Some(b));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn replacing_a_key_is_not_an_eviction() {
        let store = store(20, 1);
        let key = ResponseKey::new("/", None, None);
        store.set(key.clone(), response("one"));
        assert_eq!(store.set(key.clone(), response("two")), None);
        assert_eq!(store.get(&key).map(|hit| hit.body), Some(Bytes::from("two")));
    }

    #[test]
    fn clear_drops_everything() {
        let store = store(20, 8);
        store.set(ResponseKey::new("/", None, None), response("x"));
        store.clear();
        assert!(store.is_empty());
    }
}
