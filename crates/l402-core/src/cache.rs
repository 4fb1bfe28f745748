//! Bounded, expiring cache of paid credentials.
//!
//! Credentials are keyed by origin and resource group, where the resource group is the first
//! two path segments: a credential bought for `/api/v1/users` is reused for `/api/v1/orders`.

use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
    time::Duration,
};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::{
    challenge::authorization_value,
    clock::{Clock, SystemClock},
};

pub const DEFAULT_CAPACITY: usize = 256;
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

/// Cache sizing and expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of credentials kept; least recently used ones are evicted first.
    pub capacity: usize,
    /// Lifetime applied when a credential is stored without an explicit expiry.
    /// `None` keeps such credentials until they are evicted.
    pub default_ttl: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            capacity: DEFAULT_CAPACITY,
            default_ttl: Some(DEFAULT_TTL),
        }
    }
}

/// Identifies the resource group a credential is valid for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub origin: String,
    pub resource: String,
}

impl CacheKey {
    pub fn new(origin: &str, path: &str) -> Self {
        CacheKey {
            origin: origin.to_ascii_lowercase(),
            resource: resource_group(path),
        }
    }
}

/// Up to the first two non-empty path segments; `/` when there are none.
fn resource_group(path: &str) -> String {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let mut segments = path.split('/').filter(|s| !s.is_empty());
    match (segments.next(), segments.next()) {
        (Some(first), Some(second)) => format!("/{first}/{second}"),
        (Some(first), None) => format!("/{first}"),
        _ => "/".to_string(),
    }
}

/// A paid credential: the challenge's credential id and the proof of payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub credential_id: String,
    pub proof: String,
    pub created_at_ms: u64,
    pub expires_at_ms: Option<u64>,
}

impl Credential {
    pub fn is_expired(&self, now_ms: u64) -> bool {
        self.expires_at_ms.is_some_and(|at| now_ms > at)
    }

    /// Value for the `Authorization` header.
    pub fn authorization_value(&self) -> String {
        authorization_value(&self.credential_id, &self.proof)
    }
}

struct Slot {
    credential: Credential,
    tick: u64,
}

#[derive(Default)]
struct Entries {
    slots: HashMap<CacheKey, Slot>,
    // Access order, oldest first. A record is live only while its tick matches the slot's.
    recency: VecDeque<(u64, CacheKey)>,
    next_tick: u64,
}

impl Entries {
    fn touch(&mut self, key: &CacheKey) {
        let tick = self.next_tick;
        self.next_tick += 1;
        if let Some(slot) = self.slots.get_mut(key) {
            slot.tick = tick;
            self.recency.push_back((tick, key.clone()));
        }
        if self.recency.len() > 2 * self.slots.len() + 16 {
            let slots = &self.slots;
            self.recency
                .retain(|(tick, key)| slots.get(key).is_some_and(|s| s.tick == *tick));
        }
    }

    fn evict_oldest(&mut self) -> Option<CacheKey> {
        while let Some((tick, key)) = self.recency.pop_front() {
            if self.slots.get(&key).is_some_and(|s| s.tick == tick) {
                self.slots.remove(&key);
                return Some(key);
            }
        }
        None
    }
}

/// LRU cache of credentials with per-entry expiry.
pub struct CredentialCache {
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    entries: Mutex<Entries>,
}

impl std::fmt::Debug for CredentialCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialCache")
            .field("config", &self.config)
            .field("len", &self.len())
            .finish()
    }
}

impl Default for CredentialCache {
    fn default() -> Self {
        CredentialCache::new(CacheConfig::default())
    }
}

impl CredentialCache {
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        CredentialCache {
            config,
            clock,
            entries: Mutex::new(Entries::default()),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Look up the credential for a resource, dropping it if it has expired.
    pub fn get(&self, origin: &str, path: &str) -> Option<Credential> {
        let key = CacheKey::new(origin, path);
        let now = self.clock.now_ms();
        let mut entries = self.entries.lock();

        let expired = entries.slots.get(&key)?.credential.is_expired(now);
        if expired {
            entries.slots.remove(&key);
            return None;
        }

        entries.touch(&key);
        entries.slots.get(&key).map(|slot| slot.credential.clone())
    }

    /// Store a credential, evicting least recently used entries beyond capacity.
    pub fn put(
        &self,
        origin: &str,
        path: &str,
        credential_id: impl Into<String>,
        proof: impl Into<String>,
        expires_at_ms: Option<u64>,
    ) -> Credential {
        let now = self.clock.now_ms();
        let expires_at_ms = expires_at_ms.or_else(|| {
            self.config
                .default_ttl
                .map(|ttl| now.saturating_add(ttl.as_millis() as u64))
        });
        let credential = Credential {
            credential_id: credential_id.into(),
            proof: proof.into(),
            created_at_ms: now,
            expires_at_ms,
        };

        let key = CacheKey::new(origin, path);
        let mut entries = self.entries.lock();
        entries.slots.insert(
            key.clone(),
            Slot {
                credential: credential.clone(),
                tick: 0,
            },
        );
        entries.touch(&key);

        while entries.slots.len() > self.config.capacity {
            let Some(_evicted) = entries.evict_oldest() else {
                break;
            };

            #[cfg(feature = "tracing")]
            tracing::debug!(
                "Evicted L402 credential: origin='{}', resource='{}'",
                _evicted.origin,
                _evicted.resource
            );
        }

        credential
    }

    /// Forget the credential for a resource, if any.
    pub fn remove(&self, origin: &str, path: &str) -> Option<Credential> {
        let key = CacheKey::new(origin, path);
        self.entries
            .lock()
            .slots
            .remove(&key)
            .map(|slot| slot.credential)
    }

    pub fn clear(&self) {
        let mut entries = self.entries.lock();
        entries.slots.clear();
        entries.recency.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use crate::clock::ManualClock;

    use super::*;

    const ORIGIN: &str = "https://api.example.com";
    const START: u64 = 1_700_000_000_000;

    fn cache(config: CacheConfig) -> (CredentialCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(START));
        (CredentialCache::with_clock(config, clock.clone()), clock)
    }

    #[test]
    fn test_resource_group() {
        assert_eq!(resource_group("/api/v1/users/42"), "/api/v1");
        assert_eq!(resource_group("/api/v1"), "/api/v1");
        assert_eq!(resource_group("/api"), "/api");
        assert_eq!(resource_group("/api/"), "/api");
        assert_eq!(resource_group("//api//v1/"), "/api/v1");
        assert_eq!(resource_group("//"), "/");
        assert_eq!(resource_group("/"), "/");
        assert_eq!(resource_group(""), "/");
        assert_eq!(resource_group("/api/v1/users?page=2"), "/api/v1");
    }

    #[test]
    fn test_trailing_slash_shares_credential() {
        let (cache, _) = cache(CacheConfig::default());
        let stored = cache.put(ORIGIN, "/api", "mac", "preimage", None);
        assert_eq!(cache.get(ORIGIN, "/api/"), Some(stored));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_key_normalizes_origin_case() {
        assert_eq!(
            CacheKey::new("HTTPS://API.Example.COM", "/a/b/c"),
            CacheKey::new(ORIGIN, "/a/b/d")
        );
    }

    #[test]
    fn test_sibling_paths_share_credential() {
        let (cache, _) = cache(CacheConfig::default());
        let stored = cache.put(ORIGIN, "/api/v1/users", "mac", "preimage", None);

        assert_eq!(cache.get(ORIGIN, "/api/v1/orders"), Some(stored.clone()));
        assert_eq!(cache.get("HTTPS://API.EXAMPLE.COM", "/api/v1"), Some(stored));
        assert_eq!(cache.get(ORIGIN, "/api/v2/users"), None);
        assert_eq!(cache.get("https://other.example.com", "/api/v1/users"), None);
    }

    #[test]
    fn test_default_ttl_expiry() {
        let (cache, clock) = cache(CacheConfig::default());
        let stored = cache.put(ORIGIN, "/api/v1", "mac", "preimage", None);
        assert_eq!(stored.created_at_ms, START);
        assert_eq!(stored.expires_at_ms, Some(START + 3_600_000));

        clock.advance(DEFAULT_TTL);
        assert!(cache.get(ORIGIN, "/api/v1").is_some());

        clock.advance(Duration::from_millis(1));
        assert!(cache.get(ORIGIN, "/api/v1").is_none());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_explicit_expiry_and_no_ttl() {
        let (cache, clock) = cache(CacheConfig {
            default_ttl: None,
            ..CacheConfig::default()
        });
        cache.put(ORIGIN, "/short/lived", "mac", "p", Some(START + 10));
        cache.put(ORIGIN, "/forever/here", "mac", "p", None);

        clock.advance(Duration::from_secs(365 * 24 * 60 * 60));
        assert!(cache.get(ORIGIN, "/short/lived").is_none());
        let forever = cache.get(ORIGIN, "/forever/here").unwrap();
        assert_eq!(forever.expires_at_ms, None);
    }

    #[test]
    fn test_overwrite_keeps_single_entry() {
        let (cache, _) = cache(CacheConfig::default());
        cache.put(ORIGIN, "/api/v1/a", "mac1", "p1", None);
        cache.put(ORIGIN, "/api/v1/b", "mac2", "p2", None);

        assert_eq!(cache.len(), 1);
        let credential = cache.get(ORIGIN, "/api/v1").unwrap();
        assert_eq!(credential.authorization_value(), "L402 mac2:p2");
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let (cache, _) = cache(CacheConfig {
            capacity: 2,
            ..CacheConfig::default()
        });
        cache.put(ORIGIN, "/a/1", "a", "p", None);
        cache.put(ORIGIN, "/b/1", "b", "p", None);

        // Reading `a` makes `b` the least recently used entry.
        assert!(cache.get(ORIGIN, "/a/1").is_some());
        cache.put(ORIGIN, "/c/1", "c", "p", None);

        assert_eq!(cache.len(), 2);
        assert!(cache.get(ORIGIN, "/a/1").is_some());
        assert!(cache.get(ORIGIN, "/b/1").is_none());
        assert!(cache.get(ORIGIN, "/c/1").is_some());
    }

    #[test]
    fn test_evicts_oldest_insert_without_reads() {
        let (cache, _) = cache(CacheConfig {
            capacity: 3,
            ..CacheConfig::default()
        });
        for name in ["a", "b", "c", "d"] {
            cache.put(ORIGIN, &format!("/{name}/x"), name, "p", None);
        }
        assert!(cache.get(ORIGIN, "/a/x").is_none());
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_many_reads_stay_bounded() {
        let (cache, _) = cache(CacheConfig {
            capacity: 4,
            ..CacheConfig::default()
        });
        for i in 0..4 {
            cache.put(ORIGIN, &format!("/r/{i}"), "mac", "p", None);
        }
        for _ in 0..1_000 {
            for i in 0..4 {
                assert!(cache.get(ORIGIN, &format!("/r/{i}")).is_some());
            }
        }
        assert!(cache.entries.lock().recency.len() <= 2 * 4 + 16);

        cache.put(ORIGIN, "/r/new", "mac", "p", None);
        assert!(cache.get(ORIGIN, "/r/0").is_none());
        assert!(cache.get(ORIGIN, "/r/3").is_some());
    }

    #[test]
    fn test_remove_and_clear() {
        let (cache, _) = cache(CacheConfig::default());
        cache.put(ORIGIN, "/a/b", "mac", "p", None);
        cache.put(ORIGIN, "/c/d", "mac", "p", None);

        assert!(cache.remove(ORIGIN, "/a/b/c").is_some());
        assert!(cache.get(ORIGIN, "/a/b").is_none());
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }
}
