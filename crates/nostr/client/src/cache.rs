//! Time-bounded result cache for feed queries.
//!
//! Entries are stored as JSON alongside the time they were written. A read
//! either returns a fresh, decodable value or nothing; stale and corrupt
//! entries are removed on the way out.

use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// Source of the current time, in seconds since the Unix epoch.
pub trait Clock: Send + Sync {
    fn now(&self) -> u64;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// A serialized value and when it was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub stored_at: u64,
    pub payload: String,
}

/// Backing storage for [`ResultCache`].
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> Option<CacheEntry>;
    fn insert(&self, key: String, entry: CacheEntry);
    fn remove(&self, key: &str);
    fn clear(&self);
}

/// Default bound on the number of entries an in-process store holds.
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// In-process store with oldest-write eviction once `max_entries` is reached.
#[derive(Debug)]
pub struct MemoryStore {
    max_entries: usize,
    inner: Mutex<MemoryStoreInner>,
}

#[derive(Debug, Default)]
struct MemoryStoreInner {
    entries: HashMap<String, CacheEntry>,
    /// Keys in write order, oldest first
    order: VecDeque<String>,
}

impl MemoryStoreInner {
    fn forget(&mut self, key: &str) {
        if self.entries.remove(key).is_some() {
            self.order.retain(|k| k != key);
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_MAX_ENTRIES)
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store holding at most `max_entries` entries (at least one).
    pub fn with_capacity(max_entries: usize) -> Self {
        Self {
            max_entries: max_entries.max(1),
            inner: Mutex::new(MemoryStoreInner::default()),
        }
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }
}

impl CacheStore for MemoryStore {
    fn get(&self, key: &str) -> Option<CacheEntry> {
        self.inner.lock().entries.get(key).cloned()
    }

    fn insert(&self, key: String, entry: CacheEntry) {
        let mut inner = self.inner.lock();
        inner.forget(&key);

        while inner.entries.len() >= self.max_entries {
            let Some(oldest) = inner.order.pop_front() else {
                break;
            };
            debug!("Evicting cache entry {}", oldest);
            inner.entries.remove(&oldest);
        }

        inner.order.push_back(key.clone());
        inner.entries.insert(key, entry);
    }

    fn remove(&self, key: &str) {
        self.inner.lock().forget(key);
    }

    fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.order.clear();
    }
}

/// Which query produced a cached value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    Posts,
    Profile,
}

impl QueryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKind::Posts => "posts",
            QueryKind::Profile => "profile",
        }
    }
}

/// Cache key: query kind plus the caller's identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub kind: QueryKind,
    pub identifier: String,
}

impl CacheKey {
    pub fn new(kind: QueryKind, identifier: impl Into<String>) -> Self {
        Self {
            kind,
            identifier: identifier.into(),
        }
    }

    pub fn posts(identifier: impl Into<String>) -> Self {
        Self::new(QueryKind::Posts, identifier)
    }

    pub fn profile(identifier: impl Into<String>) -> Self {
        Self::new(QueryKind::Profile, identifier)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.identifier)
    }
}

/// Freshness window per query kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtls {
    pub posts: Duration,
    pub profile: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            posts: Duration::from_secs(300),
            profile: Duration::from_secs(3600),
        }
    }
}

impl CacheTtls {
    pub fn for_kind(&self, kind: QueryKind) -> Duration {
        match kind {
            QueryKind::Posts => self.posts,
            QueryKind::Profile => self.profile,
        }
    }
}

/// Shared result cache. Clones refer to the same entries.
#[derive(Clone)]
pub struct ResultCache {
    store: Arc<dyn CacheStore>,
    clock: Arc<dyn Clock>,
    ttls: CacheTtls,
}

impl fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultCache")
            .field("ttls", &self.ttls)
            .finish_non_exhaustive()
    }
}

impl ResultCache {
    pub fn new(store: Arc<dyn CacheStore>, clock: Arc<dyn Clock>, ttls: CacheTtls) -> Self {
        Self { store, clock, ttls }
    }

    /// Memory-backed cache on the system clock.
    pub fn in_memory(ttls: CacheTtls, max_entries: usize) -> Self {
        Self::new(
            Arc::new(MemoryStore::with_capacity(max_entries)),
            Arc::new(SystemClock),
            ttls,
        )
    }

    pub fn ttls(&self) -> CacheTtls {
        self.ttls
    }

    /// Return the cached value if it is still fresh and decodes as `T`.
    pub fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let rendered = key.to_string();
        let entry = self.store.get(&rendered)?;

        let age = self.clock.now().saturating_sub(entry.stored_at);
        if age >= self.ttls.for_kind(key.kind).as_secs() {
            debug!("Cache entry {} expired after {}s", rendered, age);
            self.store.remove(&rendered);
            return None;
        }

        match serde_json::from_str(&entry.payload) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Dropping unreadable cache entry {}: {}", rendered, e);
                self.store.remove(&rendered);
                None
            }
        }
    }

    /// Store `value` under `key`, stamped with the current time.
    pub fn put<T: Serialize>(&self, key: &CacheKey, value: &T) {
        match serde_json::to_string(value) {
            Ok(payload) => self.store.insert(
                key.to_string(),
                CacheEntry {
                    stored_at: self.clock.now(),
                    payload,
                },
            ),
            Err(e) => warn!("Not caching {}: {}", key, e),
        }
    }

    pub fn invalidate(&self, key: &CacheKey) {
        self.store.remove(&key.to_string());
    }

    pub fn clear(&self) {
        self.store.clear();
    }
}
