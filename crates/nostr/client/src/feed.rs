//! Feed client: an author's posts and profile, aggregated across relays.

use crate::cache::{CacheKey, CacheTtls, ResultCache};
use crate::config::FeedConfig;
use crate::error::Result;
use crate::message::Filter;
use crate::pool::RelayPool;
use nostr::{KIND_METADATA, POST_KINDS, Post, Profile, latest_profile, npub_to_hex, sort_posts};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Fetches posts and profiles, consulting the cache first.
///
/// Concurrent fetches for the same key share one network round: the first
/// caller queries the relays and every caller waiting on that key receives
/// its result, whether or not the result was cached.
pub struct FeedClient {
    config: FeedConfig,
    pool: RelayPool,
    cache: ResultCache,
    posts_inflight: Inflight<Vec<Post>>,
    profile_inflight: Inflight<Option<Profile>>,
}

impl FeedClient {
    /// Client with a bounded in-memory cache using the configured TTLs.
    pub fn new(config: FeedConfig) -> Result<Self> {
        let ttls = CacheTtls {
            posts: config.posts_ttl(),
            profile: config.profile_ttl(),
        };
        let cache = ResultCache::in_memory(ttls, config.cache_max_entries);
        Self::with_cache(config, cache)
    }

    /// Client sharing an existing cache.
    pub fn with_cache(config: FeedConfig, cache: ResultCache) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            pool: RelayPool::new(config.relays.clone()),
            config,
            cache,
            posts_inflight: Inflight::default(),
            profile_inflight: Inflight::default(),
        })
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    pub fn pool(&self) -> &RelayPool {
        &self.pool
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    /// Posts by the author of `identifier` (an npub), newest first.
    ///
    /// Relay failures yield fewer (possibly zero) posts, never an error. An
    /// empty list is only cached if at least one relay answered.
    pub async fn fetch_posts(&self, identifier: &str) -> Result<Vec<Post>> {
        let key = CacheKey::posts(identifier);
        if let Some(posts) = self.cache.get::<Vec<Post>>(&key) {
            debug!("Cache hit for {}", key);
            return Ok(posts);
        }

        let pubkey = npub_to_hex(identifier)?;
        let posts = self
            .posts_inflight
            .run(&key, || self.load_posts(&key, identifier, pubkey))
            .await;
        Ok(posts)
    }

    /// Most recent profile metadata for `identifier` (an npub).
    ///
    /// `None` when no relay has a decodable profile. Absence is not cached.
    pub async fn fetch_profile(&self, identifier: &str) -> Result<Option<Profile>> {
        let key = CacheKey::profile(identifier);
        if let Some(profile) = self.cache.get::<Profile>(&key) {
            debug!("Cache hit for {}", key);
            return Ok(Some(profile));
        }

        let pubkey = npub_to_hex(identifier)?;
        let profile = self
            .profile_inflight
            .run(&key, || self.load_profile(&key, identifier, pubkey))
            .await;
        Ok(profile)
    }

    async fn load_posts(&self, key: &CacheKey, identifier: &str, pubkey: String) -> Vec<Post> {
        // A flight that finished just before this one started may have filled it
        if let Some(posts) = self.cache.get::<Vec<Post>>(key) {
            debug!("Cache filled by concurrent fetch for {}", key);
            return posts;
        }

        let filter = Filter::new()
            .author(pubkey)
            .kinds(POST_KINDS.to_vec())
            .limit(u64::from(self.config.post_limit));
        let aggregation = self
            .pool
            .fetch_events_detailed(&filter, self.config.content_timeout())
            .await;

        let mut posts: Vec<Post> = aggregation.events.iter().filter_map(Post::from_event).collect();
        sort_posts(&mut posts);

        if aggregation.succeeded() > 0 {
            self.cache.put(key, &posts);
        } else {
            warn!("No relay answered for {}, result not cached", key);
        }

        info!(
            "Fetched {} posts for {} ({} events)",
            posts.len(),
            identifier,
            aggregation.events.len()
        );
        posts
    }

    async fn load_profile(
        &self,
        key: &CacheKey,
        identifier: &str,
        pubkey: String,
    ) -> Option<Profile> {
        if let Some(profile) = self.cache.get::<Profile>(key) {
            debug!("Cache filled by concurrent fetch for {}", key);
            return Some(profile);
        }

        let filter = Filter::new().author(pubkey).kinds(vec![KIND_METADATA]);
        let aggregation = self
            .pool
            .fetch_events_detailed(&filter, self.config.profile_timeout())
            .await;

        let profile = latest_profile(&aggregation.events);
        match &profile {
            Some(profile) => self.cache.put(key, profile),
            None => debug!(
                "No profile for {} ({}/{} relays answered)",
                identifier,
                aggregation.succeeded(),
                aggregation.attempted()
            ),
        }
        profile
    }
}

/// In-flight fetches keyed by cache key.
///
/// The first caller for a key runs the load; callers arriving while it runs
/// await the same cell and clone its value. If the running caller is dropped,
/// the next waiter takes over the load. The entry is removed once a value is
/// out, so a later call starts a fresh round.
struct Inflight<T> {
    cells: Mutex<HashMap<CacheKey, Arc<OnceCell<T>>>>,
}

impl<T> Default for Inflight<T> {
    fn default() -> Self {
        Self {
            cells: Mutex::new(HashMap::new()),
        }
    }
}

impl<T: Clone> Inflight<T> {
    async fn run<F, Fut>(&self, key: &CacheKey, load: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let cell = self.cells.lock().entry(key.clone()).or_default().clone();
        let value = cell.get_or_init(load).await.clone();

        let mut cells = self.cells.lock();
        if cells.get(key).is_some_and(|current| Arc::ptr_eq(current, &cell)) {
            cells.remove(key);
        }
        value
    }

    #[cfg(test)]
    fn is_empty(&self) -> bool {
        self.cells.lock().is_empty()
    }
}
