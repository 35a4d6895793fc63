//! Nostr relay client for reading an author's blog feed.
//!
//! This crate provides:
//! - One-shot relay sessions (NIP-01 `REQ` until `EOSE` or timeout)
//! - A relay pool that queries every relay concurrently and merges results
//! - A TTL result cache with injectable clock and storage
//! - [`FeedClient`], which ties these together behind `fetch_posts` and
//!   `fetch_profile`
//!
//! Relay failures degrade results rather than failing calls: an unreachable
//! relay contributes no events, and if every relay is down the fetch returns
//! an empty list.
//!
//! # Example
//!
//! ```rust,no_run
//! use nostr_client::{FeedClient, FeedConfig};
//!
//! #[tokio::main]
//! async fn main() -> nostr_client::Result<()> {
//!     let client = FeedClient::new(FeedConfig::default())?;
//!     let npub = "npub1zutzeysacnf9rru6zqwmxd54mud0k44tst6l70ja5mhv8jjumytsd2x7nu";
//!
//!     if let Some(profile) = client.fetch_profile(npub).await? {
//!         println!("{}", profile.name.unwrap_or_default());
//!     }
//!     for post in client.fetch_posts(npub).await? {
//!         println!("{} {}", post.created_at, post.title.unwrap_or_default());
//!     }
//!     Ok(())
//! }
//! ```

mod cache;
mod config;
mod error;
mod feed;
mod message;
mod pool;
mod session;
mod subscription;

pub use cache::{
    CacheEntry, CacheKey, CacheStore, CacheTtls, Clock, DEFAULT_MAX_ENTRIES, MemoryStore,
    QueryKind, ResultCache, SystemClock,
};
pub use config::{ConfigError, FeedConfig, load_config, load_config_or_default};
pub use error::{ClientError, Result};
pub use feed::FeedClient;
pub use message::{ClientMessage, Filter, MessageError, RelayMessage};
pub use pool::{Aggregation, RelayOutcome, RelayPool, SessionSummary};
pub use session::{
    CLOSE_GRACE, CONTENT_QUERY_TIMEOUT, PROFILE_QUERY_TIMEOUT, PublishConfirmation, RelaySession,
    SessionError, SessionReport, StreamEnd, drain_pending_closes, parse_relay_url,
};
pub use subscription::generate_subscription_id;

/// Relays queried when no configuration is given.
pub const DEFAULT_RELAYS: &[&str] = &[
    "wss://relay.damus.io",
    "wss://nos.lol",
    "wss://relay.nostr.band",
    "wss://relay.primal.net",
];

/// Create a relay pool over [`DEFAULT_RELAYS`].
pub fn default_pool() -> RelayPool {
    RelayPool::new(DEFAULT_RELAYS.iter().map(|s| s.to_string()).collect())
}
