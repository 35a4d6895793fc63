//! Nostr protocol types for the blog feed.
//!
//! This crate provides:
//! - NIP-01: Event structure and the kinds the feed consumes
//! - NIP-19: npub encoding and decoding
//! - NIP-23: Long-form content metadata
//! - Post and profile normalization from raw events
//!
//! Event signatures are not verified. Content is trusted as delivered by
//! relays.
//!
//! # Example
//!
//! ```
//! use nostr::{Event, Post, KIND_SHORT_TEXT_NOTE};
//!
//! let event = Event {
//!     id: "abc".to_string(),
//!     pubkey: "a".repeat(64),
//!     created_at: 1_700_000_000,
//!     kind: KIND_SHORT_TEXT_NOTE,
//!     tags: vec![vec!["t".to_string(), "nostr".to_string()]],
//!     content: "Release notes\nShipped the relay client".to_string(),
//!     sig: String::new(),
//! };
//!
//! let post = Post::from_event(&event).unwrap();
//! assert_eq!(post.title.as_deref(), Some("Release notes"));
//! assert_eq!(post.hashtags, vec!["nostr"]);
//! ```

pub mod nip01;
pub mod nip19;
pub mod nip23;
mod post;
mod profile;

pub use nip01::{
    Event, KIND_ENCRYPTED_DIRECT_MESSAGE, KIND_LONG_FORM_CONTENT, KIND_METADATA,
    KIND_SHORT_TEXT_NOTE,
};
pub use nip19::{NPUB_HRP, Nip19Error, decode_npub, encode_npub, hex_to_npub, npub_to_hex};
pub use nip23::ArticleMetadata;
pub use post::{
    Post, PostKind, SYNTHESIZED_TITLE_CHARS, extract_hashtags, sort_posts, split_note_title,
};
pub use profile::{Profile, latest_profile};

/// Kinds that normalize into posts.
pub const POST_KINDS: [u16; 2] = [KIND_SHORT_TEXT_NOTE, KIND_LONG_FORM_CONTENT];
