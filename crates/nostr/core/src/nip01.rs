//! NIP-01: Basic protocol flow description.
//!
//! This module implements the core Nostr event structure:
//! - Event structure (id, pubkey, created_at, kind, tags, content, sig)
//! - Standard kind constants used by the feed
//! - Tag lookup helpers
//!
//! Signatures are carried but never verified. Events are trusted as delivered
//! by the relay.

use serde::{Deserialize, Serialize};

/// A signed Nostr event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// 32-bytes lowercase hex-encoded sha256 of the serialized event data
    pub id: String,
    /// 32-bytes lowercase hex-encoded public key of the event creator
    pub pubkey: String,
    /// Unix timestamp in seconds
    pub created_at: u64,
    /// Event kind (integer between 0 and 65535)
    pub kind: u16,
    /// Array of arrays of strings (tags)
    #[serde(default)]
    pub tags: Vec<Vec<String>>,
    /// Arbitrary string content
    #[serde(default)]
    pub content: String,
    /// 64-bytes lowercase hex signature
    #[serde(default)]
    pub sig: String,
}

// Standard event kinds
pub const KIND_METADATA: u16 = 0;
pub const KIND_SHORT_TEXT_NOTE: u16 = 1;
pub const KIND_ENCRYPTED_DIRECT_MESSAGE: u16 = 4;
pub const KIND_LONG_FORM_CONTENT: u16 = 30023;

impl Event {
    /// Value of the first tag named `name`, if it carries one.
    pub fn tag_value(&self, name: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|tag| tag.first().map(String::as_str) == Some(name))
            .and_then(|tag| tag.get(1))
            .map(String::as_str)
    }

    /// Values of every tag named `name`, in tag order.
    pub fn tag_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.tags
            .iter()
            .filter(move |tag| tag.first().map(String::as_str) == Some(name))
            .filter_map(|tag| tag.get(1).map(String::as_str))
    }
}
