//! Profile metadata (kind 0).
//!
//! The event content is a JSON object with optional fields. Relays keep only
//! the newest metadata event per author, but when several relays disagree the
//! client picks the newest one itself.

use crate::nip01::{Event, KIND_METADATA};
use serde::{Deserialize, Serialize};

/// A normalized identity record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Legacy short name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(
        default,
        alias = "displayName",
        skip_serializing_if = "Option::is_none"
    )]
    pub display_name: Option<String>,
    /// Biography
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub about: Option<String>,
    /// Avatar URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub banner: Option<String>,
    /// NIP-05 identifier (`name@domain`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nip05: Option<String>,
    /// Lightning address for payments
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lud16: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
}

impl Profile {
    /// Parse the content of a metadata event.
    ///
    /// Returns `None` for other kinds and for content that is not a JSON
    /// object. Fields of the wrong type are dropped instead of failing the
    /// whole profile.
    pub fn from_event(event: &Event) -> Option<Self> {
        if event.kind != KIND_METADATA {
            return None;
        }
        Self::from_content(&event.content)
    }

    pub fn from_content(content: &str) -> Option<Self> {
        let value: serde_json::Value = serde_json::from_str(content).ok()?;
        let object = value.as_object()?;
        let field = |keys: &[&str]| {
            keys.iter()
                .find_map(|key| object.get(*key).and_then(|v| v.as_str()))
                .map(str::to_string)
        };

        Some(Self {
            name: field(&["name"]),
            display_name: field(&["display_name", "displayName"]),
            about: field(&["about"]),
            picture: field(&["picture"]),
            banner: field(&["banner"]),
            nip05: field(&["nip05"]),
            lud16: field(&["lud16"]),
            website: field(&["website"]),
        })
    }
}

/// Pick the newest metadata event and parse it.
///
/// Ties on `created_at` go to the event seen first. A newest event with
/// malformed content yields `None`; older events are not consulted.
pub fn latest_profile<'a, I>(events: I) -> Option<Profile>
where
    I: IntoIterator<Item = &'a Event>,
{
    let mut newest: Option<&Event> = None;
    for event in events.into_iter().filter(|e| e.kind == KIND_METADATA) {
        if newest.is_none_or(|current| event.created_at > current.created_at) {
            newest = Some(event);
        }
    }
    newest.and_then(Profile::from_event)
}
