//! Blog posts built from short notes (kind 1) and long-form articles (kind 30023).
//!
//! Articles carry their metadata in tags (see [`crate::nip23`]). Short notes
//! have none, so a title is guessed from the first line of the note, or
//! synthesized from its opening characters.

use crate::nip01::{Event, KIND_LONG_FORM_CONTENT, KIND_SHORT_TEXT_NOTE};
use crate::nip23::ArticleMetadata;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::LazyLock;

/// Length of a synthesized title, in characters, before the ellipsis.
pub const SYNTHESIZED_TITLE_CHARS: usize = 50;

const ELLIPSIS: &str = "…";

/// `#` followed by a run of word characters.
static HASHTAG_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#(\w+)").expect("hashtag regex should compile"));

/// Kind of content a post was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostKind {
    ShortNote,
    LongForm,
}

impl PostKind {
    pub fn from_kind(kind: u16) -> Option<Self> {
        match kind {
            KIND_SHORT_TEXT_NOTE => Some(Self::ShortNote),
            KIND_LONG_FORM_CONTENT => Some(Self::LongForm),
            _ => None,
        }
    }

    pub fn as_kind(self) -> u16 {
        match self {
            Self::ShortNote => KIND_SHORT_TEXT_NOTE,
            Self::LongForm => KIND_LONG_FORM_CONTENT,
        }
    }
}

/// A normalized post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    /// Id of the event this post was built from
    pub id: String,
    /// Hex public key of the author
    pub author: String,
    pub kind: PostKind,
    pub title: Option<String>,
    pub summary: Option<String>,
    /// Cover image URL
    pub image: Option<String>,
    /// Body text
    pub content: String,
    pub created_at: u64,
    /// Declared publication time (long-form only)
    pub published_at: Option<u64>,
    /// Stable `d` tag (long-form only)
    pub slug: Option<String>,
    /// Deduplicated, case preserved
    pub hashtags: Vec<String>,
}

impl Post {
    /// Normalize an event into a post.
    ///
    /// Returns `None` for kinds other than short notes and long-form articles,
    /// and for events whose content is blank. Article bodies are kept verbatim;
    /// note bodies are trimmed.
    pub fn from_event(event: &Event) -> Option<Self> {
        let kind = PostKind::from_kind(event.kind)?;
        let content = event.content.trim();
        if content.is_empty() {
            return None;
        }

        let mut post = Post {
            id: event.id.clone(),
            author: event.pubkey.clone(),
            kind,
            title: None,
            summary: None,
            image: None,
            content: content.to_string(),
            created_at: event.created_at,
            published_at: None,
            slug: None,
            hashtags: collect_hashtags(event, content),
        };

        match kind {
            PostKind::LongForm => {
                let meta = ArticleMetadata::from_event(event);
                post.content = event.content.clone();
                post.title = meta.title;
                post.summary = meta.summary;
                post.image = meta.image;
                post.published_at = meta.published_at;
                post.slug = meta.slug;
            }
            PostKind::ShortNote => {
                let (title, body) = split_note_title(content);
                post.title = title;
                post.content = body;
            }
        }

        Some(post)
    }

    /// Timestamp used to order posts: declared publication time, else creation time.
    pub fn sort_timestamp(&self) -> u64 {
        self.published_at.unwrap_or(self.created_at)
    }
}

/// Sort posts newest first, ties broken by id.
pub fn sort_posts(posts: &mut [Post]) {
    posts.sort_by(|a, b| {
        b.sort_timestamp()
            .cmp(&a.sort_timestamp())
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Guess a title for a short note.
///
/// A first line of 6..=99 characters becomes the title when more lines follow
/// and it reads like a heading: no period, or trailing off with an ellipsis.
/// Otherwise a note longer than 50 characters gets its opening as a title and
/// keeps its body intact.
pub fn split_note_title(content: &str) -> (Option<String>, String) {
    let lines: Vec<&str> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    if let [first, rest @ ..] = lines.as_slice()
        && !rest.is_empty()
        && looks_like_heading(first)
    {
        return (Some(first.to_string()), rest.join("\n"));
    }

    if content.chars().count() > SYNTHESIZED_TITLE_CHARS {
        let opening: String = content.chars().take(SYNTHESIZED_TITLE_CHARS).collect();
        return (Some(format!("{opening}{ELLIPSIS}")), content.to_string());
    }

    (None, content.to_string())
}

fn looks_like_heading(line: &str) -> bool {
    let len = line.chars().count();
    let trails_off = line.ends_with("...") || line.ends_with(ELLIPSIS);
    len > 5 && len < 100 && (!line.contains('.') || trails_off)
}

/// `#word` tokens from the body followed by `t` tags, first occurrence kept.
fn collect_hashtags(event: &Event, content: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    extract_hashtags(content)
        .chain(event.tag_values("t"))
        .filter(|tag| !tag.is_empty())
        .filter(|tag| seen.insert(*tag))
        .map(str::to_string)
        .collect()
}

/// Iterate over `#word` tokens in text, without the leading `#`.
///
/// A word is a run of Unicode word characters (letters, digits, underscores).
pub fn extract_hashtags(content: &str) -> impl Iterator<Item = &str> {
    HASHTAG_REGEX
        .captures_iter(content)
        .filter_map(|captures| captures.get(1))
        .map(|word| word.as_str())
}
