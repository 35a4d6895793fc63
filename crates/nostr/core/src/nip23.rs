//! NIP-23: Long-form Content
//!
//! Articles are kind 30023 events whose metadata lives in tags:
//! `title`, `image`, `summary`, `published_at` and the `d` identifier that
//! makes the article addressable. Content is markdown and is passed through
//! untouched.

use crate::nip01::Event;

/// Metadata read from a long-form article's tags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleMetadata {
    pub title: Option<String>,
    pub image: Option<String>,
    pub summary: Option<String>,
    /// Unix timestamp of first publication, if it parsed as an integer
    pub published_at: Option<u64>,
    /// The `d` tag
    pub slug: Option<String>,
}

impl ArticleMetadata {
    /// Scan the tag list once. The first tag of each name wins; repeats are
    /// ignored even when the first one was unusable.
    pub fn from_event(event: &Event) -> Self {
        let mut meta = Self::default();
        let mut seen_published_at = false;

        for tag in &event.tags {
            let (Some(name), Some(value)) = (tag.first(), tag.get(1)) else {
                continue;
            };
            let slot = match name.as_str() {
                "title" => &mut meta.title,
                "image" => &mut meta.image,
                "summary" => &mut meta.summary,
                "d" => &mut meta.slug,
                "published_at" => {
                    if !seen_published_at {
                        seen_published_at = true;
                        meta.published_at = value.trim().parse().ok();
                    }
                    continue;
                }
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.clone());
            }
        }

        meta
    }
}
