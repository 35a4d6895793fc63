//! End-to-end feed fetches against mock relays

use super::*;
use nostr::{KIND_LONG_FORM_CONTENT, KIND_METADATA, PostKind};
use nostr_client::{ClientError, FeedClient, FeedConfig};
use std::sync::Arc;
use tokio::time::Duration;

fn client_for(relays: Vec<String>) -> FeedClient {
    let config = FeedConfig {
        content_timeout_secs: 2,
        profile_timeout_secs: 2,
        ..FeedConfig::with_relays(relays)
    };
    FeedClient::new(config).unwrap()
}

#[tokio::test]
async fn test_fetch_posts_normalizes_and_sorts() {
    let relay = MockRelay::start(RelayScript::complete(vec![
        event("note", 1, 1_000, "Short Title\nActual body text that continues on."),
        tagged_event(
            "article",
            KIND_LONG_FORM_CONTENT,
            900,
            "World",
            vec![
                vec!["title", "Hello"],
                vec!["image", "https://example.com/cover.png"],
                vec!["d", "hello-world"],
                vec!["published_at", "2000"],
                vec!["t", "nostr"],
            ],
        ),
        event("blank", 1, 3_000, "   \n  "),
        event("meta", KIND_METADATA, 5_000, r#"{"name":"alice"}"#),
    ]))
    .await;

    let client = client_for(vec![relay.url.clone()]);
    let posts = client.fetch_posts(NPUB).await.unwrap();

    let ids: Vec<&str> = posts.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["article", "note"]);

    let article = &posts[0];
    assert_eq!(article.kind, PostKind::LongForm);
    assert_eq!(article.title.as_deref(), Some("Hello"));
    assert_eq!(article.slug.as_deref(), Some("hello-world"));
    assert_eq!(article.hashtags, vec!["nostr".to_string()]);

    let note = &posts[1];
    assert_eq!(note.title.as_deref(), Some("Short Title"));
    assert_eq!(note.content, "Actual body text that continues on.");
}

#[tokio::test]
async fn test_cached_posts_avoid_reconnecting() {
    let relay = MockRelay::start(RelayScript::complete(vec![event("n1", 1, 100, "hello")])).await;
    let client = client_for(vec![relay.url.clone()]);

    let first = client.fetch_posts(NPUB).await.unwrap();
    let second = client.fetch_posts(NPUB).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(relay.connections(), 1);
}

#[tokio::test]
async fn test_concurrent_fetches_share_one_round() {
    let relay = MockRelay::start(RelayScript::complete(vec![event("n1", 1, 100, "hello")])).await;
    let client = Arc::new(client_for(vec![relay.url.clone()]));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.fetch_posts(NPUB).await.unwrap() })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await.unwrap().len(), 1);
    }
    assert_eq!(relay.connections(), 1);
}

#[tokio::test]
async fn test_concurrent_uncached_fetches_share_one_round() {
    init_tracing();
    let relay = MockRelay::start(RelayScript::without_eose(vec![])).await;
    let config = FeedConfig {
        profile_timeout_secs: 1,
        ..FeedConfig::with_relays(vec![relay.url.clone()])
    };
    let client = FeedClient::new(config).unwrap();

    let started = Instant::now();
    let profiles = futures::future::join_all((0..4).map(|_| client.fetch_profile(NPUB))).await;
    let elapsed = started.elapsed();

    for profile in profiles {
        assert_eq!(profile.unwrap(), None);
    }
    assert!(elapsed < Duration::from_millis(1_800), "took {elapsed:?}");
    assert_eq!(relay.connections(), 1);
}

#[tokio::test]
async fn test_invalid_identifier_makes_no_connection() {
    let relay = MockRelay::start(RelayScript::complete(vec![])).await;
    let client = client_for(vec![relay.url.clone()]);

    let result = client.fetch_posts("npub1invalidchecksum").await;
    assert!(matches!(result, Err(ClientError::InvalidIdentifier(_))));

    sleep(Duration::from_millis(100)).await;
    assert_eq!(relay.connections(), 0);
}

#[tokio::test]
async fn test_latest_profile_wins_across_relays() {
    let older = MockRelay::start(RelayScript::complete(vec![event(
        "old",
        KIND_METADATA,
        100,
        r#"{"name":"old name"}"#,
    )]))
    .await;
    let newer = MockRelay::start(RelayScript::complete(vec![event(
        "new",
        KIND_METADATA,
        200,
        r#"{"name":"new name","displayName":"New","picture":"https://example.com/a.png"}"#,
    )]))
    .await;

    let client = client_for(vec![older.url.clone(), newer.url.clone()]);
    let profile = client.fetch_profile(NPUB).await.unwrap().unwrap();

    assert_eq!(profile.name.as_deref(), Some("new name"));
    assert_eq!(profile.display_name.as_deref(), Some("New"));

    // Served from cache the second time
    let again = client.fetch_profile(NPUB).await.unwrap();
    assert_eq!(again, Some(profile));
    assert_eq!(newer.connections(), 1);
}

#[tokio::test]
async fn test_missing_profile_is_refetched() {
    let relay = MockRelay::start(RelayScript::complete(vec![])).await;
    let client = client_for(vec![relay.url.clone()]);

    assert_eq!(client.fetch_profile(NPUB).await.unwrap(), None);
    assert_eq!(client.fetch_profile(NPUB).await.unwrap(), None);
    assert_eq!(relay.connections(), 2);
}

#[tokio::test]
async fn test_no_live_relays_is_empty_and_retried() {
    let client = client_for(vec![unreachable_url()]);

    assert!(client.fetch_posts(NPUB).await.unwrap().is_empty());
    assert!(client.fetch_posts(NPUB).await.unwrap().is_empty());
}
