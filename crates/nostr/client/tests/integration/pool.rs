//! Aggregation across several relays

use super::*;
use nostr_client::{Filter, RelayPool, SessionError, StreamEnd};
use std::collections::HashSet;
use tokio::time::Duration;

fn note_filter() -> Filter {
    Filter::new().author(PUBKEY).kinds(vec![1])
}

#[tokio::test]
async fn test_union_of_live_relays_despite_timeout_and_unreachable() {
    let relay_a = MockRelay::start(RelayScript::complete(vec![
        event("1", 1, 100, "one"),
        event("2", 1, 200, "two"),
    ]))
    .await;
    let relay_b = MockRelay::start(RelayScript::without_eose(vec![
        event("2", 1, 200, "two"),
        event("3", 1, 300, "three"),
    ]))
    .await;
    let relay_c = unreachable_url();

    let pool = RelayPool::new(vec![relay_a.url.clone(), relay_b.url.clone(), relay_c.clone()]);
    let started = Instant::now();
    let aggregation = pool
        .fetch_events_detailed(&note_filter(), Duration::from_millis(500))
        .await;

    let ids: HashSet<&str> = aggregation.events.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, HashSet::from(["1", "2", "3"]));
    assert_eq!(aggregation.events.len(), 3);

    assert_eq!(aggregation.attempted(), 3);
    assert_eq!(aggregation.succeeded(), 2);
    assert_eq!(
        aggregation.outcomes[0].result.as_ref().unwrap().end,
        StreamEnd::Eose
    );
    assert_eq!(
        aggregation.outcomes[1].result.as_ref().unwrap().end,
        StreamEnd::Timeout
    );
    assert_eq!(aggregation.outcomes[2].relay_url, relay_c);
    assert!(matches!(
        aggregation.outcomes[2].result,
        Err(SessionError::Unreachable(_))
    ));

    // Sessions run concurrently: one timeout, not the sum
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_duplicates_keep_first_relay_order() {
    let relay_a = MockRelay::start(RelayScript::complete(vec![
        event("x", 1, 100, "from a"),
        event("y", 1, 200, "from a"),
    ]))
    .await;
    let relay_b = MockRelay::start(RelayScript::complete(vec![
        event("y", 1, 200, "from b"),
        event("z", 1, 300, "from b"),
    ]))
    .await;

    let pool = RelayPool::new(vec![relay_a.url.clone(), relay_b.url.clone()]);
    let events = pool.fetch_events(&note_filter(), Duration::from_secs(5)).await;

    let ids: Vec<&str> = events.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["x", "y", "z"]);
    assert_eq!(events[1].content, "from a");
}

#[tokio::test]
async fn test_all_relays_unreachable_is_empty() {
    let pool = RelayPool::new(vec![unreachable_url(), unreachable_url()]);
    let aggregation = pool
        .fetch_events_detailed(&note_filter(), Duration::from_secs(2))
        .await;

    assert!(aggregation.events.is_empty());
    assert_eq!(aggregation.succeeded(), 0);
    assert_eq!(aggregation.attempted(), 2);
}

#[tokio::test]
async fn test_publish_reports_each_relay() {
    let relay = MockRelay::start(RelayScript::complete(vec![])).await;
    let dead = unreachable_url();

    let pool = RelayPool::new(vec![relay.url.clone(), dead.clone()]);
    let results = pool
        .publish(&event("p", 1, 100, "hello"), Duration::from_secs(2))
        .await;

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].0, relay.url);
    assert!(results[0].1.as_ref().unwrap().accepted);
    assert_eq!(results[1].0, dead);
    assert!(results[1].1.is_err());
}
