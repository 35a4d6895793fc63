//! Single relay session behaviour

use super::*;
use futures::StreamExt;
use nostr_client::{
    CLOSE_GRACE, Filter, RelaySession, SessionError, StreamEnd, drain_pending_closes,
};
use tokio::time::Duration;

fn note_filter() -> Filter {
    Filter::new().author(PUBKEY).kinds(vec![1])
}

#[tokio::test]
async fn test_query_collects_until_eose() {
    let relay = MockRelay::start(RelayScript::complete(vec![
        event("e1", 1, 100, "first"),
        event("e2", 1, 200, "second"),
    ]))
    .await;

    let session = RelaySession::new(&relay.url, Duration::from_secs(5));
    let report = session.query(&note_filter()).await.unwrap();

    assert_eq!(report.end, StreamEnd::Eose);
    assert_eq!(report.relay_url, relay.url);
    let ids: Vec<&str> = report.events.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["e1", "e2"]);

    assert!(relay.wait_for_closes(1).await, "subscription was not closed");
    assert_eq!(relay.connections(), 1);
}

#[tokio::test]
async fn test_query_returns_partial_results_on_timeout() {
    let script = RelayScript::without_eose(vec![event("e1", 1, 100, "only")]);
    let relay = MockRelay::start(script).await;

    let session = RelaySession::new(&relay.url, Duration::from_millis(300));
    let started = Instant::now();
    let report = session.query(&note_filter()).await.unwrap();

    assert_eq!(report.end, StreamEnd::Timeout);
    assert_eq!(report.events.len(), 1);
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(relay.wait_for_closes(1).await);
}

#[tokio::test]
async fn test_unrequested_kinds_are_dropped() {
    let relay = MockRelay::start(RelayScript::frames(
        vec![],
        vec![
            Frame::Raw(json!(["EVENT", "{sub}", event("meta", 0, 50, "{}")]).to_string()),
            Frame::Raw(json!(["EVENT", "{sub}", event("note", 1, 60, "hi")]).to_string()),
            Frame::Raw(json!(["EVENT", "someone-else", event("other", 1, 70, "hi")]).to_string()),
            Frame::Eose,
        ],
    ))
    .await;

    let session = RelaySession::new(&relay.url, Duration::from_secs(5));
    let report = session.query(&note_filter()).await.unwrap();

    let ids: Vec<&str> = report.events.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["note"]);
    assert_eq!(report.end, StreamEnd::Eose);
}

#[tokio::test]
async fn test_notices_and_unknown_messages_are_ignored() {
    let relay = MockRelay::start(RelayScript::frames(
        vec![event("e1", 1, 100, "hello")],
        vec![
            Frame::Raw(r#"["NOTICE","slow down"]"#.to_string()),
            Frame::Raw(r#"["AUTH","challenge-string"]"#.to_string()),
            Frame::Events,
            Frame::Eose,
        ],
    ))
    .await;

    let session = RelaySession::new(&relay.url, Duration::from_secs(5));
    let report = session.query(&note_filter()).await.unwrap();

    assert_eq!(report.end, StreamEnd::Eose);
    assert_eq!(report.events.len(), 1);
}

#[tokio::test]
async fn test_malformed_frame_ends_session_keeping_events() {
    let relay = MockRelay::start(RelayScript::frames(
        vec![event("e1", 1, 100, "kept")],
        vec![
            Frame::Events,
            Frame::Raw("this is not json".to_string()),
            Frame::Raw(json!(["EVENT", "{sub}", event("e2", 1, 200, "lost")]).to_string()),
            Frame::Eose,
        ],
    ))
    .await;

    let session = RelaySession::new(&relay.url, Duration::from_secs(5));
    let report = session.query(&note_filter()).await.unwrap();

    assert!(matches!(report.end, StreamEnd::ProtocolError(_)));
    let ids: Vec<&str> = report.events.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["e1"]);
}

#[tokio::test]
async fn test_closed_by_relay() {
    let relay = MockRelay::start(RelayScript::frames(
        vec![event("e1", 1, 100, "hello")],
        vec![
            Frame::Events,
            Frame::Raw(r#"["CLOSED","{sub}","rate-limited: slow down"]"#.to_string()),
        ],
    ))
    .await;

    let session = RelaySession::new(&relay.url, Duration::from_secs(5));
    let report = session.query(&note_filter()).await.unwrap();

    assert_eq!(report.end, StreamEnd::Closed("rate-limited: slow down".to_string()));
    assert_eq!(report.events.len(), 1);
}

#[tokio::test]
async fn test_relay_hangup_keeps_events() {
    let relay = MockRelay::start(RelayScript::frames(
        vec![event("e1", 1, 100, "hello")],
        vec![Frame::Events, Frame::Hangup],
    ))
    .await;

    let session = RelaySession::new(&relay.url, Duration::from_secs(5));
    let report = session.query(&note_filter()).await.unwrap();

    assert!(matches!(report.end, StreamEnd::Disconnected(_)));
    assert_eq!(report.events.len(), 1);
}

#[tokio::test]
async fn test_unreachable_relay_is_an_error() {
    let session = RelaySession::new(unreachable_url(), Duration::from_secs(2));
    let result = session.query(&note_filter()).await;
    assert!(matches!(result, Err(SessionError::Unreachable(_))));
}

#[tokio::test]
async fn test_stalled_handshake_times_out() {
    let (url, _handle) = stalled_relay().await;

    let session = RelaySession::new(url, Duration::from_millis(300));
    let started = Instant::now();
    let result = session.query(&note_filter()).await;

    assert!(matches!(result, Err(SessionError::Timeout(_))));
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_stream_yields_events_then_ends() {
    let relay = MockRelay::start(RelayScript::complete(vec![
        event("e1", 1, 100, "first"),
        event("e2", 1, 200, "second"),
    ]))
    .await;

    let session = RelaySession::new(&relay.url, Duration::from_secs(5));
    let events: Vec<_> = session.stream(note_filter()).collect().await;

    assert_eq!(events.len(), 2);
    assert!(relay.wait_for_closes(1).await);
}

#[tokio::test]
async fn test_dropping_stream_closes_subscription() {
    let relay = MockRelay::start(RelayScript::without_eose(vec![
        event("e1", 1, 100, "first"),
        event("e2", 1, 200, "second"),
    ]))
    .await;

    // Far longer than wait_for_closes polls, so only the drop can end the session
    let session = RelaySession::new(&relay.url, Duration::from_secs(10));
    let mut events = Box::pin(session.stream(note_filter()));
    let first = events.next().await.unwrap();
    assert_eq!(first.id, "e1");
    drop(events);

    assert!(relay.wait_for_closes(1).await, "dropped stream kept its subscription");
}

#[tokio::test]
async fn test_drain_finishes_pending_closes() {
    let relay = MockRelay::start(RelayScript::complete(vec![event("e1", 1, 100, "hello")])).await;

    let session = RelaySession::new(&relay.url, Duration::from_secs(5));
    session.query(&note_filter()).await.unwrap();
    drain_pending_closes(CLOSE_GRACE * 2).await;

    assert_eq!(relay.closes(), 1);
}

#[tokio::test]
async fn test_publish_accepted_and_rejected() {
    let accepting = MockRelay::start(RelayScript::complete(vec![])).await;
    let mut rejecting_script = RelayScript::complete(vec![]);
    rejecting_script.accept_publish = false;
    let rejecting = MockRelay::start(rejecting_script).await;

    let note = event("published", 1, 300, "hello relays");

    let confirmation = RelaySession::new(&accepting.url, Duration::from_secs(5))
        .publish(&note)
        .await
        .unwrap();
    assert!(confirmation.accepted);
    assert_eq!(confirmation.event_id, "published");

    let confirmation = RelaySession::new(&rejecting.url, Duration::from_secs(5))
        .publish(&note)
        .await
        .unwrap();
    assert!(!confirmation.accepted);
    assert_eq!(confirmation.message, "blocked: test");
}
