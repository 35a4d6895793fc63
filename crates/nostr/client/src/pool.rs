//! Relay pool: fan one query out to every configured relay.
//!
//! Each relay gets its own session on its own task. The pool waits for all
//! of them, folds in the ones that produced a report and discards the rest,
//! so a single dead relay costs coverage, never the whole fetch.

use crate::message::Filter;
use crate::session::{PublishConfirmation, RelaySession, SessionError, StreamEnd};
use futures::future::join_all;
use nostr::Event;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, warn};

/// What a successful session contributed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub subscription_id: String,
    pub event_count: usize,
    pub end: StreamEnd,
}

/// Result of querying one relay.
#[derive(Debug, Clone)]
pub struct RelayOutcome {
    pub relay_url: String,
    pub result: Result<SessionSummary, SessionError>,
}

/// Merged events plus one outcome per relay, in configuration order.
#[derive(Debug, Clone, Default)]
pub struct Aggregation {
    pub events: Vec<Event>,
    pub outcomes: Vec<RelayOutcome>,
}

impl Aggregation {
    /// Number of relays queried.
    pub fn attempted(&self) -> usize {
        self.outcomes.len()
    }

    /// Number of relays whose session opened and returned a report.
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }
}

/// A fixed set of relays queried together.
#[derive(Debug, Clone, Default)]
pub struct RelayPool {
    relays: Vec<String>,
}

impl RelayPool {
    pub fn new(relays: Vec<String>) -> Self {
        Self { relays }
    }

    pub fn relay_urls(&self) -> &[String] {
        &self.relays
    }

    /// Query every relay and return the union of their events, unique by id.
    ///
    /// An empty result does not distinguish "nothing published" from "no relay
    /// answered"; use [`RelayPool::fetch_events_detailed`] when that matters.
    pub async fn fetch_events(&self, filter: &Filter, timeout: Duration) -> Vec<Event> {
        self.fetch_events_detailed(filter, timeout).await.events
    }

    /// Query every relay and report how each one fared.
    pub async fn fetch_events_detailed(&self, filter: &Filter, timeout: Duration) -> Aggregation {
        let handles: Vec<_> = self
            .relays
            .iter()
            .map(|url| {
                let session = RelaySession::new(url.clone(), timeout);
                let filter = filter.clone();
                tokio::spawn(async move { session.query(&filter).await })
            })
            .collect();

        let results = join_all(handles).await;

        let mut aggregation = Aggregation::default();
        let mut seen = HashSet::new();

        for (relay_url, joined) in self.relays.iter().zip(results) {
            let result = joined.unwrap_or_else(|e| Err(SessionError::Task(e.to_string())));

            let result = match result {
                Ok(report) => {
                    debug!(
                        "Relay {} returned {} events ({:?})",
                        relay_url,
                        report.events.len(),
                        report.end
                    );
                    let summary = SessionSummary {
                        subscription_id: report.subscription_id,
                        event_count: report.events.len(),
                        end: report.end,
                    };
                    for event in report.events {
                        if seen.insert(event.id.clone()) {
                            aggregation.events.push(event);
                        }
                    }
                    Ok(summary)
                }
                Err(e) => {
                    warn!("Relay {} failed: {}", relay_url, e);
                    Err(e)
                }
            };

            aggregation.outcomes.push(RelayOutcome {
                relay_url: relay_url.clone(),
                result,
            });
        }

        info!(
            "Fetched {} unique events from {}/{} relays",
            aggregation.events.len(),
            aggregation.succeeded(),
            aggregation.attempted()
        );
        aggregation
    }

    /// Publish an event to every relay concurrently.
    pub async fn publish(
        &self,
        event: &Event,
        timeout: Duration,
    ) -> Vec<(String, Result<PublishConfirmation, SessionError>)> {
        let handles: Vec<_> = self
            .relays
            .iter()
            .map(|url| {
                let session = RelaySession::new(url.clone(), timeout);
                let event = event.clone();
                tokio::spawn(async move { session.publish(&event).await })
            })
            .collect();

        let results = join_all(handles).await;

        self.relays
            .iter()
            .cloned()
            .zip(results)
            .map(|(url, joined)| {
                let result = joined.unwrap_or_else(|e| Err(SessionError::Task(e.to_string())));
                (url, result)
            })
            .collect()
    }
}
