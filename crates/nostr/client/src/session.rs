//! One-shot relay sessions.
//!
//! A session opens a WebSocket to a single relay, issues one `REQ`, collects
//! matching events and ends on `EOSE`, on the session deadline, or on the
//! first transport failure. Whatever was collected before the end is kept;
//! only failing to open the connection at all is reported as an error.
//!
//! The connection belongs to the session and is closed on every exit path.
//! Closing (a `CLOSE` for the subscription, then the WebSocket close
//! handshake) runs in a detached task bounded by [`CLOSE_GRACE`] so a slow
//! relay cannot stretch the session past its deadline. Short-lived programs
//! call [`drain_pending_closes`] before exiting so those tasks get to finish.

use crate::message::{ClientMessage, Filter, MessageError, RelayMessage};
use crate::subscription::generate_subscription_id;
use futures::{SinkExt, Stream, StreamExt};
use nostr::Event;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep, timeout, timeout_at};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{debug, info, warn};
use url::Url;

/// Deadline for post queries.
pub const CONTENT_QUERY_TIMEOUT: Duration = Duration::from_secs(8);

/// Deadline for profile queries.
pub const PROFILE_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound on the background close handshake.
pub const CLOSE_GRACE: Duration = Duration::from_secs(2);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Close tasks spawned by [`shutdown`] that have not finished yet.
static PENDING_CLOSES: AtomicUsize = AtomicUsize::new(0);

/// Reasons a session produced nothing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("invalid relay URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("relay unreachable: {0}")]
    Unreachable(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("failed to send to relay: {0}")]
    Send(String),

    #[error("relay disconnected: {0}")]
    Disconnected(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("session task failed: {0}")]
    Task(String),
}

/// How an opened session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEnd {
    /// The relay sent `EOSE` for our subscription
    Eose,
    /// The deadline passed first; results may be partial
    Timeout,
    /// The relay sent `CLOSED` for our subscription
    Closed(String),
    /// The socket closed or failed mid-stream
    Disconnected(String),
    /// The relay sent a frame that could not be decoded
    ProtocolError(String),
    /// The consumer stopped listening
    Cancelled,
}

impl StreamEnd {
    /// True when the relay confirmed it had nothing more to send.
    pub fn is_complete(&self) -> bool {
        matches!(self, StreamEnd::Eose)
    }

    /// Whether the relay still considers the subscription open.
    fn subscription_open(&self) -> bool {
        matches!(
            self,
            StreamEnd::Eose | StreamEnd::Timeout | StreamEnd::ProtocolError(_) | StreamEnd::Cancelled
        )
    }
}

/// Events collected by one session.
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub relay_url: String,
    pub subscription_id: String,
    pub events: Vec<Event>,
    pub end: StreamEnd,
}

/// Confirmation result for event publishing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishConfirmation {
    /// Event ID that was published
    pub event_id: String,
    /// Whether the relay accepted the event
    pub accepted: bool,
    /// Message from the relay (empty if accepted, error message if rejected)
    pub message: String,
}

/// A transient connection to one relay.
#[derive(Debug, Clone)]
pub struct RelaySession {
    url: String,
    timeout: Duration,
}

impl RelaySession {
    /// Create a session for `url`. Nothing is opened until a query runs.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run the subscription to completion and collect its events.
    pub async fn query(&self, filter: &Filter) -> Result<SessionReport, SessionError> {
        let mut events = Vec::new();
        let (subscription_id, end) = self
            .run(filter, std::future::pending(), |event| {
                events.push(event);
                true
            })
            .await?;

        Ok(SessionReport {
            relay_url: self.url.clone(),
            subscription_id,
            events,
            end,
        })
    }

    /// Stream matching events as they arrive.
    ///
    /// The stream is finite: it ends when the session ends, and is empty if
    /// the relay could not be reached. Dropping it stops the session early.
    /// Must be called from within a Tokio runtime.
    pub fn stream(&self, filter: Filter) -> impl Stream<Item = Event> + Send + use<> {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = self.clone();

        tokio::spawn(async move {
            let dropped = tx.closed();
            if let Err(e) = session.run(&filter, dropped, |event| tx.send(event).is_ok()).await {
                debug!("Stream from {} produced nothing: {}", session.url, e);
            }
        });

        futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        })
    }

    /// Publish a signed event and wait for the relay's `OK`.
    pub async fn publish(&self, event: &Event) -> Result<PublishConfirmation, SessionError> {
        let url = parse_relay_url(&self.url)?;
        let payload = encode(&ClientMessage::Event(event.clone()))?;
        let deadline = Instant::now() + self.timeout;

        let mut ws = self.connect(&url, deadline).await?;
        let result = self.await_ok(&mut ws, &payload, &event.id, deadline).await;
        shutdown(ws, None, self.url.clone());

        match &result {
            Ok(confirmation) if confirmation.accepted => {
                info!("Relay {} accepted event {}", self.url, event.id)
            }
            Ok(confirmation) => warn!(
                "Relay {} rejected event {}: {}",
                self.url, event.id, confirmation.message
            ),
            Err(e) => warn!("Publishing {} to {} failed: {}", event.id, self.url, e),
        }
        result
    }

    /// Subscribe and feed events to `on_event` until the session ends.
    ///
    /// `on_event` returning false, or `cancelled` resolving, ends the session
    /// with [`StreamEnd::Cancelled`].
    async fn run<F, C>(
        &self,
        filter: &Filter,
        cancelled: C,
        mut on_event: F,
    ) -> Result<(String, StreamEnd), SessionError>
    where
        F: FnMut(Event) -> bool,
        C: Future<Output = ()>,
    {
        tokio::pin!(cancelled);
        let url = parse_relay_url(&self.url)?;
        let subscription_id = generate_subscription_id();
        let request = encode(&ClientMessage::Req {
            subscription_id: subscription_id.clone(),
            filters: vec![filter.clone()],
        })?;
        let deadline = Instant::now() + self.timeout;

        let mut ws = self.connect(&url, deadline).await?;

        let end = match timeout_at(deadline, ws.send(Message::Text(request.into()))).await {
            Ok(Ok(())) => {
                debug!("Subscribed {} on {}", subscription_id, self.url);
                self.read_until_end(
                    &mut ws,
                    filter,
                    &subscription_id,
                    deadline,
                    cancelled.as_mut(),
                    &mut on_event,
                )
                .await
            }
            Ok(Err(e)) => {
                shutdown(ws, None, self.url.clone());
                return Err(SessionError::Send(e.to_string()));
            }
            Err(_) => StreamEnd::Timeout,
        };

        let close_subscription = end.subscription_open().then(|| subscription_id.clone());
        shutdown(ws, close_subscription, self.url.clone());

        Ok((subscription_id, end))
    }

    async fn connect(&self, url: &Url, deadline: Instant) -> Result<WsStream, SessionError> {
        debug!("Connecting to relay: {}", url);
        let connect_start = std::time::Instant::now();

        match timeout_at(deadline, connect_async(url.as_str())).await {
            Ok(Ok((stream, _))) => {
                debug!("Connected to relay: {} (took {:?})", url, connect_start.elapsed());
                Ok(stream)
            }
            Ok(Err(e)) => Err(SessionError::Unreachable(e.to_string())),
            Err(_) => Err(SessionError::Timeout(self.timeout)),
        }
    }

    async fn read_until_end<F, C>(
        &self,
        ws: &mut WsStream,
        filter: &Filter,
        subscription_id: &str,
        deadline: Instant,
        mut cancelled: Pin<&mut C>,
        on_event: &mut F,
    ) -> StreamEnd
    where
        F: FnMut(Event) -> bool,
        C: Future<Output = ()>,
    {
        loop {
            let next = tokio::select! {
                _ = cancelled.as_mut() => return StreamEnd::Cancelled,
                next = timeout_at(deadline, ws.next()) => next,
            };
            let frame = match next {
                Err(_) => return StreamEnd::Timeout,
                Ok(None) => return StreamEnd::Disconnected("stream ended".to_string()),
                Ok(Some(Err(e))) => return StreamEnd::Disconnected(e.to_string()),
                Ok(Some(Ok(frame))) => frame,
            };

            let text = match frame {
                Message::Text(text) => text,
                Message::Close(_) => {
                    return StreamEnd::Disconnected("closed by relay".to_string());
                }
                // Pings are answered by tungstenite; binary frames are not part of NIP-01
                _ => continue,
            };

            match RelayMessage::from_json(text.as_str()) {
                Ok(RelayMessage::Event {
                    subscription_id: sub,
                    event,
                }) if sub == subscription_id => {
                    if !filter.matches(&event) {
                        debug!("Dropping unrequested event {} from {}", event.id, self.url);
                        continue;
                    }
                    if !on_event(event) {
                        return StreamEnd::Cancelled;
                    }
                }
                Ok(RelayMessage::Eose {
                    subscription_id: sub,
                }) if sub == subscription_id => return StreamEnd::Eose,
                Ok(RelayMessage::Closed {
                    subscription_id: sub,
                    message,
                }) if sub == subscription_id => return StreamEnd::Closed(message),
                Ok(RelayMessage::Notice { message }) => {
                    debug!("Notice from {}: {}", self.url, message);
                }
                Ok(_) => {}
                Err(MessageError::UnknownType(kind)) => {
                    debug!("Ignoring {} message from {}", kind, self.url);
                }
                Err(e) => return StreamEnd::ProtocolError(e.to_string()),
            }
        }
    }

    async fn await_ok(
        &self,
        ws: &mut WsStream,
        payload: &str,
        event_id: &str,
        deadline: Instant,
    ) -> Result<PublishConfirmation, SessionError> {
        match timeout_at(deadline, ws.send(Message::Text(payload.to_string().into()))).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(SessionError::Send(e.to_string())),
            Err(_) => return Err(SessionError::Timeout(self.timeout)),
        }

        loop {
            let frame = match timeout_at(deadline, ws.next()).await {
                Err(_) => return Err(SessionError::Timeout(self.timeout)),
                Ok(None) => return Err(SessionError::Disconnected("stream ended".to_string())),
                Ok(Some(Err(e))) => return Err(SessionError::Disconnected(e.to_string())),
                Ok(Some(Ok(frame))) => frame,
            };
            let Message::Text(text) = frame else {
                continue;
            };

            match RelayMessage::from_json(text.as_str()) {
                Ok(RelayMessage::Ok {
                    event_id: id,
                    success,
                    message,
                }) if id == event_id => {
                    return Ok(PublishConfirmation {
                        event_id: id,
                        accepted: success,
                        message,
                    });
                }
                Ok(_) | Err(MessageError::UnknownType(_)) => {}
                Err(e) => return Err(SessionError::Protocol(e.to_string())),
            }
        }
    }
}

/// Check that `url` is a ws:// or wss:// URL.
pub fn parse_relay_url(url: &str) -> Result<Url, SessionError> {
    let parsed = Url::parse(url).map_err(|e| SessionError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    if parsed.scheme() != "ws" && parsed.scheme() != "wss" {
        return Err(SessionError::InvalidUrl {
            url: url.to_string(),
            reason: format!("URL must use ws:// or wss:// scheme, got: {}", parsed.scheme()),
        });
    }

    Ok(parsed)
}

fn encode(message: &ClientMessage) -> Result<String, SessionError> {
    message
        .to_json()
        .map_err(|e| SessionError::Protocol(e.to_string()))
}

/// Wait for background close handshakes to finish, for at most `limit`.
///
/// Returns false if some were still running when `limit` passed.
pub async fn drain_pending_closes(limit: Duration) -> bool {
    let deadline = Instant::now() + limit;
    while PENDING_CLOSES.load(Ordering::SeqCst) > 0 {
        if Instant::now() >= deadline {
            return false;
        }
        sleep(Duration::from_millis(10)).await;
    }
    true
}

/// Counts one running close task until dropped.
struct PendingClose;

impl PendingClose {
    fn register() -> Self {
        PENDING_CLOSES.fetch_add(1, Ordering::SeqCst);
        Self
    }
}

impl Drop for PendingClose {
    fn drop(&mut self) {
        PENDING_CLOSES.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Close the subscription (if still open) and the socket in the background.
fn shutdown(mut ws: WsStream, subscription_id: Option<String>, url: String) {
    let pending = PendingClose::register();
    tokio::spawn(async move {
        let _pending = pending;
        let closing = async {
            if let Some(subscription_id) = subscription_id
                && let Ok(close) = (ClientMessage::Close { subscription_id }).to_json()
            {
                let _ = ws.send(Message::Text(close.into())).await;
            }
            let _ = ws.close(None).await;
        };
        if timeout(CLOSE_GRACE, closing).await.is_err() {
            debug!("Close handshake with {} timed out, dropping socket", url);
        }
    });
}
