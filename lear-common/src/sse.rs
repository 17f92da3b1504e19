//! Server-Sent Events (SSE) utilities
//!
//! The relay writes pre-framed events into an [`EventSink`]. Framing is
//! byte-exact because browser clients listen for the `CustomEvent` and `Close`
//! event names:
//!
//! ```text
//! event: CustomEvent
//! data: {"analysis": "<escaped fragment>"}
//!
//! event: Close
//! data: Stream Ended
//!
//! ```
//!
//! axum's `Sse` response is not used: the relay flushes each frame through its
//! own sink and the response also carries `Connection: keep-alive`.

use async_trait::async_trait;
use axum::{
    body::Body,
    http::header,
    response::{IntoResponse, Response},
};
use bytes::{Bytes, BytesMut};
use std::convert::Infallible;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

/// Event name carrying an analysis fragment
pub const ANALYSIS_EVENT: &str = "CustomEvent";

/// Event name of the terminal event
pub const CLOSE_EVENT: &str = "Close";

/// Downstream write failure
#[derive(Debug, Error)]
pub enum SinkError {
    /// Client went away; nothing more can be delivered
    #[error("downstream client disconnected")]
    Disconnected,

    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Destination for framed events, written incrementally and flushed explicitly
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Append bytes to the pending output
    async fn write(&mut self, bytes: &[u8]) -> Result<(), SinkError>;

    /// Deliver everything written so far to the client
    async fn flush(&mut self) -> Result<(), SinkError>;

    /// Resolves once the client can no longer receive events
    ///
    /// Sinks without a notion of disconnection never resolve.
    async fn closed(&self) {
        std::future::pending::<()>().await
    }
}

/// In-memory sink; flush is a no-op
#[async_trait]
impl EventSink for Vec<u8> {
    async fn write(&mut self, bytes: &[u8]) -> Result<(), SinkError> {
        self.extend_from_slice(bytes);
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// One downstream event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEvent {
    /// Analysis fragment, already escaped for a JSON string literal
    Analysis(String),
    /// Terminal event after a clean upstream end
    Close,
}

impl RelayEvent {
    /// Build an analysis event from a raw fragment
    pub fn analysis(fragment: &str) -> Self {
        RelayEvent::Analysis(escape_json_string(fragment))
    }

    /// Wire representation, including the blank line terminator
    pub fn to_frame(&self) -> String {
        match self {
            RelayEvent::Analysis(escaped) => format!(
                "event: {}\ndata: {{\"analysis\": \"{}\"}}\n\n",
                ANALYSIS_EVENT, escaped
            ),
            RelayEvent::Close => format!("event: {}\ndata: Stream Ended\n\n", CLOSE_EVENT),
        }
    }
}

/// Write one event and flush it so the client sees it immediately
pub async fn send_event<S>(sink: &mut S, event: &RelayEvent) -> Result<(), SinkError>
where
    S: EventSink + ?Sized,
{
    sink.write(event.to_frame().as_bytes()).await?;
    sink.flush().await
}

/// Escape a fragment for embedding inside a JSON string literal
///
/// Uses serde_json's string encoding with the surrounding quotes removed.
pub fn escape_json_string(raw: &str) -> String {
    let quoted = serde_json::Value::String(raw.to_owned()).to_string();
    quoted[1..quoted.len() - 1].to_owned()
}

/// Sink backed by a bounded channel feeding an HTTP response body
///
/// Writes accumulate locally; `flush` hands the accumulated bytes to the
/// response as one chunk. Once the receiving side is dropped (the client
/// disconnected and axum dropped the body) every write or flush fails with
/// [`SinkError::Disconnected`].
pub struct ChannelSink {
    tx: mpsc::Sender<Bytes>,
    buffer: BytesMut,
}

/// Create a channel sink and the receiver to hand to [`event_stream_response`]
pub fn channel_sink(capacity: usize) -> (ChannelSink, mpsc::Receiver<Bytes>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        ChannelSink {
            tx,
            buffer: BytesMut::new(),
        },
        rx,
    )
}

#[async_trait]
impl EventSink for ChannelSink {
    async fn write(&mut self, bytes: &[u8]) -> Result<(), SinkError> {
        if self.tx.is_closed() {
            return Err(SinkError::Disconnected);
        }
        self.buffer.extend_from_slice(bytes);
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), SinkError> {
        if self.buffer.is_empty() {
            return if self.tx.is_closed() {
                Err(SinkError::Disconnected)
            } else {
                Ok(())
            };
        }
        let chunk = self.buffer.split().freeze();
        self.tx
            .send(chunk)
            .await
            .map_err(|_| SinkError::Disconnected)
    }

    async fn closed(&self) {
        self.tx.closed().await
    }
}

/// Streaming HTTP response for an event stream
///
/// Sets the event-stream content type, disables caching and keeps the
/// connection alive. The body ends when the sender side is dropped.
pub fn event_stream_response(mut rx: mpsc::Receiver<Bytes>) -> Response {
    let stream = async_stream::stream! {
        while let Some(chunk) = rx.recv().await {
            yield Ok::<Bytes, Infallible>(chunk);
        }
        debug!("SSE: event stream body finished");
    };

    (
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        Body::from_stream(stream),
    )
        .into_response()
}
