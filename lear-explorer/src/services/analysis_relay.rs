//! Analysis relay
//!
//! Drives a streaming chat completion over a book's text and re-frames the
//! upstream output as server-sent events:
//!
//! 1. Truncate the text to [`MAX_PROMPT_WORDS`] words and embed it in the
//!    analysis prompt
//! 2. Open the upstream stream
//! 3. Decode `data: {chunk}` lines; every non-empty delta becomes one
//!    `CustomEvent`, flushed immediately
//! 4. On a clean upstream end, emit a single `Close` event
//!
//! Any failure after the stream is open stops the relay without a `Close`
//! event. Events already flushed stay with the client.

use std::sync::Arc;

use futures::StreamExt;
use lear_common::sse::{send_event, EventSink, RelayEvent, SinkError};
use serde::Deserialize;
use thiserror::Error;
use tracing::Instrument;

use crate::services::chat_engine::{ChatEngine, ChatEngineError, ChatStream};

/// Upper bound on words sent upstream
pub const MAX_PROMPT_WORDS: usize = 10_000;

/// Line marking the end of the upstream stream
const DONE_SENTINEL: &str = "data: [DONE]";

const DATA_PREFIX: &[u8] = b"data: ";

/// Relay failure
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("failed to stream chat: {0}")]
    StreamOpen(#[source] ChatEngineError),

    #[error("error decoding JSON chunk: {source}")]
    ChunkDecode {
        line: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0}")]
    StreamRead(#[source] ChatEngineError),

    #[error("failed to write event: {0}")]
    SinkWrite(#[from] SinkError),
}

/// One decoded upstream line
#[derive(Debug, Deserialize)]
pub struct StreamChunk {
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
pub struct StreamChoice {
    #[serde(default)]
    pub delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
pub struct StreamDelta {
    #[serde(default)]
    pub content: Option<String>,
}

impl StreamChunk {
    /// Non-empty content fragments, in choice order
    pub fn fragments(&self) -> impl Iterator<Item = &str> {
        self.choices
            .iter()
            .filter_map(|choice| choice.delta.content.as_deref())
            .filter(|content| !content.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RelayPhase {
    Idle,
    Prompting,
    Streaming,
    Closed,
    Failed,
}

impl RelayPhase {
    /// Idle → Prompting → Streaming → {Closed | Failed}; Prompting may fail too
    fn can_enter(self, next: RelayPhase) -> bool {
        use RelayPhase::*;
        matches!(
            (self, next),
            (Idle, Prompting)
                | (Prompting, Streaming)
                | (Prompting, Failed)
                | (Streaming, Closed)
                | (Streaming, Failed)
        )
    }
}

/// Phase bookkeeping for one relay call
struct RelayProgress {
    phase: RelayPhase,
    events: usize,
}

impl RelayProgress {
    fn new() -> Self {
        Self {
            phase: RelayPhase::Idle,
            events: 0,
        }
    }

    fn enter(&mut self, phase: RelayPhase) {
        debug_assert!(
            self.phase.can_enter(phase),
            "invalid relay transition {:?} -> {:?}",
            self.phase,
            phase
        );
        tracing::debug!(from = ?self.phase, to = ?phase, events = self.events, "Relay phase change");
        self.phase = phase;
    }

    fn fail(&mut self, err: RelayError) -> RelayError {
        tracing::error!(error = %err, events = self.events, phase = ?self.phase, "Analysis relay failed");
        self.enter(RelayPhase::Failed);
        err
    }
}

/// Upstream stream opened for a prompt, not yet forwarded
pub struct OpenAnalysis {
    stream: ChatStream,
    prompt_words: usize,
    progress: RelayProgress,
}

impl OpenAnalysis {
    /// Number of words of book text included in the prompt
    pub fn prompt_words(&self) -> usize {
        self.prompt_words
    }
}

/// Outcome of a completed relay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelaySummary {
    /// Analysis events written, excluding the close event
    pub events: usize,
}

/// Keep the first `max_words` whitespace-delimited words
///
/// Text within the limit is returned unchanged. Longer text is rejoined with
/// single spaces.
pub fn truncate_words(text: &str, max_words: usize) -> String {
    if text.split_whitespace().nth(max_words).is_none() {
        return text.to_string();
    }
    text.split_whitespace()
        .take(max_words)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Analysis prompt for an already truncated text
pub fn build_prompt(text: &str) -> String {
    format!(
        "\nGiven the following text:\n{}\n\
         1. Identify the key characters.\n\
         2. Detect the language.\n\
         3. Perform sentiment analysis.\n\
         4. Summarize the plot briefly.\n",
        text
    )
}

/// Relay from a chat engine to an event sink
#[derive(Clone)]
pub struct AnalysisRelay {
    engine: Arc<dyn ChatEngine>,
}

impl AnalysisRelay {
    pub fn new(engine: Arc<dyn ChatEngine>) -> Self {
        Self { engine }
    }

    /// Truncate, build the prompt and open the upstream stream
    ///
    /// Nothing is written anywhere; a failure here leaves the caller free to
    /// report it however it likes.
    pub async fn open(&self, text: &str) -> Result<OpenAnalysis, RelayError> {
        let truncated = truncate_words(text, MAX_PROMPT_WORDS);
        let prompt_words = truncated.split_whitespace().count();
        let span = tracing::info_span!("open_analysis", prompt_words);

        async {
            let mut progress = RelayProgress::new();
            progress.enter(RelayPhase::Prompting);

            let prompt = build_prompt(&truncated);
            let stream = self
                .engine
                .open_stream(&prompt)
                .await
                .map_err(|e| progress.fail(RelayError::StreamOpen(e)))?;

            tracing::info!("Upstream analysis stream opened");
            Ok::<_, RelayError>(OpenAnalysis {
                stream,
                prompt_words,
                progress,
            })
        }
        .instrument(span)
        .await
    }

    /// Forward an opened stream into `sink` until upstream ends
    ///
    /// Stops early with [`RelayError::SinkWrite`] as soon as the sink reports
    /// the client gone, without reading further upstream.
    pub async fn forward<S>(
        &self,
        analysis: OpenAnalysis,
        sink: &mut S,
    ) -> Result<RelaySummary, RelayError>
    where
        S: EventSink + ?Sized,
    {
        let span = tracing::info_span!("relay_analysis", prompt_words = analysis.prompt_words);
        forward_stream(analysis.stream, analysis.progress, sink)
            .instrument(span)
            .await
    }

    /// Open and forward in one call
    pub async fn stream_analysis<S>(
        &self,
        text: &str,
        sink: &mut S,
    ) -> Result<RelaySummary, RelayError>
    where
        S: EventSink + ?Sized,
    {
        let analysis = self.open(text).await?;
        self.forward(analysis, sink).await
    }
}

async fn forward_stream<S>(
    mut stream: ChatStream,
    mut progress: RelayProgress,
    sink: &mut S,
) -> Result<RelaySummary, RelayError>
where
    S: EventSink + ?Sized,
{
    progress.enter(RelayPhase::Streaming);

    let mut pending: Vec<u8> = Vec::new();

    loop {
        let next = tokio::select! {
            biased;
            _ = sink.closed() => {
                tracing::info!(events = progress.events, "Client disconnected, abandoning upstream stream");
                return Err(progress.fail(RelayError::SinkWrite(SinkError::Disconnected)));
            }
            next = stream.next() => next,
        };

        match next {
            Some(Ok(bytes)) => {
                pending.extend_from_slice(&bytes);
                while let Some(newline) = pending.iter().position(|b| *b == b'\n') {
                    let line: Vec<u8> = pending.drain(..=newline).collect();
                    relay_line(&line[..newline], &mut *sink, &mut progress).await?;
                }
            }
            Some(Err(e)) => return Err(progress.fail(RelayError::StreamRead(e))),
            None => break,
        }
    }

    // Final line without a trailing newline
    if !pending.is_empty() {
        relay_line(&pending, &mut *sink, &mut progress).await?;
    }

    debug_assert_eq!(progress.phase, RelayPhase::Streaming, "close sent outside streaming");
    send_event(&mut *sink, &RelayEvent::Close)
        .await
        .map_err(|e| progress.fail(e.into()))?;
    progress.enter(RelayPhase::Closed);
    tracing::info!(events = progress.events, "Analysis stream completed");

    Ok(RelaySummary {
        events: progress.events,
    })
}

async fn relay_line<S>(
    line: &[u8],
    sink: &mut S,
    progress: &mut RelayProgress,
) -> Result<(), RelayError>
where
    S: EventSink + ?Sized,
{
    let chunk = match decode_line(line) {
        Ok(Some(chunk)) => chunk,
        Ok(None) => return Ok(()),
        Err(e) => return Err(progress.fail(e)),
    };

    for fragment in chunk.fragments() {
        send_event(&mut *sink, &RelayEvent::analysis(fragment))
            .await
            .map_err(|e| progress.fail(e.into()))?;
        progress.events += 1;
    }
    Ok(())
}

/// Decode one upstream line; `None` for blank lines and the end sentinel
fn decode_line(line: &[u8]) -> Result<Option<StreamChunk>, RelayError> {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    let text = String::from_utf8_lossy(line);
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed == DONE_SENTINEL {
        return Ok(None);
    }

    let payload = line.strip_prefix(DATA_PREFIX).unwrap_or(line);
    serde_json::from_slice(payload)
        .map(Some)
        .map_err(|source| RelayError::ChunkDecode {
            line: text.into_owned(),
            source,
        })
}
