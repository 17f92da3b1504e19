//! Server-sent analysis stream
//!
//! The handler acquires the book and opens the upstream stream before
//! answering, so failures up to that point still get a proper status code.
//! Forwarding then runs on its own task, writing into a bounded channel that
//! feeds the response body. Dropping the body (client gone) closes the
//! channel, which the relay notices.

use axum::{
    extract::{Path, State},
    response::Response,
    routing::get,
    Router,
};
use lear_common::sse::{channel_sink, event_stream_response};
use tracing::{info, warn};

use crate::api::parse_external_id;
use crate::error::ApiResult;
use crate::AppState;

/// Events buffered between the relay task and the response body
const SSE_CHANNEL_CAPACITY: usize = 32;

/// GET /books/:id/analyze
pub async fn analyze_book(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let external_id = parse_external_id(&id)?;
    let book = state.acquisition.fetch_book(external_id).await?;

    let analysis = state.relay.open(&book.content).await?;
    info!(external_id, prompt_words = analysis.prompt_words(), "Starting analysis stream");

    let (mut sink, rx) = channel_sink(SSE_CHANNEL_CAPACITY);
    let relay = state.relay.clone();
    tokio::spawn(async move {
        match relay.forward(analysis, &mut sink).await {
            Ok(summary) => info!(external_id, events = summary.events, "Analysis stream finished"),
            Err(e) => warn!(external_id, error = %e, "Analysis stream ended early"),
        }
    });

    Ok(event_stream_response(rx))
}

/// Build analysis routes
pub fn analysis_routes() -> Router<AppState> {
    Router::new().route("/books/:id/analyze", get(analyze_book))
}
