//! lear-explorer library interface
//!
//! Exposes the core services and router for integration testing

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::services::{AnalysisRelay, BookAcquisition};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Cache-or-fetch book resolution
    pub acquisition: Arc<BookAcquisition>,
    /// Chat stream to event stream relay
    pub relay: AnalysisRelay,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(acquisition: BookAcquisition, relay: AnalysisRelay) -> Self {
        Self {
            acquisition: Arc::new(acquisition),
            relay,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // UI routes (HTML pages)
        .merge(api::ui_routes())
        // Event stream
        .merge(api::analysis_routes())
        // JSON routes
        .merge(api::book_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
