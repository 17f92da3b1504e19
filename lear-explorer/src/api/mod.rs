//! HTTP API handlers for the explorer
//!
//! - `/` and `/books/:id`: HTML pages
//! - `/books/:id/analyze`: server-sent analysis events
//! - `/api/books`, `/api/books/:id`: JSON views
//! - `/health`: liveness

pub mod analysis;
pub mod books;
pub mod health;
pub mod ui;

pub use analysis::analysis_routes;
pub use books::book_routes;
pub use health::health_routes;
pub use ui::ui_routes;

use crate::error::{ApiError, ApiResult};

/// Parse a catalog identifier from a path segment
pub(crate) fn parse_external_id(raw: &str) -> ApiResult<i64> {
    match raw.trim().parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(ApiError::BadRequest(format!("Invalid book ID: {}", raw))),
    }
}
