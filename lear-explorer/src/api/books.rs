//! JSON book endpoints

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::api::parse_external_id;
use crate::error::ApiResult;
use crate::models::{Book, Metadata};
use crate::AppState;

/// Book listing entry (content omitted)
#[derive(Debug, Serialize)]
pub struct BookSummary {
    pub id: i64,
    pub external_id: i64,
    pub title: String,
    pub author: String,
    pub language: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Book> for BookSummary {
    fn from(book: &Book) -> Self {
        Self {
            id: book.id,
            external_id: book.external_id,
            title: book.metadata.display_title(book.external_id),
            author: book.metadata.author.clone(),
            language: book.metadata.language.clone(),
            created_at: book.created_at,
        }
    }
}

/// Full book view
#[derive(Debug, Serialize)]
pub struct BookDetail {
    pub id: i64,
    pub external_id: i64,
    pub metadata: Metadata,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl From<Book> for BookDetail {
    fn from(book: Book) -> Self {
        Self {
            id: book.id,
            external_id: book.external_id,
            metadata: book.metadata,
            content: book.content,
            created_at: book.created_at,
        }
    }
}

/// GET /api/books
///
/// Cached books only; never triggers a fetch.
pub async fn list_books(State(state): State<AppState>) -> ApiResult<Json<Vec<BookSummary>>> {
    let books = state.acquisition.fetch_all_books().await?;
    Ok(Json(books.iter().map(BookSummary::from).collect()))
}

/// GET /api/books/:id
///
/// Cache hit or fresh acquisition.
pub async fn get_book(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<BookDetail>> {
    let external_id = parse_external_id(&id)?;
    let book = state.acquisition.fetch_book(external_id).await?;
    Ok(Json(book.into()))
}

/// Build JSON book routes
pub fn book_routes() -> Router<AppState> {
    Router::new()
        .route("/api/books", get(list_books))
        .route("/api/books/:id", get(get_book))
}
