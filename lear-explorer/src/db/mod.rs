//! Database access for the explorer
//!
//! SQLite holds the book cache. The schema is created on startup if missing.

pub mod books;

pub use books::{BookRepository, SqliteBookRepository};

use lear_common::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize database connection pool
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Use proper SQLite URI with mode=rwc (read, write, create)
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;

    init_tables(&pool).await?;

    Ok(pool)
}

/// Single-connection in-memory database with the schema applied
///
/// Every SQLite `:memory:` connection is its own database, so the pool is
/// capped at one connection.
pub async fn in_memory_pool() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;

    init_tables(&pool).await?;

    Ok(pool)
}

/// Create the books table if it doesn't exist
///
/// `external_id` is indexed but not unique: two concurrent acquisitions of the
/// same uncached book may both insert.
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS books (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            external_id INTEGER NOT NULL,
            content TEXT NOT NULL,
            metadata TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_books_external_id ON books (external_id)")
        .execute(pool)
        .await?;

    tracing::info!("Database tables initialized (books)");

    Ok(())
}
