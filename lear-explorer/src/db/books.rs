//! Book cache operations
//!
//! The cache is keyed by catalog identifier. Metadata is stored as a JSON
//! text blob alongside the content.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lear_common::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::models::{Book, Metadata, NewBook};

/// Persistent book cache
#[async_trait]
pub trait BookRepository: Send + Sync {
    /// Look up a cached book by catalog identifier
    async fn get_by_external_id(&self, external_id: i64) -> Result<Option<Book>>;

    /// Persist a new book, returning it with its assigned store key
    async fn save(&self, book: NewBook) -> Result<Book>;

    /// Every cached book, oldest first
    async fn list_all(&self) -> Result<Vec<Book>>;
}

/// SQLite-backed book cache
#[derive(Clone)]
pub struct SqliteBookRepository {
    pool: SqlitePool,
}

impl SqliteBookRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Number of stored rows for a catalog identifier, duplicates included
    pub async fn count_by_external_id(&self, external_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM books WHERE external_id = ?")
            .bind(external_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

fn row_to_book(row: &SqliteRow) -> Result<Book> {
    let metadata_json: String = row.try_get("metadata")?;
    let metadata: Metadata = serde_json::from_str(&metadata_json)?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;

    Ok(Book {
        id: row.try_get("id")?,
        external_id: row.try_get("external_id")?,
        content: row.try_get("content")?,
        metadata,
        created_at,
    })
}

#[async_trait]
impl BookRepository for SqliteBookRepository {
    async fn get_by_external_id(&self, external_id: i64) -> Result<Option<Book>> {
        // Oldest row wins if a race ever stored duplicates
        let row = sqlx::query(
            r#"
            SELECT id, external_id, content, metadata, created_at
            FROM books
            WHERE external_id = ?
            ORDER BY id ASC
            LIMIT 1
            "#,
        )
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_book).transpose()
    }

    async fn save(&self, book: NewBook) -> Result<Book> {
        let metadata_json = serde_json::to_string(&book.metadata)?;
        let created_at = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO books (external_id, content, metadata, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(book.external_id)
        .bind(&book.content)
        .bind(&metadata_json)
        .bind(created_at)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        tracing::debug!(id, external_id = book.external_id, "Book row inserted");

        Ok(book.into_book(id, created_at))
    }

    async fn list_all(&self) -> Result<Vec<Book>> {
        let rows = sqlx::query(
            r#"
            SELECT id, external_id, content, metadata, created_at
            FROM books
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_book).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::in_memory_pool;

    fn sample(external_id: i64, title: &str) -> NewBook {
        NewBook {
            external_id,
            content: "It was the best of times".to_string(),
            metadata: Metadata {
                title: title.to_string(),
                author: "Charles Dickens".to_string(),
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn test_save_and_load_book() {
        let repo = SqliteBookRepository::new(in_memory_pool().await.unwrap());

        let saved = repo.save(sample(98, "A Tale of Two Cities")).await.unwrap();
        assert!(saved.id > 0);

        let loaded = repo
            .get_by_external_id(98)
            .await
            .expect("Failed to load book")
            .expect("Book not found");

        assert_eq!(loaded.id, saved.id);
        assert_eq!(loaded.content, "It was the best of times");
        assert_eq!(loaded.metadata.title, "A Tale of Two Cities");
        assert_eq!(loaded.metadata.author, "Charles Dickens");
    }

    #[tokio::test]
    async fn test_missing_book_is_none() {
        let repo = SqliteBookRepository::new(in_memory_pool().await.unwrap());
        assert!(repo.get_by_external_id(404).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_all_in_insertion_order() {
        let repo = SqliteBookRepository::new(in_memory_pool().await.unwrap());
        repo.save(sample(1, "First")).await.unwrap();
        repo.save(sample(2, "Second")).await.unwrap();

        let books = repo.list_all().await.unwrap();
        let titles: Vec<_> = books.iter().map(|b| b.metadata.title.as_str()).collect();
        assert_eq!(titles, vec!["First", "Second"]);
    }

    #[tokio::test]
    async fn test_duplicates_are_stored_and_oldest_is_returned() {
        let repo = SqliteBookRepository::new(in_memory_pool().await.unwrap());
        let first = repo.save(sample(7, "Original")).await.unwrap();
        repo.save(sample(7, "Duplicate")).await.unwrap();

        assert_eq!(repo.count_by_external_id(7).await.unwrap(), 2);

        let loaded = repo.get_by_external_id(7).await.unwrap().unwrap();
        assert_eq!(loaded.id, first.id);
        assert_eq!(loaded.metadata.title, "Original");
    }

    #[tokio::test]
    async fn test_corrupt_metadata_blob_is_an_error() {
        let pool = in_memory_pool().await.unwrap();
        sqlx::query(
            "INSERT INTO books (external_id, content, metadata, created_at) \
             VALUES (5, 'text', 'not json', '2024-01-01T00:00:00Z')",
        )
        .execute(&pool)
        .await
        .unwrap();

        let repo = SqliteBookRepository::new(pool);
        assert!(matches!(
            repo.get_by_external_id(5).await,
            Err(lear_common::Error::Serialization(_))
        ));
    }
}
