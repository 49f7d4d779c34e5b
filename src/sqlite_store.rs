//! SQLite-backed document store.

use anyhow::Result;
use async_trait::async_trait;
use nlquery_core::models::DocumentRecord;
use nlquery_core::store::DocumentStore;
use sqlx::{Row, SqlitePool};

/// Reads and appends rows of the `documents` table.
#[derive(Clone)]
pub struct SqliteDocumentStore {
    pool: SqlitePool,
}

impl SqliteDocumentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Append a document and return its id.
    pub async fn insert(&self, filename: &str, content: &str) -> Result<i64> {
        let result = sqlx::query("INSERT INTO documents (filename, content) VALUES (?, ?)")
            .bind(filename)
            .bind(content)
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    /// Every document as `(id, content)`, in id order.
    pub async fn all_contents(&self) -> Result<Vec<(i64, String)>> {
        let rows = sqlx::query("SELECT id, content FROM documents ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .iter()
            .map(|row| {
                let content: Option<String> = row.get("content");
                (row.get("id"), content.unwrap_or_default())
            })
            .collect())
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn get_document(&self, id: i64) -> Result<Option<DocumentRecord>> {
        let row = sqlx::query("SELECT id, filename, content FROM documents WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| {
            let filename: Option<String> = row.get("filename");
            let content: Option<String> = row.get("content");
            DocumentRecord {
                id: row.get("id"),
                filename: filename.unwrap_or_default(),
                content: content.unwrap_or_default(),
            }
        }))
    }
}
