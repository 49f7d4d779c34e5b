//! Storage seams for the query engine.
//!
//! The engine talks to two collaborators through traits so that the SQLite
//! implementations in the app crate and the in-memory ones used by tests are
//! interchangeable:
//!
//! | Trait | Purpose |
//! |-------|---------|
//! | [`DataSource`] | Inspect a relational schema and run generated `SELECT`s |
//! | [`DocumentStore`] | Look up ingested documents by id |
//!
//! Implementations must be `Send + Sync` to be shared across requests.

pub mod memory;

use async_trait::async_trait;

use crate::catalog::SchemaCatalog;
use crate::error::Result;
use crate::models::{DocumentRecord, Row};

/// A relational data source the engine reads from.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Connection descriptor identifying this source.
    fn source_id(&self) -> &str;

    /// Describe every table, its columns and a few sample rows.
    ///
    /// Fails with [`Error::Connection`](crate::Error::Connection) or
    /// [`Error::Introspection`](crate::Error::Introspection). A table whose
    /// rows cannot be sampled is reported with no sample rows instead.
    async fn inspect(&self) -> Result<SchemaCatalog>;

    /// Run a read-only statement and return its rows.
    ///
    /// Fails with [`Error::Execution`](crate::Error::Execution).
    async fn fetch_rows(&self, sql: &str) -> Result<Vec<Row>>;
}

/// Read access to ingested documents.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Retrieve a document by id, or `None` if it does not exist.
    async fn get_document(&self, id: i64) -> anyhow::Result<Option<DocumentRecord>>;
}
