//! In-memory store implementations for tests and embedding.
//!
//! [`InMemoryDocumentStore`] keeps documents in a `HashMap` behind a
//! `RwLock`. [`InMemoryDataSource`] serves a fixed catalog and answers
//! statements from a table of canned results, counting how often it was
//! asked so callers can observe caching.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

use anyhow::Result;
use async_trait::async_trait;

use crate::catalog::SchemaCatalog;
use crate::error::Error;
use crate::models::{DocumentRecord, Row};

use super::{DataSource, DocumentStore};

/// In-memory document store.
pub struct InMemoryDocumentStore {
    docs: RwLock<HashMap<i64, DocumentRecord>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            docs: RwLock::new(HashMap::new()),
        }
    }

    pub fn insert(&self, doc: DocumentRecord) {
        self.docs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(doc.id, doc);
    }
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FromIterator<DocumentRecord> for InMemoryDocumentStore {
    fn from_iter<I: IntoIterator<Item = DocumentRecord>>(iter: I) -> Self {
        let store = Self::new();
        for doc in iter {
            store.insert(doc);
        }
        store
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get_document(&self, id: i64) -> Result<Option<DocumentRecord>> {
        let docs = self.docs.read().unwrap_or_else(PoisonError::into_inner);
        Ok(docs.get(&id).cloned())
    }
}

/// In-memory data source with a fixed catalog and canned results.
///
/// Statements without a canned result fail with an execution error.
pub struct InMemoryDataSource {
    catalog: SchemaCatalog,
    results: RwLock<HashMap<String, Vec<Row>>>,
    executions: AtomicUsize,
}

impl InMemoryDataSource {
    pub fn new(catalog: SchemaCatalog) -> Self {
        Self {
            catalog,
            results: RwLock::new(HashMap::new()),
            executions: AtomicUsize::new(0),
        }
    }

    /// Register the rows returned for `sql`.
    pub fn with_result(self, sql: &str, rows: Vec<Row>) -> Self {
        self.set_result(sql, rows);
        self
    }

    pub fn set_result(&self, sql: &str, rows: Vec<Row>) {
        self.results
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(sql.to_string(), rows);
    }

    /// Number of statements executed so far.
    pub fn executions(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataSource for InMemoryDataSource {
    fn source_id(&self) -> &str {
        &self.catalog.source_id
    }

    async fn inspect(&self) -> crate::error::Result<SchemaCatalog> {
        Ok(self.catalog.clone())
    }

    async fn fetch_rows(&self, sql: &str) -> crate::error::Result<Vec<Row>> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        let results = self.results.read().unwrap_or_else(PoisonError::into_inner);
        results
            .get(sql)
            .cloned()
            .ok_or_else(|| Error::Execution(format!("no result registered for: {}", sql)))
    }
}
