//! The question router.
//!
//! [`QueryEngine::answer`] is the single entry point for a question:
//!
//! 1. Normalize the question (trim, lower-case); this is the cache key.
//! 2. Return a cached answer if one exists.
//! 3. Questions about resumes, skills, experience or documents go straight
//!    to document search.
//! 4. Otherwise try the SQL translator. A mapped statement is executed
//!    against the data source; execution errors are returned as an
//!    `error` answer and are not cached.
//! 5. Questions with no mapping fall back to document search.
//!
//! Every answer except errors is cached.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use crate::cache::{normalize, AnswerCache, DEFAULT_CAPACITY};
use crate::catalog::{CatalogHandle, SchemaCatalog};
use crate::error::Result;
use crate::index::DocumentIndex;
use crate::models::{AnswerRecord, DocumentHit, QueryType};
use crate::retrieve::{self, RetrieveParams};
use crate::store::{DataSource, DocumentStore};
use crate::translate::{translate, Translation};

/// Vocabulary that marks a question as being about documents.
const DOCUMENT_CUES: &[&str] = &[
    "resume",
    "resumes",
    "cv",
    "skill",
    "skills",
    "experience",
    "document",
    "documents",
];

/// Engine tuning parameters.
#[derive(Debug, Clone, Copy)]
pub struct EngineOptions {
    pub retrieve: RetrieveParams,
    /// Maximum cached answers (`0` = unbounded).
    pub cache_capacity: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            retrieve: RetrieveParams::default(),
            cache_capacity: DEFAULT_CAPACITY,
        }
    }
}

/// Answers questions against one data source and one document index.
pub struct QueryEngine {
    source: Arc<dyn DataSource>,
    documents: Arc<dyn DocumentStore>,
    index: Option<Arc<DocumentIndex>>,
    catalog: CatalogHandle,
    cache: AnswerCache,
    options: EngineOptions,
}

impl QueryEngine {
    /// Create an engine with an empty catalog.
    ///
    /// Call [`refresh_catalog`](Self::refresh_catalog) (or use
    /// [`open`](Self::open)) before expecting SQL answers.
    pub fn new(
        source: Arc<dyn DataSource>,
        documents: Arc<dyn DocumentStore>,
        index: Option<Arc<DocumentIndex>>,
        options: EngineOptions,
    ) -> Self {
        let catalog = CatalogHandle::new(SchemaCatalog::new(source.source_id()));
        Self {
            source,
            documents,
            index,
            catalog,
            cache: AnswerCache::with_capacity(options.cache_capacity),
            options,
        }
    }

    /// Create an engine and inspect its data source.
    pub async fn open(
        source: Arc<dyn DataSource>,
        documents: Arc<dyn DocumentStore>,
        index: Option<Arc<DocumentIndex>>,
        options: EngineOptions,
    ) -> Result<Self> {
        let engine = Self::new(source, documents, index, options);
        engine.refresh_catalog().await?;
        Ok(engine)
    }

    pub fn source_id(&self) -> &str {
        self.source.source_id()
    }

    /// Re-inspect the data source and swap in the new catalog.
    ///
    /// On failure the previous catalog stays in place.
    pub async fn refresh_catalog(&self) -> Result<Arc<SchemaCatalog>> {
        let catalog = self.source.inspect().await?;
        tracing::debug!(
            source = self.source.source_id(),
            tables = catalog.tables.len(),
            "schema catalog refreshed"
        );
        Ok(self.catalog.replace(catalog))
    }

    /// Install a catalog inspected elsewhere.
    pub fn replace_catalog(&self, catalog: SchemaCatalog) -> Arc<SchemaCatalog> {
        self.catalog.replace(catalog)
    }

    pub fn catalog(&self) -> Arc<SchemaCatalog> {
        self.catalog.snapshot()
    }

    pub fn has_index(&self) -> bool {
        self.index.is_some()
    }

    /// Every question currently cached, normalized.
    pub fn cached_questions(&self) -> BTreeSet<String> {
        self.cache.keys()
    }

    pub fn cache(&self) -> &AnswerCache {
        &self.cache
    }

    /// Run document search directly, bypassing routing and the cache.
    pub async fn search_documents(&self, question: &str) -> Vec<DocumentHit> {
        retrieve::search(
            question,
            self.index.as_deref(),
            self.documents.as_ref(),
            self.options.retrieve,
        )
        .await
    }

    /// Answer a question.
    pub async fn answer(&self, question: &str) -> AnswerRecord {
        let started = Instant::now();
        let key = normalize(question);

        if let Some(mut cached) = self.cache.get(&key) {
            cached.cache_hit = true;
            cached.time_ms = elapsed_ms(started);
            tracing::debug!(question = %key, "answer served from cache");
            return cached;
        }

        if DOCUMENT_CUES.iter().any(|cue| key.contains(cue)) {
            let hits = self.search_documents(question).await;
            tracing::debug!(question = %key, hits = hits.len(), "routed to document search");
            return self.remember(key, AnswerRecord::documents(QueryType::Document, &hits), started);
        }

        let catalog = self.catalog.snapshot();
        match translate(question, &catalog) {
            Translation::Mapped(sql) => match self.source.fetch_rows(&sql).await {
                Ok(rows) => {
                    tracing::debug!(question = %key, rows = rows.len(), "answered from database");
                    self.remember(key, AnswerRecord::rows(sql, rows), started)
                }
                Err(e) => {
                    tracing::warn!(question = %key, %sql, "generated statement failed: {}", e);
                    let mut failed = AnswerRecord::failed(e.to_string());
                    failed.time_ms = elapsed_ms(started);
                    failed
                }
            },
            Translation::NotApplicable => {
                let hits = self.search_documents(question).await;
                tracing::debug!(question = %key, hits = hits.len(), "no sql mapping, fell back to documents");
                self.remember(
                    key,
                    AnswerRecord::documents(QueryType::FallbackDocument, &hits),
                    started,
                )
            }
        }
    }

    fn remember(&self, key: String, mut record: AnswerRecord, started: Instant) -> AnswerRecord {
        record.time_ms = elapsed_ms(started);
        self.cache.insert(key, record.clone());
        record
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DocumentRecord, Row, Sources};
    use crate::store::memory::{InMemoryDataSource, InMemoryDocumentStore};
    use serde_json::json;

    const COUNT_SQL: &str = "SELECT COUNT(*) AS count FROM employees LIMIT 1";

    fn catalog() -> SchemaCatalog {
        SchemaCatalog::new("memory").with_table(
            "employees",
            &[
                ("id", "INTEGER"),
                ("name", "TEXT"),
                ("department", "TEXT"),
                ("salary", "REAL"),
            ],
        )
    }

    fn row(value: serde_json::Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    fn documents() -> (Arc<InMemoryDocumentStore>, Arc<DocumentIndex>) {
        let docs = vec![
            DocumentRecord {
                id: 1,
                filename: "alice_resume.txt".to_string(),
                content: "Alice. Skills: Rust, Kubernetes. Experience: 5 years.".to_string(),
            },
            DocumentRecord {
                id: 2,
                filename: "bob_resume.txt".to_string(),
                content: "Bob. Skills: Python, pandas. Experience: 3 years.".to_string(),
            },
        ];
        let pairs: Vec<(i64, String)> = docs.iter().map(|d| (d.id, d.content.clone())).collect();
        let index = DocumentIndex::build(&pairs, 2000);
        (Arc::new(docs.into_iter().collect()), Arc::new(index))
    }

    async fn engine_with(source: Arc<InMemoryDataSource>) -> QueryEngine {
        let (store, index) = documents();
        QueryEngine::open(source, store, Some(index), EngineOptions::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_sql_answer() {
        let source = Arc::new(
            InMemoryDataSource::new(catalog()).with_result(COUNT_SQL, vec![row(json!({"count": 4}))]),
        );
        let engine = engine_with(source.clone()).await;

        let answer = engine.answer("How many employees are there?").await;
        assert_eq!(answer.query_type, QueryType::Sql);
        assert_eq!(answer.sources, Some(Sources::Database));
        assert_eq!(answer.sql.as_deref(), Some(COUNT_SQL));
        assert_eq!(answer.results, vec![json!({"count": 4})]);
        assert!(!answer.cache_hit);
        assert_eq!(source.executions(), 1);
    }

    #[tokio::test]
    async fn test_repeat_question_hits_cache() {
        let source = Arc::new(
            InMemoryDataSource::new(catalog()).with_result(COUNT_SQL, vec![row(json!({"count": 4}))]),
        );
        let engine = engine_with(source.clone()).await;

        let first = engine.answer("How many employees?").await;
        let second = engine.answer("  how many EMPLOYEES?  ").await;

        assert!(second.cache_hit);
        assert_eq!(source.executions(), 1);
        assert_eq!(first.query_type, second.query_type);
        assert_eq!(first.results, second.results);
        assert_eq!(first.sql, second.sql);
        assert_eq!(first.sources, second.sources);
        assert_eq!(first.error, second.error);
        assert_eq!(
            engine.cached_questions().into_iter().collect::<Vec<_>>(),
            vec!["how many employees?"]
        );
    }

    #[tokio::test]
    async fn test_document_cue_overrides_tables() {
        let source = Arc::new(InMemoryDataSource::new(catalog()));
        let engine = engine_with(source.clone()).await;

        let answer = engine.answer("list employees with a resume mentioning rust").await;
        assert_eq!(answer.query_type, QueryType::Document);
        assert_eq!(answer.sources, Some(Sources::Documents));
        assert_eq!(source.executions(), 0);
        assert_eq!(answer.results[0]["filename"], "alice_resume.txt");
    }

    #[tokio::test]
    async fn test_execution_error_is_not_cached() {
        // No canned result: execution fails.
        let source = Arc::new(InMemoryDataSource::new(catalog()));
        let engine = engine_with(source.clone()).await;

        let failed = engine.answer("how many employees").await;
        assert_eq!(failed.query_type, QueryType::Error);
        assert!(failed.error.as_deref().unwrap().contains("no result registered"));
        assert!(failed.sources.is_none());
        assert!(engine.cached_questions().is_empty());

        // Once the source recovers the question is re-executed.
        source.set_result(COUNT_SQL, vec![row(json!({"count": 2}))]);
        let recovered = engine.answer("how many employees").await;
        assert_eq!(recovered.query_type, QueryType::Sql);
        assert!(!recovered.cache_hit);
        assert_eq!(source.executions(), 2);
    }

    #[tokio::test]
    async fn test_unmapped_question_falls_back_to_documents() {
        let source = Arc::new(InMemoryDataSource::new(catalog()));
        let engine = engine_with(source.clone()).await;

        let answer = engine.answer("tell me about kubernetes").await;
        assert_eq!(answer.query_type, QueryType::FallbackDocument);
        assert_eq!(answer.sources, Some(Sources::Documents));
        assert_eq!(answer.results[0]["id"], 1);
        assert_eq!(source.executions(), 0);
        assert!(engine.cached_questions().contains("tell me about kubernetes"));
    }

    #[tokio::test]
    async fn test_no_index_gives_empty_document_answers() {
        let source = Arc::new(InMemoryDataSource::new(catalog()));
        let engine = QueryEngine::open(
            source,
            Arc::new(InMemoryDocumentStore::new()),
            None,
            EngineOptions::default(),
        )
        .await
        .unwrap();

        assert!(!engine.has_index());
        let answer = engine.answer("show resumes").await;
        assert_eq!(answer.query_type, QueryType::Document);
        assert!(answer.results.is_empty());
    }

    #[tokio::test]
    async fn test_count_without_table_falls_back() {
        let source = Arc::new(InMemoryDataSource::new(
            SchemaCatalog::new("memory").with_table("orders", &[("id", "INTEGER")]),
        ));
        let engine = engine_with(source.clone()).await;

        let answer = engine.answer("how many zebras").await;
        assert_eq!(answer.query_type, QueryType::FallbackDocument);
        assert_eq!(source.executions(), 0);
    }

    #[tokio::test]
    async fn test_empty_catalog_before_refresh() {
        let (store, index) = documents();
        let engine = QueryEngine::new(
            Arc::new(InMemoryDataSource::new(catalog())),
            store,
            Some(index),
            EngineOptions::default(),
        );
        assert!(engine.catalog().is_empty());

        engine.refresh_catalog().await.unwrap();
        assert!(engine.catalog().table("employees").is_some());
    }

    #[tokio::test]
    async fn test_replace_catalog_changes_translation() {
        let source = Arc::new(InMemoryDataSource::new(catalog()).with_result(
            "SELECT COUNT(*) AS count FROM staff LIMIT 1",
            vec![row(json!({"count": 9}))],
        ));
        let engine = engine_with(source).await;

        engine.replace_catalog(SchemaCatalog::new("memory").with_table("staff", &[]));
        let answer = engine.answer("how many people on staff").await;
        assert_eq!(answer.results, vec![json!({"count": 9})]);
    }

    #[tokio::test]
    async fn test_cache_capacity_is_honoured() {
        let source = Arc::new(InMemoryDataSource::new(catalog()));
        let (store, index) = documents();
        let options = EngineOptions {
            cache_capacity: 1,
            ..EngineOptions::default()
        };
        let engine = QueryEngine::open(source, store, Some(index), options)
            .await
            .unwrap();

        engine.answer("resume rust").await;
        engine.answer("resume python").await;
        assert_eq!(
            engine.cached_questions().into_iter().collect::<Vec<_>>(),
            vec!["resume python"]
        );
    }
}
