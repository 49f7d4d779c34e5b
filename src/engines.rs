//! Registry of query engines, one per data source.
//!
//! The CLI and the HTTP server answer questions against the configured
//! data source or any other connection descriptor a caller names. Each
//! database file gets its own [`QueryEngine`] (and therefore its own
//! catalog and answer cache), created on first use. Engines are keyed by
//! the canonical path of the file, so differently spelled descriptors for
//! one database share an engine. All engines share the same document store
//! and index.
//!
//! The registry holds at most `max_engines` engines. When full, the least
//! recently used engine is dropped (closing its pool and discarding its
//! cache) before a new one is added. A limit of `0` disables eviction.
//!
//! The registry also remembers the most recently inspected catalog across
//! all sources, which is what `GET /api/schema` reports.

use anyhow::{bail, Result};
use nlquery_core::catalog::SchemaCatalog;
use nlquery_core::index::DocumentIndex;
use nlquery_core::models::AnswerRecord;
use nlquery_core::store::DocumentStore;
use nlquery_core::{EngineOptions, QueryEngine};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Instant;

use crate::config::Config;
use crate::schema::SqliteDataSource;
use crate::sqlite_store::SqliteDocumentStore;
use crate::{db, index_io, migrate};

/// Default maximum number of data sources with an open engine.
pub const DEFAULT_MAX_ENGINES: usize = 16;

struct Slot {
    engine: Arc<QueryEngine>,
    /// Access counter value at last use.
    last_used: u64,
}

#[derive(Default)]
struct Slots {
    map: HashMap<PathBuf, Slot>,
    clock: u64,
}

impl Slots {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn get(&mut self, key: &Path) -> Option<Arc<QueryEngine>> {
        let now = self.tick();
        self.map.get_mut(key).map(|slot| {
            slot.last_used = now;
            slot.engine.clone()
        })
    }

    /// Add `engine` under `key` unless another request got there first, in
    /// which case the engine already registered wins.
    fn insert(&mut self, key: PathBuf, engine: QueryEngine, capacity: usize) -> Arc<QueryEngine> {
        if let Some(existing) = self.get(&key) {
            return existing;
        }

        if capacity > 0 && self.map.len() >= capacity {
            let oldest = self
                .map
                .iter()
                .min_by_key(|(_, slot)| slot.last_used)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                tracing::info!(source = %oldest.display(), "evicting idle query engine");
                self.map.remove(&oldest);
            }
        }

        let now = self.tick();
        let engine = Arc::new(engine);
        self.map.insert(
            key,
            Slot {
                engine: engine.clone(),
                last_used: now,
            },
        );
        engine
    }
}

pub struct Engines {
    default_source: String,
    documents: Arc<dyn DocumentStore>,
    index: Option<Arc<DocumentIndex>>,
    options: EngineOptions,
    max_engines: usize,
    engines: Mutex<Slots>,
    current: RwLock<Option<Arc<SchemaCatalog>>>,
}

impl Engines {
    pub fn new(
        default_source: impl Into<String>,
        documents: Arc<dyn DocumentStore>,
        index: Option<Arc<DocumentIndex>>,
        options: EngineOptions,
    ) -> Self {
        Self {
            default_source: default_source.into(),
            documents,
            index,
            options,
            max_engines: DEFAULT_MAX_ENGINES,
            engines: Mutex::new(Slots::default()),
            current: RwLock::new(None),
        }
    }

    /// Hold at most `max_engines` engines (`0` = unbounded).
    pub fn with_max_engines(mut self, max_engines: usize) -> Self {
        self.max_engines = max_engines;
        self
    }

    /// Open the document store and index named by `config`.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::create_tables(&pool).await?;
        let documents: Arc<dyn DocumentStore> = Arc::new(SqliteDocumentStore::new(pool));
        let index = index_io::load_index(&config.index.dir).map(Arc::new);

        Ok(Self::new(
            config.source.connection.clone(),
            documents,
            index,
            config.engine_options(),
        )
        .with_max_engines(config.source.max_engines))
    }

    pub fn default_source(&self) -> &str {
        &self.default_source
    }

    pub fn has_index(&self) -> bool {
        self.index.is_some()
    }

    /// Number of engines currently held.
    pub fn len(&self) -> usize {
        self.lock_engines().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The engine for `descriptor`, creating and inspecting it if needed.
    pub async fn engine(&self, descriptor: Option<&str>) -> nlquery_core::Result<Arc<QueryEngine>> {
        let descriptor = self.resolve(descriptor);
        let key = db::source_key(descriptor)?;

        let existing = self.lock_engines().get(&key);
        if let Some(engine) = existing {
            return Ok(engine);
        }

        let source = Arc::new(SqliteDataSource::connect(descriptor).await?);
        let engine = QueryEngine::open(
            source,
            self.documents.clone(),
            self.index.clone(),
            self.options,
        )
        .await?;
        self.set_current(engine.catalog());

        let engine = self.lock_engines().insert(key, engine, self.max_engines);
        Ok(engine)
    }

    /// Answer `question` against `descriptor` (or the default source).
    ///
    /// A source that cannot be opened yields an `error` answer.
    pub async fn answer(&self, question: &str, descriptor: Option<&str>) -> AnswerRecord {
        let started = Instant::now();
        match self.engine(descriptor).await {
            Ok(engine) => engine.answer(question).await,
            Err(e) => {
                tracing::warn!("could not open data source: {}", e);
                let mut failed = AnswerRecord::failed(e.to_string());
                failed.time_ms = started.elapsed().as_millis() as u64;
                failed
            }
        }
    }

    /// Re-inspect `descriptor` and make its catalog current.
    pub async fn inspect_schema(&self, descriptor: &str) -> nlquery_core::Result<Arc<SchemaCatalog>> {
        let key = db::source_key(self.resolve(Some(descriptor)))?;
        let existing = self.lock_engines().get(&key);
        let catalog = match existing {
            Some(engine) => engine.refresh_catalog().await?,
            None => self.engine(Some(descriptor)).await?.catalog(),
        };
        self.set_current(catalog.clone());
        Ok(catalog)
    }

    /// The last catalog successfully inspected from any source.
    pub fn current_schema(&self) -> Option<Arc<SchemaCatalog>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Every cached question across all engines, normalized.
    pub fn cached_questions(&self) -> BTreeSet<String> {
        self.lock_engines()
            .map
            .values()
            .flat_map(|slot| slot.engine.cached_questions())
            .collect()
    }

    fn resolve<'a>(&'a self, descriptor: Option<&'a str>) -> &'a str {
        descriptor
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .unwrap_or(self.default_source.as_str())
    }

    fn set_current(&self, catalog: Arc<SchemaCatalog>) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(catalog);
    }

    fn lock_engines(&self) -> MutexGuard<'_, Slots> {
        self.engines.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Answer one question and print the answer as JSON.
pub async fn run_ask(config: &Config, question: &str, connection: Option<&str>) -> Result<()> {
    if question.trim().is_empty() {
        bail!("question must not be empty");
    }

    let engines = Engines::open(config).await?;
    let answer = engines.answer(question, connection).await;
    println!("{}", serde_json::to_string_pretty(&answer)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nlquery_core::models::QueryType;
    use nlquery_core::store::memory::InMemoryDocumentStore;
    use tempfile::TempDir;

    async fn hr_db(dir: &std::path::Path, name: &str, rows: usize) -> String {
        let path = dir.join(name);
        let pool = db::connect_path(&path).await.unwrap();
        sqlx::query("CREATE TABLE employees (id INTEGER PRIMARY KEY, name TEXT, salary REAL)")
            .execute(&pool)
            .await
            .unwrap();
        for i in 0..rows {
            sqlx::query("INSERT INTO employees (name, salary) VALUES (?, ?)")
                .bind(format!("e{}", i))
                .bind(50000.0 + i as f64)
                .execute(&pool)
                .await
                .unwrap();
        }
        pool.close().await;
        format!("sqlite:///{}", path.display())
    }

    fn engines(default_source: &str) -> Engines {
        Engines::new(
            default_source,
            Arc::new(InMemoryDocumentStore::new()),
            None,
            EngineOptions::default(),
        )
    }

    #[tokio::test]
    async fn test_engines_are_per_source() {
        let tmp = TempDir::new().unwrap();
        let a = hr_db(tmp.path(), "a.db", 2).await;
        let b = hr_db(tmp.path(), "b.db", 5).await;
        let engines = engines(&a);

        let from_a = engines.answer("how many employees", None).await;
        let from_b = engines.answer("how many employees", Some(&b)).await;
        assert_eq!(from_a.results[0]["count"], 2);
        assert_eq!(from_b.results[0]["count"], 5);
        assert!(!from_b.cache_hit);

        let again = engines.answer("how many employees", Some(&a)).await;
        assert!(again.cache_hit);
        assert_eq!(
            engines.cached_questions().into_iter().collect::<Vec<_>>(),
            vec!["how many employees"]
        );
    }

    #[tokio::test]
    async fn test_descriptor_spellings_share_one_engine() {
        let tmp = TempDir::new().unwrap();
        let a = hr_db(tmp.path(), "a.db", 3).await;
        std::fs::create_dir_all(tmp.path().join("sub")).unwrap();
        let engines = engines(&a);

        let root = tmp.path().display().to_string();
        let mut spellings = vec![a.clone(), format!("  {}  ", a)];
        for depth in 1..=20 {
            let dots = "./".repeat(depth);
            spellings.push(format!("sqlite:///{}/{}a.db", root, dots));
            spellings.push(format!("sqlite:///{}/{}sub/../a.db", root, dots));
        }

        for d in &spellings {
            let answer = engines.answer("how many employees", Some(d)).await;
            assert_eq!(answer.results[0]["count"], 3);
        }
        assert_eq!(engines.len(), 1);
        // Only the first question missed the shared cache.
        let again = engines.answer("how many employees", None).await;
        assert!(again.cache_hit);
    }

    #[tokio::test]
    async fn test_least_recently_used_engine_is_evicted() {
        let tmp = TempDir::new().unwrap();
        let a = hr_db(tmp.path(), "a.db", 1).await;
        let b = hr_db(tmp.path(), "b.db", 2).await;
        let c = hr_db(tmp.path(), "c.db", 3).await;
        let engines = engines(&a).with_max_engines(2);

        engines.answer("how many employees", Some(&a)).await;
        engines.answer("how many employees", Some(&b)).await;
        // Touch "a" so "b" is the oldest.
        assert!(engines.answer("how many employees", Some(&a)).await.cache_hit);
        let from_c = engines.answer("how many employees", Some(&c)).await;
        assert_eq!(from_c.results[0]["count"], 3);
        assert_eq!(engines.len(), 2);

        assert!(engines.answer("how many employees", Some(&a)).await.cache_hit);
        // "b" was dropped along with its cache, so it is answered afresh.
        let from_b = engines.answer("how many employees", Some(&b)).await;
        assert!(!from_b.cache_hit);
        assert_eq!(from_b.results[0]["count"], 2);
        assert_eq!(engines.len(), 2);
    }

    #[tokio::test]
    async fn test_zero_max_engines_is_unbounded() {
        let tmp = TempDir::new().unwrap();
        let mut descriptors = Vec::new();
        for i in 0..4 {
            descriptors.push(hr_db(tmp.path(), &format!("{}.db", i), 1).await);
        }
        let engines = engines(&descriptors[0]).with_max_engines(0);
        for d in &descriptors {
            engines.answer("how many employees", Some(d)).await;
        }
        assert_eq!(engines.len(), 4);
    }

    #[tokio::test]
    async fn test_unopenable_source_is_error_answer() {
        let engines = engines("sqlite:////nonexistent/none.db");
        let answer = engines.answer("how many employees", None).await;
        assert_eq!(answer.query_type, QueryType::Error);
        assert!(answer.error.unwrap().starts_with("connection error"));
        assert!(engines.cached_questions().is_empty());
        assert!(engines.current_schema().is_none());
        assert!(engines.is_empty());
    }

    #[tokio::test]
    async fn test_failed_open_reports_elapsed_time() {
        let tmp = TempDir::new().unwrap();
        let a = hr_db(tmp.path(), "a.db", 1).await;

        // An exclusive lock makes inspection wait out the busy timeout.
        let writer = db::connect_path(&tmp.path().join("a.db")).await.unwrap();
        let mut conn = writer.acquire().await.unwrap();
        sqlx::query("BEGIN EXCLUSIVE")
            .execute(&mut *conn)
            .await
            .unwrap();

        let engines = engines(&a);
        let answer = engines.answer("how many employees", None).await;
        assert_eq!(answer.query_type, QueryType::Error);
        assert!(answer.time_ms >= 1000, "time_ms = {}", answer.time_ms);
        assert!(engines.is_empty());

        sqlx::query("ROLLBACK").execute(&mut *conn).await.unwrap();
    }

    #[tokio::test]
    async fn test_inspect_schema_updates_current() {
        let tmp = TempDir::new().unwrap();
        let a = hr_db(tmp.path(), "a.db", 1).await;
        let b = hr_db(tmp.path(), "b.db", 1).await;
        let engines = engines(&a);
        assert!(engines.current_schema().is_none());

        engines.inspect_schema(&b).await.unwrap();
        assert_eq!(engines.current_schema().unwrap().source_id, b);

        engines.answer("how many employees", None).await;
        assert_eq!(engines.current_schema().unwrap().source_id, a);

        // Re-inspecting an existing engine also makes it current.
        engines.inspect_schema(&b).await.unwrap();
        assert_eq!(engines.current_schema().unwrap().source_id, b);
    }

    #[tokio::test]
    async fn test_failed_inspection_keeps_current() {
        let tmp = TempDir::new().unwrap();
        let a = hr_db(tmp.path(), "a.db", 1).await;
        let engines = engines(&a);
        engines.inspect_schema(&a).await.unwrap();

        assert!(engines.inspect_schema("mysql://nowhere/hr").await.is_err());
        assert_eq!(engines.current_schema().unwrap().source_id, a);
    }
}
