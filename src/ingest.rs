//! Document ingestion.
//!
//! `nlq ingest <paths...>` stores each file as a row of the `documents`
//! table and then rebuilds the TF-IDF index from every stored document.
//!
//! Directories are walked recursively and filtered by the `[ingest]`
//! include/exclude globs, matched against the path relative to the
//! directory. Files named explicitly are always ingested.
//!
//! Content by extension:
//!
//! | Extension | Stored content |
//! |-----------|----------------|
//! | `txt`, `md`, `csv` | File text (invalid UTF-8 replaced) |
//! | `pdf` | Text extracted with `pdf-extract` |
//! | anything else | A placeholder naming the extension |
//!
//! A file that cannot be read is still stored, with
//! `[error reading file: <reason>]` as its content.

use anyhow::{bail, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use nlquery_core::index::DocumentIndex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::Config;
use crate::db;
use crate::index_io;
use crate::migrate;
use crate::sqlite_store::SqliteDocumentStore;

/// Outcome of an ingestion run.
#[derive(Debug, Clone, Serialize)]
pub struct IngestSummary {
    /// Files stored by this run.
    pub ingested: Vec<String>,
    /// Documents covered by the rebuilt index (0 if none was written).
    pub indexed: usize,
}

pub async fn run_ingest(config: &Config, paths: &[PathBuf]) -> Result<IngestSummary> {
    let files = collect_files(config, paths)?;

    let pool = db::connect(config).await?;
    migrate::create_tables(&pool).await?;
    let store = SqliteDocumentStore::new(pool);

    let mut ingested = Vec::with_capacity(files.len());
    for path in &files {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let content = extract_content(path);
        let id = store.insert(&filename, &content).await?;
        tracing::info!(id, file = %path.display(), chars = content.len(), "stored document");
        ingested.push(filename);
    }

    let indexed = rebuild_index(config, &store).await?;
    store.pool().close().await;

    Ok(IngestSummary { ingested, indexed })
}

/// Fit a new index over every stored document and write it to disk.
///
/// Returns the number of indexed documents. With no documents nothing is
/// written and any existing index is left alone.
pub async fn rebuild_index(config: &Config, store: &SqliteDocumentStore) -> Result<usize> {
    let documents = store.all_contents().await?;
    if documents.is_empty() {
        tracing::info!("no documents stored, index not written");
        return Ok(0);
    }

    let index = DocumentIndex::build(&documents, config.index.max_features);
    index_io::save_index(&config.index.dir, &index)?;
    tracing::info!(
        documents = index.len(),
        features = index.vectors.n_features,
        dir = %config.index.dir.display(),
        "document index rebuilt"
    );
    Ok(index.len())
}

/// Expand `paths` into the files to ingest, sorted and de-duplicated.
pub fn collect_files(config: &Config, paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let include_set = build_globset(&config.ingest.include_globs)?;

    let mut default_excludes = vec![
        "**/.git/**".to_string(),
        "**/target/**".to_string(),
        "**/node_modules/**".to_string(),
    ];
    default_excludes.extend(config.ingest.exclude_globs.clone());
    let exclude_set = build_globset(&default_excludes)?;

    let mut files = Vec::new();
    for root in paths {
        if root.is_file() {
            files.push(root.clone());
            continue;
        }
        if !root.is_dir() {
            bail!("Path does not exist: {}", root.display());
        }

        for entry in WalkDir::new(root) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let relative = path.strip_prefix(root).unwrap_or(path);
            let rel_str = relative.to_string_lossy().to_string();

            if exclude_set.is_match(&rel_str) {
                continue;
            }
            if !include_set.is_match(&rel_str) {
                continue;
            }

            files.push(path.to_path_buf());
        }
    }

    // Sort for deterministic ordering
    files.sort();
    files.dedup();
    Ok(files)
}

/// Text stored for the file at `path`.
pub fn extract_content(path: &Path) -> String {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_else(|| {
            path.file_name()
                .map(|n| n.to_string_lossy().to_lowercase())
                .unwrap_or_default()
        });

    match ext.as_str() {
        "txt" | "md" | "csv" => match std::fs::read(path) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => format!("[error reading file: {}]", e),
        },
        "pdf" => match extract_pdf(path) {
            Ok(text) => text,
            Err(e) => format!("[error reading file: {}]", e),
        },
        _ => format!("[{} file uploaded] (content extraction not supported)", ext),
    }
}

fn extract_pdf(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    pdf_extract::extract_text_from_mem(&bytes).map_err(|e| anyhow::anyhow!("PDF extraction failed: {}", e))
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
