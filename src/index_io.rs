//! Reading and writing the document index artifact.
//!
//! An index directory holds three JSON files written together:
//!
//! | File | Content |
//! |------|---------|
//! | `vectorizer.json` | Fitted TF-IDF vocabulary and idf weights |
//! | `vectors.json` | Sparse document vectors |
//! | `doc_ids.json` | Document id of each vector row |

use anyhow::{Context, Result};
use nlquery_core::index::{DocumentIndex, VectorMatrix};
use nlquery_core::vectorizer::TfidfVectorizer;
use nlquery_core::IndexError;
use serde::de::DeserializeOwned;
use std::path::Path;

pub const VECTORIZER_FILE: &str = "vectorizer.json";
pub const VECTORS_FILE: &str = "vectors.json";
pub const DOC_IDS_FILE: &str = "doc_ids.json";

/// Load the index in `dir`, or `None` if it is absent or unusable.
pub fn load_index(dir: &Path) -> Option<DocumentIndex> {
    match read_index(dir) {
        Ok(index) => {
            tracing::info!(documents = index.len(), dir = %dir.display(), "loaded document index");
            Some(index)
        }
        Err(IndexError::Missing(path)) => {
            tracing::info!("no document index at {}", path);
            None
        }
        Err(e) => {
            tracing::warn!("ignoring document index in {}: {}", dir.display(), e);
            None
        }
    }
}

pub fn read_index(dir: &Path) -> std::result::Result<DocumentIndex, IndexError> {
    let vectorizer: TfidfVectorizer = read_part(dir, VECTORIZER_FILE)?;
    let vectors: VectorMatrix = read_part(dir, VECTORS_FILE)?;
    let doc_ids: Vec<i64> = read_part(dir, DOC_IDS_FILE)?;
    DocumentIndex::new(vectorizer, vectors, doc_ids)
}

fn read_part<T: DeserializeOwned>(dir: &Path, name: &str) -> std::result::Result<T, IndexError> {
    let path = dir.join(name);
    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(IndexError::Missing(path.display().to_string()))
        }
        Err(e) => return Err(IndexError::Corrupt(format!("{}: {}", path.display(), e))),
    };
    serde_json::from_str(&content)
        .map_err(|e| IndexError::Corrupt(format!("{}: {}", path.display(), e)))
}

/// Write all three parts of `index` into `dir`.
pub fn save_index(dir: &Path, index: &DocumentIndex) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create index directory: {}", dir.display()))?;

    write_part(dir, VECTORIZER_FILE, &index.vectorizer)?;
    write_part(dir, VECTORS_FILE, &index.vectors)?;
    write_part(dir, DOC_IDS_FILE, &index.doc_ids)?;
    Ok(())
}

fn write_part<T: serde::Serialize>(dir: &Path, name: &str, value: &T) -> Result<()> {
    let path = dir.join(name);
    let json = serde_json::to_string(value)?;
    std::fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))
}
