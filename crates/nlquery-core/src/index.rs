//! The document index consumed by the retriever.
//!
//! An index is three aligned parts: the fitted vectorizer, one vector per
//! document, and the id of each document in the same order. It is built by
//! ingestion and treated as immutable once loaded.

use serde::{Deserialize, Serialize};

use crate::error::IndexError;
use crate::vectorizer::{SparseVector, TfidfVectorizer};

/// Document vectors, one row per indexed document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VectorMatrix {
    pub n_features: usize,
    pub rows: Vec<SparseVector>,
}

impl VectorMatrix {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentIndex {
    pub vectorizer: TfidfVectorizer,
    pub vectors: VectorMatrix,
    /// Parallel to `vectors.rows`.
    pub doc_ids: Vec<i64>,
}

impl DocumentIndex {
    /// Assemble an index, rejecting parts that do not line up.
    pub fn new(
        vectorizer: TfidfVectorizer,
        vectors: VectorMatrix,
        doc_ids: Vec<i64>,
    ) -> Result<Self, IndexError> {
        let index = Self {
            vectorizer,
            vectors,
            doc_ids,
        };
        index.validate()?;
        Ok(index)
    }

    /// Fit a fresh index over `(id, content)` pairs.
    pub fn build(documents: &[(i64, String)], max_features: usize) -> Self {
        let contents: Vec<&str> = documents.iter().map(|(_, c)| c.as_str()).collect();
        let (vectorizer, rows) = TfidfVectorizer::fit(&contents, max_features);
        Self {
            vectors: VectorMatrix {
                n_features: vectorizer.n_features(),
                rows,
            },
            vectorizer,
            doc_ids: documents.iter().map(|(id, _)| *id).collect(),
        }
    }

    pub fn validate(&self) -> Result<(), IndexError> {
        if self.doc_ids.len() != self.vectors.row_count() {
            return Err(IndexError::Inconsistent {
                doc_ids: self.doc_ids.len(),
                rows: self.vectors.row_count(),
            });
        }
        Ok(())
    }

    pub fn is_consistent(&self) -> bool {
        self.validate().is_ok()
    }

    pub fn len(&self) -> usize {
        self.doc_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doc_ids.is_empty()
    }
}
