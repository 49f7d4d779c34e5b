//! Similarity search over the document index.
//!
//! 1. Vectorize the question with the index's own vectorizer.
//! 2. Score every document row by cosine similarity.
//! 3. Keep the `top_k` best (descending, ties keep index order).
//! 4. Fetch each document by id and cut a snippet from its content.
//!
//! Retrieval never fails: with no usable index the result is empty, and a
//! document that cannot be scored or fetched is skipped.

use crate::index::DocumentIndex;
use crate::models::DocumentHit;
use crate::store::DocumentStore;
use crate::vectorizer::cosine_similarity;

/// Default number of characters kept from a document's content.
pub const SNIPPET_CHARS: usize = 400;

/// Retrieval tuning parameters.
#[derive(Debug, Clone, Copy)]
pub struct RetrieveParams {
    pub top_k: usize,
    pub snippet_chars: usize,
}

impl Default for RetrieveParams {
    fn default() -> Self {
        Self {
            top_k: 5,
            snippet_chars: SNIPPET_CHARS,
        }
    }
}

/// Return the documents most similar to `question`.
pub async fn search(
    question: &str,
    index: Option<&DocumentIndex>,
    store: &dyn DocumentStore,
    params: RetrieveParams,
) -> Vec<DocumentHit> {
    let Some(index) = index else {
        return Vec::new();
    };
    if let Err(e) = index.validate() {
        tracing::warn!("document index unusable, skipping retrieval: {}", e);
        return Vec::new();
    }

    let query = index.vectorizer.transform(question);
    let n_features = index.vectors.n_features;

    let mut scored: Vec<(usize, f32)> = index
        .vectors
        .rows
        .iter()
        .enumerate()
        .filter_map(|(i, row)| {
            if row.is_well_formed(n_features) {
                Some((i, cosine_similarity(&query, row)))
            } else {
                tracing::debug!(row = i, "skipping malformed document vector");
                None
            }
        })
        .collect();

    // Stable: equal scores keep their index order.
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(params.top_k);

    let mut hits = Vec::with_capacity(scored.len());
    for (row, score) in scored {
        let id = index.doc_ids[row];
        match store.get_document(id).await {
            Ok(Some(doc)) => hits.push(DocumentHit {
                id: doc.id,
                filename: doc.filename,
                snippet: doc.content.chars().take(params.snippet_chars).collect(),
                score: score as f64,
            }),
            Ok(None) => tracing::debug!(id, "indexed document missing from store"),
            Err(e) => tracing::warn!(id, "document lookup failed: {}", e),
        }
    }
    hits
}
