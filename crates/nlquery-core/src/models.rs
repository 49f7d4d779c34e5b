//! Core data models used throughout nlquery.
//!
//! These types represent the documents read by the retriever and the
//! answers produced by the router.

use serde::{Deserialize, Serialize};

/// A single result row, keyed by column name.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// A document stored by the ingestion pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: i64,
    pub filename: String,
    pub content: String,
}

/// A ranked document returned by the retriever.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentHit {
    pub id: i64,
    pub filename: String,
    /// Leading characters of the document content.
    pub snippet: String,
    /// Cosine similarity between the question and the document.
    pub score: f64,
}

/// How a question was answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    Document,
    Sql,
    FallbackDocument,
    Error,
}

/// Where the results of an answer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sources {
    Documents,
    Database,
}

/// The structured answer to one question.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnswerRecord {
    pub query_type: QueryType,
    pub results: Vec<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<Sources>,
    pub time_ms: u64,
    pub cache_hit: bool,
}

impl AnswerRecord {
    /// Answer backed by document search.
    pub fn documents(query_type: QueryType, hits: &[DocumentHit]) -> Self {
        let results = hits
            .iter()
            .filter_map(|h| serde_json::to_value(h).ok())
            .collect();
        Self {
            query_type,
            results,
            sql: None,
            error: None,
            sources: Some(Sources::Documents),
            time_ms: 0,
            cache_hit: false,
        }
    }

    /// Answer backed by rows of an executed statement.
    pub fn rows(sql: String, rows: Vec<Row>) -> Self {
        Self {
            query_type: QueryType::Sql,
            results: rows.into_iter().map(serde_json::Value::Object).collect(),
            sql: Some(sql),
            error: None,
            sources: Some(Sources::Database),
            time_ms: 0,
            cache_hit: false,
        }
    }

    /// Answer describing a failed execution.
    pub fn failed(message: String) -> Self {
        Self {
            query_type: QueryType::Error,
            results: Vec::new(),
            sql: None,
            error: Some(message),
            sources: None,
            time_ms: 0,
            cache_hit: false,
        }
    }
}
