//! Error types for nlquery.

use thiserror::Error;

/// Failures surfaced by a [`DataSource`](crate::store::DataSource).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The connection descriptor could not be opened.
    #[error("connection error: {0}")]
    Connection(String),

    /// Schema metadata could not be read.
    #[error("introspection error: {0}")]
    Introspection(String),

    /// A generated statement failed at runtime.
    #[error("execution error: {0}")]
    Execution(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Reasons a document index cannot be used for retrieval.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IndexError {
    #[error("index artifact missing: {0}")]
    Missing(String),

    #[error("index artifact unreadable: {0}")]
    Corrupt(String),

    #[error("index has {doc_ids} document ids but {rows} vector rows")]
    Inconsistent { doc_ids: usize, rows: usize },
}
