//! Schema catalog: the structured description of a data source.
//!
//! A [`SchemaCatalog`] is produced by [`DataSource::inspect`](crate::store::DataSource::inspect)
//! and read by the translator. Tables iterate in name order; columns keep
//! their declaration order, which the list intent depends on.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::models::Row;

/// Maximum number of sample rows recorded per table.
pub const SAMPLE_ROWS: usize = 3;

/// A column name with its declared type label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub type_label: String,
}

/// Columns and sample content of one table.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TableInfo {
    pub columns: Vec<ColumnInfo>,
    /// Up to [`SAMPLE_ROWS`] rows; empty when sampling failed.
    pub sample_rows: Vec<Row>,
}

impl TableInfo {
    /// First column whose lower-cased name contains any of `needles`.
    pub fn find_column(&self, needles: &[&str]) -> Option<&str> {
        self.columns
            .iter()
            .find(|c| {
                let low = c.name.to_lowercase();
                needles.iter().any(|n| low.contains(n))
            })
            .map(|c| c.name.as_str())
    }
}

/// Description of every table in a data source.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SchemaCatalog {
    /// Connection descriptor the catalog was inspected from.
    pub source_id: String,
    pub tables: BTreeMap<String, TableInfo>,
}

impl SchemaCatalog {
    pub fn new(source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            tables: BTreeMap::new(),
        }
    }

    /// Builder-style helper for assembling catalogs by hand.
    pub fn with_table(mut self, name: &str, columns: &[(&str, &str)]) -> Self {
        let columns = columns
            .iter()
            .map(|(n, t)| ColumnInfo {
                name: n.to_string(),
                type_label: t.to_string(),
            })
            .collect();
        self.tables.insert(
            name.to_string(),
            TableInfo {
                columns,
                sample_rows: Vec::new(),
            },
        );
        self
    }

    pub fn table(&self, name: &str) -> Option<&TableInfo> {
        self.tables.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Holds the most recent successfully inspected catalog.
///
/// Readers take an `Arc` snapshot; [`replace`](CatalogHandle::replace) swaps
/// the whole catalog, so a reader never sees a mix of two inspections.
#[derive(Debug, Default)]
pub struct CatalogHandle {
    current: RwLock<Arc<SchemaCatalog>>,
}

impl CatalogHandle {
    pub fn new(catalog: SchemaCatalog) -> Self {
        Self {
            current: RwLock::new(Arc::new(catalog)),
        }
    }

    pub fn snapshot(&self) -> Arc<SchemaCatalog> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn replace(&self, catalog: SchemaCatalog) -> Arc<SchemaCatalog> {
        let next = Arc::new(catalog);
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = next.clone();
        next
    }
}
