//! Schema discovery and statement execution against a SQLite data source.
//!
//! [`SqliteDataSource`] implements the core [`DataSource`] seam. Every
//! connection it opens is read-only, so generated statements can never
//! modify the database they inspect.

use async_trait::async_trait;
use nlquery_core::catalog::{ColumnInfo, SchemaCatalog, TableInfo, SAMPLE_ROWS};
use nlquery_core::models::Row;
use nlquery_core::store::DataSource;
use nlquery_core::{Error, Result};
use serde_json::Value;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::{Column, Row as _, ValueRef};

use crate::config::Config;
use crate::db;

pub struct SqliteDataSource {
    descriptor: String,
    pool: SqlitePool,
}

impl SqliteDataSource {
    /// Open the database named by `descriptor`.
    pub async fn connect(descriptor: &str) -> Result<Self> {
        let pool = db::connect_source(descriptor).await?;
        Ok(Self {
            descriptor: descriptor.to_string(),
            pool,
        })
    }

    async fn table_names(&self) -> Result<Vec<String>> {
        sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::Introspection(e.to_string()))
    }

    async fn columns(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        let rows = sqlx::query(&format!("PRAGMA table_info({})", quote_ident(table)))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::Introspection(e.to_string()))?;

        rows.iter()
            .map(|row| {
                let name: String = row
                    .try_get("name")
                    .map_err(|e| Error::Introspection(e.to_string()))?;
                let declared: String = row.try_get("type").unwrap_or_default();
                Ok(ColumnInfo {
                    name,
                    type_label: if declared.is_empty() {
                        "NULL".to_string()
                    } else {
                        declared
                    },
                })
            })
            .collect()
    }

    async fn sample_rows(&self, table: &str) -> Vec<Row> {
        let sql = format!("SELECT * FROM {} LIMIT {}", quote_ident(table), SAMPLE_ROWS);
        match sqlx::query(&sql).fetch_all(&self.pool).await {
            Ok(rows) => rows.iter().map(row_to_map).collect(),
            Err(e) => {
                tracing::warn!(table, "could not sample rows: {}", e);
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl DataSource for SqliteDataSource {
    fn source_id(&self) -> &str {
        &self.descriptor
    }

    async fn inspect(&self) -> Result<SchemaCatalog> {
        let mut catalog = SchemaCatalog::new(&self.descriptor);
        for name in self.table_names().await? {
            let columns = self.columns(&name).await?;
            let sample_rows = self.sample_rows(&name).await;
            catalog.tables.insert(
                name,
                TableInfo {
                    columns,
                    sample_rows,
                },
            );
        }
        tracing::info!(
            source = %self.descriptor,
            tables = catalog.tables.len(),
            "inspected data source"
        );
        Ok(catalog)
    }

    async fn fetch_rows(&self, sql: &str) -> Result<Vec<Row>> {
        let rows = sqlx::query(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::Execution(e.to_string()))?;
        Ok(rows.iter().map(row_to_map).collect())
    }
}

/// Inspect `connection` (or the configured source) and print its catalog.
pub async fn run_schema(config: &Config, connection: Option<&str>) -> anyhow::Result<()> {
    let descriptor = connection.unwrap_or(&config.source.connection);
    let source = SqliteDataSource::connect(descriptor).await?;
    let catalog = source.inspect().await?;
    println!("{}", serde_json::to_string_pretty(&catalog)?);
    Ok(())
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Convert a result row to a JSON object keyed by column name.
///
/// SQLite values are dynamically typed, so each cell is decoded by its
/// storage class: integer, real, text, then blob (hex encoded).
pub fn row_to_map(row: &SqliteRow) -> Row {
    let mut map = Row::new();
    for (i, column) in row.columns().iter().enumerate() {
        map.insert(column.name().to_string(), cell_value(row, i));
    }
    map
}

fn cell_value(row: &SqliteRow, i: usize) -> Value {
    match row.try_get_raw(i) {
        Ok(raw) if !raw.is_null() => {}
        _ => return Value::Null,
    }
    if let Ok(v) = row.try_get::<i64, _>(i) {
        return Value::from(v);
    }
    if let Ok(v) = row.try_get::<f64, _>(i) {
        return Value::from(v);
    }
    if let Ok(v) = row.try_get::<String, _>(i) {
        return Value::String(v);
    }
    if let Ok(v) = row.try_get::<Vec<u8>, _>(i) {
        return Value::String(hex::encode(v));
    }
    Value::Null
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn fixture() -> (TempDir, String) {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("hr.db");
        let pool = db::connect_path(&path).await.unwrap();
        sqlx::query(
            "CREATE TABLE employees (id INTEGER PRIMARY KEY, name TEXT, department TEXT, salary REAL, badge BLOB)",
        )
        .execute(&pool)
        .await
        .unwrap();
        for (name, dept, salary) in [
            ("Ada", "Engineering", 120000.0),
            ("Grace", "Engineering", 95000.0),
            ("Linus", "Support", 60000.0),
            ("Ken", "Support", 70000.0),
        ] {
            sqlx::query("INSERT INTO employees (name, department, salary, badge) VALUES (?, ?, ?, x'0aff')")
                .bind(name)
                .bind(dept)
                .bind(salary)
                .execute(&pool)
                .await
                .unwrap();
        }
        sqlx::query("CREATE TABLE \"odd\"\"name\" (x)")
            .execute(&pool)
            .await
            .unwrap();
        pool.close().await;
        let descriptor = format!("sqlite:///{}", path.display());
        (tmp, descriptor)
    }

    #[tokio::test]
    async fn test_inspect_lists_tables_columns_and_samples() {
        let (_tmp, descriptor) = fixture().await;
        let source = SqliteDataSource::connect(&descriptor).await.unwrap();
        let catalog = source.inspect().await.unwrap();

        assert_eq!(catalog.source_id, descriptor);
        let names: Vec<&str> = catalog.tables.keys().map(|s| s.as_str()).collect();
        assert_eq!(names, vec!["employees", "odd\"name"]);

        let employees = catalog.table("employees").unwrap();
        let columns: Vec<(&str, &str)> = employees
            .columns
            .iter()
            .map(|c| (c.name.as_str(), c.type_label.as_str()))
            .collect();
        assert_eq!(
            columns,
            vec![
                ("id", "INTEGER"),
                ("name", "TEXT"),
                ("department", "TEXT"),
                ("salary", "REAL"),
                ("badge", "BLOB"),
            ]
        );
        assert_eq!(employees.sample_rows.len(), SAMPLE_ROWS);
        assert_eq!(employees.sample_rows[0]["name"], "Ada");
        assert_eq!(employees.sample_rows[0]["badge"], "0aff");

        let odd = catalog.table("odd\"name").unwrap();
        assert_eq!(odd.columns[0].type_label, "NULL");
        assert!(odd.sample_rows.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_rows_decodes_storage_classes() {
        let (_tmp, descriptor) = fixture().await;
        let source = SqliteDataSource::connect(&descriptor).await.unwrap();
        let rows = source
            .fetch_rows("SELECT COUNT(*) AS count, AVG(salary) AS avg_salary, NULL AS nothing FROM employees")
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["count"], 4);
        assert_eq!(rows[0]["avg_salary"], 86250.0);
        assert!(rows[0]["nothing"].is_null());
    }

    #[tokio::test]
    async fn test_fetch_rows_error_is_execution() {
        let (_tmp, descriptor) = fixture().await;
        let source = SqliteDataSource::connect(&descriptor).await.unwrap();
        let err = source.fetch_rows("SELECT * FROM missing").await.unwrap_err();
        assert!(matches!(err, Error::Execution(_)));
    }

    #[tokio::test]
    async fn test_source_is_read_only() {
        let (_tmp, descriptor) = fixture().await;
        let source = SqliteDataSource::connect(&descriptor).await.unwrap();
        let err = source
            .fetch_rows("DELETE FROM employees")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Execution(_)));
        let rows = source
            .fetch_rows("SELECT COUNT(*) AS count FROM employees")
            .await
            .unwrap();
        assert_eq!(rows[0]["count"], 4);
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("employees"), "\"employees\"");
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }
}
