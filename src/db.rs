//! SQLite connection helpers.
//!
//! Two kinds of database are opened here: the document store (read-write,
//! created on demand) and data sources named by a connection descriptor
//! (read-only, must already exist).

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::config::Config;

/// Resolve a connection descriptor to a SQLite database file.
///
/// Accepted forms: `sqlite:///relative.db`, `sqlite:////absolute.db`,
/// `sqlite://path.db` and `sqlite:path.db`. Any other scheme is rejected.
pub fn sqlite_path(descriptor: &str) -> nlquery_core::Result<PathBuf> {
    let descriptor = descriptor.trim();
    let rest = descriptor.strip_prefix("sqlite:").ok_or_else(|| {
        let scheme = descriptor.split(':').next().unwrap_or_default();
        nlquery_core::Error::Connection(format!("unsupported dialect: {}", scheme))
    })?;

    // `sqlite:///x` keeps one slash as the relative marker; `sqlite:////x`
    // leaves an absolute path.
    let path = match rest.strip_prefix("//") {
        Some(after) => after.strip_prefix('/').unwrap_or(after),
        None => rest,
    };

    if path.is_empty() || path == ":memory:" {
        return Err(nlquery_core::Error::Connection(format!(
            "connection descriptor names no database file: {}",
            descriptor
        )));
    }

    Ok(PathBuf::from(path))
}

/// The canonical path of the existing database file named by `descriptor`.
///
/// Different spellings of the same file (`./hr.db`, `a/../hr.db`, symlinks)
/// resolve to one path.
pub fn source_key(descriptor: &str) -> nlquery_core::Result<PathBuf> {
    let path = sqlite_path(descriptor)?;
    std::fs::canonicalize(&path).map_err(|e| {
        nlquery_core::Error::Connection(format!(
            "database file does not exist: {} ({})",
            path.display(),
            e
        ))
    })
}

/// Open a read-only pool over an existing database named by `descriptor`.
pub async fn connect_source(descriptor: &str) -> nlquery_core::Result<SqlitePool> {
    let path = sqlite_path(descriptor)?;
    if !path.exists() {
        return Err(nlquery_core::Error::Connection(format!(
            "database file does not exist: {}",
            path.display()
        )));
    }

    let options = SqliteConnectOptions::new()
        .filename(&path)
        .read_only(true)
        .create_if_missing(false);

    SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .map_err(|e| nlquery_core::Error::Connection(e.to_string()))
}

/// Open the document store database, creating it if needed.
pub async fn connect(config: &Config) -> Result<SqlitePool> {
    connect_path(&config.documents.path).await
}

pub async fn connect_path(db_path: &Path) -> Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // No WAL: data sources may open this same file read-only.
    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_descriptor() {
        assert_eq!(
            sqlite_path("sqlite:///./data/sample.db").unwrap(),
            PathBuf::from("./data/sample.db")
        );
        assert_eq!(
            sqlite_path("sqlite:///hr.db").unwrap(),
            PathBuf::from("hr.db")
        );
    }

    #[test]
    fn test_absolute_descriptor() {
        assert_eq!(
            sqlite_path("sqlite:////tmp/hr.db").unwrap(),
            PathBuf::from("/tmp/hr.db")
        );
    }

    #[test]
    fn test_short_descriptor_forms() {
        assert_eq!(sqlite_path("sqlite:hr.db").unwrap(), PathBuf::from("hr.db"));
        assert_eq!(sqlite_path("sqlite://hr.db").unwrap(), PathBuf::from("hr.db"));
    }

    #[test]
    fn test_unsupported_dialect() {
        let err = sqlite_path("postgresql://localhost/hr").unwrap_err();
        assert_eq!(
            err,
            nlquery_core::Error::Connection("unsupported dialect: postgresql".to_string())
        );
    }

    #[test]
    fn test_empty_path_rejected() {
        assert!(sqlite_path("sqlite:///").is_err());
        assert!(sqlite_path("sqlite::memory:").is_err());
    }

    #[test]
    fn test_source_key_merges_spellings() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("sub")).unwrap();
        std::fs::write(tmp.path().join("hr.db"), b"").unwrap();

        let plain = source_key(&format!("sqlite:///{}/hr.db", tmp.path().display())).unwrap();
        let dotted = source_key(&format!("sqlite:///{}/./sub/../hr.db", tmp.path().display())).unwrap();
        assert_eq!(plain, dotted);
        assert!(plain.is_absolute());

        assert!(matches!(
            source_key("sqlite:////nonexistent/dir/none.db"),
            Err(nlquery_core::Error::Connection(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_source_file() {
        let err = connect_source("sqlite:////nonexistent/dir/none.db")
            .await
            .unwrap_err();
        assert!(matches!(err, nlquery_core::Error::Connection(_)));
    }
}
