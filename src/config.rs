use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub source: SourceConfig,
    #[serde(default)]
    pub documents: DocumentsConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

/// The relational database questions are answered from.
#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    /// Connection descriptor, e.g. `sqlite:///./data/sample.db`.
    pub connection: String,
    /// Maximum data sources with an open engine; `0` disables eviction.
    #[serde(default = "default_max_engines")]
    pub max_engines: usize,
}

fn default_max_engines() -> usize {
    crate::engines::DEFAULT_MAX_ENGINES
}

/// The SQLite database holding ingested documents.
#[derive(Debug, Deserialize, Clone)]
pub struct DocumentsConfig {
    #[serde(default = "default_documents_path")]
    pub path: PathBuf,
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            path: default_documents_path(),
        }
    }
}

fn default_documents_path() -> PathBuf {
    PathBuf::from("./data/sample.db")
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_index_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_max_features")]
    pub max_features: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            dir: default_index_dir(),
            max_features: default_max_features(),
        }
    }
}

fn default_index_dir() -> PathBuf {
    PathBuf::from("./data/index")
}
fn default_max_features() -> usize {
    2000
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_snippet_chars")]
    pub snippet_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            snippet_chars: default_snippet_chars(),
        }
    }
}

fn default_top_k() -> usize {
    5
}
fn default_snippet_chars() -> usize {
    nlquery_core::retrieve::SNIPPET_CHARS
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    /// Maximum cached answers per data source; `0` disables eviction.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
        }
    }
}

fn default_capacity() -> usize {
    nlquery_core::cache::DEFAULT_CAPACITY
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
        }
    }
}

fn default_include_globs() -> Vec<String> {
    vec![
        "**/*.txt".to_string(),
        "**/*.md".to_string(),
        "**/*.csv".to_string(),
        "**/*.pdf".to_string(),
    ]
}

impl Config {
    /// Engine options derived from the retrieval and cache sections.
    pub fn engine_options(&self) -> nlquery_core::EngineOptions {
        nlquery_core::EngineOptions {
            retrieve: nlquery_core::retrieve::RetrieveParams {
                top_k: self.retrieval.top_k,
                snippet_chars: self.retrieval.snippet_chars,
            },
            cache_capacity: self.cache.capacity,
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.source.connection.trim().is_empty() {
        anyhow::bail!("source.connection must not be empty");
    }

    if config.retrieval.top_k < 1 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }

    if config.retrieval.snippet_chars < 1 {
        anyhow::bail!("retrieval.snippet_chars must be >= 1");
    }

    if config.index.max_features == 0 {
        anyhow::bail!("index.max_features must be > 0");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_src: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_src)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = parse(
            r#"
[source]
connection = "sqlite:///./data/hr.db"
"#,
        )
        .unwrap();
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.retrieval.snippet_chars, 400);
        assert_eq!(config.index.max_features, 2000);
        assert_eq!(config.cache.capacity, 1024);
        assert_eq!(config.source.max_engines, 16);
        assert_eq!(config.server.bind, "127.0.0.1:8000");
        assert_eq!(config.ingest.include_globs.len(), 4);
    }

    #[test]
    fn test_missing_source_is_rejected() {
        assert!(parse("[retrieval]\ntop_k = 3\n").is_err());
    }

    #[test]
    fn test_zero_top_k_is_rejected() {
        let err = parse(
            r#"
[source]
connection = "sqlite:///x.db"
[retrieval]
top_k = 0
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("top_k"));
    }

    #[test]
    fn test_engine_options() {
        let config = parse(
            r#"
[source]
connection = "sqlite:///x.db"
[retrieval]
top_k = 2
[cache]
capacity = 0
"#,
        )
        .unwrap();
        let options = config.engine_options();
        assert_eq!(options.retrieve.top_k, 2);
        assert_eq!(options.cache_capacity, 0);
    }
}
