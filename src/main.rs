//! # nlquery CLI (`nlq`)
//!
//! ## Usage
//!
//! ```bash
//! nlq --config ./config/nlq.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `nlq init` | Create the document store database |
//! | `nlq ingest <paths...>` | Store files as documents and rebuild the index |
//! | `nlq schema` | Print the schema catalog of a data source |
//! | `nlq ask "<question>"` | Answer a question and print the answer |
//! | `nlq serve` | Start the HTTP API server |
//!
//! Logs go to stderr and are filtered by `RUST_LOG` (default `info`);
//! command output on stdout is JSON.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use nlquery::{config, engines, ingest, migrate, schema, server};

/// nlquery CLI: answer natural-language questions over a SQL database and
/// a document collection.
#[derive(Parser)]
#[command(
    name = "nlq",
    about = "Answer natural-language questions over a SQL database and a document collection",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/nlq.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the document store.
    ///
    /// Creates the SQLite database file and the `documents` table.
    /// Running it again is safe.
    Init,

    /// Store files as documents and rebuild the document index.
    ///
    /// Directories are walked and filtered by the `[ingest]` globs.
    Ingest {
        /// Files or directories to ingest.
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Print the schema catalog of a data source as JSON.
    Schema {
        /// Connection descriptor; defaults to `[source].connection`.
        #[arg(long)]
        connection: Option<String>,
    },

    /// Answer a question and print the answer as JSON.
    Ask {
        /// The natural-language question.
        question: String,

        /// Connection descriptor; defaults to `[source].connection`.
        #[arg(long)]
        connection: Option<String>,
    },

    /// Start the HTTP API server on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest { paths } => {
            let summary = ingest::run_ingest(&cfg, &paths).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::Schema { connection } => {
            schema::run_schema(&cfg, connection.as_deref()).await?;
        }
        Commands::Ask {
            question,
            connection,
        } => {
            engines::run_ask(&cfg, &question, connection.as_deref()).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
