//! # nlquery
//!
//! Answer natural-language questions over a SQL database and a collection
//! of ingested documents.
//!
//! A question is routed one of three ways: document-shaped questions go to
//! TF-IDF similarity search, questions matching a known shape (count,
//! average, list) are translated into a `SELECT` and run against the data
//! source, and everything else falls back to document search. Answers are
//! cached per data source by normalized question.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌──────────────┐
//! │  Ingestion  │──▶│ documents +  │──▶│ TF-IDF index │
//! │ txt/md/pdf  │   │   SQLite     │   │    (JSON)    │
//! └─────────────┘   └──────────────┘   └──────┬───────┘
//!                                             │
//!     ┌──────────────┐    ┌───────────────────▼──┐
//!     │ data source  │◀──▶│  Engines (per source) │
//!     │ (read-only)  │    │ catalog, cache, route │
//!     └──────────────┘    └──────────┬───────────┘
//!                             ┌──────┴──────┐
//!                             ▼             ▼
//!                        ┌────────┐    ┌────────┐
//!                        │  CLI   │    │  HTTP  │
//!                        │ (nlq)  │    │ (axum) │
//!                        └────────┘    └────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! nlq init                              # create the documents table
//! nlq ingest ./resumes                  # store files and build the index
//! nlq schema                            # show the data source catalog
//! nlq ask "average salary by department"
//! nlq serve                             # start the HTTP API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Connection descriptors and SQLite pools |
//! | [`migrate`] | Document store schema |
//! | [`schema`] | Schema discovery over a SQLite data source |
//! | [`sqlite_store`] | SQLite document store |
//! | [`index_io`] | Index artifact reading and writing |
//! | [`ingest`] | File ingestion and index rebuild |
//! | [`engines`] | Per-source query engines |
//! | [`server`] | HTTP API |
//!
//! Routing, translation, retrieval and caching live in `nlquery-core`.

pub mod config;
pub mod db;
pub mod engines;
pub mod index_io;
pub mod ingest;
pub mod migrate;
pub mod schema;
pub mod server;
pub mod sqlite_store;
