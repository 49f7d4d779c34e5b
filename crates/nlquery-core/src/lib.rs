//! # nlquery Core
//!
//! The query routing and answering engine: schema catalog, heuristic SQL
//! translation, TF-IDF document retrieval, the answer cache and the router
//! that ties them together.
//!
//! This crate contains no sqlx, filesystem I/O or HTTP. Data sources and
//! document stores are reached through the traits in [`store`].

pub mod cache;
pub mod catalog;
pub mod engine;
pub mod error;
pub mod index;
pub mod models;
pub mod retrieve;
pub mod store;
pub mod translate;
pub mod vectorizer;

pub use engine::{EngineOptions, QueryEngine};
pub use error::{Error, IndexError, Result};
