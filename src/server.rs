//! HTTP API server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/query` | Answer a question (`{query, connection_string?}`) |
//! | `GET`  | `/api/query/history` | Every cached question, normalized |
//! | `GET`  | `/api/schema` | Last inspected schema catalog, or `{}` |
//! | `POST` | `/api/ingest/database` | Inspect a data source (`{connection_string}`) |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! A question that fails while being answered is not an HTTP error: it
//! comes back as a normal answer with `query_type: "error"`.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use nlquery_core::catalog::SchemaCatalog;
use nlquery_core::models::AnswerRecord;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::engines::Engines;

/// Starts the HTTP server on `[server].bind` and runs until terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let engines = Arc::new(Engines::open(config).await?);
    if !engines.has_index() {
        tracing::warn!("no document index loaded; document answers will be empty");
    }

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!("listening on http://{}", config.server.bind);
    axum::serve(listener, router(engines)).await?;

    Ok(())
}

/// Build the application router over a shared engine registry.
pub fn router(engines: Arc<Engines>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/query", post(handle_query))
        .route("/api/query/history", get(handle_history))
        .route("/api/schema", get(handle_schema))
        .route("/api/ingest/database", post(handle_ingest_database))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(engines)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /api/query ============

#[derive(Deserialize)]
struct QueryRequest {
    query: String,
    #[serde(default)]
    connection_string: Option<String>,
}

async fn handle_query(
    State(engines): State<Arc<Engines>>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<AnswerRecord>, AppError> {
    if req.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }

    let answer = engines
        .answer(&req.query, req.connection_string.as_deref())
        .await;
    tracing::info!(
        query_type = ?answer.query_type,
        cache_hit = answer.cache_hit,
        time_ms = answer.time_ms,
        "answered query"
    );
    Ok(Json(answer))
}

// ============ GET /api/query/history ============

#[derive(Serialize)]
struct HistoryResponse {
    history: Vec<String>,
}

async fn handle_history(State(engines): State<Arc<Engines>>) -> Json<HistoryResponse> {
    Json(HistoryResponse {
        history: engines.cached_questions().into_iter().collect(),
    })
}

// ============ GET /api/schema ============

async fn handle_schema(State(engines): State<Arc<Engines>>) -> Json<serde_json::Value> {
    let schema = engines
        .current_schema()
        .and_then(|catalog| serde_json::to_value(catalog.as_ref()).ok())
        .unwrap_or_else(|| serde_json::json!({}));
    Json(schema)
}

// ============ POST /api/ingest/database ============

#[derive(Deserialize)]
struct IngestDatabaseRequest {
    connection_string: String,
}

#[derive(Serialize)]
struct IngestDatabaseResponse {
    ok: bool,
    schema: SchemaCatalog,
}

async fn handle_ingest_database(
    State(engines): State<Arc<Engines>>,
    Json(req): Json<IngestDatabaseRequest>,
) -> Result<Json<IngestDatabaseResponse>, AppError> {
    if req.connection_string.trim().is_empty() {
        return Err(bad_request("connection_string must not be empty"));
    }

    let catalog = engines
        .inspect_schema(&req.connection_string)
        .await
        .map_err(|e| bad_request(e.to_string()))?;

    Ok(Json(IngestDatabaseResponse {
        ok: true,
        schema: catalog.as_ref().clone(),
    }))
}
