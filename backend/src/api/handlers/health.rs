//! Liveness and readiness probes.

use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};

use crate::api::SharedState;
use crate::error::{AppError, Result};

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(health))
        .route("/ready", get(ready))
}

/// GET /health
pub async fn health() -> Json<Value> {
    Json(json!({
        "name": "radius-console",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "ok",
    }))
}

/// GET /health/ready - verifies database connectivity
pub async fn ready(State(state): State<SharedState>) -> Result<Json<Value>> {
    sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(&state.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    Ok(Json(json!({ "status": "ready" })))
}
