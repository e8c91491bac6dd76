//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::Serialize;

/// Static facts about the running worker.
#[derive(Debug, Clone, Serialize)]
pub struct WorkerInfo {
    /// Event store backend, `postgres` or `memory`.
    pub backend: &'static str,
    /// Origins with a registered processor.
    pub origins: Vec<String>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    #[serde(flatten)]
    pub worker: WorkerInfo,
}

/// GET /health — returns worker health status.
pub async fn check(State(info): State<Arc<WorkerInfo>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        worker: info.as_ref().clone(),
    })
}
