use axum::{extract::State, response::IntoResponse, Json};
use retrieval_pipeline::EmbeddingStatus;
use serde::Serialize;
use tracing::error;

use crate::api_state::ApiState;

#[derive(Serialize, Debug)]
pub struct HealthStatus {
    pub status: String,
    pub store_connected: bool,
    pub embedding_drift_detected: bool,
    pub details: EmbeddingStatus,
}

/// Health endpoint covering store connectivity and embedding drift.
///
/// Runs a reconciliation pass first so drift is surfaced as early as
/// possible; a connectivity failure degrades the report instead of
/// failing the request.
pub async fn health(State(state): State<ApiState>) -> impl IntoResponse {
    if let Err(err) = state.service.refresh_state().await {
        error!(error = %err, "health check: store connection error");
    }

    let snapshot = state.service.state();
    let store_ok = snapshot.connected && state.service.check_store_health().await;
    let status = if store_ok && !snapshot.drift_detected {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthStatus {
        status: status.to_string(),
        store_connected: store_ok,
        embedding_drift_detected: snapshot.drift_detected,
        details: state.service.embedding_status(),
    })
}
