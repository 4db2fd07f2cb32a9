use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;

use crate::api_state::ApiState;

/// Direct connectivity probe against the vector store.
pub async fn store_health(State(state): State<ApiState>) -> impl IntoResponse {
    let healthy = state.service.check_store_health().await;
    Json(json!({ "store_healthy": healthy }))
}
