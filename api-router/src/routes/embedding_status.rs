use axum::{extract::State, Json};
use retrieval_pipeline::EmbeddingStatus;

use crate::{api_state::ApiState, error::ApiError};

/// Current embedding configuration and drift status, for observability.
pub async fn embedding_status(
    State(state): State<ApiState>,
) -> Result<Json<EmbeddingStatus>, ApiError> {
    state.service.refresh_state().await?;
    Ok(Json(state.service.embedding_status()))
}
