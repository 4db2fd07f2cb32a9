use axum::{extract::State, Json};
use retrieval_pipeline::RetrievedDocument;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{api_state::ApiState, error::ApiError};

/// Upper bound on requested results; larger values are clamped, not
/// rejected.
const MAX_RESULTS: usize = 20;

#[derive(Deserialize, Debug)]
pub struct QueryRequest {
    pub question: String,
    #[serde(default = "default_k")]
    pub k: usize,
}

fn default_k() -> usize {
    3
}

#[derive(Serialize, Debug)]
pub struct QueryResponse {
    pub question: String,
    pub results: Vec<RetrievedDocument>,
}

/// Semantic search over the stored documentation.
///
/// Retrieval only; a generation layer can consume the snippets. Refuses
/// with 503 while drift is detected or the store is unreachable.
pub async fn query_docs(
    State(state): State<ApiState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    if request.question.trim().is_empty() {
        return Err(ApiError::ValidationError(
            "question must not be empty".to_string(),
        ));
    }
    let k = request.k.clamp(1, MAX_RESULTS);

    info!(k, "running semantic search for question");
    let results = state.service.query(&request.question, k).await?;

    Ok(Json(QueryResponse {
        question: request.question,
        results,
    }))
}
