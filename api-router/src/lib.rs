use api_state::ApiState;
use axum::{
    extract::FromRef,
    routing::{get, post},
    Router,
};
use routes::{
    embedding_status::embedding_status, health::health, query::query_docs,
    store_health::store_health,
};

pub mod api_state;
pub mod error;
mod routes;

/// Router for the retrieval API.
pub fn api_routes<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    ApiState: FromRef<S>,
{
    Router::new()
        .route("/health", get(health))
        .route("/store-health", get(store_health))
        .route("/admin/embedding-status", get(embedding_status))
        .route("/query", post(query_docs))
}
