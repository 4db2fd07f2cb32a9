use std::sync::Arc;

use api_router::{api_routes, api_state::ApiState};
use axum::Router;
use common::{
    storage::store::vector_store_from_config,
    utils::{
        config::get_config,
        embedding::{EmbeddingConfig, EmbeddingProvider},
    },
};
use retrieval_pipeline::RetrievalService;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set up tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    // Get config
    let config = get_config()?;

    let store = vector_store_from_config(&config)?;

    let embedding_config = EmbeddingConfig::from_settings(&config);
    let embedder = Arc::new(EmbeddingProvider::from_config(&embedding_config).await?);
    info!(
        model = %embedding_config.model_name,
        config_id = %embedding_config.config_id(),
        "embedding provider initialized"
    );

    let service = Arc::new(RetrievalService::new(
        store,
        embedder,
        config.collection_name.clone(),
        embedding_config,
    ));

    // Warm up the connection and detect embedding drift as early as possible.
    if let Err(err) = service.refresh_state().await {
        warn!(
            error = %err,
            "vector store is not reachable at startup; health endpoint will report this until it recovers"
        );
    }

    let app = Router::new()
        .merge(api_routes::<ApiState>())
        .with_state(ApiState::new(service));

    info!("Starting server listening on 0.0.0.0:{}", config.http_port);
    let serve_address = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(serve_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
