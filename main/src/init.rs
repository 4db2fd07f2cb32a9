use std::{path::Path, process::ExitCode};

use common::{
    storage::store::vector_store_from_config,
    utils::{
        config::get_config,
        embedding::{EmbeddingConfig, EmbeddingProvider},
    },
};
use ingestion_pipeline::{
    loader::load_documents,
    sync::{sync_collection, SyncOutcome},
};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// One-shot initialization job: load the document tree and bring the
/// collection in line with the current embedding configuration.
#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "initialization failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = get_config()?;
    info!("starting initialization job");

    let embedding_config = EmbeddingConfig::from_settings(&config);
    info!(
        model = %embedding_config.model_name,
        config_id = %embedding_config.config_id(),
        "using embedding configuration"
    );

    let store = vector_store_from_config(&config)?;
    let embedder = EmbeddingProvider::from_config(&embedding_config).await?;

    let documents = load_documents(Path::new(&config.docs_dir));
    if documents.is_empty() {
        warn!(
            docs_dir = %config.docs_dir,
            "no documents found; initialization will complete, but queries will return no results"
        );
    }

    let outcome = sync_collection(
        store.as_ref(),
        &config.collection_name,
        &embedder,
        &embedding_config,
        &documents,
        config.rebuild_on_mismatch,
        config.ingest_batch_size,
    )
    .await?;

    match outcome {
        SyncOutcome::AlreadyAligned => info!("collection already aligned; nothing to do"),
        SyncOutcome::Rebuilt(count) => info!(count, "initialization complete"),
    }
    Ok(())
}
