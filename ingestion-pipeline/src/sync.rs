use common::{
    error::AppError,
    storage::{
        store::{CollectionLookup, VectorStore, EMBEDDING_CONFIG_ID_KEY},
        types::document::Document,
    },
    utils::embedding::{EmbeddingConfig, EmbeddingProvider},
};
use tracing::{info, warn};

use crate::rebuild::rebuild_collection;

/// What the sync pass decided to do with the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The stored fingerprint matched the current one; nothing was touched.
    AlreadyAligned,
    /// The collection was rebuilt with this many documents.
    Rebuilt(usize),
}

/// Bring the collection in line with the current embedding configuration.
///
/// A collection whose stored fingerprint matches the current one is left
/// untouched. A missing collection is created and populated. A mismatched
/// or unfingerprinted collection is rebuilt when `rebuild_on_mismatch`
/// allows it; otherwise the pass fails with `EmbeddingDrift` and the store
/// is not modified.
pub async fn sync_collection(
    store: &dyn VectorStore,
    collection_name: &str,
    embedder: &EmbeddingProvider,
    embedding_config: &EmbeddingConfig,
    documents: &[Document],
    rebuild_on_mismatch: bool,
    batch_size: usize,
) -> Result<SyncOutcome, AppError> {
    let current_id = embedding_config.config_id();

    match store.get_collection(collection_name).await? {
        CollectionLookup::Found(metadata) => match metadata.get(EMBEDDING_CONFIG_ID_KEY) {
            Some(stored_id) if *stored_id == current_id => {
                info!(
                    collection = collection_name,
                    config_id = %current_id,
                    "collection already has matching embeddings, skipping rebuild"
                );
                return Ok(SyncOutcome::AlreadyAligned);
            }
            stored_id => {
                warn!(
                    collection = collection_name,
                    stored_config_id = ?stored_id,
                    current_config_id = %current_id,
                    "embedding config mismatch"
                );
                if !rebuild_on_mismatch {
                    return Err(AppError::EmbeddingDrift(format!(
                        "collection '{collection_name}' was embedded under a different \
                         configuration and rebuild_on_mismatch is disabled; delete or \
                         rebuild the collection manually"
                    )));
                }
                info!(
                    collection = collection_name,
                    "rebuilding collection due to embedding drift"
                );
            }
        },
        CollectionLookup::NotFound => {
            info!(
                collection = collection_name,
                "collection does not exist; it will be created and populated"
            );
        }
    }

    rebuild_collection(
        store,
        collection_name,
        embedder,
        &current_id,
        &embedding_config.model_name,
        documents,
        batch_size,
    )
    .await?;

    Ok(SyncOutcome::Rebuilt(documents.len()))
}
