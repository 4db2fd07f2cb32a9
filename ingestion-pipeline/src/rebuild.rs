use common::{
    error::AppError,
    storage::{
        store::{
            CollectionMetadata, VectorStore, EMBEDDING_CONFIG_ID_KEY, EMBEDDING_MODEL_NAME_KEY,
        },
        types::document::Document,
    },
    utils::embedding::EmbeddingProvider,
};
use tracing::{debug, info, warn};

/// Drop and rebuild a collection with fresh embeddings.
///
/// The collection is deleted (idempotently), recreated with the supplied
/// fingerprint in its metadata, and all documents are ingested in batches
/// through the supplied embedder. On success the recorded fingerprint is
/// the one every document was embedded under. There is no
/// resume-from-batch: a failed rebuild must be rerun from the start.
pub async fn rebuild_collection(
    store: &dyn VectorStore,
    collection_name: &str,
    embedder: &EmbeddingProvider,
    config_id: &str,
    model_name: &str,
    documents: &[Document],
    batch_size: usize,
) -> Result<(), AppError> {
    if documents.is_empty() {
        warn!(
            collection = collection_name,
            "no documents to ingest; collection will be empty"
        );
    }

    store.delete_collection(collection_name).await?;

    info!(
        collection = collection_name,
        config_id, model = model_name, "creating collection"
    );
    let metadata = CollectionMetadata::from([
        (EMBEDDING_CONFIG_ID_KEY.to_string(), config_id.to_string()),
        (EMBEDDING_MODEL_NAME_KEY.to_string(), model_name.to_string()),
    ]);
    store.create_collection(collection_name, metadata).await?;

    let batch_size = batch_size.max(1);
    for (index, batch) in documents.chunks(batch_size).enumerate() {
        let start = index * batch_size;
        debug!(
            collection = collection_name,
            start,
            len = batch.len(),
            "ingesting batch"
        );
        store
            .add_batch(collection_name, embedder, batch)
            .await
            .map_err(|err| {
                AppError::Rebuild(format!(
                    "batch {start}..{} into collection '{collection_name}' failed: {err}; \
                     rerun the full rebuild",
                    start + batch.len()
                ))
            })?;
    }

    info!(
        collection = collection_name,
        count = documents.len(),
        "finished ingesting documents"
    );
    Ok(())
}
