use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    error::AppError,
    storage::types::document::Document,
    utils::{
        config::{AppConfig, StoreKind},
        embedding::EmbeddingProvider,
    },
};

/// Collection metadata key holding the embedding config fingerprint. The
/// sole drift-comparison key.
pub const EMBEDDING_CONFIG_ID_KEY: &str = "embedding_config_id";

/// Collection metadata key holding the human-readable model name. For
/// diagnostics only, never compared.
pub const EMBEDDING_MODEL_NAME_KEY: &str = "embedding_model_name";

pub type CollectionMetadata = HashMap<String, String>;

/// Outcome of a collection lookup. "Not found" is an expected state on a
/// fresh deployment, so it is a variant here rather than an error;
/// connectivity problems surface as `Err(AppError::StoreConnection)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionLookup {
    Found(CollectionMetadata),
    NotFound,
}

/// One nearest-neighbour hit from a similarity query. Distances are
/// store-native (smaller is closer); score presentation is left to callers.
#[derive(Debug, Clone)]
pub struct QueryHit {
    pub id: String,
    pub distance: f32,
    pub metadata: HashMap<String, String>,
    pub content: String,
}

/// The vector-store collaborator. The embedding function is supplied by
/// the caller per operation; callers never handle raw vectors themselves.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn get_collection(&self, name: &str) -> Result<CollectionLookup, AppError>;

    /// Create a fresh collection tagged with the given metadata.
    async fn create_collection(
        &self,
        name: &str,
        metadata: CollectionMetadata,
    ) -> Result<(), AppError>;

    /// Delete a collection. Deleting a collection that does not exist is
    /// not an error.
    async fn delete_collection(&self, name: &str) -> Result<(), AppError>;

    /// Embed and store one batch of documents in the named collection.
    async fn add_batch(
        &self,
        name: &str,
        embedder: &EmbeddingProvider,
        documents: &[Document],
    ) -> Result<(), AppError>;

    /// Similarity search for the `k` nearest documents to `text`.
    async fn query(
        &self,
        name: &str,
        embedder: &EmbeddingProvider,
        text: &str,
        k: usize,
    ) -> Result<Vec<QueryHit>, AppError>;
}

/// Select the vector-store implementation from configuration.
pub fn vector_store_from_config(config: &AppConfig) -> Result<Arc<dyn VectorStore>, AppError> {
    match config.store_kind {
        StoreKind::Http => Ok(Arc::new(crate::storage::http::HttpVectorStore::new(
            &config.store_address,
        )?)),
        StoreKind::Memory => Ok(Arc::new(crate::storage::memory::MemoryVectorStore::new())),
    }
}
