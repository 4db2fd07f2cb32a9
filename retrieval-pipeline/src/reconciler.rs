use std::sync::{Arc, PoisonError, RwLock};

use common::{
    error::AppError,
    storage::store::{CollectionLookup, VectorStore, EMBEDDING_CONFIG_ID_KEY},
    utils::embedding::{EmbeddingConfig, EmbeddingProvider},
};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::{distance_to_score, RetrievedDocument};

/// In-memory readiness state of the serving process. Recomputed from
/// scratch on every reconciliation pass and swapped in as a whole record,
/// so readers never observe a partially updated state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationState {
    pub connected: bool,
    pub collection_present: bool,
    pub drift_detected: bool,
    pub stored_config_id: Option<String>,
}

/// Structured view of embedding alignment, for health checks and the
/// admin endpoint.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct EmbeddingStatus {
    pub collection_name: String,
    pub current_embedding_model: String,
    pub current_embedding_config_id: String,
    pub collection_embedding_config_id: Option<String>,
    pub drift_detected: bool,
}

/// Encapsulates the retrieval path and its embedding drift checks.
pub struct RetrievalService {
    store: Arc<dyn VectorStore>,
    embedder: Arc<EmbeddingProvider>,
    collection_name: String,
    embedding_config: EmbeddingConfig,
    current_config_id: String,
    state: RwLock<ReconciliationState>,
    /// Serialises reconciliation passes; queries read the last swapped
    /// snapshot and never wait on this.
    refresh_lock: Mutex<()>,
}

impl RetrievalService {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<EmbeddingProvider>,
        collection_name: String,
        embedding_config: EmbeddingConfig,
    ) -> Self {
        let current_config_id = embedding_config.config_id();
        Self {
            store,
            embedder,
            collection_name,
            embedding_config,
            current_config_id,
            state: RwLock::new(ReconciliationState::default()),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Snapshot of the current reconciliation state.
    pub fn state(&self) -> ReconciliationState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn swap_state(&self, new_state: ReconciliationState) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = new_state;
    }

    /// Refresh connection status and embedding alignment from the store.
    ///
    /// Safe to call repeatedly (health checks do); it only inspects the
    /// collection and updates the in-memory state, never modifying the
    /// store. A store failure resets the state to disconnected and
    /// surfaces as `StoreConnection`, distinct from a drift finding.
    pub async fn refresh_state(&self) -> Result<(), AppError> {
        let _pass = self.refresh_lock.lock().await;
        debug!("refreshing retrieval state from the vector store");

        let lookup = match self.store.get_collection(&self.collection_name).await {
            Ok(lookup) => lookup,
            Err(err) => {
                self.swap_state(ReconciliationState::default());
                error!(error = %err, "failed to refresh state from the vector store");
                return Err(AppError::StoreConnection(format!(
                    "unable to reach the vector store: {err}"
                )));
            }
        };

        let new_state = match lookup {
            CollectionLookup::NotFound => {
                warn!(
                    collection = %self.collection_name,
                    "collection not found; queries will return no results until the init job ingests documents"
                );
                ReconciliationState {
                    connected: true,
                    collection_present: false,
                    drift_detected: false,
                    stored_config_id: None,
                }
            }
            CollectionLookup::Found(metadata) => match metadata.get(EMBEDDING_CONFIG_ID_KEY) {
                None => {
                    // Collection predates fingerprinting; drift cannot be
                    // ruled out, so it must be rebuilt before being trusted.
                    error!(
                        collection = %self.collection_name,
                        "collection has no embedding_config_id metadata; rebuild it via the init job"
                    );
                    ReconciliationState {
                        connected: true,
                        collection_present: true,
                        drift_detected: true,
                        stored_config_id: None,
                    }
                }
                Some(stored_id) => {
                    let drift = *stored_id != self.current_config_id;
                    if drift {
                        error!(
                            collection = %self.collection_name,
                            stored_config_id = %stored_id,
                            current_config_id = %self.current_config_id,
                            "embedding configuration mismatch; refusing to answer queries until the collection is rebuilt"
                        );
                    } else {
                        info!(
                            collection = %self.collection_name,
                            config_id = %stored_id,
                            "embedding configuration is aligned"
                        );
                    }
                    ReconciliationState {
                        connected: true,
                        collection_present: true,
                        drift_detected: drift,
                        stored_config_id: Some(stored_id.clone()),
                    }
                }
            },
        };

        self.swap_state(new_state);
        Ok(())
    }

    /// Whether the service is safe to answer retrieval queries. A missing
    /// collection is still "ready": it serves empty results.
    pub fn is_ready(&self) -> bool {
        let state = self.state();
        state.connected && !state.drift_detected
    }

    pub fn embedding_status(&self) -> EmbeddingStatus {
        let state = self.state();
        EmbeddingStatus {
            collection_name: self.collection_name.clone(),
            current_embedding_model: self.embedding_config.model_name.clone(),
            current_embedding_config_id: self.current_config_id.clone(),
            collection_embedding_config_id: state.stored_config_id,
            drift_detected: state.drift_detected,
        }
    }

    /// Lightweight connectivity probe against the store.
    pub async fn check_store_health(&self) -> bool {
        match self.store.get_collection(&self.collection_name).await {
            Ok(_) => true,
            Err(err) => {
                error!(error = %err, "vector store health check failed");
                false
            }
        }
    }

    /// Run a semantic search against the documentation collection.
    ///
    /// Fails fast while not ready, naming the cause: drift means "rebuild",
    /// lost connectivity means "check the store". An absent collection is
    /// an empty result set, not an error.
    pub async fn query(&self, question: &str, k: usize) -> Result<Vec<RetrievedDocument>, AppError> {
        let snapshot = self.state();

        if !snapshot.connected {
            return Err(AppError::StoreConnection(
                "vector store is unreachable; check the store before querying".into(),
            ));
        }
        if snapshot.drift_detected {
            return Err(AppError::EmbeddingDrift(
                "stored collection was embedded under a different configuration; \
                 rebuild it via the init job before querying"
                    .into(),
            ));
        }
        if !snapshot.collection_present {
            warn!(
                collection = %self.collection_name,
                "query requested but the collection does not exist"
            );
            return Ok(Vec::new());
        }

        debug!(collection = %self.collection_name, k, "running semantic search");
        let hits = self
            .store
            .query(&self.collection_name, &self.embedder, question, k)
            .await?;

        Ok(hits
            .into_iter()
            .map(|hit| RetrievedDocument {
                id: hit.id,
                score: distance_to_score(hit.distance),
                metadata: hit.metadata,
                content: hit.content,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use common::storage::{
        memory::MemoryVectorStore,
        store::{CollectionMetadata, QueryHit},
        types::document::Document,
    };
    use common::utils::embedding::{normalize_model_name, EmbeddingKind};

    fn embedding_config(version: &str) -> EmbeddingConfig {
        let model_name = normalize_model_name(None);
        EmbeddingConfig {
            kind: EmbeddingKind::classify(&model_name),
            model_name,
            version: version.to_string(),
        }
    }

    fn service_with(store: Arc<dyn VectorStore>, version: &str) -> RetrievalService {
        RetrievalService::new(
            store,
            Arc::new(EmbeddingProvider::new_default()),
            "docs".to_string(),
            embedding_config(version),
        )
    }

    fn doc(id: &str, content: &str) -> Document {
        Document::new(
            id.to_string(),
            content.to_string(),
            format!("/docs/{id}"),
            id.to_string(),
        )
    }

    /// Store whose every call fails, simulating an unreachable backend.
    struct UnreachableStore;

    #[async_trait]
    impl VectorStore for UnreachableStore {
        async fn get_collection(&self, _name: &str) -> Result<CollectionLookup, AppError> {
            Err(AppError::StoreConnection("connection refused".into()))
        }

        async fn create_collection(
            &self,
            _name: &str,
            _metadata: CollectionMetadata,
        ) -> Result<(), AppError> {
            Err(AppError::StoreConnection("connection refused".into()))
        }

        async fn delete_collection(&self, _name: &str) -> Result<(), AppError> {
            Err(AppError::StoreConnection("connection refused".into()))
        }

        async fn add_batch(
            &self,
            _name: &str,
            _embedder: &EmbeddingProvider,
            _documents: &[Document],
        ) -> Result<(), AppError> {
            Err(AppError::StoreConnection("connection refused".into()))
        }

        async fn query(
            &self,
            _name: &str,
            _embedder: &EmbeddingProvider,
            _text: &str,
            _k: usize,
        ) -> Result<Vec<QueryHit>, AppError> {
            Err(AppError::StoreConnection("connection refused".into()))
        }
    }

    async fn seed_collection(store: &MemoryVectorStore, config_id: Option<&str>) {
        let mut metadata = CollectionMetadata::new();
        if let Some(id) = config_id {
            metadata.insert(EMBEDDING_CONFIG_ID_KEY.to_string(), id.to_string());
        }
        store.create_collection("docs", metadata).await.unwrap();
    }

    #[tokio::test]
    async fn absent_collection_is_ready_but_not_present() {
        let store = Arc::new(MemoryVectorStore::new());
        let service = service_with(store, "v1");

        service.refresh_state().await.unwrap();

        let state = service.state();
        assert!(state.connected);
        assert!(!state.collection_present);
        assert!(!state.drift_detected);
        assert!(service.is_ready());
    }

    #[tokio::test]
    async fn matching_fingerprint_is_aligned() {
        let store = Arc::new(MemoryVectorStore::new());
        let current = embedding_config("v1").config_id();
        seed_collection(&store, Some(&current)).await;
        let service = service_with(store, "v1");

        service.refresh_state().await.unwrap();

        let state = service.state();
        assert!(state.connected);
        assert!(state.collection_present);
        assert!(!state.drift_detected);
        assert_eq!(state.stored_config_id.as_deref(), Some(current.as_str()));
        assert!(service.is_ready());
    }

    #[tokio::test]
    async fn mismatched_fingerprint_is_drift() {
        let store = Arc::new(MemoryVectorStore::new());
        let stale = embedding_config("v1").config_id();
        seed_collection(&store, Some(&stale)).await;
        let service = service_with(store, "v2");

        service.refresh_state().await.unwrap();

        let state = service.state();
        assert!(state.collection_present);
        assert!(state.drift_detected);
        assert_eq!(state.stored_config_id.as_deref(), Some(stale.as_str()));
        assert!(!service.is_ready());
    }

    #[tokio::test]
    async fn missing_metadata_key_is_drift() {
        let store = Arc::new(MemoryVectorStore::new());
        seed_collection(&store, None).await;
        let service = service_with(store, "v1");

        service.refresh_state().await.unwrap();

        let state = service.state();
        assert!(state.collection_present);
        assert!(state.drift_detected);
        assert_eq!(state.stored_config_id, None);
    }

    #[tokio::test]
    async fn store_failure_resets_to_disconnected() {
        let store = Arc::new(MemoryVectorStore::new());
        let current = embedding_config("v1").config_id();
        seed_collection(&store, Some(&current)).await;
        let service = RetrievalService::new(
            store,
            Arc::new(EmbeddingProvider::new_default()),
            "docs".to_string(),
            embedding_config("v1"),
        );
        service.refresh_state().await.unwrap();
        assert!(service.is_ready());

        // Swap in an unreachable store by rebuilding the service around it;
        // the previously stored collection reference must be discarded.
        let broken = service_with(Arc::new(UnreachableStore), "v1");
        broken.swap_state(service.state());
        let result = broken.refresh_state().await;
        assert!(matches!(result, Err(AppError::StoreConnection(_))));

        let state = broken.state();
        assert_eq!(state, ReconciliationState::default());
        assert!(!broken.is_ready());
    }

    #[tokio::test]
    async fn query_before_any_reconciliation_reports_connectivity() {
        let store = Arc::new(MemoryVectorStore::new());
        let service = service_with(store, "v1");
        // UNINITIALIZED state: connected is still false.
        let result = service.query("anything", 3).await;
        assert!(matches!(result, Err(AppError::StoreConnection(_))));
    }

    #[tokio::test]
    async fn query_with_drift_fails_with_drift_error() {
        let store = Arc::new(MemoryVectorStore::new());
        seed_collection(&store, Some("someoldid")).await;
        let service = service_with(store, "v1");
        service.refresh_state().await.unwrap();

        let result = service.query("anything", 3).await;
        assert!(matches!(result, Err(AppError::EmbeddingDrift(_))));
    }

    #[tokio::test]
    async fn query_with_absent_collection_returns_empty() {
        let store = Arc::new(MemoryVectorStore::new());
        let service = service_with(store, "v1");
        service.refresh_state().await.unwrap();

        let results = service.query("anything", 3).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn query_returns_scored_results_when_aligned() {
        let store = Arc::new(MemoryVectorStore::new());
        let embedder = EmbeddingProvider::new_default();
        let current = embedding_config("v1").config_id();
        seed_collection(&store, Some(&current)).await;
        store
            .add_batch(
                "docs",
                &embedder,
                &[
                    doc("tokio.md", "tokio async runtime internals"),
                    doc("bread.md", "sourdough starter maintenance"),
                ],
            )
            .await
            .unwrap();

        let service = service_with(store, "v1");
        service.refresh_state().await.unwrap();

        let results = service
            .query("tokio async runtime internals", 2)
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "tokio.md");
        assert!(results[0].score > results[1].score);
        assert!(results[0].score <= 1.0 && results[0].score > 0.0);
    }

    #[tokio::test]
    async fn embedding_status_reflects_state() {
        let store = Arc::new(MemoryVectorStore::new());
        let stale = embedding_config("v1").config_id();
        seed_collection(&store, Some(&stale)).await;
        let service = service_with(store, "v2");
        service.refresh_state().await.unwrap();

        let status = service.embedding_status();
        assert_eq!(status.collection_name, "docs");
        assert_eq!(status.current_embedding_model, "default");
        assert_eq!(
            status.current_embedding_config_id,
            embedding_config("v2").config_id()
        );
        assert_eq!(status.collection_embedding_config_id.as_deref(), Some(stale.as_str()));
        assert!(status.drift_detected);
    }
}
