use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::{
    error::AppError,
    storage::{
        store::{CollectionLookup, CollectionMetadata, QueryHit, VectorStore},
        types::document::Document,
    },
    utils::embedding::EmbeddingProvider,
};

/// One embedded record inside an in-memory collection.
#[derive(Debug, Clone)]
struct StoredRecord {
    id: String,
    content: String,
    metadata: HashMap<String, String>,
    embedding: Vec<f32>,
}

#[derive(Debug, Clone, Default)]
struct MemoryCollection {
    metadata: CollectionMetadata,
    records: Vec<StoredRecord>,
}

/// In-process vector store with cosine-distance search. Serves the
/// `memory` store kind in configuration and the test suites.
#[derive(Default)]
pub struct MemoryVectorStore {
    collections: RwLock<HashMap<String, MemoryCollection>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn get_collection(&self, name: &str) -> Result<CollectionLookup, AppError> {
        let collections = self.collections.read().await;
        Ok(match collections.get(name) {
            Some(collection) => CollectionLookup::Found(collection.metadata.clone()),
            None => CollectionLookup::NotFound,
        })
    }

    async fn create_collection(
        &self,
        name: &str,
        metadata: CollectionMetadata,
    ) -> Result<(), AppError> {
        let mut collections = self.collections.write().await;
        if collections.contains_key(name) {
            return Err(AppError::Validation(format!(
                "collection '{name}' already exists"
            )));
        }
        collections.insert(
            name.to_string(),
            MemoryCollection {
                metadata,
                records: Vec::new(),
            },
        );
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<(), AppError> {
        let mut collections = self.collections.write().await;
        if collections.remove(name).is_some() {
            debug!(collection = name, "deleted in-memory collection");
        }
        Ok(())
    }

    async fn add_batch(
        &self,
        name: &str,
        embedder: &EmbeddingProvider,
        documents: &[Document],
    ) -> Result<(), AppError> {
        let contents: Vec<String> = documents.iter().map(|d| d.content.clone()).collect();
        let embeddings = embedder.embed_batch(contents).await?;

        let mut collections = self.collections.write().await;
        let collection = collections
            .get_mut(name)
            .ok_or_else(|| AppError::NotFound(format!("collection '{name}' does not exist")))?;

        for (document, embedding) in documents.iter().zip(embeddings) {
            collection.records.push(StoredRecord {
                id: document.id.clone(),
                content: document.content.clone(),
                metadata: document.metadata.clone(),
                embedding,
            });
        }
        Ok(())
    }

    async fn query(
        &self,
        name: &str,
        embedder: &EmbeddingProvider,
        text: &str,
        k: usize,
    ) -> Result<Vec<QueryHit>, AppError> {
        let query_embedding = embedder.embed(text).await?;

        let collections = self.collections.read().await;
        let collection = collections
            .get(name)
            .ok_or_else(|| AppError::NotFound(format!("collection '{name}' does not exist")))?;

        let mut hits: Vec<QueryHit> = collection
            .records
            .iter()
            .map(|record| QueryHit {
                id: record.id.clone(),
                distance: cosine_distance(&query_embedding, &record.embedding),
                metadata: record.metadata.clone(),
                content: record.content.clone(),
            })
            .collect();

        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(Ordering::Equal)
        });
        hits.truncate(k);
        Ok(hits)
    }
}

/// Cosine distance in [0, 2]; zero-norm vectors are treated as maximally
/// distant rather than NaN.
fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::store::EMBEDDING_CONFIG_ID_KEY;

    fn doc(id: &str, content: &str) -> Document {
        Document::new(
            id.to_string(),
            content.to_string(),
            format!("/docs/{id}"),
            id.to_string(),
        )
    }

    #[tokio::test]
    async fn lookup_reports_not_found_before_creation() {
        let store = MemoryVectorStore::new();
        let lookup = store.get_collection("docs").await.unwrap();
        assert_eq!(lookup, CollectionLookup::NotFound);
    }

    #[tokio::test]
    async fn create_then_get_roundtrips_metadata() {
        let store = MemoryVectorStore::new();
        let metadata =
            CollectionMetadata::from([(EMBEDDING_CONFIG_ID_KEY.to_string(), "abc123".to_string())]);
        store.create_collection("docs", metadata.clone()).await.unwrap();

        let lookup = store.get_collection("docs").await.unwrap();
        assert_eq!(lookup, CollectionLookup::Found(metadata));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = MemoryVectorStore::new();
        store
            .create_collection("docs", CollectionMetadata::new())
            .await
            .unwrap();
        store.delete_collection("docs").await.unwrap();
        // Second delete of a now-missing collection is fine.
        store.delete_collection("docs").await.unwrap();
        assert_eq!(
            store.get_collection("docs").await.unwrap(),
            CollectionLookup::NotFound
        );
    }

    #[tokio::test]
    async fn add_batch_requires_collection() {
        let store = MemoryVectorStore::new();
        let embedder = EmbeddingProvider::new_default();
        let result = store.add_batch("docs", &embedder, &[doc("a.md", "text")]).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn query_returns_nearest_document_first() {
        let store = MemoryVectorStore::new();
        let embedder = EmbeddingProvider::new_default();
        store
            .create_collection("docs", CollectionMetadata::new())
            .await
            .unwrap();
        store
            .add_batch(
                "docs",
                &embedder,
                &[
                    doc("async.md", "tokio async runtime scheduling"),
                    doc("cooking.md", "recipes for sourdough bread baking"),
                ],
            )
            .await
            .unwrap();

        let hits = store
            .query("docs", &embedder, "tokio async runtime scheduling", 2)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "async.md");
        assert!(hits[0].distance <= hits[1].distance);
        assert_eq!(hits[0].metadata.get("name").unwrap(), "async.md");
    }

    #[tokio::test]
    async fn query_truncates_to_k() {
        let store = MemoryVectorStore::new();
        let embedder = EmbeddingProvider::new_default();
        store
            .create_collection("docs", CollectionMetadata::new())
            .await
            .unwrap();
        store
            .add_batch(
                "docs",
                &embedder,
                &[doc("a.md", "alpha"), doc("b.md", "beta"), doc("c.md", "gamma")],
            )
            .await
            .unwrap();

        let hits = store.query("docs", &embedder, "alpha", 1).await.unwrap();
        assert_eq!(hits.len(), 1);
    }
}
