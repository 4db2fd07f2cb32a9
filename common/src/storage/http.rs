use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::{
    error::AppError,
    storage::{
        store::{CollectionLookup, CollectionMetadata, QueryHit, VectorStore},
        types::document::Document,
    },
    utils::embedding::EmbeddingProvider,
};

/// HTTP client for a Chroma-style vector store REST API.
///
/// Collections are addressed by name on the wire for lookup/delete and by
/// server-assigned id for add/query, so mutating operations resolve the
/// name first.
pub struct HttpVectorStore {
    client: reqwest::Client,
    base_url: String,
}

/// Collection object as returned by the store.
#[derive(Debug, Deserialize)]
struct RemoteCollection {
    id: String,
    #[allow(dead_code)]
    name: String,
    metadata: Option<HashMap<String, Value>>,
}

#[derive(Debug, Serialize)]
struct CreateCollectionRequest<'a> {
    name: &'a str,
    metadata: &'a CollectionMetadata,
    get_or_create: bool,
}

#[derive(Debug, Serialize)]
struct AddRequest<'a> {
    ids: Vec<&'a str>,
    embeddings: Vec<Vec<f32>>,
    metadatas: Vec<&'a HashMap<String, String>>,
    documents: Vec<&'a str>,
}

#[derive(Debug, Serialize)]
struct QueryRequest {
    query_embeddings: Vec<Vec<f32>>,
    n_results: usize,
    include: Vec<&'static str>,
}

/// Query response; the store returns one inner list per query embedding.
#[derive(Debug, Deserialize)]
struct QueryResponse {
    ids: Vec<Vec<String>>,
    distances: Option<Vec<Vec<f32>>>,
    metadatas: Option<Vec<Vec<Option<HashMap<String, Value>>>>>,
    documents: Option<Vec<Vec<Option<String>>>>,
}

impl HttpVectorStore {
    pub fn new(base_url: &str) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(AppError::Reqwest)?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn collections_url(&self) -> String {
        format!("{}/api/v1/collections", self.base_url)
    }

    /// Map transport-level failures to `StoreConnection` so callers can
    /// distinguish "store unreachable" from protocol errors.
    fn connection_error(err: reqwest::Error) -> AppError {
        if err.is_connect() || err.is_timeout() {
            AppError::StoreConnection(err.to_string())
        } else {
            AppError::Reqwest(err)
        }
    }

    async fn fetch_collection(&self, name: &str) -> Result<Option<RemoteCollection>, AppError> {
        let url = format!("{}/{name}", self.collections_url());
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(Self::connection_error)?;

        match response.status() {
            StatusCode::OK => {
                let collection = response
                    .json::<RemoteCollection>()
                    .await
                    .map_err(Self::connection_error)?;
                Ok(Some(collection))
            }
            StatusCode::NOT_FOUND => Ok(None),
            status => {
                // Older store versions report missing collections as a 500
                // with an explanatory body.
                let body = response.text().await.unwrap_or_default();
                if body.contains("does not exist") {
                    return Ok(None);
                }
                Err(AppError::StoreConnection(format!(
                    "unexpected status {status} fetching collection '{name}': {body}"
                )))
            }
        }
    }

    /// Resolve a collection name to its server-side id.
    async fn resolve_id(&self, name: &str) -> Result<String, AppError> {
        self.fetch_collection(name)
            .await?
            .map(|collection| collection.id)
            .ok_or_else(|| AppError::NotFound(format!("collection '{name}' does not exist")))
    }
}

/// Flatten a JSON metadata map into the string-to-string form the rest of
/// the system works with.
fn stringify_metadata(metadata: Option<HashMap<String, Value>>) -> HashMap<String, String> {
    metadata
        .unwrap_or_default()
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => s,
                other => other.to_string(),
            };
            (key, value)
        })
        .collect()
}

#[async_trait]
impl VectorStore for HttpVectorStore {
    async fn get_collection(&self, name: &str) -> Result<CollectionLookup, AppError> {
        Ok(match self.fetch_collection(name).await? {
            Some(collection) => CollectionLookup::Found(stringify_metadata(collection.metadata)),
            None => CollectionLookup::NotFound,
        })
    }

    async fn create_collection(
        &self,
        name: &str,
        metadata: CollectionMetadata,
    ) -> Result<(), AppError> {
        let request = CreateCollectionRequest {
            name,
            metadata: &metadata,
            get_or_create: false,
        };
        let response = self
            .client
            .post(self.collections_url())
            .json(&request)
            .send()
            .await
            .map_err(Self::connection_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::StoreConnection(format!(
                "unexpected status {status} creating collection '{name}': {body}"
            )));
        }
        debug!(collection = name, "created remote collection");
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<(), AppError> {
        let url = format!("{}/{name}", self.collections_url());
        let response = self
            .client
            .delete(&url)
            .send()
            .await
            .map_err(Self::connection_error)?;

        // Missing collections are fine; delete is idempotent.
        if response.status().is_success() || response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if body.contains("does not exist") {
            return Ok(());
        }
        Err(AppError::StoreConnection(format!(
            "unexpected status {status} deleting collection '{name}': {body}"
        )))
    }

    async fn add_batch(
        &self,
        name: &str,
        embedder: &EmbeddingProvider,
        documents: &[Document],
    ) -> Result<(), AppError> {
        let collection_id = self.resolve_id(name).await?;
        let contents: Vec<String> = documents.iter().map(|d| d.content.clone()).collect();
        let embeddings = embedder.embed_batch(contents).await?;

        let request = AddRequest {
            ids: documents.iter().map(|d| d.id.as_str()).collect(),
            embeddings,
            metadatas: documents.iter().map(|d| &d.metadata).collect(),
            documents: documents.iter().map(|d| d.content.as_str()).collect(),
        };

        let url = format!("{}/{collection_id}/add", self.collections_url());
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(Self::connection_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::StoreConnection(format!(
                "unexpected status {status} adding batch to '{name}': {body}"
            )));
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
        let collection_id = self.resolve_id(name).await?;
        let query_embedding = embedder.embed(text).await?;

        let request = QueryRequest {
            query_embeddings: vec![query_embedding],
            n_results: k,
            include: vec!["metadatas", "documents", "distances"],
        };

        let url = format!("{}/{collection_id}/query", self.collections_url());
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(Self::connection_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::StoreConnection(format!(
                "unexpected status {status} querying '{name}': {body}"
            )));
        }

        let parsed = response
            .json::<QueryResponse>()
            .await
            .map_err(Self::connection_error)?;

        // One query embedding was sent, so only the first inner list of
        // each field is relevant.
        let ids = parsed.ids.into_iter().next().unwrap_or_default();
        let distances = parsed
            .distances
            .and_then(|d| d.into_iter().next())
            .unwrap_or_default();
        let metadatas = parsed
            .metadatas
            .and_then(|m| m.into_iter().next())
            .unwrap_or_default();
        let documents = parsed
            .documents
            .and_then(|d| d.into_iter().next())
            .unwrap_or_default();

        let mut hits = Vec::with_capacity(ids.len());
        for (index, id) in ids.into_iter().enumerate() {
            hits.push(QueryHit {
                id,
                distance: distances.get(index).copied().unwrap_or(0.0),
                metadata: stringify_metadata(metadatas.get(index).cloned().flatten()),
                content: documents
                    .get(index)
                    .cloned()
                    .flatten()
                    .unwrap_or_default(),
            });
        }
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_values_flatten_to_strings() {
        let metadata = HashMap::from([
            ("embedding_config_id".to_string(), Value::String("abc".into())),
            ("batch".to_string(), Value::from(3)),
        ]);
        let flattened = stringify_metadata(Some(metadata));
        assert_eq!(flattened.get("embedding_config_id").unwrap(), "abc");
        assert_eq!(flattened.get("batch").unwrap(), "3");
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let store = HttpVectorStore::new("http://localhost:8000/").unwrap();
        assert_eq!(
            store.collections_url(),
            "http://localhost:8000/api/v1/collections"
        );
    }
}
