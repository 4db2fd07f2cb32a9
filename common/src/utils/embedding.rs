use std::{
    collections::{hash_map::DefaultHasher, BTreeMap},
    hash::{Hash, Hasher},
    sync::Arc,
};

use anyhow::{anyhow, Context, Result};
use fastembed::{EmbeddingModel, ModelTrait, TextEmbedding, TextInitOptions};
use sha2::{Digest, Sha256};
use std::str::FromStr;
use tokio::sync::Mutex;
use tracing::debug;

use crate::utils::config::AppConfig;

/// Canonical model name meaning "use the built-in default embedder".
pub const DEFAULT_MODEL_NAME: &str = "default";

/// Dimension of the hashed bag-of-words vectors produced by the default
/// embedder. Matches the common sentence-transformer output size so HNSW
/// index definitions stay uniform.
const DEFAULT_EMBEDDER_DIMENSION: usize = 384;

/// Number of hex chars kept from the SHA-256 digest when deriving a
/// config id. Long enough that distinct configurations collide only with
/// negligible probability.
const CONFIG_ID_LEN: usize = 16;

/// Normalise a raw model name from settings into its canonical form.
///
/// `None`, empty/whitespace, or any casing of "default" collapse to
/// [`DEFAULT_MODEL_NAME`]. Other names are kept as-is apart from trimming,
/// since sentence-transformer model codes are case-significant.
pub fn normalize_model_name(raw: Option<&str>) -> String {
    let trimmed = raw.unwrap_or("").trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(DEFAULT_MODEL_NAME) {
        return DEFAULT_MODEL_NAME.to_string();
    }
    trimmed.to_string()
}

/// The two embedding implementation kinds the service knows about. Adding
/// a third backend means adding a variant here, not touching call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingKind {
    DefaultEmbedder,
    SentenceTransformer,
}

impl EmbeddingKind {
    /// Derive the implementation kind from a normalised model name.
    pub fn classify(model_name: &str) -> Self {
        if model_name == DEFAULT_MODEL_NAME {
            Self::DefaultEmbedder
        } else {
            Self::SentenceTransformer
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DefaultEmbedder => "default-embedder",
            Self::SentenceTransformer => "sentence-transformer",
        }
    }
}

/// Logical description of the embedding configuration.
///
/// Converted into a stable `config_id` string which is stored in the
/// collection's metadata. If any field changes (for example because the
/// model name changes), the id changes too, and drift can be detected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddingConfig {
    pub model_name: String,
    pub kind: EmbeddingKind,
    pub version: String,
}

impl EmbeddingConfig {
    /// Build the configuration from application settings, normalising the
    /// model name and deriving the implementation kind.
    pub fn from_settings(config: &AppConfig) -> Self {
        let model_name = normalize_model_name(config.embedding_model_name.as_deref());
        let kind = EmbeddingKind::classify(&model_name);
        Self {
            model_name,
            kind,
            version: config.embedding_config_version.clone(),
        }
    }

    /// Stable identifier for this embedding configuration.
    ///
    /// The fields are serialised with sorted keys so the payload is
    /// independent of field ordering, then hashed with SHA-256 and
    /// truncated. Stable across processes and hosts.
    pub fn config_id(&self) -> String {
        let mut payload = BTreeMap::new();
        payload.insert("implementation", self.kind.as_str());
        payload.insert("model_name", self.model_name.as_str());
        payload.insert("version", self.version.as_str());

        // BTreeMap serialisation is already key-sorted; infallible for
        // a string-to-string map.
        let serialized = serde_json::to_string(&payload).unwrap_or_default();

        let mut hasher = Sha256::new();
        hasher.update(serialized.as_bytes());
        let digest = hasher.finalize();
        let hex = format!("{digest:x}");
        hex.chars().take(CONFIG_ID_LEN).collect()
    }
}

/// Embedding function handed to the vector store. One variant per
/// [`EmbeddingKind`].
#[derive(Clone)]
pub struct EmbeddingProvider {
    inner: EmbeddingInner,
}

#[derive(Clone)]
enum EmbeddingInner {
    /// Deterministic hashed bag-of-words vectors. No model download, no
    /// network; what "default" means in this service.
    Hashed { dimension: usize },
    /// A named sentence-transformer model served through fastembed.
    FastEmbed {
        model: Arc<Mutex<TextEmbedding>>,
        dimension: usize,
    },
}

impl EmbeddingProvider {
    /// Construct the provider matching an [`EmbeddingConfig`].
    pub async fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        match config.kind {
            EmbeddingKind::DefaultEmbedder => Ok(Self::new_default()),
            EmbeddingKind::SentenceTransformer => {
                Self::new_sentence_transformer(&config.model_name).await
            }
        }
    }

    pub fn new_default() -> Self {
        EmbeddingProvider {
            inner: EmbeddingInner::Hashed {
                dimension: DEFAULT_EMBEDDER_DIMENSION,
            },
        }
    }

    pub async fn new_sentence_transformer(model_code: &str) -> Result<Self> {
        let model_name = EmbeddingModel::from_str(model_code).map_err(|err| anyhow!(err))?;

        let options = TextInitOptions::new(model_name.clone()).with_show_download_progress(true);
        let model_name_for_task = model_name.clone();
        let model_name_code = model_name.to_string();

        let (model, dimension) = tokio::task::spawn_blocking(move || -> Result<_> {
            let model =
                TextEmbedding::try_new(options).context("initialising fastembed text model")?;
            let info = EmbeddingModel::get_model_info(&model_name_for_task)
                .ok_or_else(|| anyhow!("fastembed model metadata missing for {model_name_code}"))?;
            Ok((model, info.dim))
        })
        .await
        .context("joining fastembed initialisation task")??;

        Ok(EmbeddingProvider {
            inner: EmbeddingInner::FastEmbed {
                model: Arc::new(Mutex::new(model)),
                dimension,
            },
        })
    }

    pub fn dimension(&self) -> usize {
        match &self.inner {
            EmbeddingInner::Hashed { dimension } => *dimension,
            EmbeddingInner::FastEmbed { dimension, .. } => *dimension,
        }
    }

    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        match &self.inner {
            EmbeddingInner::Hashed { dimension } => Ok(hashed_embedding(text, *dimension)),
            EmbeddingInner::FastEmbed { model, .. } => {
                let mut guard = model.lock().await;
                let embeddings = guard
                    .embed(vec![text.to_owned()], None)
                    .context("generating fastembed vector")?;
                embeddings
                    .into_iter()
                    .next()
                    .ok_or_else(|| anyhow!("fastembed returned no embedding for input"))
            }
        }
    }

    pub async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        match &self.inner {
            EmbeddingInner::Hashed { dimension } => {
                debug!(count = texts.len(), "embedding batch with hashed embedder");
                Ok(texts
                    .into_iter()
                    .map(|text| hashed_embedding(&text, *dimension))
                    .collect())
            }
            EmbeddingInner::FastEmbed { model, .. } => {
                let mut guard = model.lock().await;
                guard
                    .embed(texts, None)
                    .context("generating fastembed batch embeddings")
            }
        }
    }
}

// Helper functions for hashed embeddings
fn hashed_embedding(text: &str, dimension: usize) -> Vec<f32> {
    let dim = dimension.max(1);
    let mut vector = vec![0.0f32; dim];
    if text.is_empty() {
        return vector;
    }

    let mut token_count = 0f32;
    for token in tokens(text) {
        token_count += 1.0;
        let idx = bucket(&token, dim);
        vector[idx] += 1.0;
    }

    if token_count == 0.0 {
        return vector;
    }

    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in &mut vector {
            *value /= norm;
        }
    }

    vector
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(|token| token.to_ascii_lowercase())
}

fn bucket(token: &str, dimension: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    token.hash(&mut hasher);
    (hasher.finish() as usize) % dimension
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(model: &str, version: &str) -> EmbeddingConfig {
        let model_name = normalize_model_name(Some(model));
        let kind = EmbeddingKind::classify(&model_name);
        EmbeddingConfig {
            model_name,
            kind,
            version: version.to_string(),
        }
    }

    #[test]
    fn normalization_collapses_empty_and_default() {
        assert_eq!(normalize_model_name(None), "default");
        assert_eq!(normalize_model_name(Some("")), "default");
        assert_eq!(normalize_model_name(Some("   ")), "default");
        assert_eq!(normalize_model_name(Some("default")), "default");
        assert_eq!(normalize_model_name(Some("DEFAULT")), "default");
        assert_eq!(normalize_model_name(Some("  Default  ")), "default");
    }

    #[test]
    fn normalization_trims_but_preserves_model_codes() {
        assert_eq!(
            normalize_model_name(Some("  all-MiniLM-L6-v2 ")),
            "all-MiniLM-L6-v2"
        );
    }

    #[test]
    fn classify_maps_default_and_models() {
        assert_eq!(
            EmbeddingKind::classify("default"),
            EmbeddingKind::DefaultEmbedder
        );
        assert_eq!(
            EmbeddingKind::classify("all-MiniLM-L6-v2"),
            EmbeddingKind::SentenceTransformer
        );
    }

    #[test]
    fn config_id_is_deterministic() {
        let a = config("default", "v1");
        let b = config("default", "v1");
        assert_eq!(a.config_id(), b.config_id());
        assert_eq!(a.config_id().len(), 16);
        assert!(a.config_id().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn config_id_changes_with_any_field() {
        let base = config("default", "v1");

        let bumped_version = config("default", "v2");
        assert_ne!(base.config_id(), bumped_version.config_id());

        let other_model = config("all-MiniLM-L6-v2", "v1");
        assert_ne!(base.config_id(), other_model.config_id());

        // Same model name, forced different kind: the kind participates in
        // the hash on its own.
        let mut forged = config("default", "v1");
        forged.kind = EmbeddingKind::SentenceTransformer;
        assert_ne!(base.config_id(), forged.config_id());
    }

    #[test]
    fn equivalent_spellings_share_a_config_id() {
        assert_eq!(config("", "v1").config_id(), config("DEFAULT", "v1").config_id());
    }

    #[tokio::test]
    async fn hashed_embeddings_are_deterministic_and_normalized() {
        let provider = EmbeddingProvider::new_default();
        let a = provider.embed("drift detection for embeddings").await.unwrap();
        let b = provider.embed("drift detection for embeddings").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), provider.dimension());

        let norm = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[tokio::test]
    async fn hashed_batch_matches_single_embeddings() {
        let provider = EmbeddingProvider::new_default();
        let single = provider.embed("alpha beta").await.unwrap();
        let batch = provider
            .embed_batch(vec!["alpha beta".into(), "gamma".into()])
            .await
            .unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0], single);
    }
}
