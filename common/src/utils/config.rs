use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Which vector store implementation the service talks to.
#[derive(Clone, Copy, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Http,
    Memory,
}

fn default_store_kind() -> StoreKind {
    StoreKind::Http
}

/// Application settings, shared between the serving process and the
/// one-shot init job so that embedding configuration and store connection
/// details stay consistent.
#[derive(Clone, Deserialize, Debug)]
pub struct AppConfig {
    #[serde(default = "default_store_address")]
    pub store_address: String,
    #[serde(default = "default_store_kind")]
    pub store_kind: StoreKind,
    #[serde(default = "default_collection_name")]
    pub collection_name: String,
    /// Empty or "default" selects the built-in default embedder; anything
    /// else is treated as a sentence-transformer model code.
    #[serde(default)]
    pub embedding_model_name: Option<String>,
    /// Operator-bumped version tag; changing it forces a fingerprint change
    /// and therefore a rebuild.
    #[serde(default = "default_embedding_config_version")]
    pub embedding_config_version: String,
    #[serde(default = "default_docs_dir")]
    pub docs_dir: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_rebuild_on_mismatch")]
    pub rebuild_on_mismatch: bool,
    #[serde(default = "default_ingest_batch_size")]
    pub ingest_batch_size: usize,
}

fn default_store_address() -> String {
    "http://localhost:8000".to_string()
}

fn default_collection_name() -> String {
    "service_docs".to_string()
}

fn default_embedding_config_version() -> String {
    "v1".to_string()
}

fn default_docs_dir() -> String {
    "./data/docs".to_string()
}

fn default_http_port() -> u16 {
    3000
}

fn default_rebuild_on_mismatch() -> bool {
    true
}

fn default_ingest_batch_size() -> usize {
    32
}

pub fn get_config() -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(Environment::default())
        .build()?;

    config.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_fields_missing() {
        let config: AppConfig = serde_json::from_value(serde_json::json!({})).unwrap();

        assert_eq!(config.store_kind, StoreKind::Http);
        assert_eq!(config.collection_name, "service_docs");
        assert_eq!(config.embedding_model_name, None);
        assert_eq!(config.embedding_config_version, "v1");
        assert!(config.rebuild_on_mismatch);
        assert_eq!(config.ingest_batch_size, 32);
    }

    #[test]
    fn store_kind_parses_lowercase() {
        let config: AppConfig =
            serde_json::from_value(serde_json::json!({ "store_kind": "memory" })).unwrap();
        assert_eq!(config.store_kind, StoreKind::Memory);
    }
}
