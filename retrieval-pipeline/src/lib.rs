pub mod reconciler;

use std::collections::HashMap;

use serde::Serialize;

pub use reconciler::{EmbeddingStatus, ReconciliationState, RetrievalService};

/// One retrieval hit returned to callers, with the store distance mapped
/// to a similarity score.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievedDocument {
    pub id: String,
    pub score: f32,
    pub metadata: HashMap<String, String>,
    pub content: String,
}

/// Map a store distance (smaller is closer) into a similarity score in
/// (0, 1]. Order-preserving; the exact shape is presentation only.
pub fn distance_to_score(distance: f32) -> f32 {
    1.0 / (1.0 + distance.max(0.0))
}
