use std::sync::Arc;

use retrieval_pipeline::RetrievalService;

#[derive(Clone)]
pub struct ApiState {
    pub service: Arc<RetrievalService>,
}

impl ApiState {
    pub fn new(service: Arc<RetrievalService>) -> Self {
        Self { service }
    }
}
