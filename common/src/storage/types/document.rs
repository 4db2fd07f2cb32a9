use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A text document to be indexed in the vector store.
///
/// Ids are derived from the path relative to the load root, so reloading
/// the same tree produces the same ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub content: String,
    pub metadata: HashMap<String, String>,
}

impl Document {
    pub fn new(id: String, content: String, path: String, name: String) -> Self {
        let metadata = HashMap::from([("path".to_string(), path), ("name".to_string(), name)]);
        Self {
            id,
            content,
            metadata,
        }
    }
}
