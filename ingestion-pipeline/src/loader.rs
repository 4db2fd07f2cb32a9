use std::path::Path;

use common::storage::types::document::Document;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// File extensions treated as indexable text. Everything else is skipped
/// silently.
const TEXT_EXTENSIONS: &[&str] = &["md", "markdown", "txt"];

/// Load text documents from the given directory tree.
///
/// Each file becomes one document whose id is the path relative to `root`
/// with forward-slash separators, so ids are stable across rebuild runs on
/// different machines. Unreadable or non-UTF-8 files are skipped with a
/// warning; a single bad file never aborts the load. Results are sorted by
/// id so repeated loads of an unchanged tree are identical.
pub fn load_documents(root: &Path) -> Vec<Document> {
    let mut documents = Vec::new();

    if !root.exists() {
        warn!(root = %root.display(), "documents root directory does not exist");
        return documents;
    }

    for entry in WalkDir::new(root).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(error = %err, "skipping unreadable directory entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let Some(extension) = path.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        if !TEXT_EXTENSIONS.contains(&extension.to_ascii_lowercase().as_str()) {
            continue;
        }

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "skipping non-text file");
                continue;
            }
        };
        if content.trim().is_empty() {
            debug!(path = %path.display(), "skipping empty document");
            continue;
        }

        let relative = path.strip_prefix(root).unwrap_or(path);
        let id = relative
            .components()
            .map(|component| component.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        documents.push(Document::new(id, content, path.display().to_string(), name));
    }

    documents.sort_by(|a, b| a.id.cmp(&b.id));
    info!(count = documents.len(), root = %root.display(), "loaded documents");
    documents
}
