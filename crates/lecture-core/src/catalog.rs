use anyhow::{Context, Result};
use lecture_models::TopicCatalog;
use std::path::Path;
use tracing::{info, warn};

/// Load the category tree from a `topics.json` file.
///
/// Returns `Ok(None)` when the file does not exist.
pub fn load_topics(path: &Path) -> Result<Option<TopicCatalog>> {
    if !path.exists() {
        warn!("Topics file {:?} not found", path);
        return Ok(None);
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read topics file {:?}", path))?;
    let catalog: TopicCatalog = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse topics file {:?}", path))?;
    info!("Loaded {} topic categories", catalog.categories.len());
    Ok(Some(catalog))
}
