use crate::config::AppConfig;
use crate::services::storage::{LocalStorageService, StorageService};
use std::sync::Arc;
use tracing::info;

/// Creates the content directory up front so the first upload does not pay for it
pub async fn setup_storage(config: &AppConfig) -> anyhow::Result<Arc<dyn StorageService>> {
    let storage = LocalStorageService::new(config.content_dir.clone(), config.max_file_size);
    let root = storage.ensure_ready().await.map_err(|e| {
        anyhow::anyhow!(
            "Failed to prepare content directory {}: {}",
            config.content_dir.display(),
            e
        )
    })?;

    info!(
        "📁 Content directory ready: {} (max upload {} MB)",
        root.display(),
        config.max_file_size / 1024 / 1024
    );

    Ok(Arc::new(storage))
}
