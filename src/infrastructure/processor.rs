use crate::config::AppConfig;
use crate::services::processor::{DocumentProcessor, ScriptProcessor};
use std::sync::Arc;
use tracing::info;

pub async fn setup_processor(config: &AppConfig) -> Arc<dyn DocumentProcessor> {
    let processor = ScriptProcessor::from_config(config);

    if processor.health_check().await {
        info!(
            "🐍 Simplification script found: {} {} (timeout {}s)",
            config.interpreter,
            config.script_path.display(),
            config.processing_timeout.as_secs()
        );
    } else {
        tracing::warn!(
            "⚠️  Simplification script missing at {}! /documents/simplify will answer SERVICE_UNAVAILABLE.",
            config.script_path.display()
        );
    }

    Arc::new(processor)
}
