//! Subcommands and the wiring they share.

pub mod config;
pub mod enqueue;
pub mod process;
pub mod serve;
pub mod status;

use anyhow::Context;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use docpipe_core::{
    ChatCompletionsExtractor, FileWorkflowStore, LocalBlobStore, PipelineConfig, Services, WorkflowRuntime,
};

/// Default location of the configuration file.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("docpipe")
        .join("config.json")
}

/// Load configuration from `path`, the default path or defaults, then apply
/// environment overrides.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<PipelineConfig> {
    let config = match path {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?,
        None => {
            let default_path = default_config_path();
            if default_path.exists() {
                debug!("Using config file {}", default_path.display());
                PipelineConfig::from_file(&default_path)?
            } else {
                PipelineConfig::default()
            }
        }
    };

    Ok(config.apply_env())
}

/// Workflow store rooted at the configured state directory.
pub fn open_store(config: &PipelineConfig) -> Arc<FileWorkflowStore> {
    Arc::new(FileWorkflowStore::new(&config.runtime.state_dir))
}

/// Build a runtime backed by the local blob store, the chat completions
/// extractor and the file journal.
pub fn build_runtime(config: PipelineConfig) -> anyhow::Result<WorkflowRuntime> {
    let extractor = ChatCompletionsExtractor::from_config(&config.extraction)
        .context("Extraction service is not available (set OPENAI_ENDPOINT or extraction.endpoint)")?;
    let blobs = LocalBlobStore::new(&config.storage.blob_root);
    let store = open_store(&config);

    debug!(
        blob_root = %config.storage.blob_root.display(),
        state_dir = %config.runtime.state_dir.display(),
        "building workflow runtime"
    );

    Ok(WorkflowRuntime::new(Services::new(
        Arc::new(blobs),
        Arc::new(extractor),
        store,
        config,
    )))
}
