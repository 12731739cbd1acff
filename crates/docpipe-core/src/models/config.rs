//! Configuration structures for the invoice pipeline.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::retry::RetryPolicy;

/// Main configuration for the docpipe pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Blob storage configuration.
    pub storage: StorageConfig,

    /// Document extraction configuration.
    pub extraction: ExtractionConfig,

    /// Retry policy applied to every activity and sub-workflow call.
    pub retry: RetryPolicy,

    /// Workflow runtime configuration.
    pub runtime: RuntimeConfig,

    /// HTTP trigger configuration.
    pub server: ServerConfig,
}

/// Blob storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Storage account holding the invoice containers.
    pub account_name: String,

    /// Root directory of the local blob store (one sub-directory per container).
    pub blob_root: PathBuf,

    /// Glob pattern selecting invoice documents when discovering folders.
    pub invoice_pattern: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            account_name: "devstoreaccount1".to_string(),
            blob_root: PathBuf::from("blobs"),
            invoice_pattern: "*.pdf".to_string(),
        }
    }
}

/// Document extraction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Base URL of an OpenAI-compatible chat completions service.
    pub endpoint: Option<String>,

    /// Model or deployment name.
    pub deployment: Option<String>,

    /// API key sent as a bearer token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// System prompt sent with every extraction request.
    pub system_prompt: String,

    /// Maximum completion tokens.
    pub max_tokens: u32,

    /// Sampling temperature.
    pub temperature: f32,

    /// Nucleus sampling value.
    pub top_p: f32,

    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            deployment: None,
            api_key: None,
            system_prompt: "You are an AI assistant that extracts data from documents and returns them as structured JSON objects. Do not return as a code block.".to_string(),
            max_tokens: 4096,
            temperature: 0.1,
            top_p: 0.1,
            timeout_secs: 120,
        }
    }
}

/// Workflow runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Directory holding instance records and step journals.
    pub state_dir: PathBuf,

    /// Directory watched for queued batch requests.
    pub queue_dir: PathBuf,

    /// Queue polling interval in milliseconds.
    pub queue_poll_interval_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from("state"),
            queue_dir: PathBuf::from("queue"),
            queue_poll_interval_ms: 1000,
        }
    }
}

/// HTTP trigger configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind.
    pub bind: String,

    /// Externally visible base URL used in status handles.
    pub base_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:7071".to_string(),
            base_url: None,
        }
    }
}

impl ServerConfig {
    /// Base URL for status handles, derived from the bind address when unset.
    pub fn public_base_url(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| format!("http://{}", self.bind))
            .trim_end_matches('/')
            .to_string()
    }
}

impl PipelineConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }

    /// Override settings from environment variables.
    pub fn apply_env(mut self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok());
        self
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let set = |key: &str, target: &mut dyn FnMut(String)| {
            if let Some(value) = lookup(key).filter(|v| !v.is_empty()) {
                debug!(key, "configuration overridden from environment");
                target(value);
            }
        };

        set("INVOICES_STORAGE_ACCOUNT_NAME", &mut |v| self.storage.account_name = v);
        set("DOCPIPE_BLOB_ROOT", &mut |v| self.storage.blob_root = PathBuf::from(v));
        set("DOCPIPE_STATE_DIR", &mut |v| self.runtime.state_dir = PathBuf::from(v));
        set("OPENAI_ENDPOINT", &mut |v| self.extraction.endpoint = Some(v));
        set("OPENAI_COMPLETION_DEPLOYMENT", &mut |v| self.extraction.deployment = Some(v));
        set("OPENAI_API_KEY", &mut |v| self.extraction.api_key = Some(v));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"retry": {"max_attempts": 3}, "server": {"bind": "0.0.0.0:80"}}"#)
                .unwrap();
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.first_retry_interval_ms, 5000);
        assert_eq!(config.storage.invoice_pattern, "*.pdf");
        assert_eq!(config.server.public_base_url(), "http://0.0.0.0:80");
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("INVOICES_STORAGE_ACCOUNT_NAME", "prodinvoices"),
            ("OPENAI_ENDPOINT", "https://example.test"),
            ("DOCPIPE_STATE_DIR", ""),
        ]);
        let mut config = PipelineConfig::default();
        config.apply_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.storage.account_name, "prodinvoices");
        assert_eq!(config.extraction.endpoint.as_deref(), Some("https://example.test"));
        assert_eq!(config.runtime.state_dir, PathBuf::from("state"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut config = PipelineConfig::default();
        config.storage.account_name = "acct".to_string();
        config.save(&path).unwrap();

        let loaded = PipelineConfig::from_file(&path).unwrap();
        assert_eq!(loaded.storage.account_name, "acct");
    }
}
