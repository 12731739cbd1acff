//! Error types for the docpipe-core library.

use thiserror::Error;

/// Main error type for the docpipe library.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Blob storage error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Document extraction error.
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Workflow journal error.
    #[error("journal error: {0}")]
    Journal(#[from] JournalError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors related to blob storage.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The requested blob does not exist.
    #[error("blob not found: {container}/{blob}")]
    NotFound { container: String, blob: String },

    /// The requested container does not exist.
    #[error("container not found: {0}")]
    ContainerNotFound(String),

    /// The blob exists and overwrite was not requested.
    #[error("blob already exists: {container}/{blob}")]
    AlreadyExists { container: String, blob: String },

    /// Blob name cannot be mapped onto the store.
    #[error("invalid blob name: {0}")]
    InvalidName(String),

    /// Invalid blob listing pattern.
    #[error("invalid pattern {pattern}: {reason}")]
    Pattern { pattern: String, reason: String },

    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors related to document data extraction.
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// The extractor produced no data for the document.
    #[error("no invoice data extracted from {0}")]
    NoData(String),

    /// Failed to read text out of the document.
    #[error("failed to read document: {0}")]
    Document(String),

    /// The extraction service request failed.
    #[error("extraction service request failed: {0}")]
    Service(String),

    /// The extraction service response could not be parsed.
    #[error("failed to parse extraction response: {0}")]
    Response(String),

    /// Extraction is not configured.
    #[error("extraction is not configured: {0}")]
    NotConfigured(String),
}

/// Errors related to the workflow journal and instance store.
#[derive(Error, Debug)]
pub enum JournalError {
    /// No instance with the given id.
    #[error("workflow instance not found: {0}")]
    InstanceNotFound(String),

    /// A persisted record could not be decoded.
    #[error("corrupt journal record for {instance_id} at step {step}: {reason}")]
    Corrupt {
        instance_id: String,
        step: String,
        reason: String,
    },

    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for the docpipe library.
pub type Result<T> = std::result::Result<T, PipelineError>;
