//! Core library for durable invoice extraction pipelines.
//!
//! This crate provides:
//! - Blob storage backends (local directory tree, in-memory)
//! - Invoice data extraction through a chat completions service
//! - Validation of extracted invoice data with named status flags
//! - Journaled batch and per-folder workflows with bounded retry
//! - A workflow runtime that starts, tracks and resumes instances

pub mod error;
pub mod extraction;
pub mod journal;
pub mod models;
pub mod retry;
pub mod runtime;
pub mod storage;
pub mod validation;
pub mod workflow;

pub use error::{PipelineError, Result};
pub use extraction::{DocumentExtractor, ExtractionOptions};
#[cfg(feature = "native")]
pub use extraction::ChatCompletionsExtractor;
pub use journal::{FileWorkflowStore, InstanceRecord, InstanceStatus, MemoryWorkflowStore, WorkflowStore};
pub use models::{
    InvoiceBatchRequest, InvoiceData, InvoiceFolder, InvoiceProduct, InvoiceSignature, PipelineConfig,
    SignatureType, Validate, ValidationResult, WorkflowResult,
};
pub use retry::RetryPolicy;
pub use runtime::{StatusHandle, WorkflowRuntime};
pub use storage::{BlobStore, LocalBlobStore, MemoryBlobStore};
pub use validation::{InvoiceValidationResult, ValidationStatus};
pub use workflow::{Services, StepOutcome, WorkflowContext};
