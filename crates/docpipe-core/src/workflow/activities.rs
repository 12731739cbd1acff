//! Activities: the workflow steps that call external collaborators.
//!
//! Each activity validates its own request. Invalid input is reported through
//! the return value (`None` / `false`) rather than as an error, so it is never
//! retried. Collaborator failures are returned as errors and retried by the
//! caller's [`WorkflowContext`](super::WorkflowContext).

use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use super::Services;
use crate::error::{ExtractionError, PipelineError, StorageError};
use crate::models::{InvoiceBatchRequest, InvoiceData, InvoiceFolder, Validate, ValidationResult};

pub const GET_INVOICE_FOLDERS: &str = "GetInvoiceFolders";
pub const EXTRACT_INVOICE_DATA: &str = "ExtractInvoiceData";
pub const WRITE_BYTES_TO_BLOB: &str = "WriteBytesToBlob";

/// Discover the invoice folders in the request's container.
#[instrument(skip_all, fields(container = %request.container_name))]
pub async fn get_invoice_folders(
    services: &Services,
    request: &InvoiceBatchRequest,
) -> Result<Vec<InvoiceFolder>, StorageError> {
    let grouped = services
        .blobs
        .list_blobs(
            services.account(),
            &request.container_name,
            &services.config.storage.invoice_pattern,
        )
        .await?;

    info!("Found {} folders in {}", grouped.len(), request.container_name);

    Ok(grouped
        .into_iter()
        .map(|(name, files)| InvoiceFolder::new(request.container_name.clone(), name, files))
        .collect())
}

/// Request for [`extract_invoice_data`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractInvoiceDataRequest {
    pub container_name: String,
    pub blob_name: String,
}

impl ExtractInvoiceDataRequest {
    pub fn new(container_name: impl Into<String>, blob_name: impl Into<String>) -> Self {
        Self {
            container_name: container_name.into(),
            blob_name: blob_name.into(),
        }
    }
}

impl Validate for ExtractInvoiceDataRequest {
    fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::new();

        if self.container_name.is_empty() {
            result.add_error("container_name is required");
        }

        if self.blob_name.is_empty() {
            result.add_error("blob_name is required");
        }

        result
    }
}

/// Read a document blob and extract its invoice data.
///
/// Returns `Ok(None)` for invalid input. An extractor that returns no data is
/// an error, so it is retried like any other collaborator failure.
#[instrument(skip_all, fields(blob = %request.blob_name))]
pub async fn extract_invoice_data(
    services: &Services,
    request: &ExtractInvoiceDataRequest,
) -> Result<Option<InvoiceData>, PipelineError> {
    let validation = request.validate();
    if !validation.is_valid {
        error!("Invalid input: {}", validation.to_str());
        return Ok(None);
    }

    let content = services
        .blobs
        .get_content(services.account(), &request.container_name, &request.blob_name)
        .await?;

    let data = services
        .extractor
        .extract(&content, &services.extraction_options)
        .await?
        .ok_or_else(|| ExtractionError::NoData(request.blob_name.clone()))?;

    Ok(Some(data))
}

/// Request for [`write_bytes_to_blob`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteBytesToBlobRequest {
    pub storage_account_name: String,
    pub container_name: String,
    pub blob_name: String,
    pub content: Vec<u8>,
    pub overwrite: bool,
}

impl WriteBytesToBlobRequest {
    /// An overwriting write.
    pub fn new(
        storage_account_name: impl Into<String>,
        container_name: impl Into<String>,
        blob_name: impl Into<String>,
        content: Vec<u8>,
    ) -> Self {
        Self {
            storage_account_name: storage_account_name.into(),
            container_name: container_name.into(),
            blob_name: blob_name.into(),
            content,
            overwrite: true,
        }
    }
}

impl Validate for WriteBytesToBlobRequest {
    fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::new();

        if self.storage_account_name.is_empty() {
            result.add_error("storage_account_name is required");
        }

        if self.container_name.is_empty() {
            result.add_error("container_name is required");
        }

        if self.blob_name.is_empty() {
            result.add_error("blob_name is required");
        }

        if self.content.is_empty() {
            result.add_error("content is required");
        }

        result
    }
}

/// Write bytes to a blob. Returns `Ok(false)` for invalid input.
#[instrument(skip_all, fields(blob = %request.blob_name, bytes = request.content.len()))]
pub async fn write_bytes_to_blob(services: &Services, request: &WriteBytesToBlobRequest) -> Result<bool, StorageError> {
    let validation = request.validate();
    if !validation.is_valid {
        error!("Invalid input: {}", validation.to_str());
        return Ok(false);
    }

    services
        .blobs
        .put_content(
            &request.storage_account_name,
            &request.container_name,
            &request.blob_name,
            &request.content,
            request.overwrite,
        )
        .await?;

    Ok(true)
}
