//! Workflow input records.

use serde::{Deserialize, Serialize};

use super::result::ValidationResult;

/// Records that can check their own required fields.
pub trait Validate {
    /// Validate the record and return any problems found.
    fn validate(&self) -> ValidationResult;
}

/// Request to process every invoice folder in a storage container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceBatchRequest {
    /// Container holding the invoice folders.
    #[serde(default)]
    pub container_name: String,
}

impl InvoiceBatchRequest {
    pub fn new(container_name: impl Into<String>) -> Self {
        Self {
            container_name: container_name.into(),
        }
    }
}

impl Validate for InvoiceBatchRequest {
    fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::new();

        if self.container_name.is_empty() {
            result.add_error("container_name is required");
        }

        result
    }
}

/// A set of invoice files grouped by their top-level folder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceFolder {
    /// Container holding the invoice files.
    #[serde(default)]
    pub container_name: String,

    /// Folder name (first path segment of the blobs).
    #[serde(default)]
    pub name: String,

    /// Full blob names of the invoice files, in listing order.
    #[serde(default)]
    pub invoice_file_names: Vec<String>,
}

impl InvoiceFolder {
    pub fn new(
        container_name: impl Into<String>,
        name: impl Into<String>,
        invoice_file_names: Vec<String>,
    ) -> Self {
        Self {
            container_name: container_name.into(),
            name: name.into(),
            invoice_file_names,
        }
    }
}

impl Validate for InvoiceFolder {
    fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::new();

        if self.container_name.is_empty() {
            result.add_error("container_name is required");
        }

        if self.name.is_empty() {
            result.add_error("name is required");
        }

        if self.invoice_file_names.is_empty() {
            result.add_error("invoice_file_names is required");
        }

        result
    }
}
