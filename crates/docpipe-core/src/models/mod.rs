//! Data models: workflow results, invoice records, requests and configuration.

pub mod config;
pub mod invoice;
pub mod request;
pub mod result;

pub use config::PipelineConfig;
pub use invoice::{InvoiceData, InvoiceProduct, InvoiceSignature, SignatureType};
pub use request::{InvoiceBatchRequest, InvoiceFolder, Validate};
pub use result::{ValidationResult, WorkflowResult};
