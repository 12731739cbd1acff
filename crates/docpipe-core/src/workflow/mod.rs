//! Durable invoice workflows.
//!
//! A workflow body runs against a [`WorkflowContext`]. Every call that reaches
//! an external collaborator goes through [`WorkflowContext::call_activity`],
//! which journals the outcome under a stable step id. When an instance is run
//! again after a restart, recorded outcomes are returned without repeating the
//! call, so the body deterministically reaches the same point and continues.

pub mod activities;
pub mod extract_invoice_data;
pub mod process_invoice_batch;

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::error::{JournalError, PipelineError};
use crate::extraction::{DocumentExtractor, ExtractionOptions};
use crate::journal::{InstanceRecord, InstanceStatus, StepRecord, StepResult, WorkflowStore};
use crate::models::{PipelineConfig, WorkflowResult};
use crate::retry::RetryPolicy;
use crate::storage::BlobStore;

/// Collaborators and settings shared by every workflow and activity.
pub struct Services {
    pub blobs: Arc<dyn BlobStore>,
    pub extractor: Arc<dyn DocumentExtractor>,
    pub store: Arc<dyn WorkflowStore>,
    pub config: PipelineConfig,
    pub extraction_options: ExtractionOptions,
}

impl Services {
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        extractor: Arc<dyn DocumentExtractor>,
        store: Arc<dyn WorkflowStore>,
        config: PipelineConfig,
    ) -> Self {
        let extraction_options = ExtractionOptions::for_invoices(&config.extraction);
        Self {
            blobs,
            extractor,
            store,
            config,
            extraction_options,
        }
    }

    /// Storage account holding the invoice containers.
    pub fn account(&self) -> &str {
        &self.config.storage.account_name
    }
}

/// Outcome of a journaled step.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome<T> {
    Completed(T),
    /// Every attempt failed; carries the last error.
    Failed(String),
}

impl<T> StepOutcome<T> {
    pub fn ok(self) -> Option<T> {
        match self {
            StepOutcome::Completed(value) => Some(value),
            StepOutcome::Failed(_) => None,
        }
    }
}

/// Replay-aware execution context for one workflow instance.
pub struct WorkflowContext {
    instance_id: String,
    store: Arc<dyn WorkflowStore>,
    retry: RetryPolicy,
    history: HashMap<String, StepResult>,
}

impl WorkflowContext {
    /// Load the instance's journal so recorded steps replay.
    pub async fn load(
        instance_id: impl Into<String>,
        store: Arc<dyn WorkflowStore>,
        retry: RetryPolicy,
    ) -> crate::Result<Self> {
        let instance_id = instance_id.into();
        let history: HashMap<String, StepResult> = store
            .load_steps(&instance_id)
            .await?
            .into_iter()
            .map(|step| (step.step_id, step.result))
            .collect();

        if !history.is_empty() {
            debug!(instance_id = %instance_id, steps = history.len(), "replaying journal");
        }

        Ok(Self {
            instance_id,
            store,
            retry,
            history,
        })
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Whether `step_id` already has a recorded outcome.
    pub fn is_replayed(&self, step_id: &str) -> bool {
        self.history.contains_key(step_id)
    }

    /// Run a step under the retry policy, or return its recorded outcome.
    ///
    /// `Err` is reserved for journal failures. An operation that keeps failing
    /// yields `StepOutcome::Failed`, which is journaled like a success.
    pub async fn call_activity<T, E, F, Fut>(&self, step_id: &str, operation: F) -> crate::Result<StepOutcome<T>>
    where
        T: Serialize + DeserializeOwned,
        E: fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        if let Some(recorded) = self.history.get(step_id) {
            debug!(instance_id = %self.instance_id, step_id, "step replayed from journal");
            return match recorded {
                StepResult::Completed { value } => serde_json::from_value(value.clone())
                    .map(StepOutcome::Completed)
                    .map_err(|e| self.corrupt(step_id, e)),
                StepResult::Failed { error } => Ok(StepOutcome::Failed(error.clone())),
            };
        }

        match self.retry.execute(step_id, operation).await {
            Ok(value) => {
                let json = serde_json::to_value(&value)?;
                self.store
                    .append_step(&self.instance_id, &StepRecord::completed(step_id, json))
                    .await?;
                Ok(StepOutcome::Completed(value))
            }
            Err(exhausted) => {
                let error = exhausted.last_error.to_string();
                self.store
                    .append_step(&self.instance_id, &StepRecord::failed(step_id, error.clone()))
                    .await?;
                Ok(StepOutcome::Failed(error))
            }
        }
    }

    fn corrupt(&self, step_id: &str, error: serde_json::Error) -> PipelineError {
        JournalError::Corrupt {
            instance_id: self.instance_id.clone(),
            step: step_id.to_string(),
            reason: error.to_string(),
        }
        .into()
    }
}

/// Drive one instance through its lifecycle and persist the outcome.
///
/// A completed instance returns its stored output without running `body`.
/// Otherwise the instance is marked running, `body` runs against a context
/// loaded from the journal, and the record ends completed or failed.
pub(crate) async fn run_instance<F, Fut>(
    services: &Services,
    mut record: InstanceRecord,
    body: F,
) -> crate::Result<WorkflowResult>
where
    F: FnOnce(WorkflowContext) -> Fut,
    Fut: Future<Output = crate::Result<WorkflowResult>>,
{
    if record.status == InstanceStatus::Completed {
        if let Some(output) = &record.output {
            debug!(instance_id = %record.id, "instance already completed");
            return Ok(serde_json::from_value(output.clone())?);
        }
    }

    record.mark_running();
    services.store.save_instance(&record).await?;

    let outcome = match WorkflowContext::load(record.id.clone(), services.store.clone(), services.config.retry.clone()).await {
        Ok(ctx) => body(ctx).await,
        Err(e) => Err(e),
    };

    match outcome {
        Ok(result) => {
            record.mark_completed(serde_json::to_value(&result)?);
            services.store.save_instance(&record).await?;
            info!(instance_id = %record.id, workflow = %record.workflow, valid = result.is_valid(), "instance completed");
            Ok(result)
        }
        Err(e) => {
            error!(instance_id = %record.id, workflow = %record.workflow, error = %e, "instance failed");
            record.mark_failed(e.to_string());
            if let Err(save_error) = services.store.save_instance(&record).await {
                warn!(instance_id = %record.id, error = %save_error, "could not record instance failure");
            }
            Err(e)
        }
    }
}
