//! Persistence for workflow instances and their step journals.
//!
//! Each instance has one record plus an append-only list of step outcomes.
//! Replaying an instance reads the journal back and skips every step that
//! already has an outcome.

mod file;
mod memory;

pub use file::FileWorkflowStore;
pub use memory::MemoryWorkflowStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::JournalError;

/// Result type for journal operations.
pub type Result<T> = std::result::Result<T, JournalError>;

/// Lifecycle state of a workflow instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstanceStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl InstanceStatus {
    /// Whether the instance has reached a final state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, InstanceStatus::Completed | InstanceStatus::Failed)
    }
}

/// A persisted workflow instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceRecord {
    pub id: String,

    /// Registered workflow name.
    pub workflow: String,

    /// Parent instance for sub-workflows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,

    pub status: InstanceStatus,

    /// Workflow input as JSON.
    pub input: Value,

    /// Workflow output once completed.
    #[serde(default)]
    pub output: Option<Value>,

    /// Fatal error once failed.
    #[serde(default)]
    pub error: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InstanceRecord {
    pub fn new(id: impl Into<String>, workflow: impl Into<String>, input: Value) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            workflow: workflow.into(),
            parent_id: None,
            status: InstanceStatus::Pending,
            input,
            output: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn mark_running(&mut self) {
        self.status = InstanceStatus::Running;
        self.updated_at = Utc::now();
    }

    pub fn mark_completed(&mut self, output: Value) {
        self.status = InstanceStatus::Completed;
        self.output = Some(output);
        self.error = None;
        self.updated_at = Utc::now();
    }

    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.status = InstanceStatus::Failed;
        self.error = Some(error.into());
        self.updated_at = Utc::now();
    }
}

/// Recorded outcome of one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepResult {
    Completed { value: Value },
    Failed { error: String },
}

/// One journal entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub step_id: String,
    #[serde(flatten)]
    pub result: StepResult,
    pub recorded_at: DateTime<Utc>,
}

impl StepRecord {
    pub fn completed(step_id: impl Into<String>, value: Value) -> Self {
        Self {
            step_id: step_id.into(),
            result: StepResult::Completed { value },
            recorded_at: Utc::now(),
        }
    }

    pub fn failed(step_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            step_id: step_id.into(),
            result: StepResult::Failed { error: error.into() },
            recorded_at: Utc::now(),
        }
    }
}

/// Persistence trait for workflow instances and step journals.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    // ── Instances ──

    /// Insert or replace an instance record.
    async fn save_instance(&self, record: &InstanceRecord) -> Result<()>;
    async fn load_instance(&self, id: &str) -> Result<Option<InstanceRecord>>;
    async fn list_instances(&self) -> Result<Vec<InstanceRecord>>;

    /// Remove an instance and its journal. Returns false if it did not exist.
    async fn purge_instance(&self, id: &str) -> Result<bool>;

    // ── Journal (append-only) ──

    async fn append_step(&self, instance_id: &str, step: &StepRecord) -> Result<()>;

    /// All recorded steps, in append order.
    async fn load_steps(&self, instance_id: &str) -> Result<Vec<StepRecord>>;
}
