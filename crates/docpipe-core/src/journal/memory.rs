use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::{InstanceRecord, Result, StepRecord, WorkflowStore};

/// In-memory workflow store for tests and one-shot runs.
#[derive(Debug, Default)]
pub struct MemoryWorkflowStore {
    instances: RwLock<BTreeMap<String, InstanceRecord>>,
    steps: RwLock<BTreeMap<String, Vec<StepRecord>>>,
}

impl MemoryWorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkflowStore for MemoryWorkflowStore {
    async fn save_instance(&self, record: &InstanceRecord) -> Result<()> {
        self.instances
            .write()
            .await
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn load_instance(&self, id: &str) -> Result<Option<InstanceRecord>> {
        Ok(self.instances.read().await.get(id).cloned())
    }

    async fn list_instances(&self) -> Result<Vec<InstanceRecord>> {
        let mut records: Vec<InstanceRecord> = self.instances.read().await.values().cloned().collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(records)
    }

    async fn purge_instance(&self, id: &str) -> Result<bool> {
        let removed = self.instances.write().await.remove(id).is_some();
        self.steps.write().await.remove(id);
        Ok(removed)
    }

    async fn append_step(&self, instance_id: &str, step: &StepRecord) -> Result<()> {
        self.steps
            .write()
            .await
            .entry(instance_id.to_string())
            .or_default()
            .push(step.clone());
        Ok(())
    }

    async fn load_steps(&self, instance_id: &str) -> Result<Vec<StepRecord>> {
        Ok(self.steps.read().await.get(instance_id).cloned().unwrap_or_default())
    }
}
