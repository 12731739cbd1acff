//! Workflow client: starts batch instances, reports status and resumes work
//! interrupted by a restart.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::journal::{InstanceRecord, InstanceStatus};
use crate::models::{InvoiceBatchRequest, WorkflowResult};
use crate::workflow::{Services, process_invoice_batch};

/// URIs for locating and purging a started instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusHandle {
    pub id: String,
    pub status_query_get_uri: String,
    pub purge_history_delete_uri: String,
}

impl StatusHandle {
    pub fn new(base_url: &str, id: &str) -> Self {
        let uri = format!("{}/runtime/instances/{}", base_url.trim_end_matches('/'), id);
        Self {
            id: id.to_string(),
            status_query_get_uri: uri.clone(),
            purge_history_delete_uri: uri,
        }
    }
}

/// Client for the invoice workflows. Cheap to clone.
#[derive(Clone)]
pub struct WorkflowRuntime {
    services: Arc<Services>,
}

impl WorkflowRuntime {
    pub fn new(services: Services) -> Self {
        Self {
            services: Arc::new(services),
        }
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    /// Status handle for `id` using the configured public base URL.
    pub fn status_handle(&self, id: &str) -> StatusHandle {
        StatusHandle::new(&self.services.config.server.public_base_url(), id)
    }

    async fn create_instance(&self, request: &InvoiceBatchRequest) -> crate::Result<InstanceRecord> {
        let id = Uuid::new_v4().to_string();
        let record = InstanceRecord::new(id, process_invoice_batch::NAME, serde_json::to_value(request)?);
        self.services.store.save_instance(&record).await?;
        Ok(record)
    }

    /// Persist a new batch instance and run it in the background.
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn start_new(&self, request: &InvoiceBatchRequest) -> crate::Result<String> {
        let record = self.create_instance(request).await?;
        let id = record.id.clone();
        info!(instance_id = %id, container = %request.container_name, "Started workflow");

        let runtime = self.clone();
        tokio::spawn(async move {
            let instance_id = record.id.clone();
            if let Err(e) = process_invoice_batch::run_instance_record(&runtime.services, record).await {
                error!(instance_id = %instance_id, error = %e, "workflow instance failed");
            }
        });

        Ok(id)
    }

    /// Persist a new batch instance and run it to completion.
    pub async fn run_batch(&self, request: &InvoiceBatchRequest) -> crate::Result<(String, WorkflowResult)> {
        let record = self.create_instance(request).await?;
        let id = record.id.clone();
        let result = process_invoice_batch::run_instance_record(&self.services, record).await?;
        Ok((id, result))
    }

    /// Run (or resume) an existing batch instance to completion.
    pub async fn run_existing(&self, id: &str) -> crate::Result<WorkflowResult> {
        let record = self
            .services
            .store
            .load_instance(id)
            .await?
            .ok_or_else(|| crate::error::JournalError::InstanceNotFound(id.to_string()))?;
        process_invoice_batch::run_instance_record(&self.services, record).await
    }

    /// Top-level instances that have not reached a final state.
    ///
    /// Sub-workflows are resumed through their parent's replay.
    pub async fn incomplete_instances(&self) -> crate::Result<Vec<String>> {
        Ok(self
            .services
            .store
            .list_instances()
            .await?
            .into_iter()
            .filter(|r| r.parent_id.is_none() && !r.status.is_terminal())
            .map(|r| r.id)
            .collect())
    }

    /// Restart every incomplete top-level instance in the background.
    pub async fn resume_incomplete(&self) -> crate::Result<Vec<String>> {
        let ids = self.incomplete_instances().await?;

        for id in &ids {
            info!(instance_id = %id, "resuming workflow instance");
            let runtime = self.clone();
            let id = id.clone();
            tokio::spawn(async move {
                if let Err(e) = runtime.run_existing(&id).await {
                    warn!(instance_id = %id, error = %e, "resumed instance failed");
                }
            });
        }

        Ok(ids)
    }

    pub async fn status(&self, id: &str) -> crate::Result<Option<InstanceRecord>> {
        Ok(self.services.store.load_instance(id).await?)
    }

    /// Status of `id` or `None` if unknown.
    pub async fn instance_status(&self, id: &str) -> crate::Result<Option<InstanceStatus>> {
        Ok(self.status(id).await?.map(|r| r.status))
    }

    /// Remove an instance, its sub-workflow instances and their journals.
    pub async fn purge(&self, id: &str) -> crate::Result<bool> {
        let store = &self.services.store;
        for child in store.list_instances().await? {
            if child.parent_id.as_deref() == Some(id) {
                store.purge_instance(&child.id).await?;
            }
        }
        Ok(store.purge_instance(id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_status_handle_serializes_camel_case() {
        let handle = StatusHandle::new("http://localhost:7071/", "abc");
        let json = serde_json::to_value(&handle).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": "abc",
                "statusQueryGetUri": "http://localhost:7071/runtime/instances/abc",
                "purgeHistoryDeleteUri": "http://localhost:7071/runtime/instances/abc",
            })
        );
    }
}
