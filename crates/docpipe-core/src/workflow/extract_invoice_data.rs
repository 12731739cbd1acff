//! Per-folder workflow: extract, store and validate every invoice file in order.

use tracing::{info, instrument};
use uuid::Uuid;

use super::activities::{self, ExtractInvoiceDataRequest, WriteBytesToBlobRequest};
use super::{Services, StepOutcome, WorkflowContext, run_instance};
use crate::journal::InstanceRecord;
use crate::models::{InvoiceFolder, Validate, WorkflowResult};
use crate::validation;

pub const NAME: &str = "ExtractInvoiceDataWorkflow";

/// Step id of the extraction for `file`.
pub fn extract_step_id(file: &str) -> String {
    format!("{}:{}", activities::EXTRACT_INVOICE_DATA, file)
}

/// Step id of a blob write.
pub fn write_step_id(blob: &str) -> String {
    format!("{}:{}", activities::WRITE_BYTES_TO_BLOB, blob)
}

/// Deterministic instance id for the folder's sub-workflow under `parent_id`.
pub fn child_instance_id(parent_id: &str, folder_name: &str) -> String {
    let namespace = Uuid::parse_str(parent_id)
        .unwrap_or_else(|_| Uuid::new_v5(&Uuid::NAMESPACE_OID, parent_id.as_bytes()));
    Uuid::new_v5(&namespace, folder_name.as_bytes()).to_string()
}

/// Run the folder as a journaled sub-workflow instance of `parent_id`.
///
/// The instance id is stable, so a retried or resumed call picks up the
/// child's own journal instead of starting over.
pub async fn run_as_child(services: &Services, parent_id: &str, folder: &InvoiceFolder) -> crate::Result<WorkflowResult> {
    let id = child_instance_id(parent_id, &folder.name);
    let record = match services.store.load_instance(&id).await? {
        Some(record) => record,
        None => InstanceRecord::new(id, NAME, serde_json::to_value(folder)?).with_parent(parent_id),
    };

    run_instance(services, record, |ctx| async move { run(&ctx, services, folder).await }).await
}

/// Process one invoice folder.
///
/// Per-file failures are recorded in the result and the next file is
/// attempted. `Err` is returned only for journal failures.
#[instrument(skip_all, fields(instance_id = %ctx.instance_id(), folder = %folder.name))]
pub async fn run(ctx: &WorkflowContext, services: &Services, folder: &InvoiceFolder) -> crate::Result<WorkflowResult> {
    let mut result = WorkflowResult::new(folder.name.clone());

    let validation = folder.validate();
    if !validation.is_valid {
        result.merge(&validation);
        return Ok(result);
    }

    result.add_message("InvoiceFolder.validate", "input is valid");

    for invoice in &folder.invoice_file_names {
        let request = ExtractInvoiceDataRequest::new(folder.container_name.clone(), invoice.clone());
        let data = ctx
            .call_activity(&extract_step_id(invoice), || activities::extract_invoice_data(services, &request))
            .await?
            .ok()
            .flatten();

        let Some(data) = data else {
            result.add_error(
                activities::EXTRACT_INVOICE_DATA,
                format!("Failed to extract data for {}.", invoice),
            );
            continue;
        };

        let data_blob = format!("{}.Data.json", invoice);
        if !write(ctx, services, folder, &data_blob, serde_json::to_vec(&data)?).await? {
            result.add_error(
                activities::WRITE_BYTES_TO_BLOB,
                format!("Failed to store extracted data for {}.", invoice),
            );
            continue;
        }

        let invoice_validation = validation::validate(invoice, &data);
        result.merge(&invoice_validation);

        let validation_blob = format!("{}.Validation.json", invoice);
        if !write(ctx, services, folder, &validation_blob, serde_json::to_vec(&invoice_validation)?).await? {
            result.add_error(
                activities::WRITE_BYTES_TO_BLOB,
                format!("Failed to store validation result for {}.", invoice),
            );
        }
    }

    info!(files = folder.invoice_file_names.len(), valid = result.is_valid(), "folder processed");
    Ok(result)
}

async fn write(
    ctx: &WorkflowContext,
    services: &Services,
    folder: &InvoiceFolder,
    blob: &str,
    content: Vec<u8>,
) -> crate::Result<bool> {
    let request = WriteBytesToBlobRequest::new(
        services.account(),
        folder.container_name.clone(),
        blob,
        content,
    );
    let outcome = ctx
        .call_activity(&write_step_id(blob), || activities::write_bytes_to_blob(services, &request))
        .await?;

    Ok(matches!(outcome, StepOutcome::Completed(true)))
}
