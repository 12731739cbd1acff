//! Batch workflow: discover invoice folders and process each as a sub-workflow.

use futures::future::join_all;
use tracing::instrument;

use super::activities;
use super::extract_invoice_data;
use super::{Services, StepOutcome, WorkflowContext, run_instance};
use crate::journal::InstanceRecord;
use crate::models::{InvoiceBatchRequest, InvoiceFolder, Validate, ValidationResult, WorkflowResult};

pub const NAME: &str = "ProcessInvoiceBatchWorkflow";

/// Step id of the sub-workflow call for a folder.
pub fn sub_workflow_step_id(folder_name: &str) -> String {
    format!("{}:{}", extract_invoice_data::NAME, folder_name)
}

/// Run a batch instance to completion, replaying its journal first.
pub async fn run_instance_record(services: &Services, record: InstanceRecord) -> crate::Result<WorkflowResult> {
    let request: InvoiceBatchRequest = serde_json::from_value(record.input.clone())?;
    run_instance(services, record, |ctx| async move { run(&ctx, services, &request).await }).await
}

/// Process every invoice folder in the request's container.
///
/// Folder sub-workflows run concurrently. Their results are attached as
/// children in discovery order and never merged into the batch result.
#[instrument(skip_all, fields(instance_id = %ctx.instance_id(), container = %request.container_name))]
pub async fn run(ctx: &WorkflowContext, services: &Services, request: &InvoiceBatchRequest) -> crate::Result<WorkflowResult> {
    let mut result = WorkflowResult::new(NAME);

    let validation = request.validate();
    if !validation.is_valid {
        result.merge(&validation);
        return Ok(result);
    }

    result.add_message("InvoiceBatchRequest.validate", "input is valid");

    let folders = match ctx
        .call_activity(activities::GET_INVOICE_FOLDERS, || {
            activities::get_invoice_folders(services, request)
        })
        .await?
    {
        StepOutcome::Completed(folders) => folders,
        StepOutcome::Failed(error) => {
            result.add_error(
                activities::GET_INVOICE_FOLDERS,
                format!("Failed to retrieve invoice folders: {}", error),
            );
            return Ok(result);
        }
    };

    result.add_message(
        activities::GET_INVOICE_FOLDERS,
        format!("Retrieved {} invoice folders.", folders.len()),
    );

    let children = join_all(folders.iter().map(|folder| process_folder(ctx, services, folder))).await;

    for child in children {
        result.add_activity_result(extract_invoice_data::NAME, "Processed invoice folder.", child?);
    }

    Ok(result)
}

async fn process_folder(ctx: &WorkflowContext, services: &Services, folder: &InvoiceFolder) -> crate::Result<WorkflowResult> {
    let outcome = ctx
        .call_activity(&sub_workflow_step_id(&folder.name), || {
            extract_invoice_data::run_as_child(services, ctx.instance_id(), folder)
        })
        .await?;

    Ok(match outcome {
        StepOutcome::Completed(child) => child,
        StepOutcome::Failed(error) => failed_child(&folder.name, &error),
    })
}

/// Result standing in for a sub-workflow that could not complete.
fn failed_child(folder_name: &str, error: &str) -> WorkflowResult {
    let mut failure = ValidationResult::new();
    failure.add_error(format!("{}::run - {}", extract_invoice_data::NAME, error));

    let mut child = WorkflowResult::new(folder_name);
    child.merge(&failure);
    child
}
