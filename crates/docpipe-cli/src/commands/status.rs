//! Status command - show a workflow instance record.

use std::path::Path;

use clap::Args;

use docpipe_core::WorkflowStore;

use super::{load_config, open_store};

/// Arguments for the status command.
#[derive(Args)]
pub struct StatusArgs {
    /// Instance id returned when the batch was started
    id: String,

    /// Also list sub-workflow instances
    #[arg(long)]
    children: bool,
}

pub async fn run(args: StatusArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let store = open_store(&config);

    let record = store
        .load_instance(&args.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Workflow instance not found: {}", args.id))?;

    if !args.children {
        println!("{}", serde_json::to_string_pretty(&record)?);
        return Ok(());
    }

    let children: Vec<_> = store
        .list_instances()
        .await?
        .into_iter()
        .filter(|r| r.parent_id.as_deref() == Some(args.id.as_str()))
        .collect();

    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "instance": record,
            "children": children,
        }))?
    );

    Ok(())
}
