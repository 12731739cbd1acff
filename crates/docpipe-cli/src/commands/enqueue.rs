//! Enqueue command - drop a batch request into the queue directory.

use std::fs;
use std::path::Path;

use clap::Args;
use console::style;

use docpipe_core::InvoiceBatchRequest;

use super::load_config;

/// Arguments for the enqueue command.
#[derive(Args)]
pub struct EnqueueArgs {
    /// Container holding the invoice folders
    container: String,
}

pub async fn run(args: EnqueueArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let queue_dir = &config.runtime.queue_dir;
    fs::create_dir_all(queue_dir)?;

    let request = InvoiceBatchRequest::new(args.container);
    let name = format!("{}.json", chrono::Utc::now().format("%Y%m%dT%H%M%S%.6f"));
    let tmp = queue_dir.join(format!(".{}.tmp", name));
    let path = queue_dir.join(&name);

    // The server only picks up complete messages
    fs::write(&tmp, serde_json::to_vec(&request)?)?;
    fs::rename(&tmp, &path)?;

    println!("{} Queued {}", style("✓").green(), path.display());

    Ok(())
}
