//! Process command - run a batch in the foreground and report the result.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use docpipe_core::{InvoiceBatchRequest, WorkflowResult};

use super::{build_runtime, load_config};

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Container holding the invoice folders
    container: String,

    /// Write the result JSON to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Also write a per-folder summary CSV
    #[arg(long)]
    summary: Option<PathBuf>,

    /// Blob store root directory (overrides config)
    #[arg(long)]
    blob_root: Option<PathBuf>,
}

pub async fn run(args: ProcessArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = load_config(config_path)?;
    if let Some(blob_root) = &args.blob_root {
        config.storage.blob_root = blob_root.clone();
    }

    info!("Processing container: {}", args.container);
    let runtime = build_runtime(config)?;

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    pb.set_message(format!("Processing {}", args.container));
    pb.enable_steady_tick(Duration::from_millis(120));

    let outcome = runtime.run_batch(&InvoiceBatchRequest::new(args.container.clone())).await;
    pb.finish_and_clear();

    let (id, result) = outcome?;
    debug!(instance_id = %id, "batch finished");

    let json = serde_json::to_string_pretty(&result)?;
    match &args.output {
        Some(path) => {
            fs::write(path, &json)?;
            eprintln!("{} Result written to {}", style("✓").green(), path.display());
        }
        None => println!("{}", json),
    }

    if let Some(path) = &args.summary {
        write_summary(path, &result)?;
        eprintln!("{} Summary written to {}", style("✓").green(), path.display());
    }

    print_summary(&id, &result, start.elapsed());

    Ok(())
}

fn print_summary(id: &str, result: &WorkflowResult, elapsed: Duration) {
    let failed: Vec<&WorkflowResult> = result.activity_results.iter().filter(|r| !r.is_valid()).collect();

    eprintln!();
    eprintln!(
        "{} Instance {} processed {} folders in {:?}",
        style("✓").green(),
        id,
        result.activity_results.len(),
        elapsed
    );
    eprintln!(
        "   {} valid, {} with errors",
        style(result.activity_results.len() - failed.len()).green(),
        style(failed.len()).red()
    );

    if !result.is_valid() {
        eprintln!();
        eprintln!("{}", style("Batch errors:").red());
        for message in result.messages() {
            eprintln!("  - {}", message);
        }
    }

    if !failed.is_empty() {
        eprintln!();
        eprintln!("{}", style("Folders with errors:").red());
        for folder in failed {
            eprintln!("  - {}: {}", folder.name, folder.to_str());
        }
    }
}

fn write_summary(path: &Path, result: &WorkflowResult) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record(["folder", "status", "messages"])?;

    for folder in &result.activity_results {
        let status = if folder.is_valid() { "valid" } else { "invalid" };
        wtr.write_record([folder.name.as_str(), status, &folder.messages().join("; ")])?;
    }

    wtr.flush()?;
    Ok(())
}
