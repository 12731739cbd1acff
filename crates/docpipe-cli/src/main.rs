//! CLI application for durable invoice extraction workflows.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::{config, enqueue, process, serve, status};

/// docpipe - Extract, validate and store invoice data from blob containers
#[derive(Parser)]
#[command(name = "docpipe")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP and queue triggers
    Serve(serve::ServeArgs),

    /// Process every invoice folder in a container and wait for the result
    Process(process::ProcessArgs),

    /// Show the status of a workflow instance
    Status(status::StatusArgs),

    /// Queue a batch request for a running server
    Enqueue(enqueue::EnqueueArgs),

    /// Manage configuration
    Config(config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Serve(args) => serve::run(args, config_path).await,
        Commands::Process(args) => process::run(args, config_path).await,
        Commands::Status(args) => status::run(args, config_path).await,
        Commands::Enqueue(args) => enqueue::run(args, config_path).await,
        Commands::Config(args) => config::run(args, config_path).await,
    }
}
