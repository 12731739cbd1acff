//! Serve command - HTTP and queue triggers for batch workflows.

use std::path::{Path, PathBuf};
use std::time::Duration;

use axum::{
    Router,
    extract::{Path as UrlPath, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use clap::Args;
use serde::Serialize;
use tokio::fs;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use docpipe_core::{InstanceRecord, InvoiceBatchRequest, StatusHandle, WorkflowRuntime};

use super::{build_runtime, load_config};

/// Arguments for the serve command.
#[derive(Args)]
pub struct ServeArgs {
    /// Address to bind (overrides config)
    #[arg(short, long)]
    bind: Option<String>,

    /// Disable the queue directory watcher
    #[arg(long)]
    no_queue: bool,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn internal_error(e: impl std::fmt::Display) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse { error: e.to_string() }),
    )
}

pub async fn run(args: ServeArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }

    let bind = config.server.bind.clone();
    let queue_dir = config.runtime.queue_dir.clone();
    let poll_interval = Duration::from_millis(config.runtime.queue_poll_interval_ms.max(10));
    let runtime = build_runtime(config)?;

    let resumed = runtime.resume_incomplete().await?;
    if !resumed.is_empty() {
        info!("Resumed {} incomplete workflow instances", resumed.len());
    }

    if !args.no_queue {
        tokio::spawn(watch_queue(runtime.clone(), queue_dir, poll_interval));
    }

    let app = router(runtime);
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await?;

    Ok(())
}

fn router(runtime: WorkflowRuntime) -> Router {
    Router::new()
        .route("/invoices", post(start_batch))
        .route("/runtime/instances/:id", get(get_instance).delete(purge_instance))
        .layer(TraceLayer::new_for_http())
        .with_state(runtime)
}

/// POST /invoices
async fn start_batch(
    State(runtime): State<WorkflowRuntime>,
    Json(request): Json<InvoiceBatchRequest>,
) -> Result<(StatusCode, Json<StatusHandle>), (StatusCode, Json<ErrorResponse>)> {
    match runtime.start_new(&request).await {
        Ok(id) => {
            info!("Started workflow with instance ID: {}", id);
            Ok((StatusCode::ACCEPTED, Json(runtime.status_handle(&id))))
        }
        Err(e) => Err(internal_error(e)),
    }
}

/// GET /runtime/instances/:id
async fn get_instance(
    State(runtime): State<WorkflowRuntime>,
    UrlPath(id): UrlPath<String>,
) -> Result<Json<InstanceRecord>, (StatusCode, Json<ErrorResponse>)> {
    match runtime.status(&id).await {
        Ok(Some(record)) => Ok(Json(record)),
        Ok(None) => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Instance '{}' not found", id),
            }),
        )),
        Err(e) => Err(internal_error(e)),
    }
}

/// DELETE /runtime/instances/:id
async fn purge_instance(
    State(runtime): State<WorkflowRuntime>,
    UrlPath(id): UrlPath<String>,
) -> Result<StatusCode, (StatusCode, Json<ErrorResponse>)> {
    match runtime.purge(&id).await {
        Ok(true) => Ok(StatusCode::OK),
        Ok(false) => Ok(StatusCode::NOT_FOUND),
        Err(e) => Err(internal_error(e)),
    }
}

/// Poll `queue_dir` for request files and start one batch per message.
///
/// Consumed messages are deleted. Messages that cannot be parsed are moved
/// to `{queue_dir}/poison`.
async fn watch_queue(runtime: WorkflowRuntime, queue_dir: PathBuf, interval: Duration) {
    if let Err(e) = fs::create_dir_all(&queue_dir).await {
        error!("Cannot create queue directory {}: {}", queue_dir.display(), e);
        return;
    }
    info!("Watching queue directory {}", queue_dir.display());

    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        let messages = match pending_messages(&queue_dir).await {
            Ok(messages) => messages,
            Err(e) => {
                warn!("Cannot list queue directory {}: {}", queue_dir.display(), e);
                continue;
            }
        };
        for path in messages {
            if let Err(e) = consume_message(&runtime, &queue_dir, &path).await {
                warn!("Failed to consume queue message {}: {}", path.display(), e);
            }
        }
    }
}

/// Queued `*.json` messages in name order. Files still being written are dot-prefixed temps.
async fn pending_messages(queue_dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(queue_dir).await?;
    let mut paths = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if entry.file_type().await?.is_file() && path.extension().and_then(|e| e.to_str()) == Some("json") {
            paths.push(path);
        }
    }

    paths.sort();
    Ok(paths)
}

async fn consume_message(runtime: &WorkflowRuntime, queue_dir: &Path, path: &Path) -> anyhow::Result<()> {
    let bytes = fs::read(path).await?;

    let request: InvoiceBatchRequest = match serde_json::from_slice(&bytes) {
        Ok(request) => request,
        Err(e) => {
            let poison = queue_dir.join("poison");
            fs::create_dir_all(&poison).await?;
            if let Some(name) = path.file_name() {
                fs::rename(path, poison.join(name)).await?;
            }
            anyhow::bail!("invalid message: {}", e);
        }
    };

    let id = runtime.start_new(&request).await?;
    fs::remove_file(path).await?;

    info!("Started workflow with instance ID: {}", id);
    info!("Response: {}", serde_json::to_string(&runtime.status_handle(&id))?);

    Ok(())
}
