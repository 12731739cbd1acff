use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn docpipe() -> Command {
    let mut cmd = Command::cargo_bin("docpipe").unwrap();
    for key in [
        "INVOICES_STORAGE_ACCOUNT_NAME",
        "DOCPIPE_BLOB_ROOT",
        "DOCPIPE_STATE_DIR",
        "OPENAI_ENDPOINT",
        "OPENAI_COMPLETION_DEPLOYMENT",
        "OPENAI_API_KEY",
    ] {
        cmd.env_remove(key);
    }
    cmd
}

/// Config pointing every directory into `dir`, with an unreachable extraction endpoint.
fn write_config(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("config.json");
    let config = serde_json::json!({
        "storage": { "account_name": "devstoreaccount1", "blob_root": dir.join("blobs") },
        "extraction": { "endpoint": "http://127.0.0.1:9", "timeout_secs": 1 },
        "retry": { "max_attempts": 1, "first_retry_interval_ms": 1 },
        "runtime": { "state_dir": dir.join("state"), "queue_dir": dir.join("queue") },
    });
    fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();
    path
}

#[test]
fn test_help_lists_commands() {
    docpipe()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("process"))
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("enqueue"));
}

#[test]
fn test_config_init_set_get() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("conf").join("config.json");

    docpipe()
        .args(["config", "init", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Created configuration file"));
    assert!(path.exists());

    docpipe()
        .arg("--config")
        .arg(&path)
        .args(["config", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    docpipe()
        .arg("--config")
        .arg(&path)
        .args(["config", "set", "retry.max_attempts", "2"])
        .assert()
        .success();

    docpipe()
        .arg("--config")
        .arg(&path)
        .args(["config", "get", "retry.max_attempts"])
        .assert()
        .success()
        .stdout(predicate::str::diff("2\n"));

    docpipe()
        .arg("--config")
        .arg(&path)
        .args(["config", "set", "retry.nonexistent", "1"])
        .assert()
        .failure();

    docpipe()
        .arg("--config")
        .arg(&path)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("exists"));
}

#[test]
fn test_enqueue_writes_message() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path());

    docpipe()
        .arg("--config")
        .arg(&config)
        .args(["enqueue", "invoices"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Queued"));

    let messages: Vec<_> = fs::read_dir(dir.path().join("queue"))
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(messages.len(), 1);

    let body: serde_json::Value = serde_json::from_slice(&fs::read(&messages[0]).unwrap()).unwrap();
    assert_eq!(body["container_name"], "invoices");
}

#[test]
fn test_status_unknown_instance() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path());

    docpipe()
        .arg("--config")
        .arg(&config)
        .args(["status", "no-such-instance"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_process_empty_container_name() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path());

    docpipe()
        .arg("--config")
        .arg(&config)
        .args(["process", ""])
        .assert()
        .success()
        .stdout(predicate::str::contains("container_name is required"));
}

#[test]
fn test_process_missing_container() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path());
    fs::create_dir_all(dir.path().join("blobs")).unwrap();

    docpipe()
        .arg("--config")
        .arg(&config)
        .args(["process", "missing"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Failed to retrieve invoice folders"));
}

#[test]
fn test_process_writes_summary() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path());
    fs::create_dir_all(dir.path().join("blobs").join("devstoreaccount1").join("empty")).unwrap();
    let output = dir.path().join("result.json");
    let summary = dir.path().join("summary.csv");

    docpipe()
        .arg("--config")
        .arg(&config)
        .args(["process", "empty", "--output"])
        .arg(&output)
        .arg("--summary")
        .arg(&summary)
        .assert()
        .success();

    let result: serde_json::Value = serde_json::from_slice(&fs::read(&output).unwrap()).unwrap();
    assert_eq!(result["name"], "ProcessInvoiceBatchWorkflow");
    assert_eq!(fs::read_to_string(&summary).unwrap(), "folder,status,messages\n");
}
