use async_trait::async_trait;
use std::io::{ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{InstanceRecord, Result, StepRecord, WorkflowStore};
use crate::error::JournalError;

/// Directory-backed workflow store.
///
/// Layout:
/// - `{root}/instances/{id}.json`: instance record, replaced atomically
/// - `{root}/journal/{id}.jsonl`: one step record per line, append only
#[derive(Debug, Clone)]
pub struct FileWorkflowStore {
    root: PathBuf,
    // Concurrent sub-workflow calls append to the same parent journal.
    append_lock: Arc<Mutex<()>>,
}

impl FileWorkflowStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            append_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn instance_path(&self, id: &str) -> Result<PathBuf> {
        check_id(id)?;
        Ok(self.root.join("instances").join(format!("{}.json", id)))
    }

    fn journal_path(&self, id: &str) -> Result<PathBuf> {
        check_id(id)?;
        Ok(self.root.join("journal").join(format!("{}.jsonl", id)))
    }
}

fn check_id(id: &str) -> Result<()> {
    let valid = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(JournalError::InstanceNotFound(id.to_string()))
    }
}

fn corrupt(instance_id: &str, step: impl Into<String>, reason: impl ToString) -> JournalError {
    JournalError::Corrupt {
        instance_id: instance_id.to_string(),
        step: step.into(),
        reason: reason.to_string(),
    }
}

/// Length of the journal up to and including its last newline.
async fn complete_len(file: &mut fs::File, len: u64) -> std::io::Result<u64> {
    if len == 0 {
        return Ok(0);
    }

    let mut last = [0u8; 1];
    file.seek(SeekFrom::Start(len - 1)).await?;
    file.read_exact(&mut last).await?;
    if last[0] == b'\n' {
        return Ok(len);
    }

    let mut content = Vec::with_capacity(len as usize);
    file.seek(SeekFrom::Start(0)).await?;
    file.read_to_end(&mut content).await?;
    Ok(content
        .iter()
        .rposition(|&b| b == b'\n')
        .map_or(0, |pos| pos as u64 + 1))
}

#[async_trait]
impl WorkflowStore for FileWorkflowStore {
    async fn save_instance(&self, record: &InstanceRecord) -> Result<()> {
        let path = self.instance_path(&record.id)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_vec_pretty(record).map_err(|e| corrupt(&record.id, "instance", e))?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn load_instance(&self, id: &str) -> Result<Option<InstanceRecord>> {
        let path = match self.instance_path(id) {
            Ok(path) => path,
            Err(_) => return Ok(None),
        };

        match fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| corrupt(id, "instance", e)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_instances(&self) -> Result<Vec<InstanceRecord>> {
        let dir = self.root.join("instances");
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if let Some(record) = self.load_instance(id).await? {
                records.push(record);
            }
        }

        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(records)
    }

    async fn purge_instance(&self, id: &str) -> Result<bool> {
        let Ok(instance) = self.instance_path(id) else {
            return Ok(false);
        };
        let journal = self.journal_path(id)?;

        let existed = match fs::remove_file(&instance).await {
            Ok(()) => true,
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => return Err(e.into()),
        };
        match fs::remove_file(&journal).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        debug!(instance_id = id, existed, "purged instance");
        Ok(existed)
    }

    async fn append_step(&self, instance_id: &str, step: &StepRecord) -> Result<()> {
        let path = self.journal_path(instance_id)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut line = serde_json::to_vec(step).map_err(|e| corrupt(instance_id, step.step_id.clone(), e))?;
        line.push(b'\n');

        let _guard = self.append_lock.lock().await;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .await?;

        let len = file.metadata().await?.len();
        let end = complete_len(&mut file, len).await?;
        if end < len {
            warn!(instance_id, discarded = len - end, "truncating incomplete journal entry");
            file.set_len(end).await?;
        }

        file.seek(SeekFrom::Start(end)).await?;
        file.write_all(&line).await?;
        file.sync_data().await?;
        Ok(())
    }

    async fn load_steps(&self, instance_id: &str) -> Result<Vec<StepRecord>> {
        let path = self.journal_path(instance_id)?;
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let complete = content.ends_with('\n');
        let lines: Vec<&str> = content.lines().collect();
        let mut steps = Vec::with_capacity(lines.len());

        for (index, line) in lines.iter().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<StepRecord>(line) {
                Ok(step) => steps.push(step),
                // Torn final write from a crash; the step simply re-runs.
                Err(e) if !complete && index + 1 == lines.len() => {
                    warn!(instance_id, line = index + 1, error = %e, "ignoring incomplete journal entry");
                }
                Err(e) => return Err(corrupt(instance_id, format!("line {}", index + 1), e)),
            }
        }

        Ok(steps)
    }
}
