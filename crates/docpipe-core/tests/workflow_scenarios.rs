//! End-to-end workflow behaviour against in-memory and file-backed collaborators.

use async_trait::async_trait;
use docpipe_core::error::{ExtractionError, JournalError, StorageError};
use docpipe_core::extraction::{self, DocumentExtractor, ExtractionOptions};
use docpipe_core::journal::{InstanceRecord, InstanceStatus, StepRecord, WorkflowStore};
use docpipe_core::workflow::{extract_invoice_data, process_invoice_batch};
use docpipe_core::{
    BlobStore, FileWorkflowStore, InvoiceBatchRequest, InvoiceData, InvoiceFolder, MemoryBlobStore,
    MemoryWorkflowStore, PipelineConfig, RetryPolicy, Services, WorkflowContext, WorkflowResult, WorkflowRuntime,
};
use pretty_assertions::assert_eq;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

const ACCOUNT: &str = "devstoreaccount1";
const CONTAINER: &str = "invoices";

/// Returns valid data for `good`, nothing for `empty` and fails for anything else.
#[derive(Default)]
struct FakeExtractor {
    calls: AtomicU32,
}

impl FakeExtractor {
    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentExtractor for FakeExtractor {
    async fn extract(&self, document: &[u8], _: &ExtractionOptions) -> extraction::Result<Option<InvoiceData>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match document {
            b"good" => Ok(Some(valid_invoice())),
            b"empty" => Ok(None),
            _ => Err(ExtractionError::Document("unreadable".to_string())),
        }
    }
}

/// Delegates to a memory store but refuses journal writes for one instance.
struct BrokenJournal {
    inner: MemoryWorkflowStore,
    broken_instance: String,
}

#[async_trait]
impl WorkflowStore for BrokenJournal {
    async fn save_instance(&self, record: &InstanceRecord) -> docpipe_core::journal::Result<()> {
        self.inner.save_instance(record).await
    }

    async fn load_instance(&self, id: &str) -> docpipe_core::journal::Result<Option<InstanceRecord>> {
        self.inner.load_instance(id).await
    }

    async fn list_instances(&self) -> docpipe_core::journal::Result<Vec<InstanceRecord>> {
        self.inner.list_instances().await
    }

    async fn purge_instance(&self, id: &str) -> docpipe_core::journal::Result<bool> {
        self.inner.purge_instance(id).await
    }

    async fn append_step(&self, instance_id: &str, step: &StepRecord) -> docpipe_core::journal::Result<()> {
        if instance_id == self.broken_instance {
            return Err(JournalError::Io(std::io::Error::other("disk unavailable")));
        }
        self.inner.append_step(instance_id, step).await
    }

    async fn load_steps(&self, instance_id: &str) -> docpipe_core::journal::Result<Vec<StepRecord>> {
        self.inner.load_steps(instance_id).await
    }
}

/// Delegates to a memory store but rejects writes to one blob.
struct FailingWrites {
    inner: Arc<MemoryBlobStore>,
    rejected_blob: String,
    attempts: Mutex<HashMap<String, u32>>,
}

impl FailingWrites {
    fn new(inner: Arc<MemoryBlobStore>, rejected_blob: &str) -> Self {
        Self {
            inner,
            rejected_blob: rejected_blob.to_string(),
            attempts: Mutex::new(HashMap::new()),
        }
    }

    fn attempts(&self, blob: &str) -> u32 {
        self.attempts.lock().unwrap().get(blob).copied().unwrap_or(0)
    }
}

#[async_trait]
impl BlobStore for FailingWrites {
    async fn list_blob_names(&self, account: &str, container: &str) -> docpipe_core::storage::Result<Vec<String>> {
        self.inner.list_blob_names(account, container).await
    }

    async fn get_content(&self, account: &str, container: &str, blob: &str) -> docpipe_core::storage::Result<Vec<u8>> {
        self.inner.get_content(account, container, blob).await
    }

    async fn put_content(
        &self,
        account: &str,
        container: &str,
        blob: &str,
        content: &[u8],
        overwrite: bool,
    ) -> docpipe_core::storage::Result<()> {
        *self.attempts.lock().unwrap().entry(blob.to_string()).or_default() += 1;
        if blob == self.rejected_blob {
            return Err(StorageError::Io(std::io::Error::other("quota exceeded")));
        }
        self.inner.put_content(account, container, blob, content, overwrite).await
    }
}

fn valid_invoice() -> InvoiceData {
    serde_json::from_str(
        r#"{
            "customer_name": "Acme",
            "products": [{"id": "P1", "quantity": 2, "total": 20}],
            "total_quantity": 2,
            "total_price": 20,
            "products_signatures": [
                {"type": "Driver", "name": "Dan", "is_signed": true},
                {"type": "Customer", "name": "Cat", "is_signed": true}
            ]
        }"#,
    )
    .unwrap()
}

fn fast_config() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.retry = RetryPolicy {
        max_attempts: 3,
        first_retry_interval_ms: 1,
        backoff_coefficient: 1.0,
        max_retry_interval_ms: 1,
    };
    config
}

fn services(blobs: &Arc<MemoryBlobStore>, extractor: &Arc<FakeExtractor>, store: Arc<dyn WorkflowStore>) -> Services {
    Services::new(blobs.clone(), extractor.clone(), store, fast_config())
}

async fn blob_exists(blobs: &MemoryBlobStore, name: &str) -> bool {
    blobs.get_content(ACCOUNT, CONTAINER, name).await.is_ok()
}

#[tokio::test]
async fn test_folder_continues_past_failed_extraction() {
    let blobs = Arc::new(MemoryBlobStore::new());
    blobs.insert(ACCOUNT, CONTAINER, "acme/a.pdf", "empty").await;
    blobs.insert(ACCOUNT, CONTAINER, "acme/b.pdf", "good").await;
    let extractor = Arc::new(FakeExtractor::default());
    let services = services(&blobs, &extractor, Arc::new(MemoryWorkflowStore::new()));

    let folder = InvoiceFolder::new(
        CONTAINER,
        "acme",
        vec!["acme/a.pdf".to_string(), "acme/b.pdf".to_string()],
    );
    let ctx = WorkflowContext::load("folder-1", services.store.clone(), services.config.retry.clone())
        .await
        .unwrap();
    let result = extract_invoice_data::run(&ctx, &services, &folder).await.unwrap();

    assert!(!result.is_valid());
    assert_eq!(
        result.messages(),
        [
            "acme::InvoiceFolder.validate - input is valid",
            "acme::ExtractInvoiceData - Failed to extract data for acme/a.pdf.",
        ]
    );
    // Three attempts for a.pdf, one for b.pdf
    assert_eq!(extractor.calls(), 4);

    assert!(!blob_exists(&blobs, "acme/a.pdf.Data.json").await);
    assert!(blob_exists(&blobs, "acme/b.pdf.Data.json").await);
    assert!(blob_exists(&blobs, "acme/b.pdf.Validation.json").await);

    let stored = blobs
        .get_content(ACCOUNT, CONTAINER, "acme/b.pdf.Validation.json")
        .await
        .unwrap();
    let validation: serde_json::Value = serde_json::from_slice(&stored).unwrap();
    assert_eq!(validation["status"], "Success");
    assert_eq!(validation["name"], "acme/b.pdf");
}

#[tokio::test]
async fn test_invalid_invoice_is_merged_into_folder() {
    struct MismatchExtractor;

    #[async_trait]
    impl DocumentExtractor for MismatchExtractor {
        async fn extract(&self, _: &[u8], _: &ExtractionOptions) -> extraction::Result<Option<InvoiceData>> {
            let mut data = valid_invoice();
            data.total_quantity = Some(rust_decimal::Decimal::from(3));
            Ok(Some(data))
        }
    }

    let blobs = Arc::new(MemoryBlobStore::new());
    blobs.insert(ACCOUNT, CONTAINER, "acme/a.pdf", "x").await;
    let services = Services::new(
        blobs.clone(),
        Arc::new(MismatchExtractor),
        Arc::new(MemoryWorkflowStore::new()),
        fast_config(),
    );

    let folder = InvoiceFolder::new(CONTAINER, "acme", vec!["acme/a.pdf".to_string()]);
    let ctx = WorkflowContext::load("folder-2", services.store.clone(), RetryPolicy::no_retry())
        .await
        .unwrap();
    let result = extract_invoice_data::run(&ctx, &services, &folder).await.unwrap();

    assert!(!result.is_valid());
    assert_eq!(result.messages().len(), 2);
    assert_eq!(
        result.messages()[1],
        "acme/a.pdf::ValidateInvoiceData - products quantity total must match total_quantity. Expected: 3, Actual: 2"
    );
    assert!(blob_exists(&blobs, "acme/a.pdf.Validation.json").await);
}

async fn run_two_good_files(rejected_blob: &str) -> (WorkflowResult, Arc<MemoryBlobStore>, Arc<FailingWrites>) {
    let blobs = Arc::new(MemoryBlobStore::new());
    blobs.insert(ACCOUNT, CONTAINER, "acme/a.pdf", "good").await;
    blobs.insert(ACCOUNT, CONTAINER, "acme/b.pdf", "good").await;
    let writes = Arc::new(FailingWrites::new(blobs.clone(), rejected_blob));
    let services = Services::new(
        writes.clone(),
        Arc::new(FakeExtractor::default()),
        Arc::new(MemoryWorkflowStore::new()),
        fast_config(),
    );

    let folder = InvoiceFolder::new(
        CONTAINER,
        "acme",
        vec!["acme/a.pdf".to_string(), "acme/b.pdf".to_string()],
    );
    let ctx = WorkflowContext::load("folder-writes", services.store.clone(), services.config.retry.clone())
        .await
        .unwrap();
    let result = extract_invoice_data::run(&ctx, &services, &folder).await.unwrap();
    (result, blobs, writes)
}

#[tokio::test]
async fn test_failed_data_write_skips_validation_and_continues() {
    let (result, blobs, writes) = run_two_good_files("acme/a.pdf.Data.json").await;

    assert!(!result.is_valid());
    assert_eq!(
        result.messages(),
        [
            "acme::InvoiceFolder.validate - input is valid",
            "acme::WriteBytesToBlob - Failed to store extracted data for acme/a.pdf.",
        ]
    );
    assert_eq!(writes.attempts("acme/a.pdf.Data.json"), 3);
    assert_eq!(writes.attempts("acme/a.pdf.Validation.json"), 0);
    assert!(!blob_exists(&blobs, "acme/a.pdf.Validation.json").await);

    assert!(blob_exists(&blobs, "acme/b.pdf.Data.json").await);
    assert!(blob_exists(&blobs, "acme/b.pdf.Validation.json").await);
}

#[tokio::test]
async fn test_failed_validation_write_is_reported() {
    let (result, blobs, writes) = run_two_good_files("acme/a.pdf.Validation.json").await;

    assert!(!result.is_valid());
    assert_eq!(
        result.messages(),
        [
            "acme::InvoiceFolder.validate - input is valid",
            "acme::WriteBytesToBlob - Failed to store validation result for acme/a.pdf.",
        ]
    );
    assert_eq!(writes.attempts("acme/a.pdf.Validation.json"), 3);
    assert!(blob_exists(&blobs, "acme/a.pdf.Data.json").await);
    assert!(blob_exists(&blobs, "acme/b.pdf.Data.json").await);
    assert!(blob_exists(&blobs, "acme/b.pdf.Validation.json").await);
}

#[tokio::test]
async fn test_batch_with_no_folders() {
    let blobs = Arc::new(MemoryBlobStore::new());
    blobs.insert(ACCOUNT, CONTAINER, "readme.txt", "hi").await;
    let extractor = Arc::new(FakeExtractor::default());
    let runtime = WorkflowRuntime::new(services(&blobs, &extractor, Arc::new(MemoryWorkflowStore::new())));

    let (id, result) = runtime.run_batch(&InvoiceBatchRequest::new(CONTAINER)).await.unwrap();

    assert!(result.is_valid());
    assert!(result.activity_results.is_empty());
    assert_eq!(
        result.messages(),
        [
            "ProcessInvoiceBatchWorkflow::InvoiceBatchRequest.validate - input is valid",
            "ProcessInvoiceBatchWorkflow::GetInvoiceFolders - Retrieved 0 invoice folders.",
        ]
    );
    assert_eq!(extractor.calls(), 0);
    assert_eq!(runtime.instance_status(&id).await.unwrap(), Some(InstanceStatus::Completed));
}

#[tokio::test]
async fn test_batch_processes_every_folder() {
    let blobs = Arc::new(MemoryBlobStore::new());
    blobs.insert(ACCOUNT, CONTAINER, "acme/a.pdf", "good").await;
    blobs.insert(ACCOUNT, CONTAINER, "acme/b.pdf", "good").await;
    blobs.insert(ACCOUNT, CONTAINER, "globex/g.pdf", "good").await;
    let extractor = Arc::new(FakeExtractor::default());
    let runtime = WorkflowRuntime::new(services(&blobs, &extractor, Arc::new(MemoryWorkflowStore::new())));

    let (id, result) = runtime.run_batch(&InvoiceBatchRequest::new(CONTAINER)).await.unwrap();

    assert!(result.is_valid());
    assert_eq!(
        result.messages()[1],
        "ProcessInvoiceBatchWorkflow::GetInvoiceFolders - Retrieved 2 invoice folders."
    );
    let names: Vec<&str> = result.activity_results.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, ["acme", "globex"]);
    assert!(result.activity_results.iter().all(|r| r.is_valid()));
    assert_eq!(extractor.calls(), 3);

    for file in ["acme/a.pdf", "acme/b.pdf", "globex/g.pdf"] {
        assert!(blob_exists(&blobs, &format!("{file}.Data.json")).await);
        assert!(blob_exists(&blobs, &format!("{file}.Validation.json")).await);
    }

    // A completed instance returns its stored output without new calls
    let rerun = runtime.run_existing(&id).await.unwrap();
    assert_eq!(rerun, result);
    assert_eq!(extractor.calls(), 3);
}

#[tokio::test]
async fn test_root_level_invoice_is_reported_as_failed_extraction() {
    let blobs = Arc::new(MemoryBlobStore::new());
    blobs.insert(ACCOUNT, CONTAINER, "a.pdf", "good").await;
    let extractor = Arc::new(FakeExtractor::default());
    let runtime = WorkflowRuntime::new(services(&blobs, &extractor, Arc::new(MemoryWorkflowStore::new())));

    let (_, result) = runtime.run_batch(&InvoiceBatchRequest::new(CONTAINER)).await.unwrap();

    assert!(result.is_valid());
    assert_eq!(result.activity_results.len(), 1);
    let folder = &result.activity_results[0];
    assert_eq!(folder.name, CONTAINER);
    assert_eq!(
        folder.messages()[1],
        "invoices::ExtractInvoiceData - Failed to extract data for invoices/a.pdf."
    );
    assert_eq!(extractor.calls(), 0);
}

#[tokio::test]
async fn test_empty_container_name_is_rejected_without_calls() {
    let blobs = Arc::new(MemoryBlobStore::new());
    let extractor = Arc::new(FakeExtractor::default());
    let runtime = WorkflowRuntime::new(services(&blobs, &extractor, Arc::new(MemoryWorkflowStore::new())));

    let (_, result) = runtime.run_batch(&InvoiceBatchRequest::new("")).await.unwrap();
    assert!(!result.is_valid());
    assert_eq!(result.messages(), ["container_name is required"]);
    assert!(result.activity_results.is_empty());

    let folder = InvoiceFolder::new("", "acme", vec!["acme/a.pdf".to_string()]);
    let ctx = WorkflowContext::load("folder-3", runtime.services().store.clone(), RetryPolicy::no_retry())
        .await
        .unwrap();
    let result = extract_invoice_data::run(&ctx, runtime.services(), &folder).await.unwrap();
    assert_eq!(result.messages(), ["container_name is required"]);

    assert_eq!(extractor.calls(), 0);
}

#[tokio::test]
async fn test_missing_container_is_reported() {
    let blobs = Arc::new(MemoryBlobStore::new());
    let extractor = Arc::new(FakeExtractor::default());
    let runtime = WorkflowRuntime::new(services(&blobs, &extractor, Arc::new(MemoryWorkflowStore::new())));

    let (_, result) = runtime.run_batch(&InvoiceBatchRequest::new("nowhere")).await.unwrap();
    assert!(!result.is_valid());
    assert!(result.messages()[1].starts_with("ProcessInvoiceBatchWorkflow::GetInvoiceFolders - Failed to retrieve invoice folders"));
}

#[tokio::test]
async fn test_failed_sub_workflow_becomes_child_result() {
    let blobs = Arc::new(MemoryBlobStore::new());
    blobs.insert(ACCOUNT, CONTAINER, "acme/a.pdf", "good").await;
    blobs.insert(ACCOUNT, CONTAINER, "broken/b.pdf", "good").await;
    let extractor = Arc::new(FakeExtractor::default());

    let parent_id = "7b1f3c4e-1d2a-4c53-9a0e-0f7b2c9d8e11";
    let store = Arc::new(BrokenJournal {
        inner: MemoryWorkflowStore::new(),
        broken_instance: extract_invoice_data::child_instance_id(parent_id, "broken"),
    });
    let services = services(&blobs, &extractor, store.clone());

    let ctx = WorkflowContext::load(parent_id, services.store.clone(), services.config.retry.clone())
        .await
        .unwrap();
    let result = process_invoice_batch::run(&ctx, &services, &InvoiceBatchRequest::new(CONTAINER))
        .await
        .unwrap();

    // Children are never merged into the batch
    assert!(result.is_valid());
    assert_eq!(result.activity_results.len(), 2);

    let good = &result.activity_results[0];
    assert_eq!(good.name, "acme");
    assert!(good.is_valid());

    let broken = &result.activity_results[1];
    assert_eq!(broken.name, "broken");
    assert!(!broken.is_valid());
    assert_eq!(broken.messages().len(), 1);
    assert!(broken.messages()[0].starts_with("ExtractInvoiceDataWorkflow::run - "));

    let broken_record = store
        .load_instance(&extract_invoice_data::child_instance_id(parent_id, "broken"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(broken_record.status, InstanceStatus::Failed);
    assert_eq!(broken_record.parent_id.as_deref(), Some(parent_id));
}

#[tokio::test]
async fn test_resume_skips_completed_steps() {
    let state = tempfile::tempdir().unwrap();
    let blobs = Arc::new(MemoryBlobStore::new());
    blobs.insert(ACCOUNT, CONTAINER, "acme/a.pdf", "good").await;
    blobs.insert(ACCOUNT, CONTAINER, "globex/b.pdf", "good").await;
    let extractor = Arc::new(FakeExtractor::default());
    let store = Arc::new(FileWorkflowStore::new(state.path()));

    let runtime = WorkflowRuntime::new(services(&blobs, &extractor, store.clone()));
    let (id, first) = runtime.run_batch(&InvoiceBatchRequest::new(CONTAINER)).await.unwrap();
    assert_eq!(extractor.calls(), 2);

    // Simulate a crash in "acme" after its extraction step was journaled:
    // keep only the first journal line of the child and of the parent.
    let child_id = extract_invoice_data::child_instance_id(&id, "acme");
    for instance in [&id, &child_id] {
        let path = state.path().join("journal").join(format!("{}.jsonl", instance));
        let content = std::fs::read_to_string(&path).unwrap();
        let first_line = content.lines().next().unwrap();
        std::fs::write(&path, format!("{}\n", first_line)).unwrap();

        let mut record = store.load_instance(instance).await.unwrap().unwrap();
        record.mark_running();
        store.save_instance(&record).await.unwrap();
    }
    blobs.put_content(ACCOUNT, CONTAINER, "acme/a.pdf.Data.json", b"stale", true).await.unwrap();

    let restarted = WorkflowRuntime::new(services(&blobs, &extractor, store.clone()));
    assert_eq!(restarted.incomplete_instances().await.unwrap(), vec![id.clone()]);

    let resumed = restarted.run_existing(&id).await.unwrap();

    assert_eq!(resumed, first);
    assert_eq!(extractor.calls(), 2);
    let rewritten = blobs.get_content(ACCOUNT, CONTAINER, "acme/a.pdf.Data.json").await.unwrap();
    assert_ne!(rewritten, b"stale".to_vec());
    assert_eq!(restarted.instance_status(&id).await.unwrap(), Some(InstanceStatus::Completed));
}

#[tokio::test]
async fn test_start_new_runs_in_background() {
    let blobs = Arc::new(MemoryBlobStore::new());
    blobs.insert(ACCOUNT, CONTAINER, "acme/a.pdf", "good").await;
    let extractor = Arc::new(FakeExtractor::default());
    let runtime = WorkflowRuntime::new(services(&blobs, &extractor, Arc::new(MemoryWorkflowStore::new())));

    let id = runtime.start_new(&InvoiceBatchRequest::new(CONTAINER)).await.unwrap();
    let record = wait_for_terminal(&runtime, &id).await;

    assert_eq!(record.status, InstanceStatus::Completed);
    let output = record.output.unwrap();
    assert_eq!(output["name"], "ProcessInvoiceBatchWorkflow");
    assert_eq!(output["activity_results"][0]["name"], "acme");

    let handle = runtime.status_handle(&id);
    assert_eq!(
        handle.status_query_get_uri,
        format!("http://127.0.0.1:7071/runtime/instances/{}", id)
    );

    assert!(runtime.purge(&id).await.unwrap());
    assert_eq!(runtime.status(&id).await.unwrap(), None);
    assert!(runtime.services().store.list_instances().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_resume_incomplete_picks_up_pending_instances() {
    let blobs = Arc::new(MemoryBlobStore::new());
    blobs.insert(ACCOUNT, CONTAINER, "acme/a.pdf", "good").await;
    let extractor = Arc::new(FakeExtractor::default());
    let runtime = WorkflowRuntime::new(services(&blobs, &extractor, Arc::new(MemoryWorkflowStore::new())));

    let record = InstanceRecord::new(
        "pending-1",
        process_invoice_batch::NAME,
        serde_json::to_value(InvoiceBatchRequest::new(CONTAINER)).unwrap(),
    );
    runtime.services().store.save_instance(&record).await.unwrap();

    let resumed = runtime.resume_incomplete().await.unwrap();
    assert_eq!(resumed, vec!["pending-1".to_string()]);

    let record = wait_for_terminal(&runtime, "pending-1").await;
    assert_eq!(record.status, InstanceStatus::Completed);
    assert_eq!(extractor.calls(), 1);
}

async fn wait_for_terminal(runtime: &WorkflowRuntime, id: &str) -> InstanceRecord {
    for _ in 0..500 {
        if let Some(record) = runtime.status(id).await.unwrap() {
            if record.status.is_terminal() {
                return record;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("instance {} did not finish", id);
}
