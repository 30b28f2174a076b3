//! Startup recovery integration tests.
//!
//! These simulate a process that persisted batch operations and died
//! before executing them, by writing records straight to the stores and
//! then bringing up a fresh provider over the same stores.

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use base64::Engine;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use cask_core::model::{
        BatchJobSpec, BatchOperation, BatchStatus, BatchUploadItem, BucketRecord,
    };
    use cask_core::store::{MemoryMetadataStore, MemoryObjectStore, MetadataStore};
    use cask_core::{Cask, CaskConfig};

    use crate::wait_for_batch;

    fn upload_spec(bucket_id: &str, key: &str) -> BatchJobSpec {
        BatchJobSpec::Upload {
            bucket_id: bucket_id.to_owned(),
            files: vec![BatchUploadItem {
                key: key.to_owned(),
                data: BASE64.encode("recovered payload"),
                content_type: String::new(),
                metadata: HashMap::new(),
            }],
        }
    }

    #[tokio::test]
    async fn test_should_execute_jobs_left_pending_by_a_dead_process() {
        let objects = Arc::new(MemoryObjectStore::default());
        let metadata = Arc::new(MemoryMetadataStore::new());

        let bucket = BucketRecord::new("survivor-bucket", "user:owner");
        metadata.save_bucket(&bucket).await.expect("seed bucket");

        // persisted by the previous process, never picked up
        let orphan = BatchOperation::new(upload_spec(&bucket.id, "orphan.txt"));
        metadata.save_batch(&orphan).await.expect("save orphan");

        let cask = Cask::with_stores(objects, metadata, CaskConfig::default());
        let requeued = cask.recover_queued().await.expect("recover");
        assert_eq!(requeued, 1);

        let done = wait_for_batch(&cask, &orphan.id).await;
        assert_eq!(done.status, BatchStatus::Completed);
        assert_eq!(done.processed_items, 1);

        let data = cask
            .objects()
            .get(&bucket.id, "orphan.txt")
            .await
            .expect("recovered object");
        assert_eq!(&data[..], b"recovered payload");
    }

    #[tokio::test]
    async fn test_should_leave_settled_jobs_alone_during_recovery() {
        let objects = Arc::new(MemoryObjectStore::default());
        let metadata = Arc::new(MemoryMetadataStore::new());

        let bucket = BucketRecord::new("settled-bucket", "user:owner");
        metadata.save_bucket(&bucket).await.expect("seed bucket");

        let pending = BatchOperation::new(upload_spec(&bucket.id, "todo.txt"));
        metadata.save_batch(&pending).await.expect("save pending");

        let mut completed = BatchOperation::new(upload_spec(&bucket.id, "done.txt"));
        completed.status = BatchStatus::Completed;
        metadata.save_batch(&completed).await.expect("save completed");

        let mut cancelled = BatchOperation::new(upload_spec(&bucket.id, "stopped.txt"));
        cancelled.status = BatchStatus::Cancelled;
        metadata.save_batch(&cancelled).await.expect("save cancelled");

        let cask = Cask::with_stores(objects, metadata.clone(), CaskConfig::default());
        let requeued = cask.recover_queued().await.expect("recover");
        assert_eq!(requeued, 1);

        wait_for_batch(&cask, &pending.id).await;

        // only the pending record's work actually ran
        assert!(cask.objects().get(&bucket.id, "todo.txt").await.is_ok());
        assert!(cask.objects().get(&bucket.id, "done.txt").await.is_err());
        assert!(cask.objects().get(&bucket.id, "stopped.txt").await.is_err());

        let untouched = metadata.get_batch(&completed.id).await.expect("completed record");
        assert_eq!(untouched.processed_items, 0);
    }

    #[tokio::test]
    async fn test_should_find_nothing_after_everything_settled() {
        let objects = Arc::new(MemoryObjectStore::default());
        let metadata = Arc::new(MemoryMetadataStore::new());

        let bucket = BucketRecord::new("quiet-bucket", "user:owner");
        metadata.save_bucket(&bucket).await.expect("seed bucket");
        let orphan = BatchOperation::new(upload_spec(&bucket.id, "only.txt"));
        metadata.save_batch(&orphan).await.expect("save orphan");

        let cask = Cask::with_stores(objects, metadata, CaskConfig::default());
        assert_eq!(cask.recover_queued().await.expect("first recovery"), 1);
        wait_for_batch(&cask, &orphan.id).await;

        // a second sweep after the queue drained re-enqueues nothing
        assert_eq!(cask.recover_queued().await.expect("second recovery"), 0);
    }

    #[tokio::test]
    async fn test_should_preserve_submission_order_during_recovery() {
        let objects = Arc::new(MemoryObjectStore::default());
        let metadata = Arc::new(MemoryMetadataStore::new());

        let bucket = BucketRecord::new("ordered-bucket", "user:owner");
        metadata.save_bucket(&bucket).await.expect("seed bucket");

        let mut ids = Vec::new();
        for i in 0..4 {
            let operation = BatchOperation::new(upload_spec(&bucket.id, &format!("f{i}.txt")));
            metadata.save_batch(&operation).await.expect("save operation");
            ids.push(operation.id);
            // distinct timestamps keep the replay order observable
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }

        // one worker so execution follows queue order exactly
        let config = CaskConfig::builder().batch_workers(1).build();
        let cask = Cask::with_stores(objects, metadata, config);
        assert_eq!(cask.recover_queued().await.expect("recover"), 4);

        let mut completions = Vec::new();
        for id in &ids {
            let done = wait_for_batch(&cask, id).await;
            assert_eq!(done.status, BatchStatus::Completed);
            completions.push(done.completed_at.expect("completed_at"));
        }
        // oldest submission finished first
        assert!(completions.windows(2).all(|w| w[0] <= w[1]));
    }
}
