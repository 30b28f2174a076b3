//! Batch engine integration tests.

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use bytes::Bytes;
    use cask_core::error::{CaskError, CaskResult};
    use cask_core::model::{
        BatchJobSpec, BatchKind, BatchMetadataItem, BatchStatus, BatchTransferItem,
        BatchUploadItem,
    };
    use cask_core::store::{
        BatchListFilter, MemoryMetadataStore, MemoryObjectStore, ObjectStore, PutResult,
    };
    use cask_core::{Cask, CaskConfig};
    use tokio::sync::Semaphore;

    use crate::{seed_bucket, test_cask, wait_for_batch};

    fn upload_spec(bucket_id: &str, entries: &[(&str, &str)]) -> BatchJobSpec {
        BatchJobSpec::Upload {
            bucket_id: bucket_id.to_owned(),
            files: entries
                .iter()
                .map(|(key, content)| BatchUploadItem {
                    key: (*key).to_owned(),
                    data: BASE64.encode(content),
                    content_type: "text/plain".to_owned(),
                    metadata: HashMap::new(),
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_should_upload_files_in_bulk() {
        let cask = test_cask();
        let bucket = seed_bucket(&cask, "bulk").await;

        let id = cask
            .submit_batch(upload_spec(
                &bucket.id,
                &[("a.txt", "alpha"), ("b.txt", "beta"), ("c.txt", "gamma")],
            ))
            .await
            .expect("submit");

        let done = wait_for_batch(&cask, &id).await;
        assert_eq!(done.status, BatchStatus::Completed);
        assert_eq!(done.kind, BatchKind::Upload);
        assert_eq!(done.processed_items, 3);
        assert_eq!(done.failed_items, 0);
        assert!(done.completed_at.is_some());

        let data = cask.objects().get(&bucket.id, "b.txt").await.expect("object");
        assert_eq!(&data[..], b"beta");
        let record = cask
            .metadata()
            .get_file(&bucket.id, "c.txt")
            .await
            .expect("file record");
        assert_eq!(record.content_type, "text/plain");
    }

    #[tokio::test]
    async fn test_should_record_partial_failures_in_delete_job() {
        let cask = test_cask();
        let bucket = seed_bucket(&cask, "del").await;

        let seed = cask
            .submit_batch(upload_spec(&bucket.id, &[("keep.txt", "x"), ("drop.txt", "y")]))
            .await
            .expect("seed submit");
        wait_for_batch(&cask, &seed).await;

        let id = cask
            .submit_batch(BatchJobSpec::Delete {
                bucket_id: bucket.id.clone(),
                keys: vec![
                    "drop.txt".to_owned(),
                    "never-existed.txt".to_owned(),
                    "keep.txt".to_owned(),
                ],
            })
            .await
            .expect("submit");

        let done = wait_for_batch(&cask, &id).await;
        assert_eq!(done.status, BatchStatus::Completed);
        assert_eq!(done.processed_items, 2);
        assert_eq!(done.failed_items, 1);
        assert_eq!(done.errors.len(), 1);
        assert_eq!(done.errors[0].index, 1);
        assert_eq!(done.errors[0].item, "never-existed.txt");

        assert!(cask.objects().get(&bucket.id, "drop.txt").await.is_err());
        assert!(cask.metadata().get_file(&bucket.id, "keep.txt").await.is_err());
    }

    #[tokio::test]
    async fn test_should_copy_objects_between_buckets() {
        let cask = test_cask();
        let source = seed_bucket(&cask, "copy-src").await;
        let dest = seed_bucket(&cask, "copy-dst").await;

        let seed = cask
            .submit_batch(upload_spec(&source.id, &[("doc.txt", "contents")]))
            .await
            .expect("seed submit");
        wait_for_batch(&cask, &seed).await;

        let id = cask
            .submit_batch(BatchJobSpec::Copy {
                items: vec![BatchTransferItem {
                    source_bucket: source.id.clone(),
                    source_key: "doc.txt".to_owned(),
                    dest_bucket: dest.id.clone(),
                    dest_key: "copied/doc.txt".to_owned(),
                }],
            })
            .await
            .expect("submit");

        let done = wait_for_batch(&cask, &id).await;
        assert_eq!(done.status, BatchStatus::Completed);
        assert_eq!(done.processed_items, 1);

        let copied = cask
            .objects()
            .get(&dest.id, "copied/doc.txt")
            .await
            .expect("copied object");
        assert_eq!(&copied[..], b"contents");
        // source survives a copy
        assert!(cask.objects().get(&source.id, "doc.txt").await.is_ok());
        assert!(cask.metadata().get_file(&source.id, "doc.txt").await.is_ok());
    }

    #[tokio::test]
    async fn test_should_move_objects_and_clean_sources() {
        let cask = test_cask();
        let source = seed_bucket(&cask, "move-src").await;
        let dest = seed_bucket(&cask, "move-dst").await;

        let seed = cask
            .submit_batch(upload_spec(&source.id, &[("one.txt", "1"), ("two.txt", "2")]))
            .await
            .expect("seed submit");
        wait_for_batch(&cask, &seed).await;

        let items = ["one.txt", "two.txt"]
            .iter()
            .map(|key| BatchTransferItem {
                source_bucket: source.id.clone(),
                source_key: (*key).to_owned(),
                dest_bucket: dest.id.clone(),
                dest_key: (*key).to_owned(),
            })
            .collect();
        let id = cask
            .submit_batch(BatchJobSpec::Move { items })
            .await
            .expect("submit");

        let done = wait_for_batch(&cask, &id).await;
        assert_eq!(done.status, BatchStatus::Completed);
        assert_eq!(done.processed_items, 2);

        for key in ["one.txt", "two.txt"] {
            assert!(cask.objects().get(&dest.id, key).await.is_ok());
            assert!(cask.metadata().get_file(&dest.id, key).await.is_ok());
            assert!(cask.objects().get(&source.id, key).await.is_err());
            assert!(cask.metadata().get_file(&source.id, key).await.is_err());
        }
    }

    #[tokio::test]
    async fn test_should_replace_object_metadata_in_bulk() {
        let cask = test_cask();
        let bucket = seed_bucket(&cask, "meta").await;

        let seed = cask
            .submit_batch(upload_spec(&bucket.id, &[("tagged.txt", "x")]))
            .await
            .expect("seed submit");
        wait_for_batch(&cask, &seed).await;

        let mut labels = HashMap::new();
        labels.insert("tier".to_owned(), "archive".to_owned());
        let id = cask
            .submit_batch(BatchJobSpec::Metadata {
                bucket_id: bucket.id.clone(),
                updates: vec![BatchMetadataItem {
                    key: "tagged.txt".to_owned(),
                    metadata: labels.clone(),
                }],
            })
            .await
            .expect("submit");

        let done = wait_for_batch(&cask, &id).await;
        assert_eq!(done.status, BatchStatus::Completed);

        let record = cask
            .metadata()
            .get_file(&bucket.id, "tagged.txt")
            .await
            .expect("file record");
        assert_eq!(record.metadata, labels);
    }

    #[tokio::test]
    async fn test_should_fail_whole_job_when_target_bucket_is_missing() {
        let cask = test_cask();

        let id = cask
            .submit_batch(upload_spec("ghost-bucket", &[("a.txt", "x")]))
            .await
            .expect("submit");

        let done = wait_for_batch(&cask, &id).await;
        assert_eq!(done.status, BatchStatus::Failed);
        assert_eq!(done.processed_items, 0);
        assert_eq!(done.errors.len(), 1);
        assert_eq!(done.errors[0].index, -1);
        assert_eq!(done.errors[0].item, "bucket");
    }

    #[tokio::test]
    async fn test_should_reject_empty_job() {
        let cask = test_cask();
        let bucket = seed_bucket(&cask, "empty").await;

        let err = cask
            .submit_batch(upload_spec(&bucket.id, &[]))
            .await
            .unwrap_err();
        assert!(matches!(err, CaskError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_should_filter_listings() {
        let cask = test_cask();
        let bucket = seed_bucket(&cask, "list").await;

        let first = cask
            .submit_batch(upload_spec(&bucket.id, &[("a.txt", "x")]))
            .await
            .expect("submit upload");
        wait_for_batch(&cask, &first).await;
        let second = cask
            .submit_batch(BatchJobSpec::Delete {
                bucket_id: bucket.id.clone(),
                keys: vec!["a.txt".to_owned()],
            })
            .await
            .expect("submit delete");
        wait_for_batch(&cask, &second).await;

        let all = cask
            .list_batches(&BatchListFilter::default())
            .await
            .expect("list all");
        assert_eq!(all.len(), 2);
        // newest first
        assert_eq!(all[0].id, second);
        assert_eq!(all[1].id, first);

        let deletes = cask
            .list_batches(&BatchListFilter {
                kind: Some(BatchKind::Delete),
                ..BatchListFilter::default()
            })
            .await
            .expect("list deletes");
        assert_eq!(deletes.len(), 1);
        assert_eq!(deletes[0].id, second);

        let limited = cask
            .list_batches(&BatchListFilter {
                limit: Some(1),
                ..BatchListFilter::default()
            })
            .await
            .expect("list limited");
        assert_eq!(limited.len(), 1);
    }

    /// Object store whose writes wait for test-released permits, so a
    /// job can be held mid-item while the test cancels it.
    #[derive(Debug)]
    struct GatedStore {
        inner: MemoryObjectStore,
        gate: Arc<Semaphore>,
    }

    #[async_trait]
    impl ObjectStore for GatedStore {
        async fn put(
            &self,
            bucket: &str,
            key: &str,
            data: Bytes,
            metadata: &HashMap<String, String>,
        ) -> CaskResult<PutResult> {
            let permit = self.gate.acquire().await.expect("gate closed");
            permit.forget();
            self.inner.put(bucket, key, data, metadata).await
        }

        async fn get(&self, bucket: &str, key: &str) -> CaskResult<Bytes> {
            self.inner.get(bucket, key).await
        }

        async fn delete(&self, bucket: &str, key: &str) -> CaskResult<()> {
            self.inner.delete(bucket, key).await
        }

        async fn copy(
            &self,
            src_bucket: &str,
            src_key: &str,
            dst_bucket: &str,
            dst_key: &str,
        ) -> CaskResult<PutResult> {
            self.inner.copy(src_bucket, src_key, dst_bucket, dst_key).await
        }
    }

    #[tokio::test]
    async fn test_should_stop_cancelled_job_at_next_item_boundary() {
        let gate = Arc::new(Semaphore::new(0));
        let objects = Arc::new(GatedStore {
            inner: MemoryObjectStore::default(),
            gate: gate.clone(),
        });
        let metadata = Arc::new(MemoryMetadataStore::new());
        let cask = Cask::with_stores(objects, metadata, CaskConfig::default());
        let bucket = seed_bucket(&cask, "cancel").await;

        let id = cask
            .submit_batch(upload_spec(
                &bucket.id,
                &[("first.txt", "1"), ("second.txt", "2"), ("third.txt", "3")],
            ))
            .await
            .expect("submit");

        // wait until a worker picked the job up and is blocked inside
        // the first item's write
        for _ in 0..500 {
            if cask.get_batch(&id).await.expect("poll").status == BatchStatus::Processing {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let cancelled = cask.cancel_batch(&id).await.expect("cancel");
        assert_eq!(cancelled.status, BatchStatus::Cancelled);

        // release the writes; the in-flight item finishes and its count
        // lands on the still-cancelled record, the rest are skipped
        gate.add_permits(3);
        let mut done = cask.get_batch(&id).await.expect("poll");
        for _ in 0..500 {
            if done.processed_items >= 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
            done = cask.get_batch(&id).await.expect("poll");
        }

        assert_eq!(done.status, BatchStatus::Cancelled);
        assert_eq!(done.processed_items, 1);
        assert!(done.completed_at.is_none());

        assert!(cask.objects().get(&bucket.id, "first.txt").await.is_ok());
        assert!(cask.objects().get(&bucket.id, "second.txt").await.is_err());
        assert!(cask.objects().get(&bucket.id, "third.txt").await.is_err());
    }
}
