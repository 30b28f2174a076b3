//! Worker tasks that execute batch operations.
//!
//! Workers share one queue receiver behind an async mutex; whoever
//! acquires it takes the next operation id, releases the lock and
//! processes the job, so jobs run concurrently across workers while
//! each job is executed by exactly one worker.
//!
//! Items run strictly one after another. After every item the worker
//! persists its counters through [`MetadataStore::update_batch_progress`],
//! which keeps a concurrently requested cancellation authoritative and
//! returns the status it kept; that returned status is what the next
//! item-boundary check acts on. Pollers see live progress, and a cancel
//! is never lost to an in-flight progress write.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use chrono::Utc;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};

use crate::error::CaskResult;
use crate::model::{
    BatchItemError, BatchJobSpec, BatchMetadataItem, BatchStatus, BatchTransferItem,
    BatchUploadItem, FileRecord,
};
use crate::store::{MetadataStore, ObjectStore};

/// State shared by one worker task.
pub(super) struct WorkerContext {
    pub(super) id: usize,
    pub(super) objects: Arc<dyn ObjectStore>,
    pub(super) metadata: Arc<dyn MetadataStore>,
    pub(super) queue: Arc<Mutex<mpsc::Receiver<String>>>,
    pub(super) max_errors: usize,
}

/// Drain the queue until every sender is gone.
pub(super) async fn run(ctx: WorkerContext) {
    loop {
        // take the lock only long enough to receive one id, so the
        // other workers are not blocked while this job runs
        let next = {
            let mut queue = ctx.queue.lock().await;
            queue.recv().await
        };
        let Some(operation_id) = next else { break };

        if let Err(e) = process_job(&ctx, &operation_id).await {
            warn!(
                worker = ctx.id,
                operation_id = %operation_id,
                error = %e,
                "batch job execution failed"
            );
        }
    }
    debug!(worker = ctx.id, "batch worker exiting");
}

/// Execute one queued operation from `pending` to a terminal state.
async fn process_job(ctx: &WorkerContext, operation_id: &str) -> CaskResult<()> {
    let mut operation = ctx.metadata.get_batch(operation_id).await?;
    if operation.status != BatchStatus::Pending {
        debug!(
            worker = ctx.id,
            operation_id,
            status = %operation.status,
            "skipping batch operation no longer pending"
        );
        return Ok(());
    }

    operation.status = BatchStatus::Processing;
    operation.updated_at = Utc::now();
    if ctx.metadata.update_batch_progress(&operation).await? == BatchStatus::Cancelled {
        info!(
            worker = ctx.id,
            operation_id, "batch operation cancelled before it started"
        );
        return Ok(());
    }
    info!(
        worker = ctx.id,
        operation_id,
        kind = %operation.kind,
        items = operation.total_items,
        "processing batch operation"
    );

    // single-bucket jobs fail outright when the bucket is gone
    if let Some(bucket_id) = operation.spec.bucket_id().map(str::to_owned) {
        if let Err(e) = ctx.metadata.get_bucket(&bucket_id).await {
            operation.push_error(
                BatchItemError {
                    index: -1,
                    item: "bucket".to_owned(),
                    error: format!("bucket not found: {e}"),
                },
                ctx.max_errors,
            );
            operation.status = BatchStatus::Failed;
            operation.updated_at = Utc::now();
            ctx.metadata.update_batch_progress(&operation).await?;
            warn!(
                worker = ctx.id,
                operation_id,
                %bucket_id,
                "batch operation failed: missing bucket"
            );
            return Ok(());
        }
    }

    let spec = operation.spec.clone();
    for index in 0..operation.total_items {
        if operation.status == BatchStatus::Cancelled {
            info!(
                worker = ctx.id,
                operation_id,
                processed = operation.processed_items,
                "stopping cancelled batch operation"
            );
            return Ok(());
        }

        match apply_item(ctx, &spec, index).await {
            Ok(()) => operation.processed_items += 1,
            Err((item, error)) => {
                operation.failed_items += 1;
                operation.push_error(
                    BatchItemError {
                        index: i64::try_from(index).unwrap_or(i64::MAX),
                        item,
                        error,
                    },
                    ctx.max_errors,
                );
            }
        }
        operation.updated_at = Utc::now();
        // the store keeps a concurrent cancel authoritative; the returned
        // status drives the check at the next boundary
        operation.status = ctx.metadata.update_batch_progress(&operation).await?;
    }

    if operation.status == BatchStatus::Cancelled {
        info!(
            worker = ctx.id,
            operation_id, "batch operation cancelled before completion"
        );
        return Ok(());
    }

    operation.status = BatchStatus::Completed;
    operation.completed_at = Some(Utc::now());
    operation.updated_at = Utc::now();
    if ctx.metadata.update_batch_progress(&operation).await? == BatchStatus::Cancelled {
        info!(
            worker = ctx.id,
            operation_id, "batch operation cancelled at the terminal update"
        );
        return Ok(());
    }

    info!(
        worker = ctx.id,
        operation_id,
        processed = operation.processed_items,
        failed = operation.failed_items,
        "batch operation completed"
    );
    Ok(())
}

/// Apply the item at `index`, mapping failure to `(item label, message)`.
async fn apply_item(
    ctx: &WorkerContext,
    spec: &BatchJobSpec,
    index: usize,
) -> Result<(), (String, String)> {
    match spec {
        BatchJobSpec::Upload { bucket_id, files } => {
            upload_item(ctx, bucket_id, &files[index]).await
        }
        BatchJobSpec::Delete { bucket_id, keys } => delete_item(ctx, bucket_id, &keys[index]).await,
        BatchJobSpec::Copy { items } => copy_item(ctx, &items[index], false).await,
        BatchJobSpec::Move { items } => copy_item(ctx, &items[index], true).await,
        BatchJobSpec::Metadata { bucket_id, updates } => {
            metadata_item(ctx, bucket_id, &updates[index]).await
        }
    }
}

async fn upload_item(
    ctx: &WorkerContext,
    bucket_id: &str,
    file: &BatchUploadItem,
) -> Result<(), (String, String)> {
    let data = BASE64
        .decode(&file.data)
        .map_err(|e| (file.key.clone(), format!("invalid base64: {e}")))?;

    let write = ctx
        .objects
        .put(bucket_id, &file.key, Bytes::from(data), &file.metadata)
        .await
        .map_err(|e| (file.key.clone(), format!("storage save failed: {e}")))?;

    let record = FileRecord::new(
        bucket_id,
        &file.key,
        write.size,
        &file.content_type,
        &write.etag,
        file.metadata.clone(),
    );
    ctx.metadata
        .save_file(&record)
        .await
        .map_err(|e| (file.key.clone(), format!("metadata save failed: {e}")))?;
    Ok(())
}

async fn delete_item(
    ctx: &WorkerContext,
    bucket_id: &str,
    key: &str,
) -> Result<(), (String, String)> {
    // blob deletion is idempotent; a dangling record still fails below
    ctx.objects
        .delete(bucket_id, key)
        .await
        .map_err(|e| (key.to_owned(), format!("storage delete failed: {e}")))?;

    ctx.metadata
        .delete_file(bucket_id, key)
        .await
        .map_err(|e| (key.to_owned(), format!("metadata delete failed: {e}")))?;
    Ok(())
}

async fn copy_item(
    ctx: &WorkerContext,
    item: &BatchTransferItem,
    delete_source: bool,
) -> Result<(), (String, String)> {
    let source_label = format!("{}/{}", item.source_bucket, item.source_key);
    let dest_label = format!("{}/{}", item.dest_bucket, item.dest_key);

    ctx.metadata
        .get_bucket(&item.source_bucket)
        .await
        .map_err(|e| (source_label.clone(), format!("source bucket not found: {e}")))?;
    ctx.metadata
        .get_bucket(&item.dest_bucket)
        .await
        .map_err(|e| (dest_label.clone(), format!("dest bucket not found: {e}")))?;

    let write = ctx
        .objects
        .copy(
            &item.source_bucket,
            &item.source_key,
            &item.dest_bucket,
            &item.dest_key,
        )
        .await
        .map_err(|e| {
            (
                format!("{source_label} -> {dest_label}"),
                format!("storage copy failed: {e}"),
            )
        })?;

    let source = ctx
        .metadata
        .get_file(&item.source_bucket, &item.source_key)
        .await
        .map_err(|e| (item.source_key.clone(), format!("source metadata not found: {e}")))?;

    let record = FileRecord::new(
        &item.dest_bucket,
        &item.dest_key,
        write.size,
        &source.content_type,
        &write.etag,
        source.metadata.clone(),
    );
    ctx.metadata
        .save_file(&record)
        .await
        .map_err(|e| (item.dest_key.clone(), format!("dest metadata save failed: {e}")))?;

    if delete_source {
        ctx.objects
            .delete(&item.source_bucket, &item.source_key)
            .await
            .map_err(|e| (source_label.clone(), format!("copied but delete failed: {e}")))?;
        ctx.metadata
            .delete_file(&item.source_bucket, &item.source_key)
            .await
            .map_err(|e| {
                (
                    source_label.clone(),
                    format!("copied but metadata delete failed: {e}"),
                )
            })?;
    }
    Ok(())
}

async fn metadata_item(
    ctx: &WorkerContext,
    bucket_id: &str,
    update: &BatchMetadataItem,
) -> Result<(), (String, String)> {
    let mut record = ctx
        .metadata
        .get_file(bucket_id, &update.key)
        .await
        .map_err(|e| (update.key.clone(), format!("file not found: {e}")))?;

    record.metadata = update.metadata.clone();
    record.updated_at = Utc::now();
    ctx.metadata
        .update_file(&record)
        .await
        .map_err(|e| (update.key.clone(), format!("update failed: {e}")))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
