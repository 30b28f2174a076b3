//! Batch operation engine.
//!
//! Submitting a job persists a [`BatchOperation`] record in `pending`
//! state and pushes its id onto a bounded queue. A fixed pool of worker
//! tasks drains the queue and executes jobs one item at a time, so a
//! crash between items loses at most the item in flight; everything
//! already processed is reflected in the persisted record. On restart,
//! [`BatchEngine::recover_queued`] re-enqueues whatever was still
//! `pending` when the process died.
//!
//! Dropping the engine closes the queue, which lets the workers finish
//! their current job and exit.

mod worker;

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::CaskConfig;
use crate::error::{CaskError, CaskResult};
use crate::model::{BatchJobSpec, BatchOperation, BatchStatus};
use crate::store::{BatchListFilter, MetadataStore, ObjectStore};

/// Accepts batch jobs and runs them on a background worker pool.
#[derive(Debug)]
pub struct BatchEngine {
    metadata: Arc<dyn MetadataStore>,
    queue: mpsc::Sender<String>,
    workers: parking_lot::Mutex<Vec<JoinHandle<()>>>,
}

impl BatchEngine {
    /// Spawn the worker pool and return the engine.
    ///
    /// Pool size and queue depth come from `config` (`batch_workers`,
    /// `batch_queue_depth`), both clamped to at least 1. Must be called
    /// from within a Tokio runtime.
    #[must_use]
    pub fn start(
        objects: Arc<dyn ObjectStore>,
        metadata: Arc<dyn MetadataStore>,
        config: &CaskConfig,
    ) -> Self {
        let worker_count = config.batch_workers.max(1);
        let queue_depth = config.batch_queue_depth.max(1);
        let (queue_tx, queue_rx) = mpsc::channel(queue_depth);
        let queue_rx = Arc::new(Mutex::new(queue_rx));

        let mut handles = Vec::with_capacity(worker_count);
        for id in 0..worker_count {
            let ctx = worker::WorkerContext {
                id,
                objects: objects.clone(),
                metadata: metadata.clone(),
                queue: queue_rx.clone(),
                max_errors: config.max_batch_errors,
            };
            handles.push(tokio::spawn(worker::run(ctx)));
        }

        info!(workers = worker_count, queue_depth, "batch engine started");

        Self {
            metadata,
            queue: queue_tx,
            workers: parking_lot::Mutex::new(handles),
        }
    }

    /// Persist a new batch operation and queue it for execution.
    ///
    /// Returns the operation id to poll with [`Self::get`]. If the
    /// queue is full this waits for a slot instead of failing, so
    /// submission backpressure propagates to the caller.
    ///
    /// # Errors
    ///
    /// - [`CaskError::Validation`] if the job describes zero items.
    /// - [`CaskError::Dependency`] if the record cannot be persisted or
    ///   the worker pool has shut down.
    pub async fn submit(&self, spec: BatchJobSpec) -> CaskResult<String> {
        if spec.item_count() == 0 {
            return Err(CaskError::Validation {
                message: "batch submission contains no items".to_owned(),
            });
        }

        let operation = BatchOperation::new(spec);
        self.metadata.save_batch(&operation).await?;

        if self.queue.send(operation.id.clone()).await.is_err() {
            return Err(CaskError::Dependency(anyhow::anyhow!(
                "batch queue closed"
            )));
        }

        debug!(
            operation_id = %operation.id,
            kind = %operation.kind,
            items = operation.total_items,
            "queued batch operation"
        );
        Ok(operation.id)
    }

    /// Re-enqueue operations that were persisted but never executed.
    ///
    /// Call once after construction. Only `pending` records are
    /// replayed, oldest first; anything that had already started or
    /// finished keeps its persisted state untouched.
    ///
    /// # Errors
    ///
    /// Returns [`CaskError::Dependency`] if the listing fails or the
    /// worker pool has shut down.
    pub async fn recover_queued(&self) -> CaskResult<usize> {
        let filter = BatchListFilter {
            status: Some(BatchStatus::Pending),
            ..BatchListFilter::default()
        };
        let pending = self.metadata.list_batches(&filter).await?;

        let mut requeued = 0usize;
        // listings are newest first; replay in submission order
        for operation in pending.into_iter().rev() {
            if self.queue.send(operation.id).await.is_err() {
                return Err(CaskError::Dependency(anyhow::anyhow!(
                    "batch queue closed"
                )));
            }
            requeued += 1;
        }

        if requeued > 0 {
            info!(requeued, "re-queued pending batch operations");
        }
        Ok(requeued)
    }

    /// Request cancellation of a queued or running operation.
    ///
    /// The status check and the transition happen atomically in the
    /// store, so a job that completes concurrently is never overwritten.
    /// Workers check for cancellation between items, so a running job
    /// stops at the next item boundary; items already applied stay
    /// applied. Returns the updated record.
    ///
    /// # Errors
    ///
    /// - [`CaskError::NotFound`] if the operation does not exist.
    /// - [`CaskError::InvalidState`] if it already completed or was
    ///   already cancelled.
    pub async fn cancel(&self, operation_id: &str) -> CaskResult<BatchOperation> {
        let operation = self.metadata.mark_batch_cancelled(operation_id).await?;
        info!(operation_id, "cancelled batch operation");
        Ok(operation)
    }

    /// Fetch one operation record with its live progress counters.
    ///
    /// # Errors
    ///
    /// Returns [`CaskError::NotFound`] if the operation does not exist.
    pub async fn get(&self, operation_id: &str) -> CaskResult<BatchOperation> {
        self.metadata.get_batch(operation_id).await
    }

    /// List operation records, newest first, optionally filtered.
    ///
    /// # Errors
    ///
    /// Returns [`CaskError::Dependency`] if the listing fails.
    pub async fn list(&self, filter: &BatchListFilter) -> CaskResult<Vec<BatchOperation>> {
        self.metadata.list_batches(filter).await
    }

    /// Number of worker tasks spawned at startup.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.workers.lock().len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
