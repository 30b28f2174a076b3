//! Storage seams for the Cask core.
//!
//! Two traits separate what the coordinator and the batch engine need from
//! how it is stored:
//!
//! - [`ObjectStore`] -- raw object bytes, addressed by `(bucket, key)`
//! - [`MetadataStore`] -- durable records: buckets, files, uploads, batch
//!   operations and policy history
//!
//! The in-memory backends ([`MemoryObjectStore`], [`MemoryMetadataStore`])
//! implement both and are the default wiring; alternative backends only
//! need to uphold the same not-found and update semantics.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::CaskResult;
use crate::model::{
    BatchKind, BatchOperation, BatchStatus, BucketRecord, FileRecord, MultipartUpload,
    PolicyHistoryEntry,
};
use crate::policy::Policy;

pub(crate) mod memory;

pub use memory::{MemoryMetadataStore, MemoryObjectStore};

/// Result of writing object data.
#[derive(Debug, Clone)]
pub struct PutResult {
    /// Entity tag of the written data (lowercase hex MD5).
    pub etag: String,
    /// Size in bytes.
    pub size: u64,
}

/// Raw object byte storage.
///
/// Implementations must be safe to share across tasks. `delete` is
/// idempotent: removing an absent object succeeds, so cleanup paths can
/// retry without tracking what already went away. `get` and `copy` of an
/// absent source fail with a not-found error.
#[async_trait]
pub trait ObjectStore: Send + Sync + fmt::Debug {
    /// Store `data` under `(bucket, key)`, replacing any previous content.
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        metadata: &HashMap<String, String>,
    ) -> CaskResult<PutResult>;

    /// Read the full content of `(bucket, key)`.
    async fn get(&self, bucket: &str, key: &str) -> CaskResult<Bytes>;

    /// Remove `(bucket, key)` if present.
    async fn delete(&self, bucket: &str, key: &str) -> CaskResult<()>;

    /// Copy one object to another location, carrying its metadata along.
    async fn copy(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
    ) -> CaskResult<PutResult>;
}

/// Filter for listing batch operations.
#[derive(Debug, Clone, Default)]
pub struct BatchListFilter {
    /// Keep only operations in this status.
    pub status: Option<BatchStatus>,
    /// Keep only operations of this kind.
    pub kind: Option<BatchKind>,
    /// Return at most this many operations (newest first).
    pub limit: Option<usize>,
}

/// Durable record storage.
///
/// `save_*` methods upsert; `update_*` and `delete_*` methods require the
/// record to exist and fail with a not-found error otherwise. That split
/// lets callers distinguish "first write" from "lost record" without extra
/// reads.
#[async_trait]
pub trait MetadataStore: Send + Sync + fmt::Debug {
    // -----------------------------------------------------------------------
    // Buckets
    // -----------------------------------------------------------------------

    /// Store a bucket record.
    async fn save_bucket(&self, bucket: &BucketRecord) -> CaskResult<()>;

    /// Fetch a bucket by ID.
    async fn get_bucket(&self, bucket_id: &str) -> CaskResult<BucketRecord>;

    /// Fetch a bucket by its unique name.
    async fn get_bucket_by_name(&self, name: &str) -> CaskResult<BucketRecord>;

    /// Replace a bucket's policy, bumping its policy version atomically.
    ///
    /// Returns the new version.
    async fn update_bucket_policy(&self, bucket_id: &str, policy: Policy) -> CaskResult<u64>;

    /// Append an entry to a bucket's policy audit trail.
    async fn append_policy_history(&self, entry: &PolicyHistoryEntry) -> CaskResult<()>;

    /// List a bucket's policy history, oldest version first.
    async fn policy_history(&self, bucket_id: &str) -> CaskResult<Vec<PolicyHistoryEntry>>;

    // -----------------------------------------------------------------------
    // Files
    // -----------------------------------------------------------------------

    /// Store a file record, replacing any record with the same bucket and key.
    async fn save_file(&self, file: &FileRecord) -> CaskResult<()>;

    /// Fetch the file record for `(bucket_id, key)`.
    async fn get_file(&self, bucket_id: &str, key: &str) -> CaskResult<FileRecord>;

    /// Replace an existing file record.
    async fn update_file(&self, file: &FileRecord) -> CaskResult<()>;

    /// Remove the file record for `(bucket_id, key)`.
    async fn delete_file(&self, bucket_id: &str, key: &str) -> CaskResult<()>;

    // -----------------------------------------------------------------------
    // Multipart uploads
    // -----------------------------------------------------------------------

    /// Store a new upload record.
    async fn save_upload(&self, upload: &MultipartUpload) -> CaskResult<()>;

    /// Fetch an upload by its caller-visible upload ID.
    async fn get_upload(&self, upload_id: &str) -> CaskResult<MultipartUpload>;

    /// Replace an existing upload record.
    async fn update_upload(&self, upload: &MultipartUpload) -> CaskResult<()>;

    /// List all upload records for a bucket, oldest first.
    async fn list_uploads(&self, bucket_id: &str) -> CaskResult<Vec<MultipartUpload>>;

    // -----------------------------------------------------------------------
    // Batch operations
    // -----------------------------------------------------------------------

    /// Store a new batch operation record.
    async fn save_batch(&self, op: &BatchOperation) -> CaskResult<()>;

    /// Fetch a batch operation by ID.
    async fn get_batch(&self, operation_id: &str) -> CaskResult<BatchOperation>;

    /// Replace an existing batch operation record, unless it was cancelled.
    ///
    /// Worker progress goes through this method: counters, errors and
    /// timestamps from `op` land as given, but a `Cancelled` status already
    /// in the store wins over the status `op` carries and suppresses its
    /// `completed_at`. Returns the status actually stored, so the writer
    /// observes a concurrent cancellation at the moment it persists.
    async fn update_batch_progress(&self, op: &BatchOperation) -> CaskResult<BatchStatus>;

    /// Transition a batch operation to `Cancelled`.
    ///
    /// The status check and the write happen atomically: a record that
    /// already completed or was already cancelled fails with an
    /// invalid-state error instead of being overwritten. Returns the
    /// updated record.
    async fn mark_batch_cancelled(&self, operation_id: &str) -> CaskResult<BatchOperation>;

    /// List batch operations matching `filter`, newest first.
    async fn list_batches(&self, filter: &BatchListFilter) -> CaskResult<Vec<BatchOperation>>;
}
