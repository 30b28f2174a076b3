//! In-memory store backends.
//!
//! Object bytes below a configurable threshold are kept in memory as
//! [`Bytes`]; larger payloads are spilled to temporary files on disk and
//! cleaned up when the entry is removed (via the [`Drop`] implementation
//! on the internal blob type).
//!
//! Both backends use [`DashMap`] for concurrent access, so every method
//! takes `&self` and can be called from any task.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use tracing::{debug, trace, warn};

use super::{BatchListFilter, MetadataStore, ObjectStore, PutResult};
use crate::error::{CaskError, CaskResult};
use crate::model::{
    BatchOperation, BatchStatus, BucketRecord, FileRecord, MultipartUpload, PolicyHistoryEntry,
};
use crate::policy::Policy;
use crate::utils::md5_hex;

/// Composite key identifying a stored object: `(bucket, key)`.
type ObjectKey = (String, String);

/// Default maximum object size (in bytes) kept in memory before spilling
/// to disk. The default is 512 KiB.
const DEFAULT_MAX_MEMORY_SIZE: usize = 524_288;

// ---------------------------------------------------------------------------
// StoredBlob
// ---------------------------------------------------------------------------

/// Internal representation of stored object bytes.
///
/// Small payloads are kept in memory. Large payloads are spilled to a
/// temporary file; dropping the [`StoredBlob::OnDisk`] value removes it.
enum StoredBlob {
    /// Small payloads kept entirely in memory.
    InMemory {
        /// The raw bytes.
        data: Bytes,
    },
    /// Large payloads spilled to a temp file.
    OnDisk {
        /// Path to the temporary file.
        path: PathBuf,
        /// Size of the stored data in bytes.
        size: u64,
    },
}

impl std::fmt::Debug for StoredBlob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InMemory { data } => f
                .debug_struct("InMemory")
                .field("size", &data.len())
                .finish(),
            Self::OnDisk { path, size } => f
                .debug_struct("OnDisk")
                .field("path", path)
                .field("size", size)
                .finish(),
        }
    }
}

impl Drop for StoredBlob {
    fn drop(&mut self) {
        if let Self::OnDisk { path, .. } = self {
            if let Err(e) = std::fs::remove_file(path.as_path()) {
                // File may have already been cleaned up; only warn if the
                // error is something other than "not found".
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %e, "failed to remove temp file");
                }
            } else {
                trace!(path = %path.display(), "removed temp file");
            }
        }
    }
}

impl StoredBlob {
    /// Read the full payload of this blob.
    async fn read_all(&self) -> CaskResult<Bytes> {
        match self {
            Self::InMemory { data } => Ok(data.clone()),
            Self::OnDisk { path, .. } => {
                let data = tokio::fs::read(path).await.map_err(|e| {
                    CaskError::Dependency(anyhow::anyhow!(
                        "failed to read temp file {}: {e}",
                        path.display()
                    ))
                })?;
                Ok(Bytes::from(data))
            }
        }
    }
}

/// One stored object: payload plus the user-defined metadata it was
/// written with.
#[derive(Debug)]
struct StoredEntry {
    blob: StoredBlob,
    metadata: HashMap<String, String>,
}

// ---------------------------------------------------------------------------
// MemoryObjectStore
// ---------------------------------------------------------------------------

/// In-memory object store with automatic spillover to tempfiles.
///
/// # Examples
///
/// ```
/// use std::collections::HashMap;
///
/// use bytes::Bytes;
/// use cask_core::store::{MemoryObjectStore, ObjectStore};
///
/// # tokio_test::block_on(async {
/// let store = MemoryObjectStore::new(1024);
/// let result = store
///     .put("my-bucket", "hello.txt", Bytes::from("hello"), &HashMap::new())
///     .await
///     .unwrap();
/// assert_eq!(result.size, 5);
///
/// let data = store.get("my-bucket", "hello.txt").await.unwrap();
/// assert_eq!(data.as_ref(), b"hello");
/// # });
/// ```
pub struct MemoryObjectStore {
    /// Stored objects keyed by `(bucket, key)`.
    entries: DashMap<ObjectKey, StoredEntry>,
    /// Max size in bytes kept in memory before spilling to disk.
    max_memory_size: usize,
}

impl std::fmt::Debug for MemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryObjectStore")
            .field("entries_count", &self.entries.len())
            .field("max_memory_size", &self.max_memory_size)
            .finish()
    }
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MEMORY_SIZE)
    }
}

impl MemoryObjectStore {
    /// Create a new store with the given memory threshold.
    ///
    /// Payloads larger than `max_memory_size` bytes are spilled to
    /// temporary files on disk.
    #[must_use]
    pub fn new(max_memory_size: usize) -> Self {
        debug!(max_memory_size, "creating MemoryObjectStore");
        Self {
            entries: DashMap::new(),
            max_memory_size,
        }
    }

    /// Return the user-defined metadata stored with an object, if present.
    #[must_use]
    pub fn object_metadata(&self, bucket: &str, key: &str) -> Option<HashMap<String, String>> {
        self.entries
            .get(&(bucket.to_owned(), key.to_owned()))
            .map(|e| e.metadata.clone())
    }

    // -----------------------------------------------------------------------
    // Private helpers
    // -----------------------------------------------------------------------

    /// Store payload bytes either in memory or on disk, depending on size.
    async fn store_blob(&self, data: Bytes) -> CaskResult<StoredBlob> {
        if data.len() > self.max_memory_size {
            self.spill_to_disk(&data).await
        } else {
            Ok(StoredBlob::InMemory { data })
        }
    }

    /// Write payload bytes to a temporary file.
    async fn spill_to_disk(&self, data: &[u8]) -> CaskResult<StoredBlob> {
        let size = data.len() as u64;

        // Create the temp file synchronously (tempfile::NamedTempFile uses
        // the OS temp directory) then persist it so it is not deleted when
        // the NamedTempFile handle is dropped; cleanup happens in Drop.
        let temp = tempfile::NamedTempFile::new().map_err(|e| {
            CaskError::Dependency(anyhow::anyhow!("failed to create temp file: {e}"))
        })?;
        let path = temp.path().to_path_buf();

        temp.persist(&path).map_err(|e| {
            CaskError::Dependency(anyhow::anyhow!(
                "failed to persist temp file {}: {e}",
                path.display()
            ))
        })?;

        tokio::fs::write(&path, data).await.map_err(|e| {
            CaskError::Dependency(anyhow::anyhow!(
                "failed to write temp file {}: {e}",
                path.display()
            ))
        })?;

        trace!(path = %path.display(), size, "spilled data to disk");
        Ok(StoredBlob::OnDisk { path, size })
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        metadata: &HashMap<String, String>,
    ) -> CaskResult<PutResult> {
        let etag = md5_hex(&data);
        let size = data.len() as u64;

        let blob = self.store_blob(data).await?;

        trace!(bucket, key, size, "stored object data");
        self.entries.insert(
            (bucket.to_owned(), key.to_owned()),
            StoredEntry {
                blob,
                metadata: metadata.clone(),
            },
        );

        Ok(PutResult { etag, size })
    }

    async fn get(&self, bucket: &str, key: &str) -> CaskResult<Bytes> {
        let entry = self
            .entries
            .get(&(bucket.to_owned(), key.to_owned()))
            .ok_or_else(|| CaskError::NotFound {
                resource: format!("object {bucket}/{key}"),
            })?;

        entry.value().blob.read_all().await
    }

    async fn delete(&self, bucket: &str, key: &str) -> CaskResult<()> {
        if self
            .entries
            .remove(&(bucket.to_owned(), key.to_owned()))
            .is_some()
        {
            trace!(bucket, key, "deleted object data");
        }
        Ok(())
    }

    async fn copy(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
    ) -> CaskResult<PutResult> {
        let metadata = self
            .entries
            .get(&(src_bucket.to_owned(), src_key.to_owned()))
            .map(|e| e.metadata.clone())
            .ok_or_else(|| CaskError::NotFound {
                resource: format!("object {src_bucket}/{src_key}"),
            })?;

        let data = self.get(src_bucket, src_key).await?;

        debug!(
            src_bucket,
            src_key,
            dst_bucket,
            dst_key,
            size = data.len(),
            "copying object data"
        );

        self.put(dst_bucket, dst_key, data, &metadata).await
    }
}

// ---------------------------------------------------------------------------
// MemoryMetadataStore
// ---------------------------------------------------------------------------

/// In-memory metadata store backed by per-family [`DashMap`]s.
///
/// Upholds the [`MetadataStore`] contract exactly: `save_*` upserts,
/// `update_*` and `delete_*` fail with [`CaskError::NotFound`] when the
/// record is absent, and `update_bucket_policy` bumps the policy version
/// under the bucket's map entry lock.
pub struct MemoryMetadataStore {
    buckets: DashMap<String, BucketRecord>,
    files: DashMap<(String, String), FileRecord>,
    uploads: DashMap<String, MultipartUpload>,
    batches: DashMap<String, BatchOperation>,
    policy_history: DashMap<String, Vec<PolicyHistoryEntry>>,
}

impl std::fmt::Debug for MemoryMetadataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryMetadataStore")
            .field("buckets", &self.buckets.len())
            .field("files", &self.files.len())
            .field("uploads", &self.uploads.len())
            .field("batches", &self.batches.len())
            .finish()
    }
}

impl Default for MemoryMetadataStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryMetadataStore {
    /// Create an empty metadata store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buckets: DashMap::new(),
            files: DashMap::new(),
            uploads: DashMap::new(),
            batches: DashMap::new(),
            policy_history: DashMap::new(),
        }
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    // -----------------------------------------------------------------------
    // Buckets
    // -----------------------------------------------------------------------

    async fn save_bucket(&self, bucket: &BucketRecord) -> CaskResult<()> {
        self.buckets.insert(bucket.id.clone(), bucket.clone());
        Ok(())
    }

    async fn get_bucket(&self, bucket_id: &str) -> CaskResult<BucketRecord> {
        self.buckets
            .get(bucket_id)
            .map(|b| b.clone())
            .ok_or_else(|| CaskError::NotFound {
                resource: format!("bucket {bucket_id}"),
            })
    }

    async fn get_bucket_by_name(&self, name: &str) -> CaskResult<BucketRecord> {
        self.buckets
            .iter()
            .find(|b| b.name == name)
            .map(|b| b.clone())
            .ok_or_else(|| CaskError::NotFound {
                resource: format!("bucket named {name}"),
            })
    }

    async fn update_bucket_policy(&self, bucket_id: &str, policy: Policy) -> CaskResult<u64> {
        let mut bucket = self
            .buckets
            .get_mut(bucket_id)
            .ok_or_else(|| CaskError::NotFound {
                resource: format!("bucket {bucket_id}"),
            })?;

        bucket.policy = Some(policy);
        bucket.policy_version += 1;
        bucket.updated_at = chrono::Utc::now();
        Ok(bucket.policy_version)
    }

    async fn append_policy_history(&self, entry: &PolicyHistoryEntry) -> CaskResult<()> {
        self.policy_history
            .entry(entry.bucket_id.clone())
            .or_default()
            .push(entry.clone());
        Ok(())
    }

    async fn policy_history(&self, bucket_id: &str) -> CaskResult<Vec<PolicyHistoryEntry>> {
        let mut entries = self
            .policy_history
            .get(bucket_id)
            .map(|v| v.clone())
            .unwrap_or_default();
        entries.sort_by_key(|e| e.version);
        Ok(entries)
    }

    // -----------------------------------------------------------------------
    // Files
    // -----------------------------------------------------------------------

    async fn save_file(&self, file: &FileRecord) -> CaskResult<()> {
        self.files
            .insert((file.bucket_id.clone(), file.key.clone()), file.clone());
        Ok(())
    }

    async fn get_file(&self, bucket_id: &str, key: &str) -> CaskResult<FileRecord> {
        self.files
            .get(&(bucket_id.to_owned(), key.to_owned()))
            .map(|f| f.clone())
            .ok_or_else(|| CaskError::NotFound {
                resource: format!("file {bucket_id}/{key}"),
            })
    }

    async fn update_file(&self, file: &FileRecord) -> CaskResult<()> {
        let mut entry = self
            .files
            .get_mut(&(file.bucket_id.clone(), file.key.clone()))
            .ok_or_else(|| CaskError::NotFound {
                resource: format!("file {}/{}", file.bucket_id, file.key),
            })?;

        *entry = file.clone();
        Ok(())
    }

    async fn delete_file(&self, bucket_id: &str, key: &str) -> CaskResult<()> {
        self.files
            .remove(&(bucket_id.to_owned(), key.to_owned()))
            .map(|_| ())
            .ok_or_else(|| CaskError::NotFound {
                resource: format!("file {bucket_id}/{key}"),
            })
    }

    // -----------------------------------------------------------------------
    // Multipart uploads
    // -----------------------------------------------------------------------

    async fn save_upload(&self, upload: &MultipartUpload) -> CaskResult<()> {
        self.uploads
            .insert(upload.upload_id.clone(), upload.clone());
        Ok(())
    }

    async fn get_upload(&self, upload_id: &str) -> CaskResult<MultipartUpload> {
        self.uploads
            .get(upload_id)
            .map(|u| u.clone())
            .ok_or_else(|| CaskError::NotFound {
                resource: format!("upload {upload_id}"),
            })
    }

    async fn update_upload(&self, upload: &MultipartUpload) -> CaskResult<()> {
        let mut entry =
            self.uploads
                .get_mut(&upload.upload_id)
                .ok_or_else(|| CaskError::NotFound {
                    resource: format!("upload {}", upload.upload_id),
                })?;

        *entry = upload.clone();
        Ok(())
    }

    async fn list_uploads(&self, bucket_id: &str) -> CaskResult<Vec<MultipartUpload>> {
        let mut uploads: Vec<MultipartUpload> = self
            .uploads
            .iter()
            .filter(|u| u.bucket_id == bucket_id)
            .map(|u| u.clone())
            .collect();
        uploads.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.upload_id.cmp(&b.upload_id))
        });
        Ok(uploads)
    }

    // -----------------------------------------------------------------------
    // Batch operations
    // -----------------------------------------------------------------------

    async fn save_batch(&self, op: &BatchOperation) -> CaskResult<()> {
        self.batches.insert(op.id.clone(), op.clone());
        Ok(())
    }

    async fn get_batch(&self, operation_id: &str) -> CaskResult<BatchOperation> {
        self.batches
            .get(operation_id)
            .map(|o| o.clone())
            .ok_or_else(|| CaskError::NotFound {
                resource: format!("batch operation {operation_id}"),
            })
    }

    async fn update_batch_progress(&self, op: &BatchOperation) -> CaskResult<BatchStatus> {
        let mut entry = self
            .batches
            .get_mut(&op.id)
            .ok_or_else(|| CaskError::NotFound {
                resource: format!("batch operation {}", op.id),
            })?;

        let mut next = op.clone();
        // a cancellation that raced this write stays authoritative
        if entry.status == BatchStatus::Cancelled {
            next.status = BatchStatus::Cancelled;
            next.completed_at = None;
        }
        *entry = next;
        Ok(entry.status)
    }

    async fn mark_batch_cancelled(&self, operation_id: &str) -> CaskResult<BatchOperation> {
        let mut entry = self
            .batches
            .get_mut(operation_id)
            .ok_or_else(|| CaskError::NotFound {
                resource: format!("batch operation {operation_id}"),
            })?;

        if matches!(
            entry.status,
            BatchStatus::Completed | BatchStatus::Cancelled
        ) {
            return Err(CaskError::InvalidState {
                message: format!("cannot cancel operation with status {}", entry.status),
            });
        }
        entry.status = BatchStatus::Cancelled;
        entry.updated_at = chrono::Utc::now();
        Ok(entry.clone())
    }

    async fn list_batches(&self, filter: &BatchListFilter) -> CaskResult<Vec<BatchOperation>> {
        let mut ops: Vec<BatchOperation> = self
            .batches
            .iter()
            .filter(|o| filter.status.is_none_or(|s| o.status == s))
            .filter(|o| filter.kind.is_none_or(|k| o.kind == k))
            .map(|o| o.clone())
            .collect();

        ops.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        if let Some(limit) = filter.limit {
            ops.truncate(limit);
        }
        Ok(ops)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
