//! Multipart upload coordination.
//!
//! The [`MultipartCoordinator`] drives the upload lifecycle: initiate,
//! stage parts, then complete into a single object or abort. Parts are
//! staged as ordinary objects under keys scoped by `(key, upload_id,
//! part_number)`, so concurrent uploads for the same object key never
//! collide and a re-sent part number overwrites its previous payload.
//!
//! # Locking
//!
//! Every state transition on one upload runs under that upload's async
//! mutex, so a part write, a completion and an abort never interleave
//! their read-modify-write cycles. Different uploads proceed in parallel.
//! The lock entry is dropped once the upload reaches a terminal state.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::BytesMut;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{CaskError, CaskResult};
use crate::model::{FileRecord, MultipartUpload, Part, UploadOptions, UploadStatus};
use crate::store::{MetadataStore, ObjectStore};
use crate::utils::{generate_upload_id, part_object_key};
use crate::validation::{validate_object_key, validate_part_number};

// ---------------------------------------------------------------------------
// Operation outputs
// ---------------------------------------------------------------------------

/// Outcome of initiating a multipart upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiatedUpload {
    /// Handle to pass to every subsequent operation on this upload.
    pub upload_id: String,
    /// The bucket the final object will land in.
    pub bucket_id: String,
    /// The object key this upload will create.
    pub key: String,
    /// When the upload was initiated.
    pub created_at: DateTime<Utc>,
}

/// Outcome of staging one part.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedPart {
    /// The part number the payload was stored under.
    pub part_number: u32,
    /// Entity tag of the staged payload (lowercase hex MD5).
    pub etag: String,
    /// Payload size in bytes.
    pub size: u64,
}

/// One `(part_number, etag)` pair a caller asserts when completing.
///
/// Completion verifies every reference against the staged parts before
/// assembling anything, so a client that lost track of what it uploaded
/// fails fast instead of producing a corrupt object.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartRef {
    /// Part number the caller believes it uploaded.
    pub part_number: u32,
    /// Entity tag the caller recorded for that part.
    pub etag: String,
}

/// Outcome of completing a multipart upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedUpload {
    /// The object key that now exists.
    pub key: String,
    /// Path-style location of the final object, `/{bucket_id}/{key}`.
    pub location: String,
    /// Entity tag of the assembled object (lowercase hex MD5 of the whole
    /// content, not a per-part composite).
    pub etag: String,
    /// Size of the assembled object in bytes.
    pub size: u64,
}

/// One row in a bucket's in-progress upload listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSummary {
    /// Handle for the upload.
    pub upload_id: String,
    /// The object key the upload will create.
    pub key: String,
    /// Lifecycle state; always `Initiated` in listings.
    pub status: UploadStatus,
    /// When the upload was initiated.
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// MultipartCoordinator
// ---------------------------------------------------------------------------

/// Coordinates multipart uploads over an object store and a metadata store.
#[derive(Debug)]
pub struct MultipartCoordinator {
    objects: Arc<dyn ObjectStore>,
    metadata: Arc<dyn MetadataStore>,
    /// Per-upload mutexes guarding read-modify-write cycles.
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl MultipartCoordinator {
    /// Create a coordinator over the given stores.
    #[must_use]
    pub fn new(objects: Arc<dyn ObjectStore>, metadata: Arc<dyn MetadataStore>) -> Self {
        Self {
            objects,
            metadata,
            locks: DashMap::new(),
        }
    }

    /// Start a new upload for `key` in `bucket_id`.
    ///
    /// The returned upload accepts parts immediately. Options are applied
    /// to the final object when the upload completes.
    ///
    /// # Errors
    ///
    /// - [`CaskError::Validation`] if the key is empty or too long.
    /// - [`CaskError::NotFound`] if the bucket does not exist.
    pub async fn initiate(
        &self,
        bucket_id: &str,
        key: &str,
        options: UploadOptions,
    ) -> CaskResult<InitiatedUpload> {
        validate_object_key(key)?;
        self.metadata.get_bucket(bucket_id).await?;

        let upload = MultipartUpload::new(generate_upload_id(), bucket_id, key, options);
        self.metadata.save_upload(&upload).await?;

        debug!(
            bucket_id,
            key,
            upload_id = %upload.upload_id,
            "initiated multipart upload"
        );

        Ok(InitiatedUpload {
            upload_id: upload.upload_id,
            bucket_id: upload.bucket_id,
            key: upload.key,
            created_at: upload.created_at,
        })
    }

    /// Stage one part of an upload.
    ///
    /// Parts may arrive in any order and a re-sent part number replaces
    /// the previous payload. The returned ETag is what [`Self::complete`]
    /// expects back in the caller's part references.
    ///
    /// # Errors
    ///
    /// - [`CaskError::Validation`] if the part number is outside `1..=10_000`.
    /// - [`CaskError::NotFound`] if the upload does not exist.
    /// - [`CaskError::InvalidState`] if the upload is completed or aborted.
    pub async fn upload_part(
        &self,
        upload_id: &str,
        part_number: u32,
        data: bytes::Bytes,
    ) -> CaskResult<UploadedPart> {
        validate_part_number(part_number)?;

        let lock = self.lock_for(upload_id);
        let _guard = lock.lock().await;

        let mut upload = self.metadata.get_upload(upload_id).await?;
        ensure_initiated(&upload)?;

        let part_key = part_object_key(&upload.key, upload_id, part_number);
        let write = self
            .objects
            .put(&upload.bucket_id, &part_key, data, &HashMap::new())
            .await?;

        upload.put_part(Part {
            part_number,
            etag: write.etag.clone(),
            size: write.size,
            uploaded_at: Utc::now(),
        });
        upload.updated_at = Utc::now();
        self.metadata.update_upload(&upload).await?;

        debug!(
            bucket_id = %upload.bucket_id,
            key = %upload.key,
            upload_id,
            part_number,
            size = write.size,
            "staged upload part"
        );

        Ok(UploadedPart {
            part_number,
            etag: write.etag,
            size: write.size,
        })
    }

    /// Assemble the staged parts into the final object.
    ///
    /// `parts` is the caller's checklist: every referenced part number
    /// must exist with the exact ETag returned when it was staged. The
    /// assembled object concatenates all staged parts in ascending
    /// part-number order, is stored under the upload's key, and gets a
    /// file record with the options captured at initiation. Staged part
    /// objects are then removed on a best-effort basis.
    ///
    /// # Errors
    ///
    /// - [`CaskError::NotFound`] if the upload does not exist.
    /// - [`CaskError::InvalidState`] if the upload is completed or aborted.
    /// - [`CaskError::Validation`] if `parts` is empty or references a
    ///   part that was never staged (or carries a stale ETag).
    pub async fn complete(&self, upload_id: &str, parts: &[PartRef]) -> CaskResult<CompletedUpload> {
        let lock = self.lock_for(upload_id);
        let _guard = lock.lock().await;

        let mut upload = self.metadata.get_upload(upload_id).await?;
        ensure_initiated(&upload)?;

        if parts.is_empty() {
            return Err(CaskError::Validation {
                message: "completion requires at least one part reference".to_owned(),
            });
        }
        for part_ref in parts {
            let matches = upload
                .get_part(part_ref.part_number)
                .is_some_and(|stored| stored.etag == part_ref.etag);
            if !matches {
                return Err(CaskError::Validation {
                    message: format!(
                        "part {} with etag {} not found in upload",
                        part_ref.part_number, part_ref.etag
                    ),
                });
            }
        }

        // Assemble every staged part in ascending part-number order.
        let mut combined = BytesMut::new();
        for part in upload.parts.values() {
            let part_key = part_object_key(&upload.key, upload_id, part.part_number);
            let data = self.objects.get(&upload.bucket_id, &part_key).await?;
            combined.extend_from_slice(&data);
        }
        let assembled = combined.freeze();

        let write = self
            .objects
            .put(
                &upload.bucket_id,
                &upload.key,
                assembled,
                &upload.options.metadata,
            )
            .await?;

        let content_type = upload.options.content_type.clone().unwrap_or_default();
        let file = FileRecord::new(
            &upload.bucket_id,
            &upload.key,
            write.size,
            &content_type,
            &write.etag,
            upload.options.metadata.clone(),
        );
        self.metadata.save_file(&file).await?;

        self.discard_parts(&upload).await;

        upload.status = UploadStatus::Completed;
        upload.updated_at = Utc::now();
        self.metadata.update_upload(&upload).await?;
        self.locks.remove(upload_id);

        debug!(
            bucket_id = %upload.bucket_id,
            key = %upload.key,
            upload_id,
            parts = upload.parts_count(),
            size = write.size,
            "completed multipart upload"
        );

        Ok(CompletedUpload {
            location: format!("/{}/{}", upload.bucket_id, upload.key),
            key: upload.key,
            etag: write.etag,
            size: write.size,
        })
    }

    /// Abandon an upload and discard its staged parts.
    ///
    /// Part cleanup is best-effort; a failed delete is logged and the
    /// abort still takes effect, so the upload can never be resumed.
    ///
    /// # Errors
    ///
    /// - [`CaskError::NotFound`] if the upload does not exist.
    /// - [`CaskError::InvalidState`] if the upload is completed or aborted.
    pub async fn abort(&self, upload_id: &str) -> CaskResult<()> {
        let lock = self.lock_for(upload_id);
        let _guard = lock.lock().await;

        let mut upload = self.metadata.get_upload(upload_id).await?;
        ensure_initiated(&upload)?;

        self.discard_parts(&upload).await;

        upload.status = UploadStatus::Aborted;
        upload.updated_at = Utc::now();
        self.metadata.update_upload(&upload).await?;
        self.locks.remove(upload_id);

        debug!(
            bucket_id = %upload.bucket_id,
            key = %upload.key,
            upload_id,
            "aborted multipart upload"
        );
        Ok(())
    }

    /// List the staged parts of an upload in ascending part-number order.
    ///
    /// # Errors
    ///
    /// Returns [`CaskError::NotFound`] if the upload does not exist.
    pub async fn list_parts(&self, upload_id: &str) -> CaskResult<Vec<Part>> {
        let upload = self.metadata.get_upload(upload_id).await?;
        Ok(upload.parts.values().cloned().collect())
    }

    /// List the in-progress uploads for a bucket, oldest first.
    ///
    /// Completed and aborted uploads are excluded.
    ///
    /// # Errors
    ///
    /// Returns [`CaskError::NotFound`] if the bucket does not exist.
    pub async fn list_uploads(&self, bucket_id: &str) -> CaskResult<Vec<UploadSummary>> {
        self.metadata.get_bucket(bucket_id).await?;

        let uploads = self.metadata.list_uploads(bucket_id).await?;
        Ok(uploads
            .into_iter()
            .filter(|u| u.status == UploadStatus::Initiated)
            .map(|u| UploadSummary {
                upload_id: u.upload_id,
                key: u.key,
                status: u.status,
                created_at: u.created_at,
            })
            .collect())
    }

    // -----------------------------------------------------------------------
    // Private helpers
    // -----------------------------------------------------------------------

    /// Fetch or create the mutex guarding `upload_id`.
    fn lock_for(&self, upload_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(upload_id.to_owned())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Delete every staged part object, logging failures instead of
    /// propagating them.
    async fn discard_parts(&self, upload: &MultipartUpload) {
        for part in upload.parts.values() {
            let part_key = part_object_key(&upload.key, &upload.upload_id, part.part_number);
            if let Err(e) = self.objects.delete(&upload.bucket_id, &part_key).await {
                warn!(
                    bucket_id = %upload.bucket_id,
                    part_key = %part_key,
                    error = %e,
                    "failed to remove staged part"
                );
            }
        }
    }
}

/// Reject operations on uploads that already reached a terminal state.
fn ensure_initiated(upload: &MultipartUpload) -> CaskResult<()> {
    if upload.status == UploadStatus::Initiated {
        Ok(())
    } else {
        Err(CaskError::InvalidState {
            message: format!("upload {} is {}", upload.upload_id, upload.status),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
