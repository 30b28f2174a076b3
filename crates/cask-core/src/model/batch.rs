//! Batch operation records.
//!
//! A [`BatchOperation`] is the durable state of one asynchronous job: what
//! to do ([`BatchJobSpec`]), how far it has progressed, and what failed.
//! The record is persisted after every item, so an observer polling the
//! store sees progress while the job runs and the full outcome afterwards.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::generate_record_id;

/// Lifecycle state of a batch operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    /// Accepted and queued; no work attempted yet.
    Pending,
    /// A worker is applying items.
    Processing,
    /// Every item was attempted; per-item failures are recorded.
    Completed,
    /// A job-level precondition failed before any item ran.
    Failed,
    /// Cancelled by the caller; terminal.
    Cancelled,
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// The kind of work a batch operation performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchKind {
    /// Store new objects from inline payloads.
    Upload,
    /// Delete objects and their metadata.
    Delete,
    /// Copy objects across buckets.
    Copy,
    /// Copy objects, then delete the sources.
    Move,
    /// Replace user-defined metadata on existing objects.
    Metadata,
}

impl fmt::Display for BatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Upload => "upload",
            Self::Delete => "delete",
            Self::Copy => "copy",
            Self::Move => "move",
            Self::Metadata => "metadata",
        };
        f.write_str(s)
    }
}

/// One object to store in an upload job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchUploadItem {
    /// Destination object key.
    pub key: String,
    /// Object payload, base64-encoded.
    pub data: String,
    /// MIME content type for the stored object.
    #[serde(default)]
    pub content_type: String,
    /// User-defined metadata for the stored object.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// One source/destination pair in a copy or move job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchTransferItem {
    /// Bucket holding the source object.
    pub source_bucket: String,
    /// Key of the source object.
    pub source_key: String,
    /// Bucket receiving the copy.
    pub dest_bucket: String,
    /// Key for the copied object.
    pub dest_key: String,
}

/// One metadata replacement in a metadata job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchMetadataItem {
    /// Key of the object to update.
    pub key: String,
    /// Replacement metadata map; the previous map is discarded.
    pub metadata: HashMap<String, String>,
}

/// The complete work description of a batch job.
///
/// Stored on the [`BatchOperation`] record, so a job interrupted before a
/// worker picked it up can be re-queued from the store alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum BatchJobSpec {
    /// Store the given payloads under one bucket.
    Upload {
        /// Destination bucket.
        bucket_id: String,
        /// Objects to store.
        files: Vec<BatchUploadItem>,
    },
    /// Delete the given keys from one bucket.
    Delete {
        /// Bucket to delete from.
        bucket_id: String,
        /// Keys to delete.
        keys: Vec<String>,
    },
    /// Copy objects between buckets.
    Copy {
        /// Source/destination pairs.
        items: Vec<BatchTransferItem>,
    },
    /// Copy objects between buckets, then delete the sources.
    Move {
        /// Source/destination pairs.
        items: Vec<BatchTransferItem>,
    },
    /// Replace user-defined metadata on objects in one bucket.
    Metadata {
        /// Bucket holding the objects.
        bucket_id: String,
        /// Replacements to apply.
        updates: Vec<BatchMetadataItem>,
    },
}

impl BatchJobSpec {
    /// The kind of work this spec describes.
    #[must_use]
    pub fn kind(&self) -> BatchKind {
        match self {
            Self::Upload { .. } => BatchKind::Upload,
            Self::Delete { .. } => BatchKind::Delete,
            Self::Copy { .. } => BatchKind::Copy,
            Self::Move { .. } => BatchKind::Move,
            Self::Metadata { .. } => BatchKind::Metadata,
        }
    }

    /// Number of items the job will attempt.
    #[must_use]
    pub fn item_count(&self) -> usize {
        match self {
            Self::Upload { files, .. } => files.len(),
            Self::Delete { keys, .. } => keys.len(),
            Self::Copy { items } | Self::Move { items } => items.len(),
            Self::Metadata { updates, .. } => updates.len(),
        }
    }

    /// The single bucket the job targets, for kinds that have one.
    ///
    /// Copy and move jobs name buckets per item and return `None`.
    #[must_use]
    pub fn bucket_id(&self) -> Option<&str> {
        match self {
            Self::Upload { bucket_id, .. }
            | Self::Delete { bucket_id, .. }
            | Self::Metadata { bucket_id, .. } => Some(bucket_id),
            Self::Copy { .. } | Self::Move { .. } => None,
        }
    }
}

/// A failure recorded against one item of a batch operation.
///
/// `index` is the zero-based position of the item in the job spec; the
/// sentinel `-1` marks a job-level failure that prevented any item from
/// running.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItemError {
    /// Zero-based item index, or `-1` for a job-level failure.
    pub index: i64,
    /// Which item failed (object key or transfer label).
    pub item: String,
    /// What went wrong.
    pub error: String,
}

/// The durable record of one batch job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOperation {
    /// Unique identifier, returned to the submitter.
    pub id: String,
    /// The kind of work performed.
    pub kind: BatchKind,
    /// Lifecycle state.
    pub status: BatchStatus,
    /// The full work description.
    pub spec: BatchJobSpec,
    /// Number of items the job will attempt.
    pub total_items: usize,
    /// Items attempted and succeeded so far.
    pub processed_items: usize,
    /// Items attempted and failed so far.
    pub failed_items: usize,
    /// Per-item failures, capped by configuration; counters above stay
    /// exact even when entries past the cap are dropped.
    pub errors: Vec<BatchItemError>,
    /// When the job was submitted.
    pub created_at: DateTime<Utc>,
    /// When the record was last persisted.
    pub updated_at: DateTime<Utc>,
    /// Set only when the job reaches `Completed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl BatchOperation {
    /// Create a pending operation for `spec`.
    #[must_use]
    pub fn new(spec: BatchJobSpec) -> Self {
        let now = Utc::now();
        Self {
            id: generate_record_id(),
            kind: spec.kind(),
            status: BatchStatus::Pending,
            total_items: spec.item_count(),
            spec,
            processed_items: 0,
            failed_items: 0,
            errors: Vec::new(),
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Append an error unless the record already holds `cap` entries.
    ///
    /// Returns `true` if the entry was retained.
    pub fn push_error(&mut self, error: BatchItemError, cap: usize) -> bool {
        if self.errors.len() < cap {
            self.errors.push(error);
            true
        } else {
            false
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
