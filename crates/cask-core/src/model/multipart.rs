//! Multipart upload records.
//!
//! Each [`MultipartUpload`] captures the options provided at initiation
//! time and accumulates [`Part`] entries as they are uploaded. Parts are
//! keyed by part number in a [`BTreeMap`], so iterating yields them in the
//! order the assembled object concatenates them.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::generate_record_id;

/// Lifecycle state of a multipart upload.
///
/// `Initiated` is the only state that accepts further operations;
/// `Completed` and `Aborted` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    /// Accepting parts; may be completed or aborted.
    Initiated,
    /// Assembled into a final object.
    Completed,
    /// Abandoned; staged parts have been discarded.
    Aborted,
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Initiated => "initiated",
            Self::Completed => "completed",
            Self::Aborted => "aborted",
        };
        f.write_str(s)
    }
}

/// Options captured when an upload is initiated and applied to the final
/// object on completion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadOptions {
    /// MIME content type for the final object.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// User-defined metadata for the final object.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

/// A single part staged within a multipart upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    /// The part number (1-based, up to 10 000).
    pub part_number: u32,
    /// The entity tag for this part (lowercase hex MD5).
    pub etag: String,
    /// Size of this part in bytes.
    pub size: u64,
    /// When this part was last uploaded.
    pub uploaded_at: DateTime<Utc>,
}

/// A multipart upload in progress or finished.
///
/// Created at initiation and completed or aborted later. The `upload_id`
/// is the caller-visible handle; `id` is the record's own identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultipartUpload {
    /// Record identifier.
    pub id: String,
    /// Caller-visible handle for this upload.
    pub upload_id: String,
    /// The bucket the final object will land in.
    pub bucket_id: String,
    /// The object key this upload will create.
    pub key: String,
    /// Lifecycle state.
    pub status: UploadStatus,
    /// Options captured at initiation.
    #[serde(default)]
    pub options: UploadOptions,
    /// Parts uploaded so far, keyed by part number (1-based).
    pub parts: BTreeMap<u32, Part>,
    /// When the upload was initiated.
    pub created_at: DateTime<Utc>,
    /// When the upload was last touched.
    pub updated_at: DateTime<Utc>,
}

impl MultipartUpload {
    /// Create a new upload in the `Initiated` state.
    #[must_use]
    pub fn new(upload_id: String, bucket_id: &str, key: &str, options: UploadOptions) -> Self {
        let now = Utc::now();
        Self {
            id: generate_record_id(),
            upload_id,
            bucket_id: bucket_id.to_owned(),
            key: key.to_owned(),
            status: UploadStatus::Initiated,
            options,
            parts: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Insert or replace a part; re-sent part numbers overwrite.
    pub fn put_part(&mut self, part: Part) {
        self.parts.insert(part.part_number, part);
    }

    /// Get a part by its number.
    #[must_use]
    pub fn get_part(&self, part_number: u32) -> Option<&Part> {
        self.parts.get(&part_number)
    }

    /// Return the number of parts uploaded so far.
    #[must_use]
    pub fn parts_count(&self) -> usize {
        self.parts.len()
    }

    /// Compute the total size of all staged parts.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.parts.values().map(|p| p.size).sum()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
