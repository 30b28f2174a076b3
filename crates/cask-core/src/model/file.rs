//! File records describing stored objects.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::generate_record_id;

/// Metadata for one stored object, keyed by `(bucket_id, key)`.
///
/// The object's bytes live in the object store; this record carries
/// everything else a listing or download response needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    /// Unique identifier.
    pub id: String,
    /// The bucket this object belongs to.
    pub bucket_id: String,
    /// Object key within the bucket.
    pub key: String,
    /// Object size in bytes.
    pub size: u64,
    /// MIME content type, possibly empty.
    pub content_type: String,
    /// Entity tag (lowercase hex MD5 of the content).
    pub etag: String,
    /// User-defined metadata attached to the object.
    pub metadata: HashMap<String, String>,
    /// Record version, starting at 1.
    pub version: u32,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// When the record was last modified.
    pub updated_at: DateTime<Utc>,
}

impl FileRecord {
    /// Create a new file record for a freshly stored object.
    #[must_use]
    pub fn new(
        bucket_id: &str,
        key: &str,
        size: u64,
        content_type: &str,
        etag: &str,
        metadata: HashMap<String, String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: generate_record_id(),
            bucket_id: bucket_id.to_owned(),
            key: key.to_owned(),
            size,
            content_type: content_type.to_owned(),
            etag: etag.to_owned(),
            metadata,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
