//! Persistent record types for the Cask core.
//!
//! This module defines the records the metadata store keeps:
//!
//! - [`BucketRecord`] / [`PolicyHistoryEntry`] -- buckets and their policy
//!   audit trail
//! - [`FileRecord`] -- one stored object under a bucket
//! - [`MultipartUpload`] / [`Part`] -- multipart upload tracking
//! - [`BatchOperation`] / [`BatchJobSpec`] -- asynchronous batch jobs
//!
//! All records serialize to camelCase JSON so they can round-trip through
//! any JSON-backed store unchanged.

pub(crate) mod batch;
pub(crate) mod bucket;
pub(crate) mod file;
pub(crate) mod multipart;

pub use batch::{
    BatchItemError, BatchJobSpec, BatchKind, BatchMetadataItem, BatchOperation, BatchStatus,
    BatchTransferItem, BatchUploadItem,
};
pub use bucket::{BucketRecord, PolicyHistoryEntry};
pub use file::FileRecord;
pub use multipart::{MultipartUpload, Part, UploadOptions, UploadStatus};
