//! Shared utilities for the Cask core.
//!
//! Provides ID generation, content fingerprinting and the naming scheme for
//! the temporary objects that hold multipart upload parts.

use md5::{Digest, Md5};
use rand::RngExt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// ID generation
// ---------------------------------------------------------------------------

/// Generate a random upload ID for multipart uploads.
///
/// Produces a hex string of approximately 64 characters.
///
/// # Examples
///
/// ```
/// use cask_core::utils::generate_upload_id;
///
/// let id = generate_upload_id();
/// assert!(id.len() >= 32);
/// assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
/// ```
#[must_use]
pub fn generate_upload_id() -> String {
    let mut rng = rand::rng();
    let mut buf = [0u8; 32];
    rng.fill(&mut buf);
    hex::encode(buf)
}

/// Generate a unique record ID (UUID v4).
///
/// Used for buckets, files and batch operations.
///
/// # Examples
///
/// ```
/// use cask_core::utils::generate_record_id;
///
/// let id = generate_record_id();
/// assert_eq!(id.len(), 36);
/// ```
#[must_use]
pub fn generate_record_id() -> String {
    Uuid::new_v4().to_string()
}

// ---------------------------------------------------------------------------
// Content fingerprints
// ---------------------------------------------------------------------------

/// Compute the lowercase hex MD5 digest of `data`.
///
/// This is the ETag format used for stored objects, both for individual
/// parts and for the assembled object a completed multipart upload produces.
///
/// # Examples
///
/// ```
/// use cask_core::utils::md5_hex;
///
/// assert_eq!(md5_hex(b""), "d41d8cd98f00b204e9800998ecf8427e");
/// ```
#[must_use]
pub fn md5_hex(data: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

// ---------------------------------------------------------------------------
// Part object naming
// ---------------------------------------------------------------------------

/// Build the object key under which one part of a multipart upload is
/// staged until the upload completes or is aborted.
///
/// The key embeds the upload ID and part number, so concurrent uploads for
/// the same object key never collide and re-sent parts overwrite their
/// previous payload.
///
/// # Examples
///
/// ```
/// use cask_core::utils::part_object_key;
///
/// let key = part_object_key("videos/intro.mp4", "abc123", 7);
/// assert_eq!(key, "videos/intro.mp4.part.abc123.7");
/// ```
#[must_use]
pub fn part_object_key(key: &str, upload_id: &str, part_number: u32) -> String {
    format!("{key}.part.{upload_id}.{part_number}")
}
