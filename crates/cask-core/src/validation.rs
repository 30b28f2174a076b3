//! Input validation for bucket names, object keys and part numbers.
//!
//! All checks run before any store is touched, so a rejected input never
//! leaves partial state behind.

use crate::error::{CaskError, CaskResult};

/// Minimum bucket name length.
const MIN_BUCKET_NAME_LEN: usize = 3;

/// Maximum bucket name length.
const MAX_BUCKET_NAME_LEN: usize = 63;

/// Maximum object key length in bytes.
const MAX_KEY_BYTES: usize = 1024;

/// Smallest part number a multipart upload accepts.
pub const MIN_PART_NUMBER: u32 = 1;

/// Largest part number a multipart upload accepts.
pub const MAX_PART_NUMBER: u32 = 10_000;

/// Validate a bucket name.
///
/// Rules:
/// - 3-63 characters long
/// - Only lowercase letters, numbers, hyphens, and dots
/// - Must start and end with a letter or number
/// - No consecutive dots (`..`)
///
/// # Errors
///
/// Returns [`CaskError::Validation`] if any rule is violated.
///
/// # Examples
///
/// ```
/// use cask_core::validation::validate_bucket_name;
///
/// assert!(validate_bucket_name("my-valid-bucket").is_ok());
/// assert!(validate_bucket_name("AB").is_err());
/// ```
pub fn validate_bucket_name(name: &str) -> CaskResult<()> {
    let len = name.len();

    if !(MIN_BUCKET_NAME_LEN..=MAX_BUCKET_NAME_LEN).contains(&len) {
        return Err(CaskError::Validation {
            message: format!(
                "bucket name must be between {MIN_BUCKET_NAME_LEN} and {MAX_BUCKET_NAME_LEN} characters long: {name}"
            ),
        });
    }

    if !name
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'.')
    {
        return Err(CaskError::Validation {
            message: format!(
                "bucket name must only contain lowercase letters, numbers, hyphens, and dots: {name}"
            ),
        });
    }

    let first = name.as_bytes()[0];
    let last = name.as_bytes()[len - 1];
    if !(first.is_ascii_lowercase() || first.is_ascii_digit())
        || !(last.is_ascii_lowercase() || last.is_ascii_digit())
    {
        return Err(CaskError::Validation {
            message: format!("bucket name must start and end with a letter or number: {name}"),
        });
    }

    if name.contains("..") {
        return Err(CaskError::Validation {
            message: format!("bucket name must not contain consecutive dots: {name}"),
        });
    }

    Ok(())
}

/// Validate an object key.
///
/// Rules:
/// - 1-1024 bytes in length
/// - Must be valid UTF-8 (enforced by the `&str` type)
///
/// # Errors
///
/// Returns [`CaskError::Validation`] if the key is empty or exceeds 1024
/// bytes.
///
/// # Examples
///
/// ```
/// use cask_core::validation::validate_object_key;
///
/// assert!(validate_object_key("photos/2024/image.jpg").is_ok());
/// assert!(validate_object_key("").is_err());
/// ```
pub fn validate_object_key(key: &str) -> CaskResult<()> {
    if key.is_empty() {
        return Err(CaskError::Validation {
            message: "object key must not be empty".to_owned(),
        });
    }

    if key.len() > MAX_KEY_BYTES {
        return Err(CaskError::Validation {
            message: format!("object key must not exceed {MAX_KEY_BYTES} bytes"),
        });
    }

    Ok(())
}

/// Validate a multipart upload part number.
///
/// # Errors
///
/// Returns [`CaskError::Validation`] if the number is outside
/// `1..=10_000`.
///
/// # Examples
///
/// ```
/// use cask_core::validation::validate_part_number;
///
/// assert!(validate_part_number(1).is_ok());
/// assert!(validate_part_number(10_001).is_err());
/// ```
pub fn validate_part_number(part_number: u32) -> CaskResult<()> {
    if !(MIN_PART_NUMBER..=MAX_PART_NUMBER).contains(&part_number) {
        return Err(CaskError::Validation {
            message: format!(
                "part number must be between {MIN_PART_NUMBER} and {MAX_PART_NUMBER}, got {part_number}"
            ),
        });
    }

    Ok(())
}
