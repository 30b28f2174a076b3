//! Error types for the Cask core.
//!
//! Defines [`CaskError`], the domain error enum shared by the multipart
//! coordinator, the batch engine and the policy layer. Every fallible
//! operation in this crate returns [`CaskResult`], so callers can match on
//! the failure class without inspecting message strings.
//!
//! # Usage
//!
//! ```
//! use cask_core::error::CaskError;
//!
//! let err = CaskError::NotFound {
//!     resource: "bucket b-123".to_owned(),
//! };
//! assert_eq!(err.to_string(), "bucket b-123 not found");
//! ```

/// Domain error for the Cask core.
///
/// The variants form the complete failure taxonomy of the crate: a missing
/// record, a lifecycle violation, malformed input, a backing-store failure
/// and an authorization refusal. Store backends wrap their own failures in
/// [`CaskError::Dependency`] via [`anyhow::Error`].
#[derive(Debug, thiserror::Error)]
pub enum CaskError {
    /// The referenced record does not exist.
    #[error("{resource} not found")]
    NotFound {
        /// Description of the missing record, e.g. `"upload 3f9c..."`.
        resource: String,
    },

    /// The record exists but is in the wrong lifecycle state for the
    /// requested operation.
    #[error("invalid state: {message}")]
    InvalidState {
        /// What was attempted and which state blocked it.
        message: String,
    },

    /// The input failed structural validation before any state was touched.
    #[error("validation failed: {message}")]
    Validation {
        /// Which field or value was rejected.
        message: String,
    },

    /// A backing store (object data or metadata) failed.
    #[error(transparent)]
    Dependency(#[from] anyhow::Error),

    /// The caller is not authorized for the requested operation.
    #[error("forbidden: {message}")]
    Forbidden {
        /// Who was refused and why.
        message: String,
    },
}

impl CaskError {
    /// Returns `true` for [`CaskError::NotFound`].
    ///
    /// Lookup-then-act flows use this to tell an absent record apart from a
    /// store failure without destructuring.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result alias used by all fallible operations in this crate.
pub type CaskResult<T> = Result<T, CaskError>;
