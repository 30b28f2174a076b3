//! Bucket records and policy history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::policy::Policy;
use crate::utils::generate_record_id;

/// A bucket registered in the metadata store.
///
/// The attached [`Policy`] governs access for non-owner callers;
/// `policy_version` counts how many times the policy has been replaced and
/// ties each replacement to a [`PolicyHistoryEntry`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketRecord {
    /// Unique identifier.
    pub id: String,
    /// Human-readable bucket name, unique across the store.
    pub name: String,
    /// Principal that created the bucket.
    pub owner: String,
    /// Access policy currently in force, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy: Option<Policy>,
    /// Monotonic counter incremented on every policy replacement.
    pub policy_version: u64,
    /// When the bucket was created.
    pub created_at: DateTime<Utc>,
    /// When the bucket was last modified.
    pub updated_at: DateTime<Utc>,
}

impl BucketRecord {
    /// Create a new bucket owned by `owner`, without a policy.
    #[must_use]
    pub fn new(name: &str, owner: &str) -> Self {
        let now = Utc::now();
        Self {
            id: generate_record_id(),
            name: name.to_owned(),
            owner: owner.to_owned(),
            policy: None,
            policy_version: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One entry in a bucket's policy audit trail.
///
/// Appended whenever a policy is set; `version` matches the bucket's
/// `policy_version` at the time of the change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyHistoryEntry {
    /// The bucket whose policy changed.
    pub bucket_id: String,
    /// The policy version this entry introduced.
    pub version: u64,
    /// Principal that made the change.
    pub actor: String,
    /// The policy document as set.
    pub policy: Policy,
    /// When the change happened.
    pub created_at: DateTime<Utc>,
}

impl PolicyHistoryEntry {
    /// Record a policy change made by `actor`.
    #[must_use]
    pub fn new(bucket_id: &str, version: u64, actor: &str, policy: Policy) -> Self {
        Self {
            bucket_id: bucket_id.to_owned(),
            version,
            actor: actor.to_owned(),
            policy,
            created_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
