//! Bucket and policy operation handlers.
//!
//! Implements bucket creation, policy replacement with an audit trail,
//! and request authorization on [`Cask`]. Policy changes are restricted
//! to the bucket owner and administrators; authorization evaluates the
//! stored policy with deny-override precedence and falls back to deny
//! when no statement matches.

use tracing::{debug, info};

use crate::auth::AuthContext;
use crate::error::{CaskError, CaskResult};
use crate::model::{BucketRecord, PolicyHistoryEntry};
use crate::policy::{Decision, Policy, evaluate};
use crate::provider::Cask;
use crate::validation::validate_bucket_name;

impl Cask {
    /// Create a bucket owned by the calling principal.
    ///
    /// Bucket names are unique; the new bucket starts without a policy,
    /// so only its owner and administrators can reach its contents.
    ///
    /// # Errors
    ///
    /// - [`CaskError::Validation`] if the name is not a valid bucket name.
    /// - [`CaskError::InvalidState`] if the name is already taken.
    pub async fn create_bucket(
        &self,
        auth: &AuthContext,
        name: &str,
    ) -> CaskResult<BucketRecord> {
        validate_bucket_name(name)?;

        match self.metadata.get_bucket_by_name(name).await {
            Ok(_) => {
                return Err(CaskError::InvalidState {
                    message: format!("bucket {name} already exists"),
                });
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }

        let bucket = BucketRecord::new(name, &auth.principal);
        self.metadata.save_bucket(&bucket).await?;

        debug!(
            bucket_id = %bucket.id,
            name,
            owner = %auth.principal,
            "created bucket"
        );
        Ok(bucket)
    }

    /// Fetch a bucket record by id.
    ///
    /// # Errors
    ///
    /// Returns [`CaskError::NotFound`] if the bucket does not exist.
    pub async fn get_bucket(&self, bucket_id: &str) -> CaskResult<BucketRecord> {
        self.metadata.get_bucket(bucket_id).await
    }

    /// Fetch a bucket record by name.
    ///
    /// # Errors
    ///
    /// Returns [`CaskError::NotFound`] if no bucket has that name.
    pub async fn get_bucket_by_name(&self, name: &str) -> CaskResult<BucketRecord> {
        self.metadata.get_bucket_by_name(name).await
    }

    /// Replace a bucket's access policy and return the new version.
    ///
    /// Versions count up from 1 in the order changes are applied; every
    /// change also lands in the bucket's policy history with the acting
    /// principal, so the trail answers who changed what and when.
    ///
    /// # Errors
    ///
    /// - [`CaskError::NotFound`] if the bucket does not exist.
    /// - [`CaskError::Forbidden`] if the caller is neither the bucket
    ///   owner nor an administrator.
    /// - [`CaskError::Validation`] if the document is structurally
    ///   invalid.
    pub async fn set_bucket_policy(
        &self,
        auth: &AuthContext,
        bucket_id: &str,
        policy: Policy,
    ) -> CaskResult<u64> {
        let bucket = self.metadata.get_bucket(bucket_id).await?;
        if !auth.is_admin() && auth.principal != bucket.owner {
            return Err(CaskError::Forbidden {
                message: format!(
                    "{} may not modify the policy of bucket {}",
                    auth.principal, bucket.name
                ),
            });
        }

        policy.validate()?;

        let version = self
            .metadata
            .update_bucket_policy(bucket_id, policy.clone())
            .await?;
        let entry = PolicyHistoryEntry::new(bucket_id, version, &auth.principal, policy);
        self.metadata.append_policy_history(&entry).await?;

        info!(bucket_id, version, actor = %auth.principal, "updated bucket policy");
        Ok(version)
    }

    /// Fetch a bucket's current policy.
    ///
    /// # Errors
    ///
    /// Returns [`CaskError::NotFound`] if the bucket does not exist or
    /// has never had a policy set.
    pub async fn get_bucket_policy(&self, bucket_id: &str) -> CaskResult<Policy> {
        let bucket = self.metadata.get_bucket(bucket_id).await?;
        bucket.policy.ok_or_else(|| CaskError::NotFound {
            resource: format!("policy for bucket {bucket_id}"),
        })
    }

    /// List a bucket's policy changes, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`CaskError::NotFound`] if the bucket does not exist.
    pub async fn policy_history(&self, bucket_id: &str) -> CaskResult<Vec<PolicyHistoryEntry>> {
        self.metadata.get_bucket(bucket_id).await?;
        self.metadata.policy_history(bucket_id).await
    }

    /// Check whether `auth` may perform `action` on `resource` in the bucket.
    ///
    /// The bucket owner and administrators are always allowed. Everyone
    /// else is subject to the bucket policy: a matching `Deny` anywhere
    /// wins, otherwise a matching `Allow` grants access, otherwise the
    /// request is refused. A bucket without a policy refuses all
    /// non-owner requests.
    ///
    /// # Errors
    ///
    /// - [`CaskError::NotFound`] if the bucket does not exist.
    /// - [`CaskError::Forbidden`] if the request is refused.
    pub async fn authorize(
        &self,
        auth: &AuthContext,
        bucket_id: &str,
        action: &str,
        resource: &str,
    ) -> CaskResult<()> {
        let bucket = self.metadata.get_bucket(bucket_id).await?;

        if auth.is_admin() || auth.principal == bucket.owner {
            return Ok(());
        }

        let decision = evaluate(bucket.policy.as_ref(), &auth.principal, action, resource);
        debug!(
            principal = %auth.principal,
            bucket_id,
            action,
            resource,
            ?decision,
            "authorization evaluated"
        );

        if decision == Decision::Allow {
            Ok(())
        } else {
            Err(CaskError::Forbidden {
                message: format!(
                    "{} is not allowed to {action} on {resource}",
                    auth.principal
                ),
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
