//! Caller identity for authorization decisions.
//!
//! Every operation that needs an access decision receives an explicit
//! [`AuthContext`] describing who is calling. Identity is never read from
//! ambient process state, so the same `Cask` instance can serve callers
//! with different privileges concurrently.

use serde::{Deserialize, Serialize};

/// Role granting unrestricted access to every bucket.
pub const ROLE_ADMIN: &str = "admin";

/// Principal string for unauthenticated callers.
pub const PRINCIPAL_PUBLIC: &str = "public";

/// Identity of the caller performing an operation.
///
/// The `principal` is the string matched against policy statements:
/// `"user:<id>"` for authenticated users, or [`PRINCIPAL_PUBLIC`] for
/// anonymous access. Roles are orthogonal to the principal; a caller with
/// [`ROLE_ADMIN`] bypasses policy evaluation entirely.
///
/// # Examples
///
/// ```
/// use cask_core::auth::AuthContext;
///
/// let auth = AuthContext::user("alice");
/// assert_eq!(auth.principal, "user:alice");
/// assert!(!auth.is_admin());
///
/// let root = AuthContext::admin("ops");
/// assert!(root.is_admin());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    /// Principal string matched against policy statements.
    pub principal: String,
    /// Roles held by the caller.
    pub roles: Vec<String>,
}

impl AuthContext {
    /// Context for an authenticated user without special roles.
    #[must_use]
    pub fn user(id: &str) -> Self {
        Self {
            principal: format!("user:{id}"),
            roles: Vec::new(),
        }
    }

    /// Context for an administrator; bypasses policy evaluation.
    #[must_use]
    pub fn admin(id: &str) -> Self {
        Self {
            principal: format!("user:{id}"),
            roles: vec![ROLE_ADMIN.to_owned()],
        }
    }

    /// Context for an unauthenticated caller.
    #[must_use]
    pub fn public() -> Self {
        Self {
            principal: PRINCIPAL_PUBLIC.to_owned(),
            roles: Vec::new(),
        }
    }

    /// Add a role to the context.
    #[must_use]
    pub fn with_role(mut self, role: &str) -> Self {
        self.roles.push(role.to_owned());
        self
    }

    /// Whether the caller holds [`ROLE_ADMIN`].
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(|r| r == ROLE_ADMIN)
    }
}
