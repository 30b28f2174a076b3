//! Bucket policy documents.
//!
//! A [`Policy`] is a JSON document in IAM statement syntax: an ordered list
//! of [`Statement`]s, each granting or refusing a set of principals a set
//! of actions on a set of resources. Documents are validated structurally
//! when set on a bucket and evaluated per request by [`evaluate`].
//!
//! # Examples
//!
//! ```
//! use cask_core::policy::{evaluate, Decision, Policy};
//!
//! let json = r#"{
//!     "Version": "2012-10-17",
//!     "Statement": [{
//!         "Effect": "Allow",
//!         "Principal": ["user:alice"],
//!         "Action": ["object:get"],
//!         "Resource": ["reports/*"]
//!     }]
//! }"#;
//! let policy: Policy = serde_json::from_str(json).expect("parse policy");
//! policy.validate().expect("valid policy");
//!
//! let decision = evaluate(Some(&policy), "user:alice", "object:get", "reports/q3.pdf");
//! assert_eq!(decision, Decision::Allow);
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{CaskError, CaskResult};

pub(crate) mod evaluate;

pub use evaluate::{Decision, evaluate};

/// Action pattern matching every action.
pub const ACTION_WILDCARD: &str = "*";

/// Whether a statement grants or refuses access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    /// The statement grants access.
    Allow,
    /// The statement refuses access; wins over any grant.
    Deny,
}

/// One rule within a policy document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statement {
    /// Whether matching requests are granted or refused.
    #[serde(rename = "Effect")]
    pub effect: Effect,
    /// Principals the rule applies to, matched exactly.
    #[serde(rename = "Principal")]
    pub principal: Vec<String>,
    /// Actions the rule applies to; `"*"` matches every action.
    #[serde(rename = "Action")]
    pub action: Vec<String>,
    /// Resource patterns the rule applies to; `*` and `?` match within one
    /// path segment, and a trailing `/*` matches any deeper path.
    #[serde(rename = "Resource")]
    pub resource: Vec<String>,
    /// Reserved for conditional rules; carried but not evaluated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<HashMap<String, serde_json::Value>>,
}

impl Statement {
    /// Build a statement without conditions.
    #[must_use]
    pub fn new(effect: Effect, principal: &[&str], action: &[&str], resource: &[&str]) -> Self {
        let own = |list: &[&str]| list.iter().map(|s| (*s).to_owned()).collect();
        Self {
            effect,
            principal: own(principal),
            action: own(action),
            resource: own(resource),
            condition: None,
        }
    }
}

/// A bucket policy document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    /// Document format version, e.g. `"2012-10-17"`.
    #[serde(rename = "Version")]
    pub version: String,
    /// Ordered statements; see [`evaluate`] for precedence.
    #[serde(rename = "Statement")]
    pub statement: Vec<Statement>,
}

impl Policy {
    /// Check the document is structurally sound.
    ///
    /// Every statement must name at least one principal, one action and one
    /// resource, and the document must carry a version and at least one
    /// statement. Effects are already constrained by the type.
    ///
    /// # Errors
    ///
    /// Returns [`CaskError::Validation`] naming the offending statement.
    pub fn validate(&self) -> CaskResult<()> {
        if self.version.trim().is_empty() {
            return Err(CaskError::Validation {
                message: "policy version required".to_owned(),
            });
        }
        if self.statement.is_empty() {
            return Err(CaskError::Validation {
                message: "at least one statement required".to_owned(),
            });
        }
        for (i, stmt) in self.statement.iter().enumerate() {
            if stmt.principal.is_empty() {
                return Err(CaskError::Validation {
                    message: format!("statement[{i}]: principal required"),
                });
            }
            if stmt.action.is_empty() {
                return Err(CaskError::Validation {
                    message: format!("statement[{i}]: action required"),
                });
            }
            if stmt.resource.is_empty() {
                return Err(CaskError::Validation {
                    message: format!("statement[{i}]: resource required"),
                });
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
