//! Policy decision procedure.
//!
//! [`evaluate`] is a pure function from a policy document and a concrete
//! request triple to a [`Decision`]. It holds no state and touches no
//! store, so the same inputs always yield the same decision.
//!
//! Precedence is deny-override: a statement that matches with effect
//! `Deny` wins over any matching `Allow`, wherever the two appear in the
//! document. A request nothing matches is denied.

use super::{ACTION_WILDCARD, Effect, Policy};

/// Outcome of evaluating a policy against one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// At least one statement allows the request and none denies it.
    Allow,
    /// A statement denies the request, or nothing matches, or there is no
    /// policy at all.
    Deny,
}

/// Decide whether `principal` may perform `action` on `resource`.
///
/// A statement matches when its principal list contains `principal`
/// exactly, its action list contains `action` or the `"*"` wildcard, and
/// any of its resource patterns matches `resource`. Matching a `Deny`
/// statement returns [`Decision::Deny`] immediately; matching `Allow`
/// statements only count if the scan finishes without meeting a deny.
///
/// `None` (no policy attached) evaluates to [`Decision::Deny`].
///
/// # Examples
///
/// ```
/// use cask_core::policy::{evaluate, Decision, Effect, Policy, Statement};
///
/// let policy = Policy {
///     version: "2012-10-17".to_owned(),
///     statement: vec![
///         Statement::new(Effect::Allow, &["user:a"], &["object:get"], &["b/*"]),
///         Statement::new(Effect::Deny, &["user:a"], &["object:get"], &["b/secret"]),
///     ],
/// };
///
/// assert_eq!(evaluate(Some(&policy), "user:a", "object:get", "b/data"), Decision::Allow);
/// assert_eq!(evaluate(Some(&policy), "user:a", "object:get", "b/secret"), Decision::Deny);
/// assert_eq!(evaluate(None, "user:a", "object:get", "b/data"), Decision::Deny);
/// ```
#[must_use]
pub fn evaluate(policy: Option<&Policy>, principal: &str, action: &str, resource: &str) -> Decision {
    let Some(policy) = policy else {
        return Decision::Deny;
    };

    let mut allowed = false;
    for stmt in &policy.statement {
        if !principal_matches(&stmt.principal, principal) {
            continue;
        }
        if !action_matches(&stmt.action, action) {
            continue;
        }
        if !resource_matches(&stmt.resource, resource) {
            continue;
        }
        match stmt.effect {
            Effect::Deny => return Decision::Deny,
            Effect::Allow => allowed = true,
        }
    }

    if allowed { Decision::Allow } else { Decision::Deny }
}

/// Exact membership; principals carry their own namespace prefix
/// (`"user:<id>"` or `"public"`).
fn principal_matches(patterns: &[String], principal: &str) -> bool {
    patterns.iter().any(|p| p == principal)
}

/// Exact match, or the `"*"` wildcard.
fn action_matches(patterns: &[String], action: &str) -> bool {
    patterns.iter().any(|p| p == ACTION_WILDCARD || p == action)
}

/// Glob match per pattern, plus the prefix rule: a pattern ending in
/// `"/*"` matches any resource under that prefix, however deep.
fn resource_matches(patterns: &[String], resource: &str) -> bool {
    patterns.iter().any(|p| {
        if wildcard_match(p, resource) {
            return true;
        }
        // keep the slash so "b/*" covers "b/x/y" but never "bx"
        p.ends_with("/*") && resource.starts_with(&p[..p.len() - 1])
    })
}

/// Segment-aware glob match: `*` matches any run of characters within one
/// path segment, `?` matches one non-separator character, everything else
/// matches literally. Neither wildcard crosses `/`.
fn wildcard_match(pattern: &str, value: &str) -> bool {
    let pat: Vec<char> = pattern.chars().collect();
    let val: Vec<char> = value.chars().collect();

    let mut p = 0;
    let mut v = 0;
    // resume point for the most recent `*`: (pattern index after it, value index to retry)
    let mut star: Option<(usize, usize)> = None;

    while v < val.len() {
        if p < pat.len() && (pat[p] == val[v] || (pat[p] == '?' && val[v] != '/')) {
            p += 1;
            v += 1;
        } else if p < pat.len() && pat[p] == '*' {
            star = Some((p + 1, v));
            p += 1;
        } else if let Some((next_p, retry_v)) = star {
            if val[retry_v] == '/' {
                return false;
            }
            star = Some((next_p, retry_v + 1));
            p = next_p;
            v = retry_v + 1;
        } else {
            return false;
        }
    }

    while p < pat.len() && pat[p] == '*' {
        p += 1;
    }
    p == pat.len()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
