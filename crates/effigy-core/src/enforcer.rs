//! Resolved permission table for one policy
//!
//! An [`EffectiveEnforcer`] is the pre-computed, flattened form of a policy:
//! which authorization subjects hold which permissions, and which JSON paths
//! of the protected entity each subject may read. How a policy document is
//! flattened into this table is an upstream concern; the enforcement core
//! only caches and evaluates the result.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Permission kinds evaluated by the enforcement gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    /// Read entity state
    Read,
    /// Create, modify, or delete entity state
    Write,
    /// Administer the policy itself
    Admin,
}

/// Flattened permission-evaluation table for one policy
///
/// Read visibility is path-prefix based: a subject granted `/attributes` can
/// read `/attributes/location` and, transitively, the `/attributes` object
/// itself. Granting `/` makes the whole entity readable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveEnforcer {
    /// Permission -> subjects holding it
    grants: BTreeMap<Permission, BTreeSet<String>>,
    /// Subject -> readable path prefixes
    readable: BTreeMap<String, BTreeSet<String>>,
}

impl EffectiveEnforcer {
    /// Create an empty enforcer that denies everything
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant a permission to a subject
    pub fn grant(mut self, subject: impl Into<String>, permission: Permission) -> Self {
        self.grants
            .entry(permission)
            .or_default()
            .insert(subject.into());
        self
    }

    /// Grant a subject read visibility of a path prefix (e.g. `/attributes`)
    pub fn grant_read_path(mut self, subject: impl Into<String>, path: impl Into<String>) -> Self {
        self.readable
            .entry(subject.into())
            .or_default()
            .insert(normalize_path(&path.into()));
        self
    }

    /// Whether any of the given subjects holds the permission
    pub fn has_permission<S: AsRef<str>>(&self, subjects: &[S], permission: Permission) -> bool {
        self.grants
            .get(&permission)
            .map(|holders| subjects.iter().any(|s| holders.contains(s.as_ref())))
            .unwrap_or(false)
    }

    /// Whether some granted prefix fully covers the given path, making the
    /// entire subtree at that path readable
    pub fn grants_read<S: AsRef<str>>(&self, subjects: &[S], path: &str) -> bool {
        let path = normalize_path(path);
        subjects.iter().any(|s| {
            self.readable
                .get(s.as_ref())
                .map(|prefixes| prefixes.iter().any(|p| is_path_prefix(p, &path)))
                .unwrap_or(false)
        })
    }

    /// Whether any of the given subjects may read the given entity path
    ///
    /// A path is readable if some granted prefix covers it, or if it is an
    /// ancestor of a granted prefix (the ancestor object must survive
    /// filtering so its readable children have somewhere to live).
    pub fn can_read<S: AsRef<str>>(&self, subjects: &[S], path: &str) -> bool {
        let path = normalize_path(path);
        subjects.iter().any(|s| {
            self.readable
                .get(s.as_ref())
                .map(|prefixes| {
                    prefixes
                        .iter()
                        .any(|p| is_path_prefix(p, &path) || is_path_prefix(&path, p))
                })
                .unwrap_or(false)
        })
    }

    /// Union of the path prefixes readable by the given subjects
    pub fn readable_paths<S: AsRef<str>>(&self, subjects: &[S]) -> BTreeSet<String> {
        subjects
            .iter()
            .filter_map(|s| self.readable.get(s.as_ref()))
            .flat_map(|prefixes| prefixes.iter().cloned())
            .collect()
    }

    /// Whether the given subjects have full read visibility of the entity
    pub fn can_read_all<S: AsRef<str>>(&self, subjects: &[S]) -> bool {
        subjects.iter().any(|s| {
            self.readable
                .get(s.as_ref())
                .map(|prefixes| prefixes.contains("/"))
                .unwrap_or(false)
        })
    }
}

fn normalize_path(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }
    let mut p = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    };
    while p.len() > 1 && p.ends_with('/') {
        p.pop();
    }
    p
}

/// Segment-wise prefix test: `/attributes` covers `/attributes/location` but
/// not `/attributesX`. The root `/` covers everything.
fn is_path_prefix(prefix: &str, path: &str) -> bool {
    if prefix == "/" {
        return true;
    }
    path == prefix || path.strip_prefix(prefix).is_some_and(|rest| rest.starts_with('/'))
}
