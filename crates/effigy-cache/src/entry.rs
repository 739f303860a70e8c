//! Versioned cache outcomes and the replacement invariant
//!
//! A [`CacheEntry`] records one of three things about a remotely owned value:
//! it exists at some revision, it is confirmed absent, or the last fetch
//! failed. Replacement is governed by [`CacheEntry::may_replace`], the
//! compare-and-set predicate every cache write goes through.

use effigy_core::EffigyError;
use serde::{Deserialize, Serialize};

/// Logical revision of a cached value
///
/// `Permanent` marks data with no versioning of its own; it is a distinct
/// marker rather than a sentinel number, and ordinary sequenced writes never
/// supersede it. The derived ordering places `Floor` below every sequenced
/// revision and `Permanent` above all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Revision {
    /// Below every sequenced revision; the revision of negative entries
    Floor,
    /// A normal, monotonically increasing entity revision
    Sequenced(i64),
    /// Unversioned data pinned until explicit invalidation
    Permanent,
}

/// One versioned cache outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheEntry<V> {
    /// A positively cached value at a known revision
    Existent {
        /// Logical revision of the value
        revision: Revision,
        /// The cached value
        value: V,
    },
    /// Cached negative result: the entity is confirmed absent. Sits at the
    /// revision floor so any future existent entry supersedes it.
    Nonexistent {
        /// `Floor` normally; `Permanent` for entities pinned absent
        revision: Revision,
    },
    /// The last fetch attempt failed. Never authoritative: delivered to
    /// current waiters, retried on the next lookup.
    FetchFailed {
        /// Cause of the failed fetch
        cause: EffigyError,
    },
}

impl<V> CacheEntry<V> {
    /// An existent entry at a sequenced revision
    pub fn existent(revision: i64, value: V) -> Self {
        Self::Existent {
            revision: Revision::Sequenced(revision),
            value,
        }
    }

    /// An existent entry for unversioned data; only invalidation removes it
    pub fn existent_permanent(value: V) -> Self {
        Self::Existent {
            revision: Revision::Permanent,
            value,
        }
    }

    /// A negative entry at the revision floor
    pub fn nonexistent() -> Self {
        Self::Nonexistent {
            revision: Revision::Floor,
        }
    }

    /// A negative entry pinned until explicit invalidation
    pub fn nonexistent_permanent() -> Self {
        Self::Nonexistent {
            revision: Revision::Permanent,
        }
    }

    /// A failed-fetch sentinel carrying its cause
    pub fn fetch_failed(cause: EffigyError) -> Self {
        Self::FetchFailed { cause }
    }

    /// Logical revision, if this entry is authoritative
    pub fn revision(&self) -> Option<Revision> {
        match self {
            Self::Existent { revision, .. } | Self::Nonexistent { revision } => Some(*revision),
            Self::FetchFailed { .. } => None,
        }
    }

    /// The cached value, if existent
    pub fn value(&self) -> Option<&V> {
        match self {
            Self::Existent { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Whether this entry positively caches a value
    pub fn exists(&self) -> bool {
        matches!(self, Self::Existent { .. })
    }

    /// Whether this entry is the failed-fetch sentinel
    pub fn is_fetch_failed(&self) -> bool {
        matches!(self, Self::FetchFailed { .. })
    }

    /// Cause of the failed fetch, if any
    pub fn cause(&self) -> Option<&EffigyError> {
        match self {
            Self::FetchFailed { cause } => Some(cause),
            _ => None,
        }
    }

    /// The compare-and-set predicate for cache writes.
    ///
    /// - an absent or failed slot accepts anything except that a failed
    ///   fetch never overwrites authoritative data;
    /// - a `Permanent` revision always installs (explicit refresh) and is
    ///   never superseded by sequenced writes;
    /// - otherwise the incoming revision must be strictly greater.
    pub fn may_replace(&self, current: Option<&CacheEntry<V>>) -> bool {
        let current = match current {
            None => return true,
            Some(CacheEntry::FetchFailed { .. }) => return true,
            Some(cur) => cur,
        };
        let (new_rev, cur_rev) = match (self.revision(), current.revision()) {
            (Some(new_rev), Some(cur_rev)) => (new_rev, cur_rev),
            // self is FetchFailed and current is authoritative
            (None, _) => return false,
            // unreachable: authoritative entries always carry a revision
            (_, None) => return true,
        };
        match (new_rev, cur_rev) {
            (Revision::Permanent, _) => true,
            (_, Revision::Permanent) => false,
            (new_rev, cur_rev) => new_rev > cur_rev,
        }
    }
}
