//! Add-wins observed-remove set
//!
//! State-based CRDT: every add attaches a globally unique tag, a remove
//! records the tags it observed, and an element is present while it has at
//! least one unremoved tag. Merge is the pairwise union of both components,
//! which makes it idempotent, commutative, and associative; an add concurrent
//! with a remove survives the merge because the remove never observed the new
//! tag (add wins).
//!
//! Removed tags are retained indefinitely. Acceptable for the blocklist,
//! whose mutation is a rare operator action.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// Add-wins observed-remove set over ordered elements
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrSet<T: Ord> {
    /// Element -> tags under which it was added
    adds: BTreeMap<T, BTreeSet<Uuid>>,
    /// Tags observed by removes
    removed: BTreeSet<Uuid>,
}

impl<T: Ord + Clone> OrSet<T> {
    /// An empty set
    pub fn new() -> Self {
        Self {
            adds: BTreeMap::new(),
            removed: BTreeSet::new(),
        }
    }

    /// Add an element under a fresh tag
    pub fn add(&mut self, element: T) {
        self.adds.entry(element).or_default().insert(Uuid::new_v4());
    }

    /// Remove an element by observing all of its current tags.
    ///
    /// Tags added concurrently elsewhere are not observed and survive the
    /// merge: add wins.
    pub fn remove(&mut self, element: &T) {
        if let Some(tags) = self.adds.get(element) {
            self.removed.extend(tags.iter().copied());
        }
    }

    /// Whether the element has at least one unremoved tag
    pub fn contains(&self, element: &T) -> bool {
        self.adds
            .get(element)
            .map(|tags| tags.iter().any(|tag| !self.removed.contains(tag)))
            .unwrap_or(false)
    }

    /// The currently present elements
    pub fn elements(&self) -> BTreeSet<T> {
        self.adds
            .iter()
            .filter(|(_, tags)| tags.iter().any(|tag| !self.removed.contains(tag)))
            .map(|(element, _)| element.clone())
            .collect()
    }

    /// Merge another replica's state into this one.
    ///
    /// Returns whether the set of present elements changed, so callers can
    /// notify subscribers only on real changes.
    pub fn merge(&mut self, other: &OrSet<T>) -> bool {
        let before = self.elements();
        for (element, tags) in &other.adds {
            self.adds
                .entry(element.clone())
                .or_default()
                .extend(tags.iter().copied());
        }
        self.removed.extend(other.removed.iter().copied());
        self.elements() != before
    }
}
