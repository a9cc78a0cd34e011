//! Observed-remove set
//!
//! Each add carries a unique tag; a remove names the tags it observed.
//! An element is present while at least one of its add tags is not
//! tombstoned. A concurrent add uses a tag the remover never saw, so it
//! survives (add-wins); a remove of an observed tag wins over that tag.

use super::{CrdtError, CrdtOp, CrdtState, Dot, MergeOutcome};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(serialize = "T: Serialize", deserialize = "T: Deserialize<'de>"))]
pub struct OrSet<T: Ord> {
    /// Add tag -> element
    #[serde(with = "super::dot_map")]
    adds: BTreeMap<Dot, T>,
    /// Tombstoned tags. Kept even when the add has not arrived yet so that
    /// delivery order does not matter.
    removed: BTreeSet<Dot>,
}

impl<T: Ord + Clone> OrSet<T> {
    pub fn new() -> Self {
        Self {
            adds: BTreeMap::new(),
            removed: BTreeSet::new(),
        }
    }

    pub fn add(&mut self, element: T, tag: Dot) -> MergeOutcome {
        if self.adds.contains_key(&tag) {
            return MergeOutcome::Unchanged;
        }
        self.adds.insert(tag, element);
        MergeOutcome::Updated
    }

    /// Tombstone one add tag
    pub fn remove(&mut self, tag: Dot) -> MergeOutcome {
        MergeOutcome::from_changed(self.removed.insert(tag))
    }

    /// Tombstone every live tag of `element` observed locally; returns them
    pub fn remove_element(&mut self, element: &T) -> Vec<Dot> {
        let observed: Vec<Dot> = self
            .live_tags()
            .filter(|(_, value)| *value == element)
            .map(|(tag, _)| tag.clone())
            .collect();
        self.removed.extend(observed.iter().cloned());
        observed
    }

    pub fn contains(&self, element: &T) -> bool {
        self.live_tags().any(|(_, value)| value == element)
    }

    /// Visible elements, deduplicated and ordered
    pub fn elements(&self) -> BTreeSet<T> {
        self.live_tags().map(|(_, value)| value.clone()).collect()
    }

    fn live_tags(&self) -> impl Iterator<Item = (&Dot, &T)> {
        self.adds
            .iter()
            .filter(|(tag, _)| !self.removed.contains(*tag))
    }
}

impl<T: Ord + Clone> Default for OrSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl CrdtState for OrSet<String> {
    fn merge(&mut self, other: &Self) -> MergeOutcome {
        let mut outcome = MergeOutcome::Unchanged;
        for (tag, element) in &other.adds {
            outcome = outcome.or(self.add(element.clone(), tag.clone()));
        }
        for tag in &other.removed {
            outcome = outcome.or(self.remove(tag.clone()));
        }
        outcome
    }

    fn apply(&mut self, op: &CrdtOp) -> Result<MergeOutcome, CrdtError> {
        match op {
            CrdtOp::Add { element, tag } => Ok(self.add(element.clone(), tag.clone())),
            CrdtOp::RemoveTag { tag, .. } => Ok(self.remove(tag.clone())),
            other => Err(CrdtError::unsupported(other, "observed-remove set")),
        }
    }

    fn is_empty(&self) -> bool {
        self.live_tags().next().is_none()
    }
}
