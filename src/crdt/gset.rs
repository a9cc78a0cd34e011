//! Grow-only set

use super::{CrdtError, CrdtOp, CrdtState, MergeOutcome};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Set supporting only additions; merge is set union
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GSet<T: Ord> {
    elements: BTreeSet<T>,
}

impl<T: Ord + Clone> GSet<T> {
    pub fn new() -> Self {
        Self {
            elements: BTreeSet::new(),
        }
    }

    /// Add an element. Always succeeds.
    pub fn add(&mut self, element: T) -> MergeOutcome {
        MergeOutcome::from_changed(self.elements.insert(element))
    }

    pub fn contains(&self, element: &T) -> bool {
        self.elements.contains(element)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.elements.iter()
    }
}

impl<T: Ord + Clone> Default for GSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl CrdtState for GSet<String> {
    fn merge(&mut self, other: &Self) -> MergeOutcome {
        let before = self.elements.len();
        self.elements.extend(other.elements.iter().cloned());
        MergeOutcome::from_changed(self.elements.len() != before)
    }

    fn apply(&mut self, op: &CrdtOp) -> Result<MergeOutcome, CrdtError> {
        match op {
            CrdtOp::Add { element, .. } => Ok(self.add(element.clone())),
            other => Err(CrdtError::unsupported(other, "grow-only set")),
        }
    }

    fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}
