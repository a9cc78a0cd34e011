//! # Vector Clocks
//!
//! Per-site counters tracking causal history. Merge is the pointwise
//! maximum, so clocks themselves form a join semilattice.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Identifier of a replica (or a replica/surface pair) in a clock
pub type SiteId = String;

/// Causal relation between two clocks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Causality {
    Equal,
    /// Left happened before right
    Before,
    /// Left happened after right
    After,
    Concurrent,
}

/// Mapping site id -> monotonically increasing counter
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorClock {
    entries: BTreeMap<SiteId, u64>,
}

impl VectorClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counter for a site (0 when never seen)
    pub fn get(&self, site: &str) -> u64 {
        self.entries.get(site).copied().unwrap_or(0)
    }

    /// Increment the counter for a local event and return the new value
    pub fn tick(&mut self, site: &str) -> u64 {
        let counter = self.entries.entry(site.to_string()).or_insert(0);
        *counter += 1;
        *counter
    }

    /// Record that `counter` was seen for `site`, keeping the maximum
    pub fn observe(&mut self, site: &str, counter: u64) {
        let entry = self.entries.entry(site.to_string()).or_insert(0);
        *entry = (*entry).max(counter);
    }

    /// Whether an event `(site, counter)` is already covered by this clock
    pub fn has_seen(&self, site: &str, counter: u64) -> bool {
        counter <= self.get(site)
    }

    /// Pointwise maximum
    pub fn merge(&mut self, other: &VectorClock) {
        for (site, counter) in &other.entries {
            self.observe(site, *counter);
        }
    }

    /// Whether every entry of `other` is covered by `self`
    pub fn dominates(&self, other: &VectorClock) -> bool {
        other.entries.iter().all(|(site, counter)| self.get(site) >= *counter)
    }

    pub fn compare(&self, other: &VectorClock) -> Causality {
        let mut less = false;
        let mut greater = false;
        for site in self.entries.keys().chain(other.entries.keys()) {
            match self.get(site).cmp(&other.get(site)) {
                Ordering::Less => less = true,
                Ordering::Greater => greater = true,
                Ordering::Equal => {}
            }
        }
        match (less, greater) {
            (false, false) => Causality::Equal,
            (true, false) => Causality::Before,
            (false, true) => Causality::After,
            (true, true) => Causality::Concurrent,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SiteId, &u64)> {
        self.entries.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
