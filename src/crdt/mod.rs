//! # CRDT Layer
//!
//! Conflict-free replicated data types used by the merge step of the
//! pipeline. Concurrent operations on the same target are folded into a
//! replica without coordination; every replica type guarantees that merge is
//! commutative, associative and idempotent.
//!
//! ## Replica types
//!
//! - [`GSet`]: grow-only set, merge = union
//! - [`OrSet`]: observed-remove set with unique add tags (add-wins)
//! - [`LwwRegister`]: last-writer-wins register, ties broken by site id
//! - [`Rga`]: replicated growable array with tombstones
//! - [`Composite`]: path-keyed map of child replicas for nested payloads
//!
//! ## Operations
//!
//! [`CrdtOp`] is the operation form carried on a change. Each variant carries
//! the clock value and site id it was created with so that every replica
//! breaks ties identically.

pub mod composite;
pub mod gset;
pub mod lww;
pub mod orset;
pub mod rga;

pub use composite::{Composite, Replica};
pub use gset::GSet;
pub use lww::LwwRegister;
pub use orset::OrSet;
pub use rga::Rga;

use crate::shared::clock::SiteId;
use crate::shared::value::Value;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Serde adapter encoding `BTreeMap<Dot, V>` as a list of pairs, since
/// JSON object keys must be strings
pub(crate) mod dot_map {
    use super::Dot;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S, V>(map: &BTreeMap<Dot, V>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        V: Serialize,
    {
        serializer.collect_seq(map.iter())
    }

    pub fn deserialize<'de, D, V>(deserializer: D) -> Result<BTreeMap<Dot, V>, D::Error>
    where
        D: Deserializer<'de>,
        V: Deserialize<'de>,
    {
        let pairs = Vec::<(Dot, V)>::deserialize(deserializer)?;
        Ok(pairs.into_iter().collect())
    }
}

/// Unique tag of a CRDT event: `(counter, site)` plus a reissue revision.
///
/// Tags are ordered by counter first, then site, then revision, which gives
/// every replica the same total order for tie-breaking.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Dot {
    pub counter: u64,
    pub site: SiteId,
    #[serde(default)]
    pub revision: u32,
}

impl Dot {
    pub fn new(site: impl Into<SiteId>, counter: u64) -> Self {
        Self {
            counter,
            site: site.into(),
            revision: 0,
        }
    }

    /// A fresh tag for re-creating an element whose tag was tombstoned
    pub fn reissue(&self) -> Self {
        Self {
            counter: self.counter,
            site: self.site.clone(),
            revision: self.revision + 1,
        }
    }
}

/// CRDT operation attached to a change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CrdtOp {
    /// Add an element. Grow-only sets ignore the tag; observed-remove sets
    /// key the add by it.
    Add { element: String, tag: Dot },
    /// Remove the add identified by `tag`
    RemoveTag { element: String, tag: Dot },
    /// Write a register. `prior` is the value overwritten at write time.
    RegisterWrite {
        value: Value,
        #[serde(default)]
        prior: Option<Value>,
        clock: u64,
        site: SiteId,
    },
    /// Insert `value` after `after` (None = head of the sequence)
    SequenceInsert {
        id: Dot,
        after: Option<Dot>,
        value: String,
    },
    /// Tombstone the element `id`. `value` is captured for inversion.
    SequenceDelete {
        id: Dot,
        #[serde(default)]
        value: Option<String>,
    },
    /// Route `op` to the child replica at `path`
    Composite { path: String, op: Box<CrdtOp> },
}

impl CrdtOp {
    /// Compensating operation, or `None` when it cannot be derived
    pub fn invert(&self) -> Option<CrdtOp> {
        match self {
            CrdtOp::Add { element, tag } => Some(CrdtOp::RemoveTag {
                element: element.clone(),
                tag: tag.clone(),
            }),
            CrdtOp::RemoveTag { element, tag } => Some(CrdtOp::Add {
                element: element.clone(),
                tag: tag.reissue(),
            }),
            CrdtOp::RegisterWrite {
                value,
                prior,
                clock,
                site,
            } => prior.as_ref().map(|prior| CrdtOp::RegisterWrite {
                value: prior.clone(),
                prior: Some(value.clone()),
                clock: clock + 1,
                site: site.clone(),
            }),
            CrdtOp::SequenceInsert { id, value, .. } => Some(CrdtOp::SequenceDelete {
                id: id.clone(),
                value: Some(value.clone()),
            }),
            // Re-insert anchored on the tombstone so it lands where it was
            CrdtOp::SequenceDelete { id, value } => {
                value.as_ref().map(|value| CrdtOp::SequenceInsert {
                    id: id.reissue(),
                    after: Some(id.clone()),
                    value: value.clone(),
                })
            }
            CrdtOp::Composite { path, op } => op.invert().map(|op| CrdtOp::Composite {
                path: path.clone(),
                op: Box::new(op),
            }),
        }
    }

    /// Path of the replica this op addresses
    pub fn path(&self) -> Option<&str> {
        match self {
            CrdtOp::Composite { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Clock value carried by the op, used for Lamport bookkeeping
    pub fn clock(&self) -> u64 {
        match self {
            CrdtOp::Add { tag, .. } | CrdtOp::RemoveTag { tag, .. } => tag.counter,
            CrdtOp::RegisterWrite { clock, .. } => *clock,
            CrdtOp::SequenceInsert { id, .. } | CrdtOp::SequenceDelete { id, .. } => id.counter,
            CrdtOp::Composite { op, .. } => op.clock(),
        }
    }
}

/// Result of merging or applying into a replica
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Nothing changed (already observed)
    Unchanged,
    /// Replica state changed
    Updated,
}

impl MergeOutcome {
    pub fn changed(self) -> bool {
        matches!(self, MergeOutcome::Updated)
    }

    /// Combine two outcomes: updated if either updated
    pub fn or(self, other: MergeOutcome) -> MergeOutcome {
        if self.changed() || other.changed() {
            MergeOutcome::Updated
        } else {
            MergeOutcome::Unchanged
        }
    }

    pub(crate) fn from_changed(changed: bool) -> MergeOutcome {
        if changed {
            MergeOutcome::Updated
        } else {
            MergeOutcome::Unchanged
        }
    }
}

/// CRDT layer errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CrdtError {
    /// Operation variant does not fit the replica type
    #[error("operation {op} cannot be applied to a {replica} replica")]
    Unsupported { op: &'static str, replica: &'static str },
}

impl CrdtError {
    pub(crate) fn unsupported(op: &CrdtOp, replica: &'static str) -> Self {
        let op = match op {
            CrdtOp::Add { .. } => "add",
            CrdtOp::RemoveTag { .. } => "remove_tag",
            CrdtOp::RegisterWrite { .. } => "register_write",
            CrdtOp::SequenceInsert { .. } => "sequence_insert",
            CrdtOp::SequenceDelete { .. } => "sequence_delete",
            CrdtOp::Composite { .. } => "composite",
        };
        Self::Unsupported { op, replica }
    }
}

/// Common interface of every replica type
pub trait CrdtState: Clone {
    /// Merge another replica's state into this one
    fn merge(&mut self, other: &Self) -> MergeOutcome;

    /// Apply a single operation
    fn apply(&mut self, op: &CrdtOp) -> Result<MergeOutcome, CrdtError>;

    /// Whether the replica holds no visible data
    fn is_empty(&self) -> bool;
}

/// Counters exposed through the metrics snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrdtStats {
    /// Operations applied to replicas
    pub operations_applied: u64,
    /// Operations that were already observed
    pub redundant_operations: u64,
    /// Operations rejected by the replica
    pub failed_operations: u64,
    /// State merges performed
    pub merges: u64,
}

impl CrdtStats {
    pub fn record(&mut self, result: &Result<MergeOutcome, CrdtError>) {
        match result {
            Ok(MergeOutcome::Updated) => self.operations_applied += 1,
            Ok(MergeOutcome::Unchanged) => self.redundant_operations += 1,
            Err(_) => self.failed_operations += 1,
        }
    }
}
