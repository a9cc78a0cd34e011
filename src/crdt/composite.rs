//! Composite replica: child CRDTs keyed by path
//!
//! Used for nested payloads. The replica type at a path is fixed by the
//! first operation that reaches it; merging two different replica types at
//! the same path keeps the one with the higher type rank so the result does
//! not depend on merge order.

use super::{CrdtError, CrdtOp, CrdtState, GSet, LwwRegister, MergeOutcome, OrSet, Rga};
use crate::shared::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One child replica
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "replica", rename_all = "snake_case")]
pub enum Replica {
    GSet(GSet<String>),
    OrSet(OrSet<String>),
    Register(LwwRegister<Value>),
    Sequence(Rga),
    Composite(Composite),
}

impl Replica {
    /// Default replica type for the first op reaching an empty path
    fn for_op(op: &CrdtOp) -> Replica {
        match op {
            CrdtOp::Add { .. } | CrdtOp::RemoveTag { .. } => Replica::OrSet(OrSet::new()),
            CrdtOp::RegisterWrite { .. } => Replica::Register(LwwRegister::new()),
            CrdtOp::SequenceInsert { .. } | CrdtOp::SequenceDelete { .. } => {
                Replica::Sequence(Rga::new())
            }
            CrdtOp::Composite { .. } => Replica::Composite(Composite::new()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Replica::GSet(_) => 0,
            Replica::OrSet(_) => 1,
            Replica::Register(_) => 2,
            Replica::Sequence(_) => 3,
            Replica::Composite(_) => 4,
        }
    }

    fn merge(&mut self, other: &Replica) -> MergeOutcome {
        match (self, other) {
            (Replica::GSet(a), Replica::GSet(b)) => a.merge(b),
            (Replica::OrSet(a), Replica::OrSet(b)) => a.merge(b),
            (Replica::Register(a), Replica::Register(b)) => a.merge(b),
            (Replica::Sequence(a), Replica::Sequence(b)) => a.merge(b),
            (Replica::Composite(a), Replica::Composite(b)) => a.merge(b),
            (this, other) => {
                if other.rank() > this.rank() {
                    *this = other.clone();
                    MergeOutcome::Updated
                } else {
                    MergeOutcome::Unchanged
                }
            }
        }
    }

    fn apply(&mut self, op: &CrdtOp) -> Result<MergeOutcome, CrdtError> {
        match self {
            Replica::GSet(set) => set.apply(op),
            Replica::OrSet(set) => set.apply(op),
            Replica::Register(register) => register.apply(op),
            Replica::Sequence(sequence) => sequence.apply(op),
            Replica::Composite(composite) => composite.apply(op),
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            Replica::GSet(set) => set.is_empty(),
            Replica::OrSet(set) => set.is_empty(),
            Replica::Register(register) => register.is_empty(),
            Replica::Sequence(sequence) => sequence.is_empty(),
            Replica::Composite(composite) => composite.is_empty(),
        }
    }

    /// Fill in the state `op` is about to overwrite
    fn capture(&self, op: &CrdtOp) -> CrdtOp {
        match (self, op) {
            (
                Replica::Register(register),
                CrdtOp::RegisterWrite {
                    value, clock, site, ..
                },
            ) => CrdtOp::RegisterWrite {
                value: value.clone(),
                prior: Some(register.value().cloned().unwrap_or(Value::Null)),
                clock: *clock,
                site: site.clone(),
            },
            (Replica::Sequence(sequence), CrdtOp::SequenceDelete { id, value: None }) => {
                CrdtOp::SequenceDelete {
                    id: id.clone(),
                    value: sequence.value_of(id).map(str::to_string),
                }
            }
            (Replica::Composite(composite), CrdtOp::Composite { path, op }) => CrdtOp::Composite {
                path: path.clone(),
                op: Box::new(composite.capture_at(path, op)),
            },
            (_, op) => op.clone(),
        }
    }

    /// Highest clock value held, used to restamp replayed operations
    fn max_clock(&self) -> u64 {
        match self {
            Replica::Sequence(sequence) => sequence.next_counter() - 1,
            Replica::Register(register) => register.stamp().0,
            Replica::Composite(composite) => composite
                .children
                .values()
                .map(Replica::max_clock)
                .max()
                .unwrap_or(0),
            Replica::GSet(_) | Replica::OrSet(_) => 0,
        }
    }
}

/// Path-keyed map of child replicas
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Composite {
    children: BTreeMap<String, Replica>,
}

impl Composite {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install an explicit replica type at `path` (no-op if one exists)
    pub fn declare(&mut self, path: impl Into<String>, replica: Replica) {
        self.children.entry(path.into()).or_insert(replica);
    }

    pub fn get(&self, path: &str) -> Option<&Replica> {
        self.children.get(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &String> {
        self.children.keys()
    }

    /// Apply `op` to the child at `path`, creating it on first use
    pub fn apply_at(&mut self, path: &str, op: &CrdtOp) -> Result<MergeOutcome, CrdtError> {
        let child = self
            .children
            .entry(path.to_string())
            .or_insert_with(|| Replica::for_op(op));
        child.apply(op)
    }

    /// `op` with the state it overwrites at `path` filled in, so that its
    /// inverse is defined. A register written for the first time captures
    /// `Null` as its prior value.
    pub fn capture_at(&self, path: &str, op: &CrdtOp) -> CrdtOp {
        match self.children.get(path) {
            Some(child) => child.capture(op),
            None => match op {
                CrdtOp::RegisterWrite {
                    value, clock, site, ..
                } => CrdtOp::RegisterWrite {
                    value: value.clone(),
                    prior: Some(Value::Null),
                    clock: *clock,
                    site: site.clone(),
                },
                CrdtOp::Composite { path, op } => CrdtOp::Composite {
                    path: path.clone(),
                    op: Box::new(Composite::new().capture_at(path, op)),
                },
                other => other.clone(),
            },
        }
    }

    /// Counter a fresh Lamport stamp at `path` must exceed
    pub fn max_clock(&self, path: &str) -> u64 {
        self.children.get(path).map(Replica::max_clock).unwrap_or(0)
    }

    /// Visible text of the sequence at `path`, if it is one
    pub fn sequence_text(&self, path: &str) -> Option<String> {
        match self.children.get(path) {
            Some(Replica::Sequence(sequence)) => Some(sequence.text()),
            _ => None,
        }
    }

    /// Value held by the register at `path`, if it is one
    pub fn register_value(&self, path: &str) -> Option<&Value> {
        match self.children.get(path) {
            Some(Replica::Register(register)) => register.value(),
            _ => None,
        }
    }
}

impl CrdtState for Composite {
    fn merge(&mut self, other: &Self) -> MergeOutcome {
        let mut outcome = MergeOutcome::Unchanged;
        for (path, replica) in &other.children {
            match self.children.get_mut(path) {
                Some(existing) => outcome = outcome.or(existing.merge(replica)),
                None => {
                    self.children.insert(path.clone(), replica.clone());
                    outcome = MergeOutcome::Updated;
                }
            }
        }
        outcome
    }

    fn apply(&mut self, op: &CrdtOp) -> Result<MergeOutcome, CrdtError> {
        match op {
            CrdtOp::Composite { path, op } => self.apply_at(path, op),
            other => Err(CrdtError::unsupported(other, "composite")),
        }
    }

    fn is_empty(&self) -> bool {
        self.children.values().all(Replica::is_empty)
    }
}
