//! Replicated Growable Array (RGA)
//!
//! Sequence CRDT: each element records the id of its causal predecessor
//! (`origin`). An element is integrated immediately after its origin,
//! skipping any run of elements with a greater id, so concurrent siblings
//! end up in descending id order on every replica.
//!
//! Deleted elements stay in place as tombstones. Inserts anchored to a
//! deleted element therefore remain well defined.
//!
//! Ids are [`Dot`]s whose counters must be Lamport timestamps (greater than
//! the counter of the origin). [`Rga::insert_local`] assigns them that way.

use super::{CrdtError, CrdtOp, CrdtState, Dot, MergeOutcome};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Node {
    id: Dot,
    origin: Option<Dot>,
    value: String,
    deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct PendingInsert {
    origin: Option<Dot>,
    value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rga {
    nodes: Vec<Node>,
    /// Inserts whose origin has not been delivered yet
    #[serde(with = "super::dot_map")]
    pending_inserts: BTreeMap<Dot, PendingInsert>,
    /// Deletes that arrived before their element
    pending_deletes: BTreeSet<Dot>,
    /// Highest counter observed, for Lamport id assignment
    max_counter: u64,
}

impl Rga {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert at visible `index` on behalf of `site`; returns the op to replicate
    pub fn insert_local(&mut self, index: usize, value: impl Into<String>, site: &str) -> CrdtOp {
        let after = if index == 0 {
            None
        } else {
            self.visible().nth(index - 1).map(|node| node.id.clone())
        };
        let id = Dot::new(site, self.max_counter + 1);
        let value = value.into();
        self.integrate(id.clone(), after.clone(), value.clone());
        CrdtOp::SequenceInsert { id, after, value }
    }

    /// Delete the element at visible `index`; returns the op to replicate
    pub fn delete_local(&mut self, index: usize) -> Option<CrdtOp> {
        let node = self.visible().nth(index)?;
        let id = node.id.clone();
        let value = node.value.clone();
        self.delete(&id);
        Some(CrdtOp::SequenceDelete {
            id,
            value: Some(value),
        })
    }

    /// Integrate a (possibly remote) insert
    pub fn insert(&mut self, id: Dot, after: Option<Dot>, value: impl Into<String>) -> MergeOutcome {
        let outcome = self.integrate(id, after, value.into());
        if outcome.changed() {
            self.drain_pending();
        }
        outcome
    }

    /// Tombstone an element
    pub fn delete(&mut self, id: &Dot) -> MergeOutcome {
        match self.nodes.iter_mut().find(|node| &node.id == id) {
            Some(node) if !node.deleted => {
                node.deleted = true;
                MergeOutcome::Updated
            }
            Some(_) => MergeOutcome::Unchanged,
            None => MergeOutcome::from_changed(self.pending_deletes.insert(id.clone())),
        }
    }

    /// Visible values in order
    pub fn values(&self) -> Vec<&str> {
        self.visible().map(|node| node.value.as_str()).collect()
    }

    /// Visible values concatenated
    pub fn text(&self) -> String {
        self.visible().map(|node| node.value.as_str()).collect()
    }

    /// Visible element count
    pub fn len(&self) -> usize {
        self.visible().count()
    }

    /// Counter a new local id must use to stay a Lamport timestamp
    pub fn next_counter(&self) -> u64 {
        self.max_counter + 1
    }

    /// Value of an element, tombstoned or not
    pub fn value_of(&self, id: &Dot) -> Option<&str> {
        self.nodes
            .iter()
            .find(|node| &node.id == id)
            .map(|node| node.value.as_str())
    }

    pub fn tombstones(&self) -> usize {
        self.nodes.iter().filter(|node| node.deleted).count()
    }

    pub fn contains(&self, id: &Dot) -> bool {
        self.position(id).is_some()
    }

    fn visible(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|node| !node.deleted)
    }

    fn position(&self, id: &Dot) -> Option<usize> {
        self.nodes.iter().position(|node| &node.id == id)
    }

    fn integrate(&mut self, id: Dot, after: Option<Dot>, value: String) -> MergeOutcome {
        if self.contains(&id) || self.pending_inserts.contains_key(&id) {
            return MergeOutcome::Unchanged;
        }
        self.max_counter = self.max_counter.max(id.counter);

        let start = match &after {
            None => 0,
            Some(origin) => match self.position(origin) {
                Some(index) => index + 1,
                None => {
                    self.pending_inserts
                        .insert(id, PendingInsert { origin: after, value });
                    return MergeOutcome::Updated;
                }
            },
        };

        let mut index = start;
        while index < self.nodes.len() && self.nodes[index].id > id {
            index += 1;
        }

        let deleted = self.pending_deletes.remove(&id);
        self.nodes.insert(
            index,
            Node {
                id,
                origin: after,
                value,
                deleted,
            },
        );
        MergeOutcome::Updated
    }

    fn drain_pending(&mut self) {
        loop {
            let ready = self
                .pending_inserts
                .iter()
                .find(|(_, pending)| match &pending.origin {
                    None => true,
                    Some(origin) => self.contains(origin),
                })
                .map(|(id, _)| id.clone());

            let Some(id) = ready else { break };
            if let Some(pending) = self.pending_inserts.remove(&id) {
                self.integrate(id, pending.origin, pending.value);
            }
        }
    }
}

impl CrdtState for Rga {
    fn merge(&mut self, other: &Self) -> MergeOutcome {
        let mut outcome = MergeOutcome::Unchanged;
        // Origins always precede their children in node order
        for node in &other.nodes {
            outcome = outcome.or(self.insert(node.id.clone(), node.origin.clone(), node.value.clone()));
            if node.deleted {
                outcome = outcome.or(self.delete(&node.id));
            }
        }
        for (id, pending) in &other.pending_inserts {
            outcome = outcome.or(self.insert(id.clone(), pending.origin.clone(), pending.value.clone()));
        }
        for id in &other.pending_deletes {
            outcome = outcome.or(self.delete(id));
        }
        outcome
    }

    fn apply(&mut self, op: &CrdtOp) -> Result<MergeOutcome, CrdtError> {
        match op {
            CrdtOp::SequenceInsert { id, after, value } => {
                Ok(self.insert(id.clone(), after.clone(), value.clone()))
            }
            CrdtOp::SequenceDelete { id, .. } => Ok(self.delete(id)),
            other => Err(CrdtError::unsupported(other, "sequence")),
        }
    }

    fn is_empty(&self) -> bool {
        self.visible().next().is_none()
    }
}
