//! # Causal OT Log
//!
//! Per-context record of the OT operations this replica applied, used to
//! rebase an arriving operation over everything applied concurrently with it.
//!
//! A change carrying an OT op also carries `context`, the vector clock of
//! the changes its author had applied when it was made. On arrival the log
//! entries split into those the author had seen and those it had not, and
//! the op is transformed over the unseen ones in log order.
//!
//! When the seen entries form a prefix of the log, the log is rewritten to
//! `seen, arriving, unseen'` where each unseen entry is transformed past the
//! arriving op. The next operation from the same author then finds its own
//! history as a prefix again. Interleaved histories fall back to
//! transforming over the unseen entries and appending.
//!
//! Changes from one origin (a `(site, surface)` pair) are sequential and
//! never transformed against each other. A change without a context is
//! taken to have seen everything applied before its batch.

use crate::ot::{self, OtOp, OtStats};
use crate::shared::change::Change;
use std::collections::{BTreeMap, VecDeque};
use uuid::Uuid;

/// Clock key of a change's origin
pub fn origin_key(change: &Change) -> String {
    format!("{}/{}", change.site, change.source_surface)
}

#[derive(Debug, Clone)]
struct Entry {
    origin: String,
    logical_time: u64,
    batch_id: Option<Uuid>,
    /// Defined on the state left by every earlier entry
    op: OtOp,
}

impl Entry {
    fn seen_by(&self, change: &Change, origin: &str) -> bool {
        if self.origin == origin {
            return true;
        }
        match &change.context {
            Some(context) => context.has_seen(&self.origin, self.logical_time),
            None => self.batch_id.is_none() || self.batch_id != change.batch_id,
        }
    }
}

/// An arriving op rebased over the log, ready to apply
#[derive(Debug, Clone)]
pub struct Rebased {
    /// The op to apply to current state
    pub op: OtOp,
    context_id: String,
    position: usize,
    /// Replacements for the entries from `position` on
    rewritten: Vec<OtOp>,
    entry: Entry,
}

#[derive(Debug)]
pub struct CausalLog {
    contexts: BTreeMap<String, VecDeque<Entry>>,
    limit: usize,
}

impl CausalLog {
    /// Keep at most `limit` entries per context
    pub fn new(limit: usize) -> Self {
        Self {
            contexts: BTreeMap::new(),
            limit,
        }
    }

    /// Rebase `op`, carried by `change`, over the entries its author had
    /// not seen. Nothing is recorded until [`CausalLog::commit`].
    pub fn rebase(&self, change: &Change, op: &OtOp, stats: &mut OtStats) -> Rebased {
        let origin = origin_key(change);
        let empty = VecDeque::new();
        let entries = self.contexts.get(&op.context_id).unwrap_or(&empty);
        let seen: Vec<bool> = entries.iter().map(|entry| entry.seen_by(change, &origin)).collect();
        let prefix = seen.iter().take_while(|seen| **seen).count();

        let entry = |op: OtOp| Entry {
            origin: origin.clone(),
            logical_time: change.logical_time,
            batch_id: change.batch_id,
            op,
        };

        if seen[prefix..].iter().all(|seen| !seen) {
            let mut current = op.clone();
            let mut rewritten = Vec::with_capacity(entries.len() - prefix);
            for earlier in entries.iter().skip(prefix) {
                let (next, moved) = ot::transform(&current, &earlier.op);
                stats.record_transform(&next);
                rewritten.push(moved);
                current = next;
            }
            return Rebased {
                op: current,
                context_id: op.context_id.clone(),
                position: prefix,
                rewritten,
                entry: entry(op.clone()),
            };
        }

        tracing::debug!(
            "[Causal] Interleaved history on '{}' for change {}",
            op.context_id,
            change.id
        );
        let mut current = op.clone();
        for (earlier, _) in entries.iter().zip(&seen).filter(|(_, seen)| !**seen) {
            current = ot::transform(&current, &earlier.op).0;
            stats.record_transform(&current);
        }
        Rebased {
            op: current.clone(),
            context_id: op.context_id.clone(),
            position: entries.len(),
            rewritten: Vec::new(),
            entry: entry(current),
        }
    }

    /// Record a rebased op once it has been applied
    pub fn commit(&mut self, rebased: Rebased) {
        let entries = self.contexts.entry(rebased.context_id).or_default();
        for (slot, op) in entries.iter_mut().skip(rebased.position).zip(rebased.rewritten) {
            slot.op = op;
        }
        let position = rebased.position.min(entries.len());
        entries.insert(position, rebased.entry);
        while entries.len() > self.limit {
            entries.pop_front();
        }
    }

    /// Entries recorded for a context
    pub fn len(&self, context_id: &str) -> usize {
        self.contexts.get(context_id).map_or(0, VecDeque::len)
    }
}
