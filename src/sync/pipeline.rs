//! # Merge Pipeline
//!
//! Turns one drained batch into an ordered list of [`Step`]s. Planning is a
//! pure function of the batch and the conflict resolver; the engine then
//! executes the steps against surface state.
//!
//! Changes are bucketed by [`Change::target_key`]. Inside a bucket:
//!
//! 1. **CRDT** members (a CRDT op and no OT op) always apply; the replica
//!    merge is order independent.
//! 2. **Linear OT** members apply in batch order. The engine rebases each
//!    one over the concurrent operations in its [`causal`](super::causal)
//!    log when it is applied.
//! 3. **Remote** spatial OT and plain members apply in order. Their origin
//!    already arbitrated them; surface stamps and the causal log merge them.
//! 4. **Local** spatial OT and plain members from a single origin apply in
//!    order. From several origins they apply like OT members unless the
//!    group is ambiguous (a plain member, a structurally invalid member, or
//!    competing operation kinds), in which case the conflict resolver picks
//!    exactly one change and every other member is rejected.
//!
//! An origin is a `(site, surface)` pair: changes from one origin were
//! produced sequentially and never compete with each other.

use crate::conflict::{ConflictRecord, ConflictResolver};
use crate::ot::Family;
use crate::shared::change::{Change, ChangeKind};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// One planned action, in execution order
#[derive(Debug, Clone)]
pub enum Step {
    Apply(Change),
    Reject {
        change: Change,
        reason: String,
        /// The change was structurally invalid
        corruption: bool,
    },
}

#[derive(Debug, Default)]
pub struct Plan {
    pub steps: Vec<Step>,
    pub records: Vec<ConflictRecord>,
    /// Batch composition by `(source surface, kind)`
    pub groups: BTreeMap<(String, ChangeKind), usize>,
}

enum Decision {
    Apply(Change),
    Reject { reason: String, corruption: bool },
    /// Folded into a synthetic change planned at another position
    Merged,
}

type Origin<'a> = (&'a str, &'a str);

fn origin_of(change: &Change) -> Origin<'_> {
    (change.site.as_str(), change.source_surface.as_str())
}

fn corrupt(change: &Change) -> Decision {
    Decision::Reject {
        reason: change.defects().join(", "),
        corruption: true,
    }
}

fn is_crdt(change: &Change) -> bool {
    change.crdt_op.is_some() && change.ot_op.is_none()
}

fn is_linear(change: &Change) -> bool {
    change
        .ot_op
        .as_ref()
        .is_some_and(|op| op.family() == Family::Linear)
}

pub fn plan(batch: &[Change], resolver: &mut ConflictResolver) -> Plan {
    let mut plan = Plan::default();
    for change in batch {
        *plan
            .groups
            .entry((change.source_surface.clone(), change.kind()))
            .or_insert(0) += 1;
    }

    let mut buckets: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (index, change) in batch.iter().enumerate() {
        buckets.entry(change.target_key()).or_default().push(index);
    }

    let mut decisions: Vec<Option<Decision>> = batch.iter().map(|_| None).collect();
    for members in buckets.values() {
        plan_bucket(batch, members, &mut decisions, &mut plan.records, resolver);
    }

    plan.steps = batch
        .iter()
        .zip(decisions)
        .filter_map(|(change, decision)| match decision {
            Some(Decision::Apply(change)) => Some(Step::Apply(change)),
            Some(Decision::Reject { reason, corruption }) => Some(Step::Reject {
                change: change.clone(),
                reason,
                corruption,
            }),
            Some(Decision::Merged) | None => None,
        })
        .collect();
    plan
}

fn plan_bucket(
    batch: &[Change],
    members: &[usize],
    decisions: &mut [Option<Decision>],
    records: &mut Vec<ConflictRecord>,
    resolver: &mut ConflictResolver,
) {
    let mut contested = Vec::new();
    for &index in members {
        let change = &batch[index];
        if is_crdt(change) || is_linear(change) || change.origin.is_remote() {
            decisions[index] = Some(in_order(change));
        } else {
            contested.push(index);
        }
    }

    let origins: BTreeSet<Origin<'_>> = contested.iter().map(|&i| origin_of(&batch[i])).collect();
    if origins.len() > 1 && is_ambiguous(batch, &contested) {
        resolve_group(batch, &contested, decisions, records, resolver);
        return;
    }
    for &index in &contested {
        decisions[index] = Some(in_order(&batch[index]));
    }
}

fn in_order(change: &Change) -> Decision {
    if change.is_well_formed() {
        Decision::Apply(change.clone())
    } else {
        corrupt(change)
    }
}

/// Whether transforms alone cannot reconcile the group
fn is_ambiguous(batch: &[Change], members: &[usize]) -> bool {
    let mut kinds = BTreeSet::new();
    for &index in members {
        let change = &batch[index];
        if !change.is_well_formed() {
            return true;
        }
        match &change.ot_op {
            Some(op) => {
                kinds.insert(op.kind.name());
            }
            None => return true,
        }
    }
    kinds.len() > 1
}

fn resolve_group(
    batch: &[Change],
    members: &[usize],
    decisions: &mut [Option<Decision>],
    records: &mut Vec<ConflictRecord>,
    resolver: &mut ConflictResolver,
) {
    let group: Vec<Change> = members.iter().map(|&i| batch[i].clone()).collect();
    let Some(record) = resolver.resolve(&group) else {
        return;
    };

    let rejected: BTreeSet<Uuid> = record.rejected.iter().map(|change| change.id).collect();
    let merged: BTreeSet<Uuid> = record.merged_from.iter().copied().collect();
    let reason = format!("conflict resolved by {}: {}", record.strategy, record.reason);

    for &index in members {
        let change = &batch[index];
        decisions[index] = Some(if rejected.contains(&change.id) || record.is_noop {
            Decision::Reject {
                reason: reason.clone(),
                corruption: !change.is_well_formed(),
            }
        } else if merged.contains(&change.id) {
            Decision::Merged
        } else {
            Decision::Apply(record.applied.clone())
        });
    }

    // A synthetic merge takes the position of its latest member
    if !merged.is_empty() && !record.is_noop {
        if let Some(&last) = members
            .iter()
            .filter(|&&i| merged.contains(&batch[i].id))
            .max()
        {
            decisions[last] = Some(Decision::Apply(record.applied.clone()));
        }
    }
    records.push(record);
}
