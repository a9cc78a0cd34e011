//! Property-based tests for replica convergence
//!
//! Every replica type must reach the same state whatever order the same
//! set of operations is delivered in.

use proptest::prelude::*;
use std::collections::BTreeSet;
use xfcanvas::crdt::{CrdtOp, CrdtState, Dot, GSet, LwwRegister, OrSet, Rga};
use xfcanvas::shared::Value;

/// Local edit made by one authoring replica
#[derive(Debug, Clone)]
enum Edit {
    Insert { index: usize, value: char },
    Delete { index: usize },
}

fn edit_strategy() -> impl Strategy<Value = Edit> {
    prop_oneof![
        3 => (any::<usize>(), proptest::char::range('a', 'z'))
            .prop_map(|(index, value)| Edit::Insert { index, value }),
        1 => any::<usize>().prop_map(|index| Edit::Delete { index }),
    ]
}

/// Perform `edits` on `replica` as `site`, returning the ops to replicate
fn author(replica: &mut Rga, site: &str, edits: &[Edit]) -> Vec<CrdtOp> {
    let mut ops = Vec::new();
    for edit in edits {
        let len = replica.len();
        match edit {
            Edit::Delete { index } if len > 0 => {
                if let Some(op) = replica.delete_local(index % len) {
                    ops.push(op);
                }
            }
            Edit::Insert { index, value } => {
                ops.push(replica.insert_local(index % (len + 1), value.to_string(), site));
            }
            Edit::Delete { .. } => {}
        }
    }
    ops
}

fn deliver<S: CrdtState + Default>(ops: &[CrdtOp]) -> S {
    let mut replica = S::default();
    for op in ops {
        replica.apply(op).unwrap();
    }
    replica
}

/// One add per element, each optionally followed by a remove of its tag
fn orset_ops(adds: &[(String, bool)]) -> Vec<CrdtOp> {
    let mut ops = Vec::new();
    for (i, (element, removed)) in adds.iter().enumerate() {
        let tag = Dot::new(if i % 2 == 0 { "a" } else { "b" }, i as u64);
        ops.push(CrdtOp::Add {
            element: element.clone(),
            tag: tag.clone(),
        });
        if *removed {
            ops.push(CrdtOp::RemoveTag {
                element: element.clone(),
                tag,
            });
        }
    }
    ops
}

/// A shared prefix followed by two concurrent sessions
fn rga_log() -> impl Strategy<Value = (Vec<CrdtOp>, Vec<CrdtOp>, Vec<CrdtOp>)> {
    (
        prop::collection::vec(edit_strategy(), 0..8),
        prop::collection::vec(edit_strategy(), 0..12),
        prop::collection::vec(edit_strategy(), 0..12),
    )
        .prop_map(|(prefix, left, right)| {
            let mut base = Rga::new();
            let shared = author(&mut base, "s0", &prefix);
            let mut a = base.clone();
            let mut b = base;
            let ops_a = author(&mut a, "a", &left);
            let ops_b = author(&mut b, "b", &right);
            (shared, ops_a, ops_b)
        })
}

proptest! {
    #[test]
    fn test_gset_delivery_order_irrelevant(
        ops in prop::collection::vec("[a-e]{1,2}", 0..20)
            .prop_map(|elements| elements
                .into_iter()
                .enumerate()
                .map(|(i, element)| CrdtOp::Add { element, tag: Dot::new("s", i as u64) })
                .collect::<Vec<_>>())
            .prop_shuffle()
    ) {
        let replica: GSet<String> = deliver(&ops);
        let expected: BTreeSet<String> = ops
            .iter()
            .filter_map(|op| match op {
                CrdtOp::Add { element, .. } => Some(element.clone()),
                _ => None,
            })
            .collect();
        prop_assert_eq!(replica.iter().cloned().collect::<BTreeSet<_>>(), expected);
    }

    #[test]
    fn test_orset_delivery_order_irrelevant(
        (adds, ops) in prop::collection::vec(("[a-d]", any::<bool>()), 0..16)
            .prop_flat_map(|adds| {
                let ops = orset_ops(&adds);
                (Just(adds), Just(ops).prop_shuffle())
            })
    ) {
        let in_order: OrSet<String> = deliver(&orset_ops(&adds));
        let out_of_order: OrSet<String> = deliver(&ops);
        prop_assert_eq!(&in_order, &out_of_order);

        let survivors: BTreeSet<String> = adds
            .iter()
            .filter(|(_, removed)| !removed)
            .map(|(element, _)| element.clone())
            .collect();
        prop_assert_eq!(in_order.elements(), survivors);
    }

    #[test]
    fn test_lww_highest_stamp_wins(
        writes in prop::collection::btree_map((0u64..20, "[a-c]"), -100i64..100, 1..12)
            .prop_map(|writes| writes.into_iter().collect::<Vec<_>>())
            .prop_shuffle()
    ) {
        let mut register: LwwRegister<Value> = LwwRegister::new();
        for ((clock, site), value) in &writes {
            let op = CrdtOp::RegisterWrite {
                value: Value::Number(*value as f64),
                prior: None,
                clock: *clock,
                site: site.clone(),
            };
            register.apply(&op).unwrap();
        }
        let ((_, _), winner) = writes
            .iter()
            .max_by(|(left, _), (right, _)| left.cmp(right))
            .unwrap();
        prop_assert_eq!(register.value(), Some(&Value::Number(*winner as f64)));
    }

    #[test]
    fn test_rga_delivery_order_irrelevant(
        (ops, permutation) in rga_log().prop_flat_map(|(shared, ops_a, ops_b)| {
            let all: Vec<CrdtOp> = shared.into_iter().chain(ops_a).chain(ops_b).collect();
            let indices: Vec<usize> = (0..all.len()).collect();
            (Just(all), Just(indices).prop_shuffle())
        })
    ) {
        let in_order: Rga = deliver(&ops);
        let shuffled: Vec<CrdtOp> = permutation.iter().map(|&i| ops[i].clone()).collect();
        let out_of_order: Rga = deliver(&shuffled);

        prop_assert_eq!(in_order.text(), out_of_order.text());
        prop_assert_eq!(in_order, out_of_order);
    }

    #[test]
    fn test_rga_merge_commutative_and_idempotent((shared, ops_a, ops_b) in rga_log()) {
        let left: Rga = deliver(&shared.iter().chain(&ops_a).cloned().collect::<Vec<_>>());
        let right: Rga = deliver(&shared.iter().chain(&ops_b).cloned().collect::<Vec<_>>());

        let mut left_then_right = left.clone();
        left_then_right.merge(&right);
        let mut right_then_left = right.clone();
        right_then_left.merge(&left);
        prop_assert_eq!(left_then_right.text(), right_then_left.text());

        let snapshot = left_then_right.clone();
        prop_assert!(!left_then_right.merge(&right).changed());
        prop_assert_eq!(left_then_right, snapshot);
    }
}
