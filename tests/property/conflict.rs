//! Property-based tests for conflict resolution

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use std::collections::BTreeSet;
use xfcanvas::conflict::ConflictResolver;
use xfcanvas::shared::{Change, EngineConfig, Fields, Payload, Priority, Value};

const TARGET: &str = "shape-1";

fn priority() -> impl Strategy<Value = Priority> {
    prop_oneof![
        Just(Priority::UserAction),
        Just(Priority::AlgorithmUpdate),
        Just(Priority::Derived),
        Just(Priority::Background),
    ]
}

fn payload() -> impl Strategy<Value = Payload> {
    prop_oneof![
        Just(Payload::Insert {
            target: TARGET.to_string(),
            value: Value::Bool(true),
        }),
        ("(color|width)", -5i32..5).prop_map(|(field, value)| Payload::Modify {
            target: TARGET.to_string(),
            fields: Fields::from([(field, Value::Number(value as f64))]),
            prior: None,
        }),
        Just(Payload::Delete {
            target: TARGET.to_string(),
            snapshot: None,
        }),
    ]
}

fn change() -> impl Strategy<Value = Change> {
    (
        prop_oneof![Just("draw"), Just("growth"), Just("parametric")],
        1u64..50,
        prop_oneof![Just("a"), Just("b"), Just("c")],
        priority(),
        payload(),
        0i64..10,
    )
        .prop_map(|(surface, time, site, priority, payload, offset)| {
            let created_at = Utc.timestamp_opt(1_700_000_000 + offset, 0).unwrap();
            Change::new(surface, time, payload)
                .with_site(site)
                .with_priority(priority)
                .with_created_at(created_at)
        })
}

fn group() -> impl Strategy<Value = (Vec<Change>, Vec<Change>)> {
    prop::collection::vec(change(), 2..5).prop_flat_map(|group| {
        let shuffled = Just(group.clone()).prop_shuffle();
        (Just(group), shuffled)
    })
}

proptest! {
    #[test]
    fn test_resolution_ignores_input_order((group, shuffled) in group()) {
        let config = EngineConfig::default();
        let first = ConflictResolver::new(&config).resolve(&group).unwrap();
        let second = ConflictResolver::new(&config).resolve(&shuffled).unwrap();

        prop_assert_eq!(&first.strategy, &second.strategy);
        prop_assert_eq!(first.kind, second.kind);
        prop_assert_eq!(first.partition(), second.partition());
        prop_assert_eq!(first.merged_from, second.merged_from);
    }

    #[test]
    fn test_every_member_accounted_for((group, _) in group()) {
        let config = EngineConfig::default();
        let mut resolver = ConflictResolver::new(&config);
        let record = resolver.resolve(&group).unwrap();

        let members: BTreeSet<_> = group.iter().map(|change| change.id).collect();
        let mut seen: BTreeSet<_> = record.rejected.iter().map(|change| change.id).collect();
        if record.merged_from.is_empty() {
            prop_assert!(seen.insert(record.applied.id));
        } else {
            seen.extend(record.merged_from.iter().copied());
        }
        prop_assert_eq!(seen, members);
        prop_assert_eq!(resolver.stats().total, 1);
        prop_assert_eq!(resolver.audit_log().count(), 1);
    }
}
