//! Property-based tests for queue ordering

use proptest::prelude::*;
use xfcanvas::shared::{Change, Payload, Priority, Value};
use xfcanvas::sync::ChangeQueue;

fn priority() -> impl Strategy<Value = Priority> {
    prop_oneof![
        Just(Priority::UserAction),
        Just(Priority::AlgorithmUpdate),
        Just(Priority::Derived),
        Just(Priority::Background),
    ]
}

fn change(priority: Priority, time: u64) -> Change {
    Change::new(
        "draw",
        time,
        Payload::Insert {
            target: format!("stroke-{}", time),
            value: Value::Bool(true),
        },
    )
    .with_priority(priority)
}

proptest! {
    #[test]
    fn test_drain_is_priority_then_time(
        entries in prop::collection::vec((priority(), 1u64..20), 0..40),
    ) {
        let mut queue = ChangeQueue::new(100);
        let mut submitted = Vec::new();
        for (priority, time) in entries {
            let change = change(priority, time);
            submitted.push((priority, time, change.id));
            prop_assert!(queue.push(change).is_none());
        }

        // Stable sort keeps submission order within equal keys
        submitted.sort_by_key(|(priority, time, _)| (*priority, *time));
        let drained: Vec<_> = queue.drain(usize::MAX).into_iter().map(|change| change.id).collect();
        let expected: Vec<_> = submitted.into_iter().map(|(_, _, id)| id).collect();
        prop_assert_eq!(drained, expected);
        prop_assert!(queue.is_empty());
    }

    #[test]
    fn test_eviction_takes_lowest_priority(
        entries in prop::collection::vec((priority(), 1u64..20), 1..30),
        capacity in 1usize..10,
    ) {
        let mut queue = ChangeQueue::new(capacity);
        for (priority, time) in entries {
            let incoming = change(priority, time);
            if let Some(evicted) = queue.push(incoming) {
                let remaining = queue.drain(usize::MAX);
                prop_assert!(remaining.iter().all(|change| change.priority <= evicted.priority));
                for change in remaining {
                    queue.push(change);
                }
            }
            prop_assert!(queue.len() <= capacity);
        }
    }
}
