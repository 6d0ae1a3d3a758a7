/// PROPERTY-BASED TESTS: last-write-wins merging
///
/// Key invariants:
/// 1. After merging any sequence of values, the newest timestamp wins
/// 2. Of two values with the same timestamp, the first to arrive is kept
/// 3. Merging a value older than the current one never changes `get()`

use proptest::prelude::*;

use meshnet_shared::{AttributeValue, Delta, Oid, PathComponent, StateTree, TimestampedValue};

fn path() -> Vec<PathComponent> {
    vec![
        PathComponent::parse("profile(alice)").unwrap(),
        PathComponent::parse("name").unwrap(),
    ]
}

fn value_at(tree: &mut StateTree) -> Option<AttributeValue> {
    let name = tree
        .find(&Oid::parse("/profile(alice)/name").unwrap())
        .unwrap()?;
    tree.get(name).unwrap()
}

proptest! {
    #[test]
    fn prop_newest_timestamp_wins(
        records in prop::collection::vec((0u64..20, any::<i32>()), 1..16),
    ) {
        let mut tree = StateTree::new();
        let root = tree.root();
        for (timestamp, value) in &records {
            let delta = Delta::value(path(), TimestampedValue::new(*value, *timestamp));
            tree.merge(root, &delta).unwrap();
        }

        let newest = records.iter().map(|(timestamp, _)| *timestamp).max().unwrap();
        let winner = records
            .iter()
            .find(|(timestamp, _)| *timestamp == newest)
            .map(|(_, value)| AttributeValue::from(*value));
        prop_assert_eq!(value_at(&mut tree), winner);
    }

    #[test]
    fn prop_older_values_never_change_get(
        current in 10u64..1000,
        age in 1u64..10,
        value in any::<i32>(),
        stale in any::<i32>(),
    ) {
        let mut tree = StateTree::new();
        let root = tree.root();
        tree.merge(root, &Delta::value(path(), TimestampedValue::new(value, current)))
            .unwrap();

        let changed = tree
            .merge(root, &Delta::value(path(), TimestampedValue::new(stale, current - age)))
            .unwrap();
        prop_assert!(!changed);
        prop_assert_eq!(value_at(&mut tree), Some(AttributeValue::from(value)));
    }
}
