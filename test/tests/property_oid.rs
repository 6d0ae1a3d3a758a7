/// PROPERTY-BASED TESTS: Oid invariants
///
/// Key invariants:
/// 1. The canonical text of an Oid parses back to the same Oid
/// 2. `a.is_ancestor_of(b)` exactly when `b.is_descendant_of(a)`
/// 3. Every parent is an ancestor, and relative paths rebuild the descendant

use proptest::prelude::*;

use meshnet_shared::Oid;

fn element_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,7}"
}

fn segment_strategy() -> impl Strategy<Value = String> {
    (element_strategy(), prop::option::of("[A-Za-z0-9.]{1,6}")).prop_map(|(element, id)| {
        match id {
            Some(id) => format!("{}({})", element, id),
            None => element,
        }
    })
}

fn oid_strategy() -> impl Strategy<Value = Oid> {
    (
        prop::option::of("[a-z]{1,6}(\\.[a-z]{1,6})?"),
        prop::collection::vec(segment_strategy(), 0..6),
    )
        .prop_map(|(namespace, segments)| {
            let path = format!("/{}", segments.join("/"));
            let text = match namespace {
                Some(namespace) => format!("{}:{}", namespace, path),
                None => path,
            };
            Oid::parse(&text).unwrap()
        })
}

proptest! {
    #[test]
    fn prop_canonical_text_round_trips(oid in oid_strategy()) {
        let text = oid.to_string();
        prop_assert_eq!(Oid::parse(&text), Ok(oid));
    }

    #[test]
    fn prop_ancestry_is_dual(a in oid_strategy(), b in oid_strategy()) {
        prop_assert_eq!(a.is_ancestor_of(&b), b.is_descendant_of(&a));
    }

    #[test]
    fn prop_parents_are_ancestors(oid in oid_strategy()) {
        let mut current = oid.clone();
        while let Some(parent) = current.parent() {
            prop_assert!(parent.is_ancestor_of(&oid));
            prop_assert!(oid.is_descendant_of(&parent));
            let relative = oid.relative_path_from(&parent).unwrap();
            prop_assert_eq!(parent.extend(&relative), oid.clone());
            current = parent;
        }
        prop_assert!(current.path().is_empty());
    }

    #[test]
    fn prop_extending_makes_a_descendant(
        oid in oid_strategy(),
        segments in prop::collection::vec(element_strategy(), 1..4),
    ) {
        let child = oid.relative(&segments.join("/"));
        prop_assert!(child.is_descendant_of(&oid));
        prop_assert!(!oid.is_descendant_of(&child));
        prop_assert_eq!(child.path().len(), oid.path().len() + segments.len());
    }
}
