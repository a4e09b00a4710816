//! Property tests for schema layout, numeric modes and sequence atomicity.

use std::collections::BTreeSet;

use proptest::prelude::*;

use atomrt_core::{Atom, ClassSchema, Member, Value};

fn attribute_names() -> impl Strategy<Value = Vec<String>> {
    prop::collection::btree_set("[a-z][a-z0-9_]{0,12}", 0..40)
        .prop_map(|names: BTreeSet<String>| names.into_iter().collect())
}

fn value() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::None),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Int),
        any::<f64>().prop_map(Value::Float),
        "[a-z]{0,8}".prop_map(Value::Str),
    ]
}

proptest! {
    /// Lookup agrees with declaration order and slots are a dense permutation.
    #[test]
    fn lookup_matches_declaration_order(names in attribute_names()) {
        let schema = ClassSchema::build(
            "Generated",
            names.iter().map(|n| (n.clone(), Member::no_op())),
        ).unwrap();

        prop_assert_eq!(schema.count(), names.len());
        prop_assert!(schema.table_capacity().is_power_of_two());
        prop_assert!(schema.count() * 4 <= schema.table_capacity() * 3);

        let mut seen = vec![false; names.len()];
        for (i, name) in names.iter().enumerate() {
            let (member, slot) = schema.lookup(name).unwrap();
            prop_assert_eq!(slot, i);
            prop_assert_eq!(member.name(), name.as_str());
            prop_assert!(!seen[slot]);
            seen[slot] = true;
        }
        prop_assert!(seen.into_iter().all(|s| s));
        prop_assert!(schema.lookup("NOT-DECLARED").is_none());
    }

    /// Int mode accepts integers unchanged and rejects everything else.
    #[test]
    fn int_mode_accepts_only_ints(candidate in value()) {
        let schema = ClassSchema::build("I", [("n", Member::int())]).unwrap();
        let atom = Atom::new(&schema);
        let result = atom.set("n", candidate.clone());
        match candidate {
            Value::Int(_) => {
                prop_assert!(result.is_ok());
                prop_assert_eq!(atom.get("n").unwrap(), Some(candidate));
            }
            _ => {
                prop_assert!(result.is_err());
                prop_assert!(!atom.is_set("n").unwrap());
            }
        }
    }

    /// Range bounds are inclusive on both ends.
    #[test]
    fn range_is_inclusive(low in -1000i64..1000, span in 0i64..1000, x in -3000i64..3000) {
        let high = low + span;
        let schema = ClassSchema::build("R", [("v", Member::range(low, high))]).unwrap();
        let atom = Atom::new(&schema);
        prop_assert!(atom.set("v", low).is_ok());
        prop_assert!(atom.set("v", high).is_ok());
        prop_assert_eq!(atom.set("v", x).is_ok(), (low..=high).contains(&x));
    }

    /// Extend commits every element or none of them.
    #[test]
    fn extend_is_all_or_nothing(
        start in prop::collection::vec("[a-z]{1,4}", 0..5),
        batch in prop::collection::vec(prop_oneof![
            "[a-z]{1,4}".prop_map(Value::Str),
            any::<i64>().prop_map(Value::Int),
        ], 0..8),
    ) {
        let schema = ClassSchema::build(
            "S",
            [("tags", Member::container_list(Some(Member::string())))],
        ).unwrap();
        let initial: Vec<Value> = start.iter().map(|s| Value::from(s.as_str())).collect();
        let atom = Atom::with_values(&schema, [("tags", Value::List(initial.clone()))]).unwrap();
        let seq = atom.get("tags").unwrap().unwrap().as_sequence().unwrap().clone();

        let first_bad = batch.iter().position(|v| !matches!(v, Value::Str(_)));
        let result = seq.extend(batch.clone());
        match first_bad {
            Some(position) => {
                let err = result.unwrap_err();
                prop_assert_eq!(err.as_validation().unwrap().element, Some(position));
                prop_assert_eq!(seq.to_vec(), initial);
            }
            None => {
                prop_assert!(result.is_ok());
                let mut expected = initial;
                expected.extend(batch);
                prop_assert_eq!(seq.to_vec(), expected);
            }
        }
    }
}
