use proptest::prelude::*;
use regform_core::prelude::*;
use regform_test_utils::{answers_only, authors_schema, build};
use serde_json::{Map, Value};

#[derive(Debug, Clone)]
enum Op {
    Add,
    Remove(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![Just(Op::Add), (0..8usize).prop_map(Op::Remove)]
}

proptest! {
    #[test]
    fn prop_round_trip_is_idempotent(
        names in proptest::collection::vec(proptest::option::of("[a-z]{1,8}"), 1..6)
    ) {
        let mut data = Map::new();
        for (i, name) in names.iter().enumerate() {
            let value = name.clone().map_or(Value::Null, Value::String);
            data.insert(format!("authors:{i}.name"), value);
        }

        let mut first = build(authors_schema(1, None));
        first.unserialize(&data).unwrap();
        let persisted = answers_only(&mut first);

        let mut second = build(authors_schema(1, None));
        second.unserialize(&persisted).unwrap();

        prop_assert_eq!(answers_only(&mut second), persisted.clone());
        prop_assert_eq!(persisted.len(), names.len());
    }

    #[test]
    fn prop_repeat_bounds_hold(
        min in 0..3usize,
        extra in 0..4usize,
        ops in proptest::collection::vec(op(), 0..24)
    ) {
        let max = min.max(1) + extra;
        let mut doc = build(authors_schema(min, Some(max)));
        let wrapper = doc.lookup("authors").unwrap();

        for op in ops {
            let count = doc.instance_count(wrapper).unwrap();
            prop_assert_eq!(doc.can_add(wrapper), count < max);
            prop_assert_eq!(doc.can_remove(wrapper), count > min);

            match op {
                Op::Add => {
                    let added = doc.add_repeat(wrapper, None, true);
                    prop_assert_eq!(added.is_ok(), count < max);
                }
                Op::Remove(position) => {
                    let Some(&instance) = doc.node(wrapper).unwrap().contents().get(position) else {
                        continue;
                    };
                    let removed = doc.remove_repeat(instance);
                    prop_assert_eq!(removed.is_ok(), count > min);
                }
            }

            let count = doc.instance_count(wrapper).unwrap();
            prop_assert!(count >= min);
            prop_assert!(count <= max);
            for i in 0..count {
                let key = format!("authors:{i}.name");
                prop_assert!(doc.lookup(&key).is_some());
            }
            let past_end = format!("authors:{count}");
            prop_assert!(doc.lookup(&past_end).is_none());

            let mut rebuilt = doc.clone();
            rebuilt.rebuild_index().unwrap();
            prop_assert_eq!(rebuilt.index(), doc.index());
        }
    }
}
