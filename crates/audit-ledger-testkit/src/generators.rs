//! Proptest generators for property-based testing.

use proptest::prelude::*;
use std::collections::BTreeMap;

use audit_ledger_core::{Action, ChangeSet, ChangeValue, PREV_HASH_KEY};

/// A field name. Never the reserved key.
pub fn field_key() -> impl Strategy<Value = String> {
    "[a-z][a-z_]{0,11}".prop_filter("reserved key", |k| k != PREV_HASH_KEY)
}

/// A finite float, including integral values like `3.0`.
pub fn finite_float() -> impl Strategy<Value = f64> {
    prop_oneof![
        (-1.0e12f64..1.0e12f64),
        (-1_000i32..1_000).prop_map(f64::from),
    ]
}

/// A scalar change value.
pub fn scalar() -> impl Strategy<Value = ChangeValue> {
    prop_oneof![
        Just(ChangeValue::Null),
        any::<bool>().prop_map(ChangeValue::Bool),
        any::<i64>().prop_map(ChangeValue::Integer),
        finite_float().prop_map(ChangeValue::Float),
        "[ -~äöüßé\n\t\"\\\\]{0,16}".prop_map(ChangeValue::Text),
    ]
}

/// A change value nested up to three levels deep.
pub fn change_value() -> impl Strategy<Value = ChangeValue> {
    scalar().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(ChangeValue::List),
            prop::collection::btree_map(field_key(), inner, 0..4).prop_map(ChangeValue::Map),
        ]
    })
}

/// A change set with up to six top-level fields.
pub fn change_set() -> impl Strategy<Value = ChangeSet> {
    prop::collection::btree_map(field_key(), change_value(), 0..6)
        .prop_map(|map: BTreeMap<String, ChangeValue>| ChangeSet::from(map))
}

/// A run of change sets for one ledger.
pub fn change_sets(max_len: usize) -> impl Strategy<Value = Vec<ChangeSet>> {
    prop::collection::vec(change_set(), 1..=max_len.max(1))
}

/// An action tag.
pub fn action() -> impl Strategy<Value = Action> {
    prop_oneof![
        Just(Action::Create),
        Just(Action::Update),
        Just(Action::Verify),
        Just(Action::Delete),
        "[a-z]{3,10}".prop_map(|s| Action::from(s.as_str())),
    ]
}

/// Render a change set as JSON text with map keys in reverse order at every level.
///
/// Parsing the result must yield a change set with the same digest.
pub fn to_json_reversed(changes: &ChangeSet) -> String {
    let mut out = String::new();
    write_map_reversed(&mut out, changes.as_map().iter());
    out
}

fn write_map_reversed<'a>(
    out: &mut String,
    entries: impl DoubleEndedIterator<Item = (&'a String, &'a ChangeValue)>,
) {
    out.push('{');
    for (i, (key, value)) in entries.rev().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&serde_json::to_string(key).unwrap_or_default());
        out.push(':');
        write_value_reversed(out, value);
    }
    out.push('}');
}

fn write_value_reversed(out: &mut String, value: &ChangeValue) {
    match value {
        ChangeValue::Map(map) => write_map_reversed(out, map.iter()),
        ChangeValue::List(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value_reversed(out, item);
            }
            out.push(']');
        }
        scalar => out.push_str(&serde_json::to_string(scalar).unwrap_or_default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reversed_json_order() {
        let changes = ChangeSet::new().with("a", 1).with("b", 2);
        assert_eq!(to_json_reversed(&changes), r#"{"b":2,"a":1}"#);
    }

    proptest! {
        #[test]
        fn generated_keys_are_never_reserved(key in field_key()) {
            prop_assert_ne!(key.as_str(), PREV_HASH_KEY);
        }
    }
}
