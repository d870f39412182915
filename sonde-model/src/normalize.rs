//! Tool argument alias normalization.
//!
//! Weaker backends drift on argument names — `query` instead of
//! `queries`, `thought` instead of `reflection`. Each tool declares an
//! ordered list of `(alias → canonical)` renames; the adapter applies
//! them to every parsed call before dispatch. A rename only happens when
//! the canonical key is absent, which makes the pass idempotent.

use std::collections::BTreeMap;

/// Per-tool alias rules: tool name → ordered `(alias, canonical)` pairs.
pub type AliasTable = BTreeMap<String, Vec<(String, String)>>;

/// Apply the alias rules for `tool` to `arguments`.
///
/// Non-object arguments pass through untouched; the dispatcher rejects
/// them with a message the model can act on.
pub fn normalize_arguments(
    table: &AliasTable,
    tool: &str,
    mut arguments: serde_json::Value,
) -> serde_json::Value {
    let Some(rules) = table.get(tool) else {
        return arguments;
    };
    let Some(map) = arguments.as_object_mut() else {
        return arguments;
    };
    for (alias, canonical) in rules {
        if map.contains_key(canonical) {
            continue;
        }
        if let Some(value) = map.remove(alias) {
            map.insert(canonical.clone(), value);
        }
    }
    arguments
}


#[cfg(test)]
mod props {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// normalize(normalize(x)) == normalize(x) for arbitrary objects.
        #[test]
        fn idempotent_on_arbitrary_objects(
            keys in proptest::collection::vec("[a-z]{1,8}", 0..6),
            values in proptest::collection::vec(any::<i64>(), 6),
        ) {
            let mut table = AliasTable::new();
            table.insert(
                "search".into(),
                vec![
                    ("query".into(), "queries".into()),
                    ("q".into(), "queries".into()),
                ],
            );
            let mut map = serde_json::Map::new();
            for (k, v) in keys.iter().zip(values) {
                map.insert(k.clone(), serde_json::Value::from(v));
            }
            let input = serde_json::Value::Object(map);
            let once = normalize_arguments(&table, "search", input);
            let twice = normalize_arguments(&table, "search", once.clone());
            prop_assert_eq!(once, twice);
        }
    }
}
