//! Compilation of table configurations into engine schema strings.
//!
//! The engine's store declarations are plain strings; this module flattens
//! a [`TableConfig`] into that form. A `None` configuration compiles to a
//! `None` schema, which the engine takes as a deletion marker.

use crate::config::{StoreConfigMap, TableConfig};
use std::collections::BTreeMap;

/// Compiles one table configuration into a schema string.
///
/// The primary-key token comes first: the path (empty for outbound keys,
/// bracketed for compound keys), prefixed with `++` when auto-increment.
/// Index tokens follow in registration order, comma-separated.
#[must_use]
pub fn compile_schema(config: &TableConfig) -> String {
    let mut schema = String::new();
    if config.pk.auto {
        schema.push_str("++");
    }
    if let Some(path) = &config.pk.path {
        schema.push_str(path);
    }
    let indices = config.indices_schema();
    if !indices.is_empty() {
        schema.push(',');
        schema.push_str(&indices);
    }
    schema
}

/// Compiles a whole store configuration map into engine store declarations.
///
/// Entry order is preserved by the map's key ordering; `None` entries pass
/// through as `None`.
#[must_use]
pub fn build_stores(configs: &StoreConfigMap) -> BTreeMap<String, Option<String>> {
    configs
        .iter()
        .map(|(name, config)| (name.clone(), config.as_ref().map(compile_schema)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::TableBuilder;
    use crate::config::{IndexSpec, PkSpec};
    use tabula_engine::TableSchema;

    fn config(path: Option<&str>, auto: bool, indices: Vec<IndexSpec>) -> TableConfig {
        TableConfig {
            pk: PkSpec {
                path: path.map(str::to_string),
                auto,
            },
            indices,
            class: None,
        }
    }

    fn single(path: &str) -> IndexSpec {
        IndexSpec::Single {
            path: path.to_string(),
            unique: false,
        }
    }

    #[test]
    fn auto_key_without_indices() {
        assert_eq!(compile_schema(&config(Some("id"), true, vec![])), "++id");
    }

    #[test]
    fn explicit_key_with_indices() {
        let cfg = config(Some("id"), false, vec![single("a"), single("b")]);
        assert_eq!(compile_schema(&cfg), "id,a,b");
    }

    #[test]
    fn hidden_key_with_index() {
        assert_eq!(
            compile_schema(&config(None, false, vec![single("a")])),
            ",a"
        );
    }

    #[test]
    fn hidden_auto_key_with_indices() {
        let cfg = config(None, true, vec![single("a"), single("b")]);
        assert_eq!(compile_schema(&cfg), "++,a,b");
    }

    #[test]
    fn hidden_key_without_indices_is_empty() {
        assert_eq!(compile_schema(&config(None, false, vec![])), "");
    }

    #[test]
    fn compound_key_and_unique_compound_index() {
        let cfg = TableBuilder::new()
            .compound_key(["a", "b"])
            .unwrap()
            .unique_compound_index(["c", "d"])
            .unwrap()
            .build();
        assert_eq!(compile_schema(&cfg), "[a+b],&[c+d]");
    }

    #[test]
    fn none_config_compiles_to_none() {
        let mut configs = StoreConfigMap::new();
        configs.insert("gone".to_string(), None);
        configs.insert(
            "kept".to_string(),
            Some(TableBuilder::new().auto_key("id").build()),
        );

        let stores = build_stores(&configs);
        assert_eq!(stores["gone"], None);
        assert_eq!(stores["kept"].as_deref(), Some("++id"));
    }

    #[test]
    fn build_stores_is_pure() {
        let mut configs = StoreConfigMap::new();
        configs.insert(
            "books".to_string(),
            Some(TableBuilder::new().auto_key("id").index("a").unwrap().build()),
        );
        assert_eq!(build_stores(&configs), build_stores(&configs));
    }

    #[test]
    fn compiled_schemas_parse_in_the_engine() {
        let cfg = TableBuilder::new()
            .auto_key("id")
            .index("title")
            .unwrap()
            .unique_index("isbn")
            .unwrap()
            .multi_index("tags")
            .unwrap()
            .compound_index(["author", "year"])
            .unwrap()
            .build();
        let schema = compile_schema(&cfg);
        let parsed = TableSchema::parse(&schema).unwrap();
        assert_eq!(parsed.to_string(), schema);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn path() -> impl Strategy<Value = String> {
            "[a-z][a-z0-9_]{0,6}"
        }

        fn index_spec() -> impl Strategy<Value = IndexSpec> {
            prop_oneof![
                (path(), any::<bool>()).prop_map(|(path, unique)| IndexSpec::Single {
                    path,
                    unique
                }),
                (path(), any::<bool>()).prop_map(|(path, unique)| IndexSpec::Multi {
                    path,
                    unique
                }),
                (proptest::collection::vec(path(), 2..4), any::<bool>()).prop_filter_map(
                    "distinct paths",
                    |(paths, unique)| {
                        let mut seen = paths.clone();
                        seen.sort();
                        seen.dedup();
                        (seen.len() == paths.len())
                            .then_some(IndexSpec::Compound { paths, unique })
                    }
                ),
            ]
        }

        proptest! {
            // Every compiled schema must round-trip through the engine's
            // parser unchanged.
            #[test]
            fn compiled_schema_always_parses(
                pk_path in proptest::option::of(path()),
                auto in any::<bool>(),
                indices in proptest::collection::vec(index_spec(), 0..5),
            ) {
                let mut distinct = Vec::new();
                for spec in indices {
                    if !distinct.iter().any(|d: &IndexSpec| d.same_target(&spec)) {
                        if let Some(pk) = &pk_path {
                            if matches!(&spec,
                                IndexSpec::Single { path, .. } | IndexSpec::Multi { path, .. }
                                if path == pk)
                            {
                                continue;
                            }
                        }
                        distinct.push(spec);
                    }
                }
                let cfg = TableConfig {
                    pk: PkSpec { path: pk_path, auto },
                    indices: distinct,
                    class: None,
                };
                let schema = compile_schema(&cfg);
                let parsed = TableSchema::parse(&schema).unwrap();
                prop_assert_eq!(parsed.to_string(), schema);
            }
        }
    }
}
