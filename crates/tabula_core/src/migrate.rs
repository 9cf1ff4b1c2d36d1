//! Versioned schema migration.
//!
//! An upgrade takes an open [`Database`] and a map of changed table
//! configurations. The change map is merged over the database's current
//! configuration: entries absent from the change map pass through, `Some`
//! entries replace, and `None` entries tombstone the table so the engine
//! deletes its store. The merged result becomes the database's new
//! configuration.
//!
//! Four entry points cover the version/callback combinations. When no
//! version is given the upgrade targets the current version plus one;
//! explicit versions may skip numbers but must increase.

use crate::config::{StoreConfigMap, TableConfigMap};
use crate::database::Database;
use crate::error::CoreResult;
use crate::mapping::register_classes;
use crate::stores::build_stores;
use tabula_engine::{Engine, EngineResult, UpgradeFn, UpgradeTx};
use tracing::info;

/// Upgrades to the next version with the given configuration changes.
///
/// # Errors
///
/// Returns any engine error from the version transition; the database is
/// left on its previous version and configuration in that case.
pub fn upgrade(db: Database, changes: StoreConfigMap) -> CoreResult<Database> {
    apply_upgrade(db, changes, None, None)
}

/// Upgrades to the next version, running `run` inside the transition.
///
/// The callback observes the post-change schema and may rewrite rows; an
/// error from it rolls the whole transition back.
///
/// # Errors
///
/// Same as [`upgrade`], plus any error the callback returns.
pub fn upgrade_with<F>(db: Database, changes: StoreConfigMap, run: F) -> CoreResult<Database>
where
    F: FnOnce(&UpgradeTx) -> EngineResult<()> + Send + 'static,
{
    apply_upgrade(db, changes, None, Some(Box::new(run)))
}

/// Upgrades to an explicit version with the given configuration changes.
///
/// # Errors
///
/// Same as [`upgrade`]; a version at or below the current one is rejected
/// by the engine.
pub fn upgrade_to(db: Database, changes: StoreConfigMap, version: u64) -> CoreResult<Database> {
    apply_upgrade(db, changes, Some(version), None)
}

/// Upgrades to an explicit version, running `run` inside the transition.
///
/// # Errors
///
/// Same as [`upgrade_to`], plus any error the callback returns.
pub fn upgrade_to_with<F>(
    db: Database,
    changes: StoreConfigMap,
    version: u64,
    run: F,
) -> CoreResult<Database>
where
    F: FnOnce(&UpgradeTx) -> EngineResult<()> + Send + 'static,
{
    apply_upgrade(db, changes, Some(version), Some(Box::new(run)))
}

fn apply_upgrade(
    db: Database,
    changes: StoreConfigMap,
    version: Option<u64>,
    run: Option<UpgradeFn>,
) -> CoreResult<Database> {
    let version = version.unwrap_or_else(|| db.verno() + 1);
    let merged = merge_configs(db.configs(), &changes);

    // Surviving tables get their full (merged) schema; tombstones from the
    // change map are forwarded so the engine drops the stores.
    let mut stores: StoreConfigMap = merged
        .iter()
        .map(|(name, config)| (name.clone(), Some(config.clone())))
        .collect();
    for (name, config) in &changes {
        if config.is_none() {
            stores.insert(name.clone(), None);
        }
    }

    configure_stores(db.engine(), version, &stores, run)?;
    register_classes(db.engine(), &stores)?;
    info!(db = db.name(), version, "upgrade complete");
    Ok(db.with_configs(merged))
}

/// Merges a change map over the current configuration.
///
/// Unmentioned entries pass through, `Some` replaces, `None` removes.
#[must_use]
pub fn merge_configs(current: &TableConfigMap, changes: &StoreConfigMap) -> TableConfigMap {
    let mut merged = current.clone();
    for (name, change) in changes {
        match change {
            Some(config) => {
                merged.insert(name.clone(), config.clone());
            }
            None => {
                merged.remove(name);
            }
        }
    }
    merged
}

/// Declares and runs one engine version transition for `configs`.
pub(crate) fn configure_stores(
    engine: &Engine,
    version: u64,
    configs: &StoreConfigMap,
    run: Option<UpgradeFn>,
) -> CoreResult<()> {
    let mut decl = engine.version(version).stores(build_stores(configs));
    if let Some(run) = run {
        decl = decl.upgrade(run);
    }
    decl.run()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::TableBuilder;
    use crate::error::CoreError;
    use serde_json::json;
    use tabula_engine::{set_at_path, value_at_path, EngineError, Key};

    fn two_table_db() -> Database {
        let mut configs = TableConfigMap::new();
        configs.insert(
            "authors".to_string(),
            TableBuilder::new().auto_key("id").index("name").unwrap().build(),
        );
        configs.insert(
            "books".to_string(),
            TableBuilder::new().auto_key("id").index("title").unwrap().build(),
        );
        Database::open("migrate-test", configs).unwrap()
    }

    #[test]
    fn merge_keeps_replaces_and_removes() {
        let mut current = TableConfigMap::new();
        current.insert("a".to_string(), TableBuilder::new().auto_key("id").build());
        current.insert("b".to_string(), TableBuilder::new().auto_key("id").build());

        let mut changes = StoreConfigMap::new();
        changes.insert("b".to_string(), None);
        changes.insert(
            "c".to_string(),
            Some(TableBuilder::new().primary_key("key").build()),
        );

        let merged = merge_configs(&current, &changes);
        let names: Vec<&str> = merged.keys().map(String::as_str).collect();
        assert_eq!(names, ["a", "c"]);
    }

    #[test]
    fn implicit_version_is_current_plus_one() {
        let db = two_table_db();
        assert_eq!(db.verno(), 1);
        let db = upgrade(db, StoreConfigMap::new()).unwrap();
        assert_eq!(db.verno(), 2);
    }

    #[test]
    fn explicit_version_may_skip() {
        let db = two_table_db();
        let db = upgrade_to(db, StoreConfigMap::new(), 7).unwrap();
        assert_eq!(db.verno(), 7);
        let db = upgrade(db, StoreConfigMap::new()).unwrap();
        assert_eq!(db.verno(), 8);
    }

    #[test]
    fn stale_version_is_rejected() {
        let db = upgrade_to(two_table_db(), StoreConfigMap::new(), 3).unwrap();
        let err = upgrade_to(db, StoreConfigMap::new(), 3).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Engine(EngineError::VersionConflict { requested: 3, current: 3 })
        ));
    }

    #[test]
    fn unmentioned_tables_survive_with_rows() {
        let db = two_table_db();
        db.table("authors")
            .unwrap()
            .add(json!({"name": "Woolf"}))
            .unwrap();

        let mut changes = StoreConfigMap::new();
        changes.insert(
            "reviews".to_string(),
            Some(TableBuilder::new().hidden_auto_key().build()),
        );
        let db = upgrade(db, changes).unwrap();

        assert_eq!(db.table("authors").unwrap().count(), 1);
        assert_eq!(db.table("reviews").unwrap().count(), 0);
    }

    #[test]
    fn tombstone_deletes_the_store() {
        let db = two_table_db();
        let mut changes = StoreConfigMap::new();
        changes.insert("books".to_string(), None);
        let db = upgrade(db, changes).unwrap();

        assert!(matches!(
            db.table("books").unwrap_err(),
            CoreError::Engine(EngineError::TableNotFound { .. })
        ));
        assert!(!db.configs().contains_key("books"));
        assert!(db.configs().contains_key("authors"));
    }

    #[test]
    fn callback_rewrites_rows_under_the_new_schema() {
        let db = two_table_db();
        db.table("books")
            .unwrap()
            .add(json!({"title": "Orlando"}))
            .unwrap();

        let mut changes = StoreConfigMap::new();
        changes.insert(
            "books".to_string(),
            Some(
                TableBuilder::new()
                    .auto_key("id")
                    .index("title")
                    .unwrap()
                    .index("year")
                    .unwrap()
                    .build(),
            ),
        );
        let db = upgrade_with(db, changes, |tx| {
            tx.table("books")?.modify(|_, row| {
                if value_at_path(row, "year").is_none() {
                    set_at_path(row, "year", json!(0));
                }
            });
            Ok(())
        })
        .unwrap();

        let row = db.table("books").unwrap().get(&Key::Int(1)).unwrap();
        assert_eq!(row["year"], json!(0));
    }

    #[test]
    fn failed_callback_rolls_everything_back() {
        let db = two_table_db();
        db.table("books")
            .unwrap()
            .add(json!({"title": "Orlando"}))
            .unwrap();

        let mut changes = StoreConfigMap::new();
        changes.insert("authors".to_string(), None);
        let err = upgrade_with(db.clone(), changes, |_| {
            Err(EngineError::upgrade_failed("backfill exploded"))
        })
        .unwrap_err();
        assert!(matches!(
            err,
            CoreError::Engine(EngineError::UpgradeFailed { .. })
        ));

        // version, schema, and rows all untouched
        assert_eq!(db.verno(), 1);
        assert_eq!(db.table("authors").unwrap().count(), 0);
        assert_eq!(db.table("books").unwrap().count(), 1);
        assert!(db.configs().contains_key("authors"));
    }

    #[test]
    fn upgrade_to_with_combines_version_and_callback() {
        let db = two_table_db();
        let db = upgrade_to_with(db, StoreConfigMap::new(), 5, |tx| {
            assert_eq!(tx.version(), 5);
            Ok(())
        })
        .unwrap();
        assert_eq!(db.verno(), 5);
    }

    #[test]
    fn deleted_table_is_invisible_to_the_callback() {
        let db = two_table_db();
        let mut changes = StoreConfigMap::new();
        changes.insert("books".to_string(), None);
        upgrade_with(db, changes, |tx| {
            assert!(tx.table("books").is_err());
            assert!(tx.table("authors").is_ok());
            Ok(())
        })
        .unwrap();
    }
}
