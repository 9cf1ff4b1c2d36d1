//! Engine handle and versioned schema transitions.

use crate::error::{EngineError, EngineResult};
use crate::schema::TableSchema;
use crate::table::{Table, TableState};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Callback run once during a version transition, against the tables of the
/// version being created.
pub type UpgradeFn = Box<dyn FnOnce(&UpgradeTx) -> EngineResult<()> + Send>;

/// An in-memory versioned table engine.
///
/// The engine owns a set of named tables and a schema version counter.
/// Schema changes go through [`Engine::version`]: declare the target
/// version, supply schema strings per table, optionally register an
/// upgrade callback, and run the transition. Transitions are serialized
/// and atomic: a failed transition leaves tables and the version counter
/// exactly as they were.
///
/// Handles are cheap to clone and share the same engine.
///
/// # Example
///
/// ```rust
/// use tabula_engine::Engine;
/// use std::collections::BTreeMap;
///
/// let engine = Engine::new("library");
/// let stores = BTreeMap::from([("books".to_string(), Some("++id,title".to_string()))]);
/// engine.version(1).stores(stores).run().unwrap();
/// assert_eq!(engine.verno(), 1);
/// ```
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    name: String,
    verno: RwLock<u64>,
    tables: RwLock<BTreeMap<String, Table>>,
    /// Serializes version transitions; only one may be in flight.
    transition: Mutex<()>,
}

impl Engine {
    /// Creates an empty engine at version 0.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                name: name.to_string(),
                verno: RwLock::new(0),
                tables: RwLock::new(BTreeMap::new()),
                transition: Mutex::new(()),
            }),
        }
    }

    /// Returns the engine name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Returns the currently applied schema version. 0 means no version has
    /// been applied yet.
    #[must_use]
    pub fn verno(&self) -> u64 {
        *self.inner.verno.read()
    }

    /// Begins declaring version `n`.
    ///
    /// Nothing happens until [`VersionDecl::run`] is called.
    #[must_use]
    pub fn version(&self, n: u64) -> VersionDecl {
        VersionDecl {
            engine: self.clone(),
            version: n,
            stores: BTreeMap::new(),
            upgrade: None,
        }
    }

    /// Looks up a table by name.
    ///
    /// # Errors
    ///
    /// Returns `TableNotFound` when no such table exists.
    pub fn table(&self, name: &str) -> EngineResult<Table> {
        self.inner
            .tables
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::TableNotFound {
                name: name.to_string(),
            })
    }

    /// Returns the names of all live tables.
    #[must_use]
    pub fn table_names(&self) -> Vec<String> {
        self.inner.tables.read().keys().cloned().collect()
    }
}

/// A pending version declaration.
///
/// Built from [`Engine::version`]; accumulates schema strings and an
/// optional upgrade callback, then applies them with [`VersionDecl::run`].
pub struct VersionDecl {
    engine: Engine,
    version: u64,
    stores: BTreeMap<String, Option<String>>,
    upgrade: Option<UpgradeFn>,
}

impl VersionDecl {
    /// Adds schema strings for this version.
    ///
    /// `Some(schema)` creates the table or re-declares its schema (rows are
    /// kept); `None` deletes the table.
    #[must_use]
    pub fn stores(mut self, stores: BTreeMap<String, Option<String>>) -> Self {
        self.stores.extend(stores);
        self
    }

    /// Registers the upgrade callback for this version.
    ///
    /// The callback runs exactly once, during [`VersionDecl::run`], after
    /// schema changes are applied and before the version counter advances.
    #[must_use]
    pub fn upgrade(mut self, f: UpgradeFn) -> Self {
        self.upgrade = Some(f);
        self
    }

    /// Applies the version transition.
    ///
    /// The transition is atomic: schema parse failures happen before any
    /// mutation, and an upgrade-callback failure rolls every table back and
    /// leaves the version counter unchanged.
    ///
    /// # Errors
    ///
    /// Returns `VersionConflict` when the target version is not greater
    /// than the current one, `InvalidSchema` for malformed schema strings,
    /// or whatever error the upgrade callback reported.
    pub fn run(self) -> EngineResult<()> {
        let inner = &self.engine.inner;
        let _guard = inner.transition.lock();

        let current = *inner.verno.read();
        if self.version <= current {
            return Err(EngineError::VersionConflict {
                requested: self.version,
                current,
            });
        }

        // Validate every schema before touching any table.
        let mut parsed: BTreeMap<String, Option<TableSchema>> = BTreeMap::new();
        for (name, schema) in &self.stores {
            let schema = schema
                .as_deref()
                .map(TableSchema::parse)
                .transpose()?;
            parsed.insert(name.clone(), schema);
        }

        let snapshot: Vec<(String, Table, TableState)> = inner
            .tables
            .read()
            .iter()
            .map(|(name, table)| (name.clone(), table.clone(), table.snapshot()))
            .collect();

        {
            let mut tables = inner.tables.write();
            for (name, schema) in parsed {
                match schema {
                    None => {
                        tables.remove(&name);
                        debug!(table = %name, version = self.version, "dropped table");
                    }
                    Some(schema) => match tables.get(&name) {
                        Some(table) => {
                            table.replace_schema(schema);
                            debug!(table = %name, version = self.version, "re-declared table");
                        }
                        None => {
                            tables.insert(name.clone(), Table::create(&name, schema));
                            debug!(table = %name, version = self.version, "created table");
                        }
                    },
                }
            }
        }

        if let Some(upgrade) = self.upgrade {
            let tx = UpgradeTx {
                version: self.version,
                tables: inner.tables.read().clone(),
            };
            if let Err(e) = upgrade(&tx) {
                warn!(version = self.version, error = %e, "upgrade failed, rolling back");
                let mut tables = inner.tables.write();
                tables.clear();
                for (name, table, state) in snapshot {
                    table.restore(state);
                    tables.insert(name, table);
                }
                return Err(e);
            }
        }

        *inner.verno.write() = self.version;
        info!(version = self.version, "version transition applied");
        Ok(())
    }
}

/// Transaction-scoped view handed to an upgrade callback.
///
/// Exposes exactly the tables live in the version being created; a table
/// deleted at this version is not reachable.
pub struct UpgradeTx {
    version: u64,
    tables: BTreeMap<String, Table>,
}

impl UpgradeTx {
    /// The version being transitioned into.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Looks up a table by name.
    ///
    /// # Errors
    ///
    /// Returns `TableNotFound` for tables outside this version's set.
    pub fn table(&self, name: &str) -> EngineResult<Table> {
        self.tables
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::TableNotFound {
                name: name.to_string(),
            })
    }

    /// Returns the names of the tables in this version's set.
    #[must_use]
    pub fn table_names(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("name", &self.inner.name)
            .field("verno", &self.verno())
            .field("tables", &self.table_names())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Key;
    use serde_json::json;

    fn stores(entries: &[(&str, Option<&str>)]) -> BTreeMap<String, Option<String>> {
        entries
            .iter()
            .map(|(name, schema)| ((*name).to_string(), schema.map(str::to_string)))
            .collect()
    }

    #[test]
    fn fresh_engine_is_version_zero() {
        let engine = Engine::new("db");
        assert_eq!(engine.verno(), 0);
        assert!(engine.table_names().is_empty());
        assert!(matches!(
            engine.table("missing"),
            Err(EngineError::TableNotFound { .. })
        ));
    }

    #[test]
    fn first_transition_creates_tables() {
        let engine = Engine::new("db");
        engine
            .version(1)
            .stores(stores(&[("books", Some("++id,title")), ("logs", Some("++"))]))
            .run()
            .unwrap();
        assert_eq!(engine.verno(), 1);
        assert_eq!(engine.table_names(), vec!["books", "logs"]);
    }

    #[test]
    fn stale_version_is_rejected() {
        let engine = Engine::new("db");
        engine
            .version(2)
            .stores(stores(&[("a", Some("++id"))]))
            .run()
            .unwrap();
        let result = engine.version(2).stores(stores(&[("b", Some("++id"))])).run();
        assert!(matches!(
            result,
            Err(EngineError::VersionConflict {
                requested: 2,
                current: 2
            })
        ));
        assert!(engine.table("b").is_err());
    }

    #[test]
    fn version_gaps_are_permitted() {
        let engine = Engine::new("db");
        engine
            .version(1)
            .stores(stores(&[("a", Some("++id"))]))
            .run()
            .unwrap();
        engine.version(5).stores(stores(&[])).run().unwrap();
        assert_eq!(engine.verno(), 5);
    }

    #[test]
    fn null_store_deletes_table() {
        let engine = Engine::new("db");
        engine
            .version(1)
            .stores(stores(&[("a", Some("++id")), ("b", Some("++id"))]))
            .run()
            .unwrap();
        engine.version(2).stores(stores(&[("b", None)])).run().unwrap();
        assert!(engine.table("a").is_ok());
        assert!(engine.table("b").is_err());
    }

    #[test]
    fn rows_survive_schema_redeclaration() {
        let engine = Engine::new("db");
        engine
            .version(1)
            .stores(stores(&[("a", Some("++id,x"))]))
            .run()
            .unwrap();
        let key = engine.table("a").unwrap().add(json!({"x": 1})).unwrap();

        engine
            .version(2)
            .stores(stores(&[("a", Some("++id,x,y"))]))
            .run()
            .unwrap();
        assert!(engine.table("a").unwrap().get(&key).is_some());
    }

    #[test]
    fn handles_stay_live_across_redeclaration() {
        let engine = Engine::new("db");
        engine
            .version(1)
            .stores(stores(&[("a", Some("++id"))]))
            .run()
            .unwrap();
        let table = engine.table("a").unwrap();
        engine
            .version(2)
            .stores(stores(&[("a", Some("++id,x"))]))
            .run()
            .unwrap();
        // old handle observes the new schema
        assert_eq!(table.schema().indexes.len(), 1);
    }

    #[test]
    fn invalid_schema_fails_before_any_change() {
        let engine = Engine::new("db");
        engine
            .version(1)
            .stores(stores(&[("a", Some("++id"))]))
            .run()
            .unwrap();
        let result = engine
            .version(2)
            .stores(stores(&[("b", Some("++id")), ("c", Some("id,[x]"))]))
            .run();
        assert!(matches!(result, Err(EngineError::InvalidSchema { .. })));
        assert_eq!(engine.verno(), 1);
        assert!(engine.table("b").is_err());
    }

    #[test]
    fn upgrade_callback_sees_new_tables_and_data() {
        let engine = Engine::new("db");
        engine
            .version(1)
            .stores(stores(&[("a", Some("++id,n"))]))
            .run()
            .unwrap();
        engine.table("a").unwrap().add(json!({"n": 1})).unwrap();

        engine
            .version(2)
            .stores(stores(&[("b", Some("++id"))]))
            .upgrade(Box::new(|tx| {
                assert_eq!(tx.version(), 2);
                assert_eq!(tx.table_names(), vec!["a", "b"]);
                tx.table("a")?.modify(|_, row| row["n"] = json!(100));
                Ok(())
            }))
            .run()
            .unwrap();

        let row = engine.table("a").unwrap().get(&Key::Int(1)).unwrap();
        assert_eq!(row["n"], json!(100));
    }

    #[test]
    fn failed_upgrade_rolls_everything_back() {
        let engine = Engine::new("db");
        engine
            .version(1)
            .stores(stores(&[("a", Some("++id,n")), ("old", Some("++id"))]))
            .run()
            .unwrap();
        engine.table("a").unwrap().add(json!({"n": 1})).unwrap();

        let result = engine
            .version(2)
            .stores(stores(&[("b", Some("++id")), ("old", None)]))
            .upgrade(Box::new(|tx| {
                tx.table("a")?.modify(|_, row| row["n"] = json!(999));
                Err(EngineError::upgrade_failed("boom"))
            }))
            .run();

        assert!(matches!(result, Err(EngineError::UpgradeFailed { .. })));
        assert_eq!(engine.verno(), 1);
        // mutation rolled back
        let row = engine.table("a").unwrap().get(&Key::Int(1)).unwrap();
        assert_eq!(row["n"], json!(1));
        // created table gone, deleted table restored
        assert!(engine.table("b").is_err());
        assert!(engine.table("old").is_ok());
    }

    #[test]
    fn deleted_table_is_invisible_to_upgrade_callback() {
        let engine = Engine::new("db");
        engine
            .version(1)
            .stores(stores(&[("gone", Some("++id"))]))
            .run()
            .unwrap();
        engine
            .version(2)
            .stores(stores(&[("gone", None), ("kept", Some("++id"))]))
            .upgrade(Box::new(|tx| {
                assert!(tx.table("gone").is_err());
                assert!(tx.table("kept").is_ok());
                Ok(())
            }))
            .run()
            .unwrap();
    }
}
