//! Database facade: an engine plus its current table configuration.

use crate::config::{StoreConfigMap, TableConfig, TableConfigMap};
use crate::error::{CoreError, CoreResult};
use crate::mapping::register_classes;
use crate::migrate::configure_stores;
use crate::view::TableView;
use tabula_engine::Engine;
use tracing::info;

/// An open database.
///
/// Holds the live [`Engine`] and the configuration it was last migrated
/// to; [`upgrade`](crate::upgrade) and friends consume a database and hand
/// back one carrying the merged configuration. Clones share the same
/// engine.
#[derive(Debug, Clone)]
pub struct Database {
    engine: Engine,
    configs: TableConfigMap,
}

impl Database {
    /// Opens a fresh database at version 1 with the given tables.
    ///
    /// # Errors
    ///
    /// Returns an error when a table configuration fails to apply.
    pub fn open(name: &str, configs: TableConfigMap) -> CoreResult<Self> {
        Self::open_with_version(name, configs, 1)
    }

    /// Opens a fresh database at an explicit starting version.
    ///
    /// # Errors
    ///
    /// Same as [`Database::open`].
    pub fn open_with_version(
        name: &str,
        configs: TableConfigMap,
        version: u64,
    ) -> CoreResult<Self> {
        let engine = Engine::new(name);
        let stores: StoreConfigMap = configs
            .iter()
            .map(|(name, config)| (name.clone(), Some(config.clone())))
            .collect();
        configure_stores(&engine, version, &stores, None)?;
        register_classes(&engine, &stores)?;
        info!(db = name, version, tables = configs.len(), "database open");
        Ok(Self { engine, configs })
    }

    /// The database name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.engine.name()
    }

    /// The current schema version.
    #[must_use]
    pub fn verno(&self) -> u64 {
        self.engine.verno()
    }

    /// The underlying engine.
    #[must_use]
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// The configuration the database currently runs under.
    #[must_use]
    pub fn configs(&self) -> &TableConfigMap {
        &self.configs
    }

    /// The configuration of one table, if it exists.
    #[must_use]
    pub fn config(&self, table: &str) -> Option<&TableConfig> {
        self.configs.get(table)
    }

    /// Returns a view over the named table.
    ///
    /// # Errors
    ///
    /// Returns `TableNotFound` when no such table exists.
    pub fn table(&self, name: &str) -> CoreResult<TableView> {
        match self.engine.table(name) {
            Ok(table) => Ok(TableView::new(table)),
            Err(_) => Err(CoreError::TableNotFound {
                name: name.to_string(),
            }),
        }
    }

    /// Names of all tables, sorted.
    #[must_use]
    pub fn table_names(&self) -> Vec<String> {
        self.engine.table_names()
    }

    pub(crate) fn with_configs(self, configs: TableConfigMap) -> Self {
        Self {
            engine: self.engine,
            configs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::TableBuilder;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Book {
        id: i64,
        title: String,
    }

    fn configs() -> TableConfigMap {
        let mut configs = TableConfigMap::new();
        configs.insert(
            "books".to_string(),
            TableBuilder::mapped::<Book>()
                .auto_key("id")
                .index("title")
                .unwrap()
                .build(),
        );
        configs.insert(
            "notes".to_string(),
            TableBuilder::new().hidden_auto_key().build(),
        );
        configs
    }

    #[test]
    fn open_creates_tables_at_version_one() {
        let db = Database::open("lib", configs()).unwrap();
        assert_eq!(db.name(), "lib");
        assert_eq!(db.verno(), 1);
        assert_eq!(db.table_names(), ["books", "notes"]);
        assert!(db.config("books").is_some());
    }

    #[test]
    fn open_with_version_starts_elsewhere() {
        let db = Database::open_with_version("lib", configs(), 3).unwrap();
        assert_eq!(db.verno(), 3);
    }

    #[test]
    fn unknown_table_is_reported() {
        let db = Database::open("lib", configs()).unwrap();
        assert!(matches!(
            db.table("missing").unwrap_err(),
            CoreError::TableNotFound { name } if name == "missing"
        ));
    }

    #[test]
    fn mapped_table_materializes_rows() {
        let db = Database::open("lib", configs()).unwrap();
        let books = db.table("books").unwrap();
        let key = books.add(json!({"title": "Orlando"})).unwrap();
        let book: Book = books.get_mapped(&key).unwrap().unwrap();
        assert_eq!(
            book,
            Book {
                id: 1,
                title: "Orlando".to_string()
            }
        );
    }

    #[test]
    fn clones_share_the_engine() {
        let db = Database::open("lib", configs()).unwrap();
        let other = db.clone();
        other.table("notes").unwrap().add(json!({"body": "x"})).unwrap();
        assert_eq!(db.table("notes").unwrap().count(), 1);
    }
}
