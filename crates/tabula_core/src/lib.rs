//! # Tabula Core
//!
//! Typed schema layer over the `tabula_engine` table engine.
//!
//! This crate provides:
//! - a two-stage fluent builder ([`TableBuilder`] → [`IndexBuilder`])
//!   that makes malformed table declarations unrepresentable and rejects
//!   inconsistent ones at construction time
//! - compilation of built configurations into the engine's compact schema
//!   strings ([`compile_schema`], [`build_stores`])
//! - versioned migration with configuration merging ([`upgrade`] and
//!   friends): changed tables replace, tombstones delete, everything else
//!   passes through
//! - class mapping, binding a deserialization target per table so reads
//!   come back typed
//! - [`TableView`], the per-table surface with typed insert and equality
//!   query conveniences
//!
//! ## Example
//!
//! ```rust
//! use tabula_core::{Database, TableBuilder, TableConfigMap};
//! use serde_json::json;
//!
//! # fn main() -> Result<(), tabula_core::CoreError> {
//! let mut configs = TableConfigMap::new();
//! configs.insert(
//!     "books".to_string(),
//!     TableBuilder::new()
//!         .auto_key("id")
//!         .index("title")?
//!         .unique_index("isbn")?
//!         .build(),
//! );
//!
//! let db = Database::open("library", configs)?;
//! let books = db.table("books")?;
//! books.add(json!({"title": "Dune", "isbn": "0441"}))?;
//! assert_eq!(books.count(), 1);
//! # Ok(())
//! # }
//! ```

mod builder;
mod config;
mod database;
mod error;
mod mapping;
mod migrate;
mod stores;
mod view;

pub use builder::{IndexBuilder, TableBuilder};
pub use config::{IndexSpec, PkSpec, StoreConfigMap, TableConfig, TableConfigMap};
pub use database::Database;
pub use error::{CoreError, CoreResult};
pub use migrate::{merge_configs, upgrade, upgrade_to, upgrade_to_with, upgrade_with};
pub use stores::{build_stores, compile_schema};
pub use view::TableView;

pub use tabula_engine::{
    Engine, EngineError, Filter, Key, Materializer, Row, TableSchema, UpgradeTx,
};
