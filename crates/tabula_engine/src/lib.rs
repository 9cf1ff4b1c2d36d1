//! # Tabula Engine
//!
//! Versioned key/value table engine for Tabula.
//!
//! This crate is the storage collaborator the `tabula_core` schema layer
//! drives. It is deliberately narrow:
//!
//! - tables are declared with compact schema strings (see [`TableSchema`])
//! - schema changes happen through versioned transitions
//!   ([`Engine::version`]), serialized and atomic, with an optional
//!   one-time upgrade callback per version
//! - rows are JSON objects addressed by primary [`Key`], with unique and
//!   multi-entry index semantics enforced on writes and equality queries
//! - [`Materializer`] bindings let reads produce typed values
//!
//! The implementation here is in-memory. The core never reaches past this
//! crate's public surface, so a persistent engine can replace it without
//! touching the schema layer.
//!
//! ## Example
//!
//! ```rust
//! use tabula_engine::Engine;
//! use serde_json::json;
//! use std::collections::BTreeMap;
//!
//! let engine = Engine::new("library");
//! let stores = BTreeMap::from([
//!     ("books".to_string(), Some("++id,title,&isbn".to_string())),
//! ]);
//! engine.version(1).stores(stores).run().unwrap();
//!
//! let books = engine.table("books").unwrap();
//! let key = books.add(json!({"title": "Dune", "isbn": "0441"})).unwrap();
//! assert!(books.get(&key).is_some());
//! ```

mod engine;
mod error;
mod key;
mod materialize;
mod schema;
mod table;

pub use engine::{Engine, UpgradeFn, UpgradeTx, VersionDecl};
pub use error::{EngineError, EngineResult};
pub use key::{set_at_path, value_at_path, Key};
pub use materialize::Materializer;
pub use schema::{IndexDef, IndexTarget, KeyPaths, PrimaryDef, TableSchema};
pub use table::{Filter, Row, Table};
