//! Fluent schema builder.
//!
//! Building a table configuration is a two-stage chain: a [`TableBuilder`]
//! offers exactly the primary-key declarations; the [`IndexBuilder`] it
//! returns offers index declarations and the terminal
//! [`build`](IndexBuilder::build). The stage split makes "one primary key,
//! then indexes" unrepresentable rather than checked.
//!
//! Fallible calls return `CoreResult<IndexBuilder>`, so chains thread `?`:
//!
//! ```rust
//! use tabula_core::TableBuilder;
//!
//! # fn main() -> Result<(), tabula_core::CoreError> {
//! let books = TableBuilder::new()
//!     .auto_key("id")
//!     .index("title")?
//!     .unique_index("isbn")?
//!     .multi_index("tags")?
//!     .compound_index(["author", "year"])?
//!     .build();
//! assert_eq!(books.indices_schema(), "title,&isbn,*tags,[author+year]");
//! # Ok(())
//! # }
//! ```
//!
//! Consistency rules enforced here, at construction time and before any
//! engine work:
//!
//! - a compound key or index may not repeat a path
//! - no two indexes may denote the same path-set (single and multi share
//!   one namespace; compound sequences compare positionally, so
//!   `["a","b"]` and `["b","a"]` are distinct)
//! - a single or multi index may not target the single primary-key path;
//!   components of a compound primary key stay individually indexable
//! - a compound index may not exactly duplicate the compound primary key

use crate::config::{IndexSpec, PkSpec, TableConfig};
use crate::error::{CoreError, CoreResult};
use serde::de::DeserializeOwned;
use std::any::Any;
use tabula_engine::Materializer;

/// Entry stage of the fluent chain: declares the primary key.
///
/// Each builder configures one table; building two tables takes two
/// builders. Builders are consumed by value and share nothing.
#[derive(Debug, Default)]
pub struct TableBuilder {
    class: Option<Materializer>,
}

/// Second stage of the fluent chain: declares indexes, then builds.
#[derive(Debug)]
pub struct IndexBuilder {
    pk: PkSpec,
    pk_paths: PkPaths,
    indices: Vec<IndexSpec>,
    class: Option<Materializer>,
}

/// Primary-key paths kept for exclusion checks, before compilation into the
/// `PkSpec` token form.
#[derive(Debug)]
enum PkPaths {
    Hidden,
    Single(String),
    Compound(Vec<String>),
}

impl TableBuilder {
    /// Creates a builder for a table of plain rows.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder whose table materializes rows as `T`.
    ///
    /// The resulting configuration carries a class mapping; the registrar
    /// binds it during migration so reads can produce `T` values.
    #[must_use]
    pub fn mapped<T>() -> Self
    where
        T: DeserializeOwned + Any + Send + Sync,
    {
        Self {
            class: Some(Materializer::of::<T>()),
        }
    }

    /// Declares an inbound primary key at `path`, supplied by the caller.
    #[must_use]
    pub fn primary_key(self, path: &str) -> IndexBuilder {
        self.with_pk(
            PkSpec {
                path: Some(path.to_string()),
                auto: false,
            },
            PkPaths::Single(path.to_string()),
        )
    }

    /// Declares an inbound auto-increment primary key at `path`.
    #[must_use]
    pub fn auto_key(self, path: &str) -> IndexBuilder {
        self.with_pk(
            PkSpec {
                path: Some(path.to_string()),
                auto: true,
            },
            PkPaths::Single(path.to_string()),
        )
    }

    /// Declares an inbound compound primary key over the given paths.
    ///
    /// # Errors
    ///
    /// Returns `CompoundTooShort` for fewer than two paths and
    /// `DuplicateKeysInCompound` when a path repeats.
    pub fn compound_key<I, S>(self, paths: I) -> CoreResult<IndexBuilder>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let paths: Vec<String> = paths.into_iter().map(Into::into).collect();
        check_compound_paths(&paths)?;
        Ok(self.with_pk(
            PkSpec {
                path: Some(format!("[{}]", paths.join("+"))),
                auto: false,
            },
            PkPaths::Compound(paths),
        ))
    }

    /// Declares an outbound primary key generated by the engine.
    #[must_use]
    pub fn hidden_auto_key(self) -> IndexBuilder {
        self.with_pk(
            PkSpec {
                path: None,
                auto: true,
            },
            PkPaths::Hidden,
        )
    }

    /// Declares an outbound primary key supplied by the caller per write.
    #[must_use]
    pub fn hidden_key(self) -> IndexBuilder {
        self.with_pk(
            PkSpec {
                path: None,
                auto: false,
            },
            PkPaths::Hidden,
        )
    }

    fn with_pk(self, pk: PkSpec, pk_paths: PkPaths) -> IndexBuilder {
        IndexBuilder {
            pk,
            pk_paths,
            indices: Vec::new(),
            class: self.class,
        }
    }
}

impl IndexBuilder {
    /// Registers a single-field index.
    ///
    /// # Errors
    ///
    /// Returns `IndexShadowsPrimaryKey` when `path` is the single
    /// primary-key path, or `DuplicateIndex` when the path is already
    /// indexed.
    pub fn index(self, path: &str) -> CoreResult<Self> {
        self.push_single(path, false, false)
    }

    /// Registers a unique single-field index.
    ///
    /// # Errors
    ///
    /// Same as [`IndexBuilder::index`].
    pub fn unique_index(self, path: &str) -> CoreResult<Self> {
        self.push_single(path, true, false)
    }

    /// Registers a multi-entry index over an array-valued field.
    ///
    /// # Errors
    ///
    /// Same as [`IndexBuilder::index`].
    pub fn multi_index(self, path: &str) -> CoreResult<Self> {
        self.push_single(path, false, true)
    }

    /// Registers a unique multi-entry index.
    ///
    /// # Errors
    ///
    /// Same as [`IndexBuilder::index`].
    pub fn unique_multi_index(self, path: &str) -> CoreResult<Self> {
        self.push_single(path, true, true)
    }

    /// Registers a compound index over the given paths.
    ///
    /// # Errors
    ///
    /// Returns `CompoundTooShort` for fewer than two paths,
    /// `DuplicateKeysInCompound` when a path repeats within the call,
    /// `CompoundIndexMatchesPrimaryKey` when the sequence equals the
    /// compound primary key, or `DuplicateIndex` when the same ordered
    /// sequence is already registered. The comparison is positional:
    /// `["a","b"]` and `["b","a"]` are different indexes.
    pub fn compound_index<I, S>(self, paths: I) -> CoreResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push_compound(paths, false)
    }

    /// Registers a unique compound index.
    ///
    /// # Errors
    ///
    /// Same as [`IndexBuilder::compound_index`].
    pub fn unique_compound_index<I, S>(self, paths: I) -> CoreResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push_compound(paths, true)
    }

    /// Finalizes the chain into an immutable [`TableConfig`].
    #[must_use]
    pub fn build(self) -> TableConfig {
        TableConfig {
            pk: self.pk,
            indices: self.indices,
            class: self.class,
        }
    }

    fn push_single(mut self, path: &str, unique: bool, multi: bool) -> CoreResult<Self> {
        if matches!(&self.pk_paths, PkPaths::Single(p) if p == path) {
            return Err(CoreError::IndexShadowsPrimaryKey {
                path: path.to_string(),
            });
        }
        let spec = if multi {
            IndexSpec::Multi {
                path: path.to_string(),
                unique,
            }
        } else {
            IndexSpec::Single {
                path: path.to_string(),
                unique,
            }
        };
        if self.indices.iter().any(|i| i.same_target(&spec)) {
            return Err(CoreError::DuplicateIndex {
                target: path.to_string(),
            });
        }
        self.indices.push(spec);
        Ok(self)
    }

    fn push_compound<I, S>(mut self, paths: I, unique: bool) -> CoreResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let paths: Vec<String> = paths.into_iter().map(Into::into).collect();
        check_compound_paths(&paths)?;
        if matches!(&self.pk_paths, PkPaths::Compound(pk) if *pk == paths) {
            return Err(CoreError::CompoundIndexMatchesPrimaryKey);
        }
        let spec = IndexSpec::Compound {
            paths: paths.clone(),
            unique,
        };
        if self.indices.iter().any(|i| i.same_target(&spec)) {
            return Err(CoreError::DuplicateIndex {
                target: paths.join("+"),
            });
        }
        self.indices.push(spec);
        Ok(self)
    }
}

fn check_compound_paths(paths: &[String]) -> CoreResult<()> {
    if paths.len() < 2 {
        return Err(CoreError::CompoundTooShort { got: paths.len() });
    }
    for (i, path) in paths.iter().enumerate() {
        if paths[..i].contains(path) {
            return Err(CoreError::DuplicateKeysInCompound);
        }
    }
    Ok(())
}
