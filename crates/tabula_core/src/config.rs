//! Table configuration types produced by the schema builder.

use std::collections::BTreeMap;
use std::fmt;
use tabula_engine::Materializer;

/// Primary-key declaration of a table.
///
/// `path == None` is an outbound (hidden) key: the engine tracks key values
/// outside the record body. A compound primary key stores its bracketed
/// form (`"[a+b]"`) as the path, which is also its schema-string token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkSpec {
    /// Key path on the record, or `None` for an outbound key.
    pub path: Option<String>,
    /// Whether the engine generates key values.
    pub auto: bool,
}

/// One secondary-index declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexSpec {
    /// Index over a single field.
    Single {
        /// The indexed key path.
        path: String,
        /// Whether the index enforces uniqueness.
        unique: bool,
    },
    /// Multi-entry index over the elements of an array-valued field.
    Multi {
        /// The indexed key path.
        path: String,
        /// Whether the index enforces uniqueness.
        unique: bool,
    },
    /// Compound index over an ordered tuple of fields.
    Compound {
        /// The indexed key paths, in order. Always at least two.
        paths: Vec<String>,
        /// Whether the index enforces uniqueness.
        unique: bool,
    },
}

impl IndexSpec {
    /// Compiles this index to its schema-string token.
    #[must_use]
    pub fn token(&self) -> String {
        match self {
            IndexSpec::Single { path, unique } => prefix_unique(path.clone(), *unique),
            IndexSpec::Multi { path, unique } => prefix_unique(format!("*{path}"), *unique),
            IndexSpec::Compound { paths, unique } => {
                prefix_unique(format!("[{}]", paths.join("+")), *unique)
            }
        }
    }

    /// Whether two specs denote the same path-set: single and multi compare
    /// by path equality (they share one namespace), compound by exact
    /// ordered path-sequence equality.
    pub(crate) fn same_target(&self, other: &IndexSpec) -> bool {
        match (self, other) {
            (
                IndexSpec::Single { path: a, .. } | IndexSpec::Multi { path: a, .. },
                IndexSpec::Single { path: b, .. } | IndexSpec::Multi { path: b, .. },
            ) => a == b,
            (IndexSpec::Compound { paths: a, .. }, IndexSpec::Compound { paths: b, .. }) => a == b,
            _ => false,
        }
    }
}

fn prefix_unique(token: String, unique: bool) -> String {
    if unique {
        format!("&{token}")
    } else {
        token
    }
}

/// An immutable table configuration, produced by
/// [`crate::IndexBuilder::build`].
#[derive(Clone)]
pub struct TableConfig {
    /// The primary-key declaration.
    pub pk: PkSpec,
    /// Secondary indexes, in registration order. Order is part of the
    /// compiled schema string.
    pub indices: Vec<IndexSpec>,
    pub(crate) class: Option<Materializer>,
}

impl TableConfig {
    /// Returns the registered class mapping, if the builder was created in
    /// mapped mode.
    #[must_use]
    pub fn class(&self) -> Option<&Materializer> {
        self.class.as_ref()
    }

    /// Compiles the index portion of the schema string: the index tokens in
    /// registration order, comma-joined. Empty when no indexes were
    /// registered.
    #[must_use]
    pub fn indices_schema(&self) -> String {
        self.indices
            .iter()
            .map(IndexSpec::token)
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl fmt::Debug for TableConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableConfig")
            .field("pk", &self.pk)
            .field("indices", &self.indices)
            .field("class", &self.class.as_ref().map(Materializer::type_name))
            .finish()
    }
}

/// Table configurations by table name.
pub type TableConfigMap = BTreeMap<String, TableConfig>;

/// Table configurations by name, where `None` marks a table for deletion at
/// the version being declared.
pub type StoreConfigMap = BTreeMap<String, Option<TableConfig>>;
