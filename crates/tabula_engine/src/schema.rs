//! Schema-string parsing.
//!
//! Tables are declared with a compact schema string: a primary-key token
//! followed by comma-separated index tokens.
//!
//! ```text
//! schema     := pkToken ("," indexToken)*
//! pkToken    := ["++"] path            ; path may be "" for an outbound key
//! indexToken := ["&"] (["*"] path | "[" path ("+" path)+ "]")
//! ```
//!
//! `++` marks an auto-generated key, `&` a unique index, `*` a multi-entry
//! index, and `[a+b]` a compound key or index over the listed paths.
//! Examples: `"++id,name,&email,*tags,[a+b]"`, `",index1"`, `"++"`.

use crate::error::{EngineError, EngineResult};
use std::fmt;

/// Parsed form of a table's schema string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    /// The primary-key declaration.
    pub primary: PrimaryDef,
    /// Secondary indexes, in declaration order.
    pub indexes: Vec<IndexDef>,
}

/// Primary-key declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryDef {
    /// Where key values live relative to the row.
    pub paths: KeyPaths,
    /// Whether the engine generates key values.
    pub auto: bool,
}

/// Location of primary-key values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyPaths {
    /// Outbound key: tracked by the engine, not stored on the row.
    Hidden,
    /// Inbound key at a single (possibly dotted) path.
    Single(String),
    /// Inbound compound key over an ordered list of paths.
    Compound(Vec<String>),
}

/// A secondary-index declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDef {
    /// What the index covers.
    pub target: IndexTarget,
    /// Whether the index enforces uniqueness.
    pub unique: bool,
}

/// The field(s) an index covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexTarget {
    /// A single field.
    Single(String),
    /// Each element of an array-valued field.
    Multi(String),
    /// An ordered tuple of fields.
    Compound(Vec<String>),
}

impl IndexTarget {
    /// Returns true when the index covers the given path as a single or
    /// multi-entry index.
    #[must_use]
    pub fn covers_path(&self, path: &str) -> bool {
        match self {
            IndexTarget::Single(p) | IndexTarget::Multi(p) => p == path,
            IndexTarget::Compound(_) => false,
        }
    }
}

impl TableSchema {
    /// Parses a schema string.
    ///
    /// The empty string is valid: an outbound explicit key with no indexes.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSchema` when a token does not match the grammar.
    pub fn parse(schema: &str) -> EngineResult<Self> {
        let mut segments = schema.split(',');
        let pk_token = segments.next().unwrap_or("");

        let (auto, pk_rest) = match pk_token.strip_prefix("++") {
            Some(rest) => (true, rest),
            None => (false, pk_token),
        };
        let paths = if pk_rest.is_empty() {
            KeyPaths::Hidden
        } else if let Some(inner) = strip_brackets(pk_rest) {
            KeyPaths::Compound(parse_compound_paths(schema, inner)?)
        } else {
            validate_path(schema, pk_rest)?;
            KeyPaths::Single(pk_rest.to_string())
        };

        let mut indexes = Vec::new();
        for token in segments {
            indexes.push(parse_index_token(schema, token)?);
        }

        Ok(Self {
            primary: PrimaryDef { paths, auto },
            indexes,
        })
    }

    /// Returns the primary-key paths an equality filter may reference.
    pub(crate) fn primary_paths(&self) -> Vec<&str> {
        match &self.primary.paths {
            KeyPaths::Hidden => Vec::new(),
            KeyPaths::Single(p) => vec![p.as_str()],
            KeyPaths::Compound(ps) => ps.iter().map(String::as_str).collect(),
        }
    }
}

fn parse_index_token(schema: &str, token: &str) -> EngineResult<IndexDef> {
    let (unique, rest) = match token.strip_prefix('&') {
        Some(rest) => (true, rest),
        None => (false, token),
    };
    let target = if let Some(path) = rest.strip_prefix('*') {
        validate_path(schema, path)?;
        IndexTarget::Multi(path.to_string())
    } else if let Some(inner) = strip_brackets(rest) {
        IndexTarget::Compound(parse_compound_paths(schema, inner)?)
    } else {
        validate_path(schema, rest)?;
        IndexTarget::Single(rest.to_string())
    };
    Ok(IndexDef { target, unique })
}

fn strip_brackets(token: &str) -> Option<&str> {
    token.strip_prefix('[').and_then(|t| t.strip_suffix(']'))
}

fn parse_compound_paths(schema: &str, inner: &str) -> EngineResult<Vec<String>> {
    let paths: Vec<String> = inner.split('+').map(str::to_string).collect();
    if paths.len() < 2 {
        return Err(EngineError::invalid_schema(
            schema,
            "compound token needs at least two paths",
        ));
    }
    for path in &paths {
        validate_path(schema, path)?;
    }
    Ok(paths)
}

fn validate_path(schema: &str, path: &str) -> EngineResult<()> {
    if path.is_empty() {
        return Err(EngineError::invalid_schema(schema, "empty key path"));
    }
    if path.contains(['[', ']', '&', '*', '+', ',']) {
        return Err(EngineError::invalid_schema(
            schema,
            format!("key path {path:?} contains reserved characters"),
        ));
    }
    Ok(())
}

impl fmt::Display for TableSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.primary.auto {
            write!(f, "++")?;
        }
        match &self.primary.paths {
            KeyPaths::Hidden => {}
            KeyPaths::Single(p) => write!(f, "{p}")?,
            KeyPaths::Compound(ps) => write!(f, "[{}]", ps.join("+"))?,
        }
        for index in &self.indexes {
            write!(f, ",{index}")?;
        }
        Ok(())
    }
}

impl fmt::Display for IndexDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.unique {
            write!(f, "&")?;
        }
        match &self.target {
            IndexTarget::Single(p) => write!(f, "{p}"),
            IndexTarget::Multi(p) => write!(f, "*{p}"),
            IndexTarget::Compound(ps) => write!(f, "[{}]", ps.join("+")),
        }
    }
}
