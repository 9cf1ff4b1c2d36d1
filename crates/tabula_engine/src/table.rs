//! Table storage and row operations.

use crate::error::{EngineError, EngineResult};
use crate::key::{set_at_path, value_at_path, Key};
use crate::materialize::Materializer;
use crate::schema::{IndexTarget, KeyPaths, TableSchema};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A stored row. Rows are JSON objects; inbound key and index values are
/// resolved against them by (possibly dotted) key path.
pub type Row = Value;

/// An equality filter: key path to expected value.
///
/// Every path must be indexed or part of the primary key. A path covered by
/// a multi-entry index matches when the row's array value contains the
/// expected value.
pub type Filter = BTreeMap<String, Value>;

/// State behind a table handle.
#[derive(Debug, Clone)]
pub(crate) struct TableState {
    pub(crate) schema: TableSchema,
    pub(crate) rows: BTreeMap<Key, Row>,
    pub(crate) next_auto: i64,
    pub(crate) materializer: Option<Materializer>,
}

/// A handle to one table.
///
/// Handles are cheap to clone and share state; a handle obtained before a
/// schema re-declaration keeps observing the table afterwards. All
/// operations take the table lock internally.
#[derive(Clone)]
pub struct Table {
    name: Arc<str>,
    state: Arc<RwLock<TableState>>,
}

impl Table {
    pub(crate) fn create(name: &str, schema: TableSchema) -> Self {
        Self {
            name: Arc::from(name),
            state: Arc::new(RwLock::new(TableState {
                schema,
                rows: BTreeMap::new(),
                next_auto: 0,
                materializer: None,
            })),
        }
    }

    pub(crate) fn replace_schema(&self, schema: TableSchema) {
        self.state.write().schema = schema;
    }

    pub(crate) fn snapshot(&self) -> TableState {
        self.state.read().clone()
    }

    pub(crate) fn restore(&self, state: TableState) {
        *self.state.write() = state;
    }

    /// Returns the table name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the table's parsed schema.
    #[must_use]
    pub fn schema(&self) -> TableSchema {
        self.state.read().schema.clone()
    }

    /// Returns the number of rows.
    #[must_use]
    pub fn count(&self) -> usize {
        self.state.read().rows.len()
    }

    /// Inserts a row, failing if its primary key already exists.
    ///
    /// The key is resolved from the row for inbound tables; auto keys are
    /// allocated and, for inbound tables, written back into the stored row.
    ///
    /// # Errors
    ///
    /// Returns `MissingKey` on an outbound-explicit table (use
    /// [`Table::add_with_key`]), `DuplicateKey` on key reuse, or
    /// `UniqueViolation` when a unique index is violated.
    pub fn add(&self, row: Row) -> EngineResult<Key> {
        let mut state = self.state.write();
        self.insert(&mut state, row, None, false)
    }

    /// Inserts a row under an explicit key (outbound tables only).
    ///
    /// # Errors
    ///
    /// Returns `ExplicitKey` when the table has an inbound key.
    pub fn add_with_key(&self, row: Row, key: Key) -> EngineResult<Key> {
        let mut state = self.state.write();
        self.insert(&mut state, row, Some(key), false)
    }

    /// Inserts or replaces a row.
    ///
    /// # Errors
    ///
    /// Same as [`Table::add`], except an existing key is overwritten rather
    /// than rejected.
    pub fn put(&self, row: Row) -> EngineResult<Key> {
        let mut state = self.state.write();
        self.insert(&mut state, row, None, true)
    }

    /// Inserts or replaces a row under an explicit key.
    ///
    /// # Errors
    ///
    /// Returns `ExplicitKey` when the table has an inbound key.
    pub fn put_with_key(&self, row: Row, key: Key) -> EngineResult<Key> {
        let mut state = self.state.write();
        self.insert(&mut state, row, Some(key), true)
    }

    /// Inserts many rows, failing on any key reuse.
    ///
    /// The whole batch is atomic: on error no row is inserted.
    ///
    /// # Errors
    ///
    /// Same as [`Table::add`], for the first offending row.
    pub fn bulk_add(&self, rows: Vec<Row>) -> EngineResult<Vec<Key>> {
        self.bulk(rows, None, false)
    }

    /// Inserts many rows under explicit keys (outbound tables only).
    ///
    /// # Errors
    ///
    /// Returns `KeyCountMismatch` when `keys` and `rows` differ in length,
    /// otherwise same as [`Table::add_with_key`].
    pub fn bulk_add_with_keys(&self, rows: Vec<Row>, keys: Vec<Key>) -> EngineResult<Vec<Key>> {
        self.bulk(rows, Some(keys), false)
    }

    /// Inserts or replaces many rows atomically.
    ///
    /// # Errors
    ///
    /// Same as [`Table::put`], for the first offending row.
    pub fn bulk_put(&self, rows: Vec<Row>) -> EngineResult<Vec<Key>> {
        self.bulk(rows, None, true)
    }

    /// Inserts or replaces many rows under explicit keys.
    ///
    /// # Errors
    ///
    /// Returns `KeyCountMismatch` when `keys` and `rows` differ in length,
    /// otherwise same as [`Table::put_with_key`].
    pub fn bulk_put_with_keys(&self, rows: Vec<Row>, keys: Vec<Key>) -> EngineResult<Vec<Key>> {
        self.bulk(rows, Some(keys), true)
    }

    /// Gets a row by primary key.
    #[must_use]
    pub fn get(&self, key: &Key) -> Option<Row> {
        self.state.read().rows.get(key).cloned()
    }

    /// Gets the first row matching an equality filter, in key order.
    ///
    /// # Errors
    ///
    /// Returns `NotIndexed` when a filter path is neither indexed nor part
    /// of the primary key.
    pub fn get_where(&self, filter: &Filter) -> EngineResult<Option<Row>> {
        let state = self.state.read();
        self.check_filter(&state, filter)?;
        Ok(state
            .rows
            .values()
            .find(|row| matches_filter(&state.schema, row, filter))
            .cloned())
    }

    /// Returns all rows matching an equality filter, in key order.
    ///
    /// # Errors
    ///
    /// Returns `NotIndexed` when a filter path is neither indexed nor part
    /// of the primary key.
    pub fn select_where(&self, filter: &Filter) -> EngineResult<Vec<Row>> {
        let state = self.state.read();
        self.check_filter(&state, filter)?;
        Ok(state
            .rows
            .values()
            .filter(|row| matches_filter(&state.schema, row, filter))
            .cloned()
            .collect())
    }

    /// Deletes a row by primary key. Returns whether a row was removed.
    pub fn delete(&self, key: &Key) -> bool {
        self.state.write().rows.remove(key).is_some()
    }

    /// Removes all rows.
    pub fn clear(&self) {
        self.state.write().rows.clear();
    }

    /// Returns all rows with their keys, in key order.
    #[must_use]
    pub fn rows(&self) -> Vec<(Key, Row)> {
        self.state
            .read()
            .rows
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Applies a mutation to every row in place.
    ///
    /// Intended for upgrade callbacks reshaping existing records. Primary
    /// keys are not re-extracted; the mutation must not move rows to a
    /// different key.
    pub fn modify(&self, mut f: impl FnMut(&Key, &mut Row)) {
        let mut state = self.state.write();
        for (key, row) in state.rows.iter_mut() {
            f(key, row);
        }
    }

    /// Binds a materializer so reads can produce typed values.
    pub fn map_to_class(&self, materializer: Materializer) {
        self.state.write().materializer = Some(materializer);
    }

    /// Returns the registered materializer, if any.
    #[must_use]
    pub fn materializer(&self) -> Option<Materializer> {
        self.state.read().materializer.clone()
    }

    /// Gets a row by key and decodes it into the mapped type.
    ///
    /// # Errors
    ///
    /// Returns `NotMapped` when no materializer is registered,
    /// `TypeMismatch` when `T` is not the mapped type, or `Deserialize`
    /// when the row does not fit it.
    pub fn get_mapped<T: std::any::Any>(&self, key: &Key) -> EngineResult<Option<T>> {
        let state = self.state.read();
        let materializer = state
            .materializer
            .as_ref()
            .ok_or_else(|| EngineError::NotMapped {
                table: self.name.to_string(),
            })?;
        match state.rows.get(key) {
            Some(row) => materializer.materialize(row.clone()).map(Some),
            None => Ok(None),
        }
    }

    fn bulk(
        &self,
        rows: Vec<Row>,
        keys: Option<Vec<Key>>,
        overwrite: bool,
    ) -> EngineResult<Vec<Key>> {
        let mut state = self.state.write();
        if let Some(keys) = &keys {
            if keys.len() != rows.len() {
                return Err(EngineError::KeyCountMismatch {
                    table: self.name.to_string(),
                    rows: rows.len(),
                    keys: keys.len(),
                });
            }
        }
        let before = (*state).clone();
        let mut inserted = Vec::with_capacity(rows.len());
        let mut keys = keys.map(Vec::into_iter);
        for row in rows {
            let explicit = keys.as_mut().and_then(Iterator::next);
            match self.insert(&mut state, row, explicit, overwrite) {
                Ok(key) => inserted.push(key),
                Err(e) => {
                    *state = before;
                    return Err(e);
                }
            }
        }
        Ok(inserted)
    }

    fn insert(
        &self,
        state: &mut TableState,
        mut row: Row,
        explicit: Option<Key>,
        overwrite: bool,
    ) -> EngineResult<Key> {
        let key = self.resolve_key(state, &mut row, explicit)?;
        if !overwrite && state.rows.contains_key(&key) {
            return Err(EngineError::DuplicateKey {
                table: self.name.to_string(),
                key: key.to_string(),
            });
        }
        let skip = overwrite.then_some(&key);
        self.check_unique(state, &row, skip)?;
        if let Key::Int(n) = key {
            state.next_auto = state.next_auto.max(n);
        }
        state.rows.insert(key.clone(), row);
        Ok(key)
    }

    fn resolve_key(
        &self,
        state: &mut TableState,
        row: &mut Row,
        explicit: Option<Key>,
    ) -> EngineResult<Key> {
        let primary = state.schema.primary.clone();
        match &primary.paths {
            KeyPaths::Hidden => match explicit {
                Some(key) => Ok(key),
                None if primary.auto => {
                    state.next_auto += 1;
                    Ok(Key::Int(state.next_auto))
                }
                None => Err(EngineError::MissingKey {
                    table: self.name.to_string(),
                }),
            },
            KeyPaths::Single(path) => {
                if explicit.is_some() {
                    return Err(EngineError::ExplicitKey {
                        table: self.name.to_string(),
                    });
                }
                match value_at_path(row, path) {
                    Some(value) => Key::from_value(value),
                    None if primary.auto => {
                        state.next_auto += 1;
                        let key = Key::Int(state.next_auto);
                        set_at_path(row, path, key.to_value());
                        Ok(key)
                    }
                    None => Err(EngineError::KeyPathMissing {
                        table: self.name.to_string(),
                        path: path.clone(),
                    }),
                }
            }
            KeyPaths::Compound(paths) => {
                if explicit.is_some() {
                    return Err(EngineError::ExplicitKey {
                        table: self.name.to_string(),
                    });
                }
                let mut parts = Vec::with_capacity(paths.len());
                for path in paths {
                    let value =
                        value_at_path(row, path).ok_or_else(|| EngineError::KeyPathMissing {
                            table: self.name.to_string(),
                            path: path.clone(),
                        })?;
                    parts.push(Key::from_value(value)?);
                }
                Ok(Key::Array(parts))
            }
        }
    }

    fn check_unique(&self, state: &TableState, row: &Row, skip: Option<&Key>) -> EngineResult<()> {
        for index in state.schema.indexes.iter().filter(|i| i.unique) {
            let candidate = index_entries(row, &index.target);
            if candidate.is_empty() {
                continue;
            }
            for (key, existing) in &state.rows {
                if skip == Some(key) {
                    continue;
                }
                let entries = index_entries(existing, &index.target);
                if candidate.iter().any(|v| entries.contains(v)) {
                    return Err(EngineError::UniqueViolation {
                        table: self.name.to_string(),
                        index: index.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    fn check_filter(&self, state: &TableState, filter: &Filter) -> EngineResult<()> {
        for path in filter.keys() {
            let indexed = state.schema.primary_paths().contains(&path.as_str())
                || state.schema.indexes.iter().any(|i| match &i.target {
                    IndexTarget::Single(p) | IndexTarget::Multi(p) => p == path,
                    IndexTarget::Compound(ps) => ps.iter().any(|p| p == path),
                });
            if !indexed {
                return Err(EngineError::NotIndexed {
                    table: self.name.to_string(),
                    path: path.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Values a row contributes to an index. Multi-entry indexes contribute one
/// entry per array element; compound indexes contribute a single array
/// entry, or nothing when any component is missing.
fn index_entries(row: &Row, target: &IndexTarget) -> Vec<Value> {
    match target {
        IndexTarget::Single(path) => value_at_path(row, path).cloned().into_iter().collect(),
        IndexTarget::Multi(path) => match value_at_path(row, path) {
            Some(Value::Array(items)) => items.clone(),
            Some(value) => vec![value.clone()],
            None => Vec::new(),
        },
        IndexTarget::Compound(paths) => paths
            .iter()
            .map(|p| value_at_path(row, p).cloned())
            .collect::<Option<Vec<_>>>()
            .map(Value::Array)
            .into_iter()
            .collect(),
    }
}

fn matches_filter(schema: &TableSchema, row: &Row, filter: &Filter) -> bool {
    filter.iter().all(|(path, expected)| {
        let multi = schema
            .indexes
            .iter()
            .any(|i| matches!(&i.target, IndexTarget::Multi(p) if p == path));
        match value_at_path(row, path) {
            Some(Value::Array(items)) if multi => items.contains(expected),
            Some(actual) => actual == expected,
            None => false,
        }
    })
}

impl fmt::Debug for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("name", &self.name)
            .field("rows", &self.count())
            .finish_non_exhaustive()
    }
}
