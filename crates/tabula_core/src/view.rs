//! Table views.
//!
//! A [`TableView`] wraps an engine [`Table`] and is the surface handed out
//! by [`Database::table`](crate::Database::table). The engine primitives
//! delegate straight through; on top of them the view adds conveniences
//! that serialize caller types on the way in and materialize them on the
//! way out. Views are plain wrappers, so holding several views onto one
//! table is fine.

use crate::error::CoreResult;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::Any;
use tabula_engine::{Filter, Key, Row, Table, TableSchema};

/// A view over one table.
#[derive(Debug, Clone)]
pub struct TableView {
    table: Table,
}

impl TableView {
    pub(crate) fn new(table: Table) -> Self {
        Self { table }
    }

    /// The table name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.table.name()
    }

    /// The table's current schema.
    #[must_use]
    pub fn schema(&self) -> TableSchema {
        self.table.schema()
    }

    /// Number of rows.
    #[must_use]
    pub fn count(&self) -> usize {
        self.table.count()
    }

    /// The underlying engine table.
    #[must_use]
    pub fn table(&self) -> &Table {
        &self.table
    }

    /// Inserts a row, failing on key collision.
    ///
    /// # Errors
    ///
    /// Returns any engine error from the insert.
    pub fn add(&self, row: Row) -> CoreResult<Key> {
        Ok(self.table.add(row)?)
    }

    /// Inserts a row under an explicit outbound key.
    ///
    /// # Errors
    ///
    /// Returns any engine error from the insert.
    pub fn add_with_key(&self, row: Row, key: Key) -> CoreResult<Key> {
        Ok(self.table.add_with_key(row, key)?)
    }

    /// Inserts or replaces a row.
    ///
    /// # Errors
    ///
    /// Returns any engine error from the write.
    pub fn put(&self, row: Row) -> CoreResult<Key> {
        Ok(self.table.put(row)?)
    }

    /// Inserts or replaces a row under an explicit outbound key.
    ///
    /// # Errors
    ///
    /// Returns any engine error from the write.
    pub fn put_with_key(&self, row: Row, key: Key) -> CoreResult<Key> {
        Ok(self.table.put_with_key(row, key)?)
    }

    /// Inserts many rows atomically; none land if any fails.
    ///
    /// # Errors
    ///
    /// Returns the first engine error encountered.
    pub fn bulk_add(&self, rows: Vec<Row>) -> CoreResult<Vec<Key>> {
        Ok(self.table.bulk_add(rows)?)
    }

    /// Inserts many rows under explicit outbound keys, atomically.
    ///
    /// # Errors
    ///
    /// Returns the first engine error encountered.
    pub fn bulk_add_with_keys(&self, rows: Vec<Row>, keys: Vec<Key>) -> CoreResult<Vec<Key>> {
        Ok(self.table.bulk_add_with_keys(rows, keys)?)
    }

    /// Inserts or replaces many rows atomically.
    ///
    /// # Errors
    ///
    /// Returns the first engine error encountered.
    pub fn bulk_put(&self, rows: Vec<Row>) -> CoreResult<Vec<Key>> {
        Ok(self.table.bulk_put(rows)?)
    }

    /// Inserts or replaces many rows under explicit outbound keys.
    ///
    /// # Errors
    ///
    /// Returns the first engine error encountered.
    pub fn bulk_put_with_keys(&self, rows: Vec<Row>, keys: Vec<Key>) -> CoreResult<Vec<Key>> {
        Ok(self.table.bulk_put_with_keys(rows, keys)?)
    }

    /// Serializes each item and inserts the batch atomically.
    ///
    /// # Errors
    ///
    /// Returns a serialization error or the first engine error.
    pub fn bulk_add_tuple<T: Serialize>(&self, items: &[T]) -> CoreResult<Vec<Key>> {
        self.bulk_add(to_rows(items)?)
    }

    /// Serializes each item and inserts or replaces the batch atomically.
    ///
    /// # Errors
    ///
    /// Returns a serialization error or the first engine error.
    pub fn bulk_put_tuple<T: Serialize>(&self, items: &[T]) -> CoreResult<Vec<Key>> {
        self.bulk_put(to_rows(items)?)
    }

    /// Inserts a typed item and returns it as stored, with any generated
    /// key filled in.
    ///
    /// # Errors
    ///
    /// Returns a serialization error or any engine error from the insert.
    pub fn add_object<T>(&self, item: &T) -> CoreResult<T>
    where
        T: Serialize + DeserializeOwned,
    {
        let row = serde_json::to_value(item)?;
        let key = self.table.add(row.clone())?;
        let stored = self.table.get(&key).unwrap_or(row);
        Ok(serde_json::from_value(stored)?)
    }

    /// Fetches a row by primary key.
    #[must_use]
    pub fn get(&self, key: &Key) -> Option<Row> {
        self.table.get(key)
    }

    /// Fetches the first row matching an equality filter over indexed
    /// fields.
    ///
    /// # Errors
    ///
    /// Returns `NotIndexed` when a filter field has no index.
    pub fn get_where(&self, filter: &Filter) -> CoreResult<Option<Row>> {
        Ok(self.table.get_where(filter)?)
    }

    /// Fetches all rows matching an equality filter over indexed fields.
    ///
    /// # Errors
    ///
    /// Returns `NotIndexed` when a filter field has no index.
    pub fn select_where(&self, filter: &Filter) -> CoreResult<Vec<Row>> {
        Ok(self.table.select_where(filter)?)
    }

    /// Alias for [`get_where`](Self::get_where).
    ///
    /// # Errors
    ///
    /// Same as [`get_where`](Self::get_where).
    pub fn get_equality(&self, filter: &Filter) -> CoreResult<Option<Row>> {
        self.get_where(filter)
    }

    /// Alias for [`select_where`](Self::select_where).
    ///
    /// # Errors
    ///
    /// Same as [`select_where`](Self::select_where).
    pub fn where_equality(&self, filter: &Filter) -> CoreResult<Vec<Row>> {
        self.select_where(filter)
    }

    /// Fetches a row by primary key and materializes it as the mapped
    /// class.
    ///
    /// # Errors
    ///
    /// Returns `NotMapped` when the table has no class mapping,
    /// `TypeMismatch` when `T` is not the mapped class, or a
    /// deserialization error.
    pub fn get_mapped<T: Any>(&self, key: &Key) -> CoreResult<Option<T>> {
        Ok(self.table.get_mapped(key)?)
    }

    /// Deletes a row by primary key; returns whether it existed.
    pub fn delete(&self, key: &Key) -> bool {
        self.table.delete(key)
    }

    /// Removes all rows.
    pub fn clear(&self) {
        self.table.clear();
    }

    /// All rows with their keys, in key order.
    #[must_use]
    pub fn rows(&self) -> Vec<(Key, Row)> {
        self.table.rows()
    }

    /// Applies `f` to every row in place.
    pub fn modify(&self, f: impl FnMut(&Key, &mut Row)) {
        self.table.modify(f);
    }
}

fn to_rows<T: Serialize>(items: &[T]) -> CoreResult<Vec<Row>> {
    items
        .iter()
        .map(|item| Ok(serde_json::to_value(item)?))
        .collect()
}
