//! Typed row materialization.

use crate::error::{EngineError, EngineResult};
use crate::table::Row;
use serde::de::DeserializeOwned;
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

/// A registered row-to-type mapping.
///
/// A materializer binds a table to a concrete Rust type: reads through
/// [`crate::Table::get_mapped`] decode rows into instances of that type
/// instead of plain rows. The decode function is type-erased so table
/// configurations stay object-safe; the original type is recovered through
/// a `TypeId` check at read time.
#[derive(Clone)]
pub struct Materializer {
    type_name: &'static str,
    type_id: TypeId,
    decode: Arc<dyn Fn(Row) -> EngineResult<Box<dyn Any + Send + Sync>> + Send + Sync>,
}

impl Materializer {
    /// Creates a materializer for `T`.
    #[must_use]
    pub fn of<T>() -> Self
    where
        T: DeserializeOwned + Any + Send + Sync,
    {
        Self {
            type_name: std::any::type_name::<T>(),
            type_id: TypeId::of::<T>(),
            decode: Arc::new(|row| {
                serde_json::from_value::<T>(row)
                    .map(|v| Box::new(v) as Box<dyn Any + Send + Sync>)
                    .map_err(|e| EngineError::Deserialize {
                        message: e.to_string(),
                    })
            }),
        }
    }

    /// Name of the mapped type, for diagnostics.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Decodes a row into `T`.
    ///
    /// # Errors
    ///
    /// Returns `TypeMismatch` when `T` is not the mapped type, or
    /// `Deserialize` when the row does not fit it.
    pub fn materialize<T: Any>(&self, row: Row) -> EngineResult<T> {
        if TypeId::of::<T>() != self.type_id {
            return Err(EngineError::TypeMismatch {
                mapped: self.type_name,
                requested: std::any::type_name::<T>(),
            });
        }
        let boxed = (self.decode)(row)?;
        boxed
            .downcast::<T>()
            .map(|v| *v)
            .map_err(|_| EngineError::TypeMismatch {
                mapped: self.type_name,
                requested: std::any::type_name::<T>(),
            })
    }
}

impl fmt::Debug for Materializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Materializer")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}
