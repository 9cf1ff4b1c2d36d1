//! Class-mapping registrar.
//!
//! After a migration lands, each configured table that carries a class
//! mapping gets its materializer bound on the live engine table. Tables
//! without a mapping are left untouched; tombstone entries are skipped.

use crate::config::StoreConfigMap;
use crate::error::{CoreError, CoreResult};
use tabula_engine::Engine;
use tracing::debug;

/// Binds the class mappings declared in `configs` onto the engine's tables.
pub(crate) fn register_classes(engine: &Engine, configs: &StoreConfigMap) -> CoreResult<()> {
    for (name, config) in configs {
        let Some(config) = config else { continue };
        let Some(class) = config.class() else { continue };
        let table = engine
            .table(name)
            .map_err(|_| CoreError::TableNotFound { name: name.clone() })?;
        table.map_to_class(class.clone());
        debug!(table = %name, class = class.type_name(), "bound class mapping");
    }
    Ok(())
}
