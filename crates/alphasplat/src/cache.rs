use std::collections::HashMap;
use std::sync::Arc;

use log::debug;
use parking_lot::RwLock;

use crate::error::Result;
use crate::lut::{AlphaLookupTable, LookupConfig};

/// Memoized lookup tables, one per [`LookupConfig`].
///
/// Read-mostly: lookups take a shared lock, builds happen outside any lock.
/// Dropping entries is always safe since a rebuild yields the same table.
#[derive(Debug, Default)]
pub struct LookupCache {
    tables: RwLock<HashMap<LookupConfig, Arc<AlphaLookupTable>>>,
}

impl LookupCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared table for `config`, building it on first request.
    pub fn get_or_build(&self, config: LookupConfig) -> Result<Arc<AlphaLookupTable>> {
        if let Some(table) = self.tables.read().get(&config) {
            return Ok(Arc::clone(table));
        }

        debug!(
            "Lookup cache miss for {}x{}",
            config.max_width, config.alpha_resolution
        );
        let built = Arc::new(AlphaLookupTable::build(config)?);

        // Another thread may have raced us here; keep whichever landed first.
        let mut tables = self.tables.write();
        Ok(Arc::clone(tables.entry(config).or_insert(built)))
    }

    /// Drop every cached table.
    pub fn invalidate(&self) {
        self.tables.write().clear();
    }

    pub fn len(&self) -> usize {
        self.tables.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
