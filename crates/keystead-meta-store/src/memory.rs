//! In-memory metadata store

use crate::store::{MetaStoreResult, MetadataStore};
use crate::tables::Table;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Metadata store held entirely in memory; contents are lost on drop.
#[derive(Default)]
pub struct InMemoryMetaStore {
    tables: RwLock<HashMap<(Table, Vec<u8>), Vec<u8>>>,
}

impl InMemoryMetaStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries in one table
    #[must_use]
    pub fn len(&self, table: Table) -> usize {
        self.tables.read().keys().filter(|(t, _)| *t == table).count()
    }
}

impl MetadataStore for InMemoryMetaStore {
    fn get(&self, table: Table, key: &[u8]) -> MetaStoreResult<Option<Vec<u8>>> {
        Ok(self.tables.read().get(&(table, key.to_vec())).cloned())
    }

    fn put(&self, table: Table, key: &[u8], value: &[u8]) -> MetaStoreResult<()> {
        self.tables
            .write()
            .insert((table, key.to_vec()), value.to_vec());
        Ok(())
    }

    fn delete(&self, table: Table, key: &[u8]) -> MetaStoreResult<()> {
        self.tables.write().remove(&(table, key.to_vec()));
        Ok(())
    }
}
