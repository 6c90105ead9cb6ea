//! Metadata store capability and its redb-backed implementation.
//!
//! All writes are synchronous (write txn + commit), one transaction per
//! call. Cross-table atomicity is not offered; callers that need a
//! multi-step read-modify-write serialize it themselves.

use crate::tables::Table;
use redb::{Database, ReadableTable};
use std::path::Path;
use tracing::{debug, info};

/// Error type for metadata store operations
#[derive(Debug, thiserror::Error)]
pub enum MetaStoreError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::DatabaseError),
    #[error("redb storage error: {0}")]
    Storage(#[from] redb::StorageError),
    #[error("redb table error: {0}")]
    Table(#[from] redb::TableError),
    #[error("redb transaction error: {0}")]
    Transaction(Box<redb::TransactionError>),
    #[error("redb commit error: {0}")]
    Commit(#[from] redb::CommitError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<redb::TransactionError> for MetaStoreError {
    fn from(e: redb::TransactionError) -> Self {
        Self::Transaction(Box::new(e))
    }
}

pub type MetaStoreResult<T> = Result<T, MetaStoreError>;

/// Byte-keyed get/put/delete over the four metadata tables.
///
/// Implementations must be linearizable per key. Keys are used verbatim;
/// no normalization is applied between writes and reads.
pub trait MetadataStore: Send + Sync {
    fn get(&self, table: Table, key: &[u8]) -> MetaStoreResult<Option<Vec<u8>>>;

    fn put(&self, table: Table, key: &[u8], value: &[u8]) -> MetaStoreResult<()>;

    fn delete(&self, table: Table, key: &[u8]) -> MetaStoreResult<()>;

    fn contains(&self, table: Table, key: &[u8]) -> MetaStoreResult<bool> {
        Ok(self.get(table, key)?.is_some())
    }
}

/// Persistent metadata store backed by redb.
pub struct RedbMetaStore {
    db: Database,
}

impl RedbMetaStore {
    /// Open (or create) the redb database at the given path.
    pub fn open(path: impl AsRef<Path>) -> MetaStoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Create all tables eagerly so later read txns don't fail
        let write_txn = db.begin_write()?;
        for table in Table::ALL {
            let _t = write_txn.open_table(table.definition())?;
        }
        write_txn.commit()?;

        info!("Opened metadata store at {}", path.display());
        Ok(Self { db })
    }
}

impl MetadataStore for RedbMetaStore {
    fn get(&self, table: Table, key: &[u8]) -> MetaStoreResult<Option<Vec<u8>>> {
        let read_txn = self.db.begin_read()?;
        let t = read_txn.open_table(table.definition())?;
        Ok(t.get(key)?.map(|v| v.value().to_vec()))
    }

    fn put(&self, table: Table, key: &[u8], value: &[u8]) -> MetaStoreResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut t = write_txn.open_table(table.definition())?;
            t.insert(key, value)?;
        }
        write_txn.commit()?;
        debug!("put {} bytes into {}", value.len(), table);
        Ok(())
    }

    fn delete(&self, table: Table, key: &[u8]) -> MetaStoreResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut t = write_txn.open_table(table.definition())?;
            t.remove(key)?;
        }
        write_txn.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_put_get_delete() {
        let dir = tempdir().unwrap();
        let store = RedbMetaStore::open(dir.path().join("om.redb")).unwrap();

        store.put(Table::Keys, b"/vol1/bucket1/key1", b"record").unwrap();
        assert_eq!(
            store.get(Table::Keys, b"/vol1/bucket1/key1").unwrap(),
            Some(b"record".to_vec())
        );

        store.delete(Table::Keys, b"/vol1/bucket1/key1").unwrap();
        assert!(store.get(Table::Keys, b"/vol1/bucket1/key1").unwrap().is_none());
    }

    #[test]
    fn test_tables_are_separate() {
        let dir = tempdir().unwrap();
        let store = RedbMetaStore::open(dir.path().join("om.redb")).unwrap();

        store.put(Table::OpenKeys, b"k", b"open").unwrap();
        assert!(!store.contains(Table::Keys, b"k").unwrap());
        assert!(store.contains(Table::OpenKeys, b"k").unwrap());
        assert!(store.get(Table::Volumes, b"k").unwrap().is_none());
    }

    #[test]
    fn test_reopen_keeps_data() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("om.redb");
        {
            let store = RedbMetaStore::open(&path).unwrap();
            store.put(Table::Volumes, b"/vol1", b"v").unwrap();
        }
        let store = RedbMetaStore::open(&path).unwrap();
        assert_eq!(store.get(Table::Volumes, b"/vol1").unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn test_delete_missing_is_ok() {
        let dir = tempdir().unwrap();
        let store = RedbMetaStore::open(dir.path().join("om.redb")).unwrap();
        store.delete(Table::Buckets, b"/nope").unwrap();
    }
}
