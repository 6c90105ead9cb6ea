//! Typed access to the metadata tables
//!
//! Table keys are plain concatenations: `/volume`, `/volume/bucket` and
//! `/volume/bucket/key`. Volume and bucket names never contain `/`, so each
//! name triple has exactly one table key even when the key name does. The
//! open-key and key tables use the same key encoding; the table tells the
//! two states apart.

use crate::error::{OmError, OmResult, ResourceKind};
use crate::lock::{ResourceLockManager, ResourcePath};
use crate::types::{BucketInfo, KeyRecord, VolumeInfo};
use keystead_common::{validate_bucket_name, validate_volume_name};
use keystead_meta_store::{MetadataStore, Table};
use keystead_token::{Clock, SystemClock};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::info;

/// Metadata tables plus the resource locks guarding them
pub struct OmMetadataManager {
    store: Arc<dyn MetadataStore>,
    locks: ResourceLockManager,
    clock: Arc<dyn Clock>,
}

impl OmMetadataManager {
    pub fn new(store: Arc<dyn MetadataStore>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<dyn MetadataStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            locks: ResourceLockManager::new(),
            clock,
        }
    }

    #[must_use]
    pub const fn locks(&self) -> &ResourceLockManager {
        &self.locks
    }

    #[must_use]
    pub fn store(&self) -> &dyn MetadataStore {
        self.store.as_ref()
    }

    #[must_use]
    pub fn now(&self) -> i64 {
        self.clock.now_millis()
    }

    // ---- Key encoding ----

    #[must_use]
    pub fn volume_key(volume: &str) -> Vec<u8> {
        format!("/{volume}").into_bytes()
    }

    #[must_use]
    pub fn bucket_key(volume: &str, bucket: &str) -> Vec<u8> {
        format!("/{volume}/{bucket}").into_bytes()
    }

    #[must_use]
    pub fn ozone_key(volume: &str, bucket: &str, key: &str) -> Vec<u8> {
        format!("/{volume}/{bucket}/{key}").into_bytes()
    }

    // ---- Volumes / buckets ----

    /// Register a volume
    pub fn create_volume(&self, volume: &str, owner: &str) -> OmResult<VolumeInfo> {
        validate_volume_name(volume)?;
        let _lock = self.locks.write(ResourcePath::volume(volume));
        let db_key = Self::volume_key(volume);
        if self.store.contains(Table::Volumes, &db_key)? {
            return Err(OmError::ResourceExists {
                resource: ResourceKind::Volume,
                name: volume.to_string(),
            });
        }
        let info = VolumeInfo {
            name: volume.to_string(),
            owner: owner.to_string(),
            creation_time: self.now(),
        };
        self.put_record(Table::Volumes, &db_key, &info)?;
        info!("Created volume {}", volume);
        Ok(info)
    }

    /// Register a bucket in an existing volume
    pub fn create_bucket(&self, volume: &str, bucket: &str) -> OmResult<BucketInfo> {
        validate_volume_name(volume)?;
        validate_bucket_name(bucket)?;
        let _volume_lock = self.locks.read(ResourcePath::volume(volume));
        let _bucket_lock = self.locks.write(ResourcePath::bucket(volume, bucket));
        if !self.store.contains(Table::Volumes, &Self::volume_key(volume))? {
            return Err(OmError::ResourceNotFound {
                resource: ResourceKind::Volume,
                name: volume.to_string(),
            });
        }
        let db_key = Self::bucket_key(volume, bucket);
        if self.store.contains(Table::Buckets, &db_key)? {
            return Err(OmError::ResourceExists {
                resource: ResourceKind::Bucket,
                name: format!("{volume}/{bucket}"),
            });
        }
        let info = BucketInfo {
            volume: volume.to_string(),
            name: bucket.to_string(),
            creation_time: self.now(),
        };
        self.put_record(Table::Buckets, &db_key, &info)?;
        info!("Created bucket {}/{}", volume, bucket);
        Ok(info)
    }

    pub fn get_volume(&self, volume: &str) -> OmResult<Option<VolumeInfo>> {
        self.get_record(Table::Volumes, &Self::volume_key(volume))
    }

    pub fn get_bucket(&self, volume: &str, bucket: &str) -> OmResult<Option<BucketInfo>> {
        self.get_record(Table::Buckets, &Self::bucket_key(volume, bucket))
    }

    /// Fail with `ResourceNotFound` unless both volume and bucket exist
    pub fn check_bucket_exists(&self, volume: &str, bucket: &str) -> OmResult<()> {
        if !self.store.contains(Table::Volumes, &Self::volume_key(volume))? {
            return Err(OmError::ResourceNotFound {
                resource: ResourceKind::Volume,
                name: volume.to_string(),
            });
        }
        if !self
            .store
            .contains(Table::Buckets, &Self::bucket_key(volume, bucket))?
        {
            return Err(OmError::ResourceNotFound {
                resource: ResourceKind::Bucket,
                name: format!("{volume}/{bucket}"),
            });
        }
        Ok(())
    }

    // ---- Keys ----

    pub fn get_open_key(&self, volume: &str, bucket: &str, key: &str) -> OmResult<Option<KeyRecord>> {
        self.get_record(Table::OpenKeys, &Self::ozone_key(volume, bucket, key))
    }

    pub fn put_open_key(&self, record: &KeyRecord) -> OmResult<()> {
        let db_key = Self::ozone_key(&record.volume, &record.bucket, &record.key);
        self.put_record(Table::OpenKeys, &db_key, record)
    }

    pub fn delete_open_key(&self, volume: &str, bucket: &str, key: &str) -> OmResult<()> {
        Ok(self
            .store
            .delete(Table::OpenKeys, &Self::ozone_key(volume, bucket, key))?)
    }

    /// Committed key record
    pub fn get_key(&self, volume: &str, bucket: &str, key: &str) -> OmResult<Option<KeyRecord>> {
        self.get_record(Table::Keys, &Self::ozone_key(volume, bucket, key))
    }

    pub fn put_key(&self, record: &KeyRecord) -> OmResult<()> {
        let db_key = Self::ozone_key(&record.volume, &record.bucket, &record.key);
        self.put_record(Table::Keys, &db_key, record)
    }

    // ---- Generic helpers ----

    fn get_record<T: DeserializeOwned>(&self, table: Table, db_key: &[u8]) -> OmResult<Option<T>> {
        self.store
            .get(table, db_key)?
            .map(|bytes| bincode::deserialize(&bytes).map_err(OmError::from))
            .transpose()
    }

    fn put_record<T: Serialize>(&self, table: Table, db_key: &[u8], value: &T) -> OmResult<()> {
        let bytes = bincode::serialize(value)?;
        self.store.put(table, db_key, &bytes)?;
        Ok(())
    }
}
