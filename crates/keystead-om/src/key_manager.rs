//! Key lifecycle: open, allocate further blocks, look up
//!
//! Lock discipline, always coarse to fine:
//!
//! | operation        | bucket path | key path |
//! |------------------|-------------|----------|
//! | `open_key`       | write       | -        |
//! | `allocate_block` | read        | write    |
//! | `lookup_key`     | read        | read     |
//!
//! Opening serializes against every other operation in the bucket;
//! allocations on different keys of one bucket run concurrently, and
//! allocations on the same key are serialized by the key write lock.
//!
//! Chill mode is not pre-checked. Allocation is attempted and a
//! cluster-not-ready failure is returned to the caller with the upstream
//! message unchanged; nothing is retried and no metadata is written.

use crate::error::{OmError, OmResult};
use crate::lock::ResourcePath;
use crate::metadata::OmMetadataManager;
use crate::scm::{BlockLocationClient, ScmError};
use crate::types::{BlockLocation, KeyRecord, LocationVersion};
use keystead_common::{KeyRequest, ReplicationFactor, ReplicationType};
use keystead_common::config::OmConfig;
use keystead_token::BlockTokenAuthority;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Orchestrates block allocation, token minting and metadata updates
pub struct KeyManager {
    scm: Arc<dyn BlockLocationClient>,
    metadata: Arc<OmMetadataManager>,
    /// Allocation owner reported to the block-location service
    service_id: String,
    block_size: i64,
    lookup_open_keys: bool,
    /// Present only when block tokens are enabled
    token_authority: Option<Arc<BlockTokenAuthority>>,
}

impl KeyManager {
    pub fn new(
        scm: Arc<dyn BlockLocationClient>,
        metadata: Arc<OmMetadataManager>,
        config: &OmConfig,
        token_authority: Option<Arc<BlockTokenAuthority>>,
    ) -> Self {
        Self {
            scm,
            metadata,
            service_id: config.service_id.clone(),
            block_size: config.block_size,
            lookup_open_keys: config.lookup_open_keys,
            token_authority,
        }
    }

    #[must_use]
    pub fn metadata(&self) -> &OmMetadataManager {
        &self.metadata
    }

    #[must_use]
    pub const fn block_tokens_enabled(&self) -> bool {
        self.token_authority.is_some()
    }

    /// Start a new open session for a key with one freshly allocated block.
    ///
    /// The first location version is numbered one past the committed
    /// record's latest version (1 for a new key). An earlier open session
    /// for the same key is replaced.
    pub fn open_key(&self, req: &KeyRequest) -> OmResult<KeyRecord> {
        req.validate()?;
        let _bucket_lock = self
            .metadata
            .locks()
            .write(ResourcePath::bucket(&req.volume, &req.bucket));

        self.metadata.check_bucket_exists(&req.volume, &req.bucket)?;

        let version = self
            .metadata
            .get_key(&req.volume, &req.bucket, &req.key)?
            .map_or(1, |committed| committed.latest_version_number() + 1);

        let size = match req.data_size {
            Some(size) if size > 0 => size,
            _ => self.block_size,
        };
        let location =
            self.allocate_location(req, size, req.replication_type, req.replication_factor)?;

        let now = self.metadata.now();
        let record = KeyRecord {
            volume: req.volume.clone(),
            bucket: req.bucket.clone(),
            key: req.key.clone(),
            data_size: req.data_size.unwrap_or(0),
            creation_time: now,
            modification_time: now,
            replication_type: req.replication_type,
            replication_factor: req.replication_factor,
            versions: vec![LocationVersion::new(version, vec![location])],
        };
        self.metadata.put_open_key(&record)?;

        info!(
            "Opened key {} version {} with block {}",
            req, version, record.latest_locations()[0].block_id
        );
        Ok(record)
    }

    /// Allocate one more block for an open key and append it to `version`
    pub fn allocate_block(&self, req: &KeyRequest, version: u64) -> OmResult<BlockLocation> {
        req.validate()?;
        let locks = self.metadata.locks();
        let _bucket_lock = locks.read(ResourcePath::bucket(&req.volume, &req.bucket));
        let _key_lock = locks.write(ResourcePath::key(&req.volume, &req.bucket, &req.key));

        let mut record = self
            .metadata
            .get_open_key(&req.volume, &req.bucket, &req.key)?
            .filter(|r| r.version(version).is_some())
            .ok_or_else(|| OmError::KeyNotOpen {
                key: req.to_string(),
                version,
            })?;

        let location = self.allocate_location(
            req,
            self.block_size,
            record.replication_type,
            record.replication_factor,
        )?;

        record.append_location(version, location.clone());
        record.modification_time = self.metadata.now();
        self.metadata.put_open_key(&record)?;

        debug!(
            "Allocated block {} for key {} version {}",
            location.block_id, req, version
        );
        Ok(location)
    }

    /// Read a key, committed table first, then (if enabled) the open-key
    /// table. With block tokens enabled the latest version's tokens are
    /// re-minted so the caller always receives unexpired ones.
    pub fn lookup_key(&self, req: &KeyRequest) -> OmResult<KeyRecord> {
        req.validate()?;
        let locks = self.metadata.locks();
        let _bucket_lock = locks.read(ResourcePath::bucket(&req.volume, &req.bucket));
        let _key_lock = locks.read(ResourcePath::key(&req.volume, &req.bucket, &req.key));

        let committed = self.metadata.get_key(&req.volume, &req.bucket, &req.key)?;
        let mut record = match committed {
            Some(record) => record,
            None if self.lookup_open_keys => self
                .metadata
                .get_open_key(&req.volume, &req.bucket, &req.key)?
                .ok_or_else(|| OmError::KeyNotFound(req.to_string()))?,
            None => return Err(OmError::KeyNotFound(req.to_string())),
        };

        if let Some(authority) = &self.token_authority {
            let owner = self.token_owner(req);
            if let Some(latest) = record.latest_version_mut() {
                for location in &mut latest.locations {
                    location.token =
                        Some(authority.mint(owner, location.block_id, location.length)?);
                }
            }
        }

        Ok(record)
    }

    fn allocate_location(
        &self,
        req: &KeyRequest,
        size: i64,
        replication_type: ReplicationType,
        replication_factor: ReplicationFactor,
    ) -> OmResult<BlockLocation> {
        let block = self
            .scm
            .allocate(size, replication_type, replication_factor, &self.service_id)
            .map_err(|e| {
                match &e {
                    ScmError::ClusterNotReady(msg) => {
                        warn!("Block allocation for {} refused: {}", req, msg);
                    }
                    other => warn!("Block allocation for {} failed: {}", req, other),
                }
                OmError::from(e)
            })?;

        let token = match &self.token_authority {
            Some(authority) => Some(authority.mint(self.token_owner(req), block.block_id, size)?),
            None => None,
        };

        Ok(BlockLocation {
            block_id: block.block_id,
            offset: 0,
            length: size,
            token,
        })
    }

    fn token_owner<'a>(&'a self, req: &'a KeyRequest) -> &'a str {
        req.user.as_deref().unwrap_or(&self.service_id)
    }
}
