//! Block-location service client
//!
//! The key manager consumes block allocation through the narrow
//! [`BlockLocationClient`] capability. Remote and in-process allocators
//! are both plain implementations of it.

use keystead_common::{BlockId, ReplicationFactor, ReplicationType};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use thiserror::Error;
use tracing::{debug, info};

/// Reason reported while the cluster refuses allocations
pub const CHILL_MODE_MESSAGE: &str = "ChillModePrecheck failed for allocateBlock";

/// Block allocation failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScmError {
    /// Chill mode: storage is not ready to place blocks yet
    #[error("{0}")]
    ClusterNotReady(String),

    #[error("block location service unavailable: {0}")]
    Unavailable(String),

    #[error("allocation rejected: {0}")]
    Rejected(String),
}

/// A block placed by the block-location service
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AllocatedBlock {
    pub block_id: BlockId,
}

/// Allocates physical blocks. Calls block the caller for the full remote
/// round trip; failures are returned as-is, never retried here.
pub trait BlockLocationClient: Send + Sync {
    fn allocate(
        &self,
        size: i64,
        replication_type: ReplicationType,
        replication_factor: ReplicationFactor,
        owner: &str,
    ) -> Result<AllocatedBlock, ScmError>;
}

/// In-process allocator handing out sequential local ids in one container
#[derive(Debug)]
pub struct LocalBlockAllocator {
    container_id: i64,
    next_local_id: AtomicI64,
    chill_mode: AtomicBool,
}

impl LocalBlockAllocator {
    #[must_use]
    pub const fn new(container_id: i64, first_local_id: i64) -> Self {
        Self {
            container_id,
            next_local_id: AtomicI64::new(first_local_id),
            chill_mode: AtomicBool::new(false),
        }
    }

    /// Engage or leave chill mode
    pub fn set_chill_mode(&self, engaged: bool) {
        let was = self.chill_mode.swap(engaged, Ordering::SeqCst);
        if was != engaged {
            info!("Local allocator chill mode {}", if engaged { "on" } else { "off" });
        }
    }

    #[must_use]
    pub fn in_chill_mode(&self) -> bool {
        self.chill_mode.load(Ordering::SeqCst)
    }
}

impl BlockLocationClient for LocalBlockAllocator {
    fn allocate(
        &self,
        size: i64,
        replication_type: ReplicationType,
        replication_factor: ReplicationFactor,
        owner: &str,
    ) -> Result<AllocatedBlock, ScmError> {
        if self.in_chill_mode() {
            return Err(ScmError::ClusterNotReady(CHILL_MODE_MESSAGE.to_string()));
        }
        if size <= 0 {
            return Err(ScmError::Rejected(format!("block size must be positive, got {size}")));
        }

        let local_id = self.next_local_id.fetch_add(1, Ordering::SeqCst);
        let block_id = BlockId::new(self.container_id, local_id);
        debug!(
            "Allocated {} ({} bytes, {}/{}) for {}",
            block_id, size, replication_type, replication_factor, owner
        );
        Ok(AllocatedBlock { block_id })
    }
}
