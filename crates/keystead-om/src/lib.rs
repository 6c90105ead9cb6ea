//! Keystead Ozone Manager core
//!
//! This crate turns client key requests into block allocations on the
//! block-location service, secures every block with a signed token and
//! records the result in the metadata tables.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────┐
//! │          KeyManager          │  open / allocate / lookup
//! └──┬──────────┬─────────┬──────┘
//!    │          │         │
//! ┌──▼───────┐ ┌▼───────┐ ┌▼─────────────────┐
//! │ Resource │ │ Block  │ │ BlockLocation    │
//! │ Locks    │ │ Tokens │ │ Client (SCM)     │
//! └──┬───────┘ └────────┘ └──────────────────┘
//!    │
//! ┌──▼───────────────────────────┐
//! │ OmMetadataManager            │  volumes / buckets / open keys / keys
//! └──────────────────────────────┘
//! ```

pub mod error;
pub mod key_manager;
pub mod lock;
pub mod metadata;
pub mod scm;
pub mod types;

pub use error::{OmError, OmResult, ResourceKind};
pub use key_manager::KeyManager;
pub use lock::{LockMode, ResourceLockGuard, ResourceLockManager, ResourcePath};
pub use metadata::OmMetadataManager;
pub use scm::{AllocatedBlock, BlockLocationClient, CHILL_MODE_MESSAGE, LocalBlockAllocator, ScmError};
pub use types::{BlockLocation, BucketInfo, KeyRecord, LocationVersion, VolumeInfo};
