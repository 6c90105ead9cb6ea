//! Core type definitions for Keystead
//!
//! This module defines the client-facing request type, replication
//! settings and the physical block identifier shared by the key manager,
//! the token authority and the block-location client.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Replication scheme requested for a block's physical placement
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReplicationType {
    /// Single copy, no pipeline
    #[default]
    StandAlone,
    /// Raft-replicated pipeline
    Ratis,
    /// Chained replication
    Chained,
}

impl ReplicationType {
    /// Wire name of the replication type
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::StandAlone => "STAND_ALONE",
            Self::Ratis => "RATIS",
            Self::Chained => "CHAINED",
        }
    }
}

impl fmt::Display for ReplicationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Degree of redundancy requested for a block
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReplicationFactor {
    #[default]
    One,
    Three,
}

impl ReplicationFactor {
    /// Number of replicas
    #[must_use]
    pub const fn replicas(&self) -> u8 {
        match self {
            Self::One => 1,
            Self::Three => 3,
        }
    }
}

impl fmt::Display for ReplicationFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::One => f.write_str("ONE"),
            Self::Three => f.write_str("THREE"),
        }
    }
}

/// Physical block reference: container plus container-local id
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display)]
#[display("conID: {container_id} locID: {local_id}")]
pub struct BlockId {
    pub container_id: i64,
    pub local_id: i64,
}

impl BlockId {
    #[must_use]
    pub const fn new(container_id: i64, local_id: i64) -> Self {
        Self {
            container_id,
            local_id,
        }
    }
}

/// Client-supplied arguments for a key operation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRequest {
    pub volume: String,
    pub bucket: String,
    pub key: String,
    /// Requested data size in bytes (None = use the minimum chunk size)
    pub data_size: Option<i64>,
    pub replication_type: ReplicationType,
    pub replication_factor: ReplicationFactor,
    /// Identity the issued block tokens are bound to (None = service identity)
    pub user: Option<String>,
}

impl KeyRequest {
    /// Create a request with default replication and no size hint
    pub fn new(
        volume: impl Into<String>,
        bucket: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            volume: volume.into(),
            bucket: bucket.into(),
            key: key.into(),
            data_size: None,
            replication_type: ReplicationType::default(),
            replication_factor: ReplicationFactor::default(),
            user: None,
        }
    }

    #[must_use]
    pub const fn with_data_size(mut self, size: i64) -> Self {
        self.data_size = Some(size);
        self
    }

    #[must_use]
    pub const fn with_replication(
        mut self,
        replication_type: ReplicationType,
        replication_factor: ReplicationFactor,
    ) -> Self {
        self.replication_type = replication_type;
        self.replication_factor = replication_factor;
        self
    }

    #[must_use]
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Check the request invariants: non-empty names, no separator in the
    /// volume or bucket name, non-negative size
    pub fn validate(&self) -> Result<(), RequestError> {
        validate_volume_name(&self.volume)?;
        validate_bucket_name(&self.bucket)?;
        if self.key.is_empty() {
            return Err(RequestError::EmptyKey);
        }
        if let Some(size) = self.data_size
            && size < 0
        {
            return Err(RequestError::NegativeSize(size));
        }
        Ok(())
    }
}

impl fmt::Display for KeyRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}/{}", self.volume, self.bucket, self.key)
    }
}

/// Separator of the volume, bucket and key components in resource paths
/// and table keys. Keys may contain it; volume and bucket names may not,
/// which keeps every `/volume/bucket/key` string unambiguous.
pub const PATH_SEPARATOR: char = '/';

pub fn validate_volume_name(volume: &str) -> Result<(), RequestError> {
    if volume.is_empty() {
        return Err(RequestError::EmptyVolume);
    }
    if volume.contains(PATH_SEPARATOR) {
        return Err(RequestError::InvalidVolumeName(volume.to_string()));
    }
    Ok(())
}

pub fn validate_bucket_name(bucket: &str) -> Result<(), RequestError> {
    if bucket.is_empty() {
        return Err(RequestError::EmptyBucket);
    }
    if bucket.contains(PATH_SEPARATOR) {
        return Err(RequestError::InvalidBucketName(bucket.to_string()));
    }
    Ok(())
}

/// Errors raised by [`KeyRequest::validate`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("volume name must not be empty")]
    EmptyVolume,
    #[error("bucket name must not be empty")]
    EmptyBucket,
    #[error("volume name must not contain '/': {0}")]
    InvalidVolumeName(String),
    #[error("bucket name must not contain '/': {0}")]
    InvalidBucketName(String),
    #[error("key name must not be empty")]
    EmptyKey,
    #[error("data size must not be negative: {0}")]
    NegativeSize(i64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_validation() {
        let req = KeyRequest::new("vol1", "bucket1", "key1").with_data_size(1000);
        assert!(req.validate().is_ok());

        assert_eq!(
            KeyRequest::new("", "bucket1", "key1").validate(),
            Err(RequestError::EmptyVolume)
        );
        assert_eq!(
            KeyRequest::new("vol1", "", "key1").validate(),
            Err(RequestError::EmptyBucket)
        );
        assert_eq!(
            KeyRequest::new("vol1", "bucket1", "").validate(),
            Err(RequestError::EmptyKey)
        );
        assert_eq!(
            KeyRequest::new("vol1", "bucket1", "key1")
                .with_data_size(-1)
                .validate(),
            Err(RequestError::NegativeSize(-1))
        );
    }

    #[test]
    fn test_separator_only_allowed_in_keys() {
        assert_eq!(
            KeyRequest::new("a/b", "c", "k").validate(),
            Err(RequestError::InvalidVolumeName("a/b".to_string()))
        );
        assert_eq!(
            KeyRequest::new("a", "b/c", "k").validate(),
            Err(RequestError::InvalidBucketName("b/c".to_string()))
        );
        assert!(KeyRequest::new("a", "b", "c/k").validate().is_ok());
        assert!(KeyRequest::new("a", "b", "/c//k/").validate().is_ok());
        assert_eq!(validate_volume_name(""), Err(RequestError::EmptyVolume));
        assert_eq!(validate_bucket_name(""), Err(RequestError::EmptyBucket));
        assert!(validate_bucket_name("bucket-1.x").is_ok());
    }

    #[test]
    fn test_zero_size_is_valid() {
        let req = KeyRequest::new("vol1", "bucket1", "key1").with_data_size(0);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_display() {
        let req = KeyRequest::new("vol1", "bucket1", "key1");
        assert_eq!(req.to_string(), "/vol1/bucket1/key1");
        assert_eq!(BlockId::new(1, 2).to_string(), "conID: 1 locID: 2");
        assert_eq!(ReplicationType::StandAlone.to_string(), "STAND_ALONE");
        assert_eq!(ReplicationFactor::Three.replicas(), 3);
    }
}
