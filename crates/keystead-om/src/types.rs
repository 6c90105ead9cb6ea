//! Persisted metadata records.
//!
//! Records are bincode-encoded by [`crate::OmMetadataManager`].

use keystead_common::{BlockId, ReplicationFactor, ReplicationType};
use keystead_token::BlockToken;
use serde::{Deserialize, Serialize};

/// Volume record; presence is all the key manager checks
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeInfo {
    pub name: String,
    pub owner: String,
    pub creation_time: i64,
}

/// Bucket record
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketInfo {
    pub volume: String,
    pub name: String,
    pub creation_time: i64,
}

/// One physical block of a key
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockLocation {
    pub block_id: BlockId,
    pub offset: i64,
    pub length: i64,
    /// Absent when block tokens are disabled
    pub token: Option<BlockToken>,
}

/// One generation of a key's physical layout; locations are append-only
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationVersion {
    pub version: u64,
    pub locations: Vec<BlockLocation>,
}

impl LocationVersion {
    #[must_use]
    pub const fn new(version: u64, locations: Vec<BlockLocation>) -> Self {
        Self { version, locations }
    }
}

/// Key metadata, stored in the open-key or the key table
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRecord {
    pub volume: String,
    pub bucket: String,
    pub key: String,
    pub data_size: i64,
    pub creation_time: i64,
    pub modification_time: i64,
    pub replication_type: ReplicationType,
    pub replication_factor: ReplicationFactor,
    /// Ordered by strictly increasing version number
    pub versions: Vec<LocationVersion>,
}

impl KeyRecord {
    /// The version consumers read
    #[must_use]
    pub fn latest_version(&self) -> Option<&LocationVersion> {
        self.versions.last()
    }

    pub fn latest_version_mut(&mut self) -> Option<&mut LocationVersion> {
        self.versions.last_mut()
    }

    /// Number of the latest version, 0 if none exist yet
    #[must_use]
    pub fn latest_version_number(&self) -> u64 {
        self.latest_version().map_or(0, |v| v.version)
    }

    #[must_use]
    pub fn version(&self, version: u64) -> Option<&LocationVersion> {
        self.versions.iter().find(|v| v.version == version)
    }

    /// Blocks of the latest version (empty if none)
    #[must_use]
    pub fn latest_locations(&self) -> &[BlockLocation] {
        self.latest_version()
            .map(|v| v.locations.as_slice())
            .unwrap_or_default()
    }

    /// Append a block to `version`. Returns false if the version is unknown.
    pub fn append_location(&mut self, version: u64, location: BlockLocation) -> bool {
        match self.versions.iter_mut().find(|v| v.version == version) {
            Some(v) => {
                v.locations.push(location);
                true
            }
            None => false,
        }
    }

    /// Table key path `/volume/bucket/key`
    #[must_use]
    pub fn path(&self) -> String {
        format!("/{}/{}/{}", self.volume, self.bucket, self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location(container: i64, local: i64) -> BlockLocation {
        BlockLocation {
            block_id: BlockId::new(container, local),
            offset: 0,
            length: 1000,
            token: None,
        }
    }

    fn record() -> KeyRecord {
        KeyRecord {
            volume: "vol1".to_string(),
            bucket: "bucket1".to_string(),
            key: "key1".to_string(),
            data_size: 1000,
            creation_time: 1,
            modification_time: 1,
            replication_type: ReplicationType::StandAlone,
            replication_factor: ReplicationFactor::One,
            versions: vec![
                LocationVersion::new(1, vec![location(1, 1)]),
                LocationVersion::new(2, vec![location(1, 2)]),
            ],
        }
    }

    #[test]
    fn test_latest_version() {
        let rec = record();
        assert_eq!(rec.latest_version_number(), 2);
        assert_eq!(rec.latest_locations()[0].block_id, BlockId::new(1, 2));
        assert_eq!(rec.path(), "/vol1/bucket1/key1");
    }

    #[test]
    fn test_append_location() {
        let mut rec = record();
        assert!(rec.append_location(1, location(1, 3)));
        assert_eq!(rec.version(1).unwrap().locations.len(), 2);
        assert_eq!(rec.latest_locations().len(), 1);
        assert!(!rec.append_location(7, location(1, 4)));
    }

    #[test]
    fn test_empty_record() {
        let mut rec = record();
        rec.versions.clear();
        assert_eq!(rec.latest_version_number(), 0);
        assert!(rec.latest_locations().is_empty());
    }
}
