//! Redb table definitions for persistent metadata storage.

use redb::TableDefinition;
use std::fmt;

pub const VOLUMES: TableDefinition<&[u8], &[u8]> = TableDefinition::new("volumes");
pub const BUCKETS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("buckets");
// Keys whose blocks are still being allocated
pub const OPEN_KEYS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("open_keys");
// Committed keys
pub const KEYS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("keys");

/// The four metadata tables
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Table {
    Volumes,
    Buckets,
    OpenKeys,
    Keys,
}

impl Table {
    pub const ALL: [Self; 4] = [Self::Volumes, Self::Buckets, Self::OpenKeys, Self::Keys];

    #[must_use]
    pub const fn definition(self) -> TableDefinition<'static, &'static [u8], &'static [u8]> {
        match self {
            Self::Volumes => VOLUMES,
            Self::Buckets => BUCKETS,
            Self::OpenKeys => OPEN_KEYS,
            Self::Keys => KEYS,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Volumes => "volumes",
            Self::Buckets => "buckets",
            Self::OpenKeys => "open_keys",
            Self::Keys => "keys",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
