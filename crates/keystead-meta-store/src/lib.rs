//! Keystead Metadata Store - durable byte-keyed tables
//!
//! This crate defines the `MetadataStore` capability consumed by the key
//! manager (get/put/delete over the volume, bucket, open-key and key
//! tables) and provides a redb-backed and an in-memory implementation.

pub mod memory;
pub mod store;
pub mod tables;

// Re-exports
pub use memory::InMemoryMetaStore;
pub use store::{MetaStoreError, MetaStoreResult, MetadataStore, RedbMetaStore};
pub use tables::Table;
