//! Key manager error types

use crate::scm::ScmError;
use keystead_common::RequestError;
use keystead_meta_store::MetaStoreError;
use keystead_token::TokenError;
use std::fmt;
use thiserror::Error;

/// Kind of a named metadata resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Volume,
    Bucket,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Volume => f.write_str("volume"),
            Self::Bucket => f.write_str("bucket"),
        }
    }
}

/// Key manager error
#[derive(Debug, Error)]
pub enum OmError {
    /// The block-location service is in chill mode; the message is the
    /// upstream reason, verbatim
    #[error("{0}")]
    ClusterNotReady(String),

    /// Any other block allocation failure
    #[error("block allocation failed: {0}")]
    BlockAllocation(String),

    #[error("{resource} not found: {name}")]
    ResourceNotFound { resource: ResourceKind, name: String },

    #[error("{resource} already exists: {name}")]
    ResourceExists { resource: ResourceKind, name: String },

    #[error("key is not open: {key} (version {version})")]
    KeyNotOpen { key: String, version: u64 },

    #[error("key not found: {0}")]
    KeyNotFound(String),

    #[error("invalid request: {0}")]
    InvalidRequest(#[from] RequestError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("metadata store error: {0}")]
    Store(#[from] MetaStoreError),

    #[error("record codec error: {0}")]
    Codec(#[from] bincode::Error),
}

impl From<ScmError> for OmError {
    fn from(e: ScmError) -> Self {
        match e {
            ScmError::ClusterNotReady(msg) => Self::ClusterNotReady(msg),
            other => Self::BlockAllocation(other.to_string()),
        }
    }
}

impl OmError {
    /// The caller may retry later; nothing in this crate retries on its own
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ClusterNotReady(_))
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::ResourceNotFound { .. } | Self::KeyNotFound(_) | Self::KeyNotOpen { .. }
        )
    }

    /// Stable result code for callers matching on failure class
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::ClusterNotReady(_) => "CHILL_MODE",
            Self::BlockAllocation(_) => "BLOCK_ALLOCATION_FAILED",
            Self::ResourceNotFound {
                resource: ResourceKind::Volume,
                ..
            } => "VOLUME_NOT_FOUND",
            Self::ResourceNotFound {
                resource: ResourceKind::Bucket,
                ..
            } => "BUCKET_NOT_FOUND",
            Self::ResourceExists { .. } => "ALREADY_EXISTS",
            Self::KeyNotOpen { .. } => "KEY_NOT_OPEN",
            Self::KeyNotFound(_) => "KEY_NOT_FOUND",
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::Token(TokenError::NotInitialized) => "TOKEN_AUTHORITY_NOT_STARTED",
            Self::Token(_) => "TOKEN_ERROR",
            Self::Store(_) | Self::Codec(_) => "METADATA_ERROR",
        }
    }
}

/// Result type for key manager operations
pub type OmResult<T> = Result<T, OmError>;
