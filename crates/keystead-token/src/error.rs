//! Block token error types

use thiserror::Error;

/// Block token minting and verification errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("block token authority has not been started")]
    NotInitialized,

    #[error("block token authority is already started")]
    AlreadyStarted,

    #[error("token kind mismatch: expected {expected}, got {actual}")]
    KindMismatch { expected: String, actual: String },

    #[error("block token expired at {expiry_time} (now {now})")]
    Expired { expiry_time: i64, now: i64 },

    #[error("block token signature is invalid")]
    SignatureInvalid,

    #[error("malformed block token: {0}")]
    Malformed(String),

    #[error("invalid signing key: {0}")]
    InvalidKey(String),
}

impl TokenError {
    /// True for failures a verifying party reports as an authentication failure
    #[must_use]
    pub const fn is_authentication_failure(&self) -> bool {
        matches!(
            self,
            Self::KindMismatch { .. } | Self::Expired { .. } | Self::SignatureInvalid | Self::Malformed(_)
        )
    }
}

/// Result type for token operations
pub type TokenResult<T> = Result<T, TokenError>;
