//! The block token credential: identifier bytes plus detached signature

use crate::error::{TokenError, TokenResult};
use crate::identifier::TokenIdentifier;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Length of an Ed25519 signature
pub const SIGNATURE_LEN: usize = ed25519_dalek::SIGNATURE_LENGTH;

/// Signed, immutable block access credential
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockToken {
    identifier: Vec<u8>,
    signature: Vec<u8>,
}

impl BlockToken {
    /// Assemble a token from already-encoded parts
    #[must_use]
    pub const fn from_parts(identifier: Vec<u8>, signature: Vec<u8>) -> Self {
        Self {
            identifier,
            signature,
        }
    }

    /// The encoded identifier, exactly as signed
    #[must_use]
    pub fn identifier_bytes(&self) -> &[u8] {
        &self.identifier
    }

    #[must_use]
    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.identifier.is_empty() && self.signature.is_empty()
    }

    /// Parse the identifier without checking kind, expiry or signature
    pub fn decode_identifier(&self) -> TokenResult<TokenIdentifier> {
        TokenIdentifier::decode(&self.identifier)
    }

    /// Wire form: `identifier_bytes || signature_bytes`
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.identifier.len() + self.signature.len());
        out.extend_from_slice(&self.identifier);
        out.extend_from_slice(&self.signature);
        out
    }

    /// Split the wire form; the signature is the trailing [`SIGNATURE_LEN`] bytes
    pub fn from_bytes(bytes: &[u8]) -> TokenResult<Self> {
        if bytes.len() <= SIGNATURE_LEN {
            return Err(TokenError::Malformed(format!(
                "token is {} bytes, shorter than a signature plus identifier",
                bytes.len()
            )));
        }
        let (identifier, signature) = bytes.split_at(bytes.len() - SIGNATURE_LEN);
        Ok(Self::from_parts(identifier.to_vec(), signature.to_vec()))
    }
}

impl fmt::Debug for BlockToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.decode_identifier() {
            Ok(id) => f
                .debug_struct("BlockToken")
                .field("kind", &id.kind)
                .field("owner", &id.owner)
                .field("block_id", &id.block_id)
                .field("expiry_time", &id.expiry_time)
                .finish_non_exhaustive(),
            Err(_) => f
                .debug_struct("BlockToken")
                .field("identifier_len", &self.identifier.len())
                .field("signature_len", &self.signature.len())
                .finish(),
        }
    }
}
