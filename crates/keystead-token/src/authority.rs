//! Block token minting and verification
//!
//! A [`BlockTokenAuthority`] is created inert and activated once with a
//! signing key via [`BlockTokenAuthority::start`]. After that the key is
//! read-shared by every concurrent `mint`/`verify` call and never replaced.
//! Verification is pure: there is no revocation list, expiry is checked
//! lazily against the clock.

use crate::clock::Clock;
use crate::error::{TokenError, TokenResult};
use crate::identifier::{BLOCK_TOKEN_KIND, TokenIdentifier};
use crate::token::BlockToken;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use keystead_common::BlockId;
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, warn};

/// Generate a fresh random signing key
#[must_use]
pub fn generate_signing_key() -> SigningKey {
    SigningKey::generate(&mut rand::rngs::OsRng)
}

/// Load a signing key from a hex-encoded 32-byte seed
pub fn signing_key_from_hex(seed_hex: &str) -> TokenResult<SigningKey> {
    let bytes = hex::decode(seed_hex.trim())
        .map_err(|e| TokenError::InvalidKey(format!("seed is not hex: {e}")))?;
    let seed: [u8; 32] = bytes
        .try_into()
        .map_err(|_| TokenError::InvalidKey("seed must be 32 bytes".to_string()))?;
    Ok(SigningKey::from_bytes(&seed))
}

/// Issues signed, time-bounded tokens bound to one block and one owner
pub struct BlockTokenAuthority {
    /// Token lifetime in milliseconds
    expiry_ms: i64,
    clock: Arc<dyn Clock>,
    signing_key: OnceLock<SigningKey>,
}

impl BlockTokenAuthority {
    /// Create an authority that is not yet able to mint
    pub fn new(expiry_ms: i64, clock: Arc<dyn Clock>) -> Self {
        Self {
            expiry_ms,
            clock,
            signing_key: OnceLock::new(),
        }
    }

    /// Activate the authority with its signing identity
    pub fn start(&self, signing_key: SigningKey) -> TokenResult<()> {
        let fingerprint = hex::encode(&signing_key.verifying_key().as_bytes()[..8]);
        self.signing_key
            .set(signing_key)
            .map_err(|_| TokenError::AlreadyStarted)?;
        info!(
            "Block token authority started (key {}, expiry {} ms)",
            fingerprint, self.expiry_ms
        );
        Ok(())
    }

    #[must_use]
    pub fn is_started(&self) -> bool {
        self.signing_key.get().is_some()
    }

    #[must_use]
    pub const fn expiry_ms(&self) -> i64 {
        self.expiry_ms
    }

    /// Public half of the signing identity
    pub fn verifying_key(&self) -> TokenResult<VerifyingKey> {
        Ok(self.key()?.verifying_key())
    }

    /// A verifier that needs only the public key
    pub fn verifier(&self) -> TokenResult<BlockTokenVerifier> {
        Ok(BlockTokenVerifier::new(
            self.verifying_key()?,
            Arc::clone(&self.clock),
        ))
    }

    /// Mint a token for `owner` on `block_id`, valid from now for the configured TTL
    pub fn mint(&self, owner: &str, block_id: BlockId, max_length: i64) -> TokenResult<BlockToken> {
        let key = self.key()?;
        let now = self.clock.now_millis();
        let identifier = TokenIdentifier {
            kind: BLOCK_TOKEN_KIND.to_string(),
            owner: owner.to_string(),
            block_id,
            issue_time: now,
            expiry_time: now.saturating_add(self.expiry_ms),
            max_length,
        };
        let bytes = identifier.encode();
        let signature = key.sign(&bytes);

        debug!(
            "Minted block token for {} owner={} expiry={}",
            block_id, owner, identifier.expiry_time
        );
        Ok(BlockToken::from_parts(bytes, signature.to_bytes().to_vec()))
    }

    /// Verify a token against this authority's own key
    pub fn verify(&self, token: &BlockToken) -> TokenResult<TokenIdentifier> {
        let key = self.key()?;
        verify_with(&key.verifying_key(), self.clock.as_ref(), token)
    }

    fn key(&self) -> TokenResult<&SigningKey> {
        self.signing_key.get().ok_or(TokenError::NotInitialized)
    }
}

impl fmt::Debug for BlockTokenAuthority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockTokenAuthority")
            .field("expiry_ms", &self.expiry_ms)
            .field("started", &self.is_started())
            .finish_non_exhaustive()
    }
}

/// Checks block tokens with the authority's public key only
#[derive(Clone)]
pub struct BlockTokenVerifier {
    verifying_key: VerifyingKey,
    clock: Arc<dyn Clock>,
}

impl BlockTokenVerifier {
    pub fn new(verifying_key: VerifyingKey, clock: Arc<dyn Clock>) -> Self {
        Self {
            verifying_key,
            clock,
        }
    }

    /// Check kind, then expiry, then signature
    pub fn verify(&self, token: &BlockToken) -> TokenResult<TokenIdentifier> {
        verify_with(&self.verifying_key, self.clock.as_ref(), token)
    }
}

impl fmt::Debug for BlockTokenVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockTokenVerifier")
            .field("key", &hex::encode(self.verifying_key.as_bytes()))
            .finish_non_exhaustive()
    }
}

fn verify_with(
    key: &VerifyingKey,
    clock: &dyn Clock,
    token: &BlockToken,
) -> TokenResult<TokenIdentifier> {
    let identifier = token.decode_identifier()?;

    if identifier.kind != BLOCK_TOKEN_KIND {
        warn!("Rejected block token of kind {}", identifier.kind);
        return Err(TokenError::KindMismatch {
            expected: BLOCK_TOKEN_KIND.to_string(),
            actual: identifier.kind,
        });
    }

    let now = clock.now_millis();
    if identifier.is_expired_at(now) {
        debug!(
            "Rejected expired block token for {} (expired {}, now {})",
            identifier.block_id, identifier.expiry_time, now
        );
        return Err(TokenError::Expired {
            expiry_time: identifier.expiry_time,
            now,
        });
    }

    let signature =
        Signature::from_slice(token.signature()).map_err(|_| TokenError::SignatureInvalid)?;
    key.verify(token.identifier_bytes(), &signature)
        .map_err(|_| {
            warn!("Rejected block token for {} with bad signature", identifier.block_id);
            TokenError::SignatureInvalid
        })?;

    Ok(identifier)
}
