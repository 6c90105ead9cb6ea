//! Keystead Block Tokens
//!
//! This crate provides:
//! - The block token identifier and its versioned, length-prefixed encoding
//! - `BlockToken`, the `identifier || signature` credential embedded in
//!   block locations
//! - `BlockTokenAuthority`, which mints Ed25519-signed tokens with a bounded
//!   lifetime, and `BlockTokenVerifier`, which checks them with only the
//!   public key
//!
//! # Example
//!
//! ```rust,ignore
//! use keystead_token::{BlockTokenAuthority, SystemClock};
//! use std::sync::Arc;
//!
//! let authority = BlockTokenAuthority::new(60_000, Arc::new(SystemClock));
//! authority.start(keystead_token::generate_signing_key())?;
//! let token = authority.mint("alice", BlockId::new(1, 2), 1000)?;
//! authority.verify(&token)?;
//! ```

pub mod authority;
pub mod clock;
pub mod error;
pub mod identifier;
pub mod token;

pub use authority::{
    BlockTokenAuthority, BlockTokenVerifier, generate_signing_key, signing_key_from_hex,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{TokenError, TokenResult};
pub use identifier::{BLOCK_TOKEN_KIND, IDENTIFIER_FORMAT_VERSION, TokenIdentifier};
pub use token::{BlockToken, SIGNATURE_LEN};

pub use ed25519_dalek::{SigningKey, VerifyingKey};
