//! Block token identifier and its wire encoding
//!
//! The identifier is the signed part of a block token. Its byte layout is
//! a compatibility contract with every party that verifies tokens:
//!
//! ```text
//! version:u8
//! len:u32 kind        (UTF-8)
//! len:u32 owner       (UTF-8)
//! len:u32 container   (i64)
//! len:u32 local_id    (i64)
//! len:u32 issue_time  (i64, ms since epoch)
//! len:u32 expiry_time (i64, ms since epoch)
//! len:u32 max_length  (i64)
//! ```
//!
//! All lengths and integers are big-endian. Integer fields always carry a
//! length of 8.

use crate::error::{TokenError, TokenResult};
use bytes::{Buf, BufMut, BytesMut};
use keystead_common::BlockId;
use serde::{Deserialize, Serialize};

/// Kind tag carried by every block token of this scheme
pub const BLOCK_TOKEN_KIND: &str = "HDDS_BLOCK_TOKEN";

/// Leading format byte of the identifier encoding
pub const IDENTIFIER_FORMAT_VERSION: u8 = 1;

const I64_LEN: usize = std::mem::size_of::<i64>();
const LEN_PREFIX: usize = std::mem::size_of::<u32>();
const I64_FIELD_LEN: u32 = 8;

/// The claims a block token makes, covered by its signature
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenIdentifier {
    pub kind: String,
    pub owner: String,
    pub block_id: BlockId,
    pub issue_time: i64,
    pub expiry_time: i64,
    pub max_length: i64,
}

impl TokenIdentifier {
    /// Whether the identifier is expired at `now`. Expiry is exclusive:
    /// a token is already invalid at exactly `expiry_time`.
    #[must_use]
    pub const fn is_expired_at(&self, now: i64) -> bool {
        now >= self.expiry_time
    }

    /// Encode into the versioned, length-prefixed layout
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut w = FieldWriter::with_capacity(
            1 + 7 * LEN_PREFIX + self.kind.len() + self.owner.len() + 5 * I64_LEN,
        );
        w.put_u8(IDENTIFIER_FORMAT_VERSION);
        w.put_str(&self.kind);
        w.put_str(&self.owner);
        w.put_i64(self.block_id.container_id);
        w.put_i64(self.block_id.local_id);
        w.put_i64(self.issue_time);
        w.put_i64(self.expiry_time);
        w.put_i64(self.max_length);
        w.finish()
    }

    /// Decode the layout written by [`TokenIdentifier::encode`]
    pub fn decode(bytes: &[u8]) -> TokenResult<Self> {
        let mut r = FieldReader::new(bytes);
        let version = r.read_u8()?;
        if version != IDENTIFIER_FORMAT_VERSION {
            return Err(TokenError::Malformed(format!(
                "unsupported identifier format version {version}"
            )));
        }
        let kind = r.read_str("kind")?;
        let owner = r.read_str("owner")?;
        let container_id = r.read_i64("container id")?;
        let local_id = r.read_i64("local id")?;
        let issue_time = r.read_i64("issue time")?;
        let expiry_time = r.read_i64("expiry time")?;
        let max_length = r.read_i64("max length")?;
        r.finish()?;

        Ok(Self {
            kind,
            owner,
            block_id: BlockId::new(container_id, local_id),
            issue_time,
            expiry_time,
            max_length,
        })
    }
}

struct FieldWriter {
    buf: BytesMut,
}

impl FieldWriter {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    fn put_u8(&mut self, value: u8) {
        self.buf.put_u8(value);
    }

    fn put_field(&mut self, bytes: &[u8]) {
        // Field lengths are bounded by identifier sizes, far below u32::MAX.
        #[allow(clippy::cast_possible_truncation)]
        let len = bytes.len() as u32;
        self.buf.put_u32(len);
        self.buf.put_slice(bytes);
    }

    fn put_str(&mut self, value: &str) {
        self.put_field(value.as_bytes());
    }

    fn put_i64(&mut self, value: i64) {
        self.buf.put_u32(I64_FIELD_LEN);
        self.buf.put_i64(value);
    }

    fn finish(self) -> Vec<u8> {
        self.buf.to_vec()
    }
}

struct FieldReader<'a> {
    buf: &'a [u8],
}

impl<'a> FieldReader<'a> {
    const fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn ensure(&self, n: usize, what: &str) -> TokenResult<()> {
        if self.buf.remaining() < n {
            return Err(TokenError::Malformed(format!("truncated {what}")));
        }
        Ok(())
    }

    fn read_u8(&mut self) -> TokenResult<u8> {
        self.ensure(1, "format version")?;
        Ok(self.buf.get_u8())
    }

    fn read_len(&mut self, what: &str) -> TokenResult<usize> {
        self.ensure(LEN_PREFIX, what)?;
        Ok(self.buf.get_u32() as usize)
    }

    fn read_str(&mut self, what: &str) -> TokenResult<String> {
        let len = self.read_len(what)?;
        self.ensure(len, what)?;
        let raw = self.buf.copy_to_bytes(len);
        String::from_utf8(raw.to_vec())
            .map_err(|_| TokenError::Malformed(format!("{what} is not valid UTF-8")))
    }

    fn read_i64(&mut self, what: &str) -> TokenResult<i64> {
        let len = self.read_len(what)?;
        if len != I64_LEN {
            return Err(TokenError::Malformed(format!(
                "{what} has length {len}, expected {I64_LEN}"
            )));
        }
        self.ensure(I64_LEN, what)?;
        Ok(self.buf.get_i64())
    }

    fn finish(&self) -> TokenResult<()> {
        match self.buf.remaining() {
            0 => Ok(()),
            n => Err(TokenError::Malformed(format!(
                "{n} trailing bytes after identifier"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TokenIdentifier {
        TokenIdentifier {
            kind: BLOCK_TOKEN_KIND.to_string(),
            owner: "om1".to_string(),
            block_id: BlockId::new(1, 2),
            issue_time: 1_700_000_000_000,
            expiry_time: 1_700_000_060_000,
            max_length: 1000,
        }
    }

    #[test]
    fn test_decode_encoded() {
        let id = sample();
        assert_eq!(TokenIdentifier::decode(&id.encode()).unwrap(), id);
    }

    #[test]
    fn test_delimiter_like_strings_survive() {
        let mut id = sample();
        id.owner = "a/b\0c|d:\u{4}\u{0}\u{0}\u{0}\u{8}é".to_string();
        id.kind = String::new();
        id.max_length = -1;
        id.block_id = BlockId::new(i64::MIN, i64::MAX);
        assert_eq!(TokenIdentifier::decode(&id.encode()).unwrap(), id);
    }

    #[test]
    fn test_layout_is_fixed() {
        let id = TokenIdentifier {
            kind: "K".to_string(),
            owner: "o".to_string(),
            block_id: BlockId::new(1, 2),
            issue_time: 3,
            expiry_time: 4,
            max_length: 5,
        };
        let bytes = id.encode();

        let mut expected = vec![IDENTIFIER_FORMAT_VERSION];
        expected.extend_from_slice(&[0, 0, 0, 1, b'K']);
        expected.extend_from_slice(&[0, 0, 0, 1, b'o']);
        for v in [1i64, 2, 3, 4, 5] {
            expected.extend_from_slice(&[0, 0, 0, 8]);
            expected.extend_from_slice(&v.to_be_bytes());
        }
        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_truncated_is_malformed() {
        let bytes = sample().encode();
        for cut in [0, 1, 5, bytes.len() - 1] {
            assert!(matches!(
                TokenIdentifier::decode(&bytes[..cut]),
                Err(TokenError::Malformed(_))
            ));
        }
    }

    #[test]
    fn test_integer_field_length_checked() {
        let mut bytes = sample().encode();
        // length prefix of the container id field
        let at = 1 + 4 + BLOCK_TOKEN_KIND.len() + 4 + "om1".len();
        bytes[at + 3] = 4;
        assert_eq!(
            TokenIdentifier::decode(&bytes).unwrap_err(),
            TokenError::Malformed("container id has length 4, expected 8".to_string())
        );
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut bytes = sample().encode();
        bytes.push(0);
        assert!(matches!(
            TokenIdentifier::decode(&bytes),
            Err(TokenError::Malformed(_))
        ));
    }

    #[test]
    fn test_unknown_version_rejected() {
        let mut bytes = sample().encode();
        bytes[0] = 9;
        let err = TokenIdentifier::decode(&bytes).unwrap_err();
        assert_eq!(
            err,
            TokenError::Malformed("unsupported identifier format version 9".to_string())
        );
    }

    #[test]
    fn test_expiry_is_exclusive() {
        let id = sample();
        assert!(!id.is_expired_at(id.expiry_time - 1));
        assert!(id.is_expired_at(id.expiry_time));
        assert!(id.is_expired_at(id.expiry_time + 1));
    }
}
