//! Type-safe wrappers and core types for sparse vectors.
//!
//! Document identifiers get a newtype so they are never confused with token
//! ids or weights. Tokens stay a plain `u16` because they double as indices
//! into dense expansions.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stored token identifier. The token space is `0..TOKEN_SPACE`.
pub type TokenId = u16;

/// Number of distinct stored tokens. Integer-keyed input is reduced modulo this value.
pub const TOKEN_SPACE: i64 = 1 << 16;

/// Document identifier within one index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocId(u32);

impl DocId {
    /// Sentinel returned by cursors once every member has been visited.
    pub const NO_MORE_DOCS: DocId = DocId(u32::MAX);

    /// Creates a new `DocId`.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the underlying u32 value.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }

    /// Returns true for the exhaustion sentinel.
    #[must_use]
    pub const fn is_terminated(&self) -> bool {
        self.0 == u32::MAX
    }

    /// Converts to little-endian bytes for storage.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; 4] {
        self.0.to_le_bytes()
    }

    /// Creates from little-endian bytes.
    #[must_use]
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        Self(u32::from_le_bytes(bytes))
    }
}

impl From<u32> for DocId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for DocId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors raised while parsing sparse vector input.
///
/// All of these describe malformed input; none are retried.
#[derive(Error, Debug)]
pub enum VectorError {
    #[error(
        "Malformed vector blob at byte {offset}: {reason}\nSuggestion: Ensure reader and writer agree on the blob layout"
    )]
    MalformedBlob { offset: usize, reason: String },

    #[error(
        "Invalid token key '{key}': {reason}\nSuggestion: String-keyed tokens must be decimal integers in 0..=65535"
    )]
    InvalidToken { key: String, reason: &'static str },

    #[error(
        "Invalid field attribute {name}='{value}'\nSuggestion: Quantization ceilings must be numeric"
    )]
    InvalidAttribute { name: String, value: String },
}

/// Result type alias for vector parsing.
pub type VectorResult<T> = Result<T, VectorError>;
