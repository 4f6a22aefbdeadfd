//! Content-addressed hashing using BLAKE3.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A 32-byte BLAKE3 hash.
///
/// Conversation ids, transaction ids and state roots are all `Hash`es.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Hash(pub [u8; 32]);

/// Conversations are identified by the content hash of their creating request.
pub type ConversationId = Hash;

impl Hash {
    /// The zero hash (used as a sentinel, never a valid id).
    pub const ZERO: Self = Self([0u8; 32]);

    /// Hash arbitrary bytes.
    pub fn of(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Hash a serializable value using its CBOR encoding.
    pub fn of_value<T: Serialize>(value: &T) -> Result<Self, Error> {
        Ok(Self::of(&crate::codec::encode(value)?))
    }

    /// Whether this is the zero sentinel.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Lowercase hex, the form ids take in store keys and event tags.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse an id back out of a store key or event tag.
    pub fn from_hex(s: &str) -> Option<Self> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes).ok()?;
        Some(Self(bytes))
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Hash").field(&&self.to_hex()[..12]).finish()
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}
