//! Commit identifiers.

use crate::error::{RevError, Result};
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Object name of a commit, as printed by git.
///
/// Both SHA-1 (20 byte) and SHA-256 (32 byte) repositories are supported.
/// The id is `Copy` so that graph structures can pass it around freely
/// instead of holding references into the commit arena.
///
/// # Examples
///
/// ```
/// use revgraph_core::CommitId;
///
/// let id: CommitId = "0123456789abcdef0123456789abcdef01234567".parse().unwrap();
/// assert_eq!(id.as_hex().len(), 40);
/// assert_eq!(id.short(), "0123456");
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CommitId {
    bytes: [u8; 32],
    len: u8,
}

impl CommitId {
    /// Length of a SHA-1 object name in bytes.
    pub const SHA1_LEN: usize = 20;

    /// Length of a SHA-256 object name in bytes.
    pub const SHA256_LEN: usize = 32;

    /// Creates a SHA-1 id from raw bytes.
    pub fn from_sha1(bytes: [u8; 20]) -> Self {
        let mut buf = [0u8; 32];
        buf[..20].copy_from_slice(&bytes);
        Self { bytes: buf, len: 20 }
    }

    /// Id of the synthetic working-tree commit (all zeros, SHA-1 width).
    pub fn working_dir() -> Self {
        Self::from_sha1([0; 20])
    }

    /// Returns the raw object name bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    /// Returns this id as a lowercase hex string.
    pub fn as_hex(&self) -> String {
        hex::encode(self.as_bytes())
    }

    /// Returns the conventional 7 character abbreviation.
    pub fn short(&self) -> String {
        let mut hex = self.as_hex();
        hex.truncate(7);
        hex
    }

    /// Whether this is the reserved all-zero id of a synthetic commit.
    pub fn is_zero(&self) -> bool {
        self.as_bytes().iter().all(|b| *b == 0)
    }

    /// Parses a commit id from a full-length hex string.
    ///
    /// # Errors
    ///
    /// Returns `RevError::InvalidCommitId` if the string is not valid hex or
    /// is neither 40 nor 64 characters long.
    pub fn from_hex(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.len() != Self::SHA1_LEN * 2 && s.len() != Self::SHA256_LEN * 2 {
            return Err(RevError::InvalidCommitId(format!(
                "expected 40 or 64 hex chars, got {}",
                s.len()
            )));
        }

        let decoded = hex::decode(s).map_err(|e| RevError::InvalidCommitId(e.to_string()))?;
        let mut bytes = [0u8; 32];
        bytes[..decoded.len()].copy_from_slice(&decoded);

        Ok(Self {
            bytes,
            len: decoded.len() as u8,
        })
    }
}

impl FromStr for CommitId {
    type Err = RevError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_hex())
    }
}

impl fmt::Debug for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommitId({})", self.short())
    }
}

impl Serialize for CommitId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.as_hex())
    }
}
