//! Git object identifiers: 20-byte SHA-1 digests with hex encoding, validation, and a short
//! display form.
//!
//! This core supports SHA-1 only (see `repository::open`'s `[extensions] objectformat` check,
//! which rejects SHA-256 repositories before any `Hash` is ever constructed from them). Unlike the
//! dependency this crate grew out of, there is no thread-local hash-kind switch here: carrying a
//! live SHA-256 path with nothing that ever exercises it would just be unused complexity.

use std::fmt::Display;
use std::str::FromStr;

use sha1::Digest;

use crate::internal::object::types::ObjectType;

pub const HASH_SIZE: usize = 20;
pub const HASH_HEX_LEN: usize = 40;

/// A 20-byte SHA-1 object id.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash(pub [u8; HASH_SIZE]);

impl Hash {
    pub fn zero() -> Hash {
        Hash([0u8; HASH_SIZE])
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; HASH_SIZE]
    }

    /// Hash the bytes of a full object record (`"<type> <len>\0<data>"`).
    pub fn of_object(object_type: ObjectType, data: &[u8]) -> Hash {
        let mut hasher = sha1::Sha1::new();
        hasher.update(object_type.as_bytes());
        hasher.update(b" ");
        hasher.update(data.len().to_string().as_bytes());
        hasher.update(b"\0");
        hasher.update(data);
        let digest = hasher.finalize();
        let mut bytes = [0u8; HASH_SIZE];
        bytes.copy_from_slice(&digest);
        Hash(bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Hash, crate::errors::GitError> {
        if bytes.len() != HASH_SIZE {
            return Err(crate::errors::GitError::InvalidHash(hex::encode(bytes)));
        }
        let mut h = [0u8; HASH_SIZE];
        h.copy_from_slice(bytes);
        Ok(Hash(h))
    }

    /// Read exactly `HASH_SIZE` bytes from a stream.
    pub fn from_stream(data: &mut impl std::io::Read) -> std::io::Result<Hash> {
        let mut h = [0u8; HASH_SIZE];
        data.read_exact(&mut h)?;
        Ok(Hash(h))
    }

    pub fn as_bytes(&self) -> &[u8; HASH_SIZE] {
        &self.0
    }

    /// First 7 hex characters, matching `git`'s abbreviated object id.
    pub fn short(&self) -> String {
        self.to_string()[..7].to_string()
    }
}

impl std::fmt::Debug for Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Hash({self})")
    }
}

impl Display for Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl FromStr for Hash {
    type Err = crate::errors::GitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != HASH_HEX_LEN || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(crate::errors::GitError::InvalidHash(s.to_string()));
        }
        let bytes = hex::decode(s).map_err(|_| crate::errors::GitError::InvalidHash(s.to_string()))?;
        Hash::from_bytes(&bytes)
    }
}
