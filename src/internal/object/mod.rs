//! Object model for the four kinds of object a Git repository stores: blobs, trees, commits, and
//! tags. [`ObjectTrait`] is the common interface the pack and loose-object readers parse into.

pub mod blob;
pub mod commit;
pub mod signature;
pub mod tag;
pub mod tree;
pub mod types;

use std::fmt::Display;

use crate::{errors::GitError, hash::Hash, internal::object::types::ObjectType};

/// Common interface for blobs, trees, commits, and tags: parse from the bytes that follow a
/// loose or pack object header, and report the type/size/hash needed to place the object back
/// into a tree listing or status report.
pub trait ObjectTrait: Send + Sync + Display {
    /// Parses an object body (the bytes after the `"<type> <len>\0"` header) given the hash the
    /// caller already computed for the full record.
    fn from_bytes(data: &[u8], hash: Hash) -> Result<Self, GitError>
    where
        Self: Sized;

    fn get_type(&self) -> ObjectType;

    fn get_size(&self) -> usize;

    /// Re-serializes the object body, matching exactly what `from_bytes` was given.
    fn to_data(&self) -> Result<Vec<u8>, GitError>;

    /// Recomputes the object's hash from its serialized body. Override only when the hash is
    /// already known (e.g. a pack entry keeps its on-disk hash).
    fn object_hash(&self) -> Result<Hash, GitError> {
        let data = self.to_data()?;
        Ok(Hash::of_object(self.get_type(), &data))
    }
}
