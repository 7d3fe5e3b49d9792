//! A single entry read out of a `.idx` pack index file: the object id, its CRC32 (as recorded by
//! the index, covering the compressed on-disk bytes), and its byte offset into the `.pack` file.

use crate::hash::Hash;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IndexEntry {
    pub hash: Hash,
    pub crc32: u32,
    pub offset: u64,
}
