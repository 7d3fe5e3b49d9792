//! Reader for Git pack index (`.idx`) files, versions 1 and 2.
//!
//! Both versions start (v2) or consist entirely of (v1) a 256-entry big-endian fanout table: the
//! Nth entry is the number of objects whose hash's first byte is <= N, so `fanout[b-1]..fanout[b]`
//! bounds the search range for any hash starting with byte `b`.

use byteorder::{BigEndian, ReadBytesExt};

use crate::errors::GitError;
use crate::hash::{HASH_SIZE, Hash};
use crate::internal::pack::index_entry::IndexEntry;

const V2_MAGIC: [u8; 4] = [0xFF, 0x74, 0x4F, 0x63];
const LARGE_OFFSET_FLAG: u32 = 0x8000_0000;

#[derive(Debug, Clone)]
pub struct PackIndex {
    pub version: u32,
    fanout: [u32; 256],
    entries: Vec<IndexEntry>,
    pub pack_hash: Hash,
    pub idx_hash: Hash,
}

impl PackIndex {
    pub fn parse(data: &[u8]) -> Result<PackIndex, GitError> {
        if data.len() >= 4 && data[..4] == V2_MAGIC {
            Self::parse_v2(data)
        } else {
            Self::parse_v1(data)
        }
    }

    fn corrupt(msg: impl Into<String>) -> GitError {
        GitError::CorruptPackIndex(msg.into())
    }

    fn read_fanout(cursor: &mut &[u8]) -> Result<[u32; 256], GitError> {
        if cursor.len() < 256 * 4 {
            return Err(Self::corrupt("truncated fanout table"));
        }
        let mut fanout = [0u32; 256];
        for slot in fanout.iter_mut() {
            *slot = cursor
                .read_u32::<BigEndian>()
                .map_err(|e| Self::corrupt(format!("reading fanout entry: {e}")))?;
        }
        Ok(fanout)
    }

    fn parse_v1(data: &[u8]) -> Result<PackIndex, GitError> {
        let mut cursor = data;
        let fanout = Self::read_fanout(&mut cursor)?;
        let object_count = *fanout.last().unwrap() as usize;

        let mut entries = Vec::with_capacity(object_count);
        for _ in 0..object_count {
            let offset = cursor
                .read_u32::<BigEndian>()
                .map_err(|e| Self::corrupt(format!("reading v1 offset: {e}")))? as u64;
            if cursor.len() < HASH_SIZE {
                return Err(Self::corrupt("truncated object name"));
            }
            let hash = Hash::from_bytes(&cursor[..HASH_SIZE])?;
            cursor = &cursor[HASH_SIZE..];
            entries.push(IndexEntry {
                hash,
                crc32: 0,
                offset,
            });
        }

        let (pack_hash, idx_hash) = Self::read_trailer(cursor)?;
        Ok(PackIndex {
            version: 1,
            fanout,
            entries,
            pack_hash,
            idx_hash,
        })
    }

    fn parse_v2(data: &[u8]) -> Result<PackIndex, GitError> {
        let mut cursor = &data[4..];
        let version = cursor
            .read_u32::<BigEndian>()
            .map_err(|e| Self::corrupt(format!("reading version: {e}")))?;
        if version != 2 {
            return Err(Self::corrupt(format!("unsupported idx version {version}")));
        }

        let fanout = Self::read_fanout(&mut cursor)?;
        let object_count = *fanout.last().unwrap() as usize;

        let mut hashes = Vec::with_capacity(object_count);
        for _ in 0..object_count {
            if cursor.len() < HASH_SIZE {
                return Err(Self::corrupt("truncated object name table"));
            }
            hashes.push(Hash::from_bytes(&cursor[..HASH_SIZE])?);
            cursor = &cursor[HASH_SIZE..];
        }

        let mut crcs = Vec::with_capacity(object_count);
        for _ in 0..object_count {
            crcs.push(
                cursor
                    .read_u32::<BigEndian>()
                    .map_err(|e| Self::corrupt(format!("reading crc32: {e}")))?,
            );
        }

        let mut small_offsets = Vec::with_capacity(object_count);
        let mut large_offset_count = 0usize;
        for _ in 0..object_count {
            let raw = cursor
                .read_u32::<BigEndian>()
                .map_err(|e| Self::corrupt(format!("reading offset: {e}")))?;
            if raw & LARGE_OFFSET_FLAG != 0 {
                large_offset_count = large_offset_count.max((raw & !LARGE_OFFSET_FLAG) as usize + 1);
            }
            small_offsets.push(raw);
        }

        let mut large_offsets = Vec::with_capacity(large_offset_count);
        for _ in 0..large_offset_count {
            large_offsets.push(
                cursor
                    .read_u64::<BigEndian>()
                    .map_err(|e| Self::corrupt(format!("reading large offset: {e}")))?,
            );
        }

        let mut entries = Vec::with_capacity(object_count);
        for i in 0..object_count {
            let raw = small_offsets[i];
            let offset = if raw & LARGE_OFFSET_FLAG != 0 {
                let idx = (raw & !LARGE_OFFSET_FLAG) as usize;
                *large_offsets
                    .get(idx)
                    .ok_or_else(|| Self::corrupt("large offset table index out of range"))?
            } else {
                raw as u64
            };
            entries.push(IndexEntry {
                hash: hashes[i],
                crc32: crcs[i],
                offset,
            });
        }

        let (pack_hash, idx_hash) = Self::read_trailer(cursor)?;
        Ok(PackIndex {
            version: 2,
            fanout,
            entries,
            pack_hash,
            idx_hash,
        })
    }

    fn read_trailer(mut cursor: &[u8]) -> Result<(Hash, Hash), GitError> {
        if cursor.len() < HASH_SIZE * 2 {
            return Err(Self::corrupt("truncated trailer"));
        }
        let pack_hash = Hash::from_bytes(&cursor[..HASH_SIZE])?;
        cursor = &cursor[HASH_SIZE..];
        let idx_hash = Hash::from_bytes(&cursor[..HASH_SIZE])?;
        Ok((pack_hash, idx_hash))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Binary-searches the fanout-bounded range for `hash`. Entries within each fanout bucket
    /// are stored in ascending hash order, matching what `git` itself produces.
    pub fn find(&self, hash: &Hash) -> Option<&IndexEntry> {
        let byte = hash.as_bytes()[0] as usize;
        let lo = if byte == 0 { 0 } else { self.fanout[byte - 1] as usize };
        let hi = self.fanout[byte] as usize;
        self.entries[lo..hi]
            .binary_search_by(|e| e.hash.cmp(hash))
            .ok()
            .map(|pos| &self.entries[lo + pos])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_v2(entries: &[(Hash, u32, u64)], pack_hash: Hash) -> Vec<u8> {
        let mut sorted = entries.to_vec();
        sorted.sort_by(|a, b| a.0.cmp(&b.0));

        let mut fanout = [0u32; 256];
        for (hash, _, _) in &sorted {
            fanout[hash.as_bytes()[0] as usize] += 1;
        }
        for i in 1..256 {
            fanout[i] += fanout[i - 1];
        }

        let mut out = Vec::new();
        out.extend(V2_MAGIC);
        out.extend(2u32.to_be_bytes());
        for count in fanout {
            out.extend(count.to_be_bytes());
        }
        for (hash, _, _) in &sorted {
            out.extend(hash.as_bytes());
        }
        for (_, crc, _) in &sorted {
            out.extend(crc.to_be_bytes());
        }
        let mut large = Vec::new();
        for (_, _, offset) in &sorted {
            if *offset <= 0x7FFF_FFFF {
                out.extend((*offset as u32).to_be_bytes());
            } else {
                let marker = LARGE_OFFSET_FLAG | large.len() as u32;
                out.extend(marker.to_be_bytes());
                large.push(*offset);
            }
        }
        for offset in large {
            out.extend(offset.to_be_bytes());
        }
        out.extend(pack_hash.as_bytes());
        out.extend(Hash::of_object(crate::internal::object::types::ObjectType::Blob, &out).as_bytes());
        out
    }

    fn fake_hash(n: u8) -> Hash {
        Hash::from_bytes(&[n; 20]).unwrap()
    }

    #[test]
    fn parses_v2_header_and_fanout() {
        let pack_hash = fake_hash(0xAA);
        let entries = vec![
            (fake_hash(0), 0x1111, 10),
            (fake_hash(1), 0x2222, 20),
            (fake_hash(2), 0x3333, 30),
        ];
        let data = build_v2(&entries, pack_hash);
        let idx = PackIndex::parse(&data).unwrap();

        assert_eq!(idx.version, 2);
        assert_eq!(idx.len(), 3);
        assert_eq!(idx.pack_hash, pack_hash);
    }

    #[test]
    fn finds_entry_by_hash() {
        let pack_hash = fake_hash(0xAA);
        let entries = vec![
            (fake_hash(5), 0x1111, 100),
            (fake_hash(10), 0x2222, 200),
            (fake_hash(200), 0x3333, 300),
        ];
        let data = build_v2(&entries, pack_hash);
        let idx = PackIndex::parse(&data).unwrap();

        let found = idx.find(&fake_hash(10)).unwrap();
        assert_eq!(found.offset, 200);
        assert_eq!(found.crc32, 0x2222);

        assert!(idx.find(&fake_hash(99)).is_none());
    }

    #[test]
    fn handles_large_offsets() {
        let pack_hash = fake_hash(0xAA);
        let big_offset = 0x1_0000_0000u64;
        let entries = vec![(fake_hash(1), 1, big_offset)];
        let data = build_v2(&entries, pack_hash);
        let idx = PackIndex::parse(&data).unwrap();
        assert_eq!(idx.find(&fake_hash(1)).unwrap().offset, big_offset);
    }

    #[test]
    fn rejects_truncated_fanout() {
        assert!(PackIndex::parse(&[0u8; 10]).is_err());
    }
}
