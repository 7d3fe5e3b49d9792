//! Reader for Git pack files (`.pack`), following the
//! [pack format](https://git-scm.com/docs/pack-format): a 12-byte header (`"PACK"`, version,
//! object count), followed by that many variable-length entries, followed by a trailing SHA-1 of
//! everything before it.

pub mod entry;
mod index_entry;
pub mod pack_index;

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use byteorder::{BigEndian, ReadBytesExt};

use crate::delta::delta_decode;
use crate::errors::GitError;
use crate::hash::{HASH_SIZE, Hash};
use crate::internal::object::types::ObjectType;
use crate::internal::pack::entry::Entry;
use crate::internal::pack::pack_index::PackIndex;
use crate::internal::zlib::stream::inflate::ReadBoxed;

/// Git refuses to resolve delta chains deeper than this; mirrored here so a corrupt or
/// maliciously crafted pack cannot recurse unboundedly.
pub const MAX_DELTA_DEPTH: usize = 50;

const PACK_SIGNATURE: &[u8; 4] = b"PACK";

pub struct PackFile {
    pack_path: PathBuf,
    index: PackIndex,
}

impl PackFile {
    pub fn open(pack_path: impl AsRef<Path>, idx_path: impl AsRef<Path>) -> Result<PackFile, GitError> {
        let idx_bytes = std::fs::read(idx_path.as_ref())?;
        let index = PackIndex::parse(&idx_bytes)?;

        let mut header = [0u8; 12];
        File::open(pack_path.as_ref())?.read_exact(&mut header)?;
        if &header[0..4] != PACK_SIGNATURE {
            return Err(GitError::CorruptObject(
                pack_path.as_ref().display().to_string(),
                "missing PACK signature".to_string(),
            ));
        }

        Ok(PackFile {
            pack_path: pack_path.as_ref().to_path_buf(),
            index,
        })
    }

    pub fn index(&self) -> &PackIndex {
        &self.index
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.index.find(hash).is_some()
    }

    /// Fully resolves the object named by `hash`, walking and applying any delta chain. A
    /// `ref-delta` whose base is not present in this pack's own index fails; use [`resolve_with`]
    /// to fall back to the rest of the object store.
    ///
    /// [`resolve_with`]: PackFile::resolve_with
    pub fn resolve(&self, hash: &Hash) -> Result<Entry, GitError> {
        self.resolve_with(hash, &|base_hash| {
            Err(GitError::InvalidDelta(format!("ref-delta base {base_hash} not found in pack")))
        })
    }

    /// Like [`resolve`], but calls `resolve_base` for a `ref-delta` whose base object is not
    /// present in this pack's own index. Mirrors `ReadObject` recursing across the whole
    /// repository object store: after an incremental repack, a delta's base can live in a sibling
    /// pack or as a loose object rather than in the same pack as the delta itself.
    ///
    /// [`resolve`]: PackFile::resolve
    pub fn resolve_with(&self, hash: &Hash, resolve_base: &dyn Fn(&Hash) -> Result<Entry, GitError>) -> Result<Entry, GitError> {
        let entry = self
            .index
            .find(hash)
            .ok_or_else(|| GitError::CorruptObject(hash.to_string(), "not present in pack index".to_string()))?;
        let mut file = BufReader::new(File::open(&self.pack_path)?);
        self.resolve_at_offset(&mut file, entry.offset, 0, resolve_base)
    }

    fn resolve_at_offset(
        &self,
        file: &mut BufReader<File>,
        offset: u64,
        depth: usize,
        resolve_base: &dyn Fn(&Hash) -> Result<Entry, GitError>,
    ) -> Result<Entry, GitError> {
        if depth > MAX_DELTA_DEPTH {
            return Err(GitError::InvalidDelta(format!(
                "delta chain exceeds maximum depth of {MAX_DELTA_DEPTH}"
            )));
        }

        file.seek(SeekFrom::Start(offset))?;
        let (obj_type, size) = read_entry_header(file)?;

        match obj_type {
            ObjectType::Commit | ObjectType::Tree | ObjectType::Blob | ObjectType::Tag => {
                let mut reader = ReadBoxed::new_for_delta(file);
                let mut data = Vec::with_capacity(size);
                reader.read_to_end(&mut data)?;
                Ok(Entry { obj_type, data })
            }
            ObjectType::None => unreachable!("None never appears as a pack entry type"),
            ObjectType::OfsDelta => {
                let negative_offset = read_ofs_delta_offset(file)?;
                let base_offset = offset
                    .checked_sub(negative_offset)
                    .ok_or_else(|| GitError::InvalidDelta("ofs-delta offset underflows pack start".to_string()))?;

                let mut delta_reader = ReadBoxed::new_for_delta(file);
                let mut delta_bytes = Vec::with_capacity(size);
                delta_reader.read_to_end(&mut delta_bytes)?;

                let base = self.resolve_at_offset(file, base_offset, depth + 1, resolve_base)?;
                let data = delta_decode(&mut &delta_bytes[..], &base.data)?;
                Ok(Entry {
                    obj_type: base.obj_type,
                    data,
                })
            }
            ObjectType::RefDelta => {
                let base_hash = Hash::from_stream(file)?;

                let mut delta_reader = ReadBoxed::new_for_delta(file);
                let mut delta_bytes = Vec::with_capacity(size);
                delta_reader.read_to_end(&mut delta_bytes)?;

                let base = match self.index.find(&base_hash) {
                    Some(found) => self.resolve_at_offset(file, found.offset, depth + 1, resolve_base)?,
                    None => resolve_base(&base_hash)?,
                };
                let data = delta_decode(&mut &delta_bytes[..], &base.data)?;
                Ok(Entry {
                    obj_type: base.obj_type,
                    data,
                })
            }
        }
    }
}

/// Reads a pack entry header: a type+size varint where the first byte carries the 3-bit type
/// and the low 4 bits of the size, continuation bytes carry 7 more size bits each.
fn read_entry_header(reader: &mut impl Read) -> Result<(ObjectType, usize), GitError> {
    let mut byte = [0u8; 1];
    reader.read_exact(&mut byte)?;
    let mut byte = byte[0];

    let obj_type = ObjectType::from_pack_type_u8((byte >> 4) & 0b111)?;
    let mut size = (byte & 0b1111) as usize;
    let mut shift = 4;

    while byte & 0x80 != 0 {
        let mut next = [0u8; 1];
        reader.read_exact(&mut next)?;
        byte = next[0];
        size |= ((byte & 0x7f) as usize) << shift;
        shift += 7;
    }

    Ok((obj_type, size))
}

/// Reads an `ofs-delta` base offset: big-endian base-128 with a git-specific twist — each
/// continuation byte adds 1 before shifting, so that every encoding is unique (no zero-padding).
fn read_ofs_delta_offset(reader: &mut impl Read) -> Result<u64, GitError> {
    let mut byte = reader.read_u8()?;
    let mut value = (byte & 0x7f) as u64;
    while byte & 0x80 != 0 {
        byte = reader.read_u8()?;
        value += 1;
        value = (value << 7) | (byte & 0x7f) as u64;
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::{Compression, write::ZlibEncoder};
    use std::io::{Cursor, Write};
    use tempfile::tempdir;

    fn zlib_compress(data: &[u8]) -> Vec<u8> {
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    fn entry_header_bytes(obj_type: ObjectType, size: usize) -> Vec<u8> {
        let mut out = Vec::new();
        let mut size = size;
        let mut first = ((obj_type.to_pack_type_u8()) << 4) | (size as u8 & 0b1111);
        size >>= 4;
        if size != 0 {
            first |= 0x80;
        }
        out.push(first);
        while size != 0 {
            let mut byte = (size & 0x7f) as u8;
            size >>= 7;
            if size != 0 {
                byte |= 0x80;
            }
            out.push(byte);
        }
        out
    }

    #[test]
    fn round_trips_entry_header_small_size() {
        let header = entry_header_bytes(ObjectType::Blob, 10);
        let mut cursor = Cursor::new(header);
        let (obj_type, size) = read_entry_header(&mut cursor).unwrap();
        assert_eq!(obj_type, ObjectType::Blob);
        assert_eq!(size, 10);
    }

    #[test]
    fn round_trips_entry_header_large_size() {
        let header = entry_header_bytes(ObjectType::Commit, 5000);
        let mut cursor = Cursor::new(header);
        let (obj_type, size) = read_entry_header(&mut cursor).unwrap();
        assert_eq!(obj_type, ObjectType::Commit);
        assert_eq!(size, 5000);
    }

    #[test]
    fn resolves_base_blob_from_a_real_pack_file() {
        let dir = tempdir().unwrap();
        let pack_path = dir.path().join("pack.pack");
        let idx_path = dir.path().join("pack.idx");

        let body = b"hello\n";
        let compressed = zlib_compress(body);

        let mut pack = Vec::new();
        pack.extend(PACK_SIGNATURE);
        pack.extend(2u32.to_be_bytes());
        pack.extend(1u32.to_be_bytes());
        let entry_offset = pack.len() as u64;
        pack.extend(entry_header_bytes(ObjectType::Blob, body.len()));
        pack.extend(&compressed);
        let trailer = Hash::of_object(ObjectType::Blob, &pack).as_bytes().to_vec();
        pack.extend(&trailer);
        std::fs::write(&pack_path, &pack).unwrap();

        let hash = Hash::of_object(ObjectType::Blob, body);
        let mut idx = Vec::new();
        idx.extend([0xFFu8, 0x74, 0x4F, 0x63]);
        idx.extend(2u32.to_be_bytes());
        let mut fanout = [0u32; 256];
        for b in hash.as_bytes()[0] as usize..256 {
            fanout[b] = 1;
        }
        for count in fanout {
            idx.extend(count.to_be_bytes());
        }
        idx.extend(hash.as_bytes());
        idx.extend(0u32.to_be_bytes()); // crc32, unchecked by this reader
        idx.extend((entry_offset as u32).to_be_bytes());
        idx.extend(trailer);
        idx.extend([0u8; HASH_SIZE]);
        std::fs::write(&idx_path, &idx).unwrap();

        let pack_file = PackFile::open(&pack_path, &idx_path).unwrap();
        assert!(pack_file.contains(&hash));
        let resolved = pack_file.resolve(&hash).unwrap();
        assert_eq!(resolved.obj_type, ObjectType::Blob);
        assert_eq!(resolved.data, body);
    }

    fn encode_varint(out: &mut Vec<u8>, mut value: usize) {
        loop {
            let mut byte = (value & 0x7f) as u8;
            value >>= 7;
            if value != 0 {
                byte |= 0x80;
            }
            out.push(byte);
            if value == 0 {
                break;
            }
        }
    }

    fn write_single_entry_pack(dir: &Path, name: &str, hash: Hash, entry_bytes: Vec<u8>) {
        let mut pack = Vec::new();
        pack.extend(PACK_SIGNATURE);
        pack.extend(2u32.to_be_bytes());
        pack.extend(1u32.to_be_bytes());
        pack.extend(entry_bytes);
        let trailer = Hash::of_object(ObjectType::Blob, &pack).as_bytes().to_vec();
        pack.extend(&trailer);
        std::fs::write(dir.join(format!("{name}.pack")), &pack).unwrap();

        let mut idx = Vec::new();
        idx.extend([0xFFu8, 0x74, 0x4F, 0x63]);
        idx.extend(2u32.to_be_bytes());
        let mut fanout = [0u32; 256];
        for b in hash.as_bytes()[0] as usize..256 {
            fanout[b] = 1;
        }
        for count in fanout {
            idx.extend(count.to_be_bytes());
        }
        idx.extend(hash.as_bytes());
        idx.extend(0u32.to_be_bytes());
        idx.extend(12u32.to_be_bytes());
        idx.extend(trailer);
        idx.extend([0u8; HASH_SIZE]);
        std::fs::write(dir.join(format!("{name}.idx")), &idx).unwrap();
    }

    /// A ref-delta's base living in a different pack than the delta itself must still resolve, the
    /// same way `ReadObject` falls back across the whole object store.
    #[test]
    fn resolve_with_falls_back_across_packs_for_ref_delta_base() {
        let dir = tempdir().unwrap();

        let base = b"hello\n";
        let base_hash = Hash::of_object(ObjectType::Blob, base);
        let base_entry = {
            let mut v = entry_header_bytes(ObjectType::Blob, base.len());
            v.extend(zlib_compress(base));
            v
        };
        write_single_entry_pack(dir.path(), "base", base_hash, base_entry);
        let base_pack = PackFile::open(dir.path().join("base.pack"), dir.path().join("base.idx")).unwrap();

        let insert = b"world\n";
        let reconstructed = [base.as_slice(), insert.as_slice()].concat();
        let delta_hash = Hash::of_object(ObjectType::Blob, &reconstructed);

        let mut delta_bytes = Vec::new();
        encode_varint(&mut delta_bytes, base.len());
        encode_varint(&mut delta_bytes, reconstructed.len());
        delta_bytes.push(0x80 | 0x10); // copy instruction, 1 size byte present
        delta_bytes.push(base.len() as u8);
        delta_bytes.push(insert.len() as u8);
        delta_bytes.extend_from_slice(insert);

        let delta_entry = {
            let mut v = entry_header_bytes(ObjectType::RefDelta, delta_bytes.len());
            v.extend(base_hash.as_bytes());
            v.extend(zlib_compress(&delta_bytes));
            v
        };
        write_single_entry_pack(dir.path(), "delta", delta_hash, delta_entry);
        let delta_pack = PackFile::open(dir.path().join("delta.pack"), dir.path().join("delta.idx")).unwrap();

        // Looking up the base only in the delta's own pack fails.
        assert!(delta_pack.resolve(&delta_hash).is_err());

        let resolved = delta_pack
            .resolve_with(&delta_hash, &|h| base_pack.resolve(h))
            .unwrap();
        assert_eq!(resolved.obj_type, ObjectType::Blob);
        assert_eq!(resolved.data, reconstructed);
    }
}
