//! Reader for the `.git/index` file (DIRC): the staging area snapshot consulted by the status
//! engine to diff `HEAD` against what's staged and what's on disk.

use std::io::Read;

use byteorder::{BigEndian, ReadBytesExt};

use crate::errors::GitError;
use crate::hash::{HASH_SIZE, Hash};

const DIRC_SIGNATURE: &[u8; 4] = b"DIRC";
const EXTENDED_FLAG: u16 = 0x4000;
const NAME_MASK: u16 = 0x0FFF;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntryStat {
    pub ctime_sec: u32,
    pub ctime_nano: u32,
    pub mtime_sec: u32,
    pub mtime_nano: u32,
    pub dev: u32,
    pub ino: u32,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub size: u32,
    pub hash: Hash,
    pub flags: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub path: String,
    pub stat: IndexEntryStat,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Index {
    pub version: u32,
    pub entries: Vec<IndexEntry>,
}

impl Index {
    pub fn parse(data: &[u8]) -> Result<Index, GitError> {
        let corrupt = |msg: String| GitError::CorruptIndex(msg);

        if data.len() < 12 || &data[0..4] != DIRC_SIGNATURE {
            return Err(corrupt("missing DIRC signature".to_string()));
        }
        let mut cursor = &data[4..];
        let version = cursor
            .read_u32::<BigEndian>()
            .map_err(|e| corrupt(format!("reading version: {e}")))?;
        if !(2..=4).contains(&version) {
            return Err(GitError::Unsupported(format!("index version {version}")));
        }
        let num_entries = cursor
            .read_u32::<BigEndian>()
            .map_err(|e| corrupt(format!("reading entry count: {e}")))?;

        let mut entries = Vec::with_capacity(num_entries as usize);
        let mut previous_path = String::new();
        for _ in 0..num_entries {
            let (entry, consumed) = if version == 4 {
                read_entry_v4(cursor, &previous_path)?
            } else {
                read_entry_v2_v3(cursor, version)?
            };
            previous_path = entry.path.clone();
            entries.push(entry);
            cursor = &cursor[consumed..];
        }

        // Extensions: 4-byte signature + u32 BE size, skipped verbatim. The trailing 20-byte
        // checksum is read and discarded, never verified (see repository design notes).
        while cursor.len() > HASH_SIZE + 8 {
            let size = u32::from_be_bytes([cursor[4], cursor[5], cursor[6], cursor[7]]) as usize;
            let skip = 8 + size;
            if cursor.len() < skip + HASH_SIZE {
                break;
            }
            cursor = &cursor[skip..];
        }

        if cursor.len() < HASH_SIZE {
            return Err(corrupt("truncated trailing checksum".to_string()));
        }

        Ok(Index { version, entries })
    }
}

fn read_stat(mut cursor: &[u8]) -> Result<(IndexEntryStat, u16, &[u8]), GitError> {
    let corrupt = |msg: String| GitError::CorruptIndex(msg);
    if cursor.len() < 62 {
        return Err(corrupt("truncated index entry".to_string()));
    }
    let ctime_sec = cursor.read_u32::<BigEndian>().map_err(|e| corrupt(e.to_string()))?;
    let ctime_nano = cursor.read_u32::<BigEndian>().map_err(|e| corrupt(e.to_string()))?;
    let mtime_sec = cursor.read_u32::<BigEndian>().map_err(|e| corrupt(e.to_string()))?;
    let mtime_nano = cursor.read_u32::<BigEndian>().map_err(|e| corrupt(e.to_string()))?;
    let dev = cursor.read_u32::<BigEndian>().map_err(|e| corrupt(e.to_string()))?;
    let ino = cursor.read_u32::<BigEndian>().map_err(|e| corrupt(e.to_string()))?;
    let mode = cursor.read_u32::<BigEndian>().map_err(|e| corrupt(e.to_string()))?;
    let uid = cursor.read_u32::<BigEndian>().map_err(|e| corrupt(e.to_string()))?;
    let gid = cursor.read_u32::<BigEndian>().map_err(|e| corrupt(e.to_string()))?;
    let size = cursor.read_u32::<BigEndian>().map_err(|e| corrupt(e.to_string()))?;

    let mut hash_bytes = [0u8; HASH_SIZE];
    cursor.read_exact(&mut hash_bytes).map_err(|e| corrupt(e.to_string()))?;
    let hash = Hash::from_bytes(&hash_bytes)?;

    let flags = cursor.read_u16::<BigEndian>().map_err(|e| corrupt(e.to_string()))?;

    Ok((
        IndexEntryStat {
            ctime_sec,
            ctime_nano,
            mtime_sec,
            mtime_nano,
            dev,
            ino,
            mode,
            uid,
            gid,
            size,
            hash,
            flags,
        },
        flags,
        cursor,
    ))
}

fn read_entry_v2_v3(data: &[u8], version: u32) -> Result<(IndexEntry, usize), GitError> {
    let corrupt = |msg: String| GitError::CorruptIndex(msg);
    let (mut stat, flags, mut rest) = read_stat(data)?;
    let mut header_len = 62;

    if version == 3 && flags & EXTENDED_FLAG != 0 {
        let _extended_flags = rest.read_u16::<BigEndian>().map_err(|e| corrupt(e.to_string()))?;
        header_len += 2;
    }

    let declared_len = (flags & NAME_MASK) as usize;
    let (path, path_len) = if declared_len == NAME_MASK as usize {
        let nul = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| corrupt("unterminated path".to_string()))?;
        (
            String::from_utf8(rest[..nul].to_vec()).map_err(|_| corrupt("path is not valid UTF-8".to_string()))?,
            nul,
        )
    } else {
        if rest.len() < declared_len {
            return Err(corrupt("truncated path".to_string()));
        }
        (
            String::from_utf8(rest[..declared_len].to_vec())
                .map_err(|_| corrupt("path is not valid UTF-8".to_string()))?,
            declared_len,
        )
    };

    let unpadded_len = header_len + path_len + 1; // +1 for the NUL terminator
    let padded_len = unpadded_len.div_ceil(8) * 8;
    stat.flags = flags;

    Ok((IndexEntry { path, stat }, padded_len))
}

/// Reads a varint decremented-prefix-length prefix used by v4 path compression: 7 bits per byte,
/// continuation in the high bit, most significant group first (unlike the pack size varint).
fn read_v4_varint(mut cursor: &[u8]) -> Result<(usize, usize), GitError> {
    let corrupt = || GitError::CorruptIndex("truncated v4 path-strip varint".to_string());
    let mut value: usize = 0;
    let mut consumed = 0;
    loop {
        let byte = *cursor.first().ok_or_else(corrupt)?;
        cursor = &cursor[1..];
        consumed += 1;
        value = (value << 7) | (byte & 0x7f) as usize;
        if byte & 0x80 == 0 {
            break;
        }
        value += 1;
    }
    Ok((value, consumed))
}

fn read_entry_v4(data: &[u8], previous_path: &str) -> Result<(IndexEntry, usize), GitError> {
    let corrupt = |msg: String| GitError::CorruptIndex(msg);
    let (mut stat, flags, rest) = read_stat(data)?;
    let mut consumed_after_stat = 0usize;
    let mut rest = rest;

    if flags & EXTENDED_FLAG != 0 {
        let mut extended = rest;
        let _extended_flags = extended.read_u16::<BigEndian>().map_err(|e| corrupt(e.to_string()))?;
        rest = extended;
        consumed_after_stat += 2;
    }

    let (strip, varint_len) = read_v4_varint(rest)?;
    rest = &rest[varint_len..];
    consumed_after_stat += varint_len;

    let nul = rest
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| corrupt("unterminated v4 path suffix".to_string()))?;
    let suffix = std::str::from_utf8(&rest[..nul]).map_err(|_| corrupt("path suffix is not valid UTF-8".to_string()))?;
    consumed_after_stat += nul + 1;

    if strip > previous_path.len() {
        return Err(corrupt("v4 path strip count exceeds previous path length".to_string()));
    }
    let kept = &previous_path[..previous_path.len() - strip];
    let path = format!("{kept}{suffix}");

    stat.flags = flags;
    Ok((IndexEntry { path, stat }, 62 + consumed_after_stat))
}
