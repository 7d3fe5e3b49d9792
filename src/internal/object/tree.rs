//! A tree object: an ordered list of `(mode, name, hash)` entries, each pointing at a blob
//! (file), another tree (subdirectory), or (rarely) a commit (gitlink/submodule).

use std::fmt::Display;

use crate::errors::GitError;
use crate::hash::{HASH_SIZE, Hash};
use crate::internal::object::ObjectTrait;
use crate::internal::object::types::ObjectType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeEntryMode {
    Blob,
    BlobExecutable,
    Tree,
    Symlink,
    Commit,
}

impl TreeEntryMode {
    fn from_octal(mode: &[u8]) -> Result<TreeEntryMode, GitError> {
        match mode {
            b"100644" | b"100664" => Ok(TreeEntryMode::Blob),
            b"100755" => Ok(TreeEntryMode::BlobExecutable),
            b"40000" | b"040000" => Ok(TreeEntryMode::Tree),
            b"120000" => Ok(TreeEntryMode::Symlink),
            b"160000" => Ok(TreeEntryMode::Commit),
            other => Err(GitError::CorruptObject(
                "<tree>".to_string(),
                format!("unrecognized tree entry mode `{}`", String::from_utf8_lossy(other)),
            )),
        }
    }

    fn as_octal_bytes(self) -> &'static [u8] {
        match self {
            TreeEntryMode::Blob => b"100644",
            TreeEntryMode::BlobExecutable => b"100755",
            TreeEntryMode::Tree => b"40000",
            TreeEntryMode::Symlink => b"120000",
            TreeEntryMode::Commit => b"160000",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub mode: TreeEntryMode,
    pub name: String,
    pub id: Hash,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tree {
    pub id: Hash,
    pub entries: Vec<TreeEntry>,
}

impl Display for Tree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for entry in &self.entries {
            writeln!(
                f,
                "{} {} {}",
                String::from_utf8_lossy(entry.mode.as_octal_bytes()),
                entry.id,
                entry.name
            )?;
        }
        Ok(())
    }
}

impl ObjectTrait for Tree {
    fn from_bytes(data: &[u8], hash: Hash) -> Result<Self, GitError>
    where
        Self: Sized,
    {
        let malformed = |msg: &str| GitError::CorruptObject("<tree>".to_string(), msg.to_string());

        let mut entries = Vec::new();
        let mut cursor = data;
        while !cursor.is_empty() {
            let space = cursor
                .iter()
                .position(|&b| b == b' ')
                .ok_or_else(|| malformed("missing space after mode"))?;
            let mode = TreeEntryMode::from_octal(&cursor[..space])?;

            let nul = cursor[space + 1..]
                .iter()
                .position(|&b| b == 0)
                .ok_or_else(|| malformed("missing NUL after name"))?;
            let name = String::from_utf8(cursor[space + 1..space + 1 + nul].to_vec())
                .map_err(|_| malformed("entry name is not valid UTF-8"))?;

            let hash_start = space + 1 + nul + 1;
            if cursor.len() < hash_start + HASH_SIZE {
                return Err(malformed("truncated entry hash"));
            }
            let id = Hash::from_bytes(&cursor[hash_start..hash_start + HASH_SIZE])?;

            entries.push(TreeEntry { mode, name, id });
            cursor = &cursor[hash_start + HASH_SIZE..];
        }

        Ok(Tree { id: hash, entries })
    }

    fn get_type(&self) -> ObjectType {
        ObjectType::Tree
    }

    fn get_size(&self) -> usize {
        self.to_data().map(|d| d.len()).unwrap_or(0)
    }

    fn to_data(&self) -> Result<Vec<u8>, GitError> {
        let mut data = Vec::new();
        for entry in &self.entries {
            data.extend(entry.mode.as_octal_bytes());
            data.push(b' ');
            data.extend(entry.name.as_bytes());
            data.push(0);
            data.extend(entry.id.as_bytes());
        }
        Ok(data)
    }
}
