//! Three-way status: reconciles the `HEAD` tree, the index, and the working tree into a single
//! merged list of porcelain-style `{path, X, Y}` entries.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use tracing::warn;

use crate::errors::GitError;
use crate::hash::Hash;
use crate::internal::index::Index;
use crate::internal::object::types::ObjectType;

/// Index-vs-`HEAD` status, or worktree-vs-index status. Empty string means "no change on this
/// axis", matching git's porcelain `XY` convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Code {
    None,
    Added,
    Modified,
    Deleted,
    Untracked,
}

impl Code {
    fn as_char(self) -> char {
        match self {
            Code::None => ' ',
            Code::Added => 'A',
            Code::Modified => 'M',
            Code::Deleted => 'D',
            Code::Untracked => '?',
        }
    }
}

impl std::fmt::Display for Code {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    pub path: String,
    pub index_status: Code,
    pub worktree_status: Code,
}

/// Computes status given a flattened `HEAD` tree (`path -> blob hash`, subtrees already joined
/// with `/`), the parsed index, and the working directory to walk for worktree state and
/// untracked files.
pub fn compute_status(head_tree: &BTreeMap<String, Hash>, index: &Index, work_dir: &Path) -> Result<Vec<StatusEntry>, GitError> {
    let index_paths: BTreeMap<&str, &Hash> = index.entries.iter().map(|e| (e.path.as_str(), &e.stat.hash)).collect();

    let mut staged: BTreeMap<String, Code> = BTreeMap::new();
    for (path, hash) in index_paths.iter() {
        match head_tree.get(*path) {
            None => {
                staged.insert(path.to_string(), Code::Added);
            }
            Some(head_hash) if head_hash != *hash => {
                staged.insert(path.to_string(), Code::Modified);
            }
            _ => {}
        }
    }
    for path in head_tree.keys() {
        if !index_paths.contains_key(path.as_str()) {
            staged.insert(path.clone(), Code::Deleted);
        }
    }

    let mut worktree: BTreeMap<String, Code> = BTreeMap::new();
    let mut seen_on_disk: BTreeSet<String> = BTreeSet::new();
    walk_worktree(work_dir, work_dir, &mut seen_on_disk)?;

    for entry in &index.entries {
        if !seen_on_disk.contains(&entry.path) {
            worktree.insert(entry.path.clone(), Code::Deleted);
            continue;
        }

        let full_path = work_dir.join(&entry.path);
        let metadata = match fs::metadata(&full_path) {
            Ok(m) => m,
            Err(e) => {
                warn!("status: failed to stat `{}`: {e}", full_path.display());
                continue;
            }
        };
        let size_matches = metadata.len() == entry.stat.size as u64;
        let mtime_matches = file_mtime_secs(&metadata) == Some(entry.stat.mtime_sec as i64);

        if size_matches && mtime_matches {
            continue;
        }

        let content = fs::read(&full_path)?;
        let recomputed = Hash::of_object(ObjectType::Blob, &content);
        if recomputed != entry.stat.hash {
            worktree.insert(entry.path.clone(), Code::Modified);
        }
    }

    let indexed_paths: BTreeSet<&str> = index.entries.iter().map(|e| e.path.as_str()).collect();
    let untracked: BTreeSet<&String> = seen_on_disk.iter().filter(|p| !indexed_paths.contains(p.as_str())).collect();

    // Three groups in fixed order, each sorted on its own: staged changes first (carrying along
    // any worktree status on the same path so it isn't duplicated below), then worktree-only
    // changes, then untracked files.
    let mut entries = Vec::with_capacity(staged.len() + worktree.len() + untracked.len());

    for path in staged.keys() {
        entries.push(StatusEntry {
            index_status: staged[path],
            worktree_status: worktree.get(path).copied().unwrap_or(Code::None),
            path: path.clone(),
        });
    }
    for path in worktree.keys() {
        if staged.contains_key(path) {
            continue;
        }
        entries.push(StatusEntry {
            path: path.clone(),
            index_status: Code::None,
            worktree_status: worktree[path],
        });
    }
    for path in untracked {
        entries.push(StatusEntry {
            path: path.clone(),
            index_status: Code::Untracked,
            worktree_status: Code::Untracked,
        });
    }

    Ok(entries)
}

fn file_mtime_secs(metadata: &fs::Metadata) -> Option<i64> {
    use std::time::UNIX_EPOCH;
    metadata.modified().ok()?.duration_since(UNIX_EPOCH).ok().map(|d| d.as_secs() as i64)
}

fn walk_worktree(root: &Path, dir: &Path, out: &mut BTreeSet<String>) -> Result<(), GitError> {
    let entries = fs::read_dir(dir)?;
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if entry.file_name() == ".git" {
            continue;
        }
        if path.is_dir() {
            walk_worktree(root, &path, out)?;
        } else {
            let rel = path.strip_prefix(root).unwrap_or(&path);
            if let Some(s) = rel.to_str() {
                out.insert(s.replace('\\', "/"));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::internal::index::{Index, IndexEntry, IndexEntryStat};
    use tempfile::tempdir;

    fn fake_hash(n: u8) -> Hash {
        Hash::from_bytes(&[n; 20]).unwrap()
    }

    fn entry_for(path: &str, hash: Hash, size: u32, mtime: u32) -> IndexEntry {
        IndexEntry {
            path: path.to_string(),
            stat: IndexEntryStat {
                ctime_sec: 0,
                ctime_nano: 0,
                mtime_sec: mtime,
                mtime_nano: 0,
                dev: 0,
                ino: 0,
                mode: 0o100644,
                uid: 0,
                gid: 0,
                size,
                hash,
                flags: path.len() as u16,
            },
        }
    }

    #[test]
    fn untracked_file_gets_both_codes_as_untracked() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("new.txt"), "hi").unwrap();
        let index = Index { version: 2, entries: vec![] };
        let head_tree = BTreeMap::new();

        let status = compute_status(&head_tree, &index, dir.path()).unwrap();
        assert_eq!(status.len(), 1);
        assert_eq!(status[0].path, "new.txt");
        assert_eq!(status[0].index_status, Code::Untracked);
        assert_eq!(status[0].worktree_status, Code::Untracked);
    }

    #[test]
    fn staged_addition_not_in_head_tree() {
        let dir = tempdir().unwrap();
        let hash = fake_hash(1);
        std::fs::write(dir.path().join("a.txt"), "x").unwrap();
        let index = Index {
            version: 2,
            entries: vec![entry_for("a.txt", hash, 1, 0)],
        };
        let head_tree = BTreeMap::new();

        let status = compute_status(&head_tree, &index, dir.path()).unwrap();
        let entry = status.iter().find(|e| e.path == "a.txt").unwrap();
        assert_eq!(entry.index_status, Code::Added);
    }

    #[test]
    fn deleted_from_head_tree_not_in_index() {
        let dir = tempdir().unwrap();
        let hash = fake_hash(2);
        let mut head_tree = BTreeMap::new();
        head_tree.insert("gone.txt".to_string(), hash);
        let index = Index { version: 2, entries: vec![] };

        let status = compute_status(&head_tree, &index, dir.path()).unwrap();
        let entry = status.iter().find(|e| e.path == "gone.txt").unwrap();
        assert_eq!(entry.index_status, Code::Deleted);
    }

    #[test]
    fn worktree_deletion_of_indexed_file() {
        let dir = tempdir().unwrap();
        let hash = fake_hash(3);
        let index = Index {
            version: 2,
            entries: vec![entry_for("missing.txt", hash, 1, 0)],
        };
        let mut head_tree = BTreeMap::new();
        head_tree.insert("missing.txt".to_string(), hash);

        let status = compute_status(&head_tree, &index, dir.path()).unwrap();
        let entry = status.iter().find(|e| e.path == "missing.txt").unwrap();
        assert_eq!(entry.worktree_status, Code::Deleted);
        assert_eq!(entry.index_status, Code::None);
    }

    #[test]
    fn worktree_modification_recomputes_hash_on_size_mismatch() {
        let dir = tempdir().unwrap();
        let original_hash = Hash::of_object(ObjectType::Blob, b"old");
        std::fs::write(dir.path().join("a.txt"), "new content").unwrap();
        let index = Index {
            version: 2,
            entries: vec![entry_for("a.txt", original_hash, 3, 0)],
        };
        let mut head_tree = BTreeMap::new();
        head_tree.insert("a.txt".to_string(), original_hash);

        let status = compute_status(&head_tree, &index, dir.path()).unwrap();
        let entry = status.iter().find(|e| e.path == "a.txt").unwrap();
        assert_eq!(entry.worktree_status, Code::Modified);
    }

    #[test]
    fn staged_and_unstaged_changes_on_same_path_merge_into_one_entry() {
        let dir = tempdir().unwrap();
        let committed_hash = Hash::of_object(ObjectType::Blob, b"1");
        let staged_hash = Hash::of_object(ObjectType::Blob, b"2");
        std::fs::write(dir.path().join("a.txt"), "3").unwrap();

        let index = Index {
            version: 2,
            entries: vec![entry_for("a.txt", staged_hash, 1, 0)],
        };
        let mut head_tree = BTreeMap::new();
        head_tree.insert("a.txt".to_string(), committed_hash);

        let status = compute_status(&head_tree, &index, dir.path()).unwrap();
        assert_eq!(status.len(), 1);
        assert_eq!(status[0].index_status, Code::Modified);
        assert_eq!(status[0].worktree_status, Code::Modified);
    }

    #[test]
    fn staged_group_lists_before_untracked_group_regardless_of_path_alphabetical_order() {
        let dir = tempdir().unwrap();
        let hash = fake_hash(9);
        std::fs::write(dir.path().join("zzz.txt"), "x").unwrap();
        std::fs::write(dir.path().join("aaa.txt"), "y").unwrap();
        let index = Index {
            version: 2,
            entries: vec![entry_for("zzz.txt", hash, 1, 0)],
        };
        let head_tree = BTreeMap::new();

        let status = compute_status(&head_tree, &index, dir.path()).unwrap();
        assert_eq!(status.len(), 2);
        assert_eq!(status[0].path, "zzz.txt");
        assert_eq!(status[0].index_status, Code::Added);
        assert_eq!(status[1].path, "aaa.txt");
        assert_eq!(status[1].index_status, Code::Untracked);
    }

    #[test]
    fn worktree_only_group_lists_before_untracked_group_regardless_of_path_alphabetical_order() {
        let dir = tempdir().unwrap();
        let hash = fake_hash(4);
        let index = Index {
            version: 2,
            entries: vec![entry_for("yyy.txt", hash, 1, 0)],
        };
        let mut head_tree = BTreeMap::new();
        head_tree.insert("yyy.txt".to_string(), hash);
        std::fs::write(dir.path().join("bbb.txt"), "untracked").unwrap();

        let status = compute_status(&head_tree, &index, dir.path()).unwrap();
        assert_eq!(status.len(), 2);
        assert_eq!(status[0].path, "yyy.txt");
        assert_eq!(status[0].worktree_status, Code::Deleted);
        assert_eq!(status[1].path, "bbb.txt");
        assert_eq!(status[1].index_status, Code::Untracked);
    }

    #[test]
    fn unchanged_file_has_no_status() {
        let dir = tempdir().unwrap();
        let hash = Hash::of_object(ObjectType::Blob, b"same");
        std::fs::write(dir.path().join("a.txt"), "same").unwrap();
        let metadata = std::fs::metadata(dir.path().join("a.txt")).unwrap();
        let mtime = file_mtime_secs(&metadata).unwrap() as u32;

        let index = Index {
            version: 2,
            entries: vec![entry_for("a.txt", hash, 4, mtime)],
        };
        let mut head_tree = BTreeMap::new();
        head_tree.insert("a.txt".to_string(), hash);

        let status = compute_status(&head_tree, &index, dir.path()).unwrap();
        assert!(status.is_empty());
    }
}
