//! Reference resolution: loose refs under `refs/heads/` and `refs/tags/`, the `packed-refs`
//! fallback file, symbolic ref chains, and `HEAD`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::errors::GitError;
use crate::hash::Hash;

const MAX_SYMBOLIC_DEPTH: usize = 10;

/// Where `HEAD` currently points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Head {
    /// `HEAD` is `ref: refs/heads/<name>`, and that branch resolves to `hash`.
    Attached { refname: String, hash: Hash },
    /// `HEAD` is `ref: refs/heads/<name>`, but the branch has no commits yet.
    Unborn { refname: String },
    /// `HEAD` holds a bare object hash directly.
    Detached { hash: Hash },
}

/// Resolves `refname` (a path relative to `git_dir`, e.g. `refs/heads/main` or `HEAD`) to a
/// concrete object hash, following symbolic ref chains up to [`MAX_SYMBOLIC_DEPTH`] hops.
pub fn resolve_ref(git_dir: &Path, refname: &str) -> Result<Hash, GitError> {
    resolve_ref_at_depth(git_dir, refname, 0)
}

fn resolve_ref_at_depth(git_dir: &Path, refname: &str, depth: usize) -> Result<Hash, GitError> {
    if depth > MAX_SYMBOLIC_DEPTH {
        return Err(GitError::InvalidRef(
            refname.to_string(),
            format!("symbolic ref chain exceeds depth {MAX_SYMBOLIC_DEPTH}"),
        ));
    }

    let loose_path = git_dir.join(refname);
    if loose_path.is_file() {
        let content = fs::read_to_string(&loose_path)?;
        return resolve_ref_content(git_dir, refname, content.trim(), depth);
    }

    let packed = read_packed_refs(git_dir)?;
    if let Some(hash) = packed.get(refname) {
        return Ok(*hash);
    }

    Err(GitError::InvalidRef(refname.to_string(), "ref not found".to_string()))
}

fn resolve_ref_content(git_dir: &Path, refname: &str, content: &str, depth: usize) -> Result<Hash, GitError> {
    if let Some(target) = content.strip_prefix("ref: ") {
        return resolve_ref_at_depth(git_dir, target.trim(), depth + 1);
    }
    content
        .parse::<Hash>()
        .map_err(|_| GitError::InvalidRef(refname.to_string(), format!("not a hash or symbolic ref: `{content}`")))
}

/// Parses `<git_dir>/packed-refs`. Returns an empty map if the file does not exist.
pub fn read_packed_refs(git_dir: &Path) -> Result<BTreeMap<String, Hash>, GitError> {
    let path = git_dir.join("packed-refs");
    let mut out = BTreeMap::new();
    let content = match fs::read_to_string(&path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(out),
        Err(e) => return Err(e.into()),
    };

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('^') {
            // A `^<peeled-hash>` line annotates the previous entry's peeled target; this core
            // doesn't expose peeling, so it's skipped rather than parsed.
            continue;
        }
        let mut parts = line.splitn(2, ' ');
        let hash_str = parts.next().unwrap_or("");
        let name = match parts.next() {
            Some(n) => n.trim(),
            None => {
                warn!("skipping malformed packed-refs line: `{line}`");
                continue;
            }
        };
        match hash_str.parse::<Hash>() {
            Ok(hash) => {
                out.insert(name.to_string(), hash);
            }
            Err(_) => warn!("skipping packed-refs line with invalid hash: `{line}`"),
        }
    }
    Ok(out)
}

/// Walks `refs/heads/` and `refs/tags/` recursively, merging in `packed-refs` entries that have
/// no loose counterpart (loose refs shadow packed ones). Individual unreadable refs are logged
/// and skipped rather than aborting the whole load.
pub fn load_refs(git_dir: &Path) -> Result<BTreeMap<String, Hash>, GitError> {
    let mut out = BTreeMap::new();

    for prefix in ["refs/heads", "refs/tags"] {
        let dir = git_dir.join(prefix);
        if dir.is_dir() {
            walk_loose_refs(git_dir, &dir, prefix, &mut out);
        }
    }

    for (name, hash) in read_packed_refs(git_dir)? {
        out.entry(name).or_insert(hash);
    }

    Ok(out)
}

fn walk_loose_refs(git_dir: &Path, dir: &Path, prefix: &str, out: &mut BTreeMap<String, Hash>) {
    let entries = match fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) => {
            warn!("failed to read {}: {e}", dir.display());
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let name = entry.file_name();
        let name = name.to_string_lossy();
        let refname = format!("{prefix}/{name}");

        if path.is_dir() {
            walk_loose_refs(git_dir, &path, &refname, out);
            continue;
        }

        match resolve_ref(git_dir, &refname) {
            Ok(hash) => {
                out.insert(refname, hash);
            }
            Err(e) => warn!("skipping unreadable ref `{refname}`: {e}"),
        }
    }
}

/// Reads and resolves `<git_dir>/HEAD`.
pub fn load_head(git_dir: &Path) -> Result<Head, GitError> {
    let head_path: PathBuf = git_dir.join("HEAD");
    let content = fs::read_to_string(&head_path)?;
    let content = content.trim();

    if let Some(target) = content.strip_prefix("ref: ") {
        let refname = target.trim().to_string();
        match resolve_ref(git_dir, &refname) {
            Ok(hash) => Ok(Head::Attached { refname, hash }),
            Err(GitError::InvalidRef(_, _)) => Ok(Head::Unborn { refname }),
            Err(e) => Err(e),
        }
    } else {
        let hash = content
            .parse::<Hash>()
            .map_err(|_| GitError::InvalidRef("HEAD".to_string(), format!("not a hash or symbolic ref: `{content}`")))?;
        Ok(Head::Detached { hash })
    }
}
