//! The façade external collaborators talk to: opens a repository off disk, loads its refs and
//! commit graph once, and serves read-only queries against an atomically swappable snapshot.

use std::collections::{BTreeMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, TimeZone, Utc};
use tracing::{debug, trace, warn};

use crate::config::Config;
use crate::errors::GitError;
use crate::hash::Hash;
use crate::internal::index::Index;
use crate::internal::object::ObjectTrait;
use crate::internal::object::commit::Commit;
use crate::internal::object::signature::Signature;
use crate::internal::object::tag::Tag;
use crate::internal::object::tree::{Tree, TreeEntryMode};
use crate::internal::object::types::ObjectType;
use crate::internal::pack::PackFile;
use crate::internal::pack::entry::Entry;
use crate::refs::{self, Head};
use crate::status::{self, StatusEntry};

/// Snapshot of everything an open repository knows about itself. Replaced wholesale on reload;
/// never mutated in place once published.
struct RepoState {
    git_dir: PathBuf,
    work_dir: PathBuf,
    config: Config,
    packs: Vec<PackFile>,
    refs: BTreeMap<String, Hash>,
    head: Head,
    commits: BTreeMap<Hash, Commit>,
}

pub struct Repository {
    state: RwLock<Arc<RepoState>>,
}

#[derive(Debug, Clone)]
pub struct RepoInfo {
    pub name: String,
    pub abs_path: PathBuf,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitKind {
    Commit,
    Merge,
}

#[derive(Debug, Clone)]
pub struct GraphNode {
    pub hash: Hash,
    pub message: String,
    pub author: Signature,
    pub date: DateTime<Utc>,
    pub parents: Vec<Hash>,
    pub branches: Vec<String>,
    pub kind: CommitKind,
}

#[derive(Debug, Clone)]
pub struct GraphLink {
    pub source: Hash,
    pub target: Hash,
}

#[derive(Debug, Clone)]
pub struct Graph {
    pub nodes: Vec<GraphNode>,
    pub links: Vec<GraphLink>,
}

impl Repository {
    pub fn open(path: impl AsRef<Path>) -> Result<Repository, GitError> {
        let (git_dir, work_dir) = discover_git_dir(path.as_ref())?;
        debug!("opening repository at {}", git_dir.display());
        let state = load_state(git_dir, work_dir)?;
        Ok(Repository {
            state: RwLock::new(Arc::new(state)),
        })
    }

    fn snapshot(&self) -> Arc<RepoState> {
        Arc::clone(&self.state.read().expect("repository lock poisoned"))
    }

    /// Rebuilds the repository's caches from disk and atomically swaps them in. Callers never
    /// observe a mix of pre- and post-reload data: queries either clone the old `Arc` or the new
    /// one, never a partially updated one.
    pub fn reload(&self) -> Result<(), GitError> {
        let previous = self.snapshot();
        debug!("reloading repository at {}", previous.git_dir.display());
        let fresh = load_state(previous.git_dir.clone(), previous.work_dir.clone())?;
        *self.state.write().expect("repository lock poisoned") = Arc::new(fresh);
        Ok(())
    }

    pub fn info(&self) -> RepoInfo {
        let state = self.snapshot();
        let name = state
            .work_dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| state.work_dir.display().to_string());
        let description = fs::read_to_string(state.git_dir.join("description"))
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        RepoInfo {
            name,
            abs_path: state.work_dir.clone(),
            description,
        }
    }

    pub fn config(&self) -> Config {
        self.snapshot().config.clone()
    }

    pub fn branches(&self) -> BTreeMap<String, Hash> {
        self.snapshot()
            .refs
            .iter()
            .filter(|(name, _)| name.starts_with("refs/heads/"))
            .map(|(name, hash)| (name.clone(), *hash))
            .collect()
    }

    pub fn tags(&self) -> BTreeMap<String, Hash> {
        self.snapshot()
            .refs
            .iter()
            .filter(|(name, _)| name.starts_with("refs/tags/"))
            .map(|(name, hash)| (name.clone(), *hash))
            .collect()
    }

    pub fn commits(&self) -> BTreeMap<Hash, Commit> {
        self.snapshot().commits.clone()
    }

    pub fn head_hash(&self) -> Option<Hash> {
        match self.snapshot().head {
            Head::Attached { hash, .. } => Some(hash),
            Head::Detached { hash } => Some(hash),
            Head::Unborn { .. } => None,
        }
    }

    pub fn head_ref(&self) -> Option<String> {
        match &self.snapshot().head {
            Head::Attached { refname, .. } | Head::Unborn { refname } => Some(refname.clone()),
            Head::Detached { .. } => None,
        }
    }

    pub fn head_detached(&self) -> bool {
        matches!(self.snapshot().head, Head::Detached { .. })
    }

    pub fn resolve_ref(&self, name: &str) -> Result<Hash, GitError> {
        let state = self.snapshot();
        refs::resolve_ref(&state.git_dir, name)
    }

    /// Reads one object by hash, trying loose storage first, then every loaded pack index.
    pub fn read_object(&self, hash: &Hash) -> Result<(ObjectType, Vec<u8>), GitError> {
        read_object_from(&self.snapshot(), hash)
    }

    pub fn graph(&self) -> Graph {
        let state = self.snapshot();
        let branch_refs: BTreeMap<Hash, Vec<String>> = {
            let mut map: BTreeMap<Hash, Vec<String>> = BTreeMap::new();
            for (name, hash) in state.refs.iter().filter(|(n, _)| n.starts_with("refs/heads/")) {
                map.entry(*hash).or_default().push(name.clone());
            }
            map
        };

        let mut nodes: Vec<GraphNode> = state
            .commits
            .values()
            .map(|commit| GraphNode {
                hash: commit.id,
                message: commit.format_message(),
                author: commit.author.clone(),
                date: signature_date(&commit.author),
                parents: commit.parent_commit_ids.clone(),
                branches: branch_refs.get(&commit.id).cloned().unwrap_or_default(),
                kind: if commit.parent_commit_ids.len() >= 2 {
                    CommitKind::Merge
                } else {
                    CommitKind::Commit
                },
            })
            .collect();

        nodes.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.hash.cmp(&b.hash)));

        let links = nodes
            .iter()
            .flat_map(|node| node.parents.iter().map(move |parent| GraphLink {
                source: node.hash,
                target: *parent,
            }))
            .collect();

        Graph { nodes, links }
    }

    pub fn status(&self) -> Result<Vec<StatusEntry>, GitError> {
        let state = self.snapshot();

        let head_tree = match self.head_hash() {
            Some(hash) => {
                let commit = resolve_to_commit(&state, hash)?;
                let mut flat = BTreeMap::new();
                if let Some(commit) = commit {
                    flatten_tree(&state, commit.tree_id, "", &mut flat)?;
                }
                flat
            }
            None => BTreeMap::new(),
        };

        let index_path = state.git_dir.join("index");
        let index = match fs::read(&index_path) {
            Ok(bytes) => Index::parse(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Index { version: 2, entries: vec![] },
            Err(e) => return Err(e.into()),
        };

        status::compute_status(&head_tree, &index, &state.work_dir)
    }
}

/// Walks from `start` toward the filesystem root looking for a `.git` entry, per the discovery
/// algorithm: a directory `.git` is used directly; a regular `.git` file is a worktree/submodule
/// pointer whose first line must be `gitdir: <path>`.
fn discover_git_dir(start: &Path) -> Result<(PathBuf, PathBuf), GitError> {
    if start.file_name().map(|n| n == ".git").unwrap_or(false) && start.is_dir() {
        let work_dir = start.parent().unwrap_or(start).to_path_buf();
        return Ok((start.to_path_buf(), work_dir));
    }

    let mut dir = start.to_path_buf();
    loop {
        let candidate = dir.join(".git");
        if candidate.is_dir() {
            return Ok((candidate, dir));
        }
        if candidate.is_file() {
            let content = fs::read_to_string(&candidate)?;
            let first_line = content.lines().next().unwrap_or("");
            let target = first_line
                .strip_prefix("gitdir: ")
                .ok_or_else(|| GitError::InvalidRepository(candidate.display().to_string(), "`.git` file missing `gitdir: ` prefix".to_string()))?
                .trim();
            let git_dir = dir.join(target);
            let git_dir = fs::canonicalize(&git_dir).unwrap_or(git_dir);
            return Ok((git_dir, dir));
        }

        match dir.parent() {
            Some(parent) => dir = parent.to_path_buf(),
            None => return Err(GitError::NotARepository(start.display().to_string())),
        }
    }
}

fn load_state(git_dir: PathBuf, work_dir: PathBuf) -> Result<RepoState, GitError> {
    if !git_dir.is_dir() {
        return Err(GitError::InvalidRepository(git_dir.display().to_string(), "not a directory".to_string()));
    }
    for required in ["objects", "refs", "HEAD"] {
        if !git_dir.join(required).exists() {
            return Err(GitError::InvalidRepository(
                git_dir.display().to_string(),
                format!("missing `{required}`"),
            ));
        }
    }

    let config = Config::load(&git_dir)?;
    if config.object_format() != "sha1" {
        return Err(GitError::Unsupported(format!("hash algorithm `{}`", config.object_format())));
    }

    let packs = load_pack_files(&git_dir);
    let refs = refs::load_refs(&git_dir)?;
    let head = refs::load_head(&git_dir)?;

    let mut commits = BTreeMap::new();
    let mut visited = std::collections::HashSet::new();
    let mut queue: VecDeque<Hash> = refs.values().copied().collect();
    if let Head::Attached { hash, .. } | Head::Detached { hash } = &head {
        queue.push_back(*hash);
    }

    let partial_state = RepoState {
        git_dir: git_dir.clone(),
        work_dir: work_dir.clone(),
        config,
        packs,
        refs,
        head,
        commits: BTreeMap::new(),
    };

    while let Some(hash) = queue.pop_front() {
        if !visited.insert(hash) {
            continue;
        }
        trace!("traversing object {hash}");
        let (obj_type, data) = match read_object_from(&partial_state, &hash) {
            Ok(v) => v,
            Err(e) => {
                warn!("skipping unreachable object {hash}: {e}");
                continue;
            }
        };

        match obj_type {
            ObjectType::Commit => match Commit::from_bytes(&data, hash) {
                Ok(commit) => {
                    for parent in &commit.parent_commit_ids {
                        queue.push_back(*parent);
                    }
                    commits.insert(hash, commit);
                }
                Err(e) => warn!("skipping malformed commit {hash}: {e}"),
            },
            ObjectType::Tag => match Tag::from_bytes(&data, hash) {
                Ok(tag) => queue.push_back(tag.object_id),
                Err(e) => warn!("skipping malformed tag {hash}: {e}"),
            },
            ObjectType::Tree | ObjectType::Blob | ObjectType::None => {}
            ObjectType::OfsDelta | ObjectType::RefDelta => {
                warn!("object store returned an unresolved delta for {hash}, skipping");
            }
        }
    }

    let RepoState {
        git_dir,
        work_dir,
        config,
        packs,
        refs,
        head,
        ..
    } = partial_state;

    Ok(RepoState {
        git_dir,
        work_dir,
        config,
        packs,
        refs,
        head,
        commits,
    })
}

fn load_pack_files(git_dir: &Path) -> Vec<PackFile> {
    let pack_dir = git_dir.join("objects/pack");
    let entries = match fs::read_dir(&pack_dir) {
        Ok(e) => e,
        Err(_) => return Vec::new(),
    };

    let mut packs = Vec::new();
    for entry in entries.flatten() {
        let idx_path = entry.path();
        if idx_path.extension().and_then(|e| e.to_str()) != Some("idx") {
            continue;
        }
        let pack_path = idx_path.with_extension("pack");
        match PackFile::open(&pack_path, &idx_path) {
            Ok(pack) => packs.push(pack),
            Err(e) => warn!("skipping pack index {}: {e}", idx_path.display()),
        }
    }
    packs
}

fn read_object_from(state: &RepoState, hash: &Hash) -> Result<(ObjectType, Vec<u8>), GitError> {
    let hex = hash.to_string();
    let loose_path = state.git_dir.join("objects").join(&hex[..2]).join(&hex[2..]);

    if loose_path.is_file() {
        let file = fs::File::open(&loose_path)?;
        let mut decoder = flate2::read::ZlibDecoder::new(std::io::BufReader::new(file));
        let mut raw = Vec::new();
        std::io::Read::read_to_end(&mut decoder, &mut raw)
            .map_err(|e| GitError::CorruptObject(hex.clone(), format!("inflating loose object: {e}")))?;

        let nul = raw
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| GitError::CorruptObject(hex.clone(), "missing NUL in loose object header".to_string()))?;
        let header = std::str::from_utf8(&raw[..nul]).map_err(|_| GitError::CorruptObject(hex.clone(), "header is not valid UTF-8".to_string()))?;
        let (type_str, _size_str) = header
            .split_once(' ')
            .ok_or_else(|| GitError::CorruptObject(hex.clone(), "malformed loose object header".to_string()))?;
        let obj_type = ObjectType::from_header_str(type_str)?;
        let body = raw[nul + 1..].to_vec();
        trace!("read loose object {hash} ({obj_type})");
        return Ok((obj_type, body));
    }

    for pack in &state.packs {
        if pack.contains(hash) {
            // A ref-delta's base can live in a sibling pack (e.g. after an incremental repack) or
            // as a loose object; fall back to a full repository-wide lookup rather than failing
            // when the base isn't in this pack's own index.
            let entry = pack.resolve_with(hash, &|base_hash| {
                let (obj_type, data) = read_object_from(state, base_hash)?;
                Ok(Entry { obj_type, data })
            })?;
            trace!("read packed object {hash} ({})", entry.obj_type);
            return Ok((entry.obj_type, entry.data));
        }
    }

    Err(GitError::CorruptObject(hex, "object not found in loose or packed storage".to_string()))
}

/// Reads `hash` and, if it names a commit directly, returns it; if it names an annotated tag,
/// peels through `object` until a commit (or non-commit terminal) is reached.
fn resolve_to_commit(state: &RepoState, hash: Hash) -> Result<Option<Commit>, GitError> {
    if let Some(commit) = state.commits.get(&hash) {
        return Ok(Some(commit.clone()));
    }

    let (obj_type, data) = read_object_from(state, &hash)?;
    match obj_type {
        ObjectType::Commit => Ok(Some(Commit::from_bytes(&data, hash)?)),
        ObjectType::Tag => {
            let tag = Tag::from_bytes(&data, hash)?;
            resolve_to_commit(state, tag.object_id)
        }
        _ => Ok(None),
    }
}

fn flatten_tree(state: &RepoState, tree_hash: Hash, prefix: &str, out: &mut BTreeMap<String, Hash>) -> Result<(), GitError> {
    let (obj_type, data) = read_object_from(state, &tree_hash)?;
    if obj_type != ObjectType::Tree {
        return Err(GitError::CorruptObject(tree_hash.to_string(), format!("expected tree, found {obj_type}")));
    }
    let tree = Tree::from_bytes(&data, tree_hash)?;

    for entry in &tree.entries {
        let path = if prefix.is_empty() {
            entry.name.clone()
        } else {
            format!("{prefix}/{}", entry.name)
        };
        match entry.mode {
            TreeEntryMode::Tree => flatten_tree(state, entry.id, &path, out)?,
            TreeEntryMode::Blob | TreeEntryMode::BlobExecutable | TreeEntryMode::Symlink | TreeEntryMode::Commit => {
                out.insert(path, entry.id);
            }
        }
    }
    Ok(())
}

fn signature_date(sig: &Signature) -> DateTime<Utc> {
    Utc.timestamp_opt(sig.timestamp, 0).single().unwrap_or_else(|| Utc.timestamp_opt(0, 0).single().unwrap())
}
