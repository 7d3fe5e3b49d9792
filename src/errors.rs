//! Error types for the git-inspect crate.
//!
//! One enum is returned from every fallible public function. Each subsystem (repository
//! discovery, ref resolution, index parsing, pack parsing, object parsing) maps its failures onto
//! one of these variants rather than inventing a per-module error type.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GitError {
    /// Neither `path` nor any ancestor directory contains a `.git`.
    #[error("not a git repository (or any parent up to mount point): {0}")]
    NotARepository(String),

    /// `.git` exists but is missing `objects/`, `refs/`, or `HEAD`.
    #[error("invalid git repository at `{0}`: {1}")]
    InvalidRepository(String, String),

    /// `.git/index` is malformed or truncated.
    #[error("corrupt index file: {0}")]
    CorruptIndex(String),

    /// A `.idx` pack index is malformed or truncated.
    #[error("corrupt pack index: {0}")]
    CorruptPackIndex(String),

    /// A loose or packed object failed to parse.
    #[error("corrupt object {0}: {1}")]
    CorruptObject(String, String),

    /// A delta instruction stream is malformed.
    #[error("invalid delta: {0}")]
    InvalidDelta(String),

    /// A ref file or packed-refs line could not be resolved.
    #[error("invalid ref `{0}`: {1}")]
    InvalidRef(String, String),

    /// A hash string or byte slice is not a valid object id.
    #[error("invalid hash `{0}`")]
    InvalidHash(String),

    /// A commit object violates the commit grammar (e.g. missing `tree`).
    #[error("malformed commit: {0}")]
    MalformedCommit(String),

    /// A tag object violates the tag grammar.
    #[error("malformed tag: {0}")]
    MalformedTag(String),

    /// An author/committer/tagger signature line could not be parsed.
    #[error("malformed signature: {0}")]
    MalformedSignature(String),

    /// Underlying filesystem failure.
    #[error("IO error: {0}")]
    IOError(#[from] std::io::Error),

    /// A format version or hash algorithm outside what this core supports.
    #[error("unsupported: {0}")]
    Unsupported(String),
}
