//! A commit object: a tree snapshot, its parents, an author/committer signature pair, and a
//! free-form message (which may itself carry a detached `gpgsig` block).

use std::fmt::Display;
use std::str::FromStr;

use bstr::ByteSlice;

use crate::errors::GitError;
use crate::hash::Hash;
use crate::internal::object::ObjectTrait;
use crate::internal::object::signature::Signature;
use crate::internal::object::types::ObjectType;

#[derive(Eq, Debug, Clone)]
pub struct Commit {
    pub id: Hash,
    pub tree_id: Hash,
    pub parent_commit_ids: Vec<Hash>,
    pub author: Signature,
    pub committer: Signature,
    pub message: String,
}

impl PartialEq for Commit {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Display for Commit {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        writeln!(f, "tree: {}", self.tree_id)?;
        for parent in self.parent_commit_ids.iter() {
            writeln!(f, "parent: {parent}")?;
        }
        writeln!(f, "author {}", self.author)?;
        writeln!(f, "committer {}", self.committer)?;
        writeln!(f, "{}", self.message)
    }
}

impl Commit {
    /// Formats the commit message by extracting the first meaningful line.
    ///
    /// If the message contains a PGP signature, returns the first non-empty line after the
    /// signature block; otherwise returns the first non-empty line in the message.
    pub fn format_message(&self) -> String {
        if let Some(pos) = self
            .message
            .lines()
            .position(|line| line.contains("-----END PGP SIGNATURE-----"))
        {
            return self
                .message
                .lines()
                .skip(pos + 1)
                .find(|line| !line.trim().is_empty())
                .map(|line| line.to_owned())
                .unwrap_or_else(|| self.message.clone());
        }

        self.message
            .lines()
            .find(|line| !line.trim().is_empty())
            .map(|line| line.to_owned())
            .unwrap_or_else(|| self.message.clone())
    }
}

impl ObjectTrait for Commit {
    fn from_bytes(data: &[u8], hash: Hash) -> Result<Self, GitError>
    where
        Self: Sized,
    {
        let malformed = |msg: &str| GitError::MalformedCommit(msg.to_string());

        let mut commit = data;

        let tree_end = commit.find_byte(0x0a).ok_or_else(|| malformed("missing newline after tree line"))?;
        if !commit.starts_with(b"tree ") {
            return Err(malformed("first line is not a `tree` line"));
        }
        let tree_id = Hash::from_str(
            commit[5..tree_end]
                .to_str()
                .map_err(|_| malformed("tree id is not valid UTF-8"))?,
        )
        .map_err(|_| malformed("tree id is not a valid hash"))?;
        let binding = commit[tree_end + 1..].to_vec();
        commit = &binding;

        let author_begin = commit.find("author").ok_or_else(|| malformed("missing author line"))?;
        let mut parent_commit_ids = Vec::new();
        for parent in commit[..author_begin].find_iter("parent") {
            let parent_end = commit[parent..]
                .find_byte(0x0a)
                .ok_or_else(|| malformed("unterminated parent line"))?;
            let parent_id = Hash::from_str(
                commit[parent + 7..parent + parent_end]
                    .to_str()
                    .map_err(|_| malformed("parent id is not valid UTF-8"))?,
            )
            .map_err(|_| malformed("parent id is not a valid hash"))?;
            parent_commit_ids.push(parent_id);
        }
        let binding = commit[author_begin..].to_vec();
        commit = &binding;

        let author_line_end = commit.find_byte(0x0a).ok_or_else(|| malformed("unterminated author line"))?;
        let author = Signature::from_data(commit[..author_line_end].to_vec())?;

        let binding = commit[author_line_end + 1..].to_vec();
        commit = &binding;
        let committer_line_end = commit.find_byte(0x0a).ok_or_else(|| malformed("unterminated committer line"))?;
        let committer = Signature::from_data(commit[..committer_line_end].to_vec())?;

        let message = commit[committer_line_end + 1..]
            .to_str()
            .map_err(|_| malformed("message is not valid UTF-8"))?
            .to_string();

        Ok(Commit {
            id: hash,
            tree_id,
            parent_commit_ids,
            author,
            committer,
            message,
        })
    }

    fn get_type(&self) -> ObjectType {
        ObjectType::Commit
    }

    fn get_size(&self) -> usize {
        self.to_data().map(|d| d.len()).unwrap_or(0)
    }

    fn to_data(&self) -> Result<Vec<u8>, GitError> {
        let mut data = Vec::new();

        data.extend(b"tree ");
        data.extend(self.tree_id.to_string().as_bytes());
        data.extend(&[0x0a]);

        for parent_tree_id in &self.parent_commit_ids {
            data.extend(b"parent ");
            data.extend(parent_tree_id.to_string().as_bytes());
            data.extend(&[0x0a]);
        }

        data.extend(b"author ");
        data.extend(self.author.to_data()?);
        data.extend(&[0x0a]);
        data.extend(b"committer ");
        data.extend(self.committer.to_data()?);
        data.extend(&[0x0a]);
        // Important! or Git Server can't parse & reply: unpack-objects abnormal exit
        data.extend(self.message.as_bytes());

        Ok(data)
    }
}
