//! Reader for `.git/config`: a minimal INI dialect with `[section]` / `[section "subsection"]`
//! headers, `key = value` lines, and `;`/`#` comments. Hand-written rather than pulled in from a
//! generic `ini` crate — git's subsection-in-quotes, case-insensitive-key grammar doesn't map onto
//! the generic model closely enough to be worth the dependency.

use std::collections::BTreeMap;
use std::path::Path;

use crate::errors::GitError;

/// A parsed `.git/config`. Sections are keyed by `(name, subsection)`, lower-cased name; keys
/// within a section are also lower-cased, matching git's case-insensitivity for both.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    sections: BTreeMap<(String, Option<String>), BTreeMap<String, String>>,
}

impl Config {
    pub fn parse(text: &str) -> Result<Config, GitError> {
        let mut sections = BTreeMap::new();
        let mut current: (String, Option<String>) = (String::new(), None);

        for raw_line in text.lines() {
            let line = strip_comment(raw_line).trim();
            if line.is_empty() {
                continue;
            }

            if let Some(header) = line.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
                current = parse_section_header(header)?;
                sections.entry(current.clone()).or_insert_with(BTreeMap::new);
                continue;
            }

            let (key, value) = match line.split_once('=') {
                Some((k, v)) => (k.trim().to_lowercase(), v.trim().to_string()),
                None => (line.trim().to_lowercase(), "true".to_string()),
            };
            sections.entry(current.clone()).or_insert_with(BTreeMap::new).insert(key, value);
        }

        Ok(Config { sections })
    }

    pub fn load(git_dir: &Path) -> Result<Config, GitError> {
        let path = git_dir.join("config");
        match std::fs::read_to_string(&path) {
            Ok(text) => Config::parse(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Config::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn get(&self, section: &str, subsection: Option<&str>, key: &str) -> Option<&str> {
        self.sections
            .get(&(section.to_lowercase(), subsection.map(str::to_string)))
            .and_then(|kv| kv.get(&key.to_lowercase()))
            .map(String::as_str)
    }

    pub fn core_repository_format_version(&self) -> Option<&str> {
        self.get("core", None, "repositoryformatversion")
    }

    pub fn core_filemode(&self) -> Option<&str> {
        self.get("core", None, "filemode")
    }

    pub fn core_bare(&self) -> Option<&str> {
        self.get("core", None, "bare")
    }

    pub fn core_logallrefupdates(&self) -> Option<&str> {
        self.get("core", None, "logallrefupdates")
    }

    /// The repository's declared object hash algorithm. Git's own convention: absent means
    /// `sha1`, since `extensions.objectformat` was only introduced alongside SHA-256 support.
    pub fn object_format(&self) -> &str {
        self.get("extensions", None, "objectformat").unwrap_or("sha1")
    }
}

fn strip_comment(line: &str) -> &str {
    // `;` and `#` only start a comment outside of a quoted value; config values in this core are
    // never quoted strings containing those characters, so a simple first-occurrence split is
    // sufficient for the grammar actually consumed (see `object_format`/`core_*` accessors).
    for (i, c) in line.char_indices() {
        if c == ';' || c == '#' {
            return &line[..i];
        }
    }
    line
}

fn parse_section_header(header: &str) -> Result<(String, Option<String>), GitError> {
    let header = header.trim();
    if let Some(space) = header.find(' ') {
        let name = header[..space].trim().to_lowercase();
        let rest = header[space..].trim();
        let sub = rest
            .strip_prefix('"')
            .and_then(|s| s.strip_suffix('"'))
            .ok_or_else(|| GitError::CorruptIndex(format!("malformed config section header: `[{header}]`")))?;
        Ok((name, Some(sub.to_string())))
    } else {
        Ok((header.to_lowercase(), None))
    }
}
