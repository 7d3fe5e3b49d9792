//! The author/committer/tagger line embedded in commit and tag objects:
//! `<role> <name> <<email>> <unix-seconds> <+hhmm|-hhmm>`.

use std::fmt::Display;

use bstr::ByteSlice;

use crate::errors::GitError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub name: String,
    pub email: String,
    pub timestamp: i64,
    /// Raw `+hhmm`/`-hhmm` offset, kept verbatim rather than converted to seconds.
    pub timezone: String,
}

impl Signature {
    /// Parses one full line, including its leading role word (`author `, `committer `, or
    /// `tagger `).
    pub fn from_data(line: Vec<u8>) -> Result<Signature, GitError> {
        let malformed = || GitError::MalformedSignature(String::from_utf8_lossy(&line).to_string());

        let space = line.find_byte(b' ').ok_or_else(malformed)?;
        let rest = &line[space + 1..];

        let email_start = rest.find_byte(b'<').ok_or_else(malformed)?;
        let email_end = rest.find_byte(b'>').ok_or_else(malformed)?;
        if email_end < email_start {
            return Err(malformed());
        }

        let name = rest[..email_start].trim_end().to_str().map_err(|_| malformed())?.to_string();
        let email = rest[email_start + 1..email_end].to_str().map_err(|_| malformed())?.to_string();

        let tail = rest[email_end + 1..].trim_start();
        let mut parts = tail.split(|b: &u8| *b == b' ').filter(|s| !s.is_empty());
        let timestamp_bytes = parts.next().ok_or_else(malformed)?;
        let timezone_bytes = parts.next().unwrap_or(b"+0000");

        let timestamp = timestamp_bytes
            .to_str()
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .ok_or_else(malformed)?;
        let timezone = timezone_bytes.to_str().map_err(|_| malformed())?.to_string();

        Ok(Signature {
            name,
            email,
            timestamp,
            timezone,
        })
    }

    pub fn to_data(&self) -> Result<Vec<u8>, GitError> {
        Ok(format!(
            "{} <{}> {} {}",
            self.name, self.email, self.timestamp, self.timezone
        )
        .into_bytes())
    }
}

impl Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} <{}> {} {}", self.name, self.email, self.timestamp, self.timezone)
    }
}
