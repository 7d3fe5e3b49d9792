//! The four object kinds a Git repository stores, and the small numeric encodings used for them
//! on disk: the ASCII type tag in a loose object header, and the 3-bit pack type in a pack entry
//! header.

use crate::errors::GitError;

/// Pack entry types, including the two delta encodings that never appear as loose objects, plus
/// `None` for a loose-object or tag `type` header naming something other than the four base kinds
/// (an unrecognized or future extension type coerces to `None` rather than failing to parse).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectType {
    Commit,
    Tree,
    Blob,
    Tag,
    None,
    OfsDelta,
    RefDelta,
}

impl ObjectType {
    /// The ASCII tag used in a loose object header (`"<tag> <len>\0"`). Only defined for the
    /// four base types; delta entries never have a loose-object form.
    pub fn as_bytes(&self) -> &'static [u8] {
        match self {
            ObjectType::Commit => b"commit",
            ObjectType::Tree => b"tree",
            ObjectType::Blob => b"blob",
            ObjectType::Tag => b"tag",
            ObjectType::None => b"none",
            ObjectType::OfsDelta | ObjectType::RefDelta => {
                unreachable!("delta entries have no loose object header")
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::Commit => "commit",
            ObjectType::Tree => "tree",
            ObjectType::Blob => "blob",
            ObjectType::Tag => "tag",
            ObjectType::None => "none",
            ObjectType::OfsDelta => "ofs-delta",
            ObjectType::RefDelta => "ref-delta",
        }
    }

    /// Maps a loose-object or tag `type` header string to an [`ObjectType`]. Unrecognized strings
    /// coerce to `ObjectType::None` rather than erroring; the `Result` is kept for call-site
    /// uniformity with the other `from_*` constructors.
    pub fn from_header_str(s: &str) -> Result<ObjectType, GitError> {
        match s {
            "commit" => Ok(ObjectType::Commit),
            "tree" => Ok(ObjectType::Tree),
            "blob" => Ok(ObjectType::Blob),
            "tag" => Ok(ObjectType::Tag),
            _ => Ok(ObjectType::None),
        }
    }

    /// The 3-bit type tag packed into a pack entry's header varint. `None` never appears in a pack
    /// entry header.
    pub fn to_pack_type_u8(self) -> u8 {
        match self {
            ObjectType::Commit => 1,
            ObjectType::Tree => 2,
            ObjectType::Blob => 3,
            ObjectType::Tag => 4,
            ObjectType::OfsDelta => 6,
            ObjectType::RefDelta => 7,
            ObjectType::None => unreachable!("None has no pack entry type"),
        }
    }

    pub fn from_pack_type_u8(v: u8) -> Result<ObjectType, GitError> {
        match v {
            1 => Ok(ObjectType::Commit),
            2 => Ok(ObjectType::Tree),
            3 => Ok(ObjectType::Blob),
            4 => Ok(ObjectType::Tag),
            6 => Ok(ObjectType::OfsDelta),
            7 => Ok(ObjectType::RefDelta),
            other => Err(GitError::CorruptObject(
                "<pack>".to_string(),
                format!("unknown pack object type {other}"),
            )),
        }
    }

    pub fn is_delta(self) -> bool {
        matches!(self, ObjectType::OfsDelta | ObjectType::RefDelta)
    }

    pub fn is_base(self) -> bool {
        !self.is_delta()
    }
}

impl std::fmt::Display for ObjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_type_round_trips() {
        for t in [
            ObjectType::Commit,
            ObjectType::Tree,
            ObjectType::Blob,
            ObjectType::Tag,
            ObjectType::OfsDelta,
            ObjectType::RefDelta,
        ] {
            assert_eq!(ObjectType::from_pack_type_u8(t.to_pack_type_u8()).unwrap(), t);
        }
    }

    #[test]
    fn header_str_round_trips_for_base_types() {
        for t in [ObjectType::Commit, ObjectType::Tree, ObjectType::Blob, ObjectType::Tag] {
            assert_eq!(ObjectType::from_header_str(t.as_str()).unwrap(), t);
        }
    }

    #[test]
    fn unknown_header_string_coerces_to_none_variant() {
        assert_eq!(ObjectType::from_header_str("ai-plan").unwrap(), ObjectType::None);
    }

    #[test]
    fn delta_classification() {
        assert!(ObjectType::OfsDelta.is_delta());
        assert!(ObjectType::RefDelta.is_delta());
        assert!(ObjectType::Blob.is_base());
    }
}
