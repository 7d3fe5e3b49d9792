//! An annotated tag object: a named pointer at another object, with its own signature and
//! message (as opposed to a lightweight tag, which is just a ref pointing straight at a commit).

use std::fmt::Display;
use std::str::FromStr;

use bstr::ByteSlice;

use crate::errors::GitError;
use crate::hash::Hash;
use crate::internal::object::ObjectTrait;
use crate::internal::object::signature::Signature;
use crate::internal::object::types::ObjectType;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub id: Hash,
    pub object_id: Hash,
    pub object_type: ObjectType,
    pub tag_name: String,
    pub tagger: Signature,
    pub message: String,
}

impl Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "object {}", self.object_id)?;
        writeln!(f, "type {}", self.object_type)?;
        writeln!(f, "tag {}", self.tag_name)?;
        writeln!(f, "tagger {}", self.tagger)?;
        writeln!(f, "{}", self.message)
    }
}

impl ObjectTrait for Tag {
    fn from_bytes(data: &[u8], hash: Hash) -> Result<Self, GitError>
    where
        Self: Sized,
    {
        let malformed = |msg: &str| GitError::MalformedTag(msg.to_string());

        let mut cursor = data;

        let object_end = cursor.find_byte(0x0a).ok_or_else(|| malformed("missing newline after object line"))?;
        if !cursor.starts_with(b"object ") {
            return Err(malformed("first line is not an `object` line"));
        }
        let object_id = Hash::from_str(
            cursor[7..object_end].to_str().map_err(|_| malformed("object id is not valid UTF-8"))?,
        )
        .map_err(|_| malformed("object id is not a valid hash"))?;
        let binding = cursor[object_end + 1..].to_vec();
        cursor = &binding;

        let type_end = cursor.find_byte(0x0a).ok_or_else(|| malformed("missing newline after type line"))?;
        if !cursor.starts_with(b"type ") {
            return Err(malformed("second line is not a `type` line"));
        }
        let object_type =
            ObjectType::from_header_str(cursor[5..type_end].to_str().map_err(|_| malformed("type is not valid UTF-8"))?)?;
        let binding = cursor[type_end + 1..].to_vec();
        cursor = &binding;

        let tag_end = cursor.find_byte(0x0a).ok_or_else(|| malformed("missing newline after tag line"))?;
        if !cursor.starts_with(b"tag ") {
            return Err(malformed("third line is not a `tag` line"));
        }
        let tag_name = cursor[4..tag_end]
            .to_str()
            .map_err(|_| malformed("tag name is not valid UTF-8"))?
            .to_string();
        let binding = cursor[tag_end + 1..].to_vec();
        cursor = &binding;

        let tagger_end = cursor.find_byte(0x0a).ok_or_else(|| malformed("missing newline after tagger line"))?;
        let tagger = Signature::from_data(cursor[..tagger_end].to_vec())?;

        let message = cursor[tagger_end + 1..]
            .to_str()
            .map_err(|_| malformed("message is not valid UTF-8"))?
            .to_string();

        Ok(Tag {
            id: hash,
            object_id,
            object_type,
            tag_name,
            tagger,
            message,
        })
    }

    fn get_type(&self) -> ObjectType {
        ObjectType::Tag
    }

    fn get_size(&self) -> usize {
        self.to_data().map(|d| d.len()).unwrap_or(0)
    }

    fn to_data(&self) -> Result<Vec<u8>, GitError> {
        let mut data = Vec::new();
        data.extend(b"object ");
        data.extend(self.object_id.to_string().as_bytes());
        data.push(0x0a);
        data.extend(b"type ");
        data.extend(self.object_type.as_str().as_bytes());
        data.push(0x0a);
        data.extend(b"tag ");
        data.extend(self.tag_name.as_bytes());
        data.push(0x0a);
        data.extend(b"tagger ");
        data.extend(self.tagger.to_data()?);
        data.push(0x0a);
        data.extend(self.message.as_bytes());
        Ok(data)
    }
}
