//! Decoder for Git delta instruction streams: a base-size varint, a result-size varint, then a
//! sequence of copy/insert opcodes that rebuild a target object from a base object's bytes. Used
//! to resolve `ofs-delta`/`ref-delta` pack entries (see [`crate::internal::pack`]).

mod utils;

use std::io::Read;

use crate::errors::GitError;

const COPY_INSTRUCTION_FLAG: u8 = 1 << 7;
const COPY_OFFSET_BYTES: u8 = 4;
const COPY_SIZE_BYTES: u8 = 3;
const COPY_ZERO_SIZE: usize = 0x10000;

/// Applies a delta instruction stream to `base`, returning the reconstructed object bytes.
pub fn delta_decode(stream: &mut impl Read, base: &[u8]) -> Result<Vec<u8>, GitError> {
    let invalid = |msg: &str| GitError::InvalidDelta(msg.to_string());

    let base_size = utils::read_size_encoding(stream).map_err(|e| invalid(&e.to_string()))?;
    if base.len() != base_size {
        return Err(invalid(&format!(
            "delta declares base size {base_size}, but base object is {} bytes",
            base.len()
        )));
    }

    let result_size = utils::read_size_encoding(stream).map_err(|e| invalid(&e.to_string()))?;
    let mut buffer = Vec::with_capacity(result_size.min(1 << 20));

    loop {
        let instruction = match utils::read_bytes::<_, 1>(stream) {
            Ok([b]) => b,
            Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(err) => return Err(invalid(&format!("reading instruction byte: {err}"))),
        };

        if instruction & COPY_INSTRUCTION_FLAG == 0 {
            if instruction == 0 {
                return Err(invalid("zero-length insert instruction is not allowed"));
            }
            let mut data = vec![0; instruction as usize];
            stream.read_exact(&mut data).map_err(|e| invalid(&format!("reading insert data: {e}")))?;
            buffer.extend_from_slice(&data);
        } else {
            let mut nonzero_bytes = instruction;
            let offset = utils::read_partial_int(stream, COPY_OFFSET_BYTES, &mut nonzero_bytes)
                .map_err(|e| invalid(&format!("reading copy offset: {e}")))?;
            let mut size = utils::read_partial_int(stream, COPY_SIZE_BYTES, &mut nonzero_bytes)
                .map_err(|e| invalid(&format!("reading copy size: {e}")))?;
            if size == 0 {
                size = COPY_ZERO_SIZE;
            }

            let end = offset.checked_add(size).ok_or_else(|| invalid("copy instruction overflows"))?;
            let slice = base.get(offset..end).ok_or_else(|| invalid("copy instruction reads past base object"))?;
            buffer.extend_from_slice(slice);
        }
    }

    if buffer.len() != result_size {
        return Err(invalid(&format!(
            "delta produced {} bytes, expected {result_size}",
            buffer.len()
        )));
    }
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    /// Builds a minimal delta: base size, result size, then one copy instruction covering the
    /// whole base followed by one insert instruction.
    fn build_delta(base_len: usize, insert: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        encode_size(&mut out, base_len);
        encode_size(&mut out, base_len + insert.len());

        // copy instruction: offset=0 (no offset bytes present), size=base_len (1 size byte)
        out.push(COPY_INSTRUCTION_FLAG | 0b0001_0000); // bit 4 set => one size byte present
        out.push(base_len as u8);

        // insert instruction
        out.push(insert.len() as u8);
        out.extend_from_slice(insert);
        out
    }

    fn encode_size(out: &mut Vec<u8>, mut value: usize) {
        loop {
            let mut byte = (value & 0x7f) as u8;
            value >>= 7;
            if value != 0 {
                byte |= 0x80;
            }
            out.push(byte);
            if value == 0 {
                break;
            }
        }
    }

    #[test]
    fn copy_then_insert_reconstructs_target() {
        let base = b"hello ";
        let delta = build_delta(base.len(), b"world");
        let mut cursor = Cursor::new(delta);
        let decoded = delta_decode(&mut cursor, base).unwrap();
        assert_eq!(decoded, b"hello world");
    }

    #[test]
    fn base_size_mismatch_is_rejected() {
        let base = b"hello ";
        let delta = build_delta(base.len(), b"world");
        let mut cursor = Cursor::new(delta);
        let err = delta_decode(&mut cursor, b"xx").unwrap_err();
        assert!(matches!(err, GitError::InvalidDelta(_)));
    }

    #[test]
    fn zero_length_insert_is_rejected_not_panicking() {
        let mut out = Vec::new();
        encode_size(&mut out, 0);
        encode_size(&mut out, 0);
        out.push(0); // insert instruction with length 0
        let mut cursor = Cursor::new(out);
        let err = delta_decode(&mut cursor, b"").unwrap_err();
        assert!(matches!(err, GitError::InvalidDelta(_)));
    }

    #[test]
    fn copy_past_base_end_is_rejected() {
        let base = b"ab";
        let mut out = Vec::new();
        encode_size(&mut out, base.len());
        encode_size(&mut out, 10);
        out.push(COPY_INSTRUCTION_FLAG | 0b0001_0000);
        out.push(10); // copy 10 bytes from a 2-byte base
        let mut cursor = Cursor::new(out);
        let err = delta_decode(&mut cursor, base).unwrap_err();
        assert!(matches!(err, GitError::InvalidDelta(_)));
    }
}
