use byteorder::{ByteOrder, LittleEndian};

use crate::error::SourceQueryError;

/// Borrow `len` bytes at index `offset` from `data`.
///
/// Mutates `offset` to the index after the bytes.
pub fn get_bytes<'a>(data: &'a [u8], offset: &mut usize, len: usize) -> Result<&'a [u8], SourceQueryError> {
    let remaining: usize = data.len().saturating_sub(*offset);
    if remaining < len {
        return Err(SourceQueryError::Truncated {
            offset: *offset,
            needed: len,
            remaining,
        });
    }
    let bytes: &[u8] = &data[*offset..*offset + len];
    *offset += len;
    Ok(bytes)
}

/// Step `offset` over `len` bytes we have no use for.
pub fn skip(data: &[u8], offset: &mut usize, len: usize) -> Result<(), SourceQueryError> {
    get_bytes(data, offset, len).map(|_| ())
}

/// Get the [u8] at index `offset` from `data`.
///
/// Mutates `offset` to the index after the byte.
pub fn get_u8(data: &[u8], offset: &mut usize) -> Result<u8, SourceQueryError> {
    Ok(get_bytes(data, offset, 1)?[0])
}

/// Get 2 little-endian bytes (as a [u16]) at index `offset` from `data`.
///
/// Mutates `offset` to the index after the bytes.
pub fn get_u16(data: &[u8], offset: &mut usize) -> Result<u16, SourceQueryError> {
    Ok(LittleEndian::read_u16(get_bytes(data, offset, 2)?))
}

/// Get 8 little-endian bytes (as a [u64]) at index `offset` from `data`.
///
/// Mutates `offset` to the index after the bytes.
pub fn get_u64(data: &[u8], offset: &mut usize) -> Result<u64, SourceQueryError> {
    Ok(LittleEndian::read_u64(get_bytes(data, offset, 8)?))
}

/// Get the value of a null-terminated string
/// with index 0 at `offset` in an array of bytes.
///
/// Fails if the buffer ends before the terminator. Invalid UTF-8
/// (Latin-1 hostnames are common) is replaced rather than rejected.
/// Mutates `offset` to the index after the null-termination byte.
pub fn get_string(data: &[u8], offset: &mut usize) -> Result<String, SourceQueryError> {
    let start: usize = *offset;
    let tail: &[u8] = data.get(start..).unwrap_or_default();
    let len: usize = tail
        .iter()
        .position(|c| *c == 0)
        .ok_or(SourceQueryError::UnterminatedString(start))?;

    let value: String = String::from_utf8_lossy(&tail[..len]).into_owned();
    *offset = start + len + 1;
    Ok(value)
}

/// Like [get_string], but never fails: a missing terminator ends the string
/// at the end of the buffer and invalid UTF-8 is replaced.
///
/// Mutates `offset` to the index after the null-termination byte,
/// which may be one past the end of `data`.
pub fn get_string_lossy(data: &[u8], offset: &mut usize) -> String {
    let start: usize = (*offset).min(data.len());
    let tail: &[u8] = &data[start..];
    let len: usize = tail.iter().position(|c| *c == 0).unwrap_or(tail.len());
    *offset = start + len + 1;
    String::from_utf8_lossy(&tail[..len]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_little_endian_integers() {
        let data = [0xF0, 0x00, 1, 2, 3, 4, 5, 6, 7, 8];
        let mut offset = 0;
        assert_eq!(get_u16(&data, &mut offset).unwrap(), 240);
        assert_eq!(get_u64(&data, &mut offset).unwrap(), 0x0807_0605_0403_0201);
        assert_eq!(offset, data.len());
    }

    #[test]
    fn short_read_reports_truncation() {
        let data = [0x01];
        let mut offset = 0;
        let err = get_u16(&data, &mut offset).unwrap_err();
        assert!(matches!(
            err,
            SourceQueryError::Truncated { offset: 0, needed: 2, remaining: 1 }
        ));
        assert_eq!(offset, 0);
    }

    #[test]
    fn strict_string_needs_terminator() {
        let data = b"de_dust2\0cs";
        let mut offset = 0;
        assert_eq!(get_string(data, &mut offset).unwrap(), "de_dust2");
        assert_eq!(offset, 9);
        assert!(matches!(
            get_string(data, &mut offset),
            Err(SourceQueryError::UnterminatedString(9))
        ));
    }

    #[test]
    fn strict_string_replaces_invalid_utf8() {
        let data = b"Caf\xE9\0";
        let mut offset = 0;
        assert_eq!(get_string(data, &mut offset).unwrap(), "Caf\u{FFFD}");
        assert_eq!(offset, 5);
    }

    #[test]
    fn strict_string_past_end_is_unterminated() {
        let mut offset = 4;
        assert!(get_string(b"ab", &mut offset).is_err());
    }

    #[test]
    fn lossy_string_runs_to_end_of_buffer() {
        let data = b"Gordon";
        let mut offset = 0;
        assert_eq!(get_string_lossy(data, &mut offset), "Gordon");
        assert_eq!(offset, 7);
        assert_eq!(get_string_lossy(data, &mut offset), "");
    }
}
