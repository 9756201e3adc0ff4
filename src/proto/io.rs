use super::{
    error::{ProtoError, Result},
    varint::{read_varint, write_varint},
};

#[inline]
pub(crate) fn take<'a>(input: &mut &'a [u8], len: usize) -> Result<&'a [u8]> {
    if input.len() < len {
        return Err(ProtoError::UnexpectedEof);
    }

    let (head, tail) = input.split_at(len);
    *input = tail;
    Ok(head)
}

#[inline]
pub(crate) fn read_u16_be(input: &mut &[u8]) -> Result<u16> {
    let bytes: [u8; 2] = take(input, 2)?.try_into().unwrap();
    Ok(u16::from_be_bytes(bytes))
}

#[inline]
pub(crate) fn write_u16_be(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_be_bytes());
}

#[inline]
pub(crate) fn read_i64_be(input: &mut &[u8]) -> Result<i64> {
    let bytes: [u8; 8] = take(input, 8)?.try_into().unwrap();
    Ok(i64::from_be_bytes(bytes))
}

#[inline]
pub(crate) fn write_i64_be(out: &mut Vec<u8>, value: i64) {
    out.extend_from_slice(&value.to_be_bytes());
}

pub(crate) fn read_string_bytes<'a>(input: &mut &'a [u8]) -> Result<&'a [u8]> {
    let byte_len = read_varint(input)?;
    if byte_len < 0 {
        return Err(ProtoError::NegativeLength(byte_len));
    }

    take(input, byte_len as usize)
}

pub(crate) fn read_string<'a>(input: &mut &'a [u8]) -> Result<&'a str> {
    let bytes = read_string_bytes(input)?;
    std::str::from_utf8(bytes).map_err(|_| ProtoError::InvalidUtf8)
}

/// Like [`read_string`] but degrades malformed UTF-8 to replacement
/// characters. Server-controlled text goes through here so a bad byte is a
/// warning, not a dead session.
pub(crate) fn read_string_lossy(input: &mut &[u8]) -> Result<String> {
    let bytes = read_string_bytes(input)?;
    match std::str::from_utf8(bytes) {
        Ok(s) => Ok(s.to_owned()),
        Err(_) => {
            log::warn!("server string field is not valid UTF-8, decoding lossily");
            Ok(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

pub(crate) fn write_string(out: &mut Vec<u8>, value: &str) -> Result<()> {
    let len = value.len();
    if len > i32::MAX as usize {
        return Err(ProtoError::LengthTooLarge {
            max: i32::MAX as usize,
            actual: len,
        });
    }

    write_varint(out, len as i32);
    out.extend_from_slice(value.as_bytes());
    Ok(())
}
