//! lib0-compatible primitives: varUint, varByteArray and varString.

use crate::error::{Result, SyncError};

/// Write a variable-length unsigned integer to a buffer.
/// Uses 7 bits per byte, with MSB indicating continuation.
pub(crate) fn write_var_uint(buf: &mut Vec<u8>, mut num: u64) {
    loop {
        let mut byte = (num & 0x7F) as u8;
        num >>= 7;
        if num > 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if num == 0 {
            break;
        }
    }
}

/// Write a byte array with length prefix (varUint encoding).
pub(crate) fn write_var_byte_array(buf: &mut Vec<u8>, data: &[u8]) {
    write_var_uint(buf, data.len() as u64);
    buf.extend_from_slice(data);
}

pub(crate) fn write_var_string(buf: &mut Vec<u8>, s: &str) {
    write_var_byte_array(buf, s.as_bytes());
}

/// Cursor over an encoded frame.
///
/// Every read names what it was reading so truncation errors point at the field.
pub(crate) struct Decoder<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub(crate) fn has_remaining(&self) -> bool {
        self.pos < self.data.len()
    }

    /// Fail if anything follows the last field read.
    pub(crate) fn finish(&self, field: &'static str) -> Result<()> {
        if self.has_remaining() {
            return Err(SyncError::TrailingBytes(field));
        }
        Ok(())
    }

    pub(crate) fn read_var_uint(&mut self, field: &'static str) -> Result<u64> {
        let mut num: u64 = 0;
        let mut shift = 0;
        while let Some(&byte) = self.data.get(self.pos) {
            self.pos += 1;
            num |= ((byte & 0x7F) as u64) << shift;
            if byte & 0x80 == 0 {
                return Ok(num);
            }
            shift += 7;
            if shift > 63 {
                return Err(SyncError::VarUintOverflow);
            }
        }
        Err(SyncError::Truncated(field))
    }

    pub(crate) fn read_var_byte_array(&mut self, field: &'static str) -> Result<&'a [u8]> {
        let len = self.read_var_uint(field)? as usize;
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or(SyncError::Truncated(field))?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    pub(crate) fn read_var_string(&mut self, field: &'static str) -> Result<String> {
        let bytes = self.read_var_byte_array(field)?;
        Ok(String::from_utf8(bytes.to_vec())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_var_uint_single_and_multi_byte() {
        let mut buf = Vec::new();
        write_var_uint(&mut buf, 0);
        write_var_uint(&mut buf, 127);
        write_var_uint(&mut buf, 300);
        assert_eq!(buf, vec![0, 127, 0xAC, 0x02]);

        let mut dec = Decoder::new(&buf);
        assert_eq!(dec.read_var_uint("a").unwrap(), 0);
        assert_eq!(dec.read_var_uint("b").unwrap(), 127);
        assert_eq!(dec.read_var_uint("c").unwrap(), 300);
        assert!(!dec.has_remaining());
    }

    #[test]
    fn test_truncated_var_uint() {
        let mut dec = Decoder::new(&[0x80, 0x80]);
        assert!(matches!(
            dec.read_var_uint("clock"),
            Err(SyncError::Truncated("clock"))
        ));
    }

    #[test]
    fn test_var_uint_overflow() {
        let data = [0xFF; 11];
        let mut dec = Decoder::new(&data);
        assert!(matches!(
            dec.read_var_uint("x"),
            Err(SyncError::VarUintOverflow)
        ));
    }

    #[test]
    fn test_byte_array_length_past_end() {
        // Claims 5 bytes, carries 2
        let mut dec = Decoder::new(&[5, 1, 2]);
        assert!(matches!(
            dec.read_var_byte_array("payload"),
            Err(SyncError::Truncated("payload"))
        ));
    }

    #[test]
    fn test_var_string() {
        let mut buf = Vec::new();
        write_var_string(&mut buf, "{\"name\":\"ada\"}");
        let mut dec = Decoder::new(&buf);
        assert_eq!(dec.read_var_string("state").unwrap(), "{\"name\":\"ada\"}");
    }

    #[test]
    fn test_invalid_utf8_string() {
        let mut dec = Decoder::new(&[2, 0xC3, 0x28]);
        assert!(matches!(
            dec.read_var_string("state"),
            Err(SyncError::InvalidUtf8(_))
        ));
    }
}
