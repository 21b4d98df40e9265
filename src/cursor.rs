//! A positioned little-endian reader over an in-memory file.
//!
//! Every read checks the remaining length up front,
//! so running out of data is always reported as [DecodeError::TruncatedInput]
//! instead of returning a partially read value.
use binread::{io::Cursor, BinRead, BinReaderExt};

use crate::DecodeError;

/// The width of the unsigned length field preceding a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthWidth {
    U8,
    U32,
}

pub struct ByteCursor<'a> {
    reader: Cursor<&'a [u8]>,
}

impl<'a> ByteCursor<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            reader: Cursor::new(bytes),
        }
    }

    /// The current position in bytes from the start of the buffer.
    pub fn offset(&self) -> u64 {
        self.reader.position()
    }

    /// The number of bytes left to read.
    pub fn remaining(&self) -> usize {
        let len = self.reader.get_ref().len() as u64;
        len.saturating_sub(self.reader.position()) as usize
    }

    pub fn is_at_end(&self) -> bool {
        self.remaining() == 0
    }

    fn ensure(&self, needed: usize) -> Result<(), DecodeError> {
        let remaining = self.remaining();
        if remaining < needed {
            Err(DecodeError::TruncatedInput {
                offset: self.offset(),
                needed,
                remaining,
            })
        } else {
            Ok(())
        }
    }

    /// Reads a little-endian record of type `T`.
    /// `T` must have the same in-memory size as its packed file representation.
    pub fn read<T: BinRead<Args = ()>>(&mut self) -> Result<T, DecodeError> {
        self.ensure(std::mem::size_of::<T>())?;
        let value = self.reader.read_le::<T>()?;
        Ok(value)
    }

    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        self.read::<u8>()
    }

    pub fn read_u16(&mut self) -> Result<u16, DecodeError> {
        self.read::<u16>()
    }

    pub fn read_u32(&mut self) -> Result<u32, DecodeError> {
        self.read::<u32>()
    }

    pub fn read_f32(&mut self) -> Result<f32, DecodeError> {
        self.read::<f32>()
    }

    /// Returns the next `count` bytes without copying.
    pub fn read_fixed_bytes(&mut self, count: usize) -> Result<&'a [u8], DecodeError> {
        self.ensure(count)?;
        let buffer: &'a [u8] = *self.reader.get_ref();
        let start = self.reader.position() as usize;
        let bytes = &buffer[start..start + count];
        self.reader.set_position((start + count) as u64);
        Ok(bytes)
    }

    /// Reads a 4 byte chunk tag such as `b"MESH"`.
    pub fn read_tag(&mut self) -> Result<[u8; 4], DecodeError> {
        let bytes = self.read_fixed_bytes(4)?;
        Ok([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    /// Reads a length of the given `width` followed by that many bytes of text.
    /// Invalid UTF-8 is replaced rather than treated as an error.
    pub fn read_length_prefixed_string(
        &mut self,
        width: LengthWidth,
    ) -> Result<String, DecodeError> {
        let length = match width {
            LengthWidth::U8 => self.read_u8()? as usize,
            LengthWidth::U32 => self.read_u32()? as usize,
        };
        let bytes = self.read_fixed_bytes(length)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    pub fn skip(&mut self, count: usize) -> Result<(), DecodeError> {
        self.ensure(count)?;
        let position = self.reader.position() + count as u64;
        self.reader.set_position(position);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hexlit::hex;

    #[test]
    fn read_primitives() {
        let bytes = hex!("01 0200 03000000 0000803F");
        let mut cursor = ByteCursor::new(&bytes);
        assert_eq!(1, cursor.read_u8().unwrap());
        assert_eq!(2, cursor.read_u16().unwrap());
        assert_eq!(3, cursor.read_u32().unwrap());
        assert_eq!(1.0f32, cursor.read_f32().unwrap());
        assert!(cursor.is_at_end());
        assert_eq!(11, cursor.offset());
    }

    #[test]
    fn read_u32_truncated() {
        let bytes = hex!("010203");
        let mut cursor = ByteCursor::new(&bytes);
        assert!(matches!(
            cursor.read_u32(),
            Err(DecodeError::TruncatedInput {
                offset: 0,
                needed: 4,
                remaining: 3
            })
        ));
    }

    #[test]
    fn read_f32_truncated_after_offset() {
        let bytes = hex!("00 000080");
        let mut cursor = ByteCursor::new(&bytes);
        cursor.read_u8().unwrap();
        assert!(matches!(
            cursor.read_f32(),
            Err(DecodeError::TruncatedInput {
                offset: 1,
                needed: 4,
                remaining: 3
            })
        ));
    }

    #[test]
    fn read_fixed_bytes() {
        let bytes = *b"EPLYBNDS";
        let mut cursor = ByteCursor::new(&bytes);
        assert_eq!(b"EPLY", cursor.read_fixed_bytes(4).unwrap());
        assert_eq!(b"BNDS", &cursor.read_tag().unwrap());
        assert!(cursor.read_fixed_bytes(1).is_err());
    }

    #[test]
    fn read_fixed_bytes_empty() {
        let mut cursor = ByteCursor::new(&[]);
        assert!(cursor.read_fixed_bytes(0).unwrap().is_empty());
    }

    #[test]
    fn read_string_u8_length() {
        let bytes = hex!("04 726F6F74 FF");
        let mut cursor = ByteCursor::new(&bytes);
        assert_eq!(
            "root",
            cursor.read_length_prefixed_string(LengthWidth::U8).unwrap()
        );
        assert_eq!(5, cursor.offset());
    }

    #[test]
    fn read_string_u32_length() {
        let bytes = hex!("04000000 726F6F74");
        let mut cursor = ByteCursor::new(&bytes);
        assert_eq!(
            "root",
            cursor.read_length_prefixed_string(LengthWidth::U32).unwrap()
        );
        assert!(cursor.is_at_end());
    }

    #[test]
    fn read_string_truncated() {
        let bytes = hex!("05 726F6F74");
        let mut cursor = ByteCursor::new(&bytes);
        assert!(matches!(
            cursor.read_length_prefixed_string(LengthWidth::U8),
            Err(DecodeError::TruncatedInput {
                offset: 1,
                needed: 5,
                remaining: 4
            })
        ));
    }

    #[test]
    fn read_string_invalid_utf8() {
        let bytes = hex!("02 C0FF");
        let mut cursor = ByteCursor::new(&bytes);
        assert_eq!(
            "\u{FFFD}\u{FFFD}",
            cursor.read_length_prefixed_string(LengthWidth::U8).unwrap()
        );
    }

    #[test]
    fn skip_bytes() {
        let bytes = hex!("00000000 07");
        let mut cursor = ByteCursor::new(&bytes);
        cursor.skip(4).unwrap();
        assert_eq!(7, cursor.read_u8().unwrap());
        assert!(matches!(
            cursor.skip(1),
            Err(DecodeError::TruncatedInput { offset: 5, .. })
        ));
    }
}
