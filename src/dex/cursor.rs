/* Bounds-checked reading over a DEX byte buffer */

use byteorder::{ByteOrder, LittleEndian};

use crate::dex::error::{DexError, ErrorKind};
use crate::fail;

/// A cursor over an immutable byte buffer with an absolute position.
///
/// Every read checks the remaining length first; decoding a malformed DEX
/// never touches memory past the end of the buffer.
#[derive(Debug)]
pub struct ByteCursor<'a>
{
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a>
{
    pub fn new(bytes: &'a [u8]) -> ByteCursor<'a>
    {
        ByteCursor { bytes, pos: 0 }
    }

    pub fn pos(&self) -> usize
    {
        self.pos
    }

    pub fn len(&self) -> usize
    {
        self.bytes.len()
    }

    pub fn remaining(&self) -> usize
    {
        self.bytes.len() - self.pos
    }

    /// Move to an absolute offset within the buffer.
    pub fn seek(&mut self, abs: usize) -> Result<(), DexError>
    {
        if abs > self.bytes.len()
        {
            fail!(OutOfRange, "seek to {} past end of {} byte buffer", abs, self.bytes.len());
        }
        self.pos = abs;
        Ok(())
    }

    /// A new cursor restricted to `[abs, abs + len)` of the same buffer.
    pub fn sub_view(&self, abs: usize, len: usize) -> Result<ByteCursor<'a>, DexError>
    {
        match abs.checked_add(len)
        {
            Some(end) if end <= self.bytes.len() => Ok(ByteCursor { bytes: &self.bytes[abs..end], pos: 0 }),
            _ => Err(DexError::new(
                ErrorKind::OutOfRange,
                &format!("sub-view [{}, {}+{}) not contained in {} byte buffer", abs, abs, len, self.bytes.len()),
            )),
        }
    }

    pub fn read_u8(&mut self) -> Result<u8, DexError>
    {
        if self.remaining() < 1
        {
            fail!(Truncated, "unexpected end of stream reading u1 at {}", self.pos);
        }
        let v = self.bytes[self.pos];
        self.pos += 1;
        Ok(v)
    }

    pub fn read_u16(&mut self) -> Result<u16, DexError>
    {
        if self.remaining() < 2
        {
            fail!(Truncated, "unexpected end of stream reading u2 at {}", self.pos);
        }
        let v = LittleEndian::read_u16(&self.bytes[self.pos..]);
        self.pos += 2;
        Ok(v)
    }

    pub fn read_u32(&mut self) -> Result<u32, DexError>
    {
        if self.remaining() < 4
        {
            fail!(Truncated, "unexpected end of stream reading u4 at {}", self.pos);
        }
        let v = LittleEndian::read_u32(&self.bytes[self.pos..]);
        self.pos += 4;
        Ok(v)
    }

    pub fn read_u64(&mut self) -> Result<u64, DexError>
    {
        if self.remaining() < 8
        {
            fail!(Truncated, "unexpected end of stream reading u8 at {}", self.pos);
        }
        let v = LittleEndian::read_u64(&self.bytes[self.pos..]);
        self.pos += 8;
        Ok(v)
    }

    pub fn read_bytes(&mut self, length: usize) -> Result<&'a [u8], DexError>
    {
        if self.remaining() < length
        {
            fail!(Truncated, "buffer too short for {} byte read at {}", length, self.pos);
        }
        let v = &self.bytes[self.pos..self.pos + length];
        self.pos += length;
        Ok(v)
    }

    /// Unsigned LEB128, at most five bytes.
    pub fn read_uleb128(&mut self) -> Result<u32, DexError>
    {
        let mut value: u32 = 0;
        for i in 0..5
        {
            let byte = match self.bytes.get(self.pos)
            {
                Some(b) => *b,
                None => fail!(MalformedUleb, "uleb128 runs off the end of the buffer at {}", self.pos),
            };
            self.pos += 1;
            value |= ((byte & 0x7F) as u32) << (7 * i);
            if byte & 0x80 == 0
            {
                return Ok(value);
            }
        }
        fail!(MalformedUleb, "uleb128 longer than five bytes at {}", self.pos)
    }

    /// Signed LEB128, sign-extended from the final payload bit.
    pub fn read_sleb128(&mut self) -> Result<i32, DexError>
    {
        let mut value: i32 = 0;
        let mut shift = 0;
        for _ in 0..5
        {
            let byte = match self.bytes.get(self.pos)
            {
                Some(b) => *b,
                None => fail!(MalformedUleb, "sleb128 runs off the end of the buffer at {}", self.pos),
            };
            self.pos += 1;
            value |= ((byte & 0x7F) as i32) << shift;
            shift += 7;
            if byte & 0x80 == 0
            {
                if shift < 32 && (byte & 0x40) != 0
                {
                    value |= -1 << shift;
                }
                return Ok(value);
            }
        }
        fail!(MalformedUleb, "sleb128 longer than five bytes at {}", self.pos)
    }

    /// ULEB128 with the whole value offset by one; 0 decodes to -1 ("absent").
    pub fn read_uleb128p1(&mut self) -> Result<i32, DexError>
    {
        Ok(self.read_uleb128()? as i32 - 1)
    }

    /// Read bytes up to a NUL terminator or `limit` bytes, whichever comes
    /// first. Hitting the end of the buffer before either is an error; the
    /// terminator is consumed but not returned.
    pub fn read_cstr_within(&mut self, limit: usize) -> Result<Vec<u8>, DexError>
    {
        let mut out = Vec::new();
        for i in 0..limit
        {
            match self.bytes.get(self.pos + i)
            {
                None => fail!(UnterminatedString, "string at {} has no terminator", self.pos),
                Some(0) => {
                    self.pos += i + 1;
                    return Ok(out);
                }
                Some(b) => out.push(*b),
            }
        }
        self.pos += limit;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_width_little_endian()
    {
        let bytes = [0x78, 0x56, 0x34, 0x12, 0xff, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
        let mut c = ByteCursor::new(&bytes);
        assert_eq!(c.read_u32().unwrap(), 0x12345678);
        assert_eq!(c.read_u64().unwrap(), 0xff);
        assert!(c.read_u8().is_err());
    }

    #[test]
    fn truncated_reads_fail()
    {
        let bytes = [0x01];
        let mut c = ByteCursor::new(&bytes);
        assert_eq!(c.read_u16().unwrap_err().kind(), ErrorKind::Truncated);
        let mut c = ByteCursor::new(&bytes);
        assert_eq!(c.read_u32().unwrap_err().kind(), ErrorKind::Truncated);
    }

    #[test]
    fn uleb128_cases()
    {
        let cases: Vec<(Vec<u8>, u32)> = vec![
            (vec![0x00], 0),
            (vec![0x01], 1),
            (vec![0x7F], 127),
            (vec![0x80, 0x01], 128),
            (vec![0x80, 0x7F], 16256),
            (vec![0xE5, 0x8E, 0x26], 624485),
            (vec![0xFF, 0xFF, 0xFF, 0xFF, 0x0F], u32::MAX),
        ];
        for (encoded, expected) in cases
        {
            let mut c = ByteCursor::new(&encoded);
            assert_eq!(c.read_uleb128().unwrap(), expected);
            assert_eq!(c.pos(), encoded.len());
        }
    }

    #[test]
    fn uleb128_rejects_runaway_sequences()
    {
        let mut c = ByteCursor::new(&[0x80, 0x80, 0x80, 0x80, 0x80, 0x01]);
        assert_eq!(c.read_uleb128().unwrap_err().kind(), ErrorKind::MalformedUleb);

        let mut c = ByteCursor::new(&[0x80, 0x80]);
        assert_eq!(c.read_uleb128().unwrap_err().kind(), ErrorKind::MalformedUleb);
    }

    #[test]
    fn sleb128_cases()
    {
        let cases: Vec<(Vec<u8>, i32)> = vec![
            (vec![0x00], 0),
            (vec![0x01], 1),
            (vec![0x7F], -1),
            (vec![0xFF, 0x00], 127),
            (vec![0x80, 0x7F], -128),
            (vec![0xC0, 0xBB, 0x78], -123456),
        ];
        for (encoded, expected) in cases
        {
            let mut c = ByteCursor::new(&encoded);
            assert_eq!(c.read_sleb128().unwrap(), expected);
        }
    }

    #[test]
    fn uleb128p1_zero_means_absent()
    {
        let mut c = ByteCursor::new(&[0x00, 0x05]);
        assert_eq!(c.read_uleb128p1().unwrap(), -1);
        assert_eq!(c.read_uleb128p1().unwrap(), 4);
    }

    #[test]
    fn cstr_reads()
    {
        let mut c = ByteCursor::new(b"abc\0def");
        assert_eq!(c.read_cstr_within(16).unwrap(), b"abc".to_vec());
        assert_eq!(c.pos(), 4);

        // Ceiling reached before the terminator
        let mut c = ByteCursor::new(b"abcdef\0");
        assert_eq!(c.read_cstr_within(3).unwrap(), b"abc".to_vec());
        assert_eq!(c.pos(), 3);

        // Neither terminator nor ceiling before the buffer ends
        let mut c = ByteCursor::new(b"abc");
        assert_eq!(c.read_cstr_within(16).unwrap_err().kind(), ErrorKind::UnterminatedString);
    }

    #[test]
    fn seek_and_sub_view_bounds()
    {
        let bytes = [0u8; 8];
        let mut c = ByteCursor::new(&bytes);
        assert!(c.seek(8).is_ok());
        assert_eq!(c.seek(9).unwrap_err().kind(), ErrorKind::OutOfRange);
        assert!(c.sub_view(4, 4).is_ok());
        assert_eq!(c.sub_view(4, 5).unwrap_err().kind(), ErrorKind::OutOfRange);
        assert_eq!(c.sub_view(usize::MAX, 2).unwrap_err().kind(), ErrorKind::OutOfRange);
    }
}
