use crate::game::parsing::ParseError;

const VLQ_MAX_BYTES: usize = 4;

/// Forward-only cursor over a big-endian byte buffer.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    #[inline(always)]
    pub const fn position(&self) -> usize {
        self.pos
    }

    #[inline(always)]
    pub const fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    #[inline(always)]
    pub const fn is_at_end(&self) -> bool {
        self.pos >= self.data.len()
    }

    #[inline(always)]
    fn take(&mut self, n: usize) -> Result<&'a [u8], ParseError> {
        let end = self.pos.checked_add(n).ok_or(ParseError::UnexpectedEnd)?;
        let bytes = self
            .data
            .get(self.pos..end)
            .ok_or(ParseError::UnexpectedEnd)?;
        self.pos = end;
        Ok(bytes)
    }

    pub fn read_u8(&mut self) -> Result<u8, ParseError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, ParseError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32, ParseError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Reads a MIDI variable-length quantity: 7 bits per byte, high bit set on all but the last.
    pub fn read_vlq(&mut self) -> Result<u32, ParseError> {
        let mut value = 0u32;
        for _ in 0..VLQ_MAX_BYTES {
            let byte = self.read_u8()?;
            value = (value << 7) | u32::from(byte & 0x7F);
            if byte & 0x80 == 0 {
                break;
            }
        }
        Ok(value)
    }

    /// Reads `n` raw bytes, e.g. a chunk tag like `MThd`.
    pub fn read_tag(&mut self, n: usize) -> Result<&'a [u8], ParseError> {
        self.take(n)
    }

    pub fn read_slice(&mut self, n: usize) -> Result<&'a [u8], ParseError> {
        self.take(n)
    }

    pub fn skip(&mut self, n: usize) -> Result<(), ParseError> {
        self.take(n).map(|_| ())
    }

    /// Steps back over the byte just read so it can be reinterpreted (running status).
    #[inline(always)]
    pub fn unread_byte(&mut self) {
        debug_assert!(self.pos > 0, "unread_byte called at start of buffer");
        self.pos = self.pos.saturating_sub(1);
    }
}

#[cfg(test)]
pub(crate) fn write_vlq(out: &mut Vec<u8>, value: u32) {
    let mut groups = [0u8; VLQ_MAX_BYTES];
    let mut n = 0;
    let mut v = value & 0x0FFF_FFFF;
    loop {
        groups[n] = (v & 0x7F) as u8;
        n += 1;
        v >>= 7;
        if v == 0 || n == VLQ_MAX_BYTES {
            break;
        }
    }
    for i in (0..n).rev() {
        let continuation = if i == 0 { 0 } else { 0x80 };
        out.push(groups[i] | continuation);
    }
}

#[cfg(test)]
mod tests {
    use super::{ByteReader, write_vlq};
    use crate::game::parsing::ParseError;

    #[test]
    fn vlq_round_trips_across_byte_widths() {
        for value in [
            0u32,
            0x40,
            0x7F,
            0x80,
            0x2000,
            0x3FFF,
            0x4000,
            0x1F_FFFF,
            0x20_0000,
            0x0FFF_FFFF,
        ] {
            let mut buf = Vec::new();
            write_vlq(&mut buf, value);
            let mut r = ByteReader::new(&buf);
            assert_eq!(r.read_vlq().expect("vlq decodes"), value, "value {value:#x}");
            assert!(r.is_at_end(), "vlq {value:#x} left trailing bytes");
        }
    }

    #[test]
    fn truncated_vlq_is_unexpected_end() {
        let mut buf = Vec::new();
        write_vlq(&mut buf, 0x20_0000);
        buf.pop();
        let mut r = ByteReader::new(&buf);
        assert!(matches!(r.read_vlq(), Err(ParseError::UnexpectedEnd)));
    }

    #[test]
    fn big_endian_reads_and_bounds() {
        let data = [0x4D, 0x54, 0x68, 0x64, 0x00, 0x00, 0x00, 0x06, 0x01, 0xE0, 0x7F];
        let mut r = ByteReader::new(&data);
        assert_eq!(r.read_tag(4).unwrap(), b"MThd");
        assert_eq!(r.read_u32().unwrap(), 6);
        assert_eq!(r.read_u16().unwrap(), 0x01E0);
        assert_eq!(r.remaining(), 1);
        assert!(matches!(r.read_u16(), Err(ParseError::UnexpectedEnd)));
        // A failed read does not move the cursor.
        assert_eq!(r.position(), 10);
        assert_eq!(r.read_u8().unwrap(), 0x7F);
        r.unread_byte();
        assert_eq!(r.read_u8().unwrap(), 0x7F);
        assert!(matches!(r.skip(1), Err(ParseError::UnexpectedEnd)));
    }
}
