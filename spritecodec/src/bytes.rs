// Little-endian helpers shared by the block writers and readers.

use crate::DecodeError;

pub fn push_u16(out: &mut Vec<u8>, value: u16) {
    out.extend(value.to_le_bytes());
}

/// Cursor over an encoded buffer. Every read names what it was looking for so
/// truncated input produces a useful error.
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn rest(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    pub fn skip(&mut self, n: usize) {
        self.pos = usize::min(self.pos + n, self.data.len());
    }

    pub fn u8(&mut self, expected: &'static str) -> Result<u8, DecodeError> {
        let byte = self
            .data
            .get(self.pos)
            .copied()
            .ok_or(DecodeError::UnexpectedEof { expected })?;
        self.pos += 1;
        Ok(byte)
    }

    pub fn u16(&mut self, expected: &'static str) -> Result<u16, DecodeError> {
        let [lo, hi] = self.array::<2>(expected)?;
        Ok(u16::from_le_bytes([lo, hi]))
    }

    pub fn array<const N: usize>(
        &mut self,
        expected: &'static str,
    ) -> Result<[u8; N], DecodeError> {
        let mut out = [0; N];
        out.copy_from_slice(self.bytes(N, expected)?);
        Ok(out)
    }

    pub fn bytes(
        &mut self,
        n: usize,
        expected: &'static str,
    ) -> Result<&'a [u8], DecodeError> {
        let end = self.pos + n;
        if end > self.data.len() {
            return Err(DecodeError::UnexpectedEof { expected });
        }
        let out = &self.data[self.pos..end];
        self.pos = end;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_little_endian() {
        let mut r = ByteReader::new(&[7, 0x34, 0x12, 9]);
        assert_eq!(r.u8("a"), Ok(7));
        assert_eq!(r.u16("b"), Ok(0x1234));
        assert_eq!(r.position(), 3);
        assert_eq!(r.rest(), &[9]);
        assert_eq!(
            r.u16("c"),
            Err(DecodeError::UnexpectedEof { expected: "c" })
        );
    }
}
