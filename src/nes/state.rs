//! Ordered field cursor for mapper save-state blocks.
//!
//! A block is written and read back one field at a time in declared order.
//! Multi-byte fields always go through [`super::endian`].

use anyhow::{Result, bail};

use super::endian::{get_be32, get_le16, get_le32, set_be32, set_le16, set_le32};

#[derive(Debug, Default)]
pub struct StateWriter {
    buf: Vec<u8>,
}

impl StateWriter {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn u8(&mut self, value: u8) -> &mut Self {
        self.buf.push(value);
        self
    }

    pub fn bool(&mut self, value: bool) -> &mut Self {
        self.u8(u8::from(value))
    }

    pub fn bytes(&mut self, values: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(values);
        self
    }

    pub fn le16(&mut self, value: u16) -> &mut Self {
        let mut field = [0u8; 2];
        set_le16(&mut field, value);
        self.bytes(&field)
    }

    pub fn le32(&mut self, value: u32) -> &mut Self {
        let mut field = [0u8; 4];
        set_le32(&mut field, value);
        self.bytes(&field)
    }

    pub fn be32(&mut self, value: u32) -> &mut Self {
        let mut field = [0u8; 4];
        set_be32(&mut field, value);
        self.bytes(&field)
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

#[derive(Debug)]
pub struct StateReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> StateReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N]> {
        let end = self.pos + N;
        if end > self.bytes.len() {
            bail!(
                "state block truncated: wanted {N} byte(s) at offset {}, only {} left",
                self.pos,
                self.bytes.len() - self.pos
            );
        }
        let mut field = [0u8; N];
        field.copy_from_slice(&self.bytes[self.pos..end]);
        self.pos = end;
        Ok(field)
    }

    pub fn u8(&mut self) -> Result<u8> {
        let [value] = self.take::<1>()?;
        Ok(value)
    }

    pub fn bool(&mut self) -> Result<bool> {
        Ok(self.u8()? != 0)
    }

    pub fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        self.take::<N>()
    }

    pub fn le16(&mut self) -> Result<u16> {
        Ok(get_le16(&self.take::<2>()?))
    }

    pub fn le32(&mut self) -> Result<u32> {
        Ok(get_le32(&self.take::<4>()?))
    }

    pub fn be32(&mut self) -> Result<u32> {
        Ok(get_be32(&self.take::<4>()?))
    }

    /// Everything not consumed yet.
    pub fn rest(&mut self) -> &'a [u8] {
        let rest = &self.bytes[self.pos..];
        self.pos = self.bytes.len();
        rest
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    pub fn finish(self) -> Result<()> {
        if self.pos != self.bytes.len() {
            bail!(
                "state block has {} trailing byte(s) after offset {}",
                self.bytes.len() - self.pos,
                self.pos
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_are_laid_out_in_call_order() {
        let mut w = StateWriter::default();
        w.u8(0xAA).bool(true).le16(0x1234).le32(0xDEAD_BEEF).be32(0x0102_0304);
        assert_eq!(w.len(), 12);
        assert_eq!(
            w.finish(),
            vec![0xAA, 0x01, 0x34, 0x12, 0xEF, 0xBE, 0xAD, 0xDE, 0x01, 0x02, 0x03, 0x04]
        );
    }

    #[test]
    fn reader_consumes_what_writer_produced() {
        let mut w = StateWriter::with_capacity(8);
        w.bytes(&[1, 2, 3]).le16(0xFFFE).bool(false);
        let bytes = w.finish();

        let mut r = StateReader::new(&bytes);
        assert_eq!(r.array::<3>().unwrap(), [1, 2, 3]);
        assert_eq!(r.le16().unwrap(), 0xFFFE);
        assert!(!r.bool().unwrap());
        assert_eq!(r.remaining(), 0);
        r.finish().unwrap();
    }

    #[test]
    fn truncated_block_is_an_error() {
        let bytes = [0x01, 0x02, 0x03];
        let mut r = StateReader::new(&bytes);
        assert_eq!(r.u8().unwrap(), 0x01);
        let err = r.le32().unwrap_err();
        assert!(err.to_string().contains("truncated"));
    }

    #[test]
    fn trailing_bytes_are_an_error() {
        let bytes = [0x01, 0x02];
        let mut r = StateReader::new(&bytes);
        r.u8().unwrap();
        assert!(r.finish().is_err());
    }
}
