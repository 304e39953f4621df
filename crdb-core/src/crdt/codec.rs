/*
    codec.rs - Binary wire format primitives

    Durable CRDT state is a fixed magic header, a little-endian element
    count, then per element a little-endian u64 length, a CRC-32 of the
    element bytes, and the bytes themselves. Any truncation, header or
    checksum mismatch decodes to InvalidData.
*/

use super::errors::{CrdtError, CrdtResult};

/// Bounds-checked cursor over a serialized payload.
pub(crate) struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Reader { buf, pos: 0 }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, n: usize) -> CrdtResult<&'a [u8]> {
        if self.remaining() < n {
            return Err(CrdtError::InvalidData);
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub(crate) fn expect_magic(&mut self, magic: &[u8]) -> CrdtResult<()> {
        if self.take(magic.len())? != magic {
            return Err(CrdtError::InvalidData);
        }
        Ok(())
    }

    pub(crate) fn read_u32_le(&mut self) -> CrdtResult<u32> {
        let bytes = self.take(4)?;
        let bytes: [u8; 4] = bytes.try_into().map_err(|_| CrdtError::InvalidData)?;
        Ok(u32::from_le_bytes(bytes))
    }

    pub(crate) fn read_u64_le(&mut self) -> CrdtResult<u64> {
        let bytes = self.take(8)?;
        let bytes: [u8; 8] = bytes.try_into().map_err(|_| CrdtError::InvalidData)?;
        Ok(u64::from_le_bytes(bytes))
    }

    /// Read one length-prefixed, CRC-guarded element block.
    pub(crate) fn read_element(&mut self) -> CrdtResult<&'a [u8]> {
        let length = self.read_u64_le()?;
        let checksum = self.read_u32_le()?;

        // Length is attacker-controlled; bound it by what is actually left.
        let length = usize::try_from(length).map_err(|_| CrdtError::InvalidData)?;
        let bytes = self.take(length)?;

        if crc32fast::hash(bytes) != checksum {
            return Err(CrdtError::InvalidData);
        }
        Ok(bytes)
    }
}

/// Append one element block: u64-LE length, u32-LE CRC-32, bytes.
pub(crate) fn write_element(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(&(bytes.len() as u64).to_le_bytes());
    out.extend_from_slice(&crc32fast::hash(bytes).to_le_bytes());
    out.extend_from_slice(bytes);
}
