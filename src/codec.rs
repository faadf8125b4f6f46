//! Binary wire primitives shared by node state, message and checkpoint encodings
//!
//! Integers are unsigned LEB128 varints. Strings are a varint byte length
//! followed by UTF-8. Decimals travel as their canonical string form so the
//! exact value survives any host.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::error::{Error, Result};

#[derive(Debug, Default)]
pub struct WireWriter {
    buf: BytesMut,
}

impl WireWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn freeze(self) -> Bytes {
        self.buf.freeze()
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.put_u8(value);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.write_u8(u8::from(value));
    }

    pub fn write_varint(&mut self, mut value: u64) {
        while value >= 0x80 {
            self.buf.put_u8((value as u8 & 0x7f) | 0x80);
            value >>= 7;
        }
        self.buf.put_u8(value as u8);
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.write_varint(bytes.len() as u64);
        self.buf.put_slice(bytes);
    }

    pub fn write_str(&mut self, value: &str) {
        self.write_bytes(value.as_bytes());
    }

    pub fn write_decimal(&mut self, value: &Decimal) {
        self.write_str(&value.to_string());
    }
}

/// Cursor over an encoded frame; every read checks the remaining length first.
#[derive(Debug)]
pub struct WireReader<'a> {
    data: &'a [u8],
}

impl<'a> WireReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    fn ensure(&self, len: usize, what: &str) -> Result<()> {
        if self.data.remaining() < len {
            return Err(Error::decode(format!(
                "unexpected end of input reading {what}: need {len} bytes, have {}",
                self.data.remaining()
            )));
        }
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.ensure(1, "u8")?;
        Ok(self.data.get_u8())
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(Error::decode(format!("invalid bool tag {other}"))),
        }
    }

    pub fn read_varint(&mut self) -> Result<u64> {
        let mut value = 0u64;
        for shift in (0..64).step_by(7) {
            let byte = self.read_u8()?;
            value |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(Error::decode("varint longer than 64 bits"))
    }

    /// Read a length prefix that is about to drive an allocation or a loop.
    pub fn read_len(&mut self) -> Result<usize> {
        let len = self.read_varint()?;
        usize::try_from(len)
            .ok()
            .filter(|len| *len <= self.data.remaining())
            .ok_or_else(|| {
                Error::decode(format!(
                    "length {len} exceeds remaining {} bytes",
                    self.data.remaining()
                ))
            })
    }

    pub fn read_bytes(&mut self) -> Result<&'a [u8]> {
        let len = self.read_len()?;
        let (head, tail) = self.data.split_at(len);
        self.data = tail;
        Ok(head)
    }

    pub fn read_string(&mut self) -> Result<String> {
        let bytes = self.read_bytes()?;
        String::from_utf8(bytes.to_vec()).map_err(|e| Error::decode(format!("utf8: {e}")))
    }

    pub fn read_decimal(&mut self) -> Result<Decimal> {
        let text = self.read_string()?;
        Decimal::from_str(&text)
            .map_err(|e| Error::decode(format!("malformed decimal {text:?}: {e}")))
    }

    pub fn finish(self) -> Result<()> {
        if self.data.has_remaining() {
            return Err(Error::decode(format!(
                "{} trailing bytes",
                self.data.remaining()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn varint_boundaries() {
        for value in [0u64, 1, 127, 128, 300, 16_383, 16_384, u32::MAX as u64, u64::MAX] {
            let mut w = WireWriter::new();
            w.write_varint(value);
            let bytes = w.freeze();
            let mut r = WireReader::new(&bytes);
            assert_eq!(r.read_varint().unwrap(), value);
            r.finish().unwrap();
        }
    }

    #[test]
    fn truncated_string_is_a_decode_error() {
        let mut w = WireWriter::new();
        w.write_str("bidder-7");
        let bytes = w.freeze();
        let mut r = WireReader::new(&bytes[..4]);
        assert!(matches!(r.read_string(), Err(Error::Decode(_))));
    }

    #[test]
    fn malformed_decimal_is_a_decode_error() {
        let mut w = WireWriter::new();
        w.write_str("12.x");
        let bytes = w.freeze();
        let err = WireReader::new(&bytes).read_decimal().unwrap_err();
        assert!(matches!(err, Error::Decode(msg) if msg.contains("12.x")));
    }

    #[test]
    fn decimal_keeps_its_text() {
        let value = Decimal::from_str("9.500").unwrap();
        let mut w = WireWriter::new();
        w.write_decimal(&value);
        let bytes = w.freeze();
        let decoded = WireReader::new(&bytes).read_decimal().unwrap();
        assert_eq!(decoded, value);
        assert_eq!(decoded.to_string(), "9.500");
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let bytes = [0u8, 1];
        let mut r = WireReader::new(&bytes);
        r.read_u8().unwrap();
        assert!(r.finish().is_err());
    }
}
