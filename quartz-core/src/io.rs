// Quartz
// Copyright (c) 2026 The Project Quartz Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `io` module implements byte-level reading and writing on top of
//! `std::io`.
//!
//! All multi-byte integers are little-endian. The traits are implemented for
//! every `std::io::Read`/`std::io::Write` type, so readers and writers
//! compose with the standard library as usual while error values stay within
//! the crate's [`Result`](crate::errors::Result).

use std::io;

use crate::errors::Result;

/// `ReadBytes` provides methods to read bytes and interpret them as
/// little-endian integers.
pub trait ReadBytes {
    /// Reads a single byte from the stream and returns it, or an error.
    fn read_byte(&mut self) -> Result<u8>;

    /// Reads exactly the number of bytes required to fill `buf`, or returns
    /// an error.
    fn read_buf_exact(&mut self, buf: &mut [u8]) -> Result<()>;

    /// Reads two bytes from the stream and interprets them as an unsigned
    /// 16-bit little-endian integer.
    fn read_u16(&mut self) -> Result<u16> {
        let mut buf = [0u8; 2];
        self.read_buf_exact(&mut buf)?;
        Ok(u16::from_le_bytes(buf))
    }

    /// Reads four bytes from the stream and interprets them as an unsigned
    /// 32-bit little-endian integer.
    fn read_u32(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.read_buf_exact(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    /// Reads eight bytes from the stream and interprets them as an unsigned
    /// 64-bit little-endian integer.
    fn read_u64(&mut self) -> Result<u64> {
        let mut buf = [0u8; 8];
        self.read_buf_exact(&mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }
}

impl<R: io::Read> ReadBytes for R {
    fn read_byte(&mut self) -> Result<u8> {
        let mut buf = [0u8; 1];
        io::Read::read_exact(self, &mut buf)?;
        Ok(buf[0])
    }

    fn read_buf_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        io::Read::read_exact(self, buf)?;
        Ok(())
    }
}

/// `WriteBytes` provides methods to write bytes and little-endian integers.
pub trait WriteBytes {
    /// Writes a single byte to the stream.
    fn write_byte(&mut self, byte: u8) -> Result<()>;

    /// Writes the entire buffer to the stream.
    fn write_buf(&mut self, buf: &[u8]) -> Result<()>;

    /// Writes an unsigned 16-bit integer in little-endian order.
    fn write_u16(&mut self, value: u16) -> Result<()> {
        self.write_buf(&value.to_le_bytes())
    }

    /// Writes an unsigned 32-bit integer in little-endian order.
    fn write_u32(&mut self, value: u32) -> Result<()> {
        self.write_buf(&value.to_le_bytes())
    }

    /// Writes an unsigned 64-bit integer in little-endian order.
    fn write_u64(&mut self, value: u64) -> Result<()> {
        self.write_buf(&value.to_le_bytes())
    }
}

impl<W: io::Write> WriteBytes for W {
    fn write_byte(&mut self, byte: u8) -> Result<()> {
        io::Write::write_all(self, &[byte])?;
        Ok(())
    }

    fn write_buf(&mut self, buf: &[u8]) -> Result<()> {
        io::Write::write_all(self, buf)?;
        Ok(())
    }
}

/// A pass-through writer that counts the bytes written through it.
pub struct CountingWriter<W: io::Write> {
    inner: W,
    count: u64,
}

impl<W: io::Write> CountingWriter<W> {
    /// Wraps the given writer.
    pub fn new(inner: W) -> Self {
        CountingWriter { inner, count: 0 }
    }

    /// The number of bytes written so far.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Unwraps the monitored writer.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: io::Write> io::Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.count += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::{CountingWriter, ReadBytes, WriteBytes};

    #[test]
    fn verify_round_trip_integers() {
        let mut buf = Vec::new();
        buf.write_byte(0x7f).unwrap();
        buf.write_u16(0x1234).unwrap();
        buf.write_u32(0xdead_beef).unwrap();
        buf.write_u64(0x0102_0304_0506_0708).unwrap();

        let mut cursor = &buf[..];
        assert_eq!(cursor.read_byte().unwrap(), 0x7f);
        assert_eq!(cursor.read_u16().unwrap(), 0x1234);
        assert_eq!(cursor.read_u32().unwrap(), 0xdead_beef);
        assert_eq!(cursor.read_u64().unwrap(), 0x0102_0304_0506_0708);
    }

    #[test]
    fn verify_short_read_is_an_error() {
        let mut cursor = &[0u8; 3][..];
        assert!(cursor.read_u32().is_err());
    }

    #[test]
    fn verify_counting_writer() {
        let mut writer = CountingWriter::new(Vec::new());
        writer.write_buf(&[1, 2, 3]).unwrap();
        writer.write_u32(9).unwrap();
        assert_eq!(writer.count(), 7);
        assert_eq!(writer.into_inner().len(), 7);
    }
}
