//! Growable byte buffer with length-prefixed framing, used to build
//! and pick apart handshake fields and stored blobs.  The buffer
//! keeps a head offset so popped data is consumed without moving the
//! tail.

use std::fmt::Write as _;

use base64::{engine::general_purpose::STANDARD as B64, Engine as _};

use crate::{bigint::Mpi, error::Error};

#[derive(Debug, Default, Clone)]
pub struct Buffer {
    data: Vec<u8>,
    head: usize,
}

impl Buffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            data: Vec::with_capacity(cap),
            head: 0,
        }
    }

    /// Number of readable bytes.
    pub fn len(&self) -> usize {
        self.data.len() - self.head
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The readable bytes.
    pub fn data(&self) -> &[u8] {
        &self.data[self.head..]
    }

    fn reserve(&mut self, extra: usize) -> Result<(), Error> {
        self.len()
            .checked_add(extra)
            .ok_or(Error::MemoryError)?;
        self.data.try_reserve(extra).map_err(|_| Error::MemoryError)
    }

    pub fn append(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.reserve(bytes.len())?;
        self.data.extend_from_slice(bytes);
        Ok(())
    }

    pub fn append_byte(&mut self, byte: u8) -> Result<(), Error> {
        self.reserve(1)?;
        self.data.push(byte);
        Ok(())
    }

    /// Append formatted text, printf style.
    pub fn append_printf(&mut self, args: std::fmt::Arguments) -> Result<(), Error> {
        let mut s = String::new();
        s.write_fmt(args).map_err(|_| Error::MemoryError)?;
        self.append(s.as_bytes())
    }

    /// Append a network-order length prefix of 8, 16, 24 or 32 bits.
    pub fn append_prefix(&mut self, bits: usize, value: u32) -> Result<(), Error> {
        let bytes = value.to_be_bytes();
        match bits {
            8 => {
                debug_assert!(value <= 0xff);
                self.append(&bytes[3..])
            }
            16 => {
                debug_assert!(value <= 0xffff);
                self.append(&bytes[2..])
            }
            24 => {
                debug_assert!(value <= 0xff_ffff);
                self.append(&bytes[1..])
            }
            32 => self.append(&bytes),
            _ => Err(Error::General(format!("invalid prefix width {}", bits))),
        }
    }

    /// Append data preceded by its length prefix.
    pub fn append_data_prefix(&mut self, bits: usize, data: &[u8]) -> Result<(), Error> {
        self.append_prefix(bits, data.len() as u32)?;
        self.append(data)
    }

    /// Append a big integer in network order.  `fixed_size` pads with
    /// leading zeros up to the given width, preserving them on the
    /// wire; without it the minimal encoding is used.
    pub fn append_mpi(
        &mut self,
        bits: usize,
        mpi: &Mpi,
        fixed_size: Option<usize>,
    ) -> Result<(), Error> {
        let mut bytes = mpi.to_bytes_be();
        if let Some(size) = fixed_size {
            if bytes.len() > size {
                return Err(Error::General("mpi larger than fixed size".into()));
            }
            let mut padded = vec![0u8; size - bytes.len()];
            padded.extend_from_slice(&bytes);
            bytes = padded;
        }
        self.append_prefix(bits, bytes.len() as u32)?;
        self.append(&bytes)
    }

    /// Percent-escape every byte that is not graphic ASCII, plus any
    /// byte in `reserved`.
    pub fn append_escape(&mut self, data: &[u8], reserved: &[u8]) -> Result<(), Error> {
        for b in data {
            if b.is_ascii_graphic() && *b != b'%' && !reserved.contains(b) {
                self.append_byte(*b)?;
            } else {
                self.append_printf(format_args!("%{:02X}", b))?;
            }
        }
        Ok(())
    }

    /// Reverse of [`Buffer::append_escape`].
    pub fn unescape(&mut self, data: &[u8]) -> Result<(), Error> {
        let mut i = 0;
        while i < data.len() {
            if data[i] == b'%' {
                let hi = data.get(i + 1).ok_or(Error::CorruptMessage)?;
                let lo = data.get(i + 2).ok_or(Error::CorruptMessage)?;
                let decoded = hex::decode([*hi, *lo]).map_err(|_| Error::CorruptMessage)?;
                self.append(&decoded)?;
                i += 3;
            } else {
                self.append_byte(data[i])?;
                i += 1;
            }
        }
        Ok(())
    }

    /// Consume and return `n` bytes from the head.
    pub fn pop(&mut self, n: usize) -> Option<Vec<u8>> {
        Some(self.pop_datum(n)?.to_vec())
    }

    /// Consume `n` bytes from the head, returning a borrowed view.
    pub fn pop_datum(&mut self, n: usize) -> Option<&[u8]> {
        if self.len() < n {
            return None;
        }
        let start = self.head;
        self.head += n;
        Some(&self.data[start..self.head])
    }

    /// Consume a length prefix of the given width.  With `check`, the
    /// decoded length must not exceed the remaining data.
    pub fn pop_prefix(&mut self, bits: usize, check: bool) -> Result<usize, Error> {
        let width = match bits {
            8 => 1,
            16 => 2,
            24 => 3,
            32 => 4,
            _ => return Err(Error::General(format!("invalid prefix width {}", bits))),
        };
        let raw = self
            .pop_datum(width)
            .ok_or(Error::UnexpectedPacketLength)?;
        let mut value = 0usize;
        for b in raw {
            value = (value << 8) | usize::from(*b);
        }
        if check && value > self.len() {
            return Err(Error::UnexpectedPacketLength);
        }
        Ok(value)
    }

    /// Consume a length prefix and then that many bytes.
    pub fn pop_datum_prefix(&mut self, bits: usize) -> Result<&[u8], Error> {
        let len = self.pop_prefix(bits, true)?;
        self.pop_datum(len).ok_or(Error::UnexpectedPacketLength)
    }

    /// The contents as lowercase hex.
    pub fn hex_print(&self) -> String {
        hex::encode(self.data())
    }

    /// The contents as standard base64.
    pub fn base64_print(&self) -> String {
        B64.encode(self.data())
    }

    /// A 16-bytes-per-line offset/hex/ascii dump, for diagnostics.
    pub fn hex_dump(&self) -> String {
        let mut out = String::new();
        for (i, chunk) in self.data().chunks(16).enumerate() {
            let _ = write!(out, "{:08x}  ", i * 16);
            for b in chunk {
                let _ = write!(out, "{:02x} ", b);
            }
            for _ in chunk.len()..16 {
                out.push_str("   ");
            }
            out.push(' ');
            out.push_str(&ascii_print(chunk));
            out.push('\n');
        }
        out
    }

    /// The contents with non-graphic bytes replaced by '.'.
    pub fn ascii_print(&self) -> String {
        ascii_print(self.data())
    }

    /// Transfer ownership of the contents, optionally NUL-terminating.
    pub fn into_datum(mut self, nul_terminate: bool) -> Vec<u8> {
        let mut out = self.data.split_off(self.head);
        if nul_terminate {
            out.push(0);
        }
        out
    }
}

fn ascii_print(data: &[u8]) -> String {
    data.iter()
        .map(|b| {
            if b.is_ascii_graphic() || *b == b' ' {
                *b as char
            } else {
                '.'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_accumulate() {
        let mut buf = Buffer::new();
        buf.append(b"hel").unwrap();
        buf.append(b"lo").unwrap();
        buf.append_byte(b'!').unwrap();
        assert_eq!(buf.len(), 6);
        assert_eq!(buf.data(), b"hello!");
    }

    #[test]
    fn length_prefix_round_trip() {
        let mut buf = Buffer::new();
        buf.append_prefix(16, 5).unwrap();
        buf.append(b"hello").unwrap();
        assert_eq!(buf.data(), &[0x00, 0x05, 0x68, 0x65, 0x6c, 0x6c, 0x6f]);

        assert_eq!(buf.pop_prefix(16, true).unwrap(), 5);
        assert_eq!(buf.pop_datum(5).unwrap(), b"hello");
        assert!(buf.is_empty());
    }

    #[test]
    fn prefix_check_rejects_short_data() {
        let mut buf = Buffer::new();
        buf.append_prefix(16, 10).unwrap();
        buf.append(b"short").unwrap();
        assert_eq!(
            buf.pop_prefix(16, true),
            Err(Error::UnexpectedPacketLength)
        );
    }

    #[test]
    fn pop_beyond_end_fails() {
        let mut buf = Buffer::new();
        buf.append(b"ab").unwrap();
        assert!(buf.pop(3).is_none());
        assert_eq!(buf.pop(2).unwrap(), b"ab");
    }

    #[test]
    fn escape_round_trip() {
        let mut buf = Buffer::new();
        buf.append_escape(b"a b|c%", b"|").unwrap();
        assert_eq!(buf.data(), b"a%20b%7Cc%25");

        let escaped = buf.into_datum(false);
        let mut buf = Buffer::new();
        buf.unescape(&escaped).unwrap();
        assert_eq!(buf.data(), b"a b|c%");
    }

    #[test]
    fn mpi_fixed_size_preserves_leading_zero() {
        let mpi = Mpi::from_bytes_be(&[0x01, 0x02]);
        let mut buf = Buffer::new();
        buf.append_mpi(16, &mpi, Some(4)).unwrap();
        assert_eq!(buf.data(), &[0x00, 0x04, 0x00, 0x00, 0x01, 0x02]);

        let mut buf = Buffer::new();
        buf.append_mpi(16, &mpi, None).unwrap();
        assert_eq!(buf.data(), &[0x00, 0x02, 0x01, 0x02]);
    }

    #[test]
    fn print_helpers() {
        let mut buf = Buffer::new();
        buf.append(&[0xde, 0xad]).unwrap();
        assert_eq!(buf.hex_print(), "dead");
        assert_eq!(buf.base64_print(), "3q0=");

        let mut buf = Buffer::new();
        buf.append(b"hi\x01").unwrap();
        assert_eq!(buf.ascii_print(), "hi.");
    }

    #[test]
    fn hex_and_base64_are_lossless() {
        let hex_str = "00ff10abcdef";
        let mut buf = Buffer::new();
        buf.append(&hex::decode(hex_str).unwrap()).unwrap();
        assert_eq!(buf.hex_print(), hex_str);

        let bytes: Vec<u8> = (0u8..=255).collect();
        let mut buf = Buffer::new();
        buf.append(&bytes).unwrap();
        assert_eq!(B64.decode(buf.base64_print()).unwrap(), bytes);
    }

    #[test]
    fn into_datum_nul_terminates() {
        let mut buf = Buffer::new();
        buf.append(b"abc").unwrap();
        buf.pop(1);
        assert_eq!(buf.into_datum(true), b"bc\0");
    }
}
