//! KLV (Key-Length-Value) triplet handling
//!
//! All data in MXF files is encoded as KLV triplets:
//! - Key: 16-byte Universal Label identifying the data
//! - Length: BER-encoded length of the value (up to 8 length bytes)
//! - Value: The actual data
//!
//! [`Klv`] writes whole triplets and [`local_items`] walks the items of a
//! local set held in memory; [`KlvStream`] reads KLVs from an [`MxfStream`].

use crate::error::{MxfError, Result};
use crate::stream::MxfStream;
use crate::ul::{UniversalLabel, UL};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Seek, SeekFrom, Write};

/// Largest number of BER length bytes accepted after the 0x8x prefix.
const MAX_BER_LENGTH_BYTES: usize = 8;

/// A KLV triplet
#[derive(Debug, Clone)]
pub struct Klv {
    /// Universal Label (key)
    pub key: UniversalLabel,
    /// Value data
    pub value: Vec<u8>,
}

impl Klv {
    /// Create new KLV
    pub fn new(key: UL, value: Vec<u8>) -> Self {
        Klv {
            key: UniversalLabel(key),
            value,
        }
    }

    /// Total size including key and length encoding
    pub fn total_size(&self) -> usize {
        16 + ber_length_size(self.value.len() as u64) + self.value.len()
    }

    /// Write KLV to writer
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<usize> {
        writer.write_all(self.key.as_bytes())?;
        let len_bytes = encode_ber_length(self.value.len() as u64);
        writer.write_all(&len_bytes)?;
        writer.write_all(&self.value)?;
        Ok(16 + len_bytes.len() + self.value.len())
    }
}

/// Calculate BER length encoding size
pub fn ber_length_size(length: u64) -> usize {
    if length < 0x80 {
        1
    } else {
        let bytes = 8 - (length.leading_zeros() / 8) as usize;
        1 + bytes
    }
}

/// Encode length as BER
pub fn encode_ber_length(length: u64) -> Vec<u8> {
    if length < 0x80 {
        return vec![length as u8];
    }
    let size = ber_length_size(length) - 1;
    let mut encoded = Vec::with_capacity(size + 1);
    encoded.push(0x80 | size as u8);
    encoded.extend_from_slice(&length.to_be_bytes()[8 - size..]);
    encoded
}

/// Encode length as BER using exactly `size` length bytes (e.g. 8 for
/// lengths patched in later).
pub fn encode_ber_length_fixed(length: u64, size: usize) -> Vec<u8> {
    let size = size.clamp(1, MAX_BER_LENGTH_BYTES);
    let mut encoded = Vec::with_capacity(size + 1);
    encoded.push(0x80 | size as u8);
    encoded.extend_from_slice(&length.to_be_bytes()[8 - size..]);
    encoded
}

/// Decode BER length from bytes, returning the length and the bytes used
pub fn decode_ber_length(data: &[u8]) -> Result<(u64, usize)> {
    let first_byte = *data
        .first()
        .ok_or_else(|| MxfError::BerError("No data".into()))?;

    if first_byte < 0x80 {
        return Ok((first_byte as u64, 1));
    }
    if first_byte == 0x80 {
        return Err(MxfError::BerError("Indefinite length not supported".into()));
    }

    let num_bytes = (first_byte & 0x7F) as usize;
    if num_bytes > MAX_BER_LENGTH_BYTES {
        return Err(MxfError::BerError(format!(
            "{} length bytes exceed the maximum of {}",
            num_bytes, MAX_BER_LENGTH_BYTES
        )));
    }
    if data.len() < 1 + num_bytes {
        return Err(MxfError::BerError("Not enough bytes".into()));
    }

    let length = data[1..=num_bytes]
        .iter()
        .fold(0u64, |acc, byte| (acc << 8) | *byte as u64);
    Ok((length, 1 + num_bytes))
}

/// Write a local set item (2-byte tag, 2-byte length)
pub fn write_local_item<W: Write>(writer: &mut W, tag: u16, value: &[u8]) -> Result<usize> {
    let length = u16::try_from(value.len())
        .map_err(|_| MxfError::InvalidFile(format!("local item 0x{tag:04x} too large")))?;
    writer.write_u16::<BigEndian>(tag)?;
    writer.write_u16::<BigEndian>(length)?;
    writer.write_all(value)?;
    Ok(4 + value.len())
}

/// Iterator over the `(tag, value)` items of a local set.
pub struct LocalItems<'a> {
    data: &'a [u8],
    offset: usize,
}

/// Iterate the items of a local set value.
pub fn local_items(data: &[u8]) -> LocalItems<'_> {
    LocalItems { data, offset: 0 }
}

impl<'a> Iterator for LocalItems<'a> {
    type Item = Result<(u16, &'a [u8])>;

    fn next(&mut self) -> Option<Self::Item> {
        let remaining = &self.data[self.offset..];
        if remaining.is_empty() {
            return None;
        }
        if remaining.len() < 4 {
            self.offset = self.data.len();
            return Some(Err(MxfError::InsufficientData {
                needed: 4,
                available: remaining.len(),
            }));
        }
        let tag = u16::from_be_bytes([remaining[0], remaining[1]]);
        let length = u16::from_be_bytes([remaining[2], remaining[3]]) as usize;
        if remaining.len() < 4 + length {
            self.offset = self.data.len();
            return Some(Err(MxfError::InsufficientData {
                needed: length,
                available: remaining.len() - 4,
            }));
        }
        self.offset += 4 + length;
        Some(Ok((tag, &remaining[4..4 + length])))
    }
}

/// Decode a batch or array header: `(count, item size)`.
pub fn read_batch_header(data: &[u8]) -> Result<(usize, usize)> {
    let mut cursor = data;
    let count = cursor.read_u32::<BigEndian>()? as usize;
    let item_size = cursor.read_u32::<BigEndian>()? as usize;
    if count.saturating_mul(item_size) > data.len() - 8 {
        return Err(MxfError::InsufficientData {
            needed: count.saturating_mul(item_size),
            available: data.len() - 8,
        });
    }
    Ok((count, item_size))
}

/// Key and length of a KLV read from a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KlHeader {
    /// The key
    pub key: UniversalLabel,
    /// Value length
    pub length: u64,
    /// File offset of the key
    pub offset: u64,
    /// Bytes taken by key and length
    pub header_size: u64,
}

impl KlHeader {
    /// File offset of the value.
    pub fn value_offset(&self) -> u64 {
        self.offset + self.header_size
    }

    /// File offset just after the value.
    pub fn end_offset(&self) -> u64 {
        self.value_offset() + self.length
    }
}

/// KLV access over an [`MxfStream`].
///
/// The stream position is tracked locally so that seeks to the current
/// position never reach the underlying stream. After a failed read the
/// tracked position is unreliable and the next seek always goes through.
pub struct KlvStream {
    stream: Box<dyn MxfStream>,
    position: u64,
    position_lost: bool,
}

impl KlvStream {
    /// Take ownership of `stream`, which must be positioned at 0.
    pub fn new(stream: Box<dyn MxfStream>) -> Self {
        KlvStream {
            stream,
            position: 0,
            position_lost: false,
        }
    }

    /// Whether arbitrary seeks are possible.
    pub fn is_seekable(&self) -> bool {
        self.stream.is_seekable()
    }

    /// Current file offset.
    pub fn tell(&self) -> u64 {
        self.position
    }

    /// Move to a file offset.
    pub fn seek(&mut self, offset: u64) -> Result<()> {
        if offset != self.position || self.position_lost {
            self.position = self.stream.seek(SeekFrom::Start(offset))?;
            self.position_lost = false;
        }
        Ok(())
    }

    /// Total stream size; seekable streams only.
    pub fn size(&mut self) -> Result<u64> {
        let size = self.stream.seek(SeekFrom::End(0))?;
        self.stream.seek(SeekFrom::Start(self.position))?;
        Ok(size)
    }

    /// Skip `count` bytes.
    pub fn skip(&mut self, count: u64) -> Result<()> {
        self.seek(self.position + count)
    }

    /// Read exactly `buf.len()` bytes.
    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        if let Err(e) = self.stream.read_exact(buf) {
            self.position_lost = true;
            return Err(e.into());
        }
        self.position += buf.len() as u64;
        Ok(())
    }

    /// Read a value of `length` bytes.
    pub fn read_value(&mut self, length: u64) -> Result<Vec<u8>> {
        let length = usize::try_from(length)
            .map_err(|_| MxfError::InvalidFile(format!("value length {length} too large")))?;
        let mut value = vec![0u8; length];
        self.read_exact(&mut value)?;
        Ok(value)
    }

    /// Read a key and length.
    pub fn read_kl(&mut self) -> Result<KlHeader> {
        self.read_kl_opt()?.ok_or_else(|| {
            MxfError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "end of stream before key",
            ))
        })
    }

    /// Read a key and length, or `None` at a clean end of stream.
    pub fn read_kl_opt(&mut self) -> Result<Option<KlHeader>> {
        let offset = self.position;
        let mut key = [0u8; 16];
        let first = loop {
            match self.stream.read(&mut key[..1]) {
                Ok(count) => break count,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        };
        if first == 0 {
            return Ok(None);
        }
        self.position += 1;
        self.read_exact(&mut key[1..])?;

        let mut first_len = [0u8; 1];
        self.read_exact(&mut first_len)?;
        let first_len = first_len[0];
        let mut len_bytes = [0u8; 1 + MAX_BER_LENGTH_BYTES];
        len_bytes[0] = first_len;
        let extra = if first_len > 0x80 {
            (first_len & 0x7F) as usize
        } else {
            0
        };
        if extra > MAX_BER_LENGTH_BYTES {
            return Err(MxfError::InvalidKlv {
                message: format!("{} BER length bytes", extra),
                offset,
            });
        }
        self.read_exact(&mut len_bytes[1..1 + extra])?;
        let (length, len_size) =
            decode_ber_length(&len_bytes[..1 + extra]).map_err(|e| MxfError::InvalidKlv {
                message: e.to_string(),
                offset,
            })?;

        Ok(Some(KlHeader {
            key: UniversalLabel(key),
            length,
            offset,
            header_size: 16 + len_size as u64,
        }))
    }

    /// Read the next key and length that is not a fill item.
    pub fn read_next_non_filler_kl(&mut self) -> Result<KlHeader> {
        loop {
            let kl = self.read_kl()?;
            if !kl.key.is_fill_item() {
                return Ok(kl);
            }
            self.skip(kl.length)?;
        }
    }

    /// Like [`KlvStream::read_next_non_filler_kl`] but `None` at the end.
    pub fn read_next_non_filler_kl_opt(&mut self) -> Result<Option<KlHeader>> {
        loop {
            match self.read_kl_opt()? {
                Some(kl) if kl.key.is_fill_item() => self.skip(kl.length)?,
                other => return Ok(other),
            }
        }
    }
}
