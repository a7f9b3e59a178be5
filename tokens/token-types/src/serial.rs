//! Binary serialization for the token records.
//!
//! The wire format is the chain's transaction format: little-endian
//! fixed-width integers and compact-size length prefixes for strings and
//! byte vectors. Deserialization returns a [`DeserialError`] on malformed
//! or truncated input, it never panics.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// Largest accepted compact-size value. Guards against attacker-controlled
/// length prefixes forcing huge allocations.
const MAX_COMPACT_SIZE: u64 = 0x0200_0000;

#[derive(Debug, thiserror::Error)]
pub enum DeserialError {
    #[error("{0}")]
    IO(#[from] std::io::Error),
    #[error("malformed encoding: {0}")]
    Malformed(String),
}

pub type DeserialResult<A> = Result<A, DeserialError>;

/// Types that can be written to a byte sink in their wire representation.
pub trait Serial {
    fn serial<W: Write>(&self, out: &mut W) -> std::io::Result<()>;

    /// Serialize into a fresh byte vector.
    fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.serial(&mut out)
            .expect("writing to a byte vector does not fail");
        out
    }
}

/// Types that can be read back from their wire representation.
/// Dual to [`Serial`].
pub trait Deserial: Sized {
    fn deserial<R: Read>(source: &mut R) -> DeserialResult<Self>;

    /// Deserialize from a byte slice, requiring all input to be consumed.
    fn deserialize(bytes: &[u8]) -> DeserialResult<Self> {
        let mut source = std::io::Cursor::new(bytes);
        let value = Self::deserial(&mut source)?;
        if source.position() != bytes.len() as u64 {
            return Err(DeserialError::Malformed("trailing bytes".into()));
        }
        Ok(value)
    }
}

pub fn write_compact_size<W: Write>(out: &mut W, size: u64) -> std::io::Result<()> {
    if size < 0xfd {
        out.write_u8(size as u8)
    } else if size <= u16::MAX as u64 {
        out.write_u8(0xfd)?;
        out.write_u16::<LittleEndian>(size as u16)
    } else if size <= u32::MAX as u64 {
        out.write_u8(0xfe)?;
        out.write_u32::<LittleEndian>(size as u32)
    } else {
        out.write_u8(0xff)?;
        out.write_u64::<LittleEndian>(size)
    }
}

pub fn read_compact_size<R: Read>(source: &mut R) -> DeserialResult<u64> {
    let first = source.read_u8()?;
    let size = match first {
        0xfd => source.read_u16::<LittleEndian>()? as u64,
        0xfe => source.read_u32::<LittleEndian>()? as u64,
        0xff => source.read_u64::<LittleEndian>()?,
        n => n as u64,
    };
    if size > MAX_COMPACT_SIZE {
        return Err(DeserialError::Malformed(format!(
            "compact size {} exceeds maximum",
            size
        )));
    }
    Ok(size)
}

pub fn write_var_bytes<W: Write>(out: &mut W, bytes: &[u8]) -> std::io::Result<()> {
    write_compact_size(out, bytes.len() as u64)?;
    out.write_all(bytes)
}

pub fn read_var_bytes<R: Read>(source: &mut R) -> DeserialResult<Vec<u8>> {
    let len = read_compact_size(source)? as usize;
    let mut bytes = vec![0u8; len];
    source.read_exact(&mut bytes)?;
    Ok(bytes)
}

pub fn write_var_string<W: Write>(out: &mut W, value: &str) -> std::io::Result<()> {
    write_var_bytes(out, value.as_bytes())
}

pub fn read_var_string<R: Read>(source: &mut R) -> DeserialResult<String> {
    let bytes = read_var_bytes(source)?;
    String::from_utf8(bytes).map_err(|_| DeserialError::Malformed("invalid utf-8 string".into()))
}

impl Serial for u8 {
    fn serial<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        out.write_u8(*self)
    }
}

impl Deserial for u8 {
    fn deserial<R: Read>(source: &mut R) -> DeserialResult<Self> {
        Ok(source.read_u8()?)
    }
}

impl Serial for i8 {
    fn serial<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        out.write_i8(*self)
    }
}

impl Deserial for i8 {
    fn deserial<R: Read>(source: &mut R) -> DeserialResult<Self> {
        Ok(source.read_i8()?)
    }
}

impl Serial for u32 {
    fn serial<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        out.write_u32::<LittleEndian>(*self)
    }
}

impl Deserial for u32 {
    fn deserial<R: Read>(source: &mut R) -> DeserialResult<Self> {
        Ok(source.read_u32::<LittleEndian>()?)
    }
}

impl Serial for i32 {
    fn serial<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        out.write_i32::<LittleEndian>(*self)
    }
}

impl Deserial for i32 {
    fn deserial<R: Read>(source: &mut R) -> DeserialResult<Self> {
        Ok(source.read_i32::<LittleEndian>()?)
    }
}

impl Serial for i64 {
    fn serial<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        out.write_i64::<LittleEndian>(*self)
    }
}

impl Deserial for i64 {
    fn deserial<R: Read>(source: &mut R) -> DeserialResult<Self> {
        Ok(source.read_i64::<LittleEndian>()?)
    }
}

impl Serial for bool {
    fn serial<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        out.write_u8(u8::from(*self))
    }
}

impl Deserial for bool {
    fn deserial<R: Read>(source: &mut R) -> DeserialResult<Self> {
        match source.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(DeserialError::Malformed(format!(
                "invalid boolean byte {:#04x}",
                other
            ))),
        }
    }
}

impl Serial for String {
    fn serial<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        write_var_string(out, self)
    }
}

impl Deserial for String {
    fn deserial<R: Read>(source: &mut R) -> DeserialResult<Self> {
        read_var_string(source)
    }
}

impl Serial for Vec<u8> {
    fn serial<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        write_var_bytes(out, self)
    }
}

impl Deserial for Vec<u8> {
    fn deserial<R: Read>(source: &mut R) -> DeserialResult<Self> {
        read_var_bytes(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compact_size_widths() {
        let mut out = Vec::new();
        write_compact_size(&mut out, 0xfc).unwrap();
        assert_eq!(hex::encode(&out), "fc");

        out.clear();
        write_compact_size(&mut out, 0xfd).unwrap();
        assert_eq!(hex::encode(&out), "fdfd00");

        out.clear();
        write_compact_size(&mut out, 0x1_0000).unwrap();
        assert_eq!(hex::encode(&out), "fe00000100");
    }

    #[test]
    fn compact_size_round_trip() {
        for size in [0u64, 1, 0xfc, 0xfd, 0xffff, 0x10000, MAX_COMPACT_SIZE] {
            let mut out = Vec::new();
            write_compact_size(&mut out, size).unwrap();
            let read = read_compact_size(&mut std::io::Cursor::new(&out)).unwrap();
            assert_eq!(read, size);
        }
    }

    #[test]
    fn oversized_length_prefix_rejected() {
        let mut bytes = vec![0xff];
        bytes.extend_from_slice(&u64::MAX.to_le_bytes());
        assert!(read_compact_size(&mut std::io::Cursor::new(&bytes)).is_err());
    }

    #[test]
    fn truncated_string_rejected() {
        // Length prefix says 5 bytes, only 2 present.
        let bytes = [0x05, b'a', b'b'];
        assert!(String::deserialize(&bytes).is_err());
    }

    #[test]
    fn bool_rejects_non_canonical() {
        assert!(bool::deserialize(&[2]).is_err());
        assert!(bool::deserialize(&[0]).unwrap() == false);
        assert!(bool::deserialize(&[1]).unwrap());
    }
}
