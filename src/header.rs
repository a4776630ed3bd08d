//! Fixed 0x60-byte RBL header.
//!
//! ```text
//! 0x00  magic         "RBL\0"
//! 0x04  algo          u32   bits 0x00F = cipher, 0xF00 = compression
//! 0x08  timestamp     u32   Unix seconds
//! 0x0C  name          16 B  ASCII, NUL-padded
//! 0x1C  version       24 B  ASCII, NUL-padded
//! 0x34  serial        24 B  ASCII, NUL-padded
//! 0x4C  data_crc32    u32   CRC32 of the stored payload
//! 0x50  payload_hash  u32   FNV-1a of the processed payload
//! 0x54  size_raw      i32   processed payload size
//! 0x58  size_package  i32   stored payload size
//! 0x5C  header_crc32  u32   CRC32 of bytes [0x00, 0x5C)
//! ```
//!
//! All integers are little-endian.

use byteorder::{LittleEndian, ReadBytesExt};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, Cursor, Read};
use thiserror::Error;

pub const MAGIC: &[u8; 4] = b"RBL\0";

/// Total header length; the payload starts here.
pub const HEADER_SIZE: usize = 0x60;
/// Bytes covered by `header_crc32`.
pub const HEADER_CRC_SPAN: usize = 0x5C;

pub const NAME_LEN:    usize = 16;
pub const VERSION_LEN: usize = 24;
pub const SERIAL_LEN:  usize = 24;

pub const CIPHER_MASK:      u32 = 0x00F;
pub const COMPRESSION_MASK: u32 = 0xF00;

#[derive(Error, Debug)]
pub enum HeaderError {
    #[error("Invalid RBL file size {len} B, must be larger than {HEADER_SIZE:#x} bytes")]
    TooShort { len: usize },
    #[error("Invalid magic {}, expected 52424c00 (\"RBL\\0\")", hex::encode(.0))]
    InvalidMagic([u8; 4]),
    #[error("Unknown compression nibble {0:#x} in algo field")]
    UnknownCompression(u32),
    #[error("Unknown cipher nibble {0:#x} in algo field")]
    UnknownCipher(u32),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

// ── Algorithm selectors ─────────────────────────────────────────────────────

/// Compression selected by `algo & 0xF00`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompressionKind {
    None,
    Gzip,
    QuickLz,
    FastLz,
}

impl CompressionKind {
    /// Masked `algo` value for this kind.
    pub fn bits(self) -> u32 {
        match self {
            CompressionKind::None    => 0x000,
            CompressionKind::Gzip    => 0x100,
            CompressionKind::QuickLz => 0x200,
            CompressionKind::FastLz  => 0x300,
        }
    }

    /// Decode the compression nibble of a raw `algo` word.
    pub fn from_algo(algo: u32) -> Result<Self, HeaderError> {
        match algo & COMPRESSION_MASK {
            0x000 => Ok(CompressionKind::None),
            0x100 => Ok(CompressionKind::Gzip),
            0x200 => Ok(CompressionKind::QuickLz),
            0x300 => Ok(CompressionKind::FastLz),
            other => Err(HeaderError::UnknownCompression(other)),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CompressionKind::None    => "none",
            CompressionKind::Gzip    => "gzip",
            CompressionKind::QuickLz => "quicklz",
            CompressionKind::FastLz  => "fastlz",
        }
    }
}

impl fmt::Display for CompressionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Cipher selected by `algo & 0xF`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CipherKind {
    None,
    Aes,
}

impl CipherKind {
    pub fn bits(self) -> u32 {
        match self {
            CipherKind::None => 0x0,
            CipherKind::Aes  => 0x2,
        }
    }

    /// Decode the cipher nibble of a raw `algo` word.
    pub fn from_algo(algo: u32) -> Result<Self, HeaderError> {
        match algo & CIPHER_MASK {
            0x0   => Ok(CipherKind::None),
            0x2   => Ok(CipherKind::Aes),
            other => Err(HeaderError::UnknownCipher(other)),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CipherKind::None => "none",
            CipherKind::Aes  => "aes",
        }
    }
}

impl fmt::Display for CipherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── Header ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RblHeader {
    pub magic:        [u8; 4],
    pub algo:         u32,
    pub timestamp:    u32,
    pub name:         [u8; NAME_LEN],
    pub version:      [u8; VERSION_LEN],
    pub serial:       [u8; SERIAL_LEN],
    pub data_crc32:   u32,
    pub payload_hash: u32,
    pub size_raw:     i32,
    pub size_package: i32,
    pub header_crc32: u32,
}

impl RblHeader {
    /// Read the header fields in on-disk order.
    ///
    /// Only the layout and the magic are checked here; the `algo` nibbles and
    /// both CRCs are validated by [`crate::RblReader`].
    pub fn read<R: Read>(mut reader: R) -> Result<Self, HeaderError> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        let algo      = reader.read_u32::<LittleEndian>()?;
        let timestamp = reader.read_u32::<LittleEndian>()?;
        let mut name = [0u8; NAME_LEN];
        reader.read_exact(&mut name)?;
        let mut version = [0u8; VERSION_LEN];
        reader.read_exact(&mut version)?;
        let mut serial = [0u8; SERIAL_LEN];
        reader.read_exact(&mut serial)?;

        let header = Self {
            magic,
            algo,
            timestamp,
            name,
            version,
            serial,
            data_crc32:   reader.read_u32::<LittleEndian>()?,
            payload_hash: reader.read_u32::<LittleEndian>()?,
            size_raw:     reader.read_i32::<LittleEndian>()?,
            size_package: reader.read_i32::<LittleEndian>()?,
            header_crc32: reader.read_u32::<LittleEndian>()?,
        };

        if &header.magic != MAGIC {
            return Err(HeaderError::InvalidMagic(header.magic));
        }
        Ok(header)
    }

    /// Parse from the front of `bytes`, which must be strictly longer than
    /// the header.
    pub fn parse(bytes: &[u8]) -> Result<Self, HeaderError> {
        if bytes.len() <= HEADER_SIZE {
            return Err(HeaderError::TooShort { len: bytes.len() });
        }
        Self::read(Cursor::new(&bytes[..HEADER_SIZE]))
    }

    pub fn compression_kind(&self) -> Result<CompressionKind, HeaderError> {
        CompressionKind::from_algo(self.algo)
    }

    pub fn cipher_kind(&self) -> Result<CipherKind, HeaderError> {
        CipherKind::from_algo(self.algo)
    }
}
