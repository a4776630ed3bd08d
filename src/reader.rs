//! [`RblReader`]: validated view over one complete `.rbl` image.
//!
//! ```no_run
//! use rbl::RblReader;
//!
//! let bytes = std::fs::read("rtthread.rbl")?;
//! let rbl = RblReader::new(&bytes)?;
//! println!("{} {} built {}", rbl.name()?, rbl.version()?, rbl.timestamp());
//!
//! // AES images need key material; plain ones ignore it.
//! let key = [0x11u8; 32];
//! let iv  = [0x22u8; 16];
//! let firmware = rbl.process(Some(&key[..]), Some(&iv[..]), true)?;
//! # let _ = firmware;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::borrow::Cow;
use std::io::Read;

use chrono::{DateTime, Utc};
use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};

use crate::checksum::{crc32, fnv1a_32, DataError};
use crate::codec::{get_codec, Codec, CodecError};
use crate::crypto::{AesCbcDecipher, Decipher};
use crate::error::{RblError, Result};
use crate::header::{
    CipherKind, CompressionKind, RblHeader, HEADER_CRC_SPAN, HEADER_SIZE, NAME_LEN,
    SERIAL_LEN, VERSION_LEN,
};

// ── ProcessOptions ────────────────────────────────────────────────────────────

/// Arguments for [`RblReader::process_with`].
#[derive(Debug, Clone)]
pub struct ProcessOptions {
    pub key:        Option<Vec<u8>>,
    pub iv:         Option<Vec<u8>>,
    /// Verify the FNV-1a hash of the processed payload.
    pub check_hash: bool,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            key:        None,
            iv:         None,
            check_hash: true,
        }
    }
}

impl ProcessOptions {
    pub fn with_key_iv(mut self, key: impl Into<Vec<u8>>, iv: impl Into<Vec<u8>>) -> Self {
        self.key = Some(key.into());
        self.iv  = Some(iv.into());
        self
    }

    pub fn skip_hash_check(mut self) -> Self {
        self.check_hash = false;
        self
    }
}

// ── Pipeline ──────────────────────────────────────────────────────────────────

/// The decipher and decompress strategies applied by `process`.
///
/// Codecs registered with [`Pipeline::with_codec`] take precedence over the
/// built-in registry for their [`CompressionKind`].
pub struct Pipeline {
    decipher: Box<dyn Decipher>,
    codecs:   Vec<Box<dyn Codec>>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(AesCbcDecipher)
    }
}

impl Pipeline {
    pub fn new(decipher: impl Decipher + 'static) -> Self {
        Self {
            decipher: Box::new(decipher),
            codecs:   Vec::new(),
        }
    }

    pub fn with_codec(mut self, codec: impl Codec + 'static) -> Self {
        let kind = codec.kind();
        self.codecs.retain(|c| c.kind() != kind);
        self.codecs.push(Box::new(codec));
        self
    }

    fn decompress(
        &self,
        kind:  CompressionKind,
        data:  &[u8],
        limit: Option<usize>,
    ) -> std::result::Result<Vec<u8>, CodecError> {
        match self.codecs.iter().find(|c| c.kind() == kind) {
            Some(codec) => codec.decompress(data, limit),
            None        => get_codec(kind)?.decompress(data, limit),
        }
    }
}

// ── RblInfo ───────────────────────────────────────────────────────────────────

/// Decoded header summary returned by [`RblReader::info`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RblInfo {
    pub name:         String,
    pub version:      String,
    pub serial:       String,
    /// RFC 3339, UTC.
    pub timestamp:    String,
    pub cipher:       CipherKind,
    pub compression:  CompressionKind,
    pub algo:         String,
    pub data_crc32:   String,
    pub payload_hash: String,
    pub header_crc32: String,
    pub size_raw:     i32,
    pub size_package: i32,
    pub payload_len:  usize,
}

impl RblInfo {
    /// Pretty-printed JSON for inspection tools.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

// ── RblReader ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct RblReader {
    header:      RblHeader,
    cipher:      CipherKind,
    compression: CompressionKind,
    payload:     Vec<u8>,
}

impl RblReader {
    /// Parse and validate a complete image.
    ///
    /// Checks, in order: length, magic, compression nibble, cipher nibble,
    /// payload CRC32, header CRC32. Any failure aborts construction.
    pub fn new(bytes: &[u8]) -> Result<Self> {
        let header      = RblHeader::parse(bytes)?;
        let compression = header.compression_kind()?;
        let cipher      = header.cipher_kind()?;
        let payload     = &bytes[HEADER_SIZE..];

        let actual = crc32(payload);
        trace!("payload crc32: header={:#010x} computed={:#010x}", header.data_crc32, actual);
        if actual != header.data_crc32 {
            return Err(DataError::PayloadCrc { expected: header.data_crc32, actual }.into());
        }

        let actual = crc32(&bytes[..HEADER_CRC_SPAN]);
        trace!("header crc32: header={:#010x} computed={:#010x}", header.header_crc32, actual);
        if actual != header.header_crc32 {
            return Err(DataError::HeaderCrc { expected: header.header_crc32, actual }.into());
        }

        if usize::try_from(header.size_package).ok() != Some(payload.len()) {
            warn!(
                "size_package is {} B but {} B of payload follow the header",
                header.size_package,
                payload.len()
            );
        }

        debug!(
            "parsed RBL: algo={:#x} cipher={} compression={} raw={} B package={} B",
            header.algo, cipher, compression, header.size_raw, payload.len()
        );

        Ok(Self {
            header,
            cipher,
            compression,
            payload: payload.to_vec(),
        })
    }

    /// Read `reader` to the end, then parse as [`RblReader::new`] does.
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Self::new(&bytes)
    }

    // ── Process ──────────────────────────────────────────────────────────────

    /// Decipher, decompress and hash-check the payload with the built-in
    /// pipeline (AES-CBC, gzip).
    ///
    /// `key` and `iv` are required when the image is AES-encrypted and
    /// ignored otherwise. The stored payload is never modified, so repeated
    /// calls always start from the same bytes.
    pub fn process(&self, key: Option<&[u8]>, iv: Option<&[u8]>, check_hash: bool) -> Result<Vec<u8>> {
        self.run(key, iv, check_hash, &Pipeline::default())
    }

    pub fn process_with(&self, opts: &ProcessOptions, pipeline: &Pipeline) -> Result<Vec<u8>> {
        self.run(opts.key.as_deref(), opts.iv.as_deref(), opts.check_hash, pipeline)
    }

    fn run(
        &self,
        key:        Option<&[u8]>,
        iv:         Option<&[u8]>,
        check_hash: bool,
        pipeline:   &Pipeline,
    ) -> Result<Vec<u8>> {
        let plain: Cow<'_, [u8]> = match self.cipher {
            CipherKind::None => Cow::Borrowed(self.payload.as_slice()),
            CipherKind::Aes  => match (key, iv) {
                (Some(key), Some(iv)) => {
                    debug!("deciphering {} B with AES-CBC", self.payload.len());
                    Cow::Owned(pipeline.decipher.decrypt(key, iv, &self.payload)?)
                }
                (key, iv) => {
                    return Err(RblError::MissingKey { key: key.is_some(), iv: iv.is_some() });
                }
            },
        };

        // A negative size means "read everything".
        let limit = usize::try_from(self.header.size_raw).ok();
        let data = pipeline.decompress(self.compression, &plain, limit)?;
        debug!("{} stage: {} B -> {} B", self.compression, plain.len(), data.len());

        if check_hash {
            let actual = fnv1a_32(&data);
            trace!("fnv1a: header={:#010x} computed={:#010x}", self.header.payload_hash, actual);
            if actual != self.header.payload_hash {
                return Err(DataError::HashMismatch {
                    expected: self.header.payload_hash,
                    actual,
                }.into());
            }
        }
        Ok(data)
    }

    // ── Accessors ────────────────────────────────────────────────────────────

    pub fn header(&self) -> &RblHeader { &self.header }
    pub fn payload(&self) -> &[u8] { &self.payload }
    pub fn cipher_kind(&self) -> CipherKind { self.cipher }
    pub fn compression_kind(&self) -> CompressionKind { self.compression }
    pub fn algo(&self) -> u32 { self.header.algo }
    pub fn timestamp_secs(&self) -> u32 { self.header.timestamp }
    pub fn data_crc32(&self) -> u32 { self.header.data_crc32 }
    pub fn payload_hash(&self) -> u32 { self.header.payload_hash }
    pub fn size_raw(&self) -> i32 { self.header.size_raw }
    pub fn size_package(&self) -> i32 { self.header.size_package }
    pub fn header_crc32(&self) -> u32 { self.header.header_crc32 }
    pub fn name_bytes(&self) -> &[u8; NAME_LEN] { &self.header.name }
    pub fn version_bytes(&self) -> &[u8; VERSION_LEN] { &self.header.version }
    pub fn serial_bytes(&self) -> &[u8; SERIAL_LEN] { &self.header.serial }

    /// Build time. Every `u32` second count is representable.
    pub fn timestamp(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(i64::from(self.header.timestamp), 0).unwrap_or_default()
    }

    pub fn name(&self) -> Result<&str> {
        ascii_field("name", &self.header.name)
    }

    pub fn version(&self) -> Result<&str> {
        ascii_field("version", &self.header.version)
    }

    pub fn serial(&self) -> Result<&str> {
        ascii_field("serial", &self.header.serial)
    }

    pub fn info(&self) -> Result<RblInfo> {
        Ok(RblInfo {
            name:         self.name()?.to_owned(),
            version:      self.version()?.to_owned(),
            serial:       self.serial()?.to_owned(),
            timestamp:    self.timestamp().to_rfc3339(),
            cipher:       self.cipher,
            compression:  self.compression,
            algo:         format!("{:#010x}", self.header.algo),
            data_crc32:   format!("{:#010x}", self.header.data_crc32),
            payload_hash: format!("{:#010x}", self.header.payload_hash),
            header_crc32: format!("{:#010x}", self.header.header_crc32),
            size_raw:     self.header.size_raw,
            size_package: self.header.size_package,
            payload_len:  self.payload.len(),
        })
    }
}

/// Decode a NUL-padded ASCII field. Every byte, padding included, must be
/// ASCII; the text ends at the first NUL and surrounding whitespace is
/// dropped.
fn ascii_field<'a>(field: &'static str, raw: &'a [u8]) -> Result<&'a str> {
    if let Some(offset) = raw.iter().position(|b| !b.is_ascii()) {
        return Err(RblError::Text { field, offset, byte: raw[offset] });
    }
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    // All bytes are ASCII at this point, so this is valid UTF-8.
    Ok(std::str::from_utf8(&raw[..end]).unwrap_or_default().trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_field_trims_padding() {
        let mut raw = [0u8; 16];
        raw[..7].copy_from_slice(b" app 1 ");
        assert_eq!(ascii_field("name", &raw).unwrap(), "app 1");
    }

    #[test]
    fn ascii_field_all_nul_is_empty() {
        assert_eq!(ascii_field("serial", &[0u8; 24]).unwrap(), "");
    }

    #[test]
    fn ascii_field_stops_at_first_nul() {
        let raw = *b"boot\0stale-name\0";
        assert_eq!(ascii_field("name", &raw).unwrap(), "boot");
    }

    #[test]
    fn ascii_field_rejects_high_bytes_even_in_padding() {
        let mut raw = [0u8; 16];
        raw[..3].copy_from_slice(b"app");
        raw[12] = 0xC3;
        match ascii_field("name", &raw) {
            Err(RblError::Text { field, offset, byte }) => {
                assert_eq!(field, "name");
                assert_eq!(offset, 12);
                assert_eq!(byte, 0xC3);
            }
            other => panic!("expected Text error, got {:?}", other),
        }
    }

    #[test]
    fn process_options_builders() {
        let opts = ProcessOptions::default();
        assert!(opts.check_hash);
        assert!(opts.key.is_none() && opts.iv.is_none());

        let opts = ProcessOptions::default().with_key_iv(vec![1u8; 32], vec![2u8; 16]).skip_hash_check();
        assert!(!opts.check_hash);
        assert_eq!(opts.key.as_deref(), Some(&[1u8; 32][..]));
        assert_eq!(opts.iv.as_deref(), Some(&[2u8; 16][..]));
    }

    #[test]
    fn reader_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RblReader>();
        assert_send_sync::<Pipeline>();
    }
}
