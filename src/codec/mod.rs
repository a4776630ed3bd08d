//! Decompression stage: codec trait and built-in registry.
//!
//! The compression nibble of `algo` is the only codec identity an RBL file
//! carries. This build ships NONE and GZIP; QUICKLZ and FASTLZ are
//! recognised by the header parser but [`get_codec`] refuses them. Callers
//! that have an implementation can register it on a [`crate::Pipeline`].

use flate2::bufread::GzDecoder;
use log::{trace, warn};
use std::io::{self, Read};
use thiserror::Error;

use crate::header::CompressionKind;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Decompression error: {0}")]
    Decompression(String),
    #[error("Compression {0} is not supported by this build")]
    NotSupported(CompressionKind),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub trait Codec: Send + Sync {
    fn kind(&self) -> CompressionKind;

    /// Decompress `data`, producing at most `limit` bytes when a limit is
    /// given. Longer streams are cut at `limit`; shorter ones are returned
    /// as-is.
    fn decompress(&self, data: &[u8], limit: Option<usize>) -> Result<Vec<u8>, CodecError>;
}

// ── Built-in codec implementations ──────────────────────────────────────────

pub struct NoneCodec;
impl Codec for NoneCodec {
    fn kind(&self) -> CompressionKind { CompressionKind::None }
    fn decompress(&self, data: &[u8], _: Option<usize>) -> Result<Vec<u8>, CodecError> {
        Ok(data.to_vec())
    }
}

/// Gzip with the member handling of a stock gzip reader: concatenated
/// members are decoded in turn and NUL padding between or after members
/// (left behind by block-cipher alignment) is skipped.
pub struct GzipCodec;
impl Codec for GzipCodec {
    fn kind(&self) -> CompressionKind { CompressionKind::Gzip }

    fn decompress(&self, data: &[u8], limit: Option<usize>) -> Result<Vec<u8>, CodecError> {
        let mut out  = Vec::new();
        let mut rest = data;
        while !rest.is_empty() {
            let mut member = GzDecoder::new(rest);
            let res = match limit {
                Some(n) => member.by_ref().take((n - out.len()) as u64).read_to_end(&mut out),
                None    => member.read_to_end(&mut out),
            };
            res.map_err(|e| CodecError::Decompression(e.to_string()))?;
            if limit.is_some_and(|n| out.len() >= n) {
                break;
            }

            rest = member.into_inner();
            let padding = rest.iter().take_while(|&&b| b == 0).count();
            rest = &rest[padding..];
        }

        trace!("gzip: {} B -> {} B", data.len(), out.len());
        if let Some(n) = limit {
            if out.len() < n {
                warn!("gzip stream ended after {} B, header promised {} B", out.len(), n);
            }
        }
        Ok(out)
    }
}

// ── Factory ──────────────────────────────────────────────────────────────────

/// Resolve a compression kind to a built-in codec.
///
/// QUICKLZ and FASTLZ yield `CodecError::NotSupported`; there is no fallback.
pub fn get_codec(kind: CompressionKind) -> Result<Box<dyn Codec>, CodecError> {
    match kind {
        CompressionKind::None    => Ok(Box::new(NoneCodec)),
        CompressionKind::Gzip    => Ok(Box::new(GzipCodec)),
        CompressionKind::QuickLz
        | CompressionKind::FastLz => Err(CodecError::NotSupported(kind)),
    }
}
