use std::io;
use thiserror::Error;

use crate::checksum::DataError;
use crate::codec::CodecError;
use crate::crypto::CipherError;
use crate::header::{CompressionKind, HeaderError};

/// Error type for every fallible operation on an [`crate::RblReader`].
#[derive(Error, Debug)]
pub enum RblError {
    /// Structural problem found while parsing the header.
    #[error("Invalid RBL header: {0}")]
    Header(#[from] HeaderError),

    /// CRC32 or FNV-1a mismatch.
    #[error("Corrupted RBL data: {0}")]
    Data(#[from] DataError),

    /// The payload is AES-encrypted and the caller did not pass key and IV.
    #[error("No AES key/IV was set (key present: {key}, iv present: {iv})")]
    MissingKey { key: bool, iv: bool },

    #[error("Compression {0} is not implemented")]
    NotSupported(CompressionKind),

    #[error("Field `{field}` is not valid ASCII: byte {byte:#04x} at offset {offset}")]
    Text {
        field:  &'static str,
        offset: usize,
        byte:   u8,
    },

    #[error("Decipher error: {0}")]
    Cipher(#[from] CipherError),

    #[error("Codec error: {0}")]
    Codec(CodecError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl From<CodecError> for RblError {
    fn from(e: CodecError) -> Self {
        match e {
            CodecError::NotSupported(kind) => RblError::NotSupported(kind),
            other                          => RblError::Codec(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, RblError>;
