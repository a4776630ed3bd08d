//! Integrity primitives: CRC32 (ISO-3309, via `crc32fast`) for the stored
//! payload and the header, FNV-1a 32 for the processed payload.

use crc32fast::Hasher;
use thiserror::Error;

/// FNV-1a 32-bit offset basis.
pub const FNV1A_BASIS: u32 = 0x811C_9DC5;
/// FNV-1a 32-bit prime.
pub const FNV1A_PRIME: u32 = 16_777_619;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DataError {
    #[error("Invalid data CRC32: header says {expected:#010x}, payload is {actual:#010x}")]
    PayloadCrc { expected: u32, actual: u32 },
    #[error("Invalid header CRC32: header says {expected:#010x}, computed {actual:#010x}")]
    HeaderCrc { expected: u32, actual: u32 },
    #[error("FNV-1a hash mismatch: header says {expected:#010x}, processed data is {actual:#010x}")]
    HashMismatch { expected: u32, actual: u32 },
}

pub fn crc32(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

pub fn fnv1a_32(data: &[u8]) -> u32 {
    fnv1a_32_with_basis(data, FNV1A_BASIS)
}

/// FNV-1a starting from an arbitrary `basis`, so a hash can be continued
/// across several buffers.
pub fn fnv1a_32_with_basis(data: &[u8], basis: u32) -> u32 {
    data.iter()
        .fold(basis, |h, &b| (h ^ u32::from(b)).wrapping_mul(FNV1A_PRIME))
}
