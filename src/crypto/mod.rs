//! Payload decipher stage.
//!
//! RBL images built with the AES option are encrypted with AES-CBC over the
//! whole payload. The key length picks the variant (16/24/32 bytes for
//! AES-128/192/256); the IV is one 16-byte block. No padding is stripped:
//! the output has exactly the ciphertext's length and the compression and
//! size fields are trusted to account for any filler.

use aes::{Aes128, Aes192, Aes256};
use cbc::cipher::block_padding::NoPadding;
use cbc::cipher::{BlockDecryptMut, KeyIvInit};
use thiserror::Error;

pub const AES_BLOCK_LEN: usize = 16;

type Aes128CbcDec = cbc::Decryptor<Aes128>;
type Aes192CbcDec = cbc::Decryptor<Aes192>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

#[derive(Error, Debug)]
pub enum CipherError {
    #[error("Invalid AES key length {0} B, expected 16, 24 or 32")]
    InvalidKeyLength(usize),
    #[error("Invalid AES IV length {0} B, expected {AES_BLOCK_LEN}")]
    InvalidIvLength(usize),
    #[error("Ciphertext length {0} B is not a multiple of the AES block size")]
    UnalignedCiphertext(usize),
    #[error("Decryption failed")]
    Decrypt,
}

/// Decipher strategy used by [`crate::Pipeline`].
pub trait Decipher: Send + Sync {
    fn decrypt(&self, key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>, CipherError>;
}

/// Passes data through unchanged; for pipelines that must not pull in AES.
pub struct NoneDecipher;
impl Decipher for NoneDecipher {
    fn decrypt(&self, _: &[u8], _: &[u8], data: &[u8]) -> Result<Vec<u8>, CipherError> {
        Ok(data.to_vec())
    }
}

pub struct AesCbcDecipher;
impl Decipher for AesCbcDecipher {
    fn decrypt(&self, key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>, CipherError> {
        if iv.len() != AES_BLOCK_LEN {
            return Err(CipherError::InvalidIvLength(iv.len()));
        }
        if data.len() % AES_BLOCK_LEN != 0 {
            return Err(CipherError::UnalignedCiphertext(data.len()));
        }
        let mut buf = data.to_vec();
        match key.len() {
            16 => {
                Aes128CbcDec::new_from_slices(key, iv)
                    .map_err(|_| CipherError::InvalidKeyLength(key.len()))?
                    .decrypt_padded_mut::<NoPadding>(&mut buf)
                    .map_err(|_| CipherError::Decrypt)?;
            }
            24 => {
                Aes192CbcDec::new_from_slices(key, iv)
                    .map_err(|_| CipherError::InvalidKeyLength(key.len()))?
                    .decrypt_padded_mut::<NoPadding>(&mut buf)
                    .map_err(|_| CipherError::Decrypt)?;
            }
            32 => {
                Aes256CbcDec::new_from_slices(key, iv)
                    .map_err(|_| CipherError::InvalidKeyLength(key.len()))?
                    .decrypt_padded_mut::<NoPadding>(&mut buf)
                    .map_err(|_| CipherError::Decrypt)?;
            }
            n => return Err(CipherError::InvalidKeyLength(n)),
        }
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cbc::cipher::BlockEncryptMut;

    const KEY: [u8; 32] = *b"0123456789abcdef0123456789abcdef";
    const IV:  [u8; 16] = *b"fedcba9876543210";

    fn encrypt(key: &[u8], plain: &[u8]) -> Vec<u8> {
        let mut buf = plain.to_vec();
        let len = buf.len();
        match key.len() {
            16 => { cbc::Encryptor::<Aes128>::new_from_slices(key, &IV).unwrap()
                .encrypt_padded_mut::<NoPadding>(&mut buf, len).unwrap(); }
            32 => { cbc::Encryptor::<Aes256>::new_from_slices(key, &IV).unwrap()
                .encrypt_padded_mut::<NoPadding>(&mut buf, len).unwrap(); }
            _ => unreachable!(),
        }
        buf
    }

    #[test]
    fn aes256_cbc_decrypts() {
        let plain = [0x5Au8; 64];
        let cipher = encrypt(&KEY, &plain);
        assert_ne!(cipher, plain);
        let out = AesCbcDecipher.decrypt(&KEY, &IV, &cipher).unwrap();
        assert_eq!(out, plain);
    }

    #[test]
    fn key_length_selects_variant() {
        let plain = b"sixteen byte blk".repeat(3);
        let cipher = encrypt(&KEY[..16], &plain);
        assert_eq!(AesCbcDecipher.decrypt(&KEY[..16], &IV, &cipher).unwrap(), plain);
    }

    #[test]
    fn rejects_bad_lengths() {
        let data = [0u8; 32];
        assert!(matches!(AesCbcDecipher.decrypt(&KEY[..10], &IV, &data), Err(CipherError::InvalidKeyLength(10))));
        assert!(matches!(AesCbcDecipher.decrypt(&KEY, &IV[..8], &data), Err(CipherError::InvalidIvLength(8))));
        assert!(matches!(AesCbcDecipher.decrypt(&KEY, &IV, &data[..20]), Err(CipherError::UnalignedCiphertext(20))));
    }

    #[test]
    fn none_decipher_is_identity() {
        assert_eq!(NoneDecipher.decrypt(&[], &[], b"abc").unwrap(), b"abc");
    }
}
