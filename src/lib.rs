pub mod header;
pub mod checksum;
pub mod crypto;
pub mod codec;
pub mod error;
pub mod reader;

pub use header::{RblHeader, CipherKind, CompressionKind, HeaderError};
pub use checksum::{crc32, fnv1a_32, fnv1a_32_with_basis, DataError};
pub use crypto::{Decipher, AesCbcDecipher, NoneDecipher, CipherError};
pub use codec::{Codec, CodecError, get_codec};
pub use error::{RblError, Result};
pub use reader::{RblReader, RblInfo, ProcessOptions, Pipeline};
