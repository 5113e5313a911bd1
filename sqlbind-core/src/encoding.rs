//! Binary payloads carried through text columns.
//!
//! Bytes are written as standard base64 without padding and read back the same way.

use base64::prelude::{Engine as _, BASE64_STANDARD_NO_PAD};

use crate::error::{Error, Result};

/// Encodes `src` for storage in a text column.
pub fn bin_to_str(src: &[u8]) -> String {
    BASE64_STANDARD_NO_PAD.encode(src)
}

/// Decodes text written by [`bin_to_str`].
pub fn str_to_bin(src: &str) -> Result<Vec<u8>> {
    decode(src).map_err(|e| Error::Decode(e.into()))
}

pub(crate) fn decode(src: &str) -> Result<Vec<u8>, base64::DecodeError> {
    BASE64_STANDARD_NO_PAD.decode(src)
}
