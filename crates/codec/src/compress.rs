//! zlib + base64 payload framing.
//!
//! Round-trip law: `inflate_b64(deflate_b64(s)) == s` for every UTF-8
//! string `s`.

use std::io::{Read, Write};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::CodecError;

/// Compress a string with zlib.
pub fn deflate(text: &str) -> Result<Vec<u8>, CodecError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(text.as_bytes())?;
    Ok(encoder.finish()?)
}

/// Decompress a zlib payload back to UTF-8.
pub fn inflate(compressed: &[u8]) -> Result<String, CodecError> {
    let mut decoder = ZlibDecoder::new(compressed);
    let mut raw = Vec::new();
    decoder.read_to_end(&mut raw)?;
    Ok(String::from_utf8(raw)?)
}

/// Compress a string with zlib and encode the result as base64.
pub fn deflate_b64(text: &str) -> Result<String, CodecError> {
    Ok(BASE64.encode(deflate(text)?))
}

/// Decode a base64 string and decompress the zlib payload back to UTF-8.
pub fn inflate_b64(b64: &str) -> Result<String, CodecError> {
    let compressed = BASE64.decode(b64)?;
    inflate(&compressed)
}
