//! Byte/text codecs used by identifiers, envelopes and challenge codes.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use base64::engine::DecodePaddingMode;
use base64::Engine;

use crate::error::CryptoError;

/// URL-safe alphabet, unpadded on encode, padding tolerated on decode.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Encode bytes as base-58 (Bitcoin alphabet). Leading zero bytes become `1`s.
pub fn encode_base58(bytes: &[u8]) -> String {
    bs58::encode(bytes).into_string()
}

/// Decode base-58 text.
pub fn decode_base58(text: &str) -> Result<Vec<u8>, CryptoError> {
    bs58::decode(text)
        .into_vec()
        .map_err(|e| CryptoError::InvalidInput(format!("invalid base58: {}", e)))
}

/// Encode bytes as unpadded base64-url.
pub fn encode_base64url(bytes: &[u8]) -> String {
    URL_SAFE_LENIENT.encode(bytes)
}

/// Decode base64-url text, with or without padding.
pub fn decode_base64url(text: &str) -> Result<Vec<u8>, CryptoError> {
    URL_SAFE_LENIENT
        .decode(text)
        .map_err(|e| CryptoError::InvalidInput(format!("invalid base64url: {}", e)))
}

/// Encode bytes as standard padded base64.
pub fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode standard padded base64.
pub fn decode_base64(text: &str) -> Result<Vec<u8>, CryptoError> {
    STANDARD
        .decode(text)
        .map_err(|e| CryptoError::InvalidInput(format!("invalid base64: {}", e)))
}
