//! Compact detached-signature envelope: `base64url(header).base64url(payload).base64url(sig)`.
//!
//! The signature covers the ASCII bytes of `header.payload`. The header is
//! fixed; an envelope announcing any other algorithm is rejected.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::encoding::{decode_base64url, encode_base64url};
use crate::error::CryptoError;
use crate::keys::{KeyPair, PublicKey};
use crate::signing::{sign, verify, Signature};

pub const ENVELOPE_ALG: &str = "EdDSA";
pub const ENVELOPE_TYP: &str = "JWT";

#[derive(Debug, Serialize, Deserialize)]
struct EnvelopeHeader {
    alg: String,
    typ: String,
}

/// Outcome of [`verify_envelope`].
#[derive(Debug, Clone, PartialEq)]
pub struct EnvelopeVerification<T> {
    pub valid: bool,
    pub payload: Option<T>,
}

impl<T> EnvelopeVerification<T> {
    fn invalid() -> Self {
        Self {
            valid: false,
            payload: None,
        }
    }

    /// The payload if and only if the envelope verified.
    pub fn into_payload(self) -> Option<T> {
        if self.valid {
            self.payload
        } else {
            None
        }
    }
}

struct Segments<'a> {
    header: &'a str,
    payload: &'a str,
    signature: &'a str,
}

fn split(envelope: &str) -> Result<Segments<'_>, CryptoError> {
    let parts: Vec<&str> = envelope.split('.').collect();
    match parts.as_slice() {
        [header, payload, signature] => Ok(Segments {
            header: *header,
            payload: *payload,
            signature: *signature,
        }),
        _ => Err(CryptoError::InvalidInput(format!(
            "envelope must have 3 segments, got {}",
            parts.len()
        ))),
    }
}

/// Sign a JSON-serializable payload.
pub fn sign_envelope<T: Serialize + ?Sized>(
    payload: &T,
    keypair: &KeyPair,
) -> Result<String, CryptoError> {
    let header = EnvelopeHeader {
        alg: ENVELOPE_ALG.into(),
        typ: ENVELOPE_TYP.into(),
    };
    let header_json = serde_json::to_vec(&header)
        .map_err(|e| CryptoError::InvalidInput(format!("header serialization: {}", e)))?;
    let payload_json = serde_json::to_vec(payload)
        .map_err(|e| CryptoError::InvalidInput(format!("payload serialization: {}", e)))?;

    let signing_input = format!(
        "{}.{}",
        encode_base64url(&header_json),
        encode_base64url(&payload_json)
    );
    let signature = sign(signing_input.as_bytes(), keypair);

    Ok(format!(
        "{}.{}",
        signing_input,
        encode_base64url(&signature.to_bytes())
    ))
}

/// Verify an envelope against `pubkey`.
///
/// Never fails: any structural or cryptographic problem yields `valid = false`.
pub fn verify_envelope<T: DeserializeOwned>(
    envelope: &str,
    pubkey: &PublicKey,
) -> EnvelopeVerification<T> {
    match try_verify(envelope, pubkey) {
        Ok(payload) => EnvelopeVerification {
            valid: true,
            payload: Some(payload),
        },
        Err(e) => {
            tracing::debug!(error = %e, "envelope rejected");
            EnvelopeVerification::invalid()
        }
    }
}

fn try_verify<T: DeserializeOwned>(envelope: &str, pubkey: &PublicKey) -> Result<T, CryptoError> {
    let segments = split(envelope)?;

    let header: EnvelopeHeader = serde_json::from_slice(&decode_base64url(segments.header)?)
        .map_err(|e| CryptoError::InvalidInput(format!("invalid header: {}", e)))?;
    if header.alg != ENVELOPE_ALG {
        return Err(CryptoError::InvalidInput(format!(
            "unsupported algorithm: {}",
            header.alg
        )));
    }

    let signature = Signature::from_bytes(&decode_base64url(segments.signature)?)?;
    let signing_input = format!("{}.{}", segments.header, segments.payload);
    verify(signing_input.as_bytes(), &signature, pubkey)?;

    serde_json::from_slice(&decode_base64url(segments.payload)?)
        .map_err(|e| CryptoError::InvalidInput(format!("invalid payload: {}", e)))
}

/// Decode the payload WITHOUT checking the signature.
///
/// Only for callers that verify the envelope through another path.
pub fn extract_payload<T: DeserializeOwned>(envelope: &str) -> Result<T, CryptoError> {
    let segments = split(envelope)?;
    serde_json::from_slice(&decode_base64url(segments.payload)?)
        .map_err(|e| CryptoError::InvalidInput(format!("invalid payload: {}", e)))
}
