use rapport_core::TrustError;
use rapport_crypto::encoding::{decode_base58, encode_base58};
use rapport_crypto::PublicKey;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Scheme and method prefix of every identifier.
pub const DID_KEY_PREFIX: &str = "did:key:";
/// Multibase marker for base58btc.
pub const MULTIBASE_BASE58BTC: char = 'z';
/// Multicodec tag for a raw Ed25519 public key.
pub const ED25519_PUB_TAG: [u8; 2] = [0xed, 0x01];

/// Self-certifying identifier: `did:key:z<base58(0xed01 ‖ public key)>`.
///
/// Only fully well-formed identifiers can be constructed.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier {
    value: String,
    key: [u8; 32],
}

impl Identifier {
    /// Derive the identifier of a public key.
    pub fn from_public_key(key: &PublicKey) -> Self {
        Self {
            value: identifier_from_public_key(key.as_bytes()),
            key: *key.as_bytes(),
        }
    }

    /// Parse and fully validate an identifier string.
    pub fn parse(value: &str) -> Result<Self, TrustError> {
        let key = identifier_to_public_key(value)?;
        Ok(Self {
            value: value.to_string(),
            key,
        })
    }

    /// Raw 32-byte public key embedded in the identifier.
    pub fn public_key_bytes(&self) -> &[u8; 32] {
        &self.key
    }

    /// The embedded key as a verification key.
    pub fn to_public_key(&self) -> Result<PublicKey, TrustError> {
        PublicKey::from_bytes(&self.key).map_err(TrustError::from)
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// The multibase part after the prefix, used as key fragment in proofs.
    pub fn key_fragment(&self) -> &str {
        &self.value[DID_KEY_PREFIX.len()..]
    }
}

/// Encode a raw Ed25519 public key as an identifier string.
pub fn identifier_from_public_key(key: &[u8; 32]) -> String {
    let mut tagged = Vec::with_capacity(34);
    tagged.extend_from_slice(&ED25519_PUB_TAG);
    tagged.extend_from_slice(key);
    format!("{}{}{}", DID_KEY_PREFIX, MULTIBASE_BASE58BTC, encode_base58(&tagged))
}

/// Decode an identifier string back to its raw Ed25519 public key.
pub fn identifier_to_public_key(value: &str) -> Result<[u8; 32], TrustError> {
    let encoded = value
        .strip_prefix(DID_KEY_PREFIX)
        .and_then(|rest| rest.strip_prefix(MULTIBASE_BASE58BTC))
        .ok_or_else(|| TrustError::MalformedInput(format!("invalid identifier prefix: {}", value)))?;

    let bytes = decode_base58(encoded).map_err(TrustError::from)?;
    if bytes.len() != 34 {
        return Err(TrustError::MalformedInput(format!(
            "identifier must decode to 34 bytes, got {}",
            bytes.len()
        )));
    }
    if bytes[..2] != ED25519_PUB_TAG {
        return Err(TrustError::MalformedInput(format!(
            "unsupported key type tag: {:02x}{:02x}",
            bytes[0], bytes[1]
        )));
    }

    let mut key = [0u8; 32];
    key.copy_from_slice(&bytes[2..]);
    Ok(key)
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Identifier").field(&self.value).finish()
    }
}

impl FromStr for Identifier {
    type Err = TrustError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Identifier {
    type Error = TrustError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let key = identifier_to_public_key(&value)?;
        Ok(Self { value, key })
    }
}

impl From<Identifier> for String {
    fn from(id: Identifier) -> Self {
        id.value
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.value
    }
}
