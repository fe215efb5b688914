use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::error::CryptoError;

/// ChaCha20-Poly1305 ciphertext with its nonce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedBox {
    /// 12-byte nonce, hex-encoded.
    #[serde(with = "hex_bytes")]
    pub nonce: Vec<u8>,
    /// Ciphertext plus 16-byte Poly1305 tag, hex-encoded.
    #[serde(with = "hex_bytes")]
    pub ciphertext: Vec<u8>,
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

/// Encrypt `plaintext` under a 32-byte symmetric key with a fresh random nonce.
pub fn seal(plaintext: &[u8], key: &[u8; 32]) -> Result<SealedBox, CryptoError> {
    let mut nonce_bytes = [0u8; 12];
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let cipher = ChaCha20Poly1305::new_from_slice(key)
        .map_err(|e| CryptoError::EncryptionError(format!("cipher init failed: {}", e)))?;
    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| CryptoError::EncryptionError(format!("encryption failed: {}", e)))?;

    Ok(SealedBox {
        nonce: nonce_bytes.to_vec(),
        ciphertext,
    })
}

/// Decrypt a [`SealedBox`]. Fails if the key is wrong or the data was altered.
pub fn open(sealed: &SealedBox, key: &[u8; 32]) -> Result<Vec<u8>, CryptoError> {
    if sealed.nonce.len() != 12 {
        return Err(CryptoError::DecryptionError(format!(
            "nonce must be 12 bytes, got {}",
            sealed.nonce.len()
        )));
    }
    let nonce = Nonce::from_slice(&sealed.nonce);
    let cipher = ChaCha20Poly1305::new_from_slice(key)
        .map_err(|e| CryptoError::DecryptionError(format!("cipher init failed: {}", e)))?;
    cipher
        .decrypt(nonce, sealed.ciphertext.as_slice())
        .map_err(|e| CryptoError::DecryptionError(format!("decryption failed: {}", e)))
}
