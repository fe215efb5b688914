use rapport_core::TrustError;

/// Cryptographic operation errors.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("signature verification failed")]
    SignatureVerificationFailed,

    #[error("encryption failed: {0}")]
    EncryptionError(String),

    #[error("decryption failed: {0}")]
    DecryptionError(String),

    #[error("key derivation failed: {0}")]
    KeyDerivationError(String),

    #[error("Invalid mnemonic")]
    InvalidMnemonic,

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl From<CryptoError> for TrustError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::InvalidKeyLength { .. }
            | CryptoError::InvalidMnemonic
            | CryptoError::InvalidInput(_) => TrustError::MalformedInput(err.to_string()),
            _ => TrustError::CryptographicFailure(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_mapping() {
        let err: TrustError = CryptoError::InvalidMnemonic.into();
        assert_eq!(err, TrustError::MalformedInput("Invalid mnemonic".into()));

        let err: TrustError = CryptoError::InvalidKeyLength {
            expected: 32,
            actual: 3,
        }
        .into();
        assert!(matches!(err, TrustError::MalformedInput(_)));
    }

    #[test]
    fn test_cryptographic_mapping() {
        let err: TrustError = CryptoError::SignatureVerificationFailed.into();
        assert!(matches!(err, TrustError::CryptographicFailure(_)));

        let err: TrustError = CryptoError::DecryptionError("tag mismatch".into()).into();
        assert!(matches!(err, TrustError::CryptographicFailure(_)));
    }
}
