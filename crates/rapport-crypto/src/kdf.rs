use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use rapport_core::KdfConfig;
use zeroize::Zeroizing;

use crate::error::CryptoError;

/// Salt length for passphrase derivation.
pub const SALT_LEN: usize = 16;

/// BLAKE3 context prefix for label-scoped sub-keys.
const SUBKEY_CONTEXT: &str = "rapport identity subkey v1";

/// Generate a random salt using OS-provided entropy.
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    salt
}

/// Derive a 32-byte key from a passphrase using Argon2id.
///
/// Deterministic for a given passphrase, salt and cost configuration.
pub fn derive_passphrase_key(
    passphrase: &[u8],
    salt: &[u8],
    config: &KdfConfig,
) -> Result<Zeroizing<[u8; 32]>, CryptoError> {
    let params = Params::new(
        config.memory_kib,
        config.iterations,
        config.parallelism,
        Some(32),
    )
    .map_err(|e| CryptoError::KeyDerivationError(format!("invalid argon2 params: {}", e)))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key = Zeroizing::new([0u8; 32]);
    argon2
        .hash_password_into(passphrase, salt, &mut key[..])
        .map_err(|e| CryptoError::KeyDerivationError(format!("argon2 hash failed: {}", e)))?;
    Ok(key)
}

/// Derive a namespaced 32-byte sub-key from a master seed.
///
/// Distinct labels give independent keys; the master seed cannot be recovered
/// from a sub-key.
pub fn derive_subkey(label: &str, seed: &[u8; 32]) -> [u8; 32] {
    let context = format!("{} {}", SUBKEY_CONTEXT, label);
    blake3::derive_key(&context, seed)
}
