//! Twelve-word recovery phrases (BIP-39 English wordlist with checksum).

use bip39::{Language, Mnemonic};
use rand::RngCore;
use zeroize::Zeroizing;

use crate::error::CryptoError;

/// Number of words in every recovery phrase.
pub const PHRASE_WORDS: usize = 12;

/// A validated recovery phrase.
#[derive(Clone, PartialEq, Eq)]
pub struct RecoveryPhrase {
    mnemonic: Mnemonic,
}

impl RecoveryPhrase {
    /// Generate a fresh 12-word phrase from 128 bits of OS entropy.
    pub fn generate() -> Result<Self, CryptoError> {
        let mut entropy = Zeroizing::new([0u8; 16]);
        rand::rngs::OsRng.fill_bytes(entropy.as_mut_slice());
        let mnemonic = Mnemonic::from_entropy_in(Language::English, entropy.as_slice())
            .map_err(|e| CryptoError::KeyDerivationError(format!("mnemonic generation: {}", e)))?;
        Ok(Self { mnemonic })
    }

    /// Parse and validate a phrase against the wordlist and checksum.
    ///
    /// Case and surrounding whitespace are normalised before validation.
    /// Valid BIP-39 phrases of any other length are rejected.
    pub fn parse(phrase: &str) -> Result<Self, CryptoError> {
        let normalized = phrase
            .split_whitespace()
            .map(str::to_lowercase)
            .collect::<Vec<_>>()
            .join(" ");
        let mnemonic = Mnemonic::parse_in_normalized(Language::English, &normalized)
            .map_err(|_| CryptoError::InvalidMnemonic)?;
        if mnemonic.word_count() != PHRASE_WORDS {
            return Err(CryptoError::InvalidMnemonic);
        }
        Ok(Self { mnemonic })
    }

    /// The phrase as space-separated words.
    pub fn phrase(&self) -> Zeroizing<String> {
        Zeroizing::new(self.mnemonic.to_string())
    }

    pub fn word_count(&self) -> usize {
        self.mnemonic.word_count()
    }

    /// Derive the 32-byte master seed.
    ///
    /// Uses the first half of the BIP-39 seed with an empty BIP-39 passphrase,
    /// so the same phrase always yields the same identity.
    pub fn to_seed(&self) -> Zeroizing<[u8; 32]> {
        let full = Zeroizing::new(self.mnemonic.to_seed(""));
        let mut seed = Zeroizing::new([0u8; 32]);
        seed.copy_from_slice(&full[..32]);
        seed
    }
}

impl std::fmt::Debug for RecoveryPhrase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecoveryPhrase")
            .field("words", &self.word_count())
            .finish_non_exhaustive()
    }
}
