//! Local identity: recovery phrase → seed → Ed25519 key pair → identifier.
//!
//! The manager is the single explicit context value threaded through every
//! signing operation. The private key lives only in memory while unlocked;
//! durable storage only ever sees the passphrase-sealed seed.

use rapport_core::{KdfConfig, TrustError};
use rapport_crypto::{
    derive_passphrase_key, derive_subkey, generate_salt, open, seal, sign, sign_envelope, KeyPair,
    PublicKey, RecoveryPhrase, Signature,
};
use serde::Serialize;
use std::sync::Arc;
use zeroize::Zeroizing;

use crate::did::Identifier;
use crate::storage::{SealedSeed, SeedStore, SEALED_SEED_VERSION};

/// Result of [`IdentityManager::create`]. The phrase must be shown to the user once.
pub struct CreatedIdentity {
    pub phrase: Zeroizing<String>,
    pub identifier: Identifier,
}

struct Unlocked {
    seed: Zeroizing<[u8; 32]>,
    keypair: KeyPair,
    identifier: Identifier,
}

impl Unlocked {
    fn from_seed(seed: Zeroizing<[u8; 32]>) -> Self {
        let keypair = KeyPair::from_seed(&seed);
        let identifier = Identifier::from_public_key(&keypair.public_key());
        Self {
            seed,
            keypair,
            identifier,
        }
    }
}

/// Owns the unlocked key pair and the seed store.
pub struct IdentityManager {
    store: Arc<dyn SeedStore>,
    kdf: KdfConfig,
    unlocked: Option<Unlocked>,
}

impl IdentityManager {
    pub fn new(store: Arc<dyn SeedStore>, kdf: KdfConfig) -> Self {
        Self {
            store,
            kdf,
            unlocked: None,
        }
    }

    /// Create a brand-new identity from a fresh 12-word phrase.
    pub async fn create(
        &mut self,
        passphrase: &str,
        persist: bool,
    ) -> Result<CreatedIdentity, TrustError> {
        let phrase = RecoveryPhrase::generate()?;
        let unlocked = Unlocked::from_seed(phrase.to_seed());
        let identifier = unlocked.identifier.clone();

        if persist {
            self.persist_seed(&unlocked.seed, passphrase).await?;
        }
        self.unlocked = Some(unlocked);

        tracing::info!(did = %identifier, persist, "identity created");
        Ok(CreatedIdentity {
            phrase: phrase.phrase(),
            identifier,
        })
    }

    /// Restore an identity from its recovery phrase.
    pub async fn unlock(
        &mut self,
        phrase: &str,
        passphrase: &str,
        persist: bool,
    ) -> Result<(), TrustError> {
        let phrase = RecoveryPhrase::parse(phrase)?;
        let unlocked = Unlocked::from_seed(phrase.to_seed());

        if persist {
            self.persist_seed(&unlocked.seed, passphrase).await?;
        }

        tracing::info!(did = %unlocked.identifier, persist, "identity unlocked from phrase");
        self.unlocked = Some(unlocked);
        Ok(())
    }

    /// Unlock with the passphrase-sealed seed held by the store.
    pub async fn unlock_from_storage(&mut self, passphrase: &str) -> Result<(), TrustError> {
        let record = self
            .store
            .load()
            .await?
            .ok_or_else(|| TrustError::StorageUnavailable("no stored identity".into()))?;
        if record.version != SEALED_SEED_VERSION {
            return Err(TrustError::StorageUnavailable(format!(
                "unsupported seed record version {}",
                record.version
            )));
        }
        let salt = hex::decode(&record.salt)
            .map_err(|e| TrustError::StorageUnavailable(format!("corrupt seed salt: {}", e)))?;

        let key = derive_key_blocking(passphrase, salt, self.kdf.clone()).await?;
        let plaintext = Zeroizing::new(open(&record.sealed, &key).map_err(|_| {
            TrustError::CryptographicFailure("wrong passphrase or corrupted seed".into())
        })?);

        let seed: [u8; 32] = plaintext.as_slice().try_into().map_err(|_| {
            TrustError::StorageUnavailable(format!(
                "stored seed has length {}, expected 32",
                plaintext.len()
            ))
        })?;
        let unlocked = Unlocked::from_seed(Zeroizing::new(seed));

        tracing::info!(did = %unlocked.identifier, "identity unlocked from storage");
        self.unlocked = Some(unlocked);
        Ok(())
    }

    /// Whether the store holds a sealed seed.
    pub async fn has_stored_identity(&self) -> Result<bool, TrustError> {
        Ok(self.store.load().await?.is_some())
    }

    pub fn is_unlocked(&self) -> bool {
        self.unlocked.is_some()
    }

    /// Drop the in-memory key pair.
    pub fn lock(&mut self) {
        if let Some(unlocked) = self.unlocked.take() {
            tracing::info!(did = %unlocked.identifier, "identity locked");
        }
    }

    /// Erase the sealed seed and lock.
    pub async fn delete_stored_identity(&mut self) -> Result<(), TrustError> {
        self.store.delete().await?;
        self.lock();
        tracing::info!("stored identity deleted");
        Ok(())
    }

    pub fn identifier(&self) -> Result<&Identifier, TrustError> {
        Ok(&self.require()?.identifier)
    }

    pub fn public_key(&self) -> Result<PublicKey, TrustError> {
        Ok(self.require()?.keypair.public_key())
    }

    /// Detached Ed25519 signature over raw bytes or a string.
    pub fn sign(&self, message: impl AsRef<[u8]>) -> Result<Signature, TrustError> {
        Ok(sign(message.as_ref(), &self.require()?.keypair))
    }

    /// Wrap `payload` in a signed envelope.
    pub fn sign_envelope<T: Serialize + ?Sized>(&self, payload: &T) -> Result<String, TrustError> {
        sign_envelope(payload, &self.require()?.keypair).map_err(TrustError::from)
    }

    /// Label-scoped sub-key for handing to an external persistence engine.
    pub fn derive_framework_key(&self, label: &str) -> Result<[u8; 32], TrustError> {
        Ok(derive_subkey(label, &self.require()?.seed))
    }

    fn require(&self) -> Result<&Unlocked, TrustError> {
        self.unlocked
            .as_ref()
            .ok_or_else(|| TrustError::CryptographicFailure("Identity not unlocked".into()))
    }

    async fn persist_seed(&self, seed: &[u8; 32], passphrase: &str) -> Result<(), TrustError> {
        let salt = generate_salt();
        let key = derive_key_blocking(passphrase, salt.to_vec(), self.kdf.clone()).await?;
        let sealed = seal(seed, &key)?;
        self.store
            .save(&SealedSeed {
                version: SEALED_SEED_VERSION,
                salt: hex::encode(salt),
                sealed,
            })
            .await
    }
}

/// Argon2id is CPU-bound; keep it off the async worker threads.
async fn derive_key_blocking(
    passphrase: &str,
    salt: Vec<u8>,
    config: KdfConfig,
) -> Result<Zeroizing<[u8; 32]>, TrustError> {
    let passphrase = Zeroizing::new(passphrase.as_bytes().to_vec());
    tokio::task::spawn_blocking(move || derive_passphrase_key(&passphrase, &salt, &config))
        .await
        .map_err(|e| TrustError::CryptographicFailure(format!("key derivation task failed: {}", e)))?
        .map_err(TrustError::from)
}
