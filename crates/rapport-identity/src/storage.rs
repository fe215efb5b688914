//! Durable storage contract for the passphrase-sealed master seed.

use async_trait::async_trait;
use rapport_core::TrustError;
use rapport_crypto::SealedBox;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Current [`SealedSeed`] record version.
pub const SEALED_SEED_VERSION: u8 = 1;

/// The only form in which key material reaches durable storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedSeed {
    pub version: u8,
    /// Argon2id salt, hex-encoded.
    pub salt: String,
    /// The 32-byte seed sealed under the passphrase-derived key.
    pub sealed: SealedBox,
}

/// Backend holding at most one sealed seed.
#[async_trait]
pub trait SeedStore: Send + Sync {
    async fn load(&self) -> Result<Option<SealedSeed>, TrustError>;

    async fn save(&self, seed: &SealedSeed) -> Result<(), TrustError>;

    async fn delete(&self) -> Result<(), TrustError>;
}

/// In-memory [`SeedStore`], shared between manager instances through an `Arc`.
#[derive(Default)]
pub struct MemorySeedStore {
    slot: RwLock<Option<SealedSeed>>,
}

impl MemorySeedStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SeedStore for MemorySeedStore {
    async fn load(&self) -> Result<Option<SealedSeed>, TrustError> {
        Ok(self.slot.read().await.clone())
    }

    async fn save(&self, seed: &SealedSeed) -> Result<(), TrustError> {
        *self.slot.write().await = Some(seed.clone());
        Ok(())
    }

    async fn delete(&self) -> Result<(), TrustError> {
        *self.slot.write().await = None;
        Ok(())
    }
}
