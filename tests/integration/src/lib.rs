//! Fixtures shared by the scenario tests.
//!
//! [`MemoryDiscovery`] behaves like the HTTP relay: publishes are stored as
//! signed envelopes and every resolve verifies them against the subject's
//! identifier. Failures and latency can be injected per field.

use async_trait::async_trait;
use dashmap::DashMap;
use rapport_core::{KdfConfig, SyncField, TrustError};
use rapport_crypto::verify_envelope;
use rapport_discovery::{AttestationSet, DiscoveryAdapter, VerificationSet};
use rapport_identity::{
    Attestation, Identifier, IdentityManager, MemorySeedStore, PublicProfile, Verification,
};
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};

/// Unlocked identity with a throwaway in-memory seed store.
pub async fn new_identity() -> IdentityManager {
    let mut identity =
        IdentityManager::new(Arc::new(MemorySeedStore::new()), KdfConfig::insecure_fast());
    identity
        .create("integration-passphrase", false)
        .await
        .expect("identity creation");
    identity
}

#[derive(Default)]
pub struct MemoryDiscovery {
    envelopes: DashMap<(Identifier, SyncField), String>,
    offline: AtomicBool,
    failing: DashMap<SyncField, ()>,
    publishes: DashMap<SyncField, usize>,
    profile_resolves: AtomicUsize,
    gate: Arc<RwLock<()>>,
}

impl MemoryDiscovery {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every call fails with `TransportFailure` while set.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Publishes of `field` fail while set.
    pub fn fail_publish(&self, field: SyncField, failing: bool) {
        if failing {
            self.failing.insert(field, ());
        } else {
            self.failing.remove(&field);
        }
    }

    /// Block all resolves until the returned guard is dropped.
    pub async fn hold(&self) -> OwnedRwLockWriteGuard<()> {
        Arc::clone(&self.gate).write_owned().await
    }

    pub fn publish_count(&self, field: SyncField) -> usize {
        self.publishes.get(&field).map(|n| *n).unwrap_or(0)
    }

    pub fn profile_resolves(&self) -> usize {
        self.profile_resolves.load(Ordering::SeqCst)
    }

    /// Raw envelope stored for `id`, if any.
    pub fn envelope(&self, id: &Identifier, field: SyncField) -> Option<String> {
        self.envelopes.get(&(id.clone(), field)).map(|e| e.clone())
    }

    /// Overwrite a stored envelope, e.g. with a forged one.
    pub fn inject_envelope(&self, id: &Identifier, field: SyncField, envelope: String) {
        self.envelopes.insert((id.clone(), field), envelope);
    }

    fn reachable(&self) -> Result<(), TrustError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(TrustError::TransportFailure("relay unreachable".into()))
        } else {
            Ok(())
        }
    }

    fn store<T: serde::Serialize>(
        &self,
        field: SyncField,
        payload: &T,
        identity: &IdentityManager,
    ) -> Result<(), TrustError> {
        *self.publishes.entry(field).or_insert(0) += 1;
        self.reachable()?;
        if self.failing.contains_key(&field) {
            return Err(TrustError::TransportFailure(format!("{} rejected", field)));
        }
        let id = identity.identifier()?.clone();
        let envelope = identity.sign_envelope(payload)?;
        self.envelopes.insert((id, field), envelope);
        Ok(())
    }

    async fn load<T: DeserializeOwned>(
        &self,
        id: &Identifier,
        field: SyncField,
    ) -> Result<Option<T>, TrustError> {
        let _open = self.gate.read().await;
        self.reachable()?;
        let Some(envelope) = self.envelope(id, field) else {
            return Ok(None);
        };
        verify_envelope::<T>(&envelope, &id.to_public_key()?)
            .into_payload()
            .map(Some)
            .ok_or_else(|| TrustError::CryptographicFailure(format!("bad envelope for {}", id)))
    }
}

#[async_trait]
impl DiscoveryAdapter for MemoryDiscovery {
    async fn publish_profile(
        &self,
        profile: &PublicProfile,
        identity: &IdentityManager,
    ) -> Result<(), TrustError> {
        self.store(SyncField::Profile, profile, identity)
    }

    async fn publish_verifications(
        &self,
        verifications: &[Verification],
        identity: &IdentityManager,
    ) -> Result<(), TrustError> {
        let set = VerificationSet {
            id: identity.identifier()?.clone(),
            verifications: verifications.to_vec(),
        };
        self.store(SyncField::Verifications, &set, identity)
    }

    async fn publish_attestations(
        &self,
        attestations: &[Attestation],
        identity: &IdentityManager,
    ) -> Result<(), TrustError> {
        let set = AttestationSet {
            id: identity.identifier()?.clone(),
            attestations: attestations.to_vec(),
        };
        self.store(SyncField::Attestations, &set, identity)
    }

    async fn resolve_profile(&self, id: &Identifier) -> Result<Option<PublicProfile>, TrustError> {
        self.profile_resolves.fetch_add(1, Ordering::SeqCst);
        self.load(id, SyncField::Profile).await
    }

    async fn resolve_verifications(
        &self,
        id: &Identifier,
    ) -> Result<Vec<Verification>, TrustError> {
        Ok(self
            .load::<VerificationSet>(id, SyncField::Verifications)
            .await?
            .map(|set| set.verifications)
            .unwrap_or_default())
    }

    async fn resolve_attestations(&self, id: &Identifier) -> Result<Vec<Attestation>, TrustError> {
        Ok(self
            .load::<AttestationSet>(id, SyncField::Attestations)
            .await?
            .map(|set| set.attestations)
            .unwrap_or_default())
    }
}
