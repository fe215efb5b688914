//! Persisted sync state: dirty flags and last-known resolved data.

use async_trait::async_trait;
use dashmap::DashMap;
use rapport_core::{DirtyFields, SyncField, TrustError};
use rapport_identity::{Attestation, Identifier, PublicProfile, Verification};

/// Storage backend for the offline wrapper.
///
/// Implementations must survive process restarts; [`MemorySyncStateStore`]
/// is the in-process variant. Flag updates for one identifier must not be
/// lost under interleaving.
#[async_trait]
pub trait SyncStateStore: Send + Sync {
    async fn get_dirty(&self, id: &Identifier) -> Result<DirtyFields, TrustError>;

    async fn set_dirty(
        &self,
        id: &Identifier,
        field: SyncField,
        dirty: bool,
    ) -> Result<(), TrustError>;

    async fn cached_profile(&self, id: &Identifier) -> Result<Option<PublicProfile>, TrustError>;

    async fn cache_profile(&self, profile: &PublicProfile) -> Result<(), TrustError>;

    async fn cached_verifications(
        &self,
        id: &Identifier,
    ) -> Result<Option<Vec<Verification>>, TrustError>;

    async fn cache_verifications(
        &self,
        id: &Identifier,
        records: &[Verification],
    ) -> Result<(), TrustError>;

    async fn cached_attestations(
        &self,
        id: &Identifier,
    ) -> Result<Option<Vec<Attestation>>, TrustError>;

    async fn cache_attestations(
        &self,
        id: &Identifier,
        records: &[Attestation],
    ) -> Result<(), TrustError>;
}

#[derive(Default)]
pub struct MemorySyncStateStore {
    dirty: DashMap<Identifier, DirtyFields>,
    profiles: DashMap<Identifier, PublicProfile>,
    verifications: DashMap<Identifier, Vec<Verification>>,
    attestations: DashMap<Identifier, Vec<Attestation>>,
}

impl MemorySyncStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SyncStateStore for MemorySyncStateStore {
    async fn get_dirty(&self, id: &Identifier) -> Result<DirtyFields, TrustError> {
        Ok(self.dirty.get(id).map(|d| *d).unwrap_or_default())
    }

    async fn set_dirty(
        &self,
        id: &Identifier,
        field: SyncField,
        dirty: bool,
    ) -> Result<(), TrustError> {
        self.dirty
            .entry(id.clone())
            .or_default()
            .set(field, dirty);
        Ok(())
    }

    async fn cached_profile(&self, id: &Identifier) -> Result<Option<PublicProfile>, TrustError> {
        Ok(self.profiles.get(id).map(|p| p.clone()))
    }

    async fn cache_profile(&self, profile: &PublicProfile) -> Result<(), TrustError> {
        self.profiles.insert(profile.id.clone(), profile.clone());
        Ok(())
    }

    async fn cached_verifications(
        &self,
        id: &Identifier,
    ) -> Result<Option<Vec<Verification>>, TrustError> {
        Ok(self.verifications.get(id).map(|v| v.clone()))
    }

    async fn cache_verifications(
        &self,
        id: &Identifier,
        records: &[Verification],
    ) -> Result<(), TrustError> {
        self.verifications.insert(id.clone(), records.to_vec());
        Ok(())
    }

    async fn cached_attestations(
        &self,
        id: &Identifier,
    ) -> Result<Option<Vec<Attestation>>, TrustError> {
        Ok(self.attestations.get(id).map(|a| a.clone()))
    }

    async fn cache_attestations(
        &self,
        id: &Identifier,
        records: &[Attestation],
    ) -> Result<(), TrustError> {
        self.attestations.insert(id.clone(), records.to_vec());
        Ok(())
    }
}
