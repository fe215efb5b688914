//! Local cache of remote participants' public trust data.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rapport_core::TrustError;
use rapport_identity::{Attestation, Identifier, PublicProfile, Verification};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

use crate::transport::ProfileSummary;

/// Summary row for one remote identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedGraphEntry {
    pub id: Identifier,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    pub verification_count: usize,
    pub attestation_count: usize,
    /// Distinct identities that verified `id`.
    #[serde(default)]
    pub verifier_ids: Vec<Identifier>,
    pub fetched_at: DateTime<Utc>,
    /// Written by a summary refresh with no detail rows behind it yet.
    /// Counts on a full entry may be newer than its `verifier_ids`.
    #[serde(default)]
    pub summary_only: bool,
}

impl CachedGraphEntry {
    /// Build a full entry from freshly resolved data.
    pub fn from_resolved(
        id: Identifier,
        profile: Option<&PublicProfile>,
        verifications: &[Verification],
        attestations: &[Attestation],
        fetched_at: DateTime<Utc>,
    ) -> Self {
        let verifier_ids: BTreeSet<Identifier> = verifications
            .iter()
            .filter(|v| v.to == id)
            .map(|v| v.from.clone())
            .collect();
        Self {
            name: profile.map(|p| p.name.clone()),
            bio: profile.and_then(|p| p.bio.clone()),
            avatar: profile.and_then(|p| p.avatar.clone()),
            verification_count: verifications.len(),
            attestation_count: attestations.len(),
            verifier_ids: verifier_ids.into_iter().collect(),
            fetched_at,
            summary_only: false,
            id,
        }
    }

    /// Whether the entry is at least `max_age` old at `now`.
    pub fn is_older_than(&self, max_age: Duration, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.fetched_at)
            .to_std()
            .map(|age| age >= max_age)
            .unwrap_or(false)
    }
}

/// Individual records behind a [`CachedGraphEntry`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedGraphDetails {
    pub verifications: Vec<Verification>,
    pub attestations: Vec<Attestation>,
}

/// Storage backend for the graph cache. Writes are last-writer-wins per id.
#[async_trait]
pub trait GraphCacheStore: Send + Sync {
    async fn get(&self, id: &Identifier) -> Result<Option<CachedGraphEntry>, TrustError>;

    async fn details(&self, id: &Identifier) -> Result<Option<CachedGraphDetails>, TrustError>;

    /// Replace the entry and its detail rows.
    async fn put(
        &self,
        entry: &CachedGraphEntry,
        details: &CachedGraphDetails,
    ) -> Result<(), TrustError>;

    /// Update name and counts only, keeping every other cached field and
    /// all detail rows. Returns the merged entry.
    async fn put_summary(
        &self,
        summary: &ProfileSummary,
        fetched_at: DateTime<Utc>,
    ) -> Result<CachedGraphEntry, TrustError>;

    async fn entries(&self) -> Result<Vec<CachedGraphEntry>, TrustError>;

    async fn remove(&self, id: &Identifier) -> Result<(), TrustError>;

    async fn clear(&self) -> Result<(), TrustError>;
}

#[derive(Default)]
pub struct MemoryGraphCacheStore {
    entries: DashMap<Identifier, CachedGraphEntry>,
    details: DashMap<Identifier, CachedGraphDetails>,
}

impl MemoryGraphCacheStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GraphCacheStore for MemoryGraphCacheStore {
    async fn get(&self, id: &Identifier) -> Result<Option<CachedGraphEntry>, TrustError> {
        Ok(self.entries.get(id).map(|e| e.clone()))
    }

    async fn details(&self, id: &Identifier) -> Result<Option<CachedGraphDetails>, TrustError> {
        Ok(self.details.get(id).map(|d| d.clone()))
    }

    async fn put(
        &self,
        entry: &CachedGraphEntry,
        details: &CachedGraphDetails,
    ) -> Result<(), TrustError> {
        self.entries.insert(entry.id.clone(), entry.clone());
        self.details.insert(entry.id.clone(), details.clone());
        Ok(())
    }

    async fn put_summary(
        &self,
        summary: &ProfileSummary,
        fetched_at: DateTime<Utc>,
    ) -> Result<CachedGraphEntry, TrustError> {
        let mut slot = self
            .entries
            .entry(summary.id.clone())
            .or_insert_with(|| CachedGraphEntry {
                id: summary.id.clone(),
                name: None,
                bio: None,
                avatar: None,
                verification_count: 0,
                attestation_count: 0,
                verifier_ids: Vec::new(),
                fetched_at,
                summary_only: true,
            });
        if summary.name.is_some() {
            slot.name = summary.name.clone();
        }
        slot.verification_count = summary.verification_count;
        slot.attestation_count = summary.attestation_count;
        slot.fetched_at = fetched_at;
        slot.summary_only = !self.details.contains_key(&summary.id);
        Ok(slot.value().clone())
    }

    async fn entries(&self) -> Result<Vec<CachedGraphEntry>, TrustError> {
        Ok(self.entries.iter().map(|e| e.value().clone()).collect())
    }

    async fn remove(&self, id: &Identifier) -> Result<(), TrustError> {
        self.entries.remove(id);
        self.details.remove(id);
        Ok(())
    }

    async fn clear(&self) -> Result<(), TrustError> {
        self.entries.clear();
        self.details.clear();
        Ok(())
    }
}
