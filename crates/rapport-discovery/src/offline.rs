//! Offline-tolerant wrapper around a [`DiscoveryAdapter`].
//!
//! Publishes mark a per-field dirty flag before the network attempt and clear
//! it only on success, so nothing is lost while offline. Resolves fall back to
//! the last data seen.
//!
//! Every set/publish/clear sequence for one `(identifier, field)` runs under
//! that pair's lock, and each fresh publish bumps the pair's generation. A
//! retry only clears a flag whose generation it observed before reading the
//! data it republishes.

use async_trait::async_trait;
use dashmap::DashMap;
use rapport_core::{DirtyFields, SyncField, TrustError};
use rapport_identity::{Attestation, Identifier, IdentityManager, PublicProfile, Verification};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::sync_state::SyncStateStore;
use crate::transport::{DiscoveryAdapter, ProfileSummary};

/// Outcome of [`OfflineDiscovery::resolve_profile_with_source`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedProfile {
    pub profile: Option<PublicProfile>,
    /// The network was unreachable and `profile` is the last cached copy.
    pub from_cache: bool,
}

/// Local data to republish, read fresh at retry time.
///
/// A `None` field is skipped and stays dirty.
#[derive(Debug, Clone, Default)]
pub struct CurrentData {
    pub profile: Option<PublicProfile>,
    pub verifications: Option<Vec<Verification>>,
    pub attestations: Option<Vec<Attestation>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub published: Vec<SyncField>,
    pub failed: Vec<SyncField>,
    /// Dirty fields with no current data to publish, or superseded by a
    /// fresh publish while the pass was running.
    pub skipped: Vec<SyncField>,
    /// Flags still set after this pass.
    pub remaining: DirtyFields,
}

/// Per-field lock; the value is the publish generation.
type FieldGuard = Arc<Mutex<u64>>;

pub struct OfflineDiscovery {
    inner: Arc<dyn DiscoveryAdapter>,
    state: Arc<dyn SyncStateStore>,
    guards: DashMap<(Identifier, SyncField), FieldGuard>,
}

impl OfflineDiscovery {
    pub fn new(inner: Arc<dyn DiscoveryAdapter>, state: Arc<dyn SyncStateStore>) -> Self {
        Self {
            inner,
            state,
            guards: DashMap::new(),
        }
    }

    fn guard(&self, id: &Identifier, field: SyncField) -> FieldGuard {
        self.guards
            .entry((id.clone(), field))
            .or_default()
            .clone()
    }

    pub fn inner(&self) -> &Arc<dyn DiscoveryAdapter> {
        &self.inner
    }

    pub async fn dirty_fields(&self, id: &Identifier) -> Result<DirtyFields, TrustError> {
        self.state.get_dirty(id).await
    }

    /// Publish the profile. Never fails; returns whether it reached the network.
    pub async fn publish_profile(&self, profile: &PublicProfile, identity: &IdentityManager) -> bool {
        self.tracked(
            identity,
            SyncField::Profile,
            self.inner.publish_profile(profile, identity),
        )
        .await
    }

    pub async fn publish_verifications(
        &self,
        verifications: &[Verification],
        identity: &IdentityManager,
    ) -> bool {
        self.tracked(
            identity,
            SyncField::Verifications,
            self.inner.publish_verifications(verifications, identity),
        )
        .await
    }

    pub async fn publish_attestations(
        &self,
        attestations: &[Attestation],
        identity: &IdentityManager,
    ) -> bool {
        self.tracked(
            identity,
            SyncField::Attestations,
            self.inner.publish_attestations(attestations, identity),
        )
        .await
    }

    async fn tracked<Fut>(&self, identity: &IdentityManager, field: SyncField, attempt: Fut) -> bool
    where
        Fut: Future<Output = Result<(), TrustError>>,
    {
        let id = match identity.identifier() {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(field = %field, error = %e, "publish skipped: identity locked");
                return false;
            }
        };

        let guard = self.guard(id, field);
        let mut generation = guard.lock().await;
        *generation += 1;

        if let Err(e) = self.state.set_dirty(id, field, true).await {
            tracing::warn!(did = %id, field = %field, error = %e, "could not persist dirty flag");
        }

        match attempt.await {
            Ok(()) => {
                self.clear(id, field).await;
                tracing::info!(did = %id, field = %field, "published");
                true
            }
            Err(e) => {
                tracing::warn!(did = %id, field = %field, error = %e, "publish failed, left dirty");
                false
            }
        }
    }

    async fn clear(&self, id: &Identifier, field: SyncField) {
        if let Err(e) = self.state.set_dirty(id, field, false).await {
            tracing::warn!(did = %id, field = %field, error = %e, "could not clear dirty flag");
        }
    }

    /// Resolve a profile, falling back to the cache when the network fails.
    ///
    /// Transport failures with nothing cached are returned unchanged so the
    /// caller can tell "offline, stale data" from "offline, nothing".
    pub async fn resolve_profile_with_source(
        &self,
        id: &Identifier,
    ) -> Result<ResolvedProfile, TrustError> {
        match self.inner.resolve_profile(id).await {
            Ok(profile) => {
                if let Some(p) = &profile {
                    if let Err(e) = self.state.cache_profile(p).await {
                        tracing::warn!(did = %id, error = %e, "could not cache profile");
                    }
                }
                Ok(ResolvedProfile {
                    profile,
                    from_cache: false,
                })
            }
            Err(e) if e.is_transient() => match self.state.cached_profile(id).await {
                Ok(Some(cached)) => {
                    tracing::debug!(did = %id, error = %e, "serving cached profile");
                    Ok(ResolvedProfile {
                        profile: Some(cached),
                        from_cache: true,
                    })
                }
                _ => Err(e),
            },
            Err(e) => Err(e),
        }
    }

    /// Resolve verifications; never fails, degrading to cached or empty.
    pub async fn resolve_verifications_or_cached(&self, id: &Identifier) -> Vec<Verification> {
        match self.inner.resolve_verifications(id).await {
            Ok(records) => {
                if let Err(e) = self.state.cache_verifications(id, &records).await {
                    tracing::warn!(did = %id, error = %e, "could not cache verifications");
                }
                records
            }
            Err(e) => {
                tracing::debug!(did = %id, error = %e, "verifications unavailable, using cache");
                self.state
                    .cached_verifications(id)
                    .await
                    .ok()
                    .flatten()
                    .unwrap_or_default()
            }
        }
    }

    /// Resolve attestations; never fails, degrading to cached or empty.
    pub async fn resolve_attestations_or_cached(&self, id: &Identifier) -> Vec<Attestation> {
        match self.inner.resolve_attestations(id).await {
            Ok(records) => {
                if let Err(e) = self.state.cache_attestations(id, &records).await {
                    tracing::warn!(did = %id, error = %e, "could not cache attestations");
                }
                records
            }
            Err(e) => {
                tracing::debug!(did = %id, error = %e, "attestations unavailable, using cache");
                self.state
                    .cached_attestations(id)
                    .await
                    .ok()
                    .flatten()
                    .unwrap_or_default()
            }
        }
    }

    /// Retry every dirty field of `id`, clearing each flag independently.
    ///
    /// `get_current` is only called when something is dirty.
    pub async fn sync_pending<F, Fut>(
        &self,
        id: &Identifier,
        identity: &IdentityManager,
        get_current: F,
    ) -> Result<SyncReport, TrustError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = CurrentData>,
    {
        if identity.identifier()? != id {
            return Err(TrustError::MalformedInput(format!(
                "cannot sync {} with a different identity",
                id
            )));
        }

        let dirty = self.state.get_dirty(id).await?;
        let mut report = SyncReport::default();
        if dirty.is_clean() {
            return Ok(report);
        }

        let mut observed = Vec::new();
        for field in dirty.fields() {
            let generation = *self.guard(id, field).lock().await;
            observed.push((field, generation));
        }

        let current = get_current().await;
        for (field, seen) in observed {
            let guard = self.guard(id, field);
            let generation = guard.lock().await;
            if *generation != seen {
                tracing::debug!(did = %id, field = %field, "superseded by a newer publish");
                report.skipped.push(field);
                continue;
            }

            let attempt = match field {
                SyncField::Profile => match &current.profile {
                    Some(p) => Some(self.inner.publish_profile(p, identity).await),
                    None => None,
                },
                SyncField::Verifications => match &current.verifications {
                    Some(v) => Some(self.inner.publish_verifications(v, identity).await),
                    None => None,
                },
                SyncField::Attestations => match &current.attestations {
                    Some(a) => Some(self.inner.publish_attestations(a, identity).await),
                    None => None,
                },
            };

            match attempt {
                Some(Ok(())) => {
                    self.clear(id, field).await;
                    report.published.push(field);
                }
                Some(Err(e)) => {
                    tracing::debug!(did = %id, field = %field, error = %e, "retry failed");
                    report.failed.push(field);
                }
                None => report.skipped.push(field),
            }
        }

        report.remaining = self.state.get_dirty(id).await?;
        tracing::info!(
            did = %id,
            published = report.published.len(),
            remaining = report.remaining.fields().len(),
            "sync pass finished"
        );
        Ok(report)
    }

    /// Call [`Self::sync_pending`] every `interval` until `still_relevant`
    /// returns false. The check runs after every wait and every pass.
    pub async fn run_sync_loop<G, Fut, R>(
        &self,
        identity: &IdentityManager,
        interval: Duration,
        still_relevant: R,
        get_current: G,
    ) where
        G: Fn() -> Fut,
        Fut: Future<Output = CurrentData>,
        R: Fn() -> bool,
    {
        let id = match identity.identifier() {
            Ok(id) => id.clone(),
            Err(e) => {
                tracing::warn!(error = %e, "sync loop not started");
                return;
            }
        };

        while still_relevant() {
            if let Err(e) = self.sync_pending(&id, identity, &get_current).await {
                tracing::warn!(did = %id, error = %e, "sync pass failed");
            }
            if !still_relevant() {
                break;
            }
            tokio::time::sleep(interval).await;
        }
        tracing::debug!(did = %id, "sync loop stopped");
    }
}

#[async_trait]
impl DiscoveryAdapter for OfflineDiscovery {
    async fn publish_profile(
        &self,
        profile: &PublicProfile,
        identity: &IdentityManager,
    ) -> Result<(), TrustError> {
        OfflineDiscovery::publish_profile(self, profile, identity).await;
        Ok(())
    }

    async fn publish_verifications(
        &self,
        verifications: &[Verification],
        identity: &IdentityManager,
    ) -> Result<(), TrustError> {
        OfflineDiscovery::publish_verifications(self, verifications, identity).await;
        Ok(())
    }

    async fn publish_attestations(
        &self,
        attestations: &[Attestation],
        identity: &IdentityManager,
    ) -> Result<(), TrustError> {
        OfflineDiscovery::publish_attestations(self, attestations, identity).await;
        Ok(())
    }

    async fn resolve_profile(&self, id: &Identifier) -> Result<Option<PublicProfile>, TrustError> {
        Ok(self.resolve_profile_with_source(id).await?.profile)
    }

    async fn resolve_verifications(
        &self,
        id: &Identifier,
    ) -> Result<Vec<Verification>, TrustError> {
        Ok(self.resolve_verifications_or_cached(id).await)
    }

    async fn resolve_attestations(&self, id: &Identifier) -> Result<Vec<Attestation>, TrustError> {
        Ok(self.resolve_attestations_or_cached(id).await)
    }

    async fn resolve_summaries(
        &self,
        ids: &[Identifier],
    ) -> Result<Option<Vec<ProfileSummary>>, TrustError> {
        self.inner.resolve_summaries(ids).await
    }
}
