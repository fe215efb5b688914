//! Stale-while-revalidate cache over remote participants' trust data.

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{join_all, BoxFuture, FutureExt, Shared};
use rapport_core::{CacheConfig, DiscoveryEvent, ObservableValue, TrustError};
use rapport_identity::{Attestation, Identifier, Verification};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use crate::cache_store::{CachedGraphDetails, CachedGraphEntry, GraphCacheStore};
use crate::transport::DiscoveryAdapter;

type SharedRefresh = Shared<BoxFuture<'static, Option<CachedGraphEntry>>>;

/// Cache service for remote identifiers.
///
/// Reads are served from the local store. Network refreshes for one
/// identifier are coalesced: while a refresh is in flight, every other
/// request for that identifier joins it instead of fetching again.
pub struct GraphCacheService {
    adapter: Arc<dyn DiscoveryAdapter>,
    store: Arc<dyn GraphCacheStore>,
    config: CacheConfig,
    in_flight: DashMap<Identifier, SharedRefresh>,
    watchers: DashMap<Identifier, ObservableValue<Option<CachedGraphEntry>>>,
}

impl GraphCacheService {
    pub fn new(
        adapter: Arc<dyn DiscoveryAdapter>,
        store: Arc<dyn GraphCacheStore>,
        config: CacheConfig,
    ) -> Self {
        Self {
            adapter,
            store,
            config,
            in_flight: DashMap::new(),
            watchers: DashMap::new(),
        }
    }

    /// Cached entry, or `None`. Store errors are logged and read as a miss.
    pub async fn cached(&self, id: &Identifier) -> Option<CachedGraphEntry> {
        match self.store.get(id).await {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(did = %id, error = %e, "graph cache read failed");
                None
            }
        }
    }

    pub fn is_refreshing(&self, id: &Identifier) -> bool {
        self.in_flight.contains_key(id)
    }

    /// Missing, summary-only or older than the staleness threshold.
    fn needs_refresh(&self, entry: Option<&CachedGraphEntry>) -> bool {
        match entry {
            None => true,
            Some(e) => e.summary_only || e.is_older_than(self.config.stale_after(), Utc::now()),
        }
    }

    fn is_missing_or_old(&self, entry: Option<&CachedGraphEntry>) -> bool {
        entry.map_or(true, |e| e.is_older_than(self.config.stale_after(), Utc::now()))
    }

    /// Return the cached entry at once; refresh in the background when needed.
    pub async fn ensure_cached(self: &Arc<Self>, id: &Identifier) -> Option<CachedGraphEntry> {
        let cached = self.cached(id).await;
        if self.needs_refresh(cached.as_ref()) {
            tokio::spawn(self.start_refresh(id));
        }
        cached
    }

    /// Fetch profile, verifications and attestations and store the result.
    ///
    /// On any fetch failure the previously cached entry is returned.
    pub async fn refresh(self: &Arc<Self>, id: &Identifier) -> Option<CachedGraphEntry> {
        self.start_refresh(id).await
    }

    // Registration happens synchronously so callers racing on the same id
    // always find each other's refresh.
    fn start_refresh(self: &Arc<Self>, id: &Identifier) -> SharedRefresh {
        match self.in_flight.entry(id.clone()) {
            Entry::Occupied(running) => {
                tracing::debug!(did = %id, "joining in-flight refresh");
                running.get().clone()
            }
            Entry::Vacant(slot) => {
                let this = Arc::clone(self);
                let key = id.clone();
                let refresh = async move {
                    let entry = this.fetch_and_store(&key).await;
                    this.in_flight.remove(&key);
                    entry
                }
                .boxed()
                .shared();
                slot.insert(refresh.clone());
                refresh
            }
        }
    }

    async fn fetch_and_store(&self, id: &Identifier) -> Option<CachedGraphEntry> {
        tracing::debug!(did = %id, "refreshing graph entry");
        let (profile, verifications, attestations) = tokio::join!(
            self.adapter.resolve_profile(id),
            self.adapter.resolve_verifications(id),
            self.adapter.resolve_attestations(id),
        );

        let (profile, verifications, attestations) = match (profile, verifications, attestations)
        {
            (Ok(p), Ok(v), Ok(a)) => (p, v, a),
            (p, v, a) => {
                let reason = p
                    .err()
                    .or(v.err())
                    .or(a.err())
                    .map(|e| e.to_string())
                    .unwrap_or_default();
                tracing::warn!(did = %id, error = %reason, "graph refresh failed, keeping cached entry");
                return self.cached(id).await;
            }
        };

        let profile = profile.filter(|p| {
            let matches = &p.id == id;
            if !matches {
                tracing::warn!(did = %id, embedded = %p.id, "dropping profile for another identifier");
            }
            matches
        });
        let verifications = valid_verifications(id, verifications);
        let attestations = valid_attestations(id, attestations);

        let entry = CachedGraphEntry::from_resolved(
            id.clone(),
            profile.as_ref(),
            &verifications,
            &attestations,
            Utc::now(),
        );
        let details = CachedGraphDetails {
            verifications,
            attestations,
        };

        if let Err(e) = self.store.put(&entry, &details).await {
            tracing::warn!(did = %id, error = %e, "graph cache write failed");
            return self.cached(id).await;
        }
        self.notify(id, Some(entry.clone()));
        Some(entry)
    }

    /// Refresh the stale or missing identifiers among `ids`, `batch_size`
    /// at a time. Returns the identifiers that were refreshed.
    pub async fn refresh_many(self: &Arc<Self>, ids: &[Identifier]) -> Vec<Identifier> {
        let mut pending = Vec::new();
        let mut seen = HashSet::new();
        for id in ids {
            if seen.insert(id) && self.needs_refresh(self.cached(id).await.as_ref()) {
                pending.push(id.clone());
            }
        }

        for batch in pending.chunks(self.config.batch_size.max(1)) {
            join_all(batch.iter().map(|id| self.refresh(id))).await;
        }
        pending
    }

    /// Update names and counts in one call when the transport supports it,
    /// otherwise fall back to [`Self::refresh_many`]. Detail rows survive.
    pub async fn refresh_summaries(self: &Arc<Self>, ids: &[Identifier]) {
        let mut pending = Vec::new();
        for id in ids {
            if !pending.contains(id) && self.is_missing_or_old(self.cached(id).await.as_ref()) {
                pending.push(id.clone());
            }
        }
        if pending.is_empty() {
            return;
        }

        match self.adapter.resolve_summaries(&pending).await {
            Ok(Some(rows)) => {
                let wanted: HashSet<&Identifier> = pending.iter().collect();
                let now = Utc::now();
                for row in rows.iter().filter(|r| wanted.contains(&r.id)) {
                    match self.store.put_summary(row, now).await {
                        Ok(entry) => self.notify(&row.id, Some(entry)),
                        Err(e) => tracing::warn!(did = %row.id, error = %e, "summary write failed"),
                    }
                }
            }
            Ok(None) => {
                tracing::debug!(count = pending.len(), "no summary endpoint, refreshing in full");
                self.refresh_many(&pending).await;
            }
            Err(e) => {
                tracing::warn!(count = pending.len(), error = %e, "summary refresh failed");
            }
        }
    }

    /// Cached display name. Never touches the network.
    pub async fn resolve_name(&self, id: &Identifier) -> Option<String> {
        self.cached(id).await.and_then(|e| e.name)
    }

    /// Cached display names; unresolved identifiers are omitted.
    pub async fn resolve_names(&self, ids: &[Identifier]) -> HashMap<Identifier, String> {
        let mut names = HashMap::new();
        for id in ids {
            if let Some(name) = self.resolve_name(id).await {
                names.insert(id.clone(), name);
            }
        }
        names
    }

    /// Contacts of the caller who have verified `target`, in `my_contacts` order.
    pub async fn find_mutual_contacts(
        &self,
        target: &Identifier,
        my_contacts: &[Identifier],
    ) -> Vec<Identifier> {
        let Some(entry) = self.cached(target).await else {
            return Vec::new();
        };
        let verifiers: BTreeSet<&Identifier> = entry.verifier_ids.iter().collect();
        let mut seen = HashSet::new();
        my_contacts
            .iter()
            .filter(|c| verifiers.contains(c) && seen.insert(*c))
            .cloned()
            .collect()
    }

    /// Case-insensitive substring search over cached names, bios and
    /// attestation claims. Results are ordered by name.
    pub async fn search(&self, text: &str) -> Vec<CachedGraphEntry> {
        let needle = text.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }

        let entries = match self.store.entries().await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(error = %e, "graph cache scan failed");
                return Vec::new();
            }
        };

        let mut hits = Vec::new();
        for entry in entries {
            if field_matches(entry.name.as_deref(), &needle)
                || field_matches(entry.bio.as_deref(), &needle)
                || self.claims_match(&entry.id, &needle).await
            {
                hits.push(entry);
            }
        }
        hits.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        hits
    }

    async fn claims_match(&self, id: &Identifier, needle: &str) -> bool {
        match self.store.details(id).await {
            Ok(Some(details)) => details
                .attestations
                .iter()
                .any(|a| &a.to == id && a.claim.to_lowercase().contains(needle)),
            _ => false,
        }
    }

    /// Cached detail rows for `id`.
    pub async fn details(&self, id: &Identifier) -> Option<CachedGraphDetails> {
        self.store.details(id).await.ok().flatten()
    }

    pub async fn evict(&self, id: &Identifier) -> Result<(), TrustError> {
        self.store.remove(id).await?;
        self.notify(id, None);
        Ok(())
    }

    pub async fn clear(&self) -> Result<(), TrustError> {
        self.store.clear().await?;
        let watched: Vec<ObservableValue<Option<CachedGraphEntry>>> =
            self.watchers.iter().map(|w| w.value().clone()).collect();
        for watcher in watched {
            watcher.set(None);
        }
        Ok(())
    }

    /// React to a push notification by re-resolving its subject.
    pub async fn handle_event(self: &Arc<Self>, event: &DiscoveryEvent) -> Option<CachedGraphEntry> {
        match Identifier::parse(event.subject()) {
            Ok(id) => {
                tracing::debug!(did = %id, event = ?event, "discovery event");
                self.refresh(&id).await
            }
            Err(e) => {
                tracing::warn!(subject = event.subject(), error = %e, "ignoring event with bad subject");
                None
            }
        }
    }

    /// Observable view of one identifier's cache entry, updated on every write.
    pub async fn observe(&self, id: &Identifier) -> ObservableValue<Option<CachedGraphEntry>> {
        if let Some(existing) = self.watchers.get(id) {
            return existing.value().clone();
        }
        let current = self.cached(id).await;
        self.watchers
            .entry(id.clone())
            .or_insert_with(|| ObservableValue::new(current))
            .value()
            .clone()
    }

    fn notify(&self, id: &Identifier, entry: Option<CachedGraphEntry>) {
        // Clone out of the map first; subscribers may call back into the service.
        let watcher = self.watchers.get(id).map(|w| w.value().clone());
        if let Some(watcher) = watcher {
            watcher.set(entry);
        }
    }
}

fn field_matches(field: Option<&str>, needle: &str) -> bool {
    field.is_some_and(|f| f.to_lowercase().contains(needle))
}

fn valid_verifications(id: &Identifier, records: Vec<Verification>) -> Vec<Verification> {
    records
        .into_iter()
        .filter(|v| match (&v.to == id, v.verify_proof()) {
            (true, Ok(())) => true,
            (about, proof) => {
                tracing::warn!(
                    did = %id,
                    record = %v.id,
                    about_subject = about,
                    proof_ok = proof.is_ok(),
                    "dropping invalid verification"
                );
                false
            }
        })
        .collect()
}

fn valid_attestations(id: &Identifier, records: Vec<Attestation>) -> Vec<Attestation> {
    records
        .into_iter()
        .filter(|a| match (&a.to == id, a.verify_proof()) {
            (true, Ok(())) => true,
            (about, proof) => {
                tracing::warn!(
                    did = %id,
                    record = %a.id,
                    about_subject = about,
                    proof_ok = proof.is_ok(),
                    "dropping invalid attestation"
                );
                false
            }
        })
        .collect()
}
