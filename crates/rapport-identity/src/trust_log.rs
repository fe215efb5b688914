use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rapport_core::{ContactStatus, ObservableValue, TrustError};
use std::collections::BTreeSet;

use crate::attestation::Attestation;
use crate::did::Identifier;
use crate::protocol::get_status;
use crate::verification::Verification;

/// Signer plus the signer-chosen record id.
type RecordKey = (Identifier, String);

/// Append-only log of signed verification and attestation records.
///
/// Records are keyed by signer and id, so one signer reusing another's id
/// cannot shadow the other's record. Appending a key that is already present
/// is a no-op. There is no way to edit or remove a record. Indices are
/// derived on demand.
pub struct TrustLog {
    verifications: DashMap<RecordKey, Verification>,
    attestations: DashMap<RecordKey, Attestation>,
    watch: ObservableValue<Vec<Verification>>,
}

impl TrustLog {
    pub fn new() -> Self {
        Self {
            verifications: DashMap::new(),
            attestations: DashMap::new(),
            watch: ObservableValue::new(Vec::new()),
        }
    }

    /// Append a verification after checking its proof.
    ///
    /// Returns `Ok(false)` when the signer already has a record with this id.
    pub fn append_verification(&self, record: Verification) -> Result<bool, TrustError> {
        record.verify_proof()?;
        let inserted = match self.verifications.entry((record.from.clone(), record.id.clone())) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                tracing::debug!(id = %record.id, from = %record.from, to = %record.to, "verification appended");
                slot.insert(record);
                true
            }
        };
        if inserted {
            self.watch.set(self.all_verifications());
        }
        Ok(inserted)
    }

    /// Append an attestation after checking its proof.
    pub fn append_attestation(&self, record: Attestation) -> Result<bool, TrustError> {
        record.verify_proof()?;
        match self.attestations.entry((record.from.clone(), record.id.clone())) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                tracing::debug!(id = %record.id, from = %record.from, to = %record.to, "attestation appended");
                slot.insert(record);
                Ok(true)
            }
        }
    }

    /// Every verification, oldest first.
    pub fn all_verifications(&self) -> Vec<Verification> {
        let mut out: Vec<Verification> = self
            .verifications
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        sort_by_time(&mut out, |v| (v.timestamp, v.id.clone()));
        out
    }

    /// Verifications naming `subject` as the confirmed party.
    pub fn verifications_for(&self, subject: &Identifier) -> Vec<Verification> {
        let mut out: Vec<Verification> = self
            .verifications
            .iter()
            .filter(|entry| &entry.to == subject)
            .map(|entry| entry.value().clone())
            .collect();
        sort_by_time(&mut out, |v| (v.timestamp, v.id.clone()));
        out
    }

    /// Verifications signed by `confirmer`.
    pub fn verifications_by(&self, confirmer: &Identifier) -> Vec<Verification> {
        let mut out: Vec<Verification> = self
            .verifications
            .iter()
            .filter(|entry| &entry.from == confirmer)
            .map(|entry| entry.value().clone())
            .collect();
        sort_by_time(&mut out, |v| (v.timestamp, v.id.clone()));
        out
    }

    /// Distinct identities that have verified `subject`.
    pub fn verifier_ids(&self, subject: &Identifier) -> Vec<Identifier> {
        self.verifications
            .iter()
            .filter(|entry| &entry.to == subject)
            .map(|entry| entry.from.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn status_between(&self, me: &Identifier, peer: &Identifier) -> ContactStatus {
        let between: Vec<Verification> = self
            .verifications
            .iter()
            .filter(|entry| {
                (&entry.from == me && &entry.to == peer) || (&entry.from == peer && &entry.to == me)
            })
            .map(|entry| entry.value().clone())
            .collect();
        get_status(me, peer, &between)
    }

    /// Peers with verifications in both directions with `me`.
    pub fn mutual_contacts(&self, me: &Identifier) -> Vec<Identifier> {
        let outgoing: BTreeSet<Identifier> = self
            .verifications
            .iter()
            .filter(|entry| &entry.from == me)
            .map(|entry| entry.to.clone())
            .collect();
        let incoming: BTreeSet<Identifier> = self
            .verifications
            .iter()
            .filter(|entry| &entry.to == me)
            .map(|entry| entry.from.clone())
            .collect();
        outgoing.intersection(&incoming).cloned().collect()
    }

    /// Attestations about `subject`, oldest first.
    pub fn attestations_for(&self, subject: &Identifier) -> Vec<Attestation> {
        let mut out: Vec<Attestation> = self
            .attestations
            .iter()
            .filter(|entry| &entry.to == subject)
            .map(|entry| entry.value().clone())
            .collect();
        sort_by_time(&mut out, |a| (a.created_at, a.id.clone()));
        out
    }

    /// Newest attestation from `issuer` about `subject`. Later records
    /// supersede earlier ones without removing them.
    pub fn latest_attestation(
        &self,
        issuer: &Identifier,
        subject: &Identifier,
    ) -> Option<Attestation> {
        self.attestations
            .iter()
            .filter(|entry| &entry.from == issuer && &entry.to == subject)
            .max_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)))
            .map(|entry| entry.value().clone())
    }

    /// Observable view of every verification, republished on each append.
    pub fn watch_verifications(&self) -> ObservableValue<Vec<Verification>> {
        self.watch.clone()
    }

    pub fn verification_count(&self) -> usize {
        self.verifications.len()
    }

    pub fn attestation_count(&self) -> usize {
        self.attestations.len()
    }
}

impl Default for TrustLog {
    fn default() -> Self {
        Self::new()
    }
}

fn sort_by_time<T, K: Ord>(records: &mut [T], key: impl Fn(&T) -> K) {
    records.sort_by_key(|r| key(r));
}
