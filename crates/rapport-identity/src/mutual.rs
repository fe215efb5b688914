//! Detect contacts transitioning into mutual verification.

use rapport_core::{ContactStatus, Observable, Subscription};
use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;

use crate::did::Identifier;
use crate::protocol::get_status;
use crate::verification::Verification;

/// Remembers the last observed status per contact and reports contacts that
/// newly became mutual.
///
/// Each contact is reported once per transition into `Mutual`. A contact that
/// drops out of `Mutual` and comes back is reported again.
#[derive(Debug, Clone)]
pub struct MutualTransitionTracker {
    me: Identifier,
    previous: HashMap<Identifier, ContactStatus>,
}

impl MutualTransitionTracker {
    pub fn new(me: Identifier) -> Self {
        Self {
            me,
            previous: HashMap::new(),
        }
    }

    /// Start from persisted statuses, e.g. after an app restart.
    pub fn with_previous(me: Identifier, previous: HashMap<Identifier, ContactStatus>) -> Self {
        Self { me, previous }
    }

    pub fn me(&self) -> &Identifier {
        &self.me
    }

    /// Statuses recorded so far, suitable for persisting.
    pub fn snapshot(&self) -> HashMap<Identifier, ContactStatus> {
        self.previous.clone()
    }

    /// Record current statuses without reporting anything.
    pub fn prime(&mut self, records: &[Verification]) {
        for peer in self.peers_in(records) {
            let status = get_status(&self.me, &peer, records);
            self.previous.insert(peer, status);
        }
    }

    /// Recompute every contact seen in `records` and return those that are
    /// mutual now but were not on the previous observation.
    pub fn observe(&mut self, records: &[Verification]) -> Vec<Identifier> {
        let mut newly_mutual = Vec::new();
        for peer in self.peers_in(records) {
            let status = get_status(&self.me, &peer, records);
            let before = self
                .previous
                .insert(peer.clone(), status)
                .unwrap_or(ContactStatus::None);
            if status.is_mutual() && !before.is_mutual() {
                tracing::info!(me = %self.me, peer = %peer, "contact became mutual");
                newly_mutual.push(peer);
            }
        }
        newly_mutual
    }

    pub fn status_of(&self, peer: &Identifier) -> ContactStatus {
        self.previous
            .get(peer)
            .copied()
            .unwrap_or(ContactStatus::None)
    }

    // Sorted so notifications within one batch come out in a stable order.
    fn peers_in(&self, records: &[Verification]) -> BTreeSet<Identifier> {
        records
            .iter()
            .filter_map(|v| {
                if v.from == self.me {
                    Some(v.to.clone())
                } else if v.to == self.me {
                    Some(v.from.clone())
                } else {
                    None
                }
            })
            .filter(|peer| peer != &self.me)
            .collect()
    }
}

/// Feed `source` into `tracker`, calling `on_mutual` once per new mutual contact.
///
/// The current value of `source` is processed immediately; later values are
/// processed as they are published.
pub fn watch_mutual<F>(
    source: &dyn Observable<Vec<Verification>>,
    tracker: MutualTransitionTracker,
    on_mutual: F,
) -> Subscription
where
    F: Fn(&Identifier) + Send + Sync + 'static,
{
    let tracker = Mutex::new(tracker);
    let process = move |records: &Vec<Verification>| {
        let fired = tracker
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .observe(records);
        for peer in &fired {
            on_mutual(peer);
        }
    };

    process(&source.get_value());
    source.subscribe(Box::new(process))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::IdentityManager;
    use crate::storage::MemorySeedStore;
    use rapport_core::{KdfConfig, ObservableValue};
    use std::sync::Arc;

    async fn unlocked() -> IdentityManager {
        let mut mgr =
            IdentityManager::new(Arc::new(MemorySeedStore::new()), KdfConfig::insecure_fast());
        mgr.create("pw", false).await.unwrap();
        mgr
    }

    fn id(mgr: &IdentityManager) -> Identifier {
        mgr.identifier().unwrap().clone()
    }

    fn record(from: &Identifier, to: &Identifier) -> Verification {
        Verification::new(from.clone(), to.clone())
    }

    #[tokio::test]
    async fn test_fires_once_on_transition() {
        let a = id(&unlocked().await);
        let b = id(&unlocked().await);
        let mut tracker = MutualTransitionTracker::new(b.clone());

        assert!(tracker.observe(&[record(&a, &b)]).is_empty());
        assert_eq!(tracker.status_of(&a), ContactStatus::Incoming);

        let both = vec![record(&a, &b), record(&b, &a)];
        assert_eq!(tracker.observe(&both), vec![a.clone()]);
        assert_eq!(tracker.status_of(&a), ContactStatus::Mutual);

        // Same data again: no second notification.
        assert!(tracker.observe(&both).is_empty());
    }

    #[tokio::test]
    async fn test_late_record_still_triggers() {
        let a = id(&unlocked().await);
        let b = id(&unlocked().await);
        let mut tracker = MutualTransitionTracker::new(a.clone());

        // Both directions arrive together, in reverse order.
        let fired = tracker.observe(&[record(&b, &a), record(&a, &b)]);
        assert_eq!(fired, vec![b]);
    }

    #[tokio::test]
    async fn test_independent_contacts() {
        let me = id(&unlocked().await);
        let x = id(&unlocked().await);
        let y = id(&unlocked().await);
        let z = id(&unlocked().await);
        let mut tracker = MutualTransitionTracker::new(me.clone());

        tracker.observe(&[record(&x, &me), record(&me, &x), record(&y, &me)]);
        assert_eq!(tracker.status_of(&x), ContactStatus::Mutual);

        let fired = tracker.observe(&[
            record(&x, &me),
            record(&me, &x),
            record(&y, &me),
            record(&me, &y),
            record(&z, &me),
            record(&me, &z),
        ]);
        let mut expected = vec![y, z];
        expected.sort();
        assert_eq!(fired, expected);
    }

    #[tokio::test]
    async fn test_prime_suppresses_existing_mutuals() {
        let a = id(&unlocked().await);
        let b = id(&unlocked().await);
        let both = vec![record(&a, &b), record(&b, &a)];

        let mut tracker = MutualTransitionTracker::new(a.clone());
        tracker.prime(&both);
        assert!(tracker.observe(&both).is_empty());

        let restored = MutualTransitionTracker::with_previous(a, tracker.snapshot());
        assert_eq!(restored.status_of(&b), ContactStatus::Mutual);
    }

    #[tokio::test]
    async fn test_unrelated_records_ignored() {
        let me = id(&unlocked().await);
        let p = id(&unlocked().await);
        let q = id(&unlocked().await);
        let mut tracker = MutualTransitionTracker::new(me);
        assert!(tracker.observe(&[record(&p, &q), record(&q, &p)]).is_empty());
        assert!(tracker.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_watch_mutual_over_observable() {
        let a = id(&unlocked().await);
        let b = id(&unlocked().await);
        let source = ObservableValue::new(vec![record(&a, &b)]);

        let hits = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&hits);
        let sub = watch_mutual(&source, MutualTransitionTracker::new(b.clone()), move |peer| {
            sink.lock().unwrap().push(peer.clone());
        });

        source.update(|records| records.push(record(&b, &a)));
        source.update(|records| records.push(record(&b, &a)));
        assert_eq!(*hits.lock().unwrap(), vec![a.clone()]);

        sub.unsubscribe();
        assert_eq!(source.subscriber_count(), 0);
    }
}
