//! Integration test: publishing through the offline wrapper while the relay
//! is unreachable, then catching up.

use std::sync::Arc;
use std::time::Duration;

use rapport_core::{RapportConfig, SyncField, TrustError};
use rapport_discovery::{CurrentData, MemorySyncStateStore, OfflineDiscovery, SyncStateStore};
use rapport_identity::{Attestation, PublicProfile};
use rapport_integration_tests::{new_identity, MemoryDiscovery};

#[tokio::test]
async fn test_offline_publish_then_sync() {
    let me = new_identity().await;
    let id = me.identifier().unwrap().clone();
    let relay = MemoryDiscovery::new();
    let state = Arc::new(MemorySyncStateStore::new());
    let offline = OfflineDiscovery::new(relay.clone(), state.clone());

    relay.set_offline(true);
    let profile = PublicProfile::new(id.clone(), "Rui");
    assert!(!offline.publish_profile(&profile, &me).await);

    let dirty = state.get_dirty(&id).await.unwrap();
    assert_eq!(dirty.fields(), vec![SyncField::Profile]);

    relay.set_offline(false);
    let report = offline
        .sync_pending(&id, &me, || async {
            CurrentData {
                profile: Some(profile.clone()),
                ..CurrentData::default()
            }
        })
        .await
        .unwrap();

    assert_eq!(report.published, vec![SyncField::Profile]);
    assert!(report.remaining.is_clean());
    assert!(state.get_dirty(&id).await.unwrap().is_clean());

    let resolved = offline.resolve_profile_with_source(&id).await.unwrap();
    assert_eq!(resolved.profile, Some(profile));
    assert!(!resolved.from_cache);
}

#[tokio::test]
async fn test_partial_sync_leaves_failed_field_dirty() {
    let me = new_identity().await;
    let id = me.identifier().unwrap().clone();
    let relay = MemoryDiscovery::new();
    let offline = OfflineDiscovery::new(relay.clone(), Arc::new(MemorySyncStateStore::new()));

    relay.set_offline(true);
    let profile = PublicProfile::new(id.clone(), "Rui");
    offline.publish_profile(&profile, &me).await;
    offline.publish_verifications(&[], &me).await;

    relay.set_offline(false);
    relay.fail_publish(SyncField::Verifications, true);
    let report = offline
        .sync_pending(&id, &me, || async {
            CurrentData {
                profile: Some(profile.clone()),
                verifications: Some(Vec::new()),
                attestations: None,
            }
        })
        .await
        .unwrap();

    assert_eq!(report.published, vec![SyncField::Profile]);
    assert_eq!(report.failed, vec![SyncField::Verifications]);
    assert_eq!(
        offline.dirty_fields(&id).await.unwrap().fields(),
        vec![SyncField::Verifications]
    );
}

#[tokio::test]
async fn test_retry_reads_current_data() {
    let me = new_identity().await;
    let id = me.identifier().unwrap().clone();
    let friend = new_identity().await;
    let relay = MemoryDiscovery::new();
    let offline = OfflineDiscovery::new(relay.clone(), Arc::new(MemorySyncStateStore::new()));

    relay.set_offline(true);
    offline.publish_attestations(&[], &me).await;

    // Something new arrived while offline.
    let latest = vec![
        Attestation::new(friend.identifier().unwrap().clone(), id.clone(), "Kind neighbour")
            .issue(&friend)
            .unwrap(),
    ];

    relay.set_offline(false);
    offline
        .sync_pending(&id, &me, || async {
            CurrentData {
                attestations: Some(latest.clone()),
                ..CurrentData::default()
            }
        })
        .await
        .unwrap();

    let published = offline.resolve_attestations_or_cached(&id).await;
    assert_eq!(published, latest);
}

#[tokio::test]
async fn test_resolve_distinguishes_stale_from_nothing() {
    let me = new_identity().await;
    let stranger = new_identity().await;
    let id = me.identifier().unwrap().clone();
    let relay = MemoryDiscovery::new();
    let offline = OfflineDiscovery::new(relay.clone(), Arc::new(MemorySyncStateStore::new()));

    offline
        .publish_profile(&PublicProfile::new(id.clone(), "Rui"), &me)
        .await;
    offline.resolve_profile_with_source(&id).await.unwrap();

    relay.set_offline(true);
    let stale = offline.resolve_profile_with_source(&id).await.unwrap();
    assert!(stale.from_cache);
    assert_eq!(stale.profile.map(|p| p.name).as_deref(), Some("Rui"));

    let nothing = offline
        .resolve_profile_with_source(stranger.identifier().unwrap())
        .await
        .unwrap_err();
    assert!(matches!(nothing, TrustError::TransportFailure(_)));

    assert!(offline
        .resolve_verifications_or_cached(stranger.identifier().unwrap())
        .await
        .is_empty());
}

#[tokio::test]
async fn test_forged_envelope_is_not_served_from_network() {
    let me = new_identity().await;
    let mallory = new_identity().await;
    let id = me.identifier().unwrap().clone();
    let relay = MemoryDiscovery::new();
    let offline = OfflineDiscovery::new(relay.clone(), Arc::new(MemorySyncStateStore::new()));

    let forged = mallory
        .sign_envelope(&PublicProfile::new(id.clone(), "Definitely Rui"))
        .unwrap();
    relay.inject_envelope(&id, SyncField::Profile, forged);

    let err = offline.resolve_profile_with_source(&id).await.unwrap_err();
    assert!(matches!(err, TrustError::CryptographicFailure(_)));
}

#[tokio::test]
async fn test_background_loop_catches_up() {
    let me = new_identity().await;
    let id = me.identifier().unwrap().clone();
    let relay = MemoryDiscovery::new();
    let offline = Arc::new(OfflineDiscovery::new(
        relay.clone(),
        Arc::new(MemorySyncStateStore::new()),
    ));

    relay.set_offline(true);
    let profile = PublicProfile::new(id.clone(), "Rui");
    offline.publish_profile(&profile, &me).await;
    relay.set_offline(false);

    let mut config = RapportConfig::default();
    config.sync.retry_interval_secs = 0;

    let relay_for_check = relay.clone();
    offline
        .run_sync_loop(
            &me,
            config.sync.retry_interval().max(Duration::from_millis(1)),
            move || relay_for_check.publish_count(SyncField::Profile) < 2,
            || {
                let profile = profile.clone();
                async move {
                    CurrentData {
                        profile: Some(profile),
                        ..CurrentData::default()
                    }
                }
            },
        )
        .await;

    assert!(offline.dirty_fields(&id).await.unwrap().is_clean());
    assert_eq!(relay.publish_count(SyncField::Profile), 2);
}
