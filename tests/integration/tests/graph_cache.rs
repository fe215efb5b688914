//! Integration test: graph cache over a relay populated by real identities.

use std::sync::Arc;

use futures::future::join_all;
use rapport_core::{CacheConfig, DiscoveryEvent, Observable, SyncField};
use rapport_discovery::{DiscoveryAdapter, GraphCacheService, MemoryGraphCacheStore};
use rapport_identity::{confirm_and_respond, create_challenge, prepare_response, PublicProfile};
use rapport_integration_tests::{new_identity, MemoryDiscovery};

fn cache_over(relay: &Arc<MemoryDiscovery>) -> Arc<GraphCacheService> {
    Arc::new(GraphCacheService::new(
        relay.clone(),
        Arc::new(MemoryGraphCacheStore::new()),
        CacheConfig::default(),
    ))
}

#[tokio::test]
async fn test_concurrent_ensure_cached_single_fetch() {
    let sam = new_identity().await;
    let sam_id = sam.identifier().unwrap().clone();
    let relay = MemoryDiscovery::new();
    relay
        .publish_profile(&PublicProfile::new(sam_id.clone(), "Sam"), &sam)
        .await
        .unwrap();
    let cache = cache_over(&relay);

    let hold = relay.hold().await;
    let first_reads = join_all((0..8).map(|_| cache.ensure_cached(&sam_id))).await;
    assert!(first_reads.iter().all(Option::is_none));
    drop(hold);

    let entry = cache.refresh(&sam_id).await.unwrap();
    assert_eq!(entry.name.as_deref(), Some("Sam"));
    assert_eq!(relay.profile_resolves(), 1);
}

#[tokio::test]
async fn test_mutual_contacts_from_published_verifications() {
    let target = new_identity().await;
    let friend = new_identity().await;
    let other = new_identity().await;
    let target_id = target.identifier().unwrap().clone();
    let relay = MemoryDiscovery::new();

    // Friend scans the target's code; the target publishes what it received.
    let received = confirm_and_respond(
        &prepare_response(&create_challenge(&target, "Target").unwrap()).unwrap(),
        &friend,
    )
    .unwrap();
    relay
        .publish_verifications(&[received], &target)
        .await
        .unwrap();

    let cache = cache_over(&relay);
    let entry = cache.refresh(&target_id).await.unwrap();
    assert_eq!(entry.verification_count, 1);

    let my_contacts = vec![
        other.identifier().unwrap().clone(),
        friend.identifier().unwrap().clone(),
    ];
    assert_eq!(
        cache.find_mutual_contacts(&target_id, &my_contacts).await,
        vec![friend.identifier().unwrap().clone()]
    );
}

#[tokio::test]
async fn test_refresh_many_isolates_failures() {
    let good = new_identity().await;
    let forged = new_identity().await;
    let mallory = new_identity().await;
    let relay = MemoryDiscovery::new();
    relay
        .publish_profile(
            &PublicProfile::new(good.identifier().unwrap().clone(), "Good"),
            &good,
        )
        .await
        .unwrap();
    let forged_id = forged.identifier().unwrap().clone();
    relay.inject_envelope(
        &forged_id,
        SyncField::Profile,
        mallory
            .sign_envelope(&PublicProfile::new(forged_id.clone(), "Fake"))
            .unwrap(),
    );

    let cache = cache_over(&relay);
    let ids = vec![good.identifier().unwrap().clone(), forged_id.clone()];
    cache.refresh_many(&ids).await;

    let names = cache.resolve_names(&ids).await;
    assert_eq!(names.len(), 1);
    assert_eq!(
        names.get(good.identifier().unwrap()).map(String::as_str),
        Some("Good")
    );
    assert!(cache.cached(&forged_id).await.is_none());
}

#[tokio::test]
async fn test_push_event_updates_observers() {
    let sam = new_identity().await;
    let sam_id = sam.identifier().unwrap().clone();
    let relay = MemoryDiscovery::new();
    relay
        .publish_profile(&PublicProfile::new(sam_id.clone(), "Sam"), &sam)
        .await
        .unwrap();
    let cache = cache_over(&relay);
    cache.refresh(&sam_id).await;

    let watched = cache.observe(&sam_id).await;
    relay
        .publish_profile(&PublicProfile::new(sam_id.clone(), "Samantha"), &sam)
        .await
        .unwrap();
    cache
        .handle_event(&DiscoveryEvent::ProfileUpdated(sam_id.to_string()))
        .await;

    let current = watched.get_value().and_then(|e| e.name);
    assert_eq!(current.as_deref(), Some("Samantha"));
}

#[tokio::test]
async fn test_offline_relay_serves_cached_entry() {
    let sam = new_identity().await;
    let sam_id = sam.identifier().unwrap().clone();
    let relay = MemoryDiscovery::new();
    relay
        .publish_profile(&PublicProfile::new(sam_id.clone(), "Sam"), &sam)
        .await
        .unwrap();
    let cache = cache_over(&relay);
    let fresh = cache.refresh(&sam_id).await;

    relay.set_offline(true);
    assert_eq!(cache.refresh(&sam_id).await, fresh);
    assert_eq!(cache.ensure_cached(&sam_id).await, fresh);
}
