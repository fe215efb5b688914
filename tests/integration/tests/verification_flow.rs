//! Integration test: identity restore, in-person verification and mutual
//! detection across the identity and discovery layers.

use std::sync::{Arc, Mutex};

use rapport_core::{ContactStatus, KdfConfig, SyncField};
use rapport_discovery::{DiscoveryAdapter, MemorySyncStateStore, OfflineDiscovery};
use rapport_identity::{
    confirm_and_respond, create_challenge, get_status, prepare_response, watch_mutual,
    IdentityManager, MemorySeedStore, MutualTransitionTracker, SessionState, TrustLog,
    VerificationSession,
};
use rapport_integration_tests::{new_identity, MemoryDiscovery};

const PASSPHRASE: &str = "correct-horse-battery-staple";

// =========================================================================
// Identity
// =========================================================================

#[tokio::test]
async fn test_same_phrase_restores_same_identifier() {
    let mut original =
        IdentityManager::new(Arc::new(MemorySeedStore::new()), KdfConfig::insecure_fast());
    let created = original.create(PASSPHRASE, true).await.unwrap();

    let mut restored =
        IdentityManager::new(Arc::new(MemorySeedStore::new()), KdfConfig::insecure_fast());
    restored
        .unlock(created.phrase.as_str(), PASSPHRASE, true)
        .await
        .unwrap();

    assert_eq!(restored.identifier().unwrap(), &created.identifier);
    assert_eq!(
        restored.public_key().unwrap().as_bytes(),
        original.public_key().unwrap().as_bytes()
    );
}

#[tokio::test]
async fn test_storage_unlock_after_restart() {
    let store = Arc::new(MemorySeedStore::new());
    let mut first = IdentityManager::new(store.clone(), KdfConfig::insecure_fast());
    let created = first.create(PASSPHRASE, true).await.unwrap();
    first.lock();

    // A fresh manager over the same store, as after an app restart.
    let mut second = IdentityManager::new(store, KdfConfig::insecure_fast());
    assert!(second.has_stored_identity().await.unwrap());
    assert!(second.unlock_from_storage("wrong passphrase").await.is_err());
    second.unlock_from_storage(PASSPHRASE).await.unwrap();
    assert_eq!(second.identifier().unwrap(), &created.identifier);
}

// =========================================================================
// Challenge-response
// =========================================================================

#[tokio::test]
async fn test_scanner_signs_for_code_owner() {
    let alice = new_identity().await;
    let bob = new_identity().await;

    let code = create_challenge(&alice, "Alice").unwrap();
    let challenge = prepare_response(&code).unwrap();
    let verification = confirm_and_respond(&challenge, &bob).unwrap();

    assert_eq!(&verification.from, bob.identifier().unwrap());
    assert_eq!(&verification.to, alice.identifier().unwrap());
    verification.verify_proof().unwrap();
}

#[tokio::test]
async fn test_mutual_scenario_fires_once() {
    let a = new_identity().await;
    let b = new_identity().await;
    let (a_id, b_id) = (a.identifier().unwrap().clone(), b.identifier().unwrap().clone());

    // B's view of the trust log.
    let log = TrustLog::new();
    let hits = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&hits);
    let _sub = watch_mutual(
        &log.watch_verifications(),
        MutualTransitionTracker::new(b_id.clone()),
        move |peer| sink.lock().unwrap().push(peer.clone()),
    );

    // A scans B's code: A→B.
    let a_to_b = confirm_and_respond(
        &prepare_response(&create_challenge(&b, "B").unwrap()).unwrap(),
        &a,
    )
    .unwrap();
    log.append_verification(a_to_b.clone()).unwrap();
    assert_eq!(log.status_between(&b_id, &a_id), ContactStatus::Incoming);
    assert!(hits.lock().unwrap().is_empty());

    // B scans A's code: B→A.
    let b_to_a = confirm_and_respond(
        &prepare_response(&create_challenge(&a, "A").unwrap()).unwrap(),
        &b,
    )
    .unwrap();
    log.append_verification(b_to_a.clone()).unwrap();
    assert_eq!(log.status_between(&b_id, &a_id), ContactStatus::Mutual);

    // Replays change nothing.
    log.append_verification(a_to_b.clone()).unwrap();
    log.append_verification(b_to_a.clone()).unwrap();
    assert_eq!(*hits.lock().unwrap(), vec![a_id.clone()]);

    // Order of the record set does not matter.
    assert_eq!(
        get_status(&b_id, &a_id, &[b_to_a.clone(), a_to_b.clone()]),
        get_status(&b_id, &a_id, &[a_to_b, b_to_a])
    );
}

#[tokio::test]
async fn test_session_delivers_through_discovery() {
    let alice = new_identity().await;
    let bob = new_identity().await;
    let relay = MemoryDiscovery::new();
    let offline = OfflineDiscovery::new(relay.clone(), Arc::new(MemorySyncStateStore::new()));

    let mut shown = VerificationSession::new();
    let code = shown.initiate(&alice, "Alice").unwrap();

    let mut scanner = VerificationSession::new();
    scanner.scan(&code).unwrap();
    let verification = scanner
        .confirm(&bob, |v| {
            let offline = &offline;
            let bob = &bob;
            async move {
                offline.publish_verifications(&[v], bob).await;
                Ok(())
            }
        })
        .await
        .unwrap();
    assert_eq!(scanner.state(), SessionState::Done);
    assert_eq!(relay.publish_count(SyncField::Verifications), 1);

    // Anyone can resolve and check Bob's published statement.
    let resolved = relay
        .resolve_verifications(bob.identifier().unwrap())
        .await
        .unwrap();
    assert_eq!(resolved, vec![verification]);
    resolved[0].verify_proof().unwrap();
}

#[tokio::test]
async fn test_garbage_code_is_malformed_input() {
    let mut session = VerificationSession::new();
    for code in ["", "not base64 at all!", "e30=", "aGVsbG8="] {
        session.reset();
        let err = session.scan(code).unwrap_err();
        assert!(err.requires_user_action());
        assert_eq!(session.state(), SessionState::Error);
    }
}
