// /////////////////////////////////////////////////////////////////////////////
// Hive2Hive RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Cross-user sharing and notification tests: share-then-update by the
//! friend, and lazy pruning of unfriendly logouts.

mod common;

use std::path::Path;

use common::{login_node, registered_node, test_config, write_file};
use hive2hive::application::services::LocationsManager;
use hive2hive::infrastructure::adapters::MemoryDht;
use hive2hive::H2HNode;
use hive2hive_domain::entities::PermissionType;
use hive2hive_domain::ports::DataManager;
use hive2hive_domain::{ContentHash, ProcessId, UserId};

async fn profile_of(node: &H2HNode) -> hive2hive_domain::entities::UserProfile {
    node.session()
        .unwrap()
        .profile_manager()
        .get_user_profile(ProcessId::generate(), false)
        .await
        .unwrap()
}

/// A shares a folder with B (write); B updates a file inside it; A's
/// next profile read carries B's digest.
#[tokio::test(flavor = "multi_thread")]
async fn test_share_then_update_by_friend() {
    let overlay = MemoryDht::new();
    let (alice, alice_root) = registered_node(&overlay, test_config(), "alice", "alice-laptop").await;
    let (bob, bob_root) = registered_node(&overlay, test_config(), "bob", "bob-laptop").await;

    // Alice synchronizes a folder with one file
    std::fs::create_dir_all(alice_root.path().join("shared")).unwrap();
    alice.add_file(alice_root.path().join("shared")).await.unwrap();
    let alice_file = write_file(alice_root.path(), "shared/plan.txt", b"alice's first draft");
    alice.add_file(alice_file).await.unwrap();

    // The grant lands in Bob's profile through his message handler
    alice
        .share_folder(
            alice_root.path().join("shared"),
            UserId::new("bob").unwrap(),
            PermissionType::Write,
        )
        .await
        .unwrap();

    let bob_profile = profile_of(&bob).await;
    let shared = bob_profile.root().node_at(Path::new("shared")).unwrap();
    assert!(shared.as_folder().is_some());
    assert!(bob_profile.root().node_at(Path::new("shared/plan.txt")).is_some());

    // Bob materializes the file, changes it, and commits a new version
    let bob_file = bob_root.path().join("shared/plan.txt");
    assert!(bob.download_file(bob_file.clone()).await.unwrap());
    assert_eq!(std::fs::read(&bob_file).unwrap(), b"alice's first draft");

    let new_content = b"bob's revision".to_vec();
    std::fs::write(&bob_file, &new_content).unwrap();
    bob.update_file(bob_file).await.unwrap();

    // Alice's profile reflects Bob's version after the notification
    let alice_profile = profile_of(&alice).await;
    let file = alice_profile
        .root()
        .node_at(Path::new("shared/plan.txt"))
        .unwrap()
        .as_file()
        .unwrap();
    assert_eq!(file.md5(), &ContentHash::of_bytes(&new_content));

    // And Alice can pull the bytes themselves
    let alice_file = alice_root.path().join("shared/plan.txt");
    assert!(alice.download_file(alice_file.clone()).await.unwrap());
    assert_eq!(std::fs::read(&alice_file).unwrap(), new_content);
}

/// A peer that silently died keeps denying messages; the notifier
/// falls back to the remaining peers and prunes the dead entry from
/// the locations set.
#[tokio::test(flavor = "multi_thread")]
async fn test_unfriendly_logout_pruned_on_notification() {
    let overlay = MemoryDht::new();
    let (p0, p0_root) = registered_node(&overlay, test_config(), "alice", "p0").await;
    let (p1, _p1_root) = login_node(&overlay, test_config(), "alice", "p1").await;
    let (p2, _p2_root) = login_node(&overlay, test_config(), "alice", "p2").await;

    let alice = UserId::new("alice").unwrap();
    let dht: std::sync::Arc<dyn DataManager> = std::sync::Arc::new(overlay.clone());
    let locations = LocationsManager::new(dht, None);
    assert_eq!(locations.get(&alice).await.unwrap().entries().len(), 3);

    // p1 dies without logging out
    overlay.deny_messages(p1.peer_address());

    // Any committed operation notifies the user's other peers and
    // detects the dead one
    let path = write_file(p0_root.path(), "news.txt", b"fresh");
    p0.add_file(path).await.unwrap();

    let after = locations.get(&alice).await.unwrap();
    assert_eq!(after.entries().len(), 2);
    assert!(after.entries().iter().all(|e| e.peer() != p1.peer_address()));
    assert!(after.entries().iter().any(|e| e.peer() == p2.peer_address()));

    p0.logout().await.unwrap();
    p2.logout().await.unwrap();
}
