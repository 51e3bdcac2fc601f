// /////////////////////////////////////////////////////////////////////////////
// Hive2Hive RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Session lifecycle tests: registration, login/logout, the sidecar,
//! and offline-change reconciliation.

mod common;

use std::path::Path;

use common::{credentials, node, registered_node, test_config, write_file};
use hive2hive::infrastructure::adapters::{MemoryDht, PersistentMeta, H2H_META_FILE};
use hive2hive_domain::{ContentHash, H2HError, ProcessId};

/// Registering the same user twice is rejected before any mutation.
#[tokio::test(flavor = "multi_thread")]
async fn test_double_registration_rejected() {
    let overlay = MemoryDht::new();
    let node = node(test_config(), &overlay, "laptop");

    node.register(credentials("alice")).await.unwrap();
    let error = node.register(credentials("alice")).await.unwrap_err();
    assert!(matches!(error, H2HError::ProcessExecution(_)));
    assert!(error.to_string().contains("already registered"));
}

/// Wrong credentials derive a different profile location; login fails
/// as a read failure, not as garbage data.
#[tokio::test(flavor = "multi_thread")]
async fn test_login_with_wrong_password_fails() {
    let overlay = MemoryDht::new();
    let node = node(test_config(), &overlay, "laptop");
    node.register(credentials("alice")).await.unwrap();

    let root = tempfile::tempdir().unwrap();
    let wrong = hive2hive_domain::entities::UserCredentials::new(
        hive2hive_domain::UserId::new("alice").unwrap(),
        "wrong-password",
        "1234",
    );
    let error = node.login(wrong, root.path().to_path_buf()).await.unwrap_err();
    assert!(matches!(error, H2HError::ProcessExecution(_) | H2HError::GetFailed(_)));
}

/// File operations without a session fail with NoSession.
#[tokio::test(flavor = "multi_thread")]
async fn test_operations_require_session() {
    let overlay = MemoryDht::new();
    let node = node(test_config(), &overlay, "laptop");
    let error = node.add_file("/tmp/nowhere.txt".into()).await.unwrap_err();
    assert!(matches!(error, H2HError::NoSession(_)));
}

/// Logout writes the sidecar with the synchronized digests; a clean
/// re-login reproduces the committed view without spurious changes.
#[tokio::test(flavor = "multi_thread")]
async fn test_logout_writes_sidecar_and_relogin_is_stable() {
    let overlay = MemoryDht::new();
    let (node, root) = registered_node(&overlay, test_config(), "alice", "laptop").await;

    let content = b"sidecar test content".to_vec();
    let path = write_file(root.path(), "docs.txt", &content);
    node.add_file(path).await.unwrap();
    node.logout().await.unwrap();

    // The sidecar is on disk with the committed digest
    assert!(root.path().join(H2H_META_FILE).exists());
    let meta = PersistentMeta::load(root.path()).unwrap().unwrap();
    let digests = meta.digests().unwrap();
    assert_eq!(digests.get("docs.txt"), Some(&ContentHash::of_bytes(&content)));

    // Re-login from the same root changes nothing
    let puts_before = overlay.put_count();
    node.login(credentials("alice"), root.path().to_path_buf()).await.unwrap();
    let profile = node
        .session()
        .unwrap()
        .profile_manager()
        .get_user_profile(ProcessId::generate(), false)
        .await
        .unwrap();
    assert_eq!(
        profile.root().digest_map().get("docs.txt"),
        Some(&ContentHash::of_bytes(&content))
    );
    // Only the locations append happened
    assert_eq!(overlay.put_count(), puts_before + 1);

    node.logout().await.unwrap();
}

/// Changes made while offline are reconciled at login: a modified file
/// becomes a new version, a deleted file leaves the profile, a new
/// file is added.
#[tokio::test(flavor = "multi_thread")]
async fn test_offline_changes_reconciled_at_login() {
    let overlay = MemoryDht::new();
    let (node, root) = registered_node(&overlay, test_config(), "alice", "laptop").await;

    let modified = write_file(root.path(), "modified.txt", b"original");
    let deleted = write_file(root.path(), "deleted.txt", b"doomed");
    node.add_file(modified.clone()).await.unwrap();
    node.add_file(deleted.clone()).await.unwrap();
    node.logout().await.unwrap();

    // Offline edits: one changed, one removed, one brand new
    std::fs::write(&modified, b"offline edit").unwrap();
    std::fs::remove_file(&deleted).unwrap();
    write_file(root.path(), "created.txt", b"born offline");

    node.login(credentials("alice"), root.path().to_path_buf()).await.unwrap();

    let profile = node
        .session()
        .unwrap()
        .profile_manager()
        .get_user_profile(ProcessId::generate(), false)
        .await
        .unwrap();
    let digests = profile.root().digest_map();
    assert_eq!(digests.get("modified.txt"), Some(&ContentHash::of_bytes(b"offline edit")));
    assert_eq!(digests.get("created.txt"), Some(&ContentHash::of_bytes(b"born offline")));
    assert!(!digests.contains_key("deleted.txt"));
    assert!(profile.root().node_at(Path::new("deleted.txt")).is_none());

    node.logout().await.unwrap();
}
