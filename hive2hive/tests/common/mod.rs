// /////////////////////////////////////////////////////////////////////////////
// Hive2Hive RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Common Test Helpers
//!
//! Shared fixtures for the integration suite: a small-chunk test
//! configuration, overlay construction, and registered-and-logged-in
//! node setup.

// Not every test binary uses every helper
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use tempfile::TempDir;

use hive2hive::infrastructure::adapters::MemoryDht;
use hive2hive::{H2HConfig, H2HNode};
use hive2hive_domain::entities::UserCredentials;
use hive2hive_domain::UserId;

/// Chunk size used throughout the suite; small enough that modest
/// files span several chunks.
pub const TEST_CHUNK_SIZE: usize = 1024;

/// Configuration tuned for tests: tiny chunks and 1024-bit RSA keys so
/// key generation stays fast.
pub fn test_config() -> H2HConfig {
    H2HConfig::from_toml_str(
        r#"
        chunk_size = 1024
        max_file_size = 1048576
        rsa_key_length = 1024
        "#,
    )
    .expect("test configuration is valid")
}

/// Credentials for a throwaway test user
pub fn credentials(user: &str) -> UserCredentials {
    UserCredentials::new(UserId::new(user).unwrap(), format!("{}-password", user), "1234")
}

/// Creates a node joined to `overlay` under the given peer label
pub fn node(config: H2HConfig, overlay: &MemoryDht, label: &str) -> H2HNode {
    H2HNode::new(config, overlay.clone(), label).expect("node construction succeeds")
}

/// Registers a fresh user and logs it in on a new node with its own
/// managed root
pub async fn registered_node(overlay: &MemoryDht, config: H2HConfig, user: &str, label: &str) -> (H2HNode, TempDir) {
    let node = node(config, overlay, label);
    let root = TempDir::new().unwrap();
    let creds = credentials(user);
    node.register(creds.clone()).await.expect("registration succeeds");
    node.login(creds, root.path().to_path_buf()).await.expect("login succeeds");
    (node, root)
}

/// Logs an already-registered user in on a new node
pub async fn login_node(overlay: &MemoryDht, config: H2HConfig, user: &str, label: &str) -> (H2HNode, TempDir) {
    let node = node(config, overlay, label);
    let root = TempDir::new().unwrap();
    node.login(credentials(user), root.path().to_path_buf())
        .await
        .expect("login succeeds");
    (node, root)
}

/// Writes `content` below the root, creating parent folders
pub fn write_file(root: &Path, relative: &str, content: &[u8]) -> PathBuf {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    path
}

/// Bytes that span `chunks` full chunks plus `extra` bytes
pub fn content_of_chunks(chunks: usize, extra: usize, fill: u8) -> Vec<u8> {
    vec![fill; chunks * TEST_CHUNK_SIZE + extra]
}
