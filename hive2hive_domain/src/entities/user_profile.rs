// /////////////////////////////////////////////////////////////////////////////
// Hive2Hive RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # User Profile
//!
//! The single mutable root object of a user's world: the index tree,
//! the user's protection key pair (default DHT write ACL), and the
//! version-chain bookkeeping the overlay uses to reject stale writes.
//!
//! ## Version Chain Invariant
//!
//! For any two successful puts of the same profile, the later one
//! carries `based_on == earlier.version`. `advance_version` is the only
//! way to move the chain forward: it shifts the current version key
//! into `based_on` and stamps a fresh key. The profile manager calls it
//! exactly once per committed modification, right before encrypt-and-put.

use serde::{Deserialize, Serialize};

use crate::entities::FolderIndex;
use crate::value_objects::{EncryptionKeyPair, UserId, VersionKey};

/// A user's profile: index tree, protection keys, version chain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserProfile {
    user_id: UserId,
    root: FolderIndex,
    protection_keys: EncryptionKeyPair,
    version_key: VersionKey,
    based_on_key: Option<VersionKey>,
}

impl UserProfile {
    /// Creates a fresh profile with an empty root folder.
    ///
    /// The initial version key has no predecessor; the first put is an
    /// unchained write that starts the version history.
    pub fn new(user_id: UserId, root: FolderIndex, protection_keys: EncryptionKeyPair) -> Self {
        Self {
            user_id,
            root,
            protection_keys,
            version_key: VersionKey::generate(),
            based_on_key: None,
        }
    }

    /// Returns the user id
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Returns the root folder
    pub fn root(&self) -> &FolderIndex {
        &self.root
    }

    /// Returns the mutable root folder
    pub fn root_mut(&mut self) -> &mut FolderIndex {
        &mut self.root
    }

    /// Returns the protection key pair (default DHT write ACL)
    pub fn protection_keys(&self) -> &EncryptionKeyPair {
        &self.protection_keys
    }

    /// Returns the current version key
    pub fn version_key(&self) -> VersionKey {
        self.version_key
    }

    /// Returns the version key this revision is based on
    pub fn based_on_key(&self) -> Option<VersionKey> {
        self.based_on_key
    }

    /// Moves the version chain forward for the next put.
    ///
    /// The current version becomes the based-on key and a fresh version
    /// key is stamped. Called once per committed modification.
    pub fn advance_version(&mut self) {
        self.based_on_key = Some(self.version_key);
        self.version_key = VersionKey::generate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_objects::{PrivateKey, PublicKey};

    fn profile() -> UserProfile {
        let keys = EncryptionKeyPair::new(PublicKey::from_der(vec![1; 8]), PrivateKey::from_der(vec![1; 8]));
        UserProfile::new(
            UserId::new("alice").unwrap(),
            FolderIndex::new("", keys.clone()),
            keys,
        )
    }

    /// Tests the version-chain invariant across successive advances.
    ///
    /// Validates that:
    /// - A fresh profile has no based-on key
    /// - After advancing, based-on equals the prior version key
    /// - Every advance stamps a new version key
    #[test]
    fn test_advance_version_chains() {
        let mut profile = profile();
        assert!(profile.based_on_key().is_none());

        let first = profile.version_key();
        profile.advance_version();
        assert_eq!(profile.based_on_key(), Some(first));
        assert_ne!(profile.version_key(), first);

        let second = profile.version_key();
        profile.advance_version();
        assert_eq!(profile.based_on_key(), Some(second));
    }
}
