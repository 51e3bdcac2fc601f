// /////////////////////////////////////////////////////////////////////////////
// Hive2Hive RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Session
//!
//! State of one logged-in user on this peer: credentials, managed root
//! directory, the peer's overlay address, the running profile manager,
//! and the public-key cache warmed from the sidecar. Every operation
//! pipeline runs against exactly one session; its absence is the
//! `NoSession` failure.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::infrastructure::runtime::ProfileManager;
use hive2hive_domain::entities::UserCredentials;
use hive2hive_domain::{H2HError, PeerAddress, PublicKey, UserId};

/// One logged-in user on this peer.
pub struct Session {
    credentials: UserCredentials,
    root_path: PathBuf,
    peer_address: PeerAddress,
    profile_manager: Arc<ProfileManager>,
    key_cache: Mutex<BTreeMap<UserId, PublicKey>>,
}

impl Session {
    /// Creates a session for a freshly logged-in user
    pub fn new(
        credentials: UserCredentials,
        root_path: PathBuf,
        peer_address: PeerAddress,
        profile_manager: Arc<ProfileManager>,
    ) -> Self {
        Self {
            credentials,
            root_path,
            peer_address,
            profile_manager,
            key_cache: Mutex::new(BTreeMap::new()),
        }
    }

    /// Returns the logged-in user's credentials
    pub fn credentials(&self) -> &UserCredentials {
        &self.credentials
    }

    /// Returns the logged-in user id
    pub fn user_id(&self) -> &UserId {
        self.credentials.user_id()
    }

    /// Returns the managed root directory
    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    /// Returns this peer's overlay address
    pub fn peer_address(&self) -> &PeerAddress {
        &self.peer_address
    }

    /// Returns the profile manager of this session
    pub fn profile_manager(&self) -> &Arc<ProfileManager> {
        &self.profile_manager
    }

    /// Relativizes an absolute path against the managed root.
    ///
    /// # Errors
    /// Returns `H2HError::IllegalFileLocation` when the path is the
    /// root itself or lies outside it.
    pub fn relativize(&self, path: &Path) -> Result<PathBuf, H2HError> {
        let relative = path.strip_prefix(&self.root_path).map_err(|_| {
            H2HError::IllegalFileLocation(format!(
                "'{}' is outside the managed root '{}'",
                path.display(),
                self.root_path.display()
            ))
        })?;
        if relative.as_os_str().is_empty() {
            return Err(H2HError::IllegalFileLocation(
                "the managed root itself cannot be a file operation target".to_string(),
            ));
        }
        Ok(relative.to_path_buf())
    }

    /// Resolves a profile-relative path below the managed root
    pub fn absolutize(&self, relative: &Path) -> PathBuf {
        self.root_path.join(relative)
    }

    /// Looks up a cached public key
    pub fn cached_key(&self, user: &UserId) -> Option<PublicKey> {
        self.key_cache.lock().get(user).cloned()
    }

    /// Caches a public key for later sessions
    pub fn cache_key(&self, user: UserId, key: PublicKey) {
        self.key_cache.lock().insert(user, key);
    }

    /// Returns a snapshot of the key cache for the logout sidecar
    pub fn key_cache_snapshot(&self) -> BTreeMap<UserId, PublicKey> {
        self.key_cache.lock().clone()
    }

    /// Seeds the key cache from the login sidecar
    pub fn warm_key_cache(&self, cache: BTreeMap<UserId, PublicKey>) {
        self.key_cache.lock().extend(cache);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::adapters::MemoryDht;
    use hive2hive_domain::services::SymmetricCryptor;
    use hive2hive_domain::{EncryptedPayload, UserId};
    use std::time::Duration;

    struct PlainCryptor;
    impl SymmetricCryptor for PlainCryptor {
        fn encrypt(&self, plaintext: &[u8], _c: &UserCredentials) -> Result<EncryptedPayload, H2HError> {
            Ok(EncryptedPayload::new(Vec::new(), Vec::new(), plaintext.to_vec()))
        }
        fn decrypt(&self, payload: &EncryptedPayload, _c: &UserCredentials) -> Result<Vec<u8>, H2HError> {
            Ok(payload.ciphertext().to_vec())
        }
    }

    fn session(root: &Path) -> Session {
        let credentials = UserCredentials::new(UserId::new("alice").unwrap(), "pw", "1234");
        let manager = Arc::new(ProfileManager::new(
            Arc::new(MemoryDht::new()),
            Arc::new(PlainCryptor),
            credentials.clone(),
            Duration::from_millis(1000),
            None,
        ));
        Session::new(credentials, root.to_path_buf(), PeerAddress::new("test"), manager)
    }

    /// Tests path relativization against the managed root.
    ///
    /// Validates that:
    /// - Paths below the root relativize
    /// - The root itself and outside paths are rejected
    #[tokio::test]
    async fn test_relativize_guards_root() {
        let dir = tempfile::tempdir().unwrap();
        let session = session(dir.path());

        let inside = dir.path().join("docs/report.txt");
        assert_eq!(session.relativize(&inside).unwrap(), PathBuf::from("docs/report.txt"));

        assert!(session.relativize(dir.path()).is_err());
        assert!(session.relativize(Path::new("/elsewhere/file.txt")).is_err());

        session.profile_manager().stop().await;
    }
}
