// /////////////////////////////////////////////////////////////////////////////
// Hive2Hive RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # DHT Parameters
//!
//! The addressing and policy envelope of every overlay operation. An
//! overlay address is the pair `(location key, content key)`; puts may
//! additionally carry a version key and based-on key (to extend the
//! object's version chain), a TTL, and a protection key pair acting as
//! the DHT-level write ACL for the slot.
//!
//! ## Content Key Constants
//!
//! Content keys are fixed strings naming the conventional slots at each
//! location key. They are part of the wire format and must not change:
//! a peer running any client version finds the user profile under
//! `"USER_PROFILE"` at the profile's location key.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::value_objects::{EncryptionKeyPair, VersionKey};

/// Conventional content-key slot names. Wire format; keep stable.
pub mod content_keys {
    /// Slot of the encrypted user profile
    pub const USER_PROFILE: &str = "USER_PROFILE";
    /// Slot of one encrypted file chunk
    pub const FILE_CHUNK: &str = "FILE_CHUNK";
    /// Slot of a user's locations set
    pub const LOCATIONS: &str = "LOCATIONS";
    /// Slot of an encrypted meta-file
    pub const META_FILE: &str = "META_FILE";
    /// Slot of a user's buffered message queue
    pub const USER_MESSAGE_QUEUE: &str = "USER_MESSAGE_QUEUE";
    /// Slot of a user's public key
    pub const USER_PUBLIC_KEY: &str = "USER_PUBLIC_KEY";
}

/// Addressing and policy parameters of one overlay operation.
///
/// Built with the builder-style `with_*` methods; only location and
/// content key are mandatory. A put carrying `based_on` requires the
/// overlay to enforce the version chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DhtParameters {
    location_key: String,
    content_key: String,
    version_key: Option<VersionKey>,
    based_on_key: Option<VersionKey>,
    ttl: Option<Duration>,
    protection_keys: Option<EncryptionKeyPair>,
}

impl DhtParameters {
    /// Creates parameters addressing `(location_key, content_key)`
    pub fn new(location_key: impl Into<String>, content_key: impl Into<String>) -> Self {
        Self {
            location_key: location_key.into(),
            content_key: content_key.into(),
            version_key: None,
            based_on_key: None,
            ttl: None,
            protection_keys: None,
        }
    }

    /// Sets the version key this put commits
    pub fn with_version(mut self, version: VersionKey) -> Self {
        self.version_key = Some(version);
        self
    }

    /// Sets the version key this put is based on, arming the overlay's
    /// chain check
    pub fn with_based_on(mut self, based_on: VersionKey) -> Self {
        self.based_on_key = Some(based_on);
        self
    }

    /// Sets the time-to-live the overlay must apply verbatim
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Sets an optional time-to-live
    pub fn with_optional_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.ttl = ttl;
        self
    }

    /// Sets the protection key pair acting as the slot's write ACL
    pub fn with_protection_keys(mut self, keys: EncryptionKeyPair) -> Self {
        self.protection_keys = Some(keys);
        self
    }

    /// Returns the location key
    pub fn location_key(&self) -> &str {
        &self.location_key
    }

    /// Returns the content key
    pub fn content_key(&self) -> &str {
        &self.content_key
    }

    /// Returns the committed version key, if any
    pub fn version_key(&self) -> Option<&VersionKey> {
        self.version_key.as_ref()
    }

    /// Returns the based-on key, if any
    pub fn based_on_key(&self) -> Option<&VersionKey> {
        self.based_on_key.as_ref()
    }

    /// Returns the TTL, if any
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Returns the protection key pair, if any
    pub fn protection_keys(&self) -> Option<&EncryptionKeyPair> {
        self.protection_keys.as_ref()
    }
}

impl fmt::Display for DhtParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.location_key, self.content_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Tests the builder accumulates optional fields.
    ///
    /// Validates that:
    /// - Mandatory keys are stored verbatim
    /// - Version, based-on, and TTL are absent until set
    #[test]
    fn test_parameters_builder() {
        let version = VersionKey::generate();
        let based_on = VersionKey::generate();
        let params = DhtParameters::new("loc", content_keys::META_FILE)
            .with_version(version)
            .with_based_on(based_on)
            .with_ttl(Duration::from_secs(60));

        assert_eq!(params.location_key(), "loc");
        assert_eq!(params.content_key(), "META_FILE");
        assert_eq!(params.version_key(), Some(&version));
        assert_eq!(params.based_on_key(), Some(&based_on));
        assert_eq!(params.ttl(), Some(Duration::from_secs(60)));
        assert!(params.protection_keys().is_none());
    }

    /// Tests the wire constants stay stable.
    #[test]
    fn test_content_key_constants() {
        assert_eq!(content_keys::USER_PROFILE, "USER_PROFILE");
        assert_eq!(content_keys::FILE_CHUNK, "FILE_CHUNK");
        assert_eq!(content_keys::LOCATIONS, "LOCATIONS");
        assert_eq!(content_keys::META_FILE, "META_FILE");
        assert_eq!(content_keys::USER_MESSAGE_QUEUE, "USER_MESSAGE_QUEUE");
        assert_eq!(content_keys::USER_PUBLIC_KEY, "USER_PUBLIC_KEY");
    }
}
