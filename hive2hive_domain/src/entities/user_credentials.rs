// /////////////////////////////////////////////////////////////////////////////
// Hive2Hive RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # User Credentials
//!
//! The triple that authenticates a user against their own profile:
//! user id, password, and pin. Nothing about the triple is ever stored
//! or transmitted; it deterministically derives
//!
//! - the profile's DHT location key (SHA-256 over id, password, pin), and
//! - the KDF salt the symmetric cryptor feeds into the password-based
//!   profile key.
//!
//! A wrong credential therefore does not produce an "access denied" —
//! it produces a location nobody ever wrote to, or a payload that fails
//! authenticated decryption.

use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::value_objects::UserId;

/// Credentials of one Hive2Hive user.
///
/// Password and pin are zeroized on drop and redacted from `Debug`.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct UserCredentials {
    #[zeroize(skip)]
    user_id: UserId,
    password: String,
    pin: String,
}

impl UserCredentials {
    /// Creates credentials for the given user
    pub fn new(user_id: UserId, password: impl Into<String>, pin: impl Into<String>) -> Self {
        Self {
            user_id,
            password: password.into(),
            pin: pin.into(),
        }
    }

    /// Returns the user id
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Returns the password bytes for key derivation
    pub fn password_bytes(&self) -> &[u8] {
        self.password.as_bytes()
    }

    /// Derives the DHT location key of the user's profile.
    ///
    /// The key is the hex SHA-256 over all three credentials, so it is
    /// unguessable without the full triple.
    pub fn profile_location_key(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.user_id.as_str().as_bytes());
        hasher.update(b"/");
        hasher.update(self.password.as_bytes());
        hasher.update(b"/");
        hasher.update(self.pin.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Derives the deterministic KDF salt for the profile cipher.
    ///
    /// Derived from pin and user id only, so the same credentials always
    /// re-derive the same profile key.
    pub fn kdf_salt(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.pin.as_bytes());
        hasher.update(b"/");
        hasher.update(self.user_id.as_str().as_bytes());
        hasher.finalize().into()
    }
}

impl std::fmt::Debug for UserCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserCredentials")
            .field("user_id", &self.user_id)
            .field("password", &"[REDACTED]")
            .field("pin", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials(user: &str, password: &str, pin: &str) -> UserCredentials {
        UserCredentials::new(UserId::new(user).unwrap(), password, pin)
    }

    /// Tests that the derived profile location is deterministic and
    /// sensitive to every credential component.
    ///
    /// Validates that:
    /// - Identical credentials derive identical locations
    /// - Changing any of id, password, or pin changes the location
    #[test]
    fn test_profile_location_derivation() {
        let base = credentials("alice", "secret", "1234");
        assert_eq!(base.profile_location_key(), base.profile_location_key());
        assert_ne!(
            base.profile_location_key(),
            credentials("bob", "secret", "1234").profile_location_key()
        );
        assert_ne!(
            base.profile_location_key(),
            credentials("alice", "other", "1234").profile_location_key()
        );
        assert_ne!(
            base.profile_location_key(),
            credentials("alice", "secret", "9999").profile_location_key()
        );
    }

    /// Tests that secrets are redacted from Debug output.
    #[test]
    fn test_debug_redaction() {
        let rendered = format!("{:?}", credentials("alice", "secret", "1234"));
        assert!(!rendered.contains("secret"));
        assert!(!rendered.contains("1234"));
    }
}
