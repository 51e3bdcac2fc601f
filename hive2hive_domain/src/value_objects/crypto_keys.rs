// /////////////////////////////////////////////////////////////////////////////
// Hive2Hive RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Asymmetric Key Material
//!
//! Opaque, DER-encoded asymmetric key material. The domain does not pick
//! a cipher; it treats keys as byte strings with a stable fingerprint
//! and leaves interpretation to the `AsymmetricCryptor` implementation.
//!
//! ## Fingerprints as Identity
//!
//! `PublicKey::id()` is the SHA-256 fingerprint of the DER bytes. The
//! fingerprint is the stable identity of a profile-tree node and the
//! DHT location key of its meta-file: whoever knows a node's public key
//! can address (but not decrypt) its data.
//!
//! ## Secret Hygiene
//!
//! `PrivateKey` zeroizes its DER bytes on drop and redacts itself from
//! `Debug` output. Key pairs live inside the encrypted user profile, so
//! they never touch the overlay in the clear.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Stable identity derived from a public key fingerprint.
///
/// Used as the DHT location key for meta-files and as the node identity
/// inside the profile tree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KeyId(String);

impl KeyId {
    /// Returns the fingerprint as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// DER-encoded public half of an asymmetric key pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublicKey {
    der: Vec<u8>,
}

impl PublicKey {
    /// Wraps DER-encoded public key bytes
    pub fn from_der(der: Vec<u8>) -> Self {
        Self { der }
    }

    /// Returns the DER encoding
    pub fn as_der(&self) -> &[u8] {
        &self.der
    }

    /// Returns the SHA-256 fingerprint used as the key's stable identity
    pub fn id(&self) -> KeyId {
        let mut hasher = Sha256::new();
        hasher.update(&self.der);
        KeyId(hex::encode(hasher.finalize()))
    }
}

/// DER-encoded private half of an asymmetric key pair.
///
/// Zeroized on drop; never printed.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct PrivateKey {
    der: Vec<u8>,
}

impl PrivateKey {
    /// Wraps DER-encoded private key bytes
    pub fn from_der(der: Vec<u8>) -> Self {
        Self { der }
    }

    /// Returns the DER encoding
    pub fn as_der(&self) -> &[u8] {
        &self.der
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey").field("der", &"[REDACTED]").finish()
    }
}

/// An asymmetric key pair.
///
/// Pairs are generated by the `AsymmetricCryptor` at the configured key
/// length and stored inside encrypted DHT objects (profile tree nodes,
/// meta-files). Equality compares both halves.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EncryptionKeyPair {
    public: PublicKey,
    private: PrivateKey,
}

impl EncryptionKeyPair {
    /// Builds a key pair from its two halves
    pub fn new(public: PublicKey, private: PrivateKey) -> Self {
        Self { public, private }
    }

    /// Returns the public half
    pub fn public(&self) -> &PublicKey {
        &self.public
    }

    /// Returns the private half
    pub fn private(&self) -> &PrivateKey {
        &self.private
    }

    /// Returns the pair's stable identity (the public fingerprint)
    pub fn id(&self) -> KeyId {
        self.public.id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Tests that key fingerprints are stable and collision-free for
    /// distinct keys.
    #[test]
    fn test_public_key_fingerprint() {
        let a = PublicKey::from_der(vec![1, 2, 3]);
        let b = PublicKey::from_der(vec![1, 2, 4]);
        assert_eq!(a.id(), a.id());
        assert_ne!(a.id(), b.id());
        assert_eq!(a.id().as_str().len(), 64);
    }

    /// Tests that private keys never leak through Debug formatting.
    #[test]
    fn test_private_key_debug_redaction() {
        let key = PrivateKey::from_der(vec![42; 16]);
        let rendered = format!("{:?}", key);
        assert!(rendered.contains("REDACTED"));
        assert!(!rendered.contains("42"));
    }
}
