// /////////////////////////////////////////////////////////////////////////////
// Hive2Hive RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Encrypted Payload Value Objects
//!
//! Ciphertext envelopes as they travel over the overlay. Two shapes
//! exist, matching the two cipher contracts:
//!
//! - [`EncryptedPayload`] — symmetric, password-derived: salt for the
//!   KDF, nonce, ciphertext. Used only for the user profile.
//! - [`HybridPayload`] — hybrid: a fresh symmetric key wrapped under an
//!   asymmetric public key, plus nonce and ciphertext. Used for
//!   meta-files and chunks.
//!
//! Both are plain data; the corresponding cryptor is the only place that
//! knows how to open them.

use serde::{Deserialize, Serialize};

/// Symmetric ciphertext of a password-encrypted object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EncryptedPayload {
    salt: Vec<u8>,
    nonce: Vec<u8>,
    ciphertext: Vec<u8>,
}

impl EncryptedPayload {
    /// Assembles a payload from its parts
    pub fn new(salt: Vec<u8>, nonce: Vec<u8>, ciphertext: Vec<u8>) -> Self {
        Self { salt, nonce, ciphertext }
    }

    /// Returns the KDF salt
    pub fn salt(&self) -> &[u8] {
        &self.salt
    }

    /// Returns the cipher nonce
    pub fn nonce(&self) -> &[u8] {
        &self.nonce
    }

    /// Returns the ciphertext bytes
    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }
}

/// Hybrid ciphertext: an asymmetrically wrapped content key plus the
/// symmetric ciphertext it opens.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HybridPayload {
    encrypted_key: Vec<u8>,
    nonce: Vec<u8>,
    ciphertext: Vec<u8>,
}

impl HybridPayload {
    /// Assembles a payload from its parts
    pub fn new(encrypted_key: Vec<u8>, nonce: Vec<u8>, ciphertext: Vec<u8>) -> Self {
        Self {
            encrypted_key,
            nonce,
            ciphertext,
        }
    }

    /// Returns the wrapped content key
    pub fn encrypted_key(&self) -> &[u8] {
        &self.encrypted_key
    }

    /// Returns the cipher nonce
    pub fn nonce(&self) -> &[u8] {
        &self.nonce
    }

    /// Returns the ciphertext bytes
    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }
}
