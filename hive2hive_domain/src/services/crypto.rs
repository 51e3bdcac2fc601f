// /////////////////////////////////////////////////////////////////////////////
// Hive2Hive RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Cipher Contracts
//!
//! The domain specifies its two ciphers by contract only; concrete
//! algorithms, key lengths, and KDF parameters are infrastructure
//! choices injected at construction.
//!
//! - [`SymmetricCryptor`]: password-based authenticated encryption. The
//!   key is derived deterministically from the user credentials, so the
//!   same credentials open the same profile on any peer.
//! - [`AsymmetricCryptor`]: hybrid encryption. Every payload is sealed
//!   under a fresh symmetric key, which is in turn wrapped under the
//!   recipient's public key; only the matching private key opens it.
//!
//! Implementations must be `Send + Sync`; the same cryptor instance is
//! shared across concurrently running operation pipelines.

use crate::entities::UserCredentials;
use crate::value_objects::{EncryptedPayload, EncryptionKeyPair, HybridPayload, PrivateKey, PublicKey};
use crate::H2HError;

/// Password-based authenticated cipher for the user profile.
pub trait SymmetricCryptor: Send + Sync {
    /// Encrypts a plaintext under the key derived from `credentials`.
    ///
    /// # Errors
    /// Returns `H2HError::EncryptionError` on KDF or cipher failure.
    fn encrypt(&self, plaintext: &[u8], credentials: &UserCredentials) -> Result<EncryptedPayload, H2HError>;

    /// Decrypts a payload with the key derived from `credentials`.
    ///
    /// # Errors
    /// Returns `H2HError::DecryptionError` when the credentials do not
    /// open the payload (wrong password, or tampered ciphertext).
    fn decrypt(&self, payload: &EncryptedPayload, credentials: &UserCredentials) -> Result<Vec<u8>, H2HError>;
}

/// Hybrid cipher for meta-files and chunks.
pub trait AsymmetricCryptor: Send + Sync {
    /// Generates a key pair at the configured key length.
    ///
    /// # Errors
    /// Returns `H2HError::EncryptionError` on generation failure.
    fn generate_key_pair(&self) -> Result<EncryptionKeyPair, H2HError>;

    /// Seals a plaintext for the holder of `public`'s private half
    fn encrypt(&self, plaintext: &[u8], public: &PublicKey) -> Result<HybridPayload, H2HError>;

    /// Opens a payload with the matching private key.
    ///
    /// # Errors
    /// Returns `H2HError::DecryptionError` when the key does not match
    /// or the ciphertext was tampered with.
    fn decrypt(&self, payload: &HybridPayload, private: &PrivateKey) -> Result<Vec<u8>, H2HError>;
}
