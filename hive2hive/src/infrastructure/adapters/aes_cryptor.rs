// /////////////////////////////////////////////////////////////////////////////
// Hive2Hive RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Password-Based Symmetric Cryptor
//!
//! Implements the domain's `SymmetricCryptor` contract with Argon2id
//! key derivation and AES-256-GCM authenticated encryption. The KDF
//! salt is derived deterministically from the credentials, so the same
//! user opens the same profile on any peer without exchanging salt
//! material; the salt still travels inside the payload so decryption
//! never re-derives it from scratch.
//!
//! A fresh random nonce is drawn per encryption. GCM authentication
//! means a wrong password surfaces as a clean `DecryptionError`, never
//! as garbage plaintext.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, Key, KeyInit, Nonce};
use argon2::Argon2;
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroize;

use hive2hive_domain::entities::UserCredentials;
use hive2hive_domain::services::SymmetricCryptor;
use hive2hive_domain::{EncryptedPayload, H2HError};

const NONCE_LENGTH: usize = 12;

/// AES-256-GCM cryptor with Argon2id password derivation.
pub struct AesCryptor {
    key_length: usize,
}

impl AesCryptor {
    /// Creates a cryptor producing keys of `key_length` bytes.
    ///
    /// Only 32-byte keys are supported; the length is taken from the
    /// validated configuration.
    pub fn new(key_length: usize) -> Self {
        Self { key_length }
    }

    fn derive_key(&self, password: &[u8], salt: &[u8]) -> Result<Vec<u8>, H2HError> {
        let mut key = vec![0u8; self.key_length];
        Argon2::default()
            .hash_password_into(password, salt, &mut key)
            .map_err(|e| H2HError::EncryptionError(format!("Argon2 key derivation failed: {}", e)))?;
        Ok(key)
    }
}

impl SymmetricCryptor for AesCryptor {
    fn encrypt(&self, plaintext: &[u8], credentials: &UserCredentials) -> Result<EncryptedPayload, H2HError> {
        let salt = credentials.kdf_salt();
        let mut key = self.derive_key(credentials.password_bytes(), &salt)?;

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
        let mut nonce = [0u8; NONCE_LENGTH];
        OsRng.fill_bytes(&mut nonce);

        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|e| H2HError::EncryptionError(format!("AES-GCM encryption failed: {}", e)));
        key.zeroize();

        Ok(EncryptedPayload::new(salt.to_vec(), nonce.to_vec(), ciphertext?))
    }

    fn decrypt(&self, payload: &EncryptedPayload, credentials: &UserCredentials) -> Result<Vec<u8>, H2HError> {
        let mut key = self.derive_key(credentials.password_bytes(), payload.salt())?;

        if payload.nonce().len() != NONCE_LENGTH {
            key.zeroize();
            return Err(H2HError::DecryptionError(format!(
                "nonce length {} invalid",
                payload.nonce().len()
            )));
        }

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
        let plaintext = cipher
            .decrypt(Nonce::from_slice(payload.nonce()), payload.ciphertext())
            .map_err(|_| H2HError::DecryptionError("AES-GCM authentication failed".to_string()));
        key.zeroize();
        plaintext
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hive2hive_domain::UserId;

    fn credentials(password: &str) -> UserCredentials {
        UserCredentials::new(UserId::new("alice").unwrap(), password, "1234")
    }

    /// Tests encrypt-then-decrypt round-trip with matching credentials.
    #[test]
    fn test_round_trip() {
        let cryptor = AesCryptor::new(32);
        let creds = credentials("secret");
        let payload = cryptor.encrypt(b"profile bytes", &creds).unwrap();
        assert_eq!(cryptor.decrypt(&payload, &creds).unwrap(), b"profile bytes");
    }

    /// Tests that a wrong password fails authentication cleanly.
    #[test]
    fn test_wrong_password_rejected() {
        let cryptor = AesCryptor::new(32);
        let payload = cryptor.encrypt(b"profile bytes", &credentials("secret")).unwrap();
        let result = cryptor.decrypt(&payload, &credentials("wrong"));
        assert!(matches!(result, Err(H2HError::DecryptionError(_))));
    }

    /// Tests that two encryptions of the same plaintext differ (fresh
    /// nonce per call) while both still decrypt.
    #[test]
    fn test_fresh_nonce_per_encryption() {
        let cryptor = AesCryptor::new(32);
        let creds = credentials("secret");
        let first = cryptor.encrypt(b"same", &creds).unwrap();
        let second = cryptor.encrypt(b"same", &creds).unwrap();
        assert_ne!(first.ciphertext(), second.ciphertext());
        assert_eq!(cryptor.decrypt(&second, &creds).unwrap(), b"same");
    }

    /// Tests that tampered ciphertext is rejected.
    #[test]
    fn test_tampered_ciphertext_rejected() {
        let cryptor = AesCryptor::new(32);
        let creds = credentials("secret");
        let payload = cryptor.encrypt(b"profile bytes", &creds).unwrap();
        let mut bytes = payload.ciphertext().to_vec();
        bytes[0] ^= 0xff;
        let tampered = EncryptedPayload::new(payload.salt().to_vec(), payload.nonce().to_vec(), bytes);
        assert!(cryptor.decrypt(&tampered, &creds).is_err());
    }
}
