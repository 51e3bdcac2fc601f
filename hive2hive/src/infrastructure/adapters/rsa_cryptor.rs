// /////////////////////////////////////////////////////////////////////////////
// Hive2Hive RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Hybrid RSA/AES Cryptor
//!
//! Implements the domain's `AsymmetricCryptor` contract as a classic
//! envelope scheme: every payload is sealed under a fresh AES-256-GCM
//! content key, and the content key is wrapped with RSA-OAEP (SHA-256)
//! under the recipient's public key. Key material crosses the port as
//! PKCS#8/SPKI DER, matching the opaque byte representation the domain
//! stores inside profiles and meta-files.
//!
//! RSA-OAEP at 2048 bits wraps a 32-byte key with ample margin; key
//! generation cost is why node and chunk key pairs are created once per
//! file and reused across versions.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, Key, KeyInit, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use zeroize::Zeroize;

use hive2hive_domain::services::AsymmetricCryptor;
use hive2hive_domain::{EncryptionKeyPair, H2HError, HybridPayload, PrivateKey, PublicKey};

const CONTENT_KEY_LENGTH: usize = 32;
const NONCE_LENGTH: usize = 12;

/// RSA-OAEP + AES-256-GCM envelope cryptor.
pub struct RsaCryptor {
    key_bits: usize,
}

impl RsaCryptor {
    /// Creates a cryptor generating RSA keys of `key_bits` length
    pub fn new(key_bits: usize) -> Self {
        Self { key_bits }
    }
}

impl AsymmetricCryptor for RsaCryptor {
    fn generate_key_pair(&self) -> Result<EncryptionKeyPair, H2HError> {
        let mut rng = OsRng;
        let private = RsaPrivateKey::new(&mut rng, self.key_bits)
            .map_err(|e| H2HError::EncryptionError(format!("RSA key generation failed: {}", e)))?;
        let public = private.to_public_key();

        let private_der = private
            .to_pkcs8_der()
            .map_err(|e| H2HError::EncryptionError(format!("private key encoding failed: {}", e)))?;
        let public_der = public
            .to_public_key_der()
            .map_err(|e| H2HError::EncryptionError(format!("public key encoding failed: {}", e)))?;

        Ok(EncryptionKeyPair::new(
            PublicKey::from_der(public_der.as_bytes().to_vec()),
            PrivateKey::from_der(private_der.as_bytes().to_vec()),
        ))
    }

    fn encrypt(&self, plaintext: &[u8], public: &PublicKey) -> Result<HybridPayload, H2HError> {
        let recipient = RsaPublicKey::from_public_key_der(public.as_der())
            .map_err(|e| H2HError::EncryptionError(format!("invalid public key: {}", e)))?;

        let mut content_key = [0u8; CONTENT_KEY_LENGTH];
        OsRng.fill_bytes(&mut content_key);
        let mut nonce = [0u8; NONCE_LENGTH];
        OsRng.fill_bytes(&mut nonce);

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&content_key));
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|e| H2HError::EncryptionError(format!("AES-GCM encryption failed: {}", e)))?;

        let wrapped_key = recipient
            .encrypt(&mut OsRng, Oaep::new::<Sha256>(), &content_key)
            .map_err(|e| H2HError::EncryptionError(format!("RSA-OAEP key wrap failed: {}", e)));
        content_key.zeroize();

        Ok(HybridPayload::new(wrapped_key?, nonce.to_vec(), ciphertext))
    }

    fn decrypt(&self, payload: &HybridPayload, private: &PrivateKey) -> Result<Vec<u8>, H2HError> {
        let key = RsaPrivateKey::from_pkcs8_der(private.as_der())
            .map_err(|e| H2HError::DecryptionError(format!("invalid private key: {}", e)))?;

        let mut content_key = key
            .decrypt(Oaep::new::<Sha256>(), payload.encrypted_key())
            .map_err(|_| H2HError::DecryptionError("RSA-OAEP key unwrap failed".to_string()))?;
        if content_key.len() != CONTENT_KEY_LENGTH {
            content_key.zeroize();
            return Err(H2HError::DecryptionError("unwrapped content key has wrong length".to_string()));
        }
        if payload.nonce().len() != NONCE_LENGTH {
            content_key.zeroize();
            return Err(H2HError::DecryptionError(format!(
                "nonce length {} invalid",
                payload.nonce().len()
            )));
        }

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&content_key));
        let plaintext = cipher
            .decrypt(Nonce::from_slice(payload.nonce()), payload.ciphertext())
            .map_err(|_| H2HError::DecryptionError("AES-GCM authentication failed".to_string()));
        content_key.zeroize();
        plaintext
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 1024-bit keys keep key generation fast in tests; production uses
    // the configured 2048-bit default.
    fn cryptor() -> RsaCryptor {
        RsaCryptor::new(1024)
    }

    /// Tests hybrid encrypt-then-decrypt round-trip.
    #[test]
    fn test_round_trip() {
        let cryptor = cryptor();
        let pair = cryptor.generate_key_pair().unwrap();
        let payload = cryptor.encrypt(b"chunk bytes", pair.public()).unwrap();
        assert_eq!(cryptor.decrypt(&payload, pair.private()).unwrap(), b"chunk bytes");
    }

    /// Tests that the wrong private key cannot open a payload.
    #[test]
    fn test_wrong_key_rejected() {
        let cryptor = cryptor();
        let alice = cryptor.generate_key_pair().unwrap();
        let mallory = cryptor.generate_key_pair().unwrap();
        let payload = cryptor.encrypt(b"chunk bytes", alice.public()).unwrap();
        assert!(matches!(
            cryptor.decrypt(&payload, mallory.private()),
            Err(H2HError::DecryptionError(_))
        ));
    }

    /// Tests that generated pairs have distinct identities.
    #[test]
    fn test_generated_pairs_distinct() {
        let cryptor = cryptor();
        let a = cryptor.generate_key_pair().unwrap();
        let b = cryptor.generate_key_pair().unwrap();
        assert_ne!(a.id(), b.id());
    }
}
