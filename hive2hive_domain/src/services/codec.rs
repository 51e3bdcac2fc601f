// /////////////////////////////////////////////////////////////////////////////
// Hive2Hive RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Content Codec
//!
//! Pairs serde with the cipher contracts to move domain objects in and
//! out of their overlay envelopes. Each function is the single place
//! where one content kind meets its cipher:
//!
//! | object      | cipher            | key                         |
//! |-------------|-------------------|-----------------------------|
//! | UserProfile | symmetric         | derived from credentials    |
//! | MetaFile    | hybrid            | file's node key pair        |
//! | Chunk       | hybrid            | meta-file's chunk key pair  |

use crate::entities::{MetaFile, UserCredentials, UserProfile};
use crate::services::{AsymmetricCryptor, SymmetricCryptor};
use crate::value_objects::{Chunk, EncryptedPayload, HybridPayload, PrivateKey, PublicKey};
use crate::H2HError;

/// Serializes and encrypts a user profile
pub fn encrypt_profile(
    profile: &UserProfile,
    credentials: &UserCredentials,
    cryptor: &dyn SymmetricCryptor,
) -> Result<EncryptedPayload, H2HError> {
    let plaintext = serde_json::to_vec(profile)?;
    cryptor.encrypt(&plaintext, credentials)
}

/// Decrypts and deserializes a user profile
pub fn decrypt_profile(
    payload: &EncryptedPayload,
    credentials: &UserCredentials,
    cryptor: &dyn SymmetricCryptor,
) -> Result<UserProfile, H2HError> {
    let plaintext = cryptor.decrypt(payload, credentials)?;
    Ok(serde_json::from_slice(&plaintext)?)
}

/// Serializes and encrypts a meta-file under the file's node key
pub fn encrypt_meta_file(
    meta_file: &MetaFile,
    node_public: &PublicKey,
    cryptor: &dyn AsymmetricCryptor,
) -> Result<HybridPayload, H2HError> {
    let plaintext = serde_json::to_vec(meta_file)?;
    cryptor.encrypt(&plaintext, node_public)
}

/// Decrypts and deserializes a meta-file with the node private key
pub fn decrypt_meta_file(
    payload: &HybridPayload,
    node_private: &PrivateKey,
    cryptor: &dyn AsymmetricCryptor,
) -> Result<MetaFile, H2HError> {
    let plaintext = cryptor.decrypt(payload, node_private)?;
    Ok(serde_json::from_slice(&plaintext)?)
}

/// Serializes and encrypts a chunk under the file's chunk key
pub fn encrypt_chunk(
    chunk: &Chunk,
    chunk_public: &PublicKey,
    cryptor: &dyn AsymmetricCryptor,
) -> Result<HybridPayload, H2HError> {
    let plaintext = serde_json::to_vec(chunk)?;
    cryptor.encrypt(&plaintext, chunk_public)
}

/// Decrypts and deserializes a chunk with the file's chunk private key
pub fn decrypt_chunk(
    payload: &HybridPayload,
    chunk_private: &PrivateKey,
    cryptor: &dyn AsymmetricCryptor,
) -> Result<Chunk, H2HError> {
    let plaintext = cryptor.decrypt(payload, chunk_private)?;
    Ok(serde_json::from_slice(&plaintext)?)
}
