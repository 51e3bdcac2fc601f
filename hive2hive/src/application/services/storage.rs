// /////////////////////////////////////////////////////////////////////////////
// Hive2Hive RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # DHT Storage Helpers
//!
//! The shared overlay plumbing of the operation pipelines: meta-file
//! and chunk movement, public-key lookup. Every helper encodes one
//! fixed addressing convention:
//!
//! - A meta-file lives at the file's node-key fingerprint under
//!   `META_FILE`, hybrid-encrypted under the node key, write-protected
//!   by the node key pair (exactly what share participants hold).
//! - A chunk lives at its chunk id under `FILE_CHUNK`, hybrid-encrypted
//!   under the meta-file's chunk key, write-protected by the node key
//!   pair, write-once.
//! - A user's public key lives at the user id under `USER_PUBLIC_KEY`.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use hive2hive_domain::entities::{MetaChunk, MetaFile};
use hive2hive_domain::network::NetworkContent;
use hive2hive_domain::ports::DataManager;
use hive2hive_domain::services::{codec, AsymmetricCryptor};
use hive2hive_domain::value_objects::content_keys;
use hive2hive_domain::{Chunk, DhtParameters, EncryptionKeyPair, H2HError, PublicKey, UserId};

/// Parameters of a file's meta-file slot
pub fn meta_file_params(node_keys: &EncryptionKeyPair, ttl: Option<Duration>) -> DhtParameters {
    DhtParameters::new(node_keys.id().as_str(), content_keys::META_FILE)
        .with_optional_ttl(ttl)
        .with_protection_keys(node_keys.clone())
}

/// Parameters of a chunk slot
pub fn chunk_params(chunk_id: &str, node_keys: &EncryptionKeyPair, ttl: Option<Duration>) -> DhtParameters {
    DhtParameters::new(chunk_id, content_keys::FILE_CHUNK)
        .with_optional_ttl(ttl)
        .with_protection_keys(node_keys.clone())
}

/// Fetches and opens a file's meta-file.
///
/// # Errors
/// Returns `H2HError::GetFailed` when the meta-file is absent.
pub async fn fetch_meta_file(
    dht: &Arc<dyn DataManager>,
    cryptor: &Arc<dyn AsymmetricCryptor>,
    node_keys: &EncryptionKeyPair,
) -> Result<MetaFile, H2HError> {
    let content = dht
        .get(&meta_file_params(node_keys, None))
        .await?
        .ok_or_else(|| H2HError::GetFailed(format!("meta-file {} not found", node_keys.id())))?;
    let payload = content.expect_meta_file()?;
    codec::decrypt_meta_file(&payload, node_keys.private(), cryptor.as_ref())
}

/// Encrypts and stores a meta-file
pub async fn put_meta_file(
    dht: &Arc<dyn DataManager>,
    cryptor: &Arc<dyn AsymmetricCryptor>,
    meta_file: &MetaFile,
    node_keys: &EncryptionKeyPair,
    ttl: Option<Duration>,
) -> Result<(), H2HError> {
    let payload = codec::encrypt_meta_file(meta_file, node_keys.public(), cryptor.as_ref())?;
    dht.put(&meta_file_params(node_keys, ttl), NetworkContent::EncryptedMetaFile(payload))
        .await
}

/// Removes a file's meta-file slot
pub async fn remove_meta_file(dht: &Arc<dyn DataManager>, node_keys: &EncryptionKeyPair) -> Result<(), H2HError> {
    dht.remove(&meta_file_params(node_keys, None)).await
}

/// Uploads plaintext chunks concurrently via unblocked puts.
///
/// Each stored chunk is appended to `uploaded` as soon as its put
/// resolves, so a failing upload leaves the already-stored chunk
/// references behind for the caller's rollback. On the first failure
/// the remaining in-flight puts are cancelled.
pub async fn upload_chunks(
    dht: &Arc<dyn DataManager>,
    cryptor: &Arc<dyn AsymmetricCryptor>,
    chunks: &[Chunk],
    chunk_public: &PublicKey,
    node_keys: &EncryptionKeyPair,
    ttl: Option<Duration>,
    uploaded: &Mutex<Vec<MetaChunk>>,
) -> Result<(), H2HError> {
    use futures::stream::{FuturesUnordered, StreamExt};

    let mut handles = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        let payload = codec::encrypt_chunk(chunk, chunk_public, cryptor.as_ref())?;
        let params = chunk_params(chunk.id(), node_keys, ttl);
        let handle = dht.put_unblocked(params, NetworkContent::EncryptedChunk(payload));
        handles.push((MetaChunk::new(chunk.id(), chunk.order(), chunk.hash()), handle));
    }

    let mut pending: FuturesUnordered<_> = handles
        .into_iter()
        .map(|(meta_chunk, handle)| async move { (meta_chunk, handle.await_result().await) })
        .collect();

    let mut first_failure: Option<H2HError> = None;
    while let Some((meta_chunk, result)) = pending.next().await {
        match result {
            Ok(()) => {
                debug!(chunk = meta_chunk.chunk_id(), order = meta_chunk.order(), "chunk stored");
                uploaded.lock().push(meta_chunk);
            }
            Err(error) if first_failure.is_none() => first_failure = Some(error),
            Err(_) => {}
        }
    }

    match first_failure {
        None => Ok(()),
        Some(error) => Err(error),
    }
}

/// Removes chunk slots, best-effort; the first failure is returned
/// after all removals were attempted
pub async fn remove_chunks(
    dht: &Arc<dyn DataManager>,
    chunks: &[MetaChunk],
    node_keys: &EncryptionKeyPair,
) -> Result<(), H2HError> {
    let mut first_failure: Option<H2HError> = None;
    for chunk in chunks {
        if let Err(error) = dht.remove(&chunk_params(chunk.chunk_id(), node_keys, None)).await {
            if first_failure.is_none() {
                first_failure = Some(error);
            }
        }
    }
    match first_failure {
        None => Ok(()),
        Some(error) => Err(error),
    }
}

/// Fetches and opens one chunk
pub async fn fetch_chunk(
    dht: &Arc<dyn DataManager>,
    cryptor: &Arc<dyn AsymmetricCryptor>,
    meta_chunk: &MetaChunk,
    chunk_keys: &EncryptionKeyPair,
) -> Result<Chunk, H2HError> {
    let params = DhtParameters::new(meta_chunk.chunk_id(), content_keys::FILE_CHUNK);
    let content = dht
        .get(&params)
        .await?
        .ok_or_else(|| H2HError::GetFailed(format!("chunk {} not found", meta_chunk.chunk_id())))?;
    let payload = content.expect_chunk()?;
    codec::decrypt_chunk(&payload, chunk_keys.private(), cryptor.as_ref())
}

/// Stores a user's public key at registration
pub async fn put_public_key(
    dht: &Arc<dyn DataManager>,
    user: &UserId,
    key: PublicKey,
    protection: &EncryptionKeyPair,
    ttl: Option<Duration>,
) -> Result<(), H2HError> {
    let params = DhtParameters::new(user.as_str(), content_keys::USER_PUBLIC_KEY)
        .with_optional_ttl(ttl)
        .with_protection_keys(protection.clone());
    dht.put(&params, NetworkContent::PublicKey(key)).await
}

/// Looks up a user's public key.
///
/// # Errors
/// Returns `H2HError::GetFailed` for an unknown user.
pub async fn fetch_public_key(dht: &Arc<dyn DataManager>, user: &UserId) -> Result<PublicKey, H2HError> {
    let params = DhtParameters::new(user.as_str(), content_keys::USER_PUBLIC_KEY);
    let content = dht
        .get(&params)
        .await?
        .ok_or_else(|| H2HError::GetFailed(format!("no public key registered for '{}'", user)))?;
    content.expect_public_key()
}
