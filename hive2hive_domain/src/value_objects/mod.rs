// /////////////////////////////////////////////////////////////////////////////
// Hive2Hive RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Value Objects
//!
//! Immutable, self-validating value objects of the Hive2Hive domain.
//! Value objects are compared by value, carry no lifecycle, and are the
//! vocabulary the entities and services are written in: identifiers,
//! digests, key material, encrypted payloads, and the DHT addressing
//! envelope.

mod chunk;
mod chunk_size;
mod content_hash;
mod crypto_keys;
mod dht_parameters;
mod payloads;
mod peer_address;
mod process_id;
mod user_id;
mod version_key;

pub use chunk::Chunk;
pub use chunk_size::{ChunkSize, DEFAULT_CHUNK_SIZE, MAX_CHUNK_SIZE, MIN_CHUNK_SIZE};
pub use content_hash::ContentHash;
pub use crypto_keys::{EncryptionKeyPair, KeyId, PrivateKey, PublicKey};
pub use dht_parameters::{content_keys, DhtParameters};
pub use payloads::{EncryptedPayload, HybridPayload};
pub use peer_address::PeerAddress;
pub use process_id::ProcessId;
pub use user_id::UserId;
pub use version_key::VersionKey;
