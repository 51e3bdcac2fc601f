// /////////////////////////////////////////////////////////////////////////////
// Hive2Hive RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Hive2Hive Domain
//!
//! Pure domain layer of the Hive2Hive distributed file-synchronization
//! core. This crate holds the business model and its rules, with no
//! runtime, no I/O, and no concrete cryptography:
//!
//! - **Entities**: user credentials and profile, the index tree,
//!   meta-files with version retention, the locations set
//! - **Value objects**: identifiers, digests, key material, ciphertext
//!   envelopes, the DHT addressing parameters
//! - **Wire model**: the tagged DHT content variants and direct
//!   peer-to-peer messages
//! - **Domain services**: the chunk codec and the cipher contracts
//! - **Ports**: async traits the infrastructure implements (overlay
//!   façade, message handler)
//!
//! ## Layering
//!
//! Domain services are synchronous and CPU-bound; only the ports are
//! async, because they front I/O. The main crate supplies the tokio
//! runtime, the cipher implementations, and the overlay adapter, then
//! composes everything into operation pipelines.

pub mod entities;
pub mod error;
pub mod network;
pub mod ports;
pub mod services;
pub mod value_objects;

pub use error::H2HError;
pub use value_objects::{
    Chunk, ChunkSize, ContentHash, DhtParameters, EncryptedPayload, EncryptionKeyPair, HybridPayload, KeyId,
    PeerAddress, PrivateKey, ProcessId, PublicKey, UserId, VersionKey,
};
