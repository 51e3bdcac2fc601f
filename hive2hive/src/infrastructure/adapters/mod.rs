// /////////////////////////////////////////////////////////////////////////////
// Hive2Hive RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Infrastructure Adapters
//!
//! Concrete implementations of the domain's cipher contracts and ports:
//! the password-based profile cipher, the hybrid envelope cipher, the
//! in-memory overlay, and the persistent login/logout sidecar.

mod aes_cryptor;
mod memory_dht;
mod rsa_cryptor;
mod sidecar;

pub use aes_cryptor::AesCryptor;
pub use memory_dht::MemoryDht;
pub use rsa_cryptor::RsaCryptor;
pub use sidecar::{PersistentMeta, H2H_META_FILE};
