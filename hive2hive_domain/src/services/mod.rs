// /////////////////////////////////////////////////////////////////////////////
// Hive2Hive RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Domain Services
//!
//! Synchronous, CPU-bound domain logic: the chunk codec, the two cipher
//! contracts, and the codec helpers that pair serde with the ciphers to
//! move domain objects in and out of their overlay envelopes.
//!
//! Domain services are synchronous by design; async execution is an
//! infrastructure concern, and infrastructure can wrap these in async
//! adapters where needed.

pub mod codec;
mod chunker;
mod crypto;

pub use chunker::{FileChunker, SplitResult};
pub use crypto::{AsymmetricCryptor, SymmetricCryptor};
