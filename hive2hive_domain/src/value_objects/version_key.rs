// /////////////////////////////////////////////////////////////////////////////
// Hive2Hive RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Version Key Value Object
//!
//! Identifier of one committed version of a mutable DHT object. A put
//! that carries a `based_on` key is only accepted when that key equals
//! the overlay's currently stored version key; the succession of
//! `(based_on, version)` pairs forms the hash chain that rejects stale
//! writers.
//!
//! Keys order by wall-clock timestamp first and a random nonce second,
//! so a sequence generated by one writer is strictly monotonic and two
//! concurrent writers practically never collide.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One link in the version chain of a mutable DHT object.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VersionKey {
    timestamp_ms: i64,
    nonce: u64,
}

impl VersionKey {
    /// Generates a fresh version key stamped with the current time
    pub fn generate() -> Self {
        Self {
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            nonce: rand::thread_rng().next_u64(),
        }
    }

    /// Returns the creation timestamp in milliseconds since the epoch
    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp_ms
    }
}

impl fmt::Display for VersionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:016x}", self.timestamp_ms, self.nonce)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Tests that successive keys from one writer are strictly ascending.
    ///
    /// Validates that:
    /// - Generated keys are unique
    /// - Ordering follows generation order (timestamp, then nonce)
    #[test]
    fn test_version_key_generation() {
        let a = VersionKey::generate();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = VersionKey::generate();
        assert_ne!(a, b);
        assert!(a < b);
    }

    /// Tests serde round-trip of a version key.
    #[test]
    fn test_version_key_serde_round_trip() {
        let key = VersionKey::generate();
        let json = serde_json::to_string(&key).unwrap();
        let back: VersionKey = serde_json::from_str(&json).unwrap();
        assert_eq!(key, back);
    }
}
