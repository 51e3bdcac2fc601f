// /////////////////////////////////////////////////////////////////////////////
// Hive2Hive RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Chunk Size Value Object
//!
//! Validated size of a file chunk. Chunk sizes bound both the memory a
//! peer commits per upload/download round-trip and the size of a single
//! DHT object, so the valid window is deliberately narrow: 1 KiB through
//! 32 MiB. The default of 1 MiB matches the deployed network.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::H2HError;

/// Minimum chunk size: 1 KiB
pub const MIN_CHUNK_SIZE: usize = 1024;

/// Maximum chunk size: 32 MiB
pub const MAX_CHUNK_SIZE: usize = 32 * 1024 * 1024;

/// Default chunk size: 1 MiB
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Validated chunk size in bytes.
///
/// A `ChunkSize` is always within `[MIN_CHUNK_SIZE, MAX_CHUNK_SIZE]`;
/// construction enforces the window so downstream code never re-checks.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct ChunkSize(usize);

impl ChunkSize {
    /// Creates a new chunk size.
    ///
    /// # Errors
    /// Returns `H2HError::InvalidConfiguration` when the size falls
    /// outside the valid window.
    pub fn new(bytes: usize) -> Result<Self, H2HError> {
        if !(MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&bytes) {
            return Err(H2HError::InvalidConfiguration(format!(
                "chunk size {} outside valid range [{}, {}]",
                bytes, MIN_CHUNK_SIZE, MAX_CHUNK_SIZE
            )));
        }
        Ok(Self(bytes))
    }

    /// Returns the size in bytes
    pub fn bytes(&self) -> usize {
        self.0
    }
}

impl Default for ChunkSize {
    fn default() -> Self {
        Self(DEFAULT_CHUNK_SIZE)
    }
}

impl fmt::Display for ChunkSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} bytes", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Tests ChunkSize creation with valid input values.
    ///
    /// Validates that:
    /// - The minimum valid size (1 KiB) is accepted
    /// - Common sizes are handled correctly
    /// - The maximum valid size (32 MiB) is accepted
    #[test]
    fn test_chunk_size_creation_valid_cases() {
        assert_eq!(ChunkSize::new(MIN_CHUNK_SIZE).unwrap().bytes(), MIN_CHUNK_SIZE);
        assert_eq!(ChunkSize::new(64 * 1024).unwrap().bytes(), 64 * 1024);
        assert_eq!(ChunkSize::new(MAX_CHUNK_SIZE).unwrap().bytes(), MAX_CHUNK_SIZE);
    }

    /// Tests ChunkSize creation with invalid input values.
    ///
    /// Validates that:
    /// - Zero and sub-minimum sizes are rejected
    /// - Sizes above the maximum are rejected
    #[test]
    fn test_chunk_size_creation_invalid_cases() {
        assert!(ChunkSize::new(0).is_err());
        assert!(ChunkSize::new(MIN_CHUNK_SIZE - 1).is_err());
        assert!(ChunkSize::new(MAX_CHUNK_SIZE + 1).is_err());
    }

    /// Tests that the default chunk size is 1 MiB.
    #[test]
    fn test_chunk_size_default() {
        assert_eq!(ChunkSize::default().bytes(), DEFAULT_CHUNK_SIZE);
    }
}
