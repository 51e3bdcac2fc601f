// /////////////////////////////////////////////////////////////////////////////
// Hive2Hive RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Chunk Value Object
//!
//! An immutable slice of a file's plaintext bytes. Chunks are produced
//! in strict offset order by the chunker, hybrid-encrypted under the
//! file's chunk key, and stored independently in the DHT under fresh
//! location keys. Once put, a chunk is never overwritten; new file
//! versions use new chunk ids.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::value_objects::ContentHash;

/// Immutable plaintext chunk of a file.
///
/// `order` is the 0-based position within one file version; `id` is the
/// DHT location key the chunk will be stored under. Chunks are value
/// objects: processing never mutates one in place.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    id: String,
    order: u32,
    data: Vec<u8>,
}

impl Chunk {
    /// Creates a chunk with a fresh random DHT location key
    pub fn new(order: u32, data: Vec<u8>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            order,
            data,
        }
    }

    /// Re-creates a chunk with an existing id, as read back from the DHT
    pub fn with_id(id: String, order: u32, data: Vec<u8>) -> Self {
        Self { id, order, data }
    }

    /// Returns the DHT location key
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the 0-based position within the file version
    pub fn order(&self) -> u32 {
        self.order
    }

    /// Returns the plaintext bytes
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consumes the chunk and returns its bytes
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Returns the chunk length in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true for a zero-length chunk
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Computes the integrity digest stored in the meta-chunk
    pub fn hash(&self) -> ContentHash {
        ContentHash::of_bytes(&self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Tests chunk construction and accessors.
    ///
    /// Validates that:
    /// - Fresh chunks receive unique ids
    /// - Order and data are preserved
    /// - The integrity hash matches the data
    #[test]
    fn test_chunk_creation() {
        let a = Chunk::new(0, vec![1, 2, 3]);
        let b = Chunk::new(1, vec![4, 5]);
        assert_ne!(a.id(), b.id());
        assert_eq!(a.order(), 0);
        assert_eq!(b.len(), 2);
        assert_eq!(a.hash(), ContentHash::of_bytes(&[1, 2, 3]));
    }
}
