// /////////////////////////////////////////////////////////////////////////////
// Hive2Hive RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Meta-File
//!
//! The per-file index stored in the DHT: the ordered version history and
//! the chunk key pair that hybrid-encrypts every chunk of every version.
//! The meta-file lives at the location key given by the file's node
//! public key and is itself hybrid-encrypted under that node key, so
//! only profile holders and share participants can open it.
//!
//! ## Invariants
//!
//! - Versions are sorted ascending by integer `index`; the newest is the
//!   tail. `add_version` assigns the next index itself, so gaps and
//!   reorderings cannot be constructed.
//! - Within one version, meta-chunks are ordered 0..n with no gaps.
//! - Retention evicts oldest-first and never removes the last remaining
//!   version. Eviction triggers when the version count exceeds
//!   `max_versions` or the byte total strictly exceeds `max_total_size`;
//!   a total exactly at the limit is kept.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::{ContentHash, EncryptionKeyPair, KeyId};
use crate::H2HError;

/// Reference to one stored chunk of one file version.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MetaChunk {
    chunk_id: String,
    order: u32,
    chunk_hash: ContentHash,
}

impl MetaChunk {
    /// Creates a chunk reference
    pub fn new(chunk_id: impl Into<String>, order: u32, chunk_hash: ContentHash) -> Self {
        Self {
            chunk_id: chunk_id.into(),
            order,
            chunk_hash,
        }
    }

    /// Returns the chunk's DHT location key
    pub fn chunk_id(&self) -> &str {
        &self.chunk_id
    }

    /// Returns the 0-based position within the version
    pub fn order(&self) -> u32 {
        self.order
    }

    /// Returns the plaintext digest of the chunk
    pub fn chunk_hash(&self) -> &ContentHash {
        &self.chunk_hash
    }
}

/// One committed version of a file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileVersion {
    index: u32,
    size: u64,
    timestamp: DateTime<Utc>,
    chunks: Vec<MetaChunk>,
}

impl FileVersion {
    fn new(index: u32, size: u64, chunks: Vec<MetaChunk>) -> Self {
        Self {
            index,
            size,
            timestamp: Utc::now(),
            chunks,
        }
    }

    /// Returns the version index
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Returns the plaintext size in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Returns the commit timestamp
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Returns the ordered chunk references
    pub fn chunks(&self) -> &[MetaChunk] {
        &self.chunks
    }
}

/// The DHT-stored index of one file: versions plus chunk key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MetaFile {
    id: KeyId,
    versions: Vec<FileVersion>,
    chunk_keys: EncryptionKeyPair,
}

impl MetaFile {
    /// Creates a meta-file for the given node identity
    pub fn new(id: KeyId, chunk_keys: EncryptionKeyPair) -> Self {
        Self {
            id,
            versions: Vec::new(),
            chunk_keys,
        }
    }

    /// Returns the owning node identity (file public-key fingerprint)
    pub fn id(&self) -> &KeyId {
        &self.id
    }

    /// Returns the key pair that encrypts every chunk of this file
    pub fn chunk_keys(&self) -> &EncryptionKeyPair {
        &self.chunk_keys
    }

    /// Returns the ascending version history
    pub fn versions(&self) -> &[FileVersion] {
        &self.versions
    }

    /// Returns the newest version, if any
    pub fn newest_version(&self) -> Option<&FileVersion> {
        self.versions.last()
    }

    /// Returns a version by its index
    pub fn version(&self, index: u32) -> Option<&FileVersion> {
        self.versions.iter().find(|v| v.index() == index)
    }

    /// Appends a new version holding the given chunks.
    ///
    /// The version receives the next free index; `size` is the plaintext
    /// byte total of the new content.
    ///
    /// # Errors
    /// Returns `H2HError::InvalidChunk` when the chunk orders are not
    /// exactly `0..n`.
    pub fn add_version(&mut self, size: u64, chunks: Vec<MetaChunk>) -> Result<&FileVersion, H2HError> {
        for (expected, chunk) in chunks.iter().enumerate() {
            if chunk.order() as usize != expected {
                return Err(H2HError::InvalidChunk(format!(
                    "chunk order {} at position {} breaks the 0..n ordering",
                    chunk.order(),
                    expected
                )));
            }
        }
        let index = self.versions.last().map(|v| v.index() + 1).unwrap_or(0);
        self.versions.push(FileVersion::new(index, size, chunks));
        Ok(self.versions.last().expect("version just pushed"))
    }

    /// Returns the byte total over all retained versions
    pub fn total_size(&self) -> u64 {
        self.versions.iter().map(FileVersion::size).sum()
    }

    /// Applies the retention policy, evicting oldest versions first.
    ///
    /// Evicts while the version count exceeds `max_versions` or the byte
    /// total strictly exceeds `max_total_size`, but always keeps at
    /// least one version. Returns the chunk references of every evicted
    /// version so the caller can delete them from the DHT.
    pub fn apply_retention(&mut self, max_versions: usize, max_total_size: u64) -> Vec<MetaChunk> {
        let mut evicted = Vec::new();
        while self.versions.len() > 1
            && (self.versions.len() > max_versions || self.total_size() > max_total_size)
        {
            let oldest = self.versions.remove(0);
            evicted.extend(oldest.chunks.into_iter());
        }
        evicted
    }

    /// Returns the chunk references of every retained version, used on
    /// file deletion
    pub fn all_chunks(&self) -> Vec<MetaChunk> {
        self.versions.iter().flat_map(|v| v.chunks().iter().cloned()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_objects::{PrivateKey, PublicKey};

    fn meta_file() -> MetaFile {
        let keys = EncryptionKeyPair::new(PublicKey::from_der(vec![5; 8]), PrivateKey::from_der(vec![5; 8]));
        MetaFile::new(keys.id(), keys)
    }

    fn chunks(version: u32, count: u32) -> Vec<MetaChunk> {
        (0..count)
            .map(|order| {
                MetaChunk::new(
                    format!("v{}-c{}", version, order),
                    order,
                    ContentHash::of_bytes(format!("{}-{}", version, order).as_bytes()),
                )
            })
            .collect()
    }

    /// Tests that versions receive ascending indices with the newest at
    /// the tail.
    #[test]
    fn test_version_indices_ascend() {
        let mut meta = meta_file();
        meta.add_version(10, chunks(0, 1)).unwrap();
        meta.add_version(20, chunks(1, 2)).unwrap();
        meta.add_version(30, chunks(2, 1)).unwrap();

        let indices: Vec<u32> = meta.versions().iter().map(FileVersion::index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(meta.newest_version().unwrap().index(), 2);
    }

    /// Tests rejection of gapped or reordered chunk lists.
    #[test]
    fn test_add_version_rejects_bad_chunk_order() {
        let mut meta = meta_file();
        let bad = vec![
            MetaChunk::new("c1", 1, ContentHash::of_bytes(b"a")),
            MetaChunk::new("c0", 0, ContentHash::of_bytes(b"b")),
        ];
        assert!(matches!(meta.add_version(2, bad), Err(H2HError::InvalidChunk(_))));
    }

    /// Tests count-bound retention eviction.
    ///
    /// Validates that:
    /// - With max_versions = 3, uploading v0..v4 retains exactly {v2, v3, v4}
    /// - The evicted chunk references belong to v0 and v1
    #[test]
    fn test_retention_evicts_by_count() {
        let mut meta = meta_file();
        for version in 0..5 {
            meta.add_version(1024, chunks(version, 1)).unwrap();
        }

        let evicted = meta.apply_retention(3, u64::MAX);

        let retained: Vec<u32> = meta.versions().iter().map(FileVersion::index).collect();
        assert_eq!(retained, vec![2, 3, 4]);
        let evicted_ids: Vec<&str> = evicted.iter().map(MetaChunk::chunk_id).collect();
        assert_eq!(evicted_ids, vec!["v0-c0", "v1-c0"]);
    }

    /// Tests size-bound retention eviction with the strict-exceed rule.
    ///
    /// Validates that:
    /// - A total exactly at the limit triggers no eviction
    /// - One byte over the limit evicts the oldest version
    #[test]
    fn test_retention_strict_size_comparison() {
        let mut meta = meta_file();
        meta.add_version(600, chunks(0, 1)).unwrap();
        meta.add_version(400, chunks(1, 1)).unwrap();

        assert!(meta.apply_retention(10, 1000).is_empty());
        assert_eq!(meta.versions().len(), 2);

        meta.add_version(1, chunks(2, 1)).unwrap();
        let evicted = meta.apply_retention(10, 1000);
        assert_eq!(evicted.len(), 1);
        assert_eq!(meta.versions().first().unwrap().index(), 1);
    }

    /// Tests that retention never evicts the final remaining version,
    /// even when it alone exceeds the size limit.
    #[test]
    fn test_retention_keeps_last_version() {
        let mut meta = meta_file();
        meta.add_version(5000, chunks(0, 2)).unwrap();
        assert!(meta.apply_retention(1, 100).is_empty());
        assert_eq!(meta.versions().len(), 1);
    }
}
