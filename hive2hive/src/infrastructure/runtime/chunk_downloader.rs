// /////////////////////////////////////////////////////////////////////////////
// Hive2Hive RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Chunk Downloader
//!
//! Restores on-disk order from out-of-order chunk arrival. Fetched and
//! decrypted chunks are accepted in whatever order the overlay delivers
//! them; the downloader keeps a buffer of early arrivals and greedily
//! appends every chunk whose order matches `current_chunk_order`, so
//! the destination file is only ever written front to back.
//!
//! ## Completion Invariants
//!
//! On `finish`, the buffer must be empty and `current_chunk_order` must
//! equal the expected chunk count; anything else is a protocol
//! violation (duplicate, gap, or foreign chunk) and fails the download
//! instead of producing a silently corrupt file.

use std::collections::BTreeMap;
use std::io::Write;

use hive2hive_domain::{Chunk, ContentHash, H2HError};

/// Order-restoring writer for one file download.
pub struct ChunkDownloader<W: Write> {
    destination: W,
    expected_chunks: u32,
    current_chunk_order: u32,
    buffer: BTreeMap<u32, Chunk>,
    written_bytes: u64,
}

impl<W: Write> ChunkDownloader<W> {
    /// Creates a downloader expecting `expected_chunks` chunks
    pub fn new(destination: W, expected_chunks: u32) -> Self {
        Self {
            destination,
            expected_chunks,
            current_chunk_order: 0,
            buffer: BTreeMap::new(),
            written_bytes: 0,
        }
    }

    /// Returns the next in-order chunk index expected on disk
    pub fn current_chunk_order(&self) -> u32 {
        self.current_chunk_order
    }

    /// Returns the number of chunks parked in the buffer
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Accepts one decrypted chunk, verifying its digest, and drains
    /// everything that became writable.
    ///
    /// # Errors
    /// Returns `H2HError::IntegrityError` on digest mismatch, duplicate
    /// order, or an order beyond the expected count.
    pub fn accept(&mut self, chunk: Chunk, expected_hash: &ContentHash) -> Result<(), H2HError> {
        if chunk.hash() != *expected_hash {
            return Err(H2HError::IntegrityError(format!(
                "chunk {} digest mismatch",
                chunk.order()
            )));
        }
        if chunk.order() >= self.expected_chunks {
            return Err(H2HError::IntegrityError(format!(
                "chunk order {} beyond expected count {}",
                chunk.order(),
                self.expected_chunks
            )));
        }
        if chunk.order() < self.current_chunk_order || self.buffer.contains_key(&chunk.order()) {
            return Err(H2HError::IntegrityError(format!(
                "duplicate chunk order {}",
                chunk.order()
            )));
        }

        self.buffer.insert(chunk.order(), chunk);
        self.drain()
    }

    fn drain(&mut self) -> Result<(), H2HError> {
        while let Some(chunk) = self.buffer.remove(&self.current_chunk_order) {
            self.destination.write_all(chunk.data())?;
            self.written_bytes += chunk.len() as u64;
            self.current_chunk_order += 1;
        }
        Ok(())
    }

    /// Completes the download, enforcing the completion invariants.
    ///
    /// Returns the number of bytes written.
    ///
    /// # Errors
    /// Returns `H2HError::IntegrityError` when chunks are missing or
    /// residual chunks remain buffered.
    pub fn finish(mut self) -> Result<u64, H2HError> {
        if !self.buffer.is_empty() {
            return Err(H2HError::IntegrityError(format!(
                "{} residual buffered chunks after download",
                self.buffer.len()
            )));
        }
        if self.current_chunk_order != self.expected_chunks {
            return Err(H2HError::IntegrityError(format!(
                "download incomplete: {} of {} chunks written",
                self.current_chunk_order, self.expected_chunks
            )));
        }
        self.destination.flush()?;
        Ok(self.written_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(order: u32) -> (Chunk, ContentHash) {
        let chunk = Chunk::new(order, format!("chunk-{}", order).into_bytes());
        let hash = chunk.hash();
        (chunk, hash)
    }

    /// Tests reassembly from the arrival order [3, 1, 0, 2, 4].
    ///
    /// Validates that:
    /// - Early arrivals park in the buffer
    /// - Draining is greedy once the gap fills
    /// - The reassembled bytes equal the in-order concatenation
    /// - The buffer is empty on completion
    #[test]
    fn test_out_of_order_reassembly() {
        let mut output = Vec::new();
        {
            let mut downloader = ChunkDownloader::new(&mut output, 5);
            for order in [3u32, 1, 0, 2, 4] {
                let (chunk, hash) = chunk(order);
                downloader.accept(chunk, &hash).unwrap();
            }
            assert_eq!(downloader.buffered(), 0);
            assert_eq!(downloader.current_chunk_order(), 5);
            downloader.finish().unwrap();
        }

        let expected: Vec<u8> = (0..5).flat_map(|i| format!("chunk-{}", i).into_bytes()).collect();
        assert_eq!(output, expected);
    }

    /// Tests that a missing chunk fails completion.
    #[test]
    fn test_missing_chunk_fails_finish() {
        let mut output = Vec::new();
        let mut downloader = ChunkDownloader::new(&mut output, 3);
        for order in [0u32, 2] {
            let (chunk, hash) = chunk(order);
            downloader.accept(chunk, &hash).unwrap();
        }
        assert!(matches!(downloader.finish(), Err(H2HError::IntegrityError(_))));
    }

    /// Tests rejection of duplicates and out-of-range orders.
    #[test]
    fn test_duplicate_and_foreign_chunks_rejected() {
        let mut output = Vec::new();
        let mut downloader = ChunkDownloader::new(&mut output, 2);

        let (first, first_hash) = chunk(0);
        downloader.accept(first.clone(), &first_hash).unwrap();
        assert!(downloader.accept(first, &first_hash).is_err());

        let (foreign, foreign_hash) = chunk(7);
        assert!(downloader.accept(foreign, &foreign_hash).is_err());
    }

    /// Tests digest verification per chunk.
    #[test]
    fn test_digest_mismatch_rejected() {
        let mut output = Vec::new();
        let mut downloader = ChunkDownloader::new(&mut output, 1);
        let (chunk, _) = chunk(0);
        let wrong = ContentHash::of_bytes(b"other");
        assert!(matches!(
            downloader.accept(chunk, &wrong),
            Err(H2HError::IntegrityError(_))
        ));
    }
}
