// /////////////////////////////////////////////////////////////////////////////
// Hive2Hive RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Chunk Codec
//!
//! Splits a file into independently storable chunks and joins them back.
//! A file of length `L` with chunk size `C` produces `⌈L/C⌉` chunks in
//! strict offset order, each stamped with its 0-based `order`. The
//! splitter also computes the MD5 of the whole plaintext in the same
//! pass; that digest lands in the file index and gates re-downloads.
//!
//! Joining is validated: chunk orders must be exactly `0..n`, with any
//! gap or reordering reported as an integrity failure rather than a
//! silently corrupted file.

use std::io::Read;
use std::path::Path;

use crate::value_objects::{Chunk, ChunkSize, ContentHash};
use crate::H2HError;

/// Result of splitting one file: the ordered chunks plus whole-file
/// digest and size.
#[derive(Debug)]
pub struct SplitResult {
    pub chunks: Vec<Chunk>,
    pub md5: ContentHash,
    pub total_size: u64,
}

/// Splits files into chunks and joins chunks back into files.
#[derive(Debug, Clone, Copy)]
pub struct FileChunker {
    chunk_size: ChunkSize,
}

impl FileChunker {
    /// Creates a chunker with the configured chunk size
    pub fn new(chunk_size: ChunkSize) -> Self {
        Self { chunk_size }
    }

    /// Returns the configured chunk size
    pub fn chunk_size(&self) -> ChunkSize {
        self.chunk_size
    }

    /// Splits a reader into chunks, digesting the plaintext in the same
    /// pass.
    ///
    /// An empty input produces zero chunks and the digest of the empty
    /// byte string.
    ///
    /// # Errors
    /// Returns `H2HError::IoError` when the reader fails.
    pub fn split_reader(&self, reader: &mut impl Read) -> Result<SplitResult, H2HError> {
        let mut chunks = Vec::new();
        let mut context = md5::Context::new();
        let mut total_size: u64 = 0;
        let mut order: u32 = 0;

        loop {
            let mut buffer = vec![0u8; self.chunk_size.bytes()];
            let mut filled = 0;
            // A single read may return short; fill the buffer until EOF
            // so chunk boundaries land on exact offsets.
            while filled < buffer.len() {
                let read = reader.read(&mut buffer[filled..])?;
                if read == 0 {
                    break;
                }
                filled += read;
            }
            if filled == 0 {
                break;
            }
            buffer.truncate(filled);
            context.consume(&buffer);
            total_size += filled as u64;
            chunks.push(Chunk::new(order, buffer));
            order += 1;
        }

        Ok(SplitResult {
            chunks,
            md5: ContentHash::from_digest(context.compute()),
            total_size,
        })
    }

    /// Splits a file on disk
    pub fn split_file(&self, path: &Path) -> Result<SplitResult, H2HError> {
        let mut file = std::fs::File::open(path)?;
        self.split_reader(&mut file)
    }

    /// Joins ordered chunks back into the original bytes.
    ///
    /// # Errors
    /// Returns `H2HError::IntegrityError` when the chunk orders are not
    /// exactly `0..n`.
    pub fn join(chunks: &[Chunk]) -> Result<Vec<u8>, H2HError> {
        let mut joined = Vec::with_capacity(chunks.iter().map(Chunk::len).sum());
        for (expected, chunk) in chunks.iter().enumerate() {
            if chunk.order() as usize != expected {
                return Err(H2HError::IntegrityError(format!(
                    "chunk order {} at position {} breaks the 0..n ordering",
                    chunk.order(),
                    expected
                )));
            }
            joined.extend_from_slice(chunk.data());
        }
        Ok(joined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_objects::MIN_CHUNK_SIZE;
    use proptest::prelude::*;

    fn chunker() -> FileChunker {
        FileChunker::new(ChunkSize::new(MIN_CHUNK_SIZE).unwrap())
    }

    /// Tests the ⌈L/C⌉ chunk count and strict offset ordering.
    ///
    /// Validates that:
    /// - 2.5 chunk sizes of data produce 3 chunks
    /// - Orders are 0, 1, 2 with the tail chunk short
    /// - The whole-file digest matches the input
    #[test]
    fn test_split_produces_ceil_chunks() {
        let data = vec![9u8; MIN_CHUNK_SIZE * 5 / 2];
        let result = chunker().split_reader(&mut data.as_slice()).unwrap();

        assert_eq!(result.chunks.len(), 3);
        assert_eq!(result.total_size, data.len() as u64);
        assert_eq!(result.md5, ContentHash::of_bytes(&data));
        let orders: Vec<u32> = result.chunks.iter().map(Chunk::order).collect();
        assert_eq!(orders, vec![0, 1, 2]);
        assert_eq!(result.chunks[0].len(), MIN_CHUNK_SIZE);
        assert_eq!(result.chunks[2].len(), MIN_CHUNK_SIZE / 2);
    }

    /// Tests that an empty input splits into zero chunks.
    #[test]
    fn test_split_empty_input() {
        let result = chunker().split_reader(&mut [].as_slice()).unwrap();
        assert!(result.chunks.is_empty());
        assert_eq!(result.total_size, 0);
        assert_eq!(result.md5, ContentHash::of_bytes(b""));
    }

    /// Tests join validation of gapped chunk sequences.
    #[test]
    fn test_join_rejects_gaps() {
        let chunks = vec![Chunk::new(0, vec![1]), Chunk::new(2, vec![3])];
        assert!(matches!(
            FileChunker::join(&chunks),
            Err(H2HError::IntegrityError(_))
        ));
    }

    proptest! {
        /// Property: split-then-join recovers the input bytes for any
        /// content up to several chunk sizes.
        #[test]
        fn prop_split_join_round_trip(data in proptest::collection::vec(any::<u8>(), 0..(MIN_CHUNK_SIZE * 4))) {
            let result = chunker().split_reader(&mut data.as_slice()).unwrap();
            let joined = FileChunker::join(&result.chunks).unwrap();
            prop_assert_eq!(joined, data);
        }
    }
}
