// /////////////////////////////////////////////////////////////////////////////
// Hive2Hive RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Content Hash Value Object
//!
//! MD5 digest of plaintext file content. The digest is stored in the
//! file index and compared before downloads: a matching on-disk digest
//! means the download is a no-op. MD5 is a wire-format requirement of
//! the deployed network, not a security boundary; tamper resistance
//! comes from the authenticated chunk ciphers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Read;
use std::path::Path;

use crate::H2HError;

/// MD5 digest of a file's plaintext bytes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 16]);

impl ContentHash {
    /// Computes the digest of an in-memory byte slice
    pub fn of_bytes(bytes: &[u8]) -> Self {
        Self(md5::compute(bytes).0)
    }

    /// Computes the digest of a file on disk, streaming in 64 KiB reads.
    ///
    /// # Errors
    /// Returns `H2HError::IoError` when the file cannot be read.
    pub fn of_file(path: &Path) -> Result<Self, H2HError> {
        let mut file = std::fs::File::open(path)?;
        let mut context = md5::Context::new();
        let mut buffer = [0u8; 64 * 1024];
        loop {
            let read = file.read(&mut buffer)?;
            if read == 0 {
                break;
            }
            context.consume(&buffer[..read]);
        }
        Ok(Self(context.compute().0))
    }

    /// Wraps a digest produced by an incremental MD5 context
    pub fn from_digest(digest: md5::Digest) -> Self {
        Self(digest.0)
    }

    /// Returns the raw digest bytes
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Returns the lowercase hex rendering used by the sidecar file
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parses a digest from its hex rendering.
    ///
    /// # Errors
    /// Returns `H2HError::SerializationError` for malformed input.
    pub fn from_hex(s: &str) -> Result<Self, H2HError> {
        let bytes = hex::decode(s).map_err(|e| H2HError::SerializationError(format!("invalid md5 hex: {}", e)))?;
        let array: [u8; 16] = bytes
            .try_into()
            .map_err(|_| H2HError::SerializationError("md5 digest must be 16 bytes".to_string()))?;
        Ok(Self(array))
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    /// Tests digest computation over in-memory bytes.
    ///
    /// Validates that:
    /// - Equal content yields equal digests
    /// - Different content yields different digests
    /// - The well-known MD5 of the empty input is produced
    #[test]
    fn test_digest_of_bytes() {
        assert_eq!(ContentHash::of_bytes(b"abc"), ContentHash::of_bytes(b"abc"));
        assert_ne!(ContentHash::of_bytes(b"abc"), ContentHash::of_bytes(b"abd"));
        assert_eq!(ContentHash::of_bytes(b"").to_hex(), "d41d8cd98f00b204e9800998ecf8427e");
    }

    /// Tests that streaming file digests match the in-memory digest.
    #[test]
    fn test_digest_of_file_matches_bytes() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let content = vec![7u8; 200 * 1024];
        file.write_all(&content).unwrap();
        file.flush().unwrap();

        let from_file = ContentHash::of_file(file.path()).unwrap();
        assert_eq!(from_file, ContentHash::of_bytes(&content));
    }

    /// Tests hex round-trip of a digest.
    #[test]
    fn test_hex_round_trip() {
        let hash = ContentHash::of_bytes(b"round trip");
        assert_eq!(ContentHash::from_hex(&hash.to_hex()).unwrap(), hash);
        assert!(ContentHash::from_hex("zz").is_err());
        assert!(ContentHash::from_hex("aabb").is_err());
    }
}
