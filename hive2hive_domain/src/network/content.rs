// /////////////////////////////////////////////////////////////////////////////
// Hive2Hive RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # DHT Content Variants
//!
//! Everything stored under a `(location key, content key)` pair is one
//! of these variants. Retrieval is type-checked: a caller states which
//! variant it expects via the `expect_*` accessors and receives a
//! `GetFailed` on mismatch instead of a runtime cast failure.
//!
//! Profile, meta-file, and chunk content arrive as ciphertext envelopes;
//! the locations set and the user public-key slot are stored in the
//! clear (they are the bootstrap data a friend needs before any shared
//! key exists).

use serde::{Deserialize, Serialize};

use crate::entities::Locations;
use crate::value_objects::{EncryptedPayload, HybridPayload, PublicKey};
use crate::H2HError;

/// Tagged content of one DHT slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum NetworkContent {
    /// Password-encrypted user profile
    EncryptedProfile(EncryptedPayload),
    /// Meta-file, hybrid-encrypted under the file's node key
    EncryptedMetaFile(HybridPayload),
    /// File chunk, hybrid-encrypted under the file's chunk key
    EncryptedChunk(HybridPayload),
    /// A user's logged-in peers
    Locations(Locations),
    /// A user's public key
    PublicKey(PublicKey),
}

impl NetworkContent {
    /// Returns the variant name for diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            NetworkContent::EncryptedProfile(_) => "EncryptedProfile",
            NetworkContent::EncryptedMetaFile(_) => "EncryptedMetaFile",
            NetworkContent::EncryptedChunk(_) => "EncryptedChunk",
            NetworkContent::Locations(_) => "Locations",
            NetworkContent::PublicKey(_) => "PublicKey",
        }
    }

    /// Expects an encrypted profile payload.
    ///
    /// # Errors
    /// Returns `H2HError::GetFailed` when the slot holds another variant.
    pub fn expect_profile(self) -> Result<EncryptedPayload, H2HError> {
        match self {
            NetworkContent::EncryptedProfile(payload) => Ok(payload),
            other => Err(mismatch("EncryptedProfile", other.kind())),
        }
    }

    /// Expects an encrypted meta-file payload
    pub fn expect_meta_file(self) -> Result<HybridPayload, H2HError> {
        match self {
            NetworkContent::EncryptedMetaFile(payload) => Ok(payload),
            other => Err(mismatch("EncryptedMetaFile", other.kind())),
        }
    }

    /// Expects an encrypted chunk payload
    pub fn expect_chunk(self) -> Result<HybridPayload, H2HError> {
        match self {
            NetworkContent::EncryptedChunk(payload) => Ok(payload),
            other => Err(mismatch("EncryptedChunk", other.kind())),
        }
    }

    /// Expects a locations set
    pub fn expect_locations(self) -> Result<Locations, H2HError> {
        match self {
            NetworkContent::Locations(locations) => Ok(locations),
            other => Err(mismatch("Locations", other.kind())),
        }
    }

    /// Expects a public key
    pub fn expect_public_key(self) -> Result<PublicKey, H2HError> {
        match self {
            NetworkContent::PublicKey(key) => Ok(key),
            other => Err(mismatch("PublicKey", other.kind())),
        }
    }
}

fn mismatch(expected: &str, found: &str) -> H2HError {
    H2HError::GetFailed(format!("expected {} content, found {}", expected, found))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_objects::UserId;

    /// Tests that expect accessors return the payload on a tag match
    /// and a GetFailed on a mismatch.
    #[test]
    fn test_expect_accessors() {
        let locations = Locations::new(UserId::new("alice").unwrap());
        let content = NetworkContent::Locations(locations.clone());
        assert_eq!(content.clone().expect_locations().unwrap(), locations);

        let err = content.expect_profile().unwrap_err();
        assert!(matches!(err, H2HError::GetFailed(_)));
        assert!(err.to_string().contains("Locations"));
    }
}
