// /////////////////////////////////////////////////////////////////////////////
// Hive2Hive RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Persistent Sidecar
//!
//! The small state file written beside a managed root at logout and
//! read back at login: the digest of every file as last synchronized
//! (`path → md5`), plus a cache of friends' public keys. The digest map
//! is what lets login detect changes made while offline; the key cache
//! saves a public-key lookup per friend on the next session.
//!
//! The sidecar lives at `<root>/.H2H_meta` as JSON. Its shape is a
//! cross-client contract; field names must not change.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use hive2hive_domain::{ContentHash, H2HError, PublicKey, UserId};

/// File name of the sidecar, relative to the managed root. Wire format.
pub const H2H_META_FILE: &str = ".H2H_meta";

/// Serialized sidecar state.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PersistentMeta {
    /// `path → md5 hex` of every synchronized file, paths `/`-joined
    /// relative to the root
    #[serde(rename = "fileTree")]
    file_tree: BTreeMap<String, String>,
    /// `userId → base64 DER` cache of known public keys
    #[serde(rename = "publicKeyCache")]
    public_key_cache: BTreeMap<String, String>,
}

impl PersistentMeta {
    /// Builds a sidecar from domain state
    pub fn from_state(
        digests: &BTreeMap<String, ContentHash>,
        key_cache: &BTreeMap<UserId, PublicKey>,
    ) -> Self {
        Self {
            file_tree: digests.iter().map(|(path, md5)| (path.clone(), md5.to_hex())).collect(),
            public_key_cache: key_cache
                .iter()
                .map(|(user, key)| (user.to_string(), BASE64.encode(key.as_der())))
                .collect(),
        }
    }

    /// Returns the digest map in domain form.
    ///
    /// # Errors
    /// Returns `H2HError::SerializationError` on a corrupt digest entry.
    pub fn digests(&self) -> Result<BTreeMap<String, ContentHash>, H2HError> {
        self.file_tree
            .iter()
            .map(|(path, hex)| Ok((path.clone(), ContentHash::from_hex(hex)?)))
            .collect()
    }

    /// Returns the public-key cache in domain form
    pub fn key_cache(&self) -> Result<BTreeMap<UserId, PublicKey>, H2HError> {
        self.public_key_cache
            .iter()
            .map(|(user, encoded)| {
                let der = BASE64
                    .decode(encoded)
                    .map_err(|e| H2HError::SerializationError(format!("invalid cached key: {}", e)))?;
                Ok((UserId::new(user.clone())?, PublicKey::from_der(der)))
            })
            .collect()
    }

    /// Reads the sidecar of a root, if one exists
    pub fn load(root: &Path) -> Result<Option<Self>, H2HError> {
        let path = root.join(H2H_META_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = std::fs::read(&path)?;
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    /// Writes the sidecar beside the root's files
    pub fn save(&self, root: &Path) -> Result<(), H2HError> {
        let bytes = serde_json::to_vec_pretty(self)?;
        std::fs::write(root.join(H2H_META_FILE), bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Tests save-then-load round-trip through the JSON file.
    ///
    /// Validates that:
    /// - Digest map and key cache survive the round-trip
    /// - A missing sidecar loads as None
    #[test]
    fn test_sidecar_round_trip() {
        let dir = tempfile::tempdir().unwrap();

        let mut digests = BTreeMap::new();
        digests.insert("docs/report.txt".to_string(), ContentHash::of_bytes(b"report"));
        let mut keys = BTreeMap::new();
        keys.insert(UserId::new("bob").unwrap(), PublicKey::from_der(vec![1, 2, 3]));

        let meta = PersistentMeta::from_state(&digests, &keys);
        meta.save(dir.path()).unwrap();

        let loaded = PersistentMeta::load(dir.path()).unwrap().unwrap();
        assert_eq!(loaded, meta);
        assert_eq!(loaded.digests().unwrap(), digests);
        assert_eq!(loaded.key_cache().unwrap(), keys);
    }

    /// Tests that an absent sidecar is not an error.
    #[test]
    fn test_missing_sidecar_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(PersistentMeta::load(dir.path()).unwrap().is_none());
    }

    /// Tests the persisted field names stay wire-stable.
    #[test]
    fn test_wire_field_names() {
        let json = serde_json::to_string(&PersistentMeta::default()).unwrap();
        assert!(json.contains("fileTree"));
        assert!(json.contains("publicKeyCache"));
    }
}
