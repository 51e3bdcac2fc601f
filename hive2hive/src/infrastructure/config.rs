// /////////////////////////////////////////////////////////////////////////////
// Hive2Hive RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Configuration
//!
//! Immutable configuration of one Hive2Hive node. The struct is built
//! once (from defaults or a TOML document) and passed by reference at
//! construction; there is no global state and no runtime mutation.
//!
//! ## Options
//!
//! - `chunk_size` — plaintext bytes per chunk
//! - `max_file_size` — upper bound a single upload may have
//! - `max_num_of_versions` / `max_size_all_versions` — version retention
//! - `file_observer_interval_ms` — poll interval of an external
//!   file-system observer (carried in configuration; the observer
//!   itself lives outside this crate)
//! - `max_modification_time_ms` — the profile manager's exclusive
//!   modification window (deployed default: 1000 ms)
//! - `aes_key_length` / `rsa_key_length` — cipher parameters
//! - `[ttl]` — one time-to-live per content kind, surfaced verbatim on
//!   puts; absent values mean "no expiry"

use serde::Deserialize;
use std::time::Duration;

use hive2hive_domain::{ChunkSize, H2HError};

/// Per-content-kind time-to-live settings, in seconds.
///
/// `None` disables expiry for that kind. Mutable objects (profile,
/// locations) conventionally never expire; chunks of long-deleted files
/// are the reason chunk TTLs exist at all.
#[derive(Debug, Clone, Copy, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct TtlConfig {
    pub user_profile_secs: Option<u64>,
    pub meta_file_secs: Option<u64>,
    pub chunk_secs: Option<u64>,
    pub locations_secs: Option<u64>,
    pub user_public_key_secs: Option<u64>,
    pub user_message_queue_secs: Option<u64>,
}

impl TtlConfig {
    /// TTL for the user profile slot
    pub fn user_profile(&self) -> Option<Duration> {
        self.user_profile_secs.map(Duration::from_secs)
    }

    /// TTL for meta-file slots
    pub fn meta_file(&self) -> Option<Duration> {
        self.meta_file_secs.map(Duration::from_secs)
    }

    /// TTL for chunk slots
    pub fn chunk(&self) -> Option<Duration> {
        self.chunk_secs.map(Duration::from_secs)
    }

    /// TTL for the locations slot
    pub fn locations(&self) -> Option<Duration> {
        self.locations_secs.map(Duration::from_secs)
    }

    /// TTL for the public-key slot
    pub fn user_public_key(&self) -> Option<Duration> {
        self.user_public_key_secs.map(Duration::from_secs)
    }

    /// TTL for the buffered message queue slot
    pub fn user_message_queue(&self) -> Option<Duration> {
        self.user_message_queue_secs.map(Duration::from_secs)
    }
}

/// Immutable node configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct H2HConfig {
    pub chunk_size: usize,
    pub max_file_size: u64,
    pub max_num_of_versions: usize,
    pub max_size_all_versions: u64,
    pub file_observer_interval_ms: u64,
    pub max_modification_time_ms: u64,
    pub aes_key_length: usize,
    pub rsa_key_length: usize,
    pub ttl: TtlConfig,
}

impl Default for H2HConfig {
    fn default() -> Self {
        Self {
            chunk_size: ChunkSize::default().bytes(),
            max_file_size: 25 * 1024 * 1024,
            max_num_of_versions: 10,
            max_size_all_versions: 100 * 1024 * 1024,
            file_observer_interval_ms: 1000,
            max_modification_time_ms: 1000,
            aes_key_length: 32,
            rsa_key_length: 2048,
            ttl: TtlConfig::default(),
        }
    }
}

impl H2HConfig {
    /// Parses a configuration from a TOML document, filling unset
    /// options with defaults.
    ///
    /// # Errors
    /// Returns `H2HError::InvalidConfiguration` on malformed TOML or
    /// out-of-range values.
    pub fn from_toml_str(document: &str) -> Result<Self, H2HError> {
        let config: H2HConfig = toml::from_str(document)
            .map_err(|e| H2HError::InvalidConfiguration(format!("configuration parse error: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates cross-field constraints
    pub fn validate(&self) -> Result<(), H2HError> {
        // ChunkSize::new carries the range check
        let chunk_size = self.chunk_size()?;
        if self.max_file_size < chunk_size.bytes() as u64 {
            return Err(H2HError::InvalidConfiguration(format!(
                "max_file_size {} is smaller than one chunk ({})",
                self.max_file_size, chunk_size
            )));
        }
        if self.max_num_of_versions == 0 {
            return Err(H2HError::InvalidConfiguration(
                "max_num_of_versions must be at least 1".to_string(),
            ));
        }
        if self.max_modification_time_ms == 0 {
            return Err(H2HError::InvalidConfiguration(
                "max_modification_time_ms must be positive".to_string(),
            ));
        }
        if self.aes_key_length != 32 {
            return Err(H2HError::InvalidConfiguration(format!(
                "aes_key_length {} unsupported; the profile cipher uses 32-byte keys",
                self.aes_key_length
            )));
        }
        if self.rsa_key_length < 1024 {
            return Err(H2HError::InvalidConfiguration(format!(
                "rsa_key_length {} too small to wrap a content key",
                self.rsa_key_length
            )));
        }
        Ok(())
    }

    /// Returns the validated chunk size
    pub fn chunk_size(&self) -> Result<ChunkSize, H2HError> {
        ChunkSize::new(self.chunk_size)
    }

    /// Returns the exclusive modification window of the profile manager
    pub fn max_modification_time(&self) -> Duration {
        Duration::from_millis(self.max_modification_time_ms)
    }

    /// Returns the file observer poll interval
    pub fn file_observer_interval(&self) -> Duration {
        Duration::from_millis(self.file_observer_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Tests that defaults validate and carry the deployed values.
    ///
    /// Validates that:
    /// - The default configuration passes validation
    /// - The modification window defaults to 1000 ms
    /// - No TTLs are set by default
    #[test]
    fn test_default_config() {
        let config = H2HConfig::default();
        config.validate().unwrap();
        assert_eq!(config.max_modification_time(), Duration::from_millis(1000));
        assert!(config.ttl.chunk().is_none());
    }

    /// Tests TOML parsing with partial overrides.
    #[test]
    fn test_from_toml_partial_override() {
        let config = H2HConfig::from_toml_str(
            r#"
            chunk_size = 65536
            max_num_of_versions = 3

            [ttl]
            chunk_secs = 86400
            "#,
        )
        .unwrap();

        assert_eq!(config.chunk_size, 65536);
        assert_eq!(config.max_num_of_versions, 3);
        assert_eq!(config.ttl.chunk(), Some(Duration::from_secs(86400)));
        // Untouched options keep their defaults
        assert_eq!(config.max_modification_time_ms, 1000);
    }

    /// Tests rejection of invalid option combinations.
    #[test]
    fn test_validation_rejects_bad_values() {
        assert!(H2HConfig::from_toml_str("chunk_size = 10").is_err());
        assert!(H2HConfig::from_toml_str("max_num_of_versions = 0").is_err());
        assert!(H2HConfig::from_toml_str("rsa_key_length = 512").is_err());
        assert!(H2HConfig::from_toml_str("unknown_option = 1").is_err());
    }
}
