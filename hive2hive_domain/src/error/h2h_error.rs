// /////////////////////////////////////////////////////////////////////////////
// Hive2Hive RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Domain Error System
//!
//! This module provides the single, hierarchical error type for the
//! Hive2Hive domain. Every fallible operation in the workspace returns
//! `Result<_, H2HError>`; there is no hidden unwinding and no `anyhow`
//! in library code.
//!
//! ## Error Categories
//!
//! The variants map onto the failure kinds of a distributed overlay:
//!
//! - **Overlay reads**: `GetFailed` — absence, decrypt failure, or a
//!   transport error while reading
//! - **Overlay writes**: `PutFailed`, `VersionConflict`, `RemoveFailed` —
//!   stale version chains, protection-key mismatches, encrypt failures,
//!   transport errors, and the profile-manager modification-window timeout
//! - **Messaging**: `SendFailed` — a direct message could not be delivered
//! - **Session**: `NoPeerConnection`, `NoSession` — the overlay is not
//!   joined, or no user is logged in on this peer
//! - **Files**: `IllegalFileLocation`, `InvalidChunk`, `IntegrityError` —
//!   paths outside the managed root, malformed chunks, digest mismatches
//! - **Processes**: `InvalidProcessState`, `ProcessExecution`,
//!   `AbortedByUser` — lifecycle violations, domain failures that trigger
//!   rollback, and cooperative cancellation
//! - **Crypto and codecs**: `EncryptionError`, `DecryptionError`,
//!   `SerializationError`
//! - **Ambient**: `IoError`, `InvalidConfiguration`, `InternalError`
//!
//! ## Recovery Classification
//!
//! `is_recoverable()` marks the transient kinds (`GetFailed`,
//! `SendFailed`, `VersionConflict`, `IoError`): a caller that re-gets and
//! retries may succeed. The remaining kinds require intervention.

use thiserror::Error;

/// Unified error type for the Hive2Hive domain.
///
/// Variants carry a human-readable message; classification helpers
/// (`category()`, `is_recoverable()`) support systematic handling and
/// structured logging without matching on every variant at each call
/// site.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum H2HError {
    #[error("Get failed: {0}")]
    GetFailed(String),

    #[error("Put failed: {0}")]
    PutFailed(String),

    #[error("Remove failed: {0}")]
    RemoveFailed(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Version conflict: {0}")]
    VersionConflict(String),

    #[error("No peer connection: {0}")]
    NoPeerConnection(String),

    #[error("No session: {0}")]
    NoSession(String),

    #[error("Illegal file location: {0}")]
    IllegalFileLocation(String),

    #[error("Invalid chunk: {0}")]
    InvalidChunk(String),

    #[error("Invalid process state: {0}")]
    InvalidProcessState(String),

    #[error("Process execution failed: {0}")]
    ProcessExecution(String),

    #[error("Aborted by user: {0}")]
    AbortedByUser(String),

    #[error("Encryption error: {0}")]
    EncryptionError(String),

    #[error("Decryption error: {0}")]
    DecryptionError(String),

    #[error("Integrity check failed: {0}")]
    IntegrityError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl H2HError {
    /// Creates a new get-failed error
    pub fn get_failed(msg: impl Into<String>) -> Self {
        Self::GetFailed(msg.into())
    }

    /// Creates a new put-failed error
    pub fn put_failed(msg: impl Into<String>) -> Self {
        Self::PutFailed(msg.into())
    }

    /// Creates a new remove-failed error
    pub fn remove_failed(msg: impl Into<String>) -> Self {
        Self::RemoveFailed(msg.into())
    }

    /// Creates a new send-failed error
    pub fn send_failed(msg: impl Into<String>) -> Self {
        Self::SendFailed(msg.into())
    }

    /// Creates a new no-session error
    pub fn no_session(msg: impl Into<String>) -> Self {
        Self::NoSession(msg.into())
    }

    /// Creates a new illegal-file-location error
    pub fn illegal_location(msg: impl Into<String>) -> Self {
        Self::IllegalFileLocation(msg.into())
    }

    /// Creates a new process-execution error
    pub fn process_execution(msg: impl Into<String>) -> Self {
        Self::ProcessExecution(msg.into())
    }

    /// Creates a new internal error
    pub fn internal_error(msg: impl Into<String>) -> Self {
        Self::InternalError(msg.into())
    }

    /// Checks if the error is recoverable by re-reading and retrying
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            H2HError::GetFailed(_) | H2HError::SendFailed(_) | H2HError::VersionConflict(_) | H2HError::IoError(_)
        )
    }

    /// Checks if the error is a security-related error
    pub fn is_security_error(&self) -> bool {
        matches!(
            self,
            H2HError::EncryptionError(_) | H2HError::DecryptionError(_) | H2HError::IntegrityError(_)
        )
    }

    /// Gets the error category for structured logging and metrics
    pub fn category(&self) -> &'static str {
        match self {
            H2HError::GetFailed(_) | H2HError::PutFailed(_) | H2HError::RemoveFailed(_) => "overlay",
            H2HError::VersionConflict(_) => "overlay",
            H2HError::SendFailed(_) => "messaging",
            H2HError::NoPeerConnection(_) | H2HError::NoSession(_) => "session",
            H2HError::IllegalFileLocation(_) | H2HError::InvalidChunk(_) | H2HError::IntegrityError(_) => "file",
            H2HError::InvalidProcessState(_) | H2HError::ProcessExecution(_) | H2HError::AbortedByUser(_) => "process",
            H2HError::EncryptionError(_) | H2HError::DecryptionError(_) => "crypto",
            H2HError::SerializationError(_) => "codec",
            H2HError::IoError(_) => "io",
            H2HError::InvalidConfiguration(_) => "configuration",
            H2HError::InternalError(_) => "system",
        }
    }
}

impl From<std::io::Error> for H2HError {
    fn from(error: std::io::Error) -> Self {
        H2HError::IoError(error.to_string())
    }
}

impl From<serde_json::Error> for H2HError {
    fn from(error: serde_json::Error) -> Self {
        H2HError::SerializationError(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Tests error category assignment across variants.
    ///
    /// Validates that:
    /// - Overlay read/write failures map to the "overlay" category
    /// - Process lifecycle failures map to the "process" category
    /// - Crypto failures map to the "crypto" category
    #[test]
    fn test_error_categories() {
        assert_eq!(H2HError::get_failed("gone").category(), "overlay");
        assert_eq!(H2HError::put_failed("stale").category(), "overlay");
        assert_eq!(H2HError::InvalidProcessState("bad".into()).category(), "process");
        assert_eq!(H2HError::EncryptionError("bad key".into()).category(), "crypto");
        assert_eq!(H2HError::no_session("none").category(), "session");
    }

    /// Tests the recoverability classification.
    ///
    /// Validates that:
    /// - Transient overlay and transport failures are recoverable
    /// - Lifecycle and security failures are not
    #[test]
    fn test_recoverable_classification() {
        assert!(H2HError::get_failed("timeout").is_recoverable());
        assert!(H2HError::VersionConflict("stale based-on".into()).is_recoverable());
        assert!(!H2HError::AbortedByUser("cancelled".into()).is_recoverable());
        assert!(!H2HError::DecryptionError("wrong key".into()).is_recoverable());
    }

    /// Tests conversion from std::io::Error.
    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: H2HError = io.into();
        assert!(matches!(err, H2HError::IoError(_)));
    }
}
