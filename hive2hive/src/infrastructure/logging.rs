// /////////////////////////////////////////////////////////////////////////////
// Hive2Hive RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Infrastructure Logging
//!
//! Structured logging for the node, built on `tracing`. The library
//! itself only emits events; installing a subscriber is the embedding
//! application's choice, with [`init_logging`] as the conventional
//! opt-in setup (env-filtered, compact, stderr).
//!
//! Log levels follow one rule: `info` for committed state changes
//! (profile put, login, logout), `debug` for per-step progress, `warn`
//! for degraded-but-continuing paths (peer fallback, pruning), `error`
//! for failures that surface to the caller.

use tracing_subscriber::{fmt, EnvFilter};

/// Installs the default subscriber: env-filtered (`RUST_LOG`), compact
/// format, stderr.
///
/// Safe to call more than once; subsequent calls are no-ops because a
/// global subscriber is already set.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Tests that repeated initialization does not panic.
    #[test]
    fn test_init_logging_idempotent() {
        init_logging();
        init_logging();
    }
}
