// /////////////////////////////////////////////////////////////////////////////
// Hive2Hive RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Process Identifier Value Object
//!
//! Identity of a profile-manager client. Every top-level operation that
//! touches the user profile obtains a fresh `ProcessId`; the manager's
//! worker uses it to track which caller currently holds the exclusive
//! modification window.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identity of one profile get/modify/put cycle.
///
/// The id is handed to `get_user_profile` and later to `ready_to_put`;
/// the profile manager only accepts a put from the process id that owns
/// the currently open modification window.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ProcessId(Uuid);

impl ProcessId {
    /// Generates a fresh process id
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form is enough for log correlation
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

impl Default for ProcessId {
    fn default() -> Self {
        Self::generate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Tests that generated process ids are unique.
    #[test]
    fn test_process_id_uniqueness() {
        let a = ProcessId::generate();
        let b = ProcessId::generate();
        assert_ne!(a, b);
    }
}
