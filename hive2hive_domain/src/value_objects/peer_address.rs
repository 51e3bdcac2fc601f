// /////////////////////////////////////////////////////////////////////////////
// Hive2Hive RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Peer Address Value Object
//!
//! Opaque overlay address of one running client. The overlay assigns
//! the address at join time; the domain only needs equality (for the
//! locations set) and a printable label for diagnostics.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque address of a peer on the overlay.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeerAddress {
    id: Uuid,
    label: String,
}

impl PeerAddress {
    /// Creates a fresh address with a diagnostic label
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            label: label.into(),
        }
    }

    /// Returns the unique address id
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the diagnostic label
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.label, &self.id.to_string()[..8])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Tests that two addresses with the same label remain distinct.
    #[test]
    fn test_peer_address_identity() {
        let a = PeerAddress::new("laptop");
        let b = PeerAddress::new("laptop");
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }
}
