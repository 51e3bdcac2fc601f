// /////////////////////////////////////////////////////////////////////////////
// Hive2Hive RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # User Identifier Value Object
//!
//! A validated user identifier. The user id doubles as the DHT location
//! key for the user's publicly addressable objects (locations set and
//! public-key slot), so it must be stable, non-empty, and free of
//! whitespace.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::H2HError;

/// Validated identifier of a Hive2Hive user.
///
/// The identifier is used verbatim as the location key of the user's
/// `Locations` object and public-key slot, which is what makes a user
/// addressable by friends that only know the id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UserId(String);

impl UserId {
    /// Creates a new user id.
    ///
    /// # Errors
    /// Returns `H2HError::InvalidConfiguration` when the id is empty or
    /// contains whitespace.
    pub fn new(id: impl Into<String>) -> Result<Self, H2HError> {
        let id = id.into();
        if id.is_empty() {
            return Err(H2HError::InvalidConfiguration("user id must not be empty".to_string()));
        }
        if id.chars().any(char::is_whitespace) {
            return Err(H2HError::InvalidConfiguration(format!(
                "user id '{}' must not contain whitespace",
                id
            )));
        }
        Ok(Self(id))
    }

    /// Returns the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
