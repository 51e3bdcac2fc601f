// /////////////////////////////////////////////////////////////////////////////
// Hive2Hive RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Entities
//!
//! Long-lived domain objects with identity and lifecycle: the user's
//! credentials and encrypted profile, the index tree describing the
//! virtual file hierarchy, per-file meta-files with their version
//! chains, and the locations set of a user's logged-in peers.

mod index;
mod locations;
mod meta_file;
mod user_credentials;
mod user_profile;

pub use index::{FileIndex, FolderIndex, Index, PermissionType, UserPermission};
pub use locations::{LocationEntry, Locations};
pub use meta_file::{FileVersion, MetaChunk, MetaFile};
pub use user_credentials::UserCredentials;
pub use user_profile::UserProfile;
