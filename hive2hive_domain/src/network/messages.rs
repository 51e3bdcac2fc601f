// /////////////////////////////////////////////////////////////////////////////
// Hive2Hive RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Direct Messages
//!
//! Peer-to-peer notifications sent after a committed file operation.
//! Messages fan out to the sender's other clients (view refresh) and to
//! share participants, who apply the change to their own profile.
//!
//! Nodes are addressed by key identity, not by path: a shared subtree
//! may be mounted at a different path in every participant's profile,
//! but node identities are stable everywhere. The `path` fields carry
//! the sender-side path for logging and local view refresh only.
//!
//! Delivery is acknowledged with an [`AcceptanceReply`]; anything but
//! `Ok` makes the notifier fall back to the recipient's next peer.

use serde::{Deserialize, Serialize};

use crate::entities::{FolderIndex, Index, PermissionType};
use crate::value_objects::{ContentHash, KeyId, UserId};

/// Acknowledgement of a direct message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AcceptanceReply {
    /// Message accepted and handled
    Ok,
    /// Message rejected or the peer is unreachable
    Failure,
    /// Message accepted, handling deferred
    FutureFailure,
}

/// A notification sent directly between peers.
///
/// Messages that introduce new tree nodes carry the node itself, key
/// material included; that is what lets a share participant mirror the
/// change without another profile round-trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DirectMessage {
    /// A node appeared under the folder with identity `parent_id`
    FileAdded {
        sender: UserId,
        parent_id: KeyId,
        index: Index,
        path: String,
    },
    /// The file with identity `file_id` has a new version
    FileUpdated {
        sender: UserId,
        file_id: KeyId,
        md5: ContentHash,
        path: String,
    },
    /// The node with identity `file_id` was removed
    FileDeleted {
        sender: UserId,
        file_id: KeyId,
        path: String,
    },
    /// The node moved below `new_parent_id` under `new_name`
    FileMoved {
        sender: UserId,
        file_id: KeyId,
        new_parent_id: KeyId,
        new_name: String,
        source: String,
        destination: String,
    },
    /// The sender shared `folder` with the receiver
    ShareGranted {
        sender: UserId,
        folder: FolderIndex,
        permission: PermissionType,
    },
}

impl DirectMessage {
    /// Returns the sending user
    pub fn sender(&self) -> &UserId {
        match self {
            DirectMessage::FileAdded { sender, .. }
            | DirectMessage::FileUpdated { sender, .. }
            | DirectMessage::FileDeleted { sender, .. }
            | DirectMessage::FileMoved { sender, .. }
            | DirectMessage::ShareGranted { sender, .. } => sender,
        }
    }

    /// Returns the message kind for diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            DirectMessage::FileAdded { .. } => "FileAdded",
            DirectMessage::FileUpdated { .. } => "FileUpdated",
            DirectMessage::FileDeleted { .. } => "FileDeleted",
            DirectMessage::FileMoved { .. } => "FileMoved",
            DirectMessage::ShareGranted { .. } => "ShareGranted",
        }
    }
}
