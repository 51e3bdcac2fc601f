// /////////////////////////////////////////////////////////////////////////////
// Hive2Hive RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Remote Event Handler
//!
//! The message handler a logged-in peer registers with the overlay. Two
//! kinds of traffic arrive here:
//!
//! - **Same-user notifications** from the user's other clients. The
//!   shared profile in the DHT already carries the change; this peer
//!   only refreshes its local view (delegated to the file-observer
//!   boundary), so the message is acknowledged and logged.
//! - **Share-participant notifications** from friends. The friend
//!   mutated their own profile and the shared meta-files; this handler
//!   mirrors the change into *our* profile through a regular
//!   profile-manager modify cycle, addressing nodes by key identity
//!   (paths differ between participants, identities do not).
//!
//! A message whose subject is not in our tree is acknowledged and
//! dropped; the sender cannot know our share layout.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::application::services::Session;
use hive2hive_domain::entities::{Index, UserProfile};
use hive2hive_domain::network::{AcceptanceReply, DirectMessage};
use hive2hive_domain::ports::MessageHandler;
use hive2hive_domain::{H2HError, KeyId, ProcessId};

/// Applies incoming notifications to the local session.
pub struct RemoteEventHandler {
    session: Arc<Session>,
}

impl RemoteEventHandler {
    /// Creates a handler bound to one session
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    async fn apply(&self, message: DirectMessage) -> Result<(), H2HError> {
        let manager = self.session.profile_manager();
        let pid = ProcessId::generate();
        let mut profile = manager.get_user_profile(pid, true).await?;

        let changed = match &message {
            DirectMessage::FileAdded { parent_id, index, .. } => {
                Self::apply_added(&mut profile, parent_id, index.clone())
            }
            DirectMessage::FileUpdated { file_id, md5, .. } => Self::apply_updated(&mut profile, file_id, md5),
            DirectMessage::FileDeleted { file_id, .. } => Self::apply_deleted(&mut profile, file_id),
            DirectMessage::FileMoved {
                file_id,
                new_parent_id,
                new_name,
                ..
            } => Self::apply_moved(&mut profile, file_id, new_parent_id, new_name),
            DirectMessage::ShareGranted { folder, .. } => {
                let node = Index::Folder(folder.clone());
                if profile.root().child(folder.name()).is_some() {
                    warn!(folder = folder.name(), "share name collides with existing node, grant dropped");
                    false
                } else {
                    profile.root_mut().insert(node).is_ok()
                }
            }
        };

        if changed {
            manager.ready_to_put(profile, pid).await?;
            manager.wait_for_put(pid).await?;
            info!(kind = message.kind(), "remote change mirrored into profile");
        } else {
            manager.abort_modification(pid);
            let _ = manager.wait_for_put(pid).await;
            debug!(kind = message.kind(), "remote change not applicable, dropped");
        }
        Ok(())
    }

    fn apply_added(profile: &mut UserProfile, parent_id: &KeyId, index: Index) -> bool {
        let Some(parent_path) = profile.root().path_of(parent_id) else {
            return false;
        };
        match profile
            .root_mut()
            .node_at_mut(&PathBuf::from(parent_path))
            .and_then(Index::as_folder_mut)
        {
            Some(folder) if folder.child(index.name()).is_none() => folder.insert(index).is_ok(),
            _ => false,
        }
    }

    fn apply_updated(profile: &mut UserProfile, file_id: &KeyId, md5: &hive2hive_domain::ContentHash) -> bool {
        let Some(path) = profile.root().path_of(file_id) else {
            return false;
        };
        match profile
            .root_mut()
            .node_at_mut(&PathBuf::from(path))
            .and_then(Index::as_file_mut)
        {
            Some(file) => {
                file.set_md5(*md5);
                true
            }
            None => false,
        }
    }

    fn apply_deleted(profile: &mut UserProfile, file_id: &KeyId) -> bool {
        let Some(path) = profile.root().path_of(file_id) else {
            return false;
        };
        let path = PathBuf::from(path);
        let Some(name) = path.file_name().map(|n| n.to_string_lossy().to_string()) else {
            return false;
        };
        match profile.root_mut().parent_of_mut(&path) {
            Some(parent) => parent.remove(&name).is_ok(),
            None => false,
        }
    }

    fn apply_moved(profile: &mut UserProfile, file_id: &KeyId, new_parent_id: &KeyId, new_name: &str) -> bool {
        let Some(source_path) = profile.root().path_of(file_id) else {
            return false;
        };
        if profile.root().path_of(new_parent_id).is_none() {
            // Destination folder is not shared with us; treat as a
            // removal from our visible subtree.
            return Self::apply_deleted(profile, file_id);
        }

        let source_path = PathBuf::from(source_path);
        let Some(name) = source_path.file_name().map(|n| n.to_string_lossy().to_string()) else {
            return false;
        };
        let mut node = match profile.root_mut().parent_of_mut(&source_path) {
            Some(parent) => match parent.remove(&name) {
                Ok(node) => node,
                Err(_) => return false,
            },
            None => return false,
        };
        node.rename(new_name);

        let destination = profile
            .root()
            .path_of(new_parent_id)
            .expect("destination checked above");
        match profile
            .root_mut()
            .node_at_mut(&PathBuf::from(destination))
            .and_then(Index::as_folder_mut)
        {
            Some(folder) => folder.insert(node).is_ok(),
            None => false,
        }
    }
}

#[async_trait]
impl MessageHandler for RemoteEventHandler {
    async fn handle(&self, message: DirectMessage) -> AcceptanceReply {
        if message.sender() == self.session.user_id() {
            // Our own user's other client; the DHT profile already has
            // the change, the local view refresh belongs to the file
            // observer.
            debug!(kind = message.kind(), "same-user notification received");
            return AcceptanceReply::Ok;
        }

        match self.apply(message).await {
            Ok(()) => AcceptanceReply::Ok,
            Err(error) => {
                warn!(%error, "failed to apply remote change");
                AcceptanceReply::Failure
            }
        }
    }
}
