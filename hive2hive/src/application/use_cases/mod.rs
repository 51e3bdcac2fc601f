// /////////////////////////////////////////////////////////////////////////////
// Hive2Hive RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Operation Pipelines
//!
//! Every high-level operation is a sequential process over steps
//! sharing a typed context, with compensations that undo committed
//! work in reverse order on failure. The pipelines mutate the profile
//! exclusively through the profile manager's modify cycle and finish by
//! fanning out notifications to co-owning peers.

pub mod add_file;
pub mod delete_file;
pub mod download_file;
pub mod login;
pub mod logout;
pub mod move_file;
pub mod recover_file;
pub mod register;
pub mod share_folder;
pub mod update_file;

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

use crate::application::services::{NotificationService, Session};
use crate::infrastructure::config::H2HConfig;
use hive2hive_domain::entities::UserProfile;
use hive2hive_domain::network::DirectMessage;
use hive2hive_domain::ports::DataManager;
use hive2hive_domain::services::{AsymmetricCryptor, SymmetricCryptor};
use hive2hive_domain::{H2HError, ProcessId, UserId};

/// Everything a pipeline step needs besides its own context fields.
pub struct OpEnv {
    pub config: H2HConfig,
    pub dht: Arc<dyn DataManager>,
    pub symmetric: Arc<dyn SymmetricCryptor>,
    pub asymmetric: Arc<dyn AsymmetricCryptor>,
    pub session: Arc<Session>,
    pub notifier: NotificationService,
}

impl OpEnv {
    /// Reads the profile without taking the put slot
    pub async fn read_profile(&self) -> Result<UserProfile, H2HError> {
        self.session
            .profile_manager()
            .get_user_profile(ProcessId::generate(), false)
            .await
    }

    /// Runs one full modify cycle: get with put intent, apply `mutate`,
    /// then commit, or abort the window when `mutate` rejects.
    pub async fn modify_profile<R, F>(&self, mutate: F) -> Result<R, H2HError>
    where
        R: Send,
        F: FnOnce(&mut UserProfile) -> Result<R, H2HError> + Send,
    {
        let manager = self.session.profile_manager();
        let pid = ProcessId::generate();
        let mut profile = manager.get_user_profile(pid, true).await?;

        match mutate(&mut profile) {
            Ok(value) => {
                manager.ready_to_put(profile, pid).await?;
                manager.wait_for_put(pid).await?;
                Ok(value)
            }
            Err(error) => {
                manager.abort_modification(pid);
                let _ = manager.wait_for_put(pid).await;
                Err(error)
            }
        }
    }

    /// Collects the notification recipients of a change at `path`: the
    /// owning user plus every share participant along the path
    pub fn recipients_for(&self, profile: &UserProfile, path: &Path) -> BTreeSet<UserId> {
        let mut recipients: BTreeSet<UserId> = profile
            .root()
            .permissions_along(path)
            .into_iter()
            .map(|p| p.user_id().clone())
            .collect();
        recipients.insert(self.session.user_id().clone());
        recipients
    }

    /// Fans a message out, best-effort: delivery problems are logged,
    /// never failing the already-committed operation
    pub async fn notify(&self, recipients: &BTreeSet<UserId>, message: DirectMessage) {
        let result = self
            .notifier
            .notify(self.session.user_id(), self.session.peer_address(), recipients, message)
            .await;
        if let Err(error) = result {
            warn!(%error, "notification fan-out degraded");
        }
    }
}
