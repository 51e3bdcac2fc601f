// /////////////////////////////////////////////////////////////////////////////
// Hive2Hive RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Delete File Pipeline
//!
//! Removes a file (or empty folder) from synchronization: the index
//! node leaves the profile first, then the now-unreachable meta-file
//! and every chunk of every version are deleted from the overlay, and
//! co-owners are notified.
//!
//! The profile removal is the only compensable step; once DHT deletion
//! starts, the data is gone and the pipeline does not pretend
//! otherwise. Deleting the profile entry first keeps any concurrent
//! reader consistent: they either see the file fully present or fully
//! absent, never an index pointing at deleted chunks.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::application::services::storage;
use crate::application::use_cases::OpEnv;
use crate::infrastructure::runtime::{CancelToken, ProcessStep, SequentialProcess};
use hive2hive_domain::entities::Index;
use hive2hive_domain::network::DirectMessage;
use hive2hive_domain::{H2HError, UserId};

struct DeleteFileContext {
    env: Arc<OpEnv>,
    relative_path: PathBuf,
    removed: Mutex<Option<Index>>,
    recipients: Mutex<BTreeSet<UserId>>,
}

struct RemoveFromProfileStep;

#[async_trait]
impl ProcessStep<DeleteFileContext> for RemoveFromProfileStep {
    fn name(&self) -> &str {
        "remove-from-profile"
    }

    async fn execute(&self, ctx: &DeleteFileContext, token: &CancelToken) -> Result<(), H2HError> {
        token.ensure_active()?;

        // Recipients must be collected before the node (and with it the
        // share grants along its path) disappears.
        let profile = ctx.env.read_profile().await?;
        *ctx.recipients.lock() = ctx.env.recipients_for(&profile, &ctx.relative_path);

        let relative_path = ctx.relative_path.clone();
        let removed = ctx
            .env
            .modify_profile(move |profile| {
                let name = relative_path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .ok_or_else(|| H2HError::IllegalFileLocation("path has no file name".to_string()))?;

                let node = profile.root().node_at(&relative_path).ok_or_else(|| {
                    H2HError::IllegalFileLocation(format!("'{}' is not synchronized", relative_path.display()))
                })?;
                if let Some(folder) = node.as_folder() {
                    if folder.children().next().is_some() {
                        return Err(H2HError::IllegalFileLocation(format!(
                            "folder '{}' is not empty",
                            relative_path.display()
                        )));
                    }
                }

                let parent = profile
                    .root_mut()
                    .parent_of_mut(&relative_path)
                    .ok_or_else(|| H2HError::IllegalFileLocation("parent folder vanished".to_string()))?;
                parent.remove(&name)
            })
            .await?;

        *ctx.removed.lock() = Some(removed);
        Ok(())
    }

    async fn rollback(&self, ctx: &DeleteFileContext) -> Result<(), H2HError> {
        let Some(node) = ctx.removed.lock().clone() else {
            return Ok(());
        };
        let relative_path = ctx.relative_path.clone();
        ctx.env
            .modify_profile(move |profile| {
                match profile.root_mut().parent_of_mut(&relative_path) {
                    Some(parent) if parent.child(node.name()).is_none() => parent.insert(node),
                    _ => Ok(()),
                }
            })
            .await
    }
}

struct DeleteNetworkDataStep;

#[async_trait]
impl ProcessStep<DeleteFileContext> for DeleteNetworkDataStep {
    fn name(&self) -> &str {
        "delete-network-data"
    }

    async fn execute(&self, ctx: &DeleteFileContext, token: &CancelToken) -> Result<(), H2HError> {
        token.ensure_active()?;

        let Some(node) = ctx.removed.lock().clone() else {
            return Ok(());
        };
        let Some(file) = node.as_file() else {
            // Folders own no network data of their own
            return Ok(());
        };
        let node_keys = file.node_keys().clone();

        let meta_file = match storage::fetch_meta_file(&ctx.env.dht, &ctx.env.asymmetric, &node_keys).await {
            Ok(meta_file) => meta_file,
            Err(error) => {
                // Nothing left to clean if the meta-file is already gone
                warn!(%error, "meta-file unavailable during delete, skipping chunk cleanup");
                return Ok(());
            }
        };

        if let Err(error) = storage::remove_chunks(&ctx.env.dht, &meta_file.all_chunks(), &node_keys).await {
            warn!(%error, "chunk cleanup incomplete during delete");
        }
        storage::remove_meta_file(&ctx.env.dht, &node_keys).await
    }
}

struct NotifyDeleteStep;

#[async_trait]
impl ProcessStep<DeleteFileContext> for NotifyDeleteStep {
    fn name(&self) -> &str {
        "notify"
    }

    async fn execute(&self, ctx: &DeleteFileContext, token: &CancelToken) -> Result<(), H2HError> {
        token.ensure_active()?;

        let Some(node) = ctx.removed.lock().clone() else {
            return Ok(());
        };
        let message = DirectMessage::FileDeleted {
            sender: ctx.env.session.user_id().clone(),
            file_id: node.id(),
            path: ctx.relative_path.to_string_lossy().replace('\\', "/"),
        };
        let recipients = ctx.recipients.lock().clone();
        ctx.env.notify(&recipients, message).await;
        Ok(())
    }
}

/// Runs the delete pipeline for a synchronized file or empty folder.
pub async fn run(env: Arc<OpEnv>, absolute_path: PathBuf) -> Result<(), H2HError> {
    let relative_path = env.session.relativize(&absolute_path)?;

    let ctx = DeleteFileContext {
        env,
        relative_path: relative_path.clone(),
        removed: Mutex::new(None),
        recipients: Mutex::new(BTreeSet::new()),
    };

    let process = SequentialProcess::new("delete-file")
        .with_step(Arc::new(RemoveFromProfileStep) as Arc<dyn ProcessStep<DeleteFileContext>>)
        .with_step(Arc::new(DeleteNetworkDataStep))
        .with_step(Arc::new(NotifyDeleteStep));

    match process.execute_blocking(&ctx).await {
        Ok(()) => {
            info!(path = %relative_path.display(), "delete committed");
            Ok(())
        }
        Err(error) => {
            warn!(path = %relative_path.display(), %error, "delete failed and rolled back");
            Err(error)
        }
    }
}
