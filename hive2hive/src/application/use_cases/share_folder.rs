// /////////////////////////////////////////////////////////////////////////////
// Hive2Hive RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Share Folder Pipeline
//!
//! Grants a friend access to a folder subtree:
//!
//! 1. resolve the friend's public key (and cache it),
//! 2. record the grant in the folder's permission set through a
//!    profile modify cycle (the owner is recorded as a write
//!    participant alongside),
//! 3. hand the subtree, node keys included, to the friend via a
//!    `ShareGranted` message.
//!
//! Possessing the node keys is what access *means* here: meta-files and
//! chunks are encrypted and write-protected under them. Revocation
//! beyond re-encryption on a later write is out of scope.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

use crate::application::services::storage;
use crate::application::use_cases::OpEnv;
use crate::infrastructure::runtime::{CancelToken, ProcessStep, SequentialProcess};
use hive2hive_domain::entities::{FolderIndex, Index, PermissionType, UserPermission};
use hive2hive_domain::network::DirectMessage;
use hive2hive_domain::{H2HError, UserId};

struct ShareContext {
    env: Arc<OpEnv>,
    relative_path: PathBuf,
    friend: UserId,
    permission: PermissionType,
    granted: AtomicBool,
    shared_folder: Mutex<Option<FolderIndex>>,
}

struct ResolveFriendStep;

#[async_trait]
impl ProcessStep<ShareContext> for ResolveFriendStep {
    fn name(&self) -> &str {
        "resolve-friend"
    }

    async fn execute(&self, ctx: &ShareContext, token: &CancelToken) -> Result<(), H2HError> {
        token.ensure_active()?;

        if &ctx.friend == ctx.env.session.user_id() {
            return Err(H2HError::ProcessExecution("cannot share a folder with yourself".to_string()));
        }

        // The key itself is not needed for the grant, but an unknown
        // friend must fail the share before any profile mutation.
        let key = match ctx.env.session.cached_key(&ctx.friend) {
            Some(key) => key,
            None => storage::fetch_public_key(&ctx.env.dht, &ctx.friend).await?,
        };
        ctx.env.session.cache_key(ctx.friend.clone(), key);
        Ok(())
    }
}

struct GrantPermissionStep;

#[async_trait]
impl ProcessStep<ShareContext> for GrantPermissionStep {
    fn name(&self) -> &str {
        "grant-permission"
    }

    async fn execute(&self, ctx: &ShareContext, token: &CancelToken) -> Result<(), H2HError> {
        token.ensure_active()?;

        let relative_path = ctx.relative_path.clone();
        let friend = ctx.friend.clone();
        let permission = ctx.permission;
        let owner = ctx.env.session.user_id().clone();
        let folder = ctx
            .env
            .modify_profile(move |profile| {
                let folder = profile
                    .root_mut()
                    .node_at_mut(&relative_path)
                    .and_then(Index::as_folder_mut)
                    .ok_or_else(|| {
                        H2HError::IllegalFileLocation(format!(
                            "'{}' is not a synchronized folder",
                            relative_path.display()
                        ))
                    })?;
                // The owner is a write participant of its own share, so
                // friends know whom to notify on their updates.
                if !folder.permissions().iter().any(|p| p.user_id() == &owner) {
                    folder.grant_permission(UserPermission::new(owner, PermissionType::Write));
                }
                folder.grant_permission(UserPermission::new(friend, permission));
                Ok(folder.clone())
            })
            .await?;

        *ctx.shared_folder.lock() = Some(folder);
        ctx.granted.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(&self, ctx: &ShareContext) -> Result<(), H2HError> {
        if !ctx.granted.load(Ordering::SeqCst) {
            return Ok(());
        }
        let relative_path = ctx.relative_path.clone();
        let friend = ctx.friend.clone();
        ctx.env
            .modify_profile(move |profile| {
                if let Some(folder) = profile
                    .root_mut()
                    .node_at_mut(&relative_path)
                    .and_then(Index::as_folder_mut)
                {
                    folder.revoke_permission(&friend);
                }
                Ok(())
            })
            .await
    }
}

struct NotifyFriendStep;

#[async_trait]
impl ProcessStep<ShareContext> for NotifyFriendStep {
    fn name(&self) -> &str {
        "notify-friend"
    }

    async fn execute(&self, ctx: &ShareContext, token: &CancelToken) -> Result<(), H2HError> {
        token.ensure_active()?;

        let Some(folder) = ctx.shared_folder.lock().clone() else {
            return Ok(());
        };
        let message = DirectMessage::ShareGranted {
            sender: ctx.env.session.user_id().clone(),
            folder,
            permission: ctx.permission,
        };
        let mut recipients = BTreeSet::new();
        recipients.insert(ctx.friend.clone());
        // The friend must actually receive the keys; an exhausted
        // recipient here fails the share.
        ctx.env
            .notifier
            .notify(
                ctx.env.session.user_id(),
                ctx.env.session.peer_address(),
                &recipients,
                message,
            )
            .await?;
        Ok(())
    }
}

/// Runs the share pipeline for a folder below the managed root.
pub async fn run(
    env: Arc<OpEnv>,
    absolute_path: PathBuf,
    friend: UserId,
    permission: PermissionType,
) -> Result<(), H2HError> {
    let relative_path = env.session.relativize(&absolute_path)?;

    let ctx = ShareContext {
        env,
        relative_path: relative_path.clone(),
        friend: friend.clone(),
        permission,
        granted: AtomicBool::new(false),
        shared_folder: Mutex::new(None),
    };

    let process = SequentialProcess::new("share-folder")
        .with_step(Arc::new(ResolveFriendStep) as Arc<dyn ProcessStep<ShareContext>>)
        .with_step(Arc::new(GrantPermissionStep))
        .with_step(Arc::new(NotifyFriendStep));

    match process.execute_blocking(&ctx).await {
        Ok(()) => {
            info!(path = %relative_path.display(), %friend, "share committed");
            Ok(())
        }
        Err(error) => {
            warn!(path = %relative_path.display(), %friend, %error, "share failed and rolled back");
            Err(error)
        }
    }
}
