// /////////////////////////////////////////////////////////////////////////////
// Hive2Hive RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Move Pipeline
//!
//! Re-parents (and possibly renames) a node inside the profile tree.
//! The DHT objects are untouched: meta-file and chunks stay where the
//! node key put them, because their addresses derive from key
//! identities, not paths. Both the source and the destination side's
//! share participants are notified.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

use crate::application::use_cases::OpEnv;
use crate::infrastructure::runtime::{CancelToken, ProcessStep, SequentialProcess};
use hive2hive_domain::network::DirectMessage;
use hive2hive_domain::{H2HError, KeyId, UserId};

struct MoveContext {
    env: Arc<OpEnv>,
    source_abs: PathBuf,
    destination_abs: PathBuf,
    source_rel: PathBuf,
    destination_rel: PathBuf,
    node_id: Mutex<Option<KeyId>>,
    new_parent_id: Mutex<Option<KeyId>>,
    profile_moved: AtomicBool,
    local_moved: AtomicBool,
    recipients: Mutex<BTreeSet<UserId>>,
}

fn file_name_of(path: &PathBuf) -> Result<String, H2HError> {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| H2HError::IllegalFileLocation("path has no file name".to_string()))
}

struct MoveInProfileStep;

#[async_trait]
impl ProcessStep<MoveContext> for MoveInProfileStep {
    fn name(&self) -> &str {
        "move-in-profile"
    }

    async fn execute(&self, ctx: &MoveContext, token: &CancelToken) -> Result<(), H2HError> {
        token.ensure_active()?;

        // Share participants of both ends get notified; collect them
        // while the node is still at the source.
        let profile = ctx.env.read_profile().await?;
        let mut recipients = ctx.env.recipients_for(&profile, &ctx.source_rel);
        recipients.extend(ctx.env.recipients_for(&profile, &ctx.destination_rel));
        *ctx.recipients.lock() = recipients;

        let source_rel = ctx.source_rel.clone();
        let destination_rel = ctx.destination_rel.clone();
        let (node_id, new_parent_id) = ctx
            .env
            .modify_profile(move |profile| {
                let source_name = file_name_of(&source_rel)?;
                let destination_name = file_name_of(&destination_rel)?;

                if profile.root().node_at(&source_rel).is_none() {
                    return Err(H2HError::IllegalFileLocation(format!(
                        "'{}' is not synchronized",
                        source_rel.display()
                    )));
                }
                if profile.root().node_at(&destination_rel).is_some() {
                    return Err(H2HError::IllegalFileLocation(format!(
                        "'{}' already exists",
                        destination_rel.display()
                    )));
                }

                let source_parent = profile
                    .root_mut()
                    .parent_of_mut(&source_rel)
                    .ok_or_else(|| H2HError::IllegalFileLocation("source parent vanished".to_string()))?;
                let mut node = source_parent.remove(&source_name)?;
                let node_id = node.id();
                node.rename(destination_name);

                let destination_parent = profile
                    .root_mut()
                    .parent_of_mut(&destination_rel)
                    .ok_or_else(|| {
                        H2HError::IllegalFileLocation("destination parent folder is not synchronized".to_string())
                    })?;
                let new_parent_id = destination_parent.id();
                destination_parent.insert(node)?;
                Ok((node_id, new_parent_id))
            })
            .await?;

        *ctx.node_id.lock() = Some(node_id);
        *ctx.new_parent_id.lock() = Some(new_parent_id);
        ctx.profile_moved.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(&self, ctx: &MoveContext) -> Result<(), H2HError> {
        if !ctx.profile_moved.load(Ordering::SeqCst) {
            return Ok(());
        }
        let source_rel = ctx.source_rel.clone();
        let destination_rel = ctx.destination_rel.clone();
        ctx.env
            .modify_profile(move |profile| {
                let source_name = file_name_of(&source_rel)?;
                let destination_name = file_name_of(&destination_rel)?;

                let destination_parent = match profile.root_mut().parent_of_mut(&destination_rel) {
                    Some(parent) => parent,
                    None => return Ok(()),
                };
                let mut node = match destination_parent.remove(&destination_name) {
                    Ok(node) => node,
                    Err(_) => return Ok(()),
                };
                node.rename(source_name);
                match profile.root_mut().parent_of_mut(&source_rel) {
                    Some(parent) => parent.insert(node),
                    None => Ok(()),
                }
            })
            .await
    }
}

struct MoveLocalFileStep;

#[async_trait]
impl ProcessStep<MoveContext> for MoveLocalFileStep {
    fn name(&self) -> &str {
        "move-local-file"
    }

    async fn execute(&self, ctx: &MoveContext, token: &CancelToken) -> Result<(), H2HError> {
        token.ensure_active()?;
        if ctx.source_abs.exists() {
            std::fs::rename(&ctx.source_abs, &ctx.destination_abs)?;
            ctx.local_moved.store(true, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn rollback(&self, ctx: &MoveContext) -> Result<(), H2HError> {
        if ctx.local_moved.load(Ordering::SeqCst) {
            std::fs::rename(&ctx.destination_abs, &ctx.source_abs)?;
        }
        Ok(())
    }
}

struct NotifyMoveStep;

#[async_trait]
impl ProcessStep<MoveContext> for NotifyMoveStep {
    fn name(&self) -> &str {
        "notify"
    }

    async fn execute(&self, ctx: &MoveContext, token: &CancelToken) -> Result<(), H2HError> {
        token.ensure_active()?;

        let (Some(file_id), Some(new_parent_id)) = (ctx.node_id.lock().clone(), ctx.new_parent_id.lock().clone())
        else {
            return Ok(());
        };
        let message = DirectMessage::FileMoved {
            sender: ctx.env.session.user_id().clone(),
            file_id,
            new_parent_id,
            new_name: file_name_of(&ctx.destination_rel)?,
            source: ctx.source_rel.to_string_lossy().replace('\\', "/"),
            destination: ctx.destination_rel.to_string_lossy().replace('\\', "/"),
        };
        let recipients = ctx.recipients.lock().clone();
        ctx.env.notify(&recipients, message).await;
        Ok(())
    }
}

/// Runs the move pipeline between two locations below the managed root.
pub async fn run(env: Arc<OpEnv>, source_abs: PathBuf, destination_abs: PathBuf) -> Result<(), H2HError> {
    let source_rel = env.session.relativize(&source_abs)?;
    let destination_rel = env.session.relativize(&destination_abs)?;

    let ctx = MoveContext {
        env,
        source_abs,
        destination_abs,
        source_rel: source_rel.clone(),
        destination_rel: destination_rel.clone(),
        node_id: Mutex::new(None),
        new_parent_id: Mutex::new(None),
        profile_moved: AtomicBool::new(false),
        local_moved: AtomicBool::new(false),
        recipients: Mutex::new(BTreeSet::new()),
    };

    let process = SequentialProcess::new("move")
        .with_step(Arc::new(MoveInProfileStep) as Arc<dyn ProcessStep<MoveContext>>)
        .with_step(Arc::new(MoveLocalFileStep))
        .with_step(Arc::new(NotifyMoveStep));

    match process.execute_blocking(&ctx).await {
        Ok(()) => {
            info!(from = %source_rel.display(), to = %destination_rel.display(), "move committed");
            Ok(())
        }
        Err(error) => {
            warn!(from = %source_rel.display(), %error, "move failed and rolled back");
            Err(error)
        }
    }
}
