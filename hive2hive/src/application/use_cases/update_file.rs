// /////////////////////////////////////////////////////////////////////////////
// Hive2Hive RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Update File Pipeline
//!
//! Commits a new version of an already-synchronized file:
//!
//! 1. validate and resolve the file's node keys,
//! 2. fetch the current meta-file,
//! 3. chunk, encrypt, and store the new content under fresh chunk ids,
//! 4. append the new version and apply the retention policy,
//! 5. refresh the index digest through a profile modify cycle,
//! 6. delete the chunks of evicted versions,
//! 7. notify co-owning peers.
//!
//! Retention runs before the meta-file put: versions are evicted
//! oldest-first while the count exceeds `max_num_of_versions` or the
//! byte total strictly exceeds `max_size_all_versions`, and at least
//! one version always survives. Evicted chunks are removed only after
//! the profile committed, so a failure earlier never orphans live data.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::application::services::storage;
use crate::application::use_cases::OpEnv;
use crate::infrastructure::runtime::{CancelToken, ProcessStep, SequentialProcess};
use hive2hive_domain::entities::{Index, MetaChunk, MetaFile};
use hive2hive_domain::network::DirectMessage;
use hive2hive_domain::services::FileChunker;
use hive2hive_domain::{ContentHash, EncryptionKeyPair, H2HError, UserId};

struct UpdateFileContext {
    env: Arc<OpEnv>,
    absolute_path: PathBuf,
    relative_path: PathBuf,
    node_keys: Mutex<Option<EncryptionKeyPair>>,
    previous_md5: Mutex<Option<ContentHash>>,
    new_md5: Mutex<Option<ContentHash>>,
    total_size: Mutex<u64>,
    original_meta: Mutex<Option<MetaFile>>,
    uploaded: Mutex<Vec<MetaChunk>>,
    evicted: Mutex<Vec<MetaChunk>>,
    meta_replaced: AtomicBool,
    profile_updated: AtomicBool,
    recipients: Mutex<BTreeSet<UserId>>,
}

impl UpdateFileContext {
    fn node_keys(&self) -> Result<EncryptionKeyPair, H2HError> {
        self.node_keys
            .lock()
            .clone()
            .ok_or_else(|| H2HError::internal_error("node keys not resolved"))
    }
}

struct ValidateUpdateStep;

#[async_trait]
impl ProcessStep<UpdateFileContext> for ValidateUpdateStep {
    fn name(&self) -> &str {
        "validate"
    }

    async fn execute(&self, ctx: &UpdateFileContext, token: &CancelToken) -> Result<(), H2HError> {
        token.ensure_active()?;

        if !ctx.absolute_path.is_file() {
            return Err(H2HError::IllegalFileLocation(format!(
                "'{}' is not a file",
                ctx.absolute_path.display()
            )));
        }
        let size = std::fs::metadata(&ctx.absolute_path)?.len();
        if size > ctx.env.config.max_file_size {
            return Err(H2HError::IllegalFileLocation(format!(
                "'{}' has {} bytes, exceeding the configured maximum of {}",
                ctx.absolute_path.display(),
                size,
                ctx.env.config.max_file_size
            )));
        }

        let profile = ctx.env.read_profile().await?;
        let file = profile
            .root()
            .node_at(&ctx.relative_path)
            .and_then(Index::as_file)
            .ok_or_else(|| {
                H2HError::IllegalFileLocation(format!(
                    "'{}' is not a synchronized file",
                    ctx.relative_path.display()
                ))
            })?;

        *ctx.node_keys.lock() = Some(file.node_keys().clone());
        *ctx.previous_md5.lock() = Some(*file.md5());
        *ctx.recipients.lock() = ctx.env.recipients_for(&profile, &ctx.relative_path);
        Ok(())
    }
}

struct FetchMetaStep;

#[async_trait]
impl ProcessStep<UpdateFileContext> for FetchMetaStep {
    fn name(&self) -> &str {
        "fetch-meta-file"
    }

    async fn execute(&self, ctx: &UpdateFileContext, token: &CancelToken) -> Result<(), H2HError> {
        token.ensure_active()?;
        let meta_file = storage::fetch_meta_file(&ctx.env.dht, &ctx.env.asymmetric, &ctx.node_keys()?).await?;
        *ctx.original_meta.lock() = Some(meta_file);
        Ok(())
    }
}

struct UploadNewChunksStep;

#[async_trait]
impl ProcessStep<UpdateFileContext> for UploadNewChunksStep {
    fn name(&self) -> &str {
        "upload-chunks"
    }

    async fn execute(&self, ctx: &UpdateFileContext, token: &CancelToken) -> Result<(), H2HError> {
        token.ensure_active()?;

        let chunker = FileChunker::new(ctx.env.config.chunk_size()?);
        let split = chunker.split_file(&ctx.absolute_path)?;
        *ctx.new_md5.lock() = Some(split.md5);
        *ctx.total_size.lock() = split.total_size;

        let meta_guard = ctx.original_meta.lock().clone();
        let meta_file = meta_guard.ok_or_else(|| H2HError::internal_error("meta-file not fetched"))?;
        storage::upload_chunks(
            &ctx.env.dht,
            &ctx.env.asymmetric,
            &split.chunks,
            meta_file.chunk_keys().public(),
            &ctx.node_keys()?,
            ctx.env.config.ttl.chunk(),
            &ctx.uploaded,
        )
        .await
    }

    async fn rollback(&self, ctx: &UpdateFileContext) -> Result<(), H2HError> {
        let uploaded = ctx.uploaded.lock().clone();
        if uploaded.is_empty() {
            return Ok(());
        }
        storage::remove_chunks(&ctx.env.dht, &uploaded, &ctx.node_keys()?).await
    }
}

struct ReplaceMetaStep;

#[async_trait]
impl ProcessStep<UpdateFileContext> for ReplaceMetaStep {
    fn name(&self) -> &str {
        "replace-meta-file"
    }

    async fn execute(&self, ctx: &UpdateFileContext, token: &CancelToken) -> Result<(), H2HError> {
        token.ensure_active()?;

        let mut meta_file = ctx
            .original_meta
            .lock()
            .clone()
            .ok_or_else(|| H2HError::internal_error("meta-file not fetched"))?;

        let mut chunks = ctx.uploaded.lock().clone();
        chunks.sort_by_key(MetaChunk::order);
        meta_file.add_version(*ctx.total_size.lock(), chunks)?;

        let evicted = meta_file.apply_retention(
            ctx.env.config.max_num_of_versions,
            ctx.env.config.max_size_all_versions,
        );
        debug!(
            versions = meta_file.versions().len(),
            evicted = evicted.len(),
            "retention applied"
        );
        *ctx.evicted.lock() = evicted;

        storage::put_meta_file(
            &ctx.env.dht,
            &ctx.env.asymmetric,
            &meta_file,
            &ctx.node_keys()?,
            ctx.env.config.ttl.meta_file(),
        )
        .await?;
        ctx.meta_replaced.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(&self, ctx: &UpdateFileContext) -> Result<(), H2HError> {
        if !ctx.meta_replaced.load(Ordering::SeqCst) {
            return Ok(());
        }
        // Restore the pre-update meta-file
        let original = ctx.original_meta.lock().clone();
        match original {
            Some(meta_file) => {
                storage::put_meta_file(
                    &ctx.env.dht,
                    &ctx.env.asymmetric,
                    &meta_file,
                    &ctx.node_keys()?,
                    ctx.env.config.ttl.meta_file(),
                )
                .await
            }
            None => Ok(()),
        }
    }
}

struct UpdateProfileStep;

#[async_trait]
impl ProcessStep<UpdateFileContext> for UpdateProfileStep {
    fn name(&self) -> &str {
        "update-profile"
    }

    async fn execute(&self, ctx: &UpdateFileContext, token: &CancelToken) -> Result<(), H2HError> {
        token.ensure_active()?;

        let md5 = ctx
            .new_md5
            .lock()
            .clone()
            .ok_or_else(|| H2HError::internal_error("new digest missing"))?;
        let relative_path = ctx.relative_path.clone();
        ctx.env
            .modify_profile(move |profile| {
                let file = profile
                    .root_mut()
                    .node_at_mut(&relative_path)
                    .and_then(Index::as_file_mut)
                    .ok_or_else(|| {
                        H2HError::IllegalFileLocation(format!(
                            "'{}' vanished from the profile",
                            relative_path.display()
                        ))
                    })?;
                file.set_md5(md5);
                Ok(())
            })
            .await?;
        ctx.profile_updated.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(&self, ctx: &UpdateFileContext) -> Result<(), H2HError> {
        if !ctx.profile_updated.load(Ordering::SeqCst) {
            return Ok(());
        }
        let Some(previous) = ctx.previous_md5.lock().clone() else {
            return Ok(());
        };
        let relative_path = ctx.relative_path.clone();
        ctx.env
            .modify_profile(move |profile| {
                if let Some(file) = profile
                    .root_mut()
                    .node_at_mut(&relative_path)
                    .and_then(Index::as_file_mut)
                {
                    file.set_md5(previous);
                }
                Ok(())
            })
            .await
    }
}

struct DeleteEvictedChunksStep;

#[async_trait]
impl ProcessStep<UpdateFileContext> for DeleteEvictedChunksStep {
    fn name(&self) -> &str {
        "delete-evicted-chunks"
    }

    async fn execute(&self, ctx: &UpdateFileContext, token: &CancelToken) -> Result<(), H2HError> {
        token.ensure_active()?;

        let evicted = ctx.evicted.lock().clone();
        if evicted.is_empty() {
            return Ok(());
        }
        // The version history no longer references these chunks; a
        // failed removal leaves garbage, not corruption.
        if let Err(error) = storage::remove_chunks(&ctx.env.dht, &evicted, &ctx.node_keys()?).await {
            warn!(%error, "evicted chunk cleanup incomplete");
        }
        Ok(())
    }
}

struct NotifyUpdateStep;

#[async_trait]
impl ProcessStep<UpdateFileContext> for NotifyUpdateStep {
    fn name(&self) -> &str {
        "notify"
    }

    async fn execute(&self, ctx: &UpdateFileContext, token: &CancelToken) -> Result<(), H2HError> {
        token.ensure_active()?;

        let (Some(md5), Ok(node_keys)) = (ctx.new_md5.lock().clone(), ctx.node_keys()) else {
            return Ok(());
        };
        let message = DirectMessage::FileUpdated {
            sender: ctx.env.session.user_id().clone(),
            file_id: node_keys.id(),
            md5,
            path: ctx.relative_path.to_string_lossy().replace('\\', "/"),
        };
        let recipients = ctx.recipients.lock().clone();
        ctx.env.notify(&recipients, message).await;
        Ok(())
    }
}

/// Runs the update pipeline for a synchronized file with new local
/// content.
pub async fn run(env: Arc<OpEnv>, absolute_path: PathBuf) -> Result<(), H2HError> {
    let relative_path = env.session.relativize(&absolute_path)?;

    let ctx = UpdateFileContext {
        env,
        absolute_path,
        relative_path: relative_path.clone(),
        node_keys: Mutex::new(None),
        previous_md5: Mutex::new(None),
        new_md5: Mutex::new(None),
        total_size: Mutex::new(0),
        original_meta: Mutex::new(None),
        uploaded: Mutex::new(Vec::new()),
        evicted: Mutex::new(Vec::new()),
        meta_replaced: AtomicBool::new(false),
        profile_updated: AtomicBool::new(false),
        recipients: Mutex::new(BTreeSet::new()),
    };

    let process = SequentialProcess::new("update-file")
        .with_step(Arc::new(ValidateUpdateStep) as Arc<dyn ProcessStep<UpdateFileContext>>)
        .with_step(Arc::new(FetchMetaStep))
        .with_step(Arc::new(UploadNewChunksStep))
        .with_step(Arc::new(ReplaceMetaStep))
        .with_step(Arc::new(UpdateProfileStep))
        .with_step(Arc::new(DeleteEvictedChunksStep))
        .with_step(Arc::new(NotifyUpdateStep));

    match process.execute_blocking(&ctx).await {
        Ok(()) => {
            info!(path = %relative_path.display(), "update committed");
            Ok(())
        }
        Err(error) => {
            warn!(path = %relative_path.display(), %error, "update failed and rolled back");
            Err(error)
        }
    }
}
