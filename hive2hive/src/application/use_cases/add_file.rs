// /////////////////////////////////////////////////////////////////////////////
// Hive2Hive RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Add File Pipeline
//!
//! Brings a new file (or folder) under synchronization:
//!
//! 1. validate the location and the profile precondition,
//! 2. chunk, encrypt, and store the content (files only),
//! 3. store the meta-file under the fresh node key (files only),
//! 4. insert the index node through a profile modify cycle,
//! 5. notify co-owning peers.
//!
//! Compensation undoes committed work in reverse: the profile entry is
//! removed, the meta-file deleted, the chunks deleted.

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
use hive2hive_domain::entities::{FileIndex, FolderIndex, Index, MetaChunk, MetaFile};
use hive2hive_domain::network::DirectMessage;
use hive2hive_domain::services::FileChunker;
use hive2hive_domain::{ContentHash, EncryptionKeyPair, H2HError, KeyId, UserId};

struct AddFileContext {
    env: Arc<OpEnv>,
    absolute_path: PathBuf,
    relative_path: PathBuf,
    is_folder: bool,
    node_keys: Mutex<Option<EncryptionKeyPair>>,
    chunk_keys: Mutex<Option<EncryptionKeyPair>>,
    md5: Mutex<Option<ContentHash>>,
    total_size: Mutex<u64>,
    uploaded: Mutex<Vec<MetaChunk>>,
    meta_put: AtomicBool,
    inserted: AtomicBool,
    parent_id: Mutex<Option<KeyId>>,
    recipients: Mutex<BTreeSet<UserId>>,
}

impl AddFileContext {
    fn node_keys(&self) -> Result<EncryptionKeyPair, H2HError> {
        self.node_keys
            .lock()
            .clone()
            .ok_or_else(|| H2HError::internal_error("node keys not yet generated"))
    }
}

struct ValidateAddStep;

#[async_trait]
impl ProcessStep<AddFileContext> for ValidateAddStep {
    fn name(&self) -> &str {
        "validate"
    }

    async fn execute(&self, ctx: &AddFileContext, token: &CancelToken) -> Result<(), H2HError> {
        token.ensure_active()?;

        if !ctx.absolute_path.exists() {
            return Err(H2HError::IllegalFileLocation(format!(
                "'{}' does not exist",
                ctx.absolute_path.display()
            )));
        }
        if !ctx.is_folder {
            let size = std::fs::metadata(&ctx.absolute_path)?.len();
            if size > ctx.env.config.max_file_size {
                return Err(H2HError::IllegalFileLocation(format!(
                    "'{}' has {} bytes, exceeding the configured maximum of {}",
                    ctx.absolute_path.display(),
                    size,
                    ctx.env.config.max_file_size
                )));
            }
        }

        let profile = ctx.env.read_profile().await?;
        if profile.root().node_at(&ctx.relative_path).is_some() {
            return Err(H2HError::IllegalFileLocation(format!(
                "'{}' is already synchronized",
                ctx.relative_path.display()
            )));
        }
        if let Some(parent) = ctx.relative_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            let parent_ok = profile
                .root()
                .node_at(parent)
                .map(Index::is_file)
                .map(|is_file| !is_file)
                .unwrap_or(false);
            if !parent_ok {
                return Err(H2HError::IllegalFileLocation(format!(
                    "parent folder '{}' is not synchronized",
                    parent.display()
                )));
            }
        }

        *ctx.node_keys.lock() = Some(ctx.env.asymmetric.generate_key_pair()?);
        Ok(())
    }
}

struct UploadChunksStep;

#[async_trait]
impl ProcessStep<AddFileContext> for UploadChunksStep {
    fn name(&self) -> &str {
        "upload-chunks"
    }

    async fn execute(&self, ctx: &AddFileContext, token: &CancelToken) -> Result<(), H2HError> {
        if ctx.is_folder {
            return Ok(());
        }
        token.ensure_active()?;

        let chunker = FileChunker::new(ctx.env.config.chunk_size()?);
        let split = chunker.split_file(&ctx.absolute_path)?;
        *ctx.md5.lock() = Some(split.md5);
        *ctx.total_size.lock() = split.total_size;

        let chunk_keys = ctx.env.asymmetric.generate_key_pair()?;
        let node_keys = ctx.node_keys()?;
        storage::upload_chunks(
            &ctx.env.dht,
            &ctx.env.asymmetric,
            &split.chunks,
            chunk_keys.public(),
            &node_keys,
            ctx.env.config.ttl.chunk(),
            &ctx.uploaded,
        )
        .await?;
        *ctx.chunk_keys.lock() = Some(chunk_keys);
        Ok(())
    }

    async fn rollback(&self, ctx: &AddFileContext) -> Result<(), H2HError> {
        let uploaded = ctx.uploaded.lock().clone();
        if uploaded.is_empty() {
            return Ok(());
        }
        let node_keys = ctx.node_keys()?;
        storage::remove_chunks(&ctx.env.dht, &uploaded, &node_keys).await
    }
}

struct PutMetaFileStep;

#[async_trait]
impl ProcessStep<AddFileContext> for PutMetaFileStep {
    fn name(&self) -> &str {
        "put-meta-file"
    }

    async fn execute(&self, ctx: &AddFileContext, token: &CancelToken) -> Result<(), H2HError> {
        if ctx.is_folder {
            return Ok(());
        }
        token.ensure_active()?;

        let node_keys = ctx.node_keys()?;
        let chunk_keys = ctx
            .chunk_keys
            .lock()
            .clone()
            .ok_or_else(|| H2HError::internal_error("chunk keys not yet generated"))?;

        let mut chunks = ctx.uploaded.lock().clone();
        chunks.sort_by_key(MetaChunk::order);

        let mut meta_file = MetaFile::new(node_keys.id(), chunk_keys);
        meta_file.add_version(*ctx.total_size.lock(), chunks)?;

        storage::put_meta_file(
            &ctx.env.dht,
            &ctx.env.asymmetric,
            &meta_file,
            &node_keys,
            ctx.env.config.ttl.meta_file(),
        )
        .await?;
        ctx.meta_put.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(&self, ctx: &AddFileContext) -> Result<(), H2HError> {
        if !ctx.meta_put.load(Ordering::SeqCst) {
            return Ok(());
        }
        storage::remove_meta_file(&ctx.env.dht, &ctx.node_keys()?).await
    }
}

struct AddToProfileStep;

#[async_trait]
impl ProcessStep<AddFileContext> for AddToProfileStep {
    fn name(&self) -> &str {
        "add-to-profile"
    }

    async fn execute(&self, ctx: &AddFileContext, token: &CancelToken) -> Result<(), H2HError> {
        token.ensure_active()?;

        let node_keys = ctx.node_keys()?;
        let name = ctx
            .relative_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| H2HError::IllegalFileLocation("path has no file name".to_string()))?;
        let node = if ctx.is_folder {
            Index::Folder(FolderIndex::new(name, node_keys))
        } else {
            let md5 = ctx
                .md5
                .lock()
                .clone()
                .ok_or_else(|| H2HError::internal_error("content digest missing"))?;
            Index::File(FileIndex::new(name, node_keys, md5))
        };

        let relative_path = ctx.relative_path.clone();
        let parent_id = ctx
            .env
            .modify_profile(move |profile| {
                let parent = profile
                    .root_mut()
                    .parent_of_mut(&relative_path)
                    .ok_or_else(|| H2HError::IllegalFileLocation("parent folder vanished".to_string()))?;
                let parent_id = parent.id();
                parent.insert(node)?;
                Ok(parent_id)
            })
            .await?;

        let profile = ctx.env.read_profile().await?;
        *ctx.recipients.lock() = ctx.env.recipients_for(&profile, &ctx.relative_path);
        *ctx.parent_id.lock() = Some(parent_id);
        ctx.inserted.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(&self, ctx: &AddFileContext) -> Result<(), H2HError> {
        if !ctx.inserted.load(Ordering::SeqCst) {
            return Ok(());
        }
        let relative_path = ctx.relative_path.clone();
        ctx.env
            .modify_profile(move |profile| {
                let name = relative_path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .ok_or_else(|| H2HError::IllegalFileLocation("path has no file name".to_string()))?;
                match profile.root_mut().parent_of_mut(&relative_path) {
                    Some(parent) => {
                        let _ = parent.remove(&name);
                        Ok(())
                    }
                    None => Ok(()),
                }
            })
            .await
    }
}

struct NotifyAddStep;

#[async_trait]
impl ProcessStep<AddFileContext> for NotifyAddStep {
    fn name(&self) -> &str {
        "notify"
    }

    async fn execute(&self, ctx: &AddFileContext, token: &CancelToken) -> Result<(), H2HError> {
        token.ensure_active()?;

        let Some(parent_id) = ctx.parent_id.lock().clone() else {
            return Ok(());
        };
        let node_keys = ctx.node_keys()?;
        let name = ctx
            .relative_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let index = if ctx.is_folder {
            Index::Folder(FolderIndex::new(name, node_keys))
        } else {
            match *ctx.md5.lock() {
                Some(md5) => Index::File(FileIndex::new(name, node_keys, md5)),
                None => return Ok(()),
            }
        };

        let message = DirectMessage::FileAdded {
            sender: ctx.env.session.user_id().clone(),
            parent_id,
            index,
            path: ctx.relative_path.to_string_lossy().replace('\\', "/"),
        };
        let recipients = ctx.recipients.lock().clone();
        ctx.env.notify(&recipients, message).await;
        Ok(())
    }
}

/// Runs the add pipeline for a file or folder below the managed root.
pub async fn run(env: Arc<OpEnv>, absolute_path: PathBuf) -> Result<(), H2HError> {
    let relative_path = env.session.relativize(&absolute_path)?;
    let is_folder = absolute_path.is_dir();

    let ctx = AddFileContext {
        env,
        absolute_path,
        relative_path: relative_path.clone(),
        is_folder,
        node_keys: Mutex::new(None),
        chunk_keys: Mutex::new(None),
        md5: Mutex::new(None),
        total_size: Mutex::new(0),
        uploaded: Mutex::new(Vec::new()),
        meta_put: AtomicBool::new(false),
        inserted: AtomicBool::new(false),
        parent_id: Mutex::new(None),
        recipients: Mutex::new(BTreeSet::new()),
    };

    let process = SequentialProcess::new("add-file")
        .with_step(Arc::new(ValidateAddStep) as Arc<dyn ProcessStep<AddFileContext>>)
        .with_step(Arc::new(UploadChunksStep))
        .with_step(Arc::new(PutMetaFileStep))
        .with_step(Arc::new(AddToProfileStep))
        .with_step(Arc::new(NotifyAddStep));

    match process.execute_blocking(&ctx).await {
        Ok(()) => {
            info!(path = %relative_path.display(), folder = is_folder, "add committed");
            Ok(())
        }
        Err(error) => {
            warn!(path = %relative_path.display(), %error, "add failed and rolled back");
            Err(error)
        }
    }
}
