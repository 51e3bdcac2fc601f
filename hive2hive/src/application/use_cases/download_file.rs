// /////////////////////////////////////////////////////////////////////////////
// Hive2Hive RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Download File Pipeline
//!
//! Materializes the newest synchronized version of a file on disk:
//!
//! 1. pre-flight: when the destination already exists and its MD5
//!    matches the index digest, the download is a no-op,
//! 2. fetch the meta-file and resolve the newest version,
//! 3. fetch all chunks concurrently; the order-restoring downloader
//!    writes them front to back as gaps fill, and verifies the final
//!    size and digest.
//!
//! Chunks arrive in whatever order the overlay resolves them; the
//! write path never seeks.

use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::application::services::storage;
use crate::application::use_cases::OpEnv;
use crate::infrastructure::runtime::{CancelToken, ChunkDownloader, ProcessStep, SequentialProcess};
use hive2hive_domain::entities::{Index, MetaFile};
use hive2hive_domain::{ContentHash, EncryptionKeyPair, H2HError};

struct DownloadContext {
    env: Arc<OpEnv>,
    absolute_path: PathBuf,
    relative_path: PathBuf,
    node_keys: Mutex<Option<EncryptionKeyPair>>,
    expected_md5: Mutex<Option<ContentHash>>,
    meta_file: Mutex<Option<MetaFile>>,
    skipped: AtomicBool,
}

struct PreflightStep;

#[async_trait]
impl ProcessStep<DownloadContext> for PreflightStep {
    fn name(&self) -> &str {
        "preflight"
    }

    async fn execute(&self, ctx: &DownloadContext, token: &CancelToken) -> Result<(), H2HError> {
        token.ensure_active()?;

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
        *ctx.expected_md5.lock() = Some(*file.md5());

        if ctx.absolute_path.is_file() && &ContentHash::of_file(&ctx.absolute_path)? == file.md5() {
            debug!(path = %ctx.relative_path.display(), "local copy already current, download skipped");
            ctx.skipped.store(true, Ordering::SeqCst);
        }
        Ok(())
    }
}

struct FetchMetaStep;

#[async_trait]
impl ProcessStep<DownloadContext> for FetchMetaStep {
    fn name(&self) -> &str {
        "fetch-meta-file"
    }

    async fn execute(&self, ctx: &DownloadContext, token: &CancelToken) -> Result<(), H2HError> {
        if ctx.skipped.load(Ordering::SeqCst) {
            return Ok(());
        }
        token.ensure_active()?;

        let node_keys = ctx
            .node_keys
            .lock()
            .clone()
            .ok_or_else(|| H2HError::internal_error("node keys not resolved"))?;
        let meta_file = storage::fetch_meta_file(&ctx.env.dht, &ctx.env.asymmetric, &node_keys).await?;
        *ctx.meta_file.lock() = Some(meta_file);
        Ok(())
    }
}

struct FetchChunksStep;

#[async_trait]
impl ProcessStep<DownloadContext> for FetchChunksStep {
    fn name(&self) -> &str {
        "fetch-chunks"
    }

    async fn execute(&self, ctx: &DownloadContext, token: &CancelToken) -> Result<(), H2HError> {
        if ctx.skipped.load(Ordering::SeqCst) {
            return Ok(());
        }
        token.ensure_active()?;

        let meta_file = ctx
            .meta_file
            .lock()
            .clone()
            .ok_or_else(|| H2HError::internal_error("meta-file not fetched"))?;
        let version = meta_file
            .newest_version()
            .ok_or_else(|| H2HError::GetFailed("meta-file holds no versions".to_string()))?;

        // Overwrite in place; the pre-flight already ruled out the
        // up-to-date case.
        if let Some(parent) = ctx.absolute_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let destination = std::fs::File::create(&ctx.absolute_path)?;
        let mut downloader = ChunkDownloader::new(destination, version.chunks().len() as u32);

        let chunk_keys = meta_file.chunk_keys();
        let mut pending: FuturesUnordered<_> = version
            .chunks()
            .iter()
            .map(|meta_chunk| async move {
                let chunk = storage::fetch_chunk(&ctx.env.dht, &ctx.env.asymmetric, meta_chunk, chunk_keys).await;
                (meta_chunk, chunk)
            })
            .collect();

        while let Some((meta_chunk, result)) = pending.next().await {
            token.ensure_active()?;
            let chunk = result?;
            downloader.accept(chunk, meta_chunk.chunk_hash())?;
        }
        drop(pending);

        let written = downloader.finish()?;
        if written != version.size() {
            return Err(H2HError::IntegrityError(format!(
                "downloaded {} bytes, version records {}",
                written,
                version.size()
            )));
        }
        if let Some(expected) = ctx.expected_md5.lock().clone() {
            if ContentHash::of_file(&ctx.absolute_path)? != expected {
                return Err(H2HError::IntegrityError(
                    "downloaded file digest does not match the index".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Runs the download pipeline. Returns true when content was fetched,
/// false when the local copy was already current.
pub async fn run(env: Arc<OpEnv>, absolute_path: PathBuf) -> Result<bool, H2HError> {
    let relative_path = env.session.relativize(&absolute_path)?;

    let ctx = DownloadContext {
        env,
        absolute_path,
        relative_path: relative_path.clone(),
        node_keys: Mutex::new(None),
        expected_md5: Mutex::new(None),
        meta_file: Mutex::new(None),
        skipped: AtomicBool::new(false),
    };

    let process = SequentialProcess::new("download-file")
        .with_step(Arc::new(PreflightStep) as Arc<dyn ProcessStep<DownloadContext>>)
        .with_step(Arc::new(FetchMetaStep))
        .with_step(Arc::new(FetchChunksStep));

    match process.execute_blocking(&ctx).await {
        Ok(()) => {
            let fetched = !ctx.skipped.load(Ordering::SeqCst);
            info!(path = %relative_path.display(), fetched, "download finished");
            Ok(fetched)
        }
        Err(error) => {
            warn!(path = %relative_path.display(), %error, "download failed");
            Err(error)
        }
    }
}
