// /////////////////////////////////////////////////////////////////////////////
// Hive2Hive RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Recover File Pipeline
//!
//! Restores an older version of a file *beside* the current one. The
//! version history is presented to a caller-supplied selector (the UI
//! boundary); the chosen version's chunks are downloaded and written
//! under a version-derived name (`report_v2.txt`). The profile is never
//! mutated: recovery is a read of history, not a rollback.

use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::application::services::storage;
use crate::application::use_cases::OpEnv;
use crate::infrastructure::runtime::{CancelToken, ChunkDownloader, ProcessStep, SequentialProcess};
use hive2hive_domain::entities::{FileVersion, Index, MetaFile};
use hive2hive_domain::H2HError;

/// Chooses which version to recover. The UI boundary of the pipeline.
pub trait VersionSelector: Send + Sync {
    /// Returns the version to recover, or `None` to cancel
    fn select<'a>(&self, versions: &'a [FileVersion]) -> Option<&'a FileVersion>;
}

/// Selects a version by its index; the non-interactive selector.
pub struct SelectByIndex(pub u32);

impl VersionSelector for SelectByIndex {
    fn select<'a>(&self, versions: &'a [FileVersion]) -> Option<&'a FileVersion> {
        versions.iter().find(|v| v.index() == self.0)
    }
}

struct RecoverContext {
    env: Arc<OpEnv>,
    absolute_path: PathBuf,
    relative_path: PathBuf,
    selector: Arc<dyn VersionSelector>,
    meta_file: Mutex<Option<MetaFile>>,
    chosen_version: Mutex<Option<u32>>,
    recovered_path: Mutex<Option<PathBuf>>,
}

/// Derives the sibling name a recovered version is written under
fn recovered_name(original: &PathBuf, version_index: u32) -> PathBuf {
    let stem = original
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let name = match original.extension() {
        Some(extension) => format!("{}_v{}.{}", stem, version_index, extension.to_string_lossy()),
        None => format!("{}_v{}", stem, version_index),
    };
    original.with_file_name(name)
}

struct FetchHistoryStep;

#[async_trait]
impl ProcessStep<RecoverContext> for FetchHistoryStep {
    fn name(&self) -> &str {
        "fetch-history"
    }

    async fn execute(&self, ctx: &RecoverContext, token: &CancelToken) -> Result<(), H2HError> {
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
        let node_keys = file.node_keys().clone();

        let meta_file = storage::fetch_meta_file(&ctx.env.dht, &ctx.env.asymmetric, &node_keys).await?;
        *ctx.meta_file.lock() = Some(meta_file);
        Ok(())
    }
}

struct SelectVersionStep;

#[async_trait]
impl ProcessStep<RecoverContext> for SelectVersionStep {
    fn name(&self) -> &str {
        "select-version"
    }

    async fn execute(&self, ctx: &RecoverContext, token: &CancelToken) -> Result<(), H2HError> {
        token.ensure_active()?;

        let meta_file = ctx
            .meta_file
            .lock()
            .clone()
            .ok_or_else(|| H2HError::internal_error("meta-file not fetched"))?;
        let chosen = ctx
            .selector
            .select(meta_file.versions())
            .map(FileVersion::index)
            .ok_or_else(|| H2HError::AbortedByUser("no version selected".to_string()))?;
        *ctx.chosen_version.lock() = Some(chosen);
        Ok(())
    }
}

struct DownloadVersionStep;

#[async_trait]
impl ProcessStep<RecoverContext> for DownloadVersionStep {
    fn name(&self) -> &str {
        "download-version"
    }

    async fn execute(&self, ctx: &RecoverContext, token: &CancelToken) -> Result<(), H2HError> {
        token.ensure_active()?;

        let meta_file = ctx
            .meta_file
            .lock()
            .clone()
            .ok_or_else(|| H2HError::internal_error("meta-file not fetched"))?;
        let version_index = ctx
            .chosen_version
            .lock()
            .ok_or_else(|| H2HError::internal_error("no version chosen"))?;
        let version = meta_file
            .version(version_index)
            .ok_or_else(|| H2HError::GetFailed(format!("version {} vanished from meta-file", version_index)))?;

        let target = recovered_name(&ctx.absolute_path, version_index);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let destination = std::fs::File::create(&target)?;
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
            downloader.accept(result?, meta_chunk.chunk_hash())?;
        }
        drop(pending);

        let written = downloader.finish()?;
        if written != version.size() {
            return Err(H2HError::IntegrityError(format!(
                "recovered {} bytes, version records {}",
                written,
                version.size()
            )));
        }
        *ctx.recovered_path.lock() = Some(target);
        Ok(())
    }

    async fn rollback(&self, ctx: &RecoverContext) -> Result<(), H2HError> {
        if let Some(path) = ctx.recovered_path.lock().take() {
            let _ = std::fs::remove_file(path);
        }
        Ok(())
    }
}

/// Runs the recover pipeline; returns the path the chosen version was
/// written to.
pub async fn run(
    env: Arc<OpEnv>,
    absolute_path: PathBuf,
    selector: Arc<dyn VersionSelector>,
) -> Result<PathBuf, H2HError> {
    let relative_path = env.session.relativize(&absolute_path)?;

    let ctx = RecoverContext {
        env,
        absolute_path,
        relative_path: relative_path.clone(),
        selector,
        meta_file: Mutex::new(None),
        chosen_version: Mutex::new(None),
        recovered_path: Mutex::new(None),
    };

    let process = SequentialProcess::new("recover-file")
        .with_step(Arc::new(FetchHistoryStep) as Arc<dyn ProcessStep<RecoverContext>>)
        .with_step(Arc::new(SelectVersionStep))
        .with_step(Arc::new(DownloadVersionStep));

    match process.execute_blocking(&ctx).await {
        Ok(()) => {
            let path = ctx
                .recovered_path
                .lock()
                .clone()
                .ok_or_else(|| H2HError::internal_error("recovery finished without a target path"))?;
            info!(path = %relative_path.display(), recovered = %path.display(), "recover committed");
            Ok(path)
        }
        Err(error) => {
            warn!(path = %relative_path.display(), %error, "recover failed");
            Err(error)
        }
    }
}
