// /////////////////////////////////////////////////////////////////////////////
// Hive2Hive RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Runtime
//!
//! The execution machinery: the rollback-capable process engine, the
//! serialized user-profile manager, and the order-restoring chunk
//! downloader.

mod chunk_downloader;
mod process;
mod profile_manager;

pub use chunk_downloader::ChunkDownloader;
pub use process::{
    CancelToken, ParallelProcess, ProcessListener, ProcessState, ProcessStep, SequentialProcess,
};
pub use profile_manager::ProfileManager;
