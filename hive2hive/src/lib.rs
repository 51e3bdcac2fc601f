// /////////////////////////////////////////////////////////////////////////////
// Hive2Hive RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

// Production code safety enforced via CI lint runs
// (lib checked separately from tests - tests may use unwrap/expect)

//! # Hive2Hive
//!
//! A decentralized, peer-to-peer file-sharing and synchronization core.
//! Each user owns an encrypted profile describing a virtual file tree;
//! files are split into independently encrypted chunks and stored
//! across peers through an opaque DHT overlay. Clients running under
//! the same identity, plus explicitly shared peers, converge through
//! the DHT and direct peer-to-peer notifications.
//!
//! ## Architecture Overview
//!
//! The workspace follows a domain / infrastructure split:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Application Layer                          │
//! │  (node facade, operation pipelines, notification fan-out)   │
//! └─────────────────────────────────────────────────────────────┘
//!                                │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Domain Layer                             │
//! │  (profile tree, meta-files, chunk codec, cipher contracts)  │
//! └─────────────────────────────────────────────────────────────┘
//!                                │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                Infrastructure Layer                         │
//! │  (process engine, profile manager, cryptors, overlay)       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Core Concepts
//!
//! ### Profile
//! The single mutable root object of a user's world, AES-encrypted
//! under a password-derived key and mutated only through the profile
//! manager's serialized get/modify/put cycle with a bounded exclusive
//! modification window.
//!
//! ### Meta-files and chunks
//! Each file's version history lives in a hybrid-encrypted meta-file
//! addressed by the file's node-key fingerprint; content is split into
//! write-once chunks, each sealed under the file's chunk key.
//!
//! ### Processes
//! Every operation (add, update, delete, move, share, recover, login,
//! logout) is a sequential pipeline of compensable steps; a failing
//! step rolls the committed prefix back in reverse order.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use hive2hive::application::H2HNode;
//! use hive2hive::infrastructure::adapters::MemoryDht;
//! use hive2hive::infrastructure::config::H2HConfig;
//! use hive2hive_domain::entities::UserCredentials;
//! use hive2hive_domain::UserId;
//!
//! let overlay = MemoryDht::new();
//! let node = H2HNode::new(H2HConfig::default(), overlay, "laptop")?;
//! let credentials = UserCredentials::new(UserId::new("alice")?, "password", "1234");
//! node.register(credentials.clone()).await?;
//! node.login(credentials, "/home/alice/h2h".into()).await?;
//! node.add_file("/home/alice/h2h/report.txt".into()).await?;
//! ```

pub mod application;
pub mod infrastructure;

pub use application::H2HNode;
pub use infrastructure::config::{H2HConfig, TtlConfig};
