// /////////////////////////////////////////////////////////////////////////////
// Hive2Hive RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Message Handler Port
//!
//! The callback a peer registers with the overlay to receive direct
//! messages. Handlers run on the overlay's delivery path, so the reply
//! they return is what the sending peer observes as the acceptance
//! outcome.

use async_trait::async_trait;

use crate::network::{AcceptanceReply, DirectMessage};

/// Receiver side of direct peer messaging.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Handles one incoming message and acknowledges it
    async fn handle(&self, message: DirectMessage) -> AcceptanceReply;
}
