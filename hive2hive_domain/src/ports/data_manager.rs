// /////////////////////////////////////////////////////////////////////////////
// Hive2Hive RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Data Manager Port
//!
//! The thin contract over the overlay: typed get/put/remove plus direct
//! peer messaging. Implementations must
//!
//! - enforce the version chain on puts that carry a based-on key,
//! - enforce protection keys as the slot's write ACL, and
//! - surface the given TTL verbatim.
//!
//! `put_unblocked` returns a [`PutHandle`]: an awaitable, cancellable
//! handle over an in-flight put. Overlay awaits are treated as
//! interruptible; an implementation honors `cancel` at its next
//! suspension point and completes the handle with `AbortedByUser`.

use async_trait::async_trait;
use futures::channel::oneshot;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::network::{AcceptanceReply, DirectMessage, NetworkContent};
use crate::value_objects::{DhtParameters, PeerAddress};
use crate::H2HError;

/// Awaitable, cancellable handle over an in-flight put.
pub struct PutHandle {
    cancelled: Arc<AtomicBool>,
    receiver: oneshot::Receiver<Result<(), H2HError>>,
}

impl PutHandle {
    /// Creates a linked completion/handle pair.
    ///
    /// The implementation keeps the [`PutCompletion`]; the caller keeps
    /// the handle.
    pub fn channel() -> (PutCompletion, PutHandle) {
        let cancelled = Arc::new(AtomicBool::new(false));
        let (sender, receiver) = oneshot::channel();
        (
            PutCompletion {
                cancelled: Arc::clone(&cancelled),
                sender,
            },
            PutHandle { cancelled, receiver },
        )
    }

    /// Requests cancellation of the in-flight put
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Awaits the put outcome.
    ///
    /// # Errors
    /// Returns the put error, `AbortedByUser` when cancelled, or
    /// `InternalError` when the implementation dropped the completion
    /// without resolving it.
    pub async fn await_result(self) -> Result<(), H2HError> {
        match self.receiver.await {
            Ok(result) => result,
            Err(oneshot::Canceled) => Err(H2HError::InternalError(
                "put completion dropped without a result".to_string(),
            )),
        }
    }
}

/// Implementation side of a [`PutHandle`].
pub struct PutCompletion {
    cancelled: Arc<AtomicBool>,
    sender: oneshot::Sender<Result<(), H2HError>>,
}

impl PutCompletion {
    /// Returns true once the caller requested cancellation
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves the handle with the put outcome
    pub fn complete(self, result: Result<(), H2HError>) {
        // The caller may have dropped the handle; nothing to do then.
        let _ = self.sender.send(result);
    }
}

/// Façade over the overlay's key/value store and direct messaging.
#[async_trait]
pub trait DataManager: Send + Sync {
    /// Reads the content at the addressed slot.
    ///
    /// # Errors
    /// Returns `H2HError::GetFailed` on transport failure. Absence is
    /// `Ok(None)`, not an error.
    async fn get(&self, params: &DhtParameters) -> Result<Option<NetworkContent>, H2HError>;

    /// Writes content to the addressed slot, blocking until accepted.
    ///
    /// # Errors
    /// Returns `H2HError::PutFailed` when the overlay rejects the write
    /// (stale based-on key, protection-key mismatch, transport failure).
    async fn put(&self, params: &DhtParameters, content: NetworkContent) -> Result<(), H2HError>;

    /// Starts a put without blocking; the returned handle resolves with
    /// the outcome and can be cancelled
    fn put_unblocked(&self, params: DhtParameters, content: NetworkContent) -> PutHandle;

    /// Removes the addressed slot entirely
    async fn remove(&self, params: &DhtParameters) -> Result<(), H2HError>;

    /// Removes a single version from the addressed slot's history
    async fn remove_version(&self, params: &DhtParameters) -> Result<(), H2HError>;

    /// Sends a direct message to a peer and returns its acceptance
    /// reply.
    ///
    /// # Errors
    /// Returns `H2HError::SendFailed` only on transport breakdown; a
    /// reachable peer that refuses the message answers with a non-Ok
    /// [`AcceptanceReply`].
    async fn send_direct(&self, peer: &PeerAddress, message: DirectMessage) -> Result<AcceptanceReply, H2HError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Tests the completion/handle linkage, including cancellation
    /// visibility on the implementation side.
    #[test]
    fn test_put_handle_cancellation_flag() {
        let (completion, handle) = PutHandle::channel();
        assert!(!completion.is_cancelled());
        handle.cancel();
        assert!(completion.is_cancelled());
    }

    /// Tests that a dropped completion resolves the handle with an
    /// internal error instead of hanging.
    #[test]
    fn test_dropped_completion_resolves_handle() {
        let (completion, handle) = PutHandle::channel();
        drop(completion);
        let result = futures::executor::block_on(handle.await_result());
        assert!(matches!(result, Err(H2HError::InternalError(_))));
    }

    /// Tests outcome delivery through the handle.
    #[test]
    fn test_completion_delivers_outcome() {
        let (completion, handle) = PutHandle::channel();
        completion.complete(Err(H2HError::put_failed("stale version")));
        let result = futures::executor::block_on(handle.await_result());
        assert!(matches!(result, Err(H2HError::PutFailed(_))));
    }
}
