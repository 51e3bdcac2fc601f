// /////////////////////////////////////////////////////////////////////////////
// Hive2Hive RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Notification Service
//!
//! Fans a direct message out to a set of recipient users after a
//! committed operation. Recipients are processed concurrently as a
//! parallel composite, one step per recipient:
//!
//! - **Own user**: the message goes to every other logged-in peer of
//!   the same user (their views refresh), and additionally to the local
//!   handler on this peer.
//! - **Foreign user**: the initial peer is tried first, then the rest
//!   of the locations set until one accepts.
//!
//! Peers that deny contact are treated as unfriendly logouts: after the
//! fan-out, the recipient's locations set is re-read, the denying peers
//! are pruned, and the set is put back. An individual unreachable
//! recipient does not fail the notification; only every attempted
//! recipient exhausting its peer list does.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::application::services::LocationsManager;
use crate::infrastructure::runtime::{CancelToken, ParallelProcess, ProcessStep};
use hive2hive_domain::network::{AcceptanceReply, DirectMessage};
use hive2hive_domain::ports::{DataManager, MessageHandler};
use hive2hive_domain::{H2HError, PeerAddress, UserId};

/// Outcome counters of one notification fan-out.
#[derive(Debug, Default, Clone, Copy)]
pub struct NotificationSummary {
    /// Messages handed to the overlay
    pub sent: usize,
    /// Messages a peer accepted
    pub arrived: usize,
    /// Stale peers pruned from locations sets
    pub pruned: usize,
}

struct NotifyContext {
    dht: Arc<dyn DataManager>,
    locations: LocationsManager,
    message: DirectMessage,
    own_user: UserId,
    own_peer: PeerAddress,
    local_handler: Option<Arc<dyn MessageHandler>>,
    sent: AtomicUsize,
    arrived: AtomicUsize,
    pruned: AtomicUsize,
    /// Recipients that had at least one peer to try
    attempted: AtomicUsize,
    /// Recipients that yielded at least one accepted delivery
    reached: AtomicUsize,
}

struct NotifyRecipientStep {
    recipient: UserId,
}

#[async_trait]
impl ProcessStep<NotifyContext> for NotifyRecipientStep {
    fn name(&self) -> &str {
        "notify-recipient"
    }

    async fn execute(&self, ctx: &NotifyContext, token: &CancelToken) -> Result<(), H2HError> {
        token.ensure_active()?;

        let is_self = self.recipient == ctx.own_user;
        if is_self {
            // The sending client handles its own copy locally.
            if let Some(handler) = &ctx.local_handler {
                handler.handle(ctx.message.clone()).await;
            }
        }

        let locations = match ctx.locations.get(&self.recipient).await {
            Ok(locations) => locations,
            Err(error) => {
                warn!(recipient = %self.recipient, %error, "locations lookup failed, recipient skipped");
                return Ok(());
            }
        };

        let peers: Vec<PeerAddress> = locations
            .peers_initial_first()
            .into_iter()
            .filter(|peer| peer != &ctx.own_peer)
            .collect();
        if peers.is_empty() {
            debug!(recipient = %self.recipient, "no peers to notify");
            return Ok(());
        }
        ctx.attempted.fetch_add(1, Ordering::SeqCst);

        let mut denied: Vec<PeerAddress> = Vec::new();
        let mut delivered = 0usize;
        for peer in peers {
            token.ensure_active()?;
            ctx.sent.fetch_add(1, Ordering::SeqCst);
            match ctx.dht.send_direct(&peer, ctx.message.clone()).await {
                Ok(AcceptanceReply::Ok) => {
                    ctx.arrived.fetch_add(1, Ordering::SeqCst);
                    delivered += 1;
                    // One accepted delivery satisfies a foreign
                    // recipient; own peers all get their copy.
                    if !is_self {
                        break;
                    }
                }
                Ok(reply) => {
                    debug!(recipient = %self.recipient, %peer, ?reply, "peer refused message");
                    denied.push(peer);
                }
                Err(error) => {
                    warn!(recipient = %self.recipient, %peer, %error, "send failed");
                    denied.push(peer);
                }
            }
        }

        if delivered > 0 {
            ctx.reached.fetch_add(1, Ordering::SeqCst);
        }

        if !denied.is_empty() {
            self.cleanup_locations(ctx, &denied).await;
        }
        Ok(())
    }
}

impl NotifyRecipientStep {
    /// Prunes peers that denied contact, the lazy unfriendly-logout
    /// cleanup.
    async fn cleanup_locations(&self, ctx: &NotifyContext, denied: &[PeerAddress]) {
        let result: Result<(), H2HError> = async {
            let mut locations = ctx.locations.get(&self.recipient).await?;
            let mut removed = 0usize;
            for peer in denied {
                if locations.remove_peer(peer) {
                    removed += 1;
                }
            }
            if removed > 0 {
                ctx.locations.put(locations).await?;
                ctx.pruned.fetch_add(removed, Ordering::SeqCst);
                info!(recipient = %self.recipient, removed, "pruned unreachable peers from locations");
            }
            Ok(())
        }
        .await;
        if let Err(error) = result {
            warn!(recipient = %self.recipient, %error, "locations cleanup failed");
        }
    }
}

/// Fans direct messages out to recipient users.
#[derive(Clone)]
pub struct NotificationService {
    dht: Arc<dyn DataManager>,
    locations: LocationsManager,
    local_handler: Arc<Mutex<Option<Arc<dyn MessageHandler>>>>,
}

impl NotificationService {
    /// Creates a notification service over the overlay
    pub fn new(dht: Arc<dyn DataManager>, locations: LocationsManager) -> Self {
        Self {
            dht,
            locations,
            local_handler: Arc::new(Mutex::new(None)),
        }
    }

    /// Installs the handler that receives self-notifications locally
    pub fn set_local_handler(&self, handler: Arc<dyn MessageHandler>) {
        *self.local_handler.lock() = Some(handler);
    }

    /// Removes the local handler at logout
    pub fn clear_local_handler(&self) {
        *self.local_handler.lock() = None;
    }

    /// Notifies every recipient, concurrently.
    ///
    /// # Errors
    /// Returns `H2HError::SendFailed` only when every recipient that
    /// had peers to try exhausted its list without one delivery.
    pub async fn notify(
        &self,
        own_user: &UserId,
        own_peer: &PeerAddress,
        recipients: &BTreeSet<UserId>,
        message: DirectMessage,
    ) -> Result<NotificationSummary, H2HError> {
        if recipients.is_empty() {
            return Ok(NotificationSummary::default());
        }

        let ctx = NotifyContext {
            dht: Arc::clone(&self.dht),
            locations: self.locations.clone(),
            message,
            own_user: own_user.clone(),
            own_peer: own_peer.clone(),
            local_handler: self.local_handler.lock().clone(),
            sent: AtomicUsize::new(0),
            arrived: AtomicUsize::new(0),
            pruned: AtomicUsize::new(0),
            attempted: AtomicUsize::new(0),
            reached: AtomicUsize::new(0),
        };

        let mut process = ParallelProcess::new("notify");
        for recipient in recipients {
            process = process.with_step(Arc::new(NotifyRecipientStep {
                recipient: recipient.clone(),
            }) as Arc<dyn ProcessStep<NotifyContext>>);
        }
        process.run(&ctx, &CancelToken::new()).await?;

        let summary = NotificationSummary {
            sent: ctx.sent.load(Ordering::SeqCst),
            arrived: ctx.arrived.load(Ordering::SeqCst),
            pruned: ctx.pruned.load(Ordering::SeqCst),
        };
        let attempted = ctx.attempted.load(Ordering::SeqCst);
        let reached = ctx.reached.load(Ordering::SeqCst);
        if attempted > 0 && reached == 0 {
            return Err(H2HError::SendFailed(format!(
                "all {} reachable-looking recipients exhausted their peer lists",
                attempted
            )));
        }
        debug!(sent = summary.sent, arrived = summary.arrived, pruned = summary.pruned, "notification fan-out done");
        Ok(summary)
    }
}
