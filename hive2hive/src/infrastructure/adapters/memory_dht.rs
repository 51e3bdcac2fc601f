// /////////////////////////////////////////////////////////////////////////////
// Hive2Hive RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # In-Memory Overlay Adapter
//!
//! An in-process implementation of the `DataManager` port. It models the
//! overlay contract faithfully enough to run every pipeline against it:
//!
//! - **Version chaining**: a put carrying a based-on key is rejected
//!   unless that key equals the slot's current version
//! - **Protection keys**: the first protecting put owns the slot; later
//!   puts and removes must present the matching key pair
//! - **Write-once chunks**: `FILE_CHUNK` slots reject overwrites
//! - **TTL**: recorded verbatim per slot
//! - **Direct messaging**: routed to registered message handlers
//!
//! Fault injection (read latency, per-location latency, transport
//! failure, message-denying peers) exists so tests can exercise the
//! degraded paths the real overlay produces: piggy-backed reads under a
//! slow network, unfriendly logouts, out-of-order chunk arrival.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use hive2hive_domain::network::{AcceptanceReply, DirectMessage, NetworkContent};
use hive2hive_domain::ports::{DataManager, MessageHandler, PutCompletion, PutHandle};
use hive2hive_domain::value_objects::content_keys;
use hive2hive_domain::{DhtParameters, H2HError, PeerAddress, PublicKey, VersionKey};

#[derive(Default)]
struct Slot {
    versions: Vec<(Option<VersionKey>, NetworkContent)>,
    current_version: Option<VersionKey>,
    protection: Option<PublicKey>,
    ttl: Option<Duration>,
}

#[derive(Default)]
struct Faults {
    get_latency: Option<Duration>,
    location_latency: HashMap<String, Duration>,
    fail_gets: bool,
    denying_peers: HashSet<Uuid>,
}

/// Shared in-process overlay.
///
/// Clone-cheap via internal `Arc`s; every peer of a test network holds
/// the same instance.
#[derive(Clone, Default)]
pub struct MemoryDht {
    slots: Arc<Mutex<HashMap<(String, String), Slot>>>,
    handlers: Arc<Mutex<HashMap<Uuid, Arc<dyn MessageHandler>>>>,
    faults: Arc<Mutex<Faults>>,
    get_count: Arc<AtomicU64>,
    put_count: Arc<AtomicU64>,
}

impl MemoryDht {
    /// Creates an empty overlay
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a peer's message handler
    pub fn register_peer(&self, peer: &PeerAddress, handler: Arc<dyn MessageHandler>) {
        self.handlers.lock().insert(peer.id(), handler);
    }

    /// Unregisters a peer's message handler (clean logout)
    pub fn unregister_peer(&self, peer: &PeerAddress) {
        self.handlers.lock().remove(&peer.id());
    }

    /// Makes a peer refuse direct messages without unregistering it,
    /// simulating an unfriendly logout
    pub fn deny_messages(&self, peer: &PeerAddress) {
        self.faults.lock().denying_peers.insert(peer.id());
    }

    /// Injects a fixed latency into every get
    pub fn set_get_latency(&self, latency: Duration) {
        self.faults.lock().get_latency = Some(latency);
    }

    /// Injects latency for gets of one location key, overriding the
    /// global latency
    pub fn set_get_latency_for(&self, location_key: impl Into<String>, latency: Duration) {
        self.faults.lock().location_latency.insert(location_key.into(), latency);
    }

    /// Makes every get fail with a transport error until reset
    pub fn set_fail_gets(&self, fail: bool) {
        self.faults.lock().fail_gets = fail;
    }

    /// Returns the number of gets served (fault-injected ones included)
    pub fn get_count(&self) -> u64 {
        self.get_count.load(Ordering::SeqCst)
    }

    /// Returns the number of puts accepted
    pub fn put_count(&self) -> u64 {
        self.put_count.load(Ordering::SeqCst)
    }

    /// Returns the TTL recorded for a slot, if the slot exists
    pub fn ttl_of(&self, params: &DhtParameters) -> Option<Duration> {
        self.slots.lock().get(&slot_key(params)).and_then(|slot| slot.ttl)
    }

    /// Counts the non-empty slots stored under one content key
    pub fn count_slots(&self, content_key: &str) -> usize {
        self.slots
            .lock()
            .iter()
            .filter(|((_, key), slot)| key == content_key && !slot.versions.is_empty())
            .count()
    }

    /// Returns true when a slot holds content
    pub fn contains(&self, params: &DhtParameters) -> bool {
        self.slots
            .lock()
            .get(&slot_key(params))
            .map(|slot| !slot.versions.is_empty())
            .unwrap_or(false)
    }

    async fn simulate_get_latency(&self, location_key: &str) {
        let latency = {
            let faults = self.faults.lock();
            faults
                .location_latency
                .get(location_key)
                .copied()
                .or(faults.get_latency)
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn check_protection(slot: &mut Slot, params: &DhtParameters) -> Result<(), String> {
        match (&slot.protection, params.protection_keys()) {
            (None, maybe_keys) => {
                // First protecting write claims the slot
                if let Some(keys) = maybe_keys {
                    slot.protection = Some(keys.public().clone());
                }
                Ok(())
            }
            (Some(owner), Some(keys)) if owner == keys.public() => Ok(()),
            (Some(_), _) => Err(format!("protection keys mismatch at {}", params)),
        }
    }

    fn apply_put(&self, params: &DhtParameters, content: NetworkContent) -> Result<(), H2HError> {
        let mut slots = self.slots.lock();
        let slot = slots.entry(slot_key(params)).or_default();

        if params.content_key() == content_keys::FILE_CHUNK && !slot.versions.is_empty() {
            return Err(H2HError::PutFailed(format!(
                "put rejected: chunk slot {} is write-once",
                params
            )));
        }

        Self::check_protection(slot, params).map_err(H2HError::PutFailed)?;

        if let Some(based_on) = params.based_on_key() {
            if slot.current_version.as_ref() != Some(based_on) {
                return Err(H2HError::VersionConflict(format!(
                    "put rejected: based-on key {} does not match current version at {}",
                    based_on, params
                )));
            }
        }

        slot.versions.push((params.version_key().copied(), content));
        if let Some(version) = params.version_key() {
            slot.current_version = Some(*version);
        }
        slot.ttl = params.ttl();
        self.put_count.fetch_add(1, Ordering::SeqCst);
        debug!(slot = %params, "overlay put accepted");
        Ok(())
    }
}

fn slot_key(params: &DhtParameters) -> (String, String) {
    (params.location_key().to_string(), params.content_key().to_string())
}

#[async_trait]
impl DataManager for MemoryDht {
    async fn get(&self, params: &DhtParameters) -> Result<Option<NetworkContent>, H2HError> {
        self.simulate_get_latency(params.location_key()).await;
        self.get_count.fetch_add(1, Ordering::SeqCst);

        if self.faults.lock().fail_gets {
            return Err(H2HError::GetFailed(format!("transport failure reading {}", params)));
        }

        let slots = self.slots.lock();
        Ok(slots
            .get(&slot_key(params))
            .and_then(|slot| slot.versions.last())
            .map(|(_, content)| content.clone()))
    }

    async fn put(&self, params: &DhtParameters, content: NetworkContent) -> Result<(), H2HError> {
        self.apply_put(params, content)
    }

    fn put_unblocked(&self, params: DhtParameters, content: NetworkContent) -> PutHandle {
        let (completion, handle) = PutHandle::channel();
        let dht = self.clone();
        tokio::spawn(async move {
            // Yield once so a cancel issued right after the call wins.
            tokio::task::yield_now().await;
            if completion.is_cancelled() {
                completion.complete(Err(H2HError::AbortedByUser("put cancelled".to_string())));
                return;
            }
            let result = dht.apply_put(&params, content);
            completion.complete(result);
        });
        handle
    }

    async fn remove(&self, params: &DhtParameters) -> Result<(), H2HError> {
        let key = slot_key(params);
        let mut slots = self.slots.lock();
        match slots.get_mut(&key) {
            None => return Ok(()),
            Some(slot) => {
                Self::check_protection(slot, params).map_err(H2HError::RemoveFailed)?;
            }
        }
        slots.remove(&key);
        Ok(())
    }

    async fn remove_version(&self, params: &DhtParameters) -> Result<(), H2HError> {
        let version = params
            .version_key()
            .ok_or_else(|| H2HError::RemoveFailed("remove_version requires a version key".to_string()))?;

        let mut slots = self.slots.lock();
        if let Some(slot) = slots.get_mut(&slot_key(params)) {
            Self::check_protection(slot, params).map_err(H2HError::RemoveFailed)?;
            slot.versions.retain(|(v, _)| v.as_ref() != Some(version));
            if slot.current_version.as_ref() == Some(version) {
                slot.current_version = slot.versions.last().and_then(|(v, _)| *v);
            }
        }
        Ok(())
    }

    async fn send_direct(&self, peer: &PeerAddress, message: DirectMessage) -> Result<AcceptanceReply, H2HError> {
        if self.faults.lock().denying_peers.contains(&peer.id()) {
            debug!(%peer, kind = message.kind(), "peer denies direct messages");
            return Ok(AcceptanceReply::Failure);
        }
        let handler = self.handlers.lock().get(&peer.id()).cloned();
        match handler {
            Some(handler) => Ok(handler.handle(message).await),
            None => {
                debug!(%peer, "no handler registered, reporting failure");
                Ok(AcceptanceReply::Failure)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hive2hive_domain::entities::Locations;
    use hive2hive_domain::{EncryptionKeyPair, PrivateKey, UserId};

    fn locations_content() -> NetworkContent {
        NetworkContent::Locations(Locations::new(UserId::new("alice").unwrap()))
    }

    fn key_pair(seed: u8) -> EncryptionKeyPair {
        EncryptionKeyPair::new(
            PublicKey::from_der(vec![seed; 8]),
            PrivateKey::from_der(vec![seed; 8]),
        )
    }

    /// Tests the version-chain check on chained puts.
    ///
    /// Validates that:
    /// - An unchained initial put is accepted
    /// - A put based on the current version is accepted
    /// - A put based on a stale version is rejected
    #[tokio::test]
    async fn test_version_chain_enforcement() {
        let dht = MemoryDht::new();
        let v0 = VersionKey::generate();
        let v1 = VersionKey::generate();
        let v2 = VersionKey::generate();
        let base = DhtParameters::new("profile-loc", content_keys::USER_PROFILE);

        dht.put(&base.clone().with_version(v0), locations_content()).await.unwrap();
        dht.put(
            &base.clone().with_version(v1).with_based_on(v0),
            locations_content(),
        )
        .await
        .unwrap();

        // v0 is stale now
        let stale = dht
            .put(
                &base.clone().with_version(v2).with_based_on(v0),
                locations_content(),
            )
            .await;
        assert!(matches!(stale, Err(H2HError::VersionConflict(_))));
    }

    /// Tests protection-key ownership of a slot.
    ///
    /// Validates that:
    /// - The first protecting put claims the slot
    /// - A put with the wrong key pair is rejected
    /// - A put with the owning key pair is accepted
    #[tokio::test]
    async fn test_protection_key_enforcement() {
        let dht = MemoryDht::new();
        let owner = key_pair(1);
        let intruder = key_pair(2);
        let params = DhtParameters::new("loc", content_keys::LOCATIONS).with_protection_keys(owner.clone());

        dht.put(&params, locations_content()).await.unwrap();

        let rejected = dht
            .put(
                &DhtParameters::new("loc", content_keys::LOCATIONS).with_protection_keys(intruder),
                locations_content(),
            )
            .await;
        assert!(matches!(rejected, Err(H2HError::PutFailed(_))));

        dht.put(&params, locations_content()).await.unwrap();
    }

    /// Tests that chunk slots are write-once.
    #[tokio::test]
    async fn test_chunk_slots_write_once() {
        let dht = MemoryDht::new();
        let params = DhtParameters::new("chunk-1", content_keys::FILE_CHUNK);
        let chunk = NetworkContent::EncryptedChunk(hive2hive_domain::HybridPayload::new(vec![], vec![], vec![]));

        dht.put(&params, chunk.clone()).await.unwrap();
        assert!(matches!(dht.put(&params, chunk).await, Err(H2HError::PutFailed(_))));
    }

    /// Tests that the TTL of a put is recorded verbatim.
    #[tokio::test]
    async fn test_ttl_recorded_verbatim() {
        let dht = MemoryDht::new();
        let params = DhtParameters::new("chunk-2", content_keys::FILE_CHUNK).with_ttl(Duration::from_secs(3600));
        let chunk = NetworkContent::EncryptedChunk(hive2hive_domain::HybridPayload::new(vec![], vec![], vec![]));

        dht.put(&params, chunk).await.unwrap();
        assert_eq!(dht.ttl_of(&params), Some(Duration::from_secs(3600)));
    }

    /// Tests the cancellable unblocked put.
    #[tokio::test]
    async fn test_put_unblocked_resolves() {
        let dht = MemoryDht::new();
        let params = DhtParameters::new("loc", content_keys::LOCATIONS);
        let handle = dht.put_unblocked(params.clone(), locations_content());
        handle.await_result().await.unwrap();
        assert!(dht.contains(&params));
    }

    /// Tests direct-message denial for unfriendly peers.
    #[tokio::test]
    async fn test_denied_peer_reports_failure() {
        let dht = MemoryDht::new();
        let peer = PeerAddress::new("p0");
        dht.deny_messages(&peer);
        let reply = dht
            .send_direct(
                &peer,
                DirectMessage::FileDeleted {
                    sender: UserId::new("alice").unwrap(),
                    file_id: PublicKey::from_der(vec![1; 8]).id(),
                    path: "a.txt".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(reply, AcceptanceReply::Failure);
    }
}
