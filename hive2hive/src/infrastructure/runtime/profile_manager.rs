// /////////////////////////////////////////////////////////////////////////////
// Hive2Hive RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # User-Profile Manager
//!
//! Serializes every get/modify/put cycle on the single encrypted
//! profile object. A dedicated worker task is the only code that talks
//! to the overlay about the profile; callers block on per-request
//! latches.
//!
//! ## Scheduling
//!
//! Two FIFO queues feed the worker. Modifiers take precedence over
//! readers to keep writes from starving:
//!
//! 1. With a modifier `M` queued, the worker performs one overlay
//!    get + decrypt, publishes the profile to `M` *and* to every
//!    currently-enqueued reader (they piggy-back the same round-trip),
//!    then holds the put slot open for `M` for at most the configured
//!    modification window, polled in ten slices. If `M` submits in
//!    time, the worker advances the version chain, encrypts, puts, and
//!    resolves `M`'s put latch with the outcome; if the window lapses,
//!    the latch resolves with the too-long-modification failure and no
//!    put happens.
//! 2. With only readers queued, one get serves them all.
//! 3. Idle, the worker parks on its channel.
//!
//! The worker is the sole mutator of the active-modifier slot, so the
//! "is this pid still allowed to put" check and the put itself are
//! atomic by construction; a modifier whose window lapsed can never
//! race its way into a put.
//!
//! A get failure is replicated to every piggy-backed reader. If the
//! worker stops, the manager is cold-failed: every subsequent call
//! fails immediately.

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use hive2hive_domain::entities::{UserCredentials, UserProfile};
use hive2hive_domain::ports::DataManager;
use hive2hive_domain::services::{codec, SymmetricCryptor};
use hive2hive_domain::value_objects::content_keys;
use hive2hive_domain::network::NetworkContent;
use hive2hive_domain::{DhtParameters, EncryptionKeyPair, H2HError, ProcessId};

const WINDOW_SLICES: u32 = 10;

type ProfileReply = oneshot::Sender<Result<UserProfile, H2HError>>;
type PutAck = oneshot::Sender<Result<(), H2HError>>;

enum Request {
    Get {
        reply: ProfileReply,
    },
    Modify {
        pid: ProcessId,
        reply: ProfileReply,
    },
    ReadyToPut {
        pid: ProcessId,
        profile: Box<UserProfile>,
        ack: PutAck,
    },
    Abort {
        pid: ProcessId,
    },
    Stop,
}

/// Serialized access point to the encrypted user profile.
///
/// Cheap to share; all state lives behind `Arc`s. Dropping the manager
/// does not stop the worker; call [`ProfileManager::stop`].
pub struct ProfileManager {
    tx: mpsc::UnboundedSender<Request>,
    put_latches: Arc<Mutex<HashMap<ProcessId, oneshot::Receiver<Result<(), H2HError>>>>>,
    protection_cache: Arc<Mutex<Option<EncryptionKeyPair>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ProfileManager {
    /// Starts the manager's worker for one logged-in user.
    ///
    /// `profile_ttl` is surfaced verbatim on every profile put.
    pub fn new(
        data_manager: Arc<dyn DataManager>,
        cryptor: Arc<dyn SymmetricCryptor>,
        credentials: UserCredentials,
        modification_window: Duration,
        profile_ttl: Option<Duration>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let put_latches = Arc::new(Mutex::new(HashMap::new()));
        let protection_cache = Arc::new(Mutex::new(None));

        let worker = Worker {
            data_manager,
            cryptor,
            credentials,
            modification_window,
            profile_ttl,
            put_latches: Arc::clone(&put_latches),
            protection_cache: Arc::clone(&protection_cache),
            modify_queue: VecDeque::new(),
            read_queue: VecDeque::new(),
            stopped: false,
        };
        let handle = tokio::spawn(worker.run(rx));

        Self {
            tx,
            put_latches,
            protection_cache,
            worker: Mutex::new(Some(handle)),
        }
    }

    /// Fetches the current profile.
    ///
    /// With `intends_to_put`, the caller becomes a queued modifier: the
    /// returned profile opens its exclusive modification window, and
    /// the caller must follow up with [`ready_to_put`](Self::ready_to_put)
    /// and [`wait_for_put`](Self::wait_for_put).
    ///
    /// # Errors
    /// Returns `H2HError::GetFailed` on overlay or decrypt failure, or
    /// when the manager is stopped.
    pub async fn get_user_profile(&self, pid: ProcessId, intends_to_put: bool) -> Result<UserProfile, H2HError> {
        let (reply, rx) = oneshot::channel();
        let request = if intends_to_put {
            Request::Modify { pid, reply }
        } else {
            Request::Get { reply }
        };
        self.tx
            .send(request)
            .map_err(|_| H2HError::GetFailed("profile manager stopped".to_string()))?;
        rx.await
            .map_err(|_| H2HError::GetFailed("profile manager stopped".to_string()))?
    }

    /// Submits the modified profile for the put slot.
    ///
    /// # Errors
    /// Returns `H2HError::PutFailed("Not allowed to put anymore")` when
    /// `pid` does not own the open modification window (it lapsed, or
    /// it never was the current modifier); otherwise the put outcome.
    pub async fn ready_to_put(&self, profile: UserProfile, pid: ProcessId) -> Result<(), H2HError> {
        let (ack, rx) = oneshot::channel();
        self.tx
            .send(Request::ReadyToPut {
                pid,
                profile: Box::new(profile),
                ack,
            })
            .map_err(|_| H2HError::PutFailed("profile manager stopped".to_string()))?;
        rx.await
            .map_err(|_| H2HError::PutFailed("profile manager stopped".to_string()))?
    }

    /// Releases an open modification window without putting.
    ///
    /// The modifier's put latch resolves with `AbortedByUser`; the
    /// worker moves on to the next queued request immediately.
    pub fn abort_modification(&self, pid: ProcessId) {
        let _ = self.tx.send(Request::Abort { pid });
    }

    /// Awaits the final put outcome of a modifier.
    ///
    /// # Errors
    /// Returns the put failure; in particular the too-long-modification
    /// failure when the window lapsed before `ready_to_put`.
    pub async fn wait_for_put(&self, pid: ProcessId) -> Result<(), H2HError> {
        let latch = self.put_latches.lock().remove(&pid);
        match latch {
            None => Err(H2HError::PutFailed("Not allowed to put anymore".to_string())),
            Some(rx) => rx
                .await
                .map_err(|_| H2HError::PutFailed("profile manager stopped".to_string()))?,
        }
    }

    /// Returns the user's protection keys, memoized after the first
    /// successful profile get
    pub async fn get_protection_keys(&self) -> Result<EncryptionKeyPair, H2HError> {
        if let Some(keys) = self.protection_cache.lock().clone() {
            return Ok(keys);
        }
        let profile = self.get_user_profile(ProcessId::generate(), false).await?;
        Ok(profile.protection_keys().clone())
    }

    /// Stops the worker; the manager is cold-failed afterwards
    pub async fn stop(&self) {
        let _ = self.tx.send(Request::Stop);
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

struct Worker {
    data_manager: Arc<dyn DataManager>,
    cryptor: Arc<dyn SymmetricCryptor>,
    credentials: UserCredentials,
    modification_window: Duration,
    profile_ttl: Option<Duration>,
    put_latches: Arc<Mutex<HashMap<ProcessId, oneshot::Receiver<Result<(), H2HError>>>>>,
    protection_cache: Arc<Mutex<Option<EncryptionKeyPair>>>,
    modify_queue: VecDeque<(ProcessId, ProfileReply)>,
    read_queue: VecDeque<ProfileReply>,
    stopped: bool,
}

impl Worker {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Request>) {
        info!(user = %self.credentials.user_id(), "profile manager worker started");
        loop {
            // Pull in everything already waiting before choosing work.
            if !self.drain_incoming(&mut rx) {
                break;
            }

            if let Some((pid, reply)) = self.modify_queue.pop_front() {
                self.serve_modifier(pid, reply, &mut rx).await;
                if self.stopped {
                    break;
                }
            } else if !self.read_queue.is_empty() {
                self.serve_readers(&mut rx).await;
            } else {
                match rx.recv().await {
                    None => break,
                    Some(Request::Stop) => break,
                    Some(request) => self.enqueue(request),
                }
            }
        }
        info!(user = %self.credentials.user_id(), "profile manager worker stopped");
    }

    /// Moves all pending channel requests into the queues. Returns
    /// false when a stop was requested.
    fn drain_incoming(&mut self, rx: &mut mpsc::UnboundedReceiver<Request>) -> bool {
        loop {
            match rx.try_recv() {
                Ok(Request::Stop) => return false,
                Ok(request) => self.enqueue(request),
                Err(mpsc::error::TryRecvError::Empty) => return true,
                Err(mpsc::error::TryRecvError::Disconnected) => return false,
            }
        }
    }

    fn enqueue(&mut self, request: Request) {
        match request {
            Request::Get { reply } => self.read_queue.push_back(reply),
            Request::Modify { pid, reply } => self.modify_queue.push_back((pid, reply)),
            Request::ReadyToPut { ack, .. } => {
                // No window is open; this submitter lost its slot.
                let _ = ack.send(Err(H2HError::PutFailed("Not allowed to put anymore".to_string())));
            }
            // No window open, nothing to abort
            Request::Abort { .. } => {}
            Request::Stop => unreachable!("stop handled by callers"),
        }
    }

    async fn serve_modifier(
        &mut self,
        pid: ProcessId,
        reply: ProfileReply,
        rx: &mut mpsc::UnboundedReceiver<Request>,
    ) {
        let fetched = self.fetch_profile().await;
        // Requests that arrived during the round-trip piggy-back on it.
        self.drain_incoming(rx);

        let profile = match fetched {
            Err(error) => {
                let _ = reply.send(Err(error.clone()));
                self.fail_readers(&error);
                return;
            }
            Ok(profile) => profile,
        };

        // Open the put latch before publishing so wait_for_put never
        // observes a gap.
        let (latch_tx, latch_rx) = oneshot::channel();
        self.put_latches.lock().insert(pid, latch_rx);

        let _ = reply.send(Ok(profile.clone()));
        self.publish_to_readers(&profile);

        // Hold the put slot open for the modifier, polled in slices so
        // a stop or foreign submitter is handled promptly. The deadline
        // is absolute; queued traffic does not stretch the window.
        let slice = self.modification_window / WINDOW_SLICES;
        let deadline = tokio::time::Instant::now() + self.modification_window;
        let outcome: Result<(), H2HError> = loop {
            let now = tokio::time::Instant::now();
            if now >= deadline {
                warn!(%pid, "modification window lapsed without ready_to_put");
                break Err(H2HError::PutFailed(format!(
                    "Too long modification. Only {}ms are allowed.",
                    self.modification_window.as_millis()
                )));
            }
            let wait = slice.min(deadline - now);
            match tokio::time::timeout(wait, rx.recv()).await {
                Err(_) => continue,
                Ok(None) => {
                    self.stopped = true;
                    break Err(H2HError::PutFailed("profile manager stopped".to_string()));
                }
                Ok(Some(Request::Stop)) => {
                    self.stopped = true;
                    break Err(H2HError::PutFailed("profile manager stopped".to_string()));
                }
                Ok(Some(Request::ReadyToPut {
                    pid: submitter,
                    profile: modified,
                    ack,
                })) => {
                    if submitter != pid {
                        let _ = ack.send(Err(H2HError::PutFailed("Not allowed to put anymore".to_string())));
                        continue;
                    }
                    let result = self.put_profile(*modified).await;
                    let _ = ack.send(result.clone());
                    break result;
                }
                Ok(Some(Request::Abort { pid: submitter })) => {
                    if submitter == pid {
                        debug!(%pid, "modification aborted by its owner");
                        break Err(H2HError::AbortedByUser("modification aborted".to_string()));
                    }
                }
                Ok(Some(other)) => self.enqueue(other),
            }
        };

        let _ = latch_tx.send(outcome);
    }

    async fn serve_readers(&mut self, rx: &mut mpsc::UnboundedReceiver<Request>) {
        let fetched = self.fetch_profile().await;
        self.drain_incoming(rx);

        match fetched {
            Ok(profile) => self.publish_to_readers(&profile),
            Err(error) => self.fail_readers(&error),
        }
    }

    fn publish_to_readers(&mut self, profile: &UserProfile) {
        while let Some(reader) = self.read_queue.pop_front() {
            let _ = reader.send(Ok(profile.clone()));
        }
    }

    fn fail_readers(&mut self, error: &H2HError) {
        while let Some(reader) = self.read_queue.pop_front() {
            let _ = reader.send(Err(error.clone()));
        }
    }

    async fn fetch_profile(&self) -> Result<UserProfile, H2HError> {
        let params = self.profile_params();
        let content = self
            .data_manager
            .get(&params)
            .await?
            .ok_or_else(|| H2HError::GetFailed("user profile not found".to_string()))?;
        let payload = content.expect_profile()?;
        let profile = codec::decrypt_profile(&payload, &self.credentials, self.cryptor.as_ref())?;

        let mut cache = self.protection_cache.lock();
        if cache.is_none() {
            *cache = Some(profile.protection_keys().clone());
        }
        Ok(profile)
    }

    async fn put_profile(&self, mut profile: UserProfile) -> Result<(), H2HError> {
        profile.advance_version();
        let payload = codec::encrypt_profile(&profile, &self.credentials, self.cryptor.as_ref())?;

        let mut params = self
            .profile_params()
            .with_version(profile.version_key())
            .with_optional_ttl(self.profile_ttl)
            .with_protection_keys(profile.protection_keys().clone());
        if let Some(based_on) = profile.based_on_key() {
            params = params.with_based_on(based_on);
        }

        self.data_manager
            .put(&params, NetworkContent::EncryptedProfile(payload))
            .await
            .map_err(|e| match e {
                H2HError::VersionConflict(msg) => H2HError::PutFailed(msg),
                other => other,
            })?;
        debug!(version = %profile.version_key(), "profile put committed");
        Ok(())
    }

    fn profile_params(&self) -> DhtParameters {
        DhtParameters::new(self.credentials.profile_location_key(), content_keys::USER_PROFILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::adapters::MemoryDht;
    use hive2hive_domain::entities::FolderIndex;
    use hive2hive_domain::{EncryptedPayload, PrivateKey, PublicKey, UserId};

    /// Transparent stand-in for the password cipher; these tests
    /// exercise scheduling, not cryptography.
    struct PlainCryptor;

    impl SymmetricCryptor for PlainCryptor {
        fn encrypt(&self, plaintext: &[u8], _credentials: &UserCredentials) -> Result<EncryptedPayload, H2HError> {
            Ok(EncryptedPayload::new(Vec::new(), Vec::new(), plaintext.to_vec()))
        }

        fn decrypt(&self, payload: &EncryptedPayload, _credentials: &UserCredentials) -> Result<Vec<u8>, H2HError> {
            Ok(payload.ciphertext().to_vec())
        }
    }

    fn credentials() -> UserCredentials {
        UserCredentials::new(UserId::new("alice").unwrap(), "secret", "1234")
    }

    fn key_pair(seed: u8) -> EncryptionKeyPair {
        EncryptionKeyPair::new(
            PublicKey::from_der(vec![seed; 8]),
            PrivateKey::from_der(vec![seed; 8]),
        )
    }

    async fn seed_profile(dht: &MemoryDht) -> UserProfile {
        let creds = credentials();
        let keys = key_pair(1);
        let profile = UserProfile::new(creds.user_id().clone(), FolderIndex::new("", keys.clone()), keys);
        let payload = PlainCryptor.encrypt(&serde_json::to_vec(&profile).unwrap(), &creds).unwrap();
        let params = DhtParameters::new(creds.profile_location_key(), content_keys::USER_PROFILE)
            .with_version(profile.version_key())
            .with_protection_keys(profile.protection_keys().clone());
        dht.put(&params, NetworkContent::EncryptedProfile(payload)).await.unwrap();
        profile
    }

    fn manager(dht: &MemoryDht, window: Duration) -> ProfileManager {
        ProfileManager::new(
            Arc::new(dht.clone()),
            Arc::new(PlainCryptor),
            credentials(),
            window,
            None,
        )
    }

    /// Tests a full modify cycle and the resulting version chain.
    ///
    /// Validates that:
    /// - The modifier receives the current profile
    /// - ready_to_put and wait_for_put both report success
    /// - The committed profile's based-on key equals the version the
    ///   modifier fetched
    #[tokio::test]
    async fn test_modify_cycle_extends_version_chain() {
        let dht = MemoryDht::new();
        seed_profile(&dht).await;
        let manager = manager(&dht, Duration::from_millis(1000));

        let pid = ProcessId::generate();
        let fetched = manager.get_user_profile(pid, true).await.unwrap();
        let fetched_version = fetched.version_key();

        manager.ready_to_put(fetched, pid).await.unwrap();
        manager.wait_for_put(pid).await.unwrap();

        let after = manager.get_user_profile(ProcessId::generate(), false).await.unwrap();
        assert_eq!(after.based_on_key(), Some(fetched_version));
        assert_ne!(after.version_key(), fetched_version);

        manager.stop().await;
    }

    /// Tests reader piggy-backing on one overlay round-trip.
    ///
    /// With a slow overlay (100 ms get), five concurrent readers are
    /// served by exactly one overlay get and observe identical
    /// profiles.
    #[tokio::test]
    async fn test_concurrent_readers_piggy_back() {
        let dht = MemoryDht::new();
        seed_profile(&dht).await;
        dht.set_get_latency(Duration::from_millis(100));
        let manager = Arc::new(manager(&dht, Duration::from_millis(1000)));

        let mut tasks = Vec::new();
        for _ in 0..5 {
            let manager = Arc::clone(&manager);
            tasks.push(tokio::spawn(async move {
                manager.get_user_profile(ProcessId::generate(), false).await
            }));
        }

        let mut profiles = Vec::new();
        for task in tasks {
            profiles.push(task.await.unwrap().unwrap());
        }

        assert_eq!(dht.get_count(), 1);
        for profile in &profiles[1..] {
            assert_eq!(profile, &profiles[0]);
        }

        manager.stop().await;
    }

    /// Tests the modification-window timeout.
    ///
    /// A modifier that never calls ready_to_put sees its wait_for_put
    /// fail with the too-long-modification message, no put reaches the
    /// overlay, and a subsequent modifier succeeds.
    #[tokio::test]
    async fn test_modifier_timeout_aborts_without_put() {
        let dht = MemoryDht::new();
        seed_profile(&dht).await;
        let puts_before = dht.put_count();
        let manager = manager(&dht, Duration::from_millis(300));

        let pid = ProcessId::generate();
        let _fetched = manager.get_user_profile(pid, true).await.unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;

        let error = manager.wait_for_put(pid).await.unwrap_err();
        assert_eq!(
            error,
            H2HError::PutFailed("Too long modification. Only 300ms are allowed.".to_string())
        );
        assert_eq!(dht.put_count(), puts_before);

        // A late submit from the lapsed modifier is refused
        let stale = manager
            .ready_to_put(seed_profile(&dht).await, pid)
            .await
            .unwrap_err();
        assert_eq!(stale, H2HError::PutFailed("Not allowed to put anymore".to_string()));

        // The slot is free again for the next modifier
        let next = ProcessId::generate();
        let profile = manager.get_user_profile(next, true).await.unwrap();
        manager.ready_to_put(profile, next).await.unwrap();
        manager.wait_for_put(next).await.unwrap();

        manager.stop().await;
    }

    /// Tests that a foreign pid cannot take an open put slot.
    #[tokio::test]
    async fn test_foreign_pid_cannot_put() {
        let dht = MemoryDht::new();
        seed_profile(&dht).await;
        let manager = manager(&dht, Duration::from_millis(1000));

        let owner = ProcessId::generate();
        let profile = manager.get_user_profile(owner, true).await.unwrap();

        let intruder = ProcessId::generate();
        let error = manager.ready_to_put(profile.clone(), intruder).await.unwrap_err();
        assert_eq!(error, H2HError::PutFailed("Not allowed to put anymore".to_string()));

        // The rightful owner still succeeds afterwards
        manager.ready_to_put(profile, owner).await.unwrap();
        manager.wait_for_put(owner).await.unwrap();

        manager.stop().await;
    }

    /// Tests that a get failure is replicated to piggy-backed readers.
    #[tokio::test]
    async fn test_get_failure_replicated_to_readers() {
        let dht = MemoryDht::new();
        seed_profile(&dht).await;
        dht.set_get_latency(Duration::from_millis(50));
        dht.set_fail_gets(true);
        let manager = Arc::new(manager(&dht, Duration::from_millis(1000)));

        let mut tasks = Vec::new();
        for _ in 0..3 {
            let manager = Arc::clone(&manager);
            tasks.push(tokio::spawn(async move {
                manager.get_user_profile(ProcessId::generate(), false).await
            }));
        }
        for task in tasks {
            assert!(matches!(task.await.unwrap(), Err(H2HError::GetFailed(_))));
        }

        manager.stop().await;
    }

    /// Tests cold failure after stop.
    #[tokio::test]
    async fn test_stopped_manager_cold_fails() {
        let dht = MemoryDht::new();
        seed_profile(&dht).await;
        let manager = manager(&dht, Duration::from_millis(1000));
        manager.stop().await;

        let result = manager.get_user_profile(ProcessId::generate(), false).await;
        assert!(matches!(result, Err(H2HError::GetFailed(_))));
    }
}
