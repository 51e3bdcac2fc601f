// /////////////////////////////////////////////////////////////////////////////
// Hive2Hive RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Node Facade
//!
//! One Hive2Hive client on one peer: the composition root wiring the
//! overlay, the cipher implementations, the notification plumbing, and
//! the session, exposing each high-level operation as a method that
//! builds and runs its pipeline.
//!
//! Login additionally reconciles changes made while offline: the
//! sidecar's digest map is compared against the disk and the profile,
//! and each difference replays as a regular add / update / delete /
//! download pipeline.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::application::services::{
    LocationsManager, NotificationService, RemoteEventHandler, Session,
};
use crate::application::use_cases::{
    self, add_file, delete_file, download_file, login, logout, move_file, recover_file, register, share_folder,
    update_file, OpEnv,
};
use crate::infrastructure::adapters::{AesCryptor, MemoryDht, RsaCryptor, H2H_META_FILE};
use crate::infrastructure::config::H2HConfig;
use crate::infrastructure::runtime::ProfileManager;
use hive2hive_domain::entities::{PermissionType, UserCredentials};
use hive2hive_domain::ports::DataManager;
use hive2hive_domain::services::{AsymmetricCryptor, SymmetricCryptor};
use hive2hive_domain::{ContentHash, H2HError, PeerAddress, UserId};

/// One client on one peer.
pub struct H2HNode {
    config: H2HConfig,
    overlay: MemoryDht,
    dht: Arc<dyn DataManager>,
    symmetric: Arc<dyn SymmetricCryptor>,
    asymmetric: Arc<dyn AsymmetricCryptor>,
    notifier: NotificationService,
    peer_address: PeerAddress,
    session: Mutex<Option<Arc<Session>>>,
}

impl H2HNode {
    /// Creates a node joined to the given overlay.
    ///
    /// # Errors
    /// Returns `H2HError::InvalidConfiguration` for a rejected
    /// configuration.
    pub fn new(config: H2HConfig, overlay: MemoryDht, peer_label: impl Into<String>) -> Result<Self, H2HError> {
        config.validate()?;
        let dht: Arc<dyn DataManager> = Arc::new(overlay.clone());
        let locations = LocationsManager::new(Arc::clone(&dht), config.ttl.locations());
        let notifier = NotificationService::new(Arc::clone(&dht), locations);

        Ok(Self {
            symmetric: Arc::new(AesCryptor::new(config.aes_key_length)),
            asymmetric: Arc::new(RsaCryptor::new(config.rsa_key_length)),
            config,
            overlay,
            dht,
            notifier,
            peer_address: PeerAddress::new(peer_label),
            session: Mutex::new(None),
        })
    }

    /// Returns this peer's overlay address
    pub fn peer_address(&self) -> &PeerAddress {
        &self.peer_address
    }

    /// Returns the current session.
    ///
    /// # Errors
    /// Returns `H2HError::NoSession` when no user is logged in.
    pub fn session(&self) -> Result<Arc<Session>, H2HError> {
        self.session
            .lock()
            .clone()
            .ok_or_else(|| H2HError::no_session("no user logged in on this peer"))
    }

    fn env_with(&self, session: Arc<Session>) -> Arc<OpEnv> {
        Arc::new(OpEnv {
            config: self.config.clone(),
            dht: Arc::clone(&self.dht),
            symmetric: Arc::clone(&self.symmetric),
            asymmetric: Arc::clone(&self.asymmetric),
            session,
            notifier: self.notifier.clone(),
        })
    }

    fn env(&self) -> Result<Arc<OpEnv>, H2HError> {
        Ok(self.env_with(self.session()?))
    }

    /// Registers fresh credentials with the network
    pub async fn register(&self, credentials: UserCredentials) -> Result<(), H2HError> {
        register::run(
            self.config.clone(),
            Arc::clone(&self.dht),
            Arc::clone(&self.symmetric),
            Arc::clone(&self.asymmetric),
            credentials,
        )
        .await
    }

    /// Logs a registered user in on this peer and reconciles offline
    /// changes below `root_path`
    pub async fn login(&self, credentials: UserCredentials, root_path: PathBuf) -> Result<(), H2HError> {
        if self.session.lock().is_some() {
            return Err(H2HError::ProcessExecution(
                "a user is already logged in on this peer".to_string(),
            ));
        }
        std::fs::create_dir_all(&root_path)?;

        let manager = Arc::new(ProfileManager::new(
            Arc::clone(&self.dht),
            Arc::clone(&self.symmetric),
            credentials.clone(),
            self.config.max_modification_time(),
            self.config.ttl.user_profile(),
        ));
        let session = Arc::new(Session::new(
            credentials,
            root_path,
            self.peer_address.clone(),
            manager,
        ));
        let env = self.env_with(Arc::clone(&session));

        let sidecar_digests = match login::run(Arc::clone(&env)).await {
            Ok(digests) => digests,
            Err(error) => {
                session.profile_manager().stop().await;
                return Err(error);
            }
        };

        let handler = Arc::new(RemoteEventHandler::new(Arc::clone(&session)));
        self.overlay.register_peer(&self.peer_address, handler.clone());
        self.notifier.set_local_handler(handler);
        *self.session.lock() = Some(Arc::clone(&session));

        self.reconcile_offline_changes(env, sidecar_digests).await;
        Ok(())
    }

    /// Logs the current user out cleanly
    pub async fn logout(&self) -> Result<(), H2HError> {
        let session = self.session()?;
        logout::run(self.env_with(Arc::clone(&session))).await?;

        self.overlay.unregister_peer(&self.peer_address);
        self.notifier.clear_local_handler();
        session.profile_manager().stop().await;
        *self.session.lock() = None;
        Ok(())
    }

    /// Brings a file or folder below the root under synchronization
    pub async fn add_file(&self, absolute_path: PathBuf) -> Result<(), H2HError> {
        add_file::run(self.env()?, absolute_path).await
    }

    /// Commits the local content of a synchronized file as a new
    /// version
    pub async fn update_file(&self, absolute_path: PathBuf) -> Result<(), H2HError> {
        update_file::run(self.env()?, absolute_path).await
    }

    /// Removes a file or empty folder from synchronization
    pub async fn delete_file(&self, absolute_path: PathBuf) -> Result<(), H2HError> {
        delete_file::run(self.env()?, absolute_path).await
    }

    /// Moves or renames a synchronized node
    pub async fn move_item(&self, source: PathBuf, destination: PathBuf) -> Result<(), H2HError> {
        move_file::run(self.env()?, source, destination).await
    }

    /// Shares a folder subtree with a friend
    pub async fn share_folder(
        &self,
        absolute_path: PathBuf,
        friend: UserId,
        permission: PermissionType,
    ) -> Result<(), H2HError> {
        share_folder::run(self.env()?, absolute_path, friend, permission).await
    }

    /// Downloads the newest version of a synchronized file; returns
    /// false when the local copy was already current
    pub async fn download_file(&self, absolute_path: PathBuf) -> Result<bool, H2HError> {
        download_file::run(self.env()?, absolute_path).await
    }

    /// Recovers an older version beside the current file; returns the
    /// recovered path
    pub async fn recover_file(
        &self,
        absolute_path: PathBuf,
        selector: Arc<dyn recover_file::VersionSelector>,
    ) -> Result<PathBuf, H2HError> {
        recover_file::run(self.env()?, absolute_path, selector).await
    }

    /// Replays offline changes as regular pipelines. Individual
    /// failures degrade to warnings; login itself stands.
    async fn reconcile_offline_changes(
        &self,
        env: Arc<OpEnv>,
        sidecar_digests: Option<BTreeMap<String, ContentHash>>,
    ) {
        let profile = match env.read_profile().await {
            Ok(profile) => profile,
            Err(error) => {
                warn!(%error, "reconciliation skipped, profile unreadable");
                return;
            }
        };
        let profile_digests = profile.root().digest_map();
        let sidecar_digests = sidecar_digests.unwrap_or_default();

        let root = env.session.root_path().to_path_buf();
        let (disk_digests, disk_folders) = match scan_root(&root) {
            Ok(state) => state,
            Err(error) => {
                warn!(%error, "reconciliation skipped, root unreadable");
                return;
            }
        };

        // New local folders first, shallow before deep, so file adds
        // always find their parents.
        for folder in &disk_folders {
            if profile.root().node_at(Path::new(folder)).is_none() {
                debug!(path = folder, "reconcile: folder added offline");
                if let Err(error) = use_cases::add_file::run(Arc::clone(&env), root.join(folder)).await {
                    warn!(path = folder, %error, "reconcile add-folder failed");
                }
            }
        }

        for (path, disk_md5) in &disk_digests {
            match profile_digests.get(path) {
                None => {
                    debug!(path, "reconcile: file added offline");
                    if let Err(error) = use_cases::add_file::run(Arc::clone(&env), root.join(path)).await {
                        warn!(path, %error, "reconcile add failed");
                    }
                }
                Some(profile_md5) if profile_md5 != disk_md5 => {
                    let locally_changed = sidecar_digests.get(path) != Some(disk_md5);
                    if locally_changed {
                        debug!(path, "reconcile: file updated offline");
                        if let Err(error) = use_cases::update_file::run(Arc::clone(&env), root.join(path)).await {
                            warn!(path, %error, "reconcile update failed");
                        }
                    } else {
                        debug!(path, "reconcile: file updated remotely");
                        if let Err(error) = use_cases::download_file::run(Arc::clone(&env), root.join(path)).await {
                            warn!(path, %error, "reconcile download failed");
                        }
                    }
                }
                Some(_) => {}
            }
        }

        for path in profile_digests.keys() {
            if disk_digests.contains_key(path) {
                continue;
            }
            if sidecar_digests.contains_key(path) {
                // Present at last logout, gone now: deleted offline
                debug!(path, "reconcile: file deleted offline");
                if let Err(error) = use_cases::delete_file::run(Arc::clone(&env), root.join(path)).await {
                    warn!(path, %error, "reconcile delete failed");
                }
            } else {
                // Never seen on this root: appeared remotely
                debug!(path, "reconcile: file added remotely");
                if let Some(parent) = Path::new(path).parent() {
                    let _ = std::fs::create_dir_all(root.join(parent));
                }
                if let Err(error) = use_cases::download_file::run(Arc::clone(&env), root.join(path)).await {
                    warn!(path, %error, "reconcile download failed");
                }
            }
        }

        info!("offline reconciliation finished");
    }
}

/// Walks the managed root, returning `path → digest` for files and the
/// relative folder paths, shallow first. Hidden entries (the sidecar
/// among them) are skipped.
fn scan_root(root: &Path) -> Result<(BTreeMap<String, ContentHash>, Vec<String>), H2HError> {
    let mut files = BTreeMap::new();
    let mut folders = Vec::new();
    scan_dir(root, root, &mut files, &mut folders)?;
    folders.sort_by_key(|path| path.matches('/').count());
    Ok((files, folders))
}

fn scan_dir(
    root: &Path,
    dir: &Path,
    files: &mut BTreeMap<String, ContentHash>,
    folders: &mut Vec<String>,
) -> Result<(), H2HError> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') || name == H2H_META_FILE {
            continue;
        }
        let path = entry.path();
        let relative = path
            .strip_prefix(root)
            .map_err(|_| H2HError::internal_error("scan escaped the root"))?
            .to_string_lossy()
            .replace('\\', "/");
        if path.is_dir() {
            folders.push(relative);
            scan_dir(root, &path, files, folders)?;
        } else if path.is_file() {
            files.insert(relative, ContentHash::of_file(&path)?);
        }
    }
    Ok(())
}
