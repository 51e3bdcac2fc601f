// /////////////////////////////////////////////////////////////////////////////
// Hive2Hive RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Login Pipeline
//!
//! Attaches this peer to a registered user:
//!
//! 1. fetch and decrypt the profile (the credential check *is* the
//!    successful decrypt),
//! 2. append this peer to the locations set; the first peer of an
//!    empty set becomes the initial peer,
//! 3. read the persistent sidecar beside the managed root: its digest
//!    map feeds the offline-change reconciliation, its key cache warms
//!    the session.
//!
//! The reconciliation itself (add/update/delete/download per detected
//! difference) runs after this pipeline committed, driven by the node
//! facade, so each difference is compensated by its own pipeline.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::application::services::LocationsManager;
use crate::application::use_cases::OpEnv;
use crate::infrastructure::adapters::PersistentMeta;
use crate::infrastructure::runtime::{CancelToken, ProcessStep, SequentialProcess};
use hive2hive_domain::{ContentHash, H2HError};

struct LoginContext {
    env: Arc<OpEnv>,
    locations: LocationsManager,
    locations_added: AtomicBool,
    sidecar_digests: Mutex<Option<BTreeMap<String, ContentHash>>>,
}

struct VerifyProfileStep;

#[async_trait]
impl ProcessStep<LoginContext> for VerifyProfileStep {
    fn name(&self) -> &str {
        "verify-profile"
    }

    async fn execute(&self, ctx: &LoginContext, token: &CancelToken) -> Result<(), H2HError> {
        token.ensure_active()?;
        // A wrong credential triple surfaces here as absence or an
        // authentication failure, never later.
        ctx.env.read_profile().await?;
        Ok(())
    }
}

struct AddToLocationsStep;

#[async_trait]
impl ProcessStep<LoginContext> for AddToLocationsStep {
    fn name(&self) -> &str {
        "add-to-locations"
    }

    async fn execute(&self, ctx: &LoginContext, token: &CancelToken) -> Result<(), H2HError> {
        token.ensure_active()?;
        ctx.locations
            .add_peer(ctx.env.session.user_id(), ctx.env.session.peer_address().clone())
            .await?;
        ctx.locations_added.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(&self, ctx: &LoginContext) -> Result<(), H2HError> {
        if !ctx.locations_added.load(Ordering::SeqCst) {
            return Ok(());
        }
        ctx.locations
            .remove_peer(ctx.env.session.user_id(), ctx.env.session.peer_address())
            .await
    }
}

struct LoadSidecarStep;

#[async_trait]
impl ProcessStep<LoginContext> for LoadSidecarStep {
    fn name(&self) -> &str {
        "load-sidecar"
    }

    async fn execute(&self, ctx: &LoginContext, token: &CancelToken) -> Result<(), H2HError> {
        token.ensure_active()?;

        match PersistentMeta::load(ctx.env.session.root_path()) {
            Ok(Some(meta)) => {
                ctx.env.session.warm_key_cache(meta.key_cache()?);
                *ctx.sidecar_digests.lock() = Some(meta.digests()?);
                debug!("sidecar loaded, offline reconciliation pending");
            }
            Ok(None) => debug!("no sidecar present, fresh root"),
            Err(error) => {
                // A corrupt sidecar must not block login; reconcile
                // will treat the root as fresh.
                warn!(%error, "sidecar unreadable, ignoring");
            }
        }
        Ok(())
    }
}

/// Runs the login pipeline; returns the sidecar digest map when one
/// was present, for the facade's offline reconciliation.
pub async fn run(env: Arc<OpEnv>) -> Result<Option<BTreeMap<String, ContentHash>>, H2HError> {
    let locations = LocationsManager::new(Arc::clone(&env.dht), env.config.ttl.locations());
    let user = env.session.user_id().clone();

    let ctx = LoginContext {
        env,
        locations,
        locations_added: AtomicBool::new(false),
        sidecar_digests: Mutex::new(None),
    };

    let process = SequentialProcess::new("login")
        .with_step(Arc::new(VerifyProfileStep) as Arc<dyn ProcessStep<LoginContext>>)
        .with_step(Arc::new(AddToLocationsStep))
        .with_step(Arc::new(LoadSidecarStep));

    match process.execute_blocking(&ctx).await {
        Ok(()) => {
            info!(%user, "login committed");
            Ok(ctx.sidecar_digests.lock().take())
        }
        Err(error) => {
            warn!(%user, %error, "login failed and rolled back");
            Err(error)
        }
    }
}
