// /////////////////////////////////////////////////////////////////////////////
// Hive2Hive RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Logout Pipeline
//!
//! Detaches this peer cleanly:
//!
//! 1. write the persistent sidecar (the profile's digest map plus the
//!    session's public-key cache) beside the managed root,
//! 2. remove this peer from the locations set, transferring the
//!    initial role when it held it.
//!
//! Stopping the profile-manager worker is the facade's job after this
//! pipeline committed; the sidecar write still needs the manager. A
//! peer that dies without running this pipeline is an unfriendly
//! logout, detected lazily by notifiers.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use crate::application::services::LocationsManager;
use crate::application::use_cases::OpEnv;
use crate::infrastructure::adapters::PersistentMeta;
use crate::infrastructure::runtime::{CancelToken, ProcessStep, SequentialProcess};
use hive2hive_domain::H2HError;

struct LogoutContext {
    env: Arc<OpEnv>,
    locations: LocationsManager,
}

struct WriteSidecarStep;

#[async_trait]
impl ProcessStep<LogoutContext> for WriteSidecarStep {
    fn name(&self) -> &str {
        "write-sidecar"
    }

    async fn execute(&self, ctx: &LogoutContext, token: &CancelToken) -> Result<(), H2HError> {
        token.ensure_active()?;

        let profile = ctx.env.read_profile().await?;
        let digests = profile.root().digest_map();
        let key_cache = ctx.env.session.key_cache_snapshot();
        PersistentMeta::from_state(&digests, &key_cache).save(ctx.env.session.root_path())
    }
}

struct RemoveFromLocationsStep;

#[async_trait]
impl ProcessStep<LogoutContext> for RemoveFromLocationsStep {
    fn name(&self) -> &str {
        "remove-from-locations"
    }

    async fn execute(&self, ctx: &LogoutContext, token: &CancelToken) -> Result<(), H2HError> {
        token.ensure_active()?;
        ctx.locations
            .remove_peer(ctx.env.session.user_id(), ctx.env.session.peer_address())
            .await
    }
}

/// Runs the logout pipeline.
pub async fn run(env: Arc<OpEnv>) -> Result<(), H2HError> {
    let locations = LocationsManager::new(Arc::clone(&env.dht), env.config.ttl.locations());
    let user = env.session.user_id().clone();

    let ctx = LogoutContext { env, locations };

    let process = SequentialProcess::new("logout")
        .with_step(Arc::new(WriteSidecarStep) as Arc<dyn ProcessStep<LogoutContext>>)
        .with_step(Arc::new(RemoveFromLocationsStep));

    match process.execute_blocking(&ctx).await {
        Ok(()) => {
            info!(%user, "logout committed");
            Ok(())
        }
        Err(error) => {
            warn!(%user, %error, "logout failed");
            Err(error)
        }
    }
}
