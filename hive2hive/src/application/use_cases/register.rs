// /////////////////////////////////////////////////////////////////////////////
// Hive2Hive RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Register Pipeline
//!
//! Creates a user's permanent DHT objects: the public-key slot (so
//! friends can address them), the empty locations set, and the
//! encrypted profile with a fresh protection key pair and empty root.
//! The profile put is last; a failure rolls the public objects back so
//! a half-registered user never exists.
//!
//! Registration runs without a session; it is the one operation that
//! precedes login.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

use crate::application::services::storage;
use crate::infrastructure::config::H2HConfig;
use crate::infrastructure::runtime::{CancelToken, ProcessStep, SequentialProcess};
use hive2hive_domain::entities::{FolderIndex, UserCredentials, UserProfile};
use hive2hive_domain::network::NetworkContent;
use hive2hive_domain::ports::DataManager;
use hive2hive_domain::services::{codec, AsymmetricCryptor, SymmetricCryptor};
use hive2hive_domain::value_objects::content_keys;
use hive2hive_domain::{DhtParameters, EncryptionKeyPair, H2HError};

struct RegisterContext {
    config: H2HConfig,
    dht: Arc<dyn DataManager>,
    symmetric: Arc<dyn SymmetricCryptor>,
    asymmetric: Arc<dyn AsymmetricCryptor>,
    credentials: UserCredentials,
    protection_keys: Mutex<Option<EncryptionKeyPair>>,
    public_key_put: AtomicBool,
    locations_put: AtomicBool,
}

impl RegisterContext {
    fn protection_keys(&self) -> Result<EncryptionKeyPair, H2HError> {
        self.protection_keys
            .lock()
            .clone()
            .ok_or_else(|| H2HError::internal_error("protection keys not yet generated"))
    }

    fn locations_params(&self) -> DhtParameters {
        DhtParameters::new(self.credentials.user_id().as_str(), content_keys::LOCATIONS)
            .with_optional_ttl(self.config.ttl.locations())
    }
}

struct CheckUnregisteredStep;

#[async_trait]
impl ProcessStep<RegisterContext> for CheckUnregisteredStep {
    fn name(&self) -> &str {
        "check-unregistered"
    }

    async fn execute(&self, ctx: &RegisterContext, token: &CancelToken) -> Result<(), H2HError> {
        token.ensure_active()?;

        let key_slot = DhtParameters::new(ctx.credentials.user_id().as_str(), content_keys::USER_PUBLIC_KEY);
        if ctx.dht.get(&key_slot).await?.is_some() {
            return Err(H2HError::ProcessExecution(format!(
                "user '{}' is already registered",
                ctx.credentials.user_id()
            )));
        }

        *ctx.protection_keys.lock() = Some(ctx.asymmetric.generate_key_pair()?);
        Ok(())
    }
}

struct PutPublicKeyStep;

#[async_trait]
impl ProcessStep<RegisterContext> for PutPublicKeyStep {
    fn name(&self) -> &str {
        "put-public-key"
    }

    async fn execute(&self, ctx: &RegisterContext, token: &CancelToken) -> Result<(), H2HError> {
        token.ensure_active()?;
        let protection_keys = ctx.protection_keys()?;
        storage::put_public_key(
            &ctx.dht,
            ctx.credentials.user_id(),
            protection_keys.public().clone(),
            &protection_keys,
            ctx.config.ttl.user_public_key(),
        )
        .await?;
        ctx.public_key_put.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(&self, ctx: &RegisterContext) -> Result<(), H2HError> {
        if !ctx.public_key_put.load(Ordering::SeqCst) {
            return Ok(());
        }
        let params = DhtParameters::new(ctx.credentials.user_id().as_str(), content_keys::USER_PUBLIC_KEY)
            .with_protection_keys(ctx.protection_keys()?);
        ctx.dht.remove(&params).await
    }
}

struct PutLocationsStep;

#[async_trait]
impl ProcessStep<RegisterContext> for PutLocationsStep {
    fn name(&self) -> &str {
        "put-locations"
    }

    async fn execute(&self, ctx: &RegisterContext, token: &CancelToken) -> Result<(), H2HError> {
        token.ensure_active()?;
        let locations = hive2hive_domain::entities::Locations::new(ctx.credentials.user_id().clone());
        ctx.dht
            .put(&ctx.locations_params(), NetworkContent::Locations(locations))
            .await?;
        ctx.locations_put.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(&self, ctx: &RegisterContext) -> Result<(), H2HError> {
        if !ctx.locations_put.load(Ordering::SeqCst) {
            return Ok(());
        }
        ctx.dht.remove(&ctx.locations_params()).await
    }
}

struct PutProfileStep;

#[async_trait]
impl ProcessStep<RegisterContext> for PutProfileStep {
    fn name(&self) -> &str {
        "put-profile"
    }

    async fn execute(&self, ctx: &RegisterContext, token: &CancelToken) -> Result<(), H2HError> {
        token.ensure_active()?;

        let protection_keys = ctx.protection_keys()?;
        let root_keys = ctx.asymmetric.generate_key_pair()?;
        let profile = UserProfile::new(
            ctx.credentials.user_id().clone(),
            FolderIndex::new("", root_keys),
            protection_keys.clone(),
        );

        let payload = codec::encrypt_profile(&profile, &ctx.credentials, ctx.symmetric.as_ref())?;
        let params = DhtParameters::new(ctx.credentials.profile_location_key(), content_keys::USER_PROFILE)
            .with_version(profile.version_key())
            .with_optional_ttl(ctx.config.ttl.user_profile())
            .with_protection_keys(protection_keys);
        ctx.dht.put(&params, NetworkContent::EncryptedProfile(payload)).await
    }
}

/// Runs the register pipeline for fresh credentials.
pub async fn run(
    config: H2HConfig,
    dht: Arc<dyn DataManager>,
    symmetric: Arc<dyn SymmetricCryptor>,
    asymmetric: Arc<dyn AsymmetricCryptor>,
    credentials: UserCredentials,
) -> Result<(), H2HError> {
    let user = credentials.user_id().clone();
    let ctx = RegisterContext {
        config,
        dht,
        symmetric,
        asymmetric,
        credentials,
        protection_keys: Mutex::new(None),
        public_key_put: AtomicBool::new(false),
        locations_put: AtomicBool::new(false),
    };

    let process = SequentialProcess::new("register")
        .with_step(Arc::new(CheckUnregisteredStep) as Arc<dyn ProcessStep<RegisterContext>>)
        .with_step(Arc::new(PutPublicKeyStep))
        .with_step(Arc::new(PutLocationsStep))
        .with_step(Arc::new(PutProfileStep));

    match process.execute_blocking(&ctx).await {
        Ok(()) => {
            info!(%user, "registration committed");
            Ok(())
        }
        Err(error) => {
            warn!(%user, %error, "registration failed and rolled back");
            Err(error)
        }
    }
}
