// /////////////////////////////////////////////////////////////////////////////
// Hive2Hive RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Locations Manager
//!
//! Reads and writes a user's locations set in the DHT. The set lives at
//! the user id's location key under the `LOCATIONS` content key and is
//! stored without protection keys: any peer that detects an unfriendly
//! logout must be able to prune the stale entry, friend or not.

use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use hive2hive_domain::entities::Locations;
use hive2hive_domain::network::NetworkContent;
use hive2hive_domain::ports::DataManager;
use hive2hive_domain::value_objects::content_keys;
use hive2hive_domain::{DhtParameters, H2HError, PeerAddress, UserId};

/// Access to users' locations sets.
#[derive(Clone)]
pub struct LocationsManager {
    dht: Arc<dyn DataManager>,
    ttl: Option<Duration>,
}

impl LocationsManager {
    /// Creates a manager surfacing `ttl` verbatim on every put
    pub fn new(dht: Arc<dyn DataManager>, ttl: Option<Duration>) -> Self {
        Self { dht, ttl }
    }

    fn params(user: &UserId) -> DhtParameters {
        DhtParameters::new(user.as_str(), content_keys::LOCATIONS)
    }

    /// Fetches a user's locations; an absent slot is an empty set
    pub async fn get(&self, user: &UserId) -> Result<Locations, H2HError> {
        match self.dht.get(&Self::params(user)).await? {
            None => Ok(Locations::new(user.clone())),
            Some(content) => content.expect_locations(),
        }
    }

    /// Stores a locations set back
    pub async fn put(&self, locations: Locations) -> Result<(), H2HError> {
        let params = Self::params(locations.user_id()).with_optional_ttl(self.ttl);
        self.dht.put(&params, NetworkContent::Locations(locations)).await
    }

    /// Appends a peer at login; the first peer becomes initial
    pub async fn add_peer(&self, user: &UserId, peer: PeerAddress) -> Result<(), H2HError> {
        let mut locations = self.get(user).await?;
        locations.add_peer(peer.clone());
        debug!(%user, %peer, "peer added to locations");
        self.put(locations).await
    }

    /// Removes a peer at logout, transferring the initial role
    pub async fn remove_peer(&self, user: &UserId, peer: &PeerAddress) -> Result<(), H2HError> {
        let mut locations = self.get(user).await?;
        if locations.remove_peer(peer) {
            debug!(%user, %peer, "peer removed from locations");
            self.put(locations).await?;
        }
        Ok(())
    }
}
