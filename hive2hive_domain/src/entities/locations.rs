// /////////////////////////////////////////////////////////////////////////////
// Hive2Hive RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Locations
//!
//! The DHT-stored registry of a user's currently logged-in peers. One
//! entry is designated *initial*; notifications try the initial peer
//! first and fall back through the rest. Invariant: at most one entry
//! is initial, and when the initial peer leaves, the role transfers to
//! the next entry.
//!
//! Entries that were left behind by an unfriendly logout are pruned
//! lazily: a notifier that exhausts a peer removes it and puts the set
//! back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::{PeerAddress, UserId};

/// One logged-in peer of a user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LocationEntry {
    peer: PeerAddress,
    timestamp: DateTime<Utc>,
    initial: bool,
}

impl LocationEntry {
    /// Returns the peer address
    pub fn peer(&self) -> &PeerAddress {
        &self.peer
    }

    /// Returns the login timestamp
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Returns true when this peer holds the initial role
    pub fn is_initial(&self) -> bool {
        self.initial
    }
}

/// The set of a user's logged-in peers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Locations {
    user_id: UserId,
    entries: Vec<LocationEntry>,
}

impl Locations {
    /// Creates an empty locations set for a user
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            entries: Vec::new(),
        }
    }

    /// Returns the owning user id
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Returns all entries
    pub fn entries(&self) -> &[LocationEntry] {
        &self.entries
    }

    /// Returns true when no peer is logged in
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the initial peer, if any
    pub fn initial_peer(&self) -> Option<&PeerAddress> {
        self.entries.iter().find(|e| e.initial).map(|e| &e.peer)
    }

    /// Returns the peers in notification order: initial first, then the
    /// rest in insertion order
    pub fn peers_initial_first(&self) -> Vec<PeerAddress> {
        let mut peers: Vec<PeerAddress> = Vec::with_capacity(self.entries.len());
        if let Some(initial) = self.initial_peer() {
            peers.push(initial.clone());
        }
        for entry in &self.entries {
            if !entry.initial {
                peers.push(entry.peer.clone());
            }
        }
        peers
    }

    /// Adds a peer at login time.
    ///
    /// The first peer of an empty set becomes initial. Re-adding an
    /// already present peer refreshes its timestamp.
    pub fn add_peer(&mut self, peer: PeerAddress) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.peer == peer) {
            entry.timestamp = Utc::now();
            return;
        }
        let initial = self.entries.is_empty();
        self.entries.push(LocationEntry {
            peer,
            timestamp: Utc::now(),
            initial,
        });
    }

    /// Removes a peer at logout or during stale-entry pruning.
    ///
    /// When the removed peer held the initial role, the role transfers
    /// to the first remaining entry. Returns true when an entry was
    /// removed.
    pub fn remove_peer(&mut self, peer: &PeerAddress) -> bool {
        let before = self.entries.len();
        let was_initial = self.entries.iter().any(|e| e.initial && &e.peer == peer);
        self.entries.retain(|e| &e.peer != peer);
        if was_initial {
            if let Some(first) = self.entries.first_mut() {
                first.initial = true;
            }
        }
        self.entries.len() < before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locations() -> Locations {
        Locations::new(UserId::new("alice").unwrap())
    }

    /// Tests initial-role assignment on login.
    ///
    /// Validates that:
    /// - The first peer becomes initial
    /// - Later peers do not take over the role
    /// - At most one entry is ever initial
    #[test]
    fn test_first_peer_becomes_initial() {
        let mut locations = locations();
        let first = PeerAddress::new("p0");
        let second = PeerAddress::new("p1");
        locations.add_peer(first.clone());
        locations.add_peer(second);

        assert_eq!(locations.initial_peer(), Some(&first));
        assert_eq!(locations.entries().iter().filter(|e| e.is_initial()).count(), 1);
    }

    /// Tests initial-role transfer when the initial peer logs out.
    #[test]
    fn test_initial_role_transfers_on_removal() {
        let mut locations = locations();
        let first = PeerAddress::new("p0");
        let second = PeerAddress::new("p1");
        locations.add_peer(first.clone());
        locations.add_peer(second.clone());

        assert!(locations.remove_peer(&first));
        assert_eq!(locations.initial_peer(), Some(&second));
    }

    /// Tests notification ordering: initial peer first.
    #[test]
    fn test_peers_initial_first_ordering() {
        let mut locations = locations();
        let peers: Vec<PeerAddress> = (0..3).map(|i| PeerAddress::new(format!("p{}", i))).collect();
        for peer in &peers {
            locations.add_peer(peer.clone());
        }
        // Transfer the role away from p0 to exercise reordering
        locations.remove_peer(&peers[0]);

        let ordered = locations.peers_initial_first();
        assert_eq!(ordered.first(), Some(&peers[1]));
        assert_eq!(ordered.len(), 2);
    }

    /// Tests that re-adding a present peer does not duplicate it.
    #[test]
    fn test_readd_refreshes_instead_of_duplicating() {
        let mut locations = locations();
        let peer = PeerAddress::new("p0");
        locations.add_peer(peer.clone());
        locations.add_peer(peer);
        assert_eq!(locations.entries().len(), 1);
    }
}
