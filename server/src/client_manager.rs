//! Registry of joined player sessions.
//!
//! This module tracks which connection owns which player slot, including:
//! - Session identity, so stale commands never touch a reused slot
//! - The channel used to push death and eviction notices to a session
//! - The cancellable respawn token armed while a player is dead
//!
//! The registry is owned by the arena coordinator and is never shared.

use crate::slots::Slot;
use log::info;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;
use tokio::sync::mpsc;

pub type SessionId = u64;

/// Notices the coordinator pushes to a session outside any request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// The player's health reached zero.
    Died,
    /// The session must close; its ball is already gone.
    Evicted,
}

/// A joined player and its session bookkeeping.
#[derive(Debug)]
pub struct Client {
    /// Session identifier assigned at join
    pub id: SessionId,
    /// Peer address, for logging
    pub addr: SocketAddr,
    /// Slot of the player's ball
    pub slot: Slot,
    /// Last time the session sent us anything
    pub last_seen: Instant,
    respawn_token: Option<u64>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl Client {
    pub fn new(
        id: SessionId,
        addr: SocketAddr,
        slot: Slot,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        Self {
            id,
            addr,
            slot,
            last_seen: Instant::now(),
            respawn_token: None,
            events,
        }
    }

    /// Pushes an event to the session. Returns false if the session is gone.
    pub fn notify(&self, event: SessionEvent) -> bool {
        self.events.send(event).is_ok()
    }

    pub fn respawn_pending(&self) -> bool {
        self.respawn_token.is_some()
    }
}

/// Manages all joined sessions and their respawn countdowns.
pub struct ClientManager {
    /// Joined sessions indexed by id
    clients: HashMap<SessionId, Client>,
    /// Next id handed to a joining session
    next_client_id: SessionId,
    /// Source of respawn tokens; never reused
    next_token: u64,
    /// Maximum number of concurrent players
    max_clients: usize,
}

impl ClientManager {
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            next_token: 1,
            max_clients,
        }
    }

    pub fn is_full(&self) -> bool {
        self.clients.len() >= self.max_clients
    }

    /// Registers a session owning `slot`.
    ///
    /// Returns None if the player limit is reached.
    pub fn add_client(
        &mut self,
        addr: SocketAddr,
        slot: Slot,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Option<SessionId> {
        if self.is_full() {
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        info!("Client {} from {} joined with slot {}", client_id, addr, slot);
        self.clients
            .insert(client_id, Client::new(client_id, addr, slot, events));

        Some(client_id)
    }

    pub fn remove_client(&mut self, client_id: &SessionId) -> Option<Client> {
        let client = self.clients.remove(client_id)?;
        info!("Client {} left, slot {} released", client.id, client.slot);
        Some(client)
    }

    pub fn get(&self, client_id: &SessionId) -> Option<&Client> {
        self.clients.get(client_id)
    }

    pub fn slot_of(&self, client_id: &SessionId) -> Option<Slot> {
        self.clients.get(client_id).map(|client| client.slot)
    }

    pub fn find_client_by_slot(&self, slot: Slot) -> Option<SessionId> {
        self.clients
            .values()
            .find(|client| client.slot == slot)
            .map(|client| client.id)
    }

    /// Records activity from a session. Any message counts as proof the
    /// player is still there, so this also cancels a pending countdown.
    pub fn touch(&mut self, client_id: &SessionId) {
        if let Some(client) = self.clients.get_mut(client_id) {
            client.last_seen = Instant::now();
            client.respawn_token = None;
        }
    }

    /// Arms a fresh respawn countdown, replacing any earlier one.
    pub fn arm_respawn(&mut self, client_id: &SessionId) -> Option<u64> {
        let client = self.clients.get_mut(client_id)?;
        let token = self.next_token;
        self.next_token += 1;
        client.respawn_token = Some(token);
        Some(token)
    }

    /// True if `token` is the countdown currently armed for the session.
    pub fn respawn_armed(&self, client_id: &SessionId, token: u64) -> bool {
        self.clients
            .get(client_id)
            .map_or(false, |client| client.respawn_token == Some(token))
    }

    pub fn notify(&self, client_id: &SessionId, event: SessionEvent) -> bool {
        self.clients
            .get(client_id)
            .map_or(false, |client| client.notify(event))
    }

    pub fn ids(&self) -> Vec<SessionId> {
        self.clients.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
