//! Arena coordinator: the single task that owns and mutates the board.
//!
//! Sessions and populators never touch the arena directly. They send an
//! [`ArenaCommand`] and, where they need an answer, wait on a oneshot reply.
//! Because one task applies every command to completion, the grid and entity
//! table are never observed half-updated and two attackers can never race on
//! the same victim's health.
//!
//! After each state change the coordinator publishes a snapshot on a
//! broadcast channel; every joined session forwards it to its own socket, so
//! a stalled client can only stall itself.

use crate::client_manager::{ClientManager, SessionEvent, SessionId};
use crate::collision::MoveOutcome;
use crate::config::ServerConfig;
use crate::display::{stats_panel, BoardSink, TextBoard};
use crate::entity::Ball;
use crate::error::ServerError;
use crate::game::Arena;
use crate::slots::Slot;
use chase_shared::{BallInfo, Direction};
use log::{debug, error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch, Notify};

const UPDATE_BACKLOG: usize = 64;

/// Shared handle to one field snapshot.
pub type FieldSnapshot = Arc<Vec<BallInfo>>;

/// Requests handled by the coordinator.
#[derive(Debug)]
pub enum ArenaCommand {
    Join {
        addr: SocketAddr,
        reply: oneshot::Sender<JoinOutcome>,
    },
    Move {
        session: SessionId,
        direction: Direction,
        reply: oneshot::Sender<MoveReply>,
    },
    Continue {
        session: SessionId,
    },
    Leave {
        session: SessionId,
    },
    /// Activity that needs no other handling.
    Touch {
        session: SessionId,
    },
    MoveBots,
    SpawnPrize {
        reply: oneshot::Sender<bool>,
    },
    RespawnExpired {
        session: SessionId,
        token: u64,
    },
}

#[derive(Debug)]
pub enum JoinOutcome {
    Accepted(Box<Joined>),
    Rejected,
}

/// Everything a session needs once its player is on the board.
#[derive(Debug)]
pub struct Joined {
    pub session: SessionId,
    pub ball: BallInfo,
    /// Snapshot taken at join, so the client can draw before the next update.
    pub field: Vec<BallInfo>,
    pub updates: broadcast::Receiver<FieldSnapshot>,
    pub events: mpsc::UnboundedReceiver<SessionEvent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveReply {
    Applied,
    /// The player has no health left; nothing moved.
    Dead,
    /// The session no longer owns a ball.
    Unknown,
}

pub struct Coordinator {
    config: ServerConfig,
    arena: Arena,
    clients: ClientManager,
    board: Box<dyn BoardSink>,
    last_field: Vec<BallInfo>,
    commands_tx: mpsc::UnboundedSender<ArenaCommand>,
    commands_rx: mpsc::UnboundedReceiver<ArenaCommand>,
    updates: broadcast::Sender<FieldSnapshot>,
    prize_capacity: Arc<Notify>,
}

impl Coordinator {
    /// Builds the arena and places the configured bots.
    pub fn new(config: &ServerConfig) -> Result<Self, ServerError> {
        config.validate()?;

        let mut arena = Arena::new(config.seed);
        for _ in 0..config.bot_count {
            arena.spawn_bot()?;
        }
        info!("Arena ready with {} bots", config.bot_count);

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (updates, _) = broadcast::channel(UPDATE_BACKLOG);

        let mut coordinator = Self {
            config: config.clone(),
            arena,
            clients: ClientManager::new(config.max_players),
            board: Box::new(TextBoard::new()),
            last_field: Vec::new(),
            commands_tx,
            commands_rx,
            updates,
            prize_capacity: Arc::new(Notify::new()),
        };
        coordinator.broadcast();
        Ok(coordinator)
    }

    pub fn with_board(mut self, board: Box<dyn BoardSink>) -> Self {
        self.board = board;
        self.board.redraw(&[], &self.last_field);
        self
    }

    pub fn commands(&self) -> mpsc::UnboundedSender<ArenaCommand> {
        self.commands_tx.clone()
    }

    /// Signalled whenever a prize is consumed or a slot is released.
    pub fn prize_capacity(&self) -> Arc<Notify> {
        Arc::clone(&self.prize_capacity)
    }

    /// Applies commands until shutdown, then evicts every session.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                command = self.commands_rx.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
                _ = shutdown.changed() => {
                    info!("Coordinator shutting down");
                    break;
                }
            }
        }

        for session in self.clients.ids() {
            self.evict(session);
        }
    }

    pub fn handle(&mut self, command: ArenaCommand) {
        match command {
            ArenaCommand::Join { addr, reply } => {
                let outcome = self.join(addr);
                if let Err(JoinOutcome::Accepted(joined)) = reply.send(outcome) {
                    warn!("Client {} vanished while joining", joined.session);
                    self.leave(joined.session);
                }
            }
            ArenaCommand::Move {
                session,
                direction,
                reply,
            } => {
                let result = self.move_player(session, direction);
                let _ = reply.send(result);
            }
            ArenaCommand::Continue { session } => self.continue_game(session),
            ArenaCommand::Leave { session } => self.leave(session),
            ArenaCommand::Touch { session } => self.touch(session),
            ArenaCommand::MoveBots => self.move_bots(),
            ArenaCommand::SpawnPrize { reply } => {
                let spawned = self.spawn_prize();
                let _ = reply.send(spawned);
            }
            ArenaCommand::RespawnExpired { session, token } => {
                self.respawn_expired(session, token)
            }
        }
    }

    fn join(&mut self, addr: SocketAddr) -> JoinOutcome {
        if self.clients.is_full() {
            info!("Rejecting {}: player limit reached", addr);
            return JoinOutcome::Rejected;
        }

        let slot = match self.arena.spawn_player() {
            Ok(slot) => slot,
            Err(e) => {
                info!("Rejecting {}: {}", addr, e);
                return JoinOutcome::Rejected;
            }
        };
        let Some(ball) = self.arena.ball(slot).map(Ball::info) else {
            error!("Player slot {} empty right after spawning", slot);
            return JoinOutcome::Rejected;
        };

        let (events_tx, events) = mpsc::unbounded_channel();
        let Some(session) = self.clients.add_client(addr, slot, events_tx) else {
            self.release(slot);
            return JoinOutcome::Rejected;
        };

        self.broadcast();
        info!(
            "{} players on the board after {} joined",
            self.arena.player_count(),
            addr
        );
        JoinOutcome::Accepted(Box::new(Joined {
            session,
            ball,
            field: self.last_field.clone(),
            updates: self.updates.subscribe(),
            events,
        }))
    }

    fn move_player(&mut self, session: SessionId, direction: Direction) -> MoveReply {
        let Some(slot) = self.clients.slot_of(&session) else {
            return MoveReply::Unknown;
        };
        self.clients.touch(&session);

        let dead = match self.arena.ball(slot) {
            Some(ball) => ball.is_dead(),
            None => {
                error!("Client {} owns empty slot {}", session, slot);
                self.evict(session);
                return MoveReply::Unknown;
            }
        };
        if dead {
            self.arm_respawn(session);
            return MoveReply::Dead;
        }

        match self.arena.resolve_move(slot, direction) {
            Ok(outcome) => {
                if self.apply_outcome(outcome) {
                    self.broadcast();
                }
                MoveReply::Applied
            }
            Err(e) => {
                error!("Move for client {} failed: {}", session, e);
                self.evict(session);
                MoveReply::Unknown
            }
        }
    }

    /// Records activity. A dead player that speaks without continuing gets a
    /// fresh countdown, so it cannot hold its seat by chatting.
    fn touch(&mut self, session: SessionId) {
        let Some(slot) = self.clients.slot_of(&session) else {
            return;
        };
        self.clients.touch(&session);

        if self.arena.ball(slot).is_some_and(Ball::is_dead) {
            self.arm_respawn(session);
        }
    }

    fn continue_game(&mut self, session: SessionId) {
        let Some(slot) = self.clients.slot_of(&session) else {
            return;
        };
        self.clients.touch(&session);

        match self.arena.revive(slot) {
            Ok(true) => self.broadcast(),
            Ok(false) => debug!("Client {} asked to continue while alive", session),
            Err(e) => {
                error!("Revive for client {} failed: {}", session, e);
                self.evict(session);
            }
        }
    }

    fn move_bots(&mut self) {
        let mut changed = false;
        for bot in self.arena.bots() {
            let direction = self.arena.random_direction();
            match self.arena.resolve_move(bot, direction) {
                Ok(outcome) => changed |= self.apply_outcome(outcome),
                Err(e) => error!("Bot {} move failed: {}", bot, e),
            }
        }
        if changed {
            self.broadcast();
        }
    }

    fn spawn_prize(&mut self) -> bool {
        match self.arena.spawn_prize() {
            Ok(_) => {
                self.broadcast();
                true
            }
            Err(e) => {
                debug!("No prize spawned: {}", e);
                false
            }
        }
    }

    fn respawn_expired(&mut self, session: SessionId, token: u64) {
        if self.clients.respawn_armed(&session, token) {
            let idle = self
                .clients
                .get(&session)
                .map(|client| client.last_seen.elapsed())
                .unwrap_or_default();
            info!("Client {} did not continue in time (idle {:?})", session, idle);
            self.evict(session);
        } else {
            debug!("Ignoring stale countdown {} for client {}", token, session);
        }
    }

    /// Returns true if the outcome changed anything clients can see.
    fn apply_outcome(&mut self, outcome: MoveOutcome) -> bool {
        if let MoveOutcome::Collected { prize, .. } = outcome {
            debug!("Prize '{}' collected", prize.glyph);
            self.prize_capacity.notify_one();
        }
        if let Some(victim) = outcome.killed() {
            self.handle_death(victim);
        }
        outcome.changed_state()
    }

    fn handle_death(&mut self, victim: Slot) {
        let Some(session) = self.clients.find_client_by_slot(victim) else {
            return;
        };
        info!("Client {} died", session);
        self.clients.notify(&session, SessionEvent::Died);
        self.arm_respawn(session);
    }

    /// Starts a countdown that evicts the session unless it speaks first.
    fn arm_respawn(&mut self, session: SessionId) {
        let Some(token) = self.clients.arm_respawn(&session) else {
            return;
        };

        let commands = self.commands_tx.clone();
        let grace = self.config.respawn_grace;
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            let _ = commands.send(ArenaCommand::RespawnExpired { session, token });
        });
    }

    fn evict(&mut self, session: SessionId) {
        self.clients.notify(&session, SessionEvent::Evicted);
        self.leave(session);
    }

    fn leave(&mut self, session: SessionId) {
        let Some(client) = self.clients.remove_client(&session) else {
            return;
        };
        self.release(client.slot);
        self.broadcast();
    }

    fn release(&mut self, slot: Slot) {
        if let Err(e) = self.arena.remove_ball(slot) {
            error!("Releasing slot {} failed: {}", slot, e);
        }
        self.prize_capacity.notify_one();
    }

    fn broadcast(&mut self) {
        if cfg!(debug_assertions) {
            if let Err(e) = self.arena.verify() {
                error!("{}", e);
            }
        }

        let field = self.arena.snapshot();
        self.board.redraw(&self.last_field, &field);
        debug!("Players:\n{}", stats_panel(&field));

        // No receivers simply means no joined sessions.
        let _ = self.updates.send(Arc::new(field.clone()));
        self.last_field = field;
    }
}
