use crate::error::ServerError;
use chase_shared::{DEFAULT_PORT, INITIAL_PRIZES, MAX_BOTS, MAX_PLAYERS, MAX_PRIZES};
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Runtime settings for one arena.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub bot_count: usize,
    pub max_players: usize,
    pub initial_prizes: usize,
    pub bot_period: Duration,
    pub prize_period: Duration,
    /// How long a dead player may wait before being dropped.
    pub respawn_grace: Duration,
    /// Seed for the arena RNG; random when unset.
    pub seed: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            bot_count: 3,
            max_players: MAX_PLAYERS,
            initial_prizes: INITIAL_PRIZES,
            bot_period: Duration::from_secs(3),
            prize_period: Duration::from_secs(5),
            respawn_grace: Duration::from_secs(10),
            seed: None,
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ServerError> {
        if !(1..=MAX_BOTS).contains(&self.bot_count) {
            return Err(ServerError::Config(format!(
                "bot count must be in [1, {}], got {}",
                MAX_BOTS, self.bot_count
            )));
        }
        if !(1..=MAX_PLAYERS).contains(&self.max_players) {
            return Err(ServerError::Config(format!(
                "player limit must be in [1, {}], got {}",
                MAX_PLAYERS, self.max_players
            )));
        }
        if self.initial_prizes > MAX_PRIZES {
            return Err(ServerError::Config(format!(
                "at most {} initial prizes, got {}",
                MAX_PRIZES, self.initial_prizes
            )));
        }
        if self.bot_period.is_zero() || self.prize_period.is_zero() {
            return Err(ServerError::Config(
                "populator periods must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}
