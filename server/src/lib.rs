//! # Chase Arena Server
//!
//! Authoritative server for a small multiplayer chase game on a 20x20 board
//! surrounded by walls. Players steer lettered balls, bots (`*`) wander at
//! random, and numbered prizes restore health when collected. Walking into
//! another live player steals one point of its health; a player whose health
//! reaches zero must ask to continue before its grace period runs out.
//!
//! ## Architecture
//!
//! ### Single Writer
//! All board state lives in one [`coordinator::Coordinator`] task. Sessions
//! and populators send it [`coordinator::ArenaCommand`]s over a channel and
//! never lock anything. Each command is applied to completion before the
//! next one is looked at, so every move is atomic with respect to every
//! other move.
//!
//! ### Fan-out
//! After each change the coordinator publishes a field snapshot on a
//! broadcast channel. Every joined session writes it to its own socket.
//!
//! ### Wire Format
//! Every message in either direction is one fixed-size, zero-padded record
//! of [`chase_shared::RECORD_SIZE`] bytes. See [`network::read_record`].
//!
//! ## Module Organization
//!
//! - `slots`, `entity`, `board`: slot allocation, the ball table and the
//!   position index
//! - `game`: the arena that keeps those three consistent
//! - `collision`: one-step move resolution
//! - `client_manager`: joined sessions and their respawn countdowns
//! - `coordinator`: the arena owner and its command set
//! - `session`, `populators`, `network`: the tasks around it
//! - `display`: server-side board rendering
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use chase_server::{Server, ServerConfig};
//! use tokio::sync::watch;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::bind(ServerConfig::default()).await?;
//!     let (_shutdown_tx, shutdown_rx) = watch::channel(false);
//!
//!     // Runs until `_shutdown_tx` sends `true` or is dropped.
//!     server.run(shutdown_rx).await;
//!     Ok(())
//! }
//! ```

pub mod board;
pub mod client_manager;
pub mod collision;
pub mod config;
pub mod coordinator;
pub mod display;
pub mod entity;
pub mod error;
pub mod game;
pub mod network;
pub mod populators;
pub mod session;
pub mod slots;

pub use config::ServerConfig;
pub use error::{ArenaError, ServerError};
pub use network::Server;
