use crate::slots::Slot;
use chase_shared::{Position, RecordError};
use thiserror::Error;

/// Failures raised by the arena core.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ArenaError {
    #[error("no free slots left")]
    Exhausted,
    #[error("no unoccupied interior cell left")]
    BoardFull,
    #[error("prize limit of {0} reached")]
    PrizeLimit(usize),
    #[error("cell ({}, {}) is outside the playable area", .0.x, .0.y)]
    OutOfBounds(Position),
    #[error("cell ({}, {}) is already occupied", .0.x, .0.y)]
    CellOccupied(Position),
    #[error("slot {0} holds no ball")]
    VacantSlot(Slot),
    #[error("board corrupted: {0}")]
    Corrupted(String),
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Record(#[from] RecordError),
    #[error("arena setup failed: {0}")]
    Arena(#[from] ArenaError),
}
