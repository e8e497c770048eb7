//! Wire protocol and board constants shared by the arena server and its clients.
//!
//! Every message travels as a fixed-size record of [`RECORD_SIZE`] bytes: the
//! bincode encoding of a [`Packet`] followed by zero padding. Stream readers
//! therefore never need delimiters, only a full-record read.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const BOARD_SIZE: usize = 20;
pub const MAX_HEALTH: u8 = 10;
pub const MAX_PLAYERS: usize = 10;
pub const MAX_BOTS: usize = 10;
pub const MAX_PRIZES: usize = 10;
/// One slot per player, bot and prize the arena can hold at once.
pub const MAX_BALLS: usize = MAX_PLAYERS + MAX_BOTS + MAX_PRIZES;
pub const INITIAL_PRIZES: usize = 5;
pub const BOT_GLYPH: char = '*';
pub const DEFAULT_PORT: u16 = 40000;
pub const RECORD_SIZE: usize = 512;

/// Movement intent sent by a client, or picked at random for a bot.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    None,
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// The four directions a bot chooses between.
    pub const MOVES: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    pub fn offset(self) -> (i32, i32) {
        match self {
            Direction::None => (0, 0),
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }
}

/// A cell on the board. Column `x`, row `y`.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn step(self, direction: Direction) -> Self {
        let (dx, dy) = direction.offset();
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// True for cells inside the wall ring, `[1, BOARD_SIZE - 2]` on both axes.
    pub fn is_interior(self) -> bool {
        let max = BOARD_SIZE as i32 - 2;
        (1..=max).contains(&self.x) && (1..=max).contains(&self.y)
    }
}

/// Snapshot of one ball as clients see it.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct BallInfo {
    pub glyph: char,
    pub health: u8,
    pub x: i32,
    pub y: i32,
}

impl BallInfo {
    pub fn position(&self) -> Position {
        Position::new(self.x, self.y)
    }

    /// Players are drawn with uppercase letters; bots and prizes are not.
    pub fn is_player(&self) -> bool {
        self.glyph.is_ascii_uppercase()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum Packet {
    Connect,
    Move { direction: Direction },
    ContinueGame,
    Disconnect,

    BallInfo { ball: BallInfo },
    Reject,
    FieldStatus { field: Vec<BallInfo> },
    HealthZero,
}

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("encoded packet is {len} bytes, record holds {max}")]
    TooLarge { len: usize, max: usize },
    #[error("failed to encode packet: {0}")]
    Encode(bincode::Error),
    #[error("failed to decode record: {0}")]
    Decode(bincode::Error),
    #[error("record transport failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Encodes a packet into one zero-padded record.
pub fn encode_record(packet: &Packet) -> Result<[u8; RECORD_SIZE], RecordError> {
    let bytes = bincode::serialize(packet).map_err(RecordError::Encode)?;
    if bytes.len() > RECORD_SIZE {
        return Err(RecordError::TooLarge {
            len: bytes.len(),
            max: RECORD_SIZE,
        });
    }

    let mut record = [0u8; RECORD_SIZE];
    record[..bytes.len()].copy_from_slice(&bytes);
    Ok(record)
}

/// Decodes a record, ignoring the padding after the packet.
pub fn decode_record(record: &[u8]) -> Result<Packet, RecordError> {
    bincode::deserialize(record).map_err(RecordError::Decode)
}
