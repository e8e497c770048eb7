use crate::slots::Slot;
use chase_shared::{BallInfo, Position, MAX_HEALTH};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BallKind {
    Empty,
    Player,
    Bot,
    Prize,
}

/// One entry of the entity table.
///
/// For prizes `health` is the bonus granted on pickup. Player connections are
/// tracked by the client registry, keyed by session, so a ball never holds a
/// transport handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ball {
    pub kind: BallKind,
    pub position: Position,
    pub glyph: char,
    pub health: u8,
}

impl Ball {
    pub const EMPTY: Ball = Ball {
        kind: BallKind::Empty,
        position: Position { x: 0, y: 0 },
        glyph: ' ',
        health: 0,
    };

    pub fn new(kind: BallKind, position: Position, glyph: char, health: u8) -> Self {
        Self {
            kind,
            position,
            glyph,
            health: health.min(MAX_HEALTH),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.kind == BallKind::Empty
    }

    pub fn is_dead(&self) -> bool {
        self.kind == BallKind::Player && self.health == 0
    }

    /// Adds health, clamped at `MAX_HEALTH`. Returns the amount actually gained.
    pub fn heal(&mut self, amount: u8) -> u8 {
        let before = self.health;
        self.health = self.health.saturating_add(amount).min(MAX_HEALTH);
        self.health - before
    }

    /// Removes health, clamped at zero. Returns the amount actually lost.
    pub fn wound(&mut self, amount: u8) -> u8 {
        let before = self.health;
        self.health = self.health.saturating_sub(amount);
        before - self.health
    }

    pub fn info(&self) -> BallInfo {
        BallInfo {
            glyph: self.glyph,
            health: self.health,
            x: self.position.x,
            y: self.position.y,
        }
    }
}

/// Fixed-capacity arena of balls addressed by slot.
#[derive(Debug, Clone)]
pub struct EntityTable {
    balls: Vec<Ball>,
}

impl EntityTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            balls: vec![Ball::EMPTY; capacity],
        }
    }

    pub fn capacity(&self) -> usize {
        self.balls.len()
    }

    /// Returns the ball in `slot`, or `None` when the slot is empty.
    pub fn get(&self, slot: Slot) -> Option<&Ball> {
        self.balls.get(slot.0).filter(|ball| !ball.is_empty())
    }

    pub fn get_mut(&mut self, slot: Slot) -> Option<&mut Ball> {
        self.balls.get_mut(slot.0).filter(|ball| !ball.is_empty())
    }

    pub fn insert(&mut self, slot: Slot, ball: Ball) {
        self.balls[slot.0] = ball;
    }

    /// Empties the slot and returns what was there.
    pub fn clear(&mut self, slot: Slot) -> Option<Ball> {
        let ball = std::mem::replace(self.balls.get_mut(slot.0)?, Ball::EMPTY);
        (!ball.is_empty()).then_some(ball)
    }

    /// Occupied slots in index order.
    pub fn iter(&self) -> impl Iterator<Item = (Slot, &Ball)> {
        self.balls
            .iter()
            .enumerate()
            .filter(|(_, ball)| !ball.is_empty())
            .map(|(index, ball)| (Slot(index), ball))
    }

    pub fn slots_of(&self, kind: BallKind) -> Vec<Slot> {
        self.iter()
            .filter(|(_, ball)| ball.kind == kind)
            .map(|(slot, _)| slot)
            .collect()
    }

    pub fn count(&self, kind: BallKind) -> usize {
        self.iter().filter(|(_, ball)| ball.kind == kind).count()
    }

    pub fn glyph_in_use(&self, glyph: char) -> bool {
        self.iter()
            .any(|(_, ball)| ball.kind == BallKind::Player && ball.glyph == glyph)
    }
}
