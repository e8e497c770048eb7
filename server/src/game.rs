use crate::board::Grid;
use crate::entity::{Ball, BallKind, EntityTable};
use crate::error::ArenaError;
use crate::slots::{Slot, SlotAllocator};
use chase_shared::{BallInfo, Direction, Position, BOT_GLYPH, MAX_BALLS, MAX_HEALTH, MAX_PRIZES};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Authoritative board state: entity table, occupancy grid, slot allocator
/// and prize counter.
///
/// Every method leaves the table and grid in agreement, so callers that own
/// the arena exclusively never observe a half-applied move.
#[derive(Debug)]
pub struct Arena {
    pub(crate) table: EntityTable,
    pub(crate) grid: Grid,
    pub(crate) slots: SlotAllocator,
    pub(crate) prizes: usize,
    rng: StdRng,
}

impl Arena {
    pub fn new(seed: Option<u64>) -> Self {
        Self::with_capacity(MAX_BALLS, seed)
    }

    pub fn with_capacity(capacity: usize, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            table: EntityTable::new(capacity),
            grid: Grid::new(),
            slots: SlotAllocator::new(capacity),
            prizes: 0,
            rng,
        }
    }

    /// Publishes a ball at `position` into a freshly acquired slot.
    pub fn insert_ball(
        &mut self,
        kind: BallKind,
        position: Position,
        glyph: char,
        health: u8,
    ) -> Result<Slot, ArenaError> {
        if !position.is_interior() {
            return Err(ArenaError::OutOfBounds(position));
        }
        if self.grid.occupant(position).is_some() {
            return Err(ArenaError::CellOccupied(position));
        }
        if kind == BallKind::Prize && self.prizes >= MAX_PRIZES {
            return Err(ArenaError::PrizeLimit(MAX_PRIZES));
        }

        let slot = self.slots.acquire()?;
        self.table.insert(slot, Ball::new(kind, position, glyph, health));
        self.grid.set(position, slot);
        if kind == BallKind::Prize {
            self.prizes += 1;
        }

        Ok(slot)
    }

    fn random_free_cell(&mut self) -> Result<Position, ArenaError> {
        self.grid
            .free_cells()
            .choose(&mut self.rng)
            .copied()
            .ok_or(ArenaError::BoardFull)
    }

    fn fresh_glyph(&mut self) -> Result<char, ArenaError> {
        let unused: Vec<char> = ('A'..='Z')
            .filter(|&glyph| !self.table.glyph_in_use(glyph))
            .collect();
        unused
            .choose(&mut self.rng)
            .copied()
            .ok_or(ArenaError::Exhausted)
    }

    /// Places a new player at full health on a random free cell, with a glyph
    /// no other active player is using.
    pub fn spawn_player(&mut self) -> Result<Slot, ArenaError> {
        if self.slots.is_exhausted() {
            return Err(ArenaError::Exhausted);
        }
        let glyph = self.fresh_glyph()?;
        let position = self.random_free_cell()?;
        let slot = self.insert_ball(BallKind::Player, position, glyph, MAX_HEALTH)?;

        info!("Added player {} '{}' at ({}, {})", slot, glyph, position.x, position.y);
        Ok(slot)
    }

    pub fn spawn_bot(&mut self) -> Result<Slot, ArenaError> {
        let position = self.random_free_cell()?;
        let slot = self.insert_ball(BallKind::Bot, position, BOT_GLYPH, MAX_HEALTH)?;

        debug!("Added bot {} at ({}, {})", slot, position.x, position.y);
        Ok(slot)
    }

    /// Places a prize worth 1 to 5 health. Its glyph is the value's digit.
    pub fn spawn_prize(&mut self) -> Result<Slot, ArenaError> {
        if self.prizes >= MAX_PRIZES {
            return Err(ArenaError::PrizeLimit(MAX_PRIZES));
        }
        let value: u8 = self.rng.gen_range(1..=5);
        let glyph = char::from(b'0' + value);
        let position = self.random_free_cell()?;
        let slot = self.insert_ball(BallKind::Prize, position, glyph, value)?;

        debug!("Added prize {} worth {} at ({}, {})", slot, value, position.x, position.y);
        Ok(slot)
    }

    /// Clears the ball's cell, empties its slot and hands the slot back.
    pub fn remove_ball(&mut self, slot: Slot) -> Result<Ball, ArenaError> {
        let ball = self.table.clear(slot).ok_or(ArenaError::VacantSlot(slot))?;

        if self.grid.occupant(ball.position) == Some(slot) {
            self.grid.clear(ball.position);
        }
        self.slots.release(slot);
        if ball.kind == BallKind::Prize {
            self.prizes -= 1;
        }

        Ok(ball)
    }

    /// Restores a dead player to full health. Returns false if the player was
    /// still alive.
    pub fn revive(&mut self, slot: Slot) -> Result<bool, ArenaError> {
        let ball = self.table.get_mut(slot).ok_or(ArenaError::VacantSlot(slot))?;
        if !ball.is_dead() {
            return Ok(false);
        }

        ball.health = MAX_HEALTH;
        info!("Player {} '{}' revived", slot, ball.glyph);
        Ok(true)
    }

    pub fn ball(&self, slot: Slot) -> Option<&Ball> {
        self.table.get(slot)
    }

    pub fn occupant(&self, position: Position) -> Option<Slot> {
        self.grid.occupant(position)
    }

    pub fn bots(&self) -> Vec<Slot> {
        self.table.slots_of(BallKind::Bot)
    }

    pub fn player_count(&self) -> usize {
        self.table.count(BallKind::Player)
    }

    pub fn prize_count(&self) -> usize {
        self.prizes
    }

    pub fn available_slots(&self) -> usize {
        self.slots.available()
    }

    pub fn random_direction(&mut self) -> Direction {
        *Direction::MOVES
            .choose(&mut self.rng)
            .unwrap_or(&Direction::None)
    }

    /// Every active ball, in slot order.
    pub fn snapshot(&self) -> Vec<BallInfo> {
        self.table.iter().map(|(_, ball)| ball.info()).collect()
    }

    /// Checks that the table, grid, allocator and prize counter agree.
    pub fn verify(&self) -> Result<(), ArenaError> {
        let corrupted = |reason: String| Err(ArenaError::Corrupted(reason));

        for (slot, ball) in self.table.iter() {
            if !ball.position.is_interior() {
                return corrupted(format!("{} sits in the wall", slot));
            }
            if self.grid.occupant(ball.position) != Some(slot) {
                return corrupted(format!("grid does not point at {}", slot));
            }
            if ball.health > MAX_HEALTH {
                return corrupted(format!("{} has {} health", slot, ball.health));
            }
            if self.slots.is_free(slot) {
                return corrupted(format!("{} is occupied and free", slot));
            }
        }

        for (position, slot) in self.grid.occupied() {
            match self.table.get(slot) {
                Some(ball) if ball.position == position => {}
                _ => {
                    return corrupted(format!(
                        "cell ({}, {}) points at stale {}",
                        position.x, position.y, slot
                    ))
                }
            }
        }

        let occupied = self.table.iter().count();
        if occupied + self.slots.available() != self.slots.capacity() {
            return corrupted(format!(
                "{} occupied and {} free slots out of {}",
                occupied,
                self.slots.available(),
                self.slots.capacity()
            ));
        }

        if self.table.count(BallKind::Prize) != self.prizes {
            return corrupted(format!("prize counter reads {}", self.prizes));
        }

        Ok(())
    }

    #[cfg(test)]
    /// Moves a ball to `to`, swapping places with whatever sits there.
    pub(crate) fn teleport(&mut self, slot: Slot, to: Position) {
        let from = self.table.get(slot).expect("teleport of empty slot").position;
        if from == to {
            return;
        }

        match self.grid.occupant(to) {
            Some(other) => {
                self.table.get_mut(other).expect("stale cell").position = from;
                self.grid.set(from, other);
            }
            None => {
                self.grid.clear(from);
            }
        }
        self.table.get_mut(slot).expect("teleport of empty slot").position = to;
        self.grid.set(to, slot);
    }

    #[cfg(test)]
    pub(crate) fn set_health(&mut self, slot: Slot, health: u8) {
        self.table.get_mut(slot).expect("empty slot").health = health;
    }
}
