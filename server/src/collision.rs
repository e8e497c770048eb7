//! Move and collision resolution.
//!
//! A move either steps into an empty cell, collects a prize, steals health
//! from a player, or bumps into something that does not yield. Health is
//! clamped to `[0, MAX_HEALTH]` on both sides of every encounter.

use crate::entity::{Ball, BallKind};
use crate::error::ArenaError;
use crate::game::Arena;
use crate::slots::Slot;
use chase_shared::{Direction, Position};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// Wall, a prize in a bot's way, or no direction at all.
    Stayed,
    Moved { from: Position, to: Position },
    Collected { prize: Ball, to: Position, gained: u8 },
    /// Mover hit a player. The attacker only gains if the victim had health
    /// to lose.
    Stole {
        victim: Slot,
        gained: u8,
        lost: u8,
        victim_died: bool,
    },
    /// Mover hit a bot. Bots are immune; the mover still gains one point.
    Bumped { gained: u8 },
}

impl MoveOutcome {
    pub fn changed_state(&self) -> bool {
        match *self {
            MoveOutcome::Stayed => false,
            MoveOutcome::Moved { .. } | MoveOutcome::Collected { .. } => true,
            MoveOutcome::Stole { gained, lost, .. } => gained > 0 || lost > 0,
            MoveOutcome::Bumped { gained } => gained > 0,
        }
    }

    pub fn killed(&self) -> Option<Slot> {
        match *self {
            MoveOutcome::Stole {
                victim,
                victim_died: true,
                ..
            } => Some(victim),
            _ => None,
        }
    }
}

impl Arena {
    /// Applies one move for the ball in `mover`.
    ///
    /// Dead players and prizes never move. A grid cell that points at an
    /// empty slot is reported as corruption rather than repaired.
    pub fn resolve_move(
        &mut self,
        mover: Slot,
        direction: Direction,
    ) -> Result<MoveOutcome, ArenaError> {
        let ball = *self.table.get(mover).ok_or(ArenaError::VacantSlot(mover))?;
        if direction == Direction::None || ball.is_dead() || ball.kind == BallKind::Prize {
            return Ok(MoveOutcome::Stayed);
        }

        let from = ball.position;
        let to = from.step(direction);
        if !to.is_interior() {
            return Ok(MoveOutcome::Stayed);
        }

        let Some(occupant) = self.grid.occupant(to) else {
            self.step(mover, from, to);
            return Ok(MoveOutcome::Moved { from, to });
        };

        let target = *self.table.get(occupant).ok_or_else(|| {
            ArenaError::Corrupted(format!(
                "cell ({}, {}) points at empty {}",
                to.x, to.y, occupant
            ))
        })?;

        match (ball.kind, target.kind) {
            (BallKind::Player, BallKind::Prize) => {
                let prize = self.remove_ball(occupant)?;
                let gained = self.heal(mover, prize.health);
                self.step(mover, from, to);
                Ok(MoveOutcome::Collected { prize, to, gained })
            }
            (_, BallKind::Prize) => Ok(MoveOutcome::Stayed),
            (_, BallKind::Player) => {
                if target.health == 0 {
                    return Ok(MoveOutcome::Stole {
                        victim: occupant,
                        gained: 0,
                        lost: 0,
                        victim_died: false,
                    });
                }
                let lost = self
                    .table
                    .get_mut(occupant)
                    .map_or(0, |victim| victim.wound(1));
                let gained = self.heal(mover, 1);
                let victim_died = lost > 0
                    && self.table.get(occupant).map_or(false, |victim| victim.health == 0);
                Ok(MoveOutcome::Stole {
                    victim: occupant,
                    gained,
                    lost,
                    victim_died,
                })
            }
            (_, BallKind::Bot) => Ok(MoveOutcome::Bumped {
                gained: self.heal(mover, 1),
            }),
            (_, BallKind::Empty) => Err(ArenaError::Corrupted(format!(
                "occupied cell ({}, {}) resolved to an empty ball",
                to.x, to.y
            ))),
        }
    }

    fn heal(&mut self, slot: Slot, amount: u8) -> u8 {
        self.table.get_mut(slot).map_or(0, |ball| ball.heal(amount))
    }

    fn step(&mut self, slot: Slot, from: Position, to: Position) {
        if let Some(ball) = self.table.get_mut(slot) {
            ball.position = to;
            self.grid.relocate(from, to);
        }
    }
}
