//! Occupancy index mapping each board cell to the slot standing on it.

use crate::slots::Slot;
use chase_shared::{Position, BOARD_SIZE};

#[derive(Debug, Clone)]
pub struct Grid {
    cells: [[Option<Slot>; BOARD_SIZE]; BOARD_SIZE],
}

impl Default for Grid {
    fn default() -> Self {
        Self::new()
    }
}

impl Grid {
    pub fn new() -> Self {
        Self {
            cells: [[None; BOARD_SIZE]; BOARD_SIZE],
        }
    }

    fn index(position: Position) -> Option<(usize, usize)> {
        let x = usize::try_from(position.x).ok()?;
        let y = usize::try_from(position.y).ok()?;
        (x < BOARD_SIZE && y < BOARD_SIZE).then_some((x, y))
    }

    /// Slot occupying `position`. Cells off the board are never occupied.
    pub fn occupant(&self, position: Position) -> Option<Slot> {
        Self::index(position).and_then(|(x, y)| self.cells[x][y])
    }

    pub fn is_free(&self, position: Position) -> bool {
        position.is_interior() && self.occupant(position).is_none()
    }

    pub fn set(&mut self, position: Position, slot: Slot) {
        if let Some((x, y)) = Self::index(position) {
            self.cells[x][y] = Some(slot);
        }
    }

    pub fn clear(&mut self, position: Position) -> Option<Slot> {
        Self::index(position).and_then(|(x, y)| self.cells[x][y].take())
    }

    /// Moves the occupant of `from` to `to` in one step.
    pub fn relocate(&mut self, from: Position, to: Position) {
        if let Some(slot) = self.clear(from) {
            self.set(to, slot);
        }
    }

    /// Every interior cell with no occupant.
    pub fn free_cells(&self) -> Vec<Position> {
        let last = BOARD_SIZE as i32 - 2;
        (1..=last)
            .flat_map(|x| (1..=last).map(move |y| Position::new(x, y)))
            .filter(|&position| self.occupant(position).is_none())
            .collect()
    }

    /// Every occupied cell and its slot, wall ring included.
    pub fn occupied(&self) -> impl Iterator<Item = (Position, Slot)> + '_ {
        self.cells.iter().enumerate().flat_map(|(x, column)| {
            column.iter().enumerate().filter_map(move |(y, cell)| {
                cell.map(|slot| (Position::new(x as i32, y as i32), slot))
            })
        })
    }
}
