//! Server-side view of the board.
//!
//! The coordinator redraws a [`BoardSink`] after every broadcast. The default
//! sink renders plain text into the log so an operator can watch the arena
//! with `RUST_LOG=debug`.

use chase_shared::{BallInfo, BOARD_SIZE};
use log::debug;

pub trait BoardSink: Send {
    fn place(&mut self, ball: &BallInfo);
    fn erase(&mut self, ball: &BallInfo);
    fn refresh(&mut self);

    /// Replaces the previous snapshot with the current one.
    fn redraw(&mut self, previous: &[BallInfo], current: &[BallInfo]) {
        for ball in previous {
            self.erase(ball);
        }
        for ball in current {
            self.place(ball);
        }
        self.refresh();
    }
}

/// Character grid with a `#` wall ring.
#[derive(Debug, Clone)]
pub struct TextBoard {
    cells: Vec<Vec<char>>,
}

impl Default for TextBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl TextBoard {
    pub fn new() -> Self {
        let last = BOARD_SIZE - 1;
        let cells = (0..BOARD_SIZE)
            .map(|y| {
                (0..BOARD_SIZE)
                    .map(|x| {
                        if x == 0 || y == 0 || x == last || y == last {
                            '#'
                        } else {
                            ' '
                        }
                    })
                    .collect()
            })
            .collect();
        Self { cells }
    }

    fn cell_mut(&mut self, ball: &BallInfo) -> Option<&mut char> {
        let x = usize::try_from(ball.x).ok()?;
        let y = usize::try_from(ball.y).ok()?;
        self.cells.get_mut(y)?.get_mut(x)
    }

    pub fn glyph_at(&self, x: usize, y: usize) -> Option<char> {
        self.cells.get(y)?.get(x).copied()
    }

    pub fn render(&self) -> String {
        self.cells
            .iter()
            .map(|row| row.iter().collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl BoardSink for TextBoard {
    fn place(&mut self, ball: &BallInfo) {
        if let Some(cell) = self.cell_mut(ball) {
            *cell = ball.glyph;
        }
    }

    fn erase(&mut self, ball: &BallInfo) {
        if let Some(cell) = self.cell_mut(ball) {
            if *cell == ball.glyph {
                *cell = ' ';
            }
        }
    }

    fn refresh(&mut self) {
        debug!("Board:\n{}", self.render());
    }
}

/// One `"<glyph> <hp>"` line per player.
pub fn stats_panel(field: &[BallInfo]) -> String {
    field
        .iter()
        .filter(|ball| ball.is_player())
        .map(|ball| format!("{} {}", ball.glyph, ball.health))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ball(glyph: char, health: u8, x: i32, y: i32) -> BallInfo {
        BallInfo { glyph, health, x, y }
    }

    #[test]
    fn test_new_board_has_walls() {
        let board = TextBoard::new();
        assert_eq!(board.glyph_at(0, 0), Some('#'));
        assert_eq!(board.glyph_at(BOARD_SIZE - 1, 3), Some('#'));
        assert_eq!(board.glyph_at(3, 3), Some(' '));
        assert_eq!(board.render().lines().count(), BOARD_SIZE);
    }

    #[test]
    fn test_redraw_moves_glyphs() {
        let mut board = TextBoard::new();
        let before = vec![ball('A', 10, 2, 3)];
        let after = vec![ball('A', 10, 3, 3), ball('*', 10, 5, 5)];

        board.redraw(&[], &before);
        assert_eq!(board.glyph_at(2, 3), Some('A'));

        board.redraw(&before, &after);
        assert_eq!(board.glyph_at(2, 3), Some(' '));
        assert_eq!(board.glyph_at(3, 3), Some('A'));
        assert_eq!(board.glyph_at(5, 5), Some('*'));
    }

    #[test]
    fn test_erase_keeps_newer_glyph() {
        let mut board = TextBoard::new();
        board.place(&ball('B', 4, 6, 6));
        board.erase(&ball('3', 3, 6, 6));
        assert_eq!(board.glyph_at(6, 6), Some('B'));
    }

    #[test]
    fn test_off_board_ball_ignored() {
        let mut board = TextBoard::new();
        board.place(&ball('C', 1, -1, 40));
        assert_eq!(board.render(), TextBoard::new().render());
    }

    #[test]
    fn test_stats_panel_lists_players() {
        let field = vec![
            ball('A', 7, 1, 1),
            ball('*', 10, 2, 2),
            ball('4', 4, 3, 3),
            ball('Q', 0, 4, 4),
        ];
        assert_eq!(stats_panel(&field), "A 7\nQ 0");
    }
}
