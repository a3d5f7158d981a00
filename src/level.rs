use serde::Serialize;

use crate::board::{Board, Position, Tile};

/// A level as handed to a renderer: the role grid plus explicit object lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Level {
    pub width: usize,
    pub height: usize,
    /// Rows of tiles, `grid[y][x]`
    pub grid: Vec<Vec<Tile>>,
    pub player: Position,
    pub boxes: Vec<Position>,
    pub targets: Vec<Position>,
}

impl Level {
    pub fn from_board(board: &Board) -> Self {
        let mut board = board.clone();
        board.clear_reachable();

        Level {
            width: board.width(),
            height: board.height(),
            grid: board
                .tiles()
                .chunks(board.width())
                .map(|row| row.to_vec())
                .collect(),
            player: board.player(),
            boxes: board.box_positions(),
            targets: board.goal_positions(),
        }
    }

    pub fn wall_count(&self) -> usize {
        self.grid
            .iter()
            .flatten()
            .filter(|&&t| t == Tile::Wall)
            .count()
    }

    pub fn to_board(&self) -> crate::Result<Board> {
        Board::from_tiles(self.width, self.height, self.grid.concat())
    }
}
