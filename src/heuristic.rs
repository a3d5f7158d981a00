use crate::board::{Board, Position, Tile};

/// Trait for estimating how many pushes remain before a board is solved.
///
/// Estimates only order the solver's frontier; they need not be admissible.
pub trait Heuristic {
    fn estimate(&self, board: &Board) -> usize;
}

pub struct NullHeuristic;

impl NullHeuristic {
    pub fn new() -> Self {
        NullHeuristic
    }
}

impl Default for NullHeuristic {
    fn default() -> Self {
        Self::new()
    }
}

impl Heuristic for NullHeuristic {
    fn estimate(&self, _board: &Board) -> usize {
        0
    }
}

/// Sum over stray boxes of the Manhattan distance to the nearest uncovered
/// goal. Boxes blocking each other are ignored.
pub struct ManhattanHeuristic;

impl ManhattanHeuristic {
    pub fn new() -> Self {
        ManhattanHeuristic
    }
}

impl Default for ManhattanHeuristic {
    fn default() -> Self {
        Self::new()
    }
}

impl Heuristic for ManhattanHeuristic {
    fn estimate(&self, board: &Board) -> usize {
        let mut boxes: Vec<Position> = Vec::new();
        let mut goals: Vec<Position> = Vec::new();
        for (i, tile) in board.tiles().iter().enumerate() {
            match tile {
                Tile::Box => boxes.push(board.position(i)),
                Tile::Goal | Tile::PlayerOnGoal => goals.push(board.position(i)),
                _ => {}
            }
        }

        boxes
            .iter()
            .filter_map(|&b| goals.iter().map(|&g| b.manhattan(g)).min())
            .sum()
    }
}
