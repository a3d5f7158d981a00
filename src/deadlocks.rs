use crate::board::{Board, Tile};

/// Pairs of perpendicular neighbour offsets forming the four corners of a cell.
const CORNERS: [[(isize, isize); 2]; 4] = [
    [(-1, 0), (0, -1)],
    [(1, 0), (0, -1)],
    [(1, 0), (0, 1)],
    [(-1, 0), (0, 1)],
];

/// Scratch copy of a board's tiles on which immovable boxes-on-goal have been
/// turned into walls. The board itself is never modified.
struct FrozenTiles {
    tiles: Vec<Tile>,
    width: usize,
    height: usize,
}

impl FrozenTiles {
    fn new(board: &Board) -> Self {
        let mut frozen = FrozenTiles {
            tiles: board.tiles().to_vec(),
            width: board.width(),
            height: board.height(),
        };
        frozen.freeze_goal_corners();
        frozen
    }

    /// Cells outside the grid count as walls.
    fn get(&self, x: usize, y: usize, dx: isize, dy: isize) -> Tile {
        match (x.checked_add_signed(dx), y.checked_add_signed(dy)) {
            (Some(nx), Some(ny)) if nx < self.width && ny < self.height => {
                self.tiles[ny * self.width + nx]
            }
            _ => Tile::Wall,
        }
    }

    fn is_cornered(&self, x: usize, y: usize) -> bool {
        CORNERS.iter().any(|corner| {
            corner
                .iter()
                .all(|&(dx, dy)| self.get(x, y, dx, dy) == Tile::Wall)
        })
    }

    /// Repeatedly turn boxes on goals with walls on two perpendicular sides
    /// into walls until nothing changes.
    fn freeze_goal_corners(&mut self) {
        let mut changed = true;
        while changed {
            changed = false;
            for y in 0..self.height {
                for x in 0..self.width {
                    let idx = y * self.width + x;
                    if self.tiles[idx] == Tile::BoxOnGoal && self.is_cornered(x, y) {
                        self.tiles[idx] = Tile::Wall;
                        changed = true;
                    }
                }
            }
        }
    }

    fn has_cornered_box(&self) -> bool {
        (0..self.height).any(|y| {
            (0..self.width).any(|x| {
                self.tiles[y * self.width + x] == Tile::Box && self.is_cornered(x, y)
            })
        })
    }

    fn has_blocked_square(&self) -> bool {
        if self.width < 2 || self.height < 2 {
            return false;
        }

        for y in 0..self.height - 1 {
            for x in 0..self.width - 1 {
                let mut boxes = 0;
                let mut goals = 0;
                let mut blocked = 0;

                for (dx, dy) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
                    match self.tiles[(y + dy) * self.width + x + dx] {
                        Tile::Box => {
                            boxes += 1;
                            blocked += 1;
                        }
                        Tile::BoxOnGoal => {
                            goals += 1;
                            blocked += 1;
                        }
                        Tile::Wall => blocked += 1,
                        _ => {}
                    }
                }

                // A fully blocked square can never move again; it is only
                // hopeless when it holds more stray boxes than goals.
                if blocked == 4 && boxes > 0 && goals < boxes {
                    return true;
                }
            }
        }

        false
    }
}

impl Board {
    /// Returns true if the board is provably unsolvable.
    ///
    /// Sound but incomplete: a true result is always an unsolvable board, a
    /// false result says nothing.
    pub fn is_deadlock(&self) -> bool {
        let frozen = FrozenTiles::new(self);
        frozen.has_cornered_box() || frozen.has_blocked_square()
    }

    /// A box off goal with walls on two perpendicular sides can never move.
    pub fn is_corner_deadlock(&self) -> bool {
        FrozenTiles::new(self).has_cornered_box()
    }

    /// A 2x2 window made only of walls and boxes, holding fewer
    /// boxes-on-goal than stray boxes.
    pub fn is_two_by_two_deadlock(&self) -> bool {
        FrozenTiles::new(self).has_blocked_square()
    }
}
