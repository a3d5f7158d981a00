use arrayvec::ArrayVec;
use rand::Rng;
use rand::distributions::{Distribution, WeightedIndex};
use std::collections::VecDeque;

use crate::board::{Board, MAX_SIZE, Position, Tile};
use crate::error::{Error, Result};

/// What a placement puts on a free floor cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Player,
    Box,
    Wall,
    Goal,
}

impl Placement {
    fn tile(self) -> Tile {
        match self {
            Placement::Player => Tile::Player,
            Placement::Box => Tile::Box,
            Placement::Wall => Tile::Wall,
            Placement::Goal => Tile::Goal,
        }
    }
}

/// 8-neighbourhood in ring order, starting north and going clockwise.
const RING: [(isize, isize); 8] = [
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
];

const ORTHOGONAL: [(isize, isize); 4] = [(0, -1), (1, 0), (0, 1), (-1, 0)];

/// Weight multiplier for a wall cell that is the only link between two
/// open areas.
const SOLE_LINK_FACTOR: f64 = 0.05;

/// The in-progress grid mutated by the generator.
///
/// Bordered by a permanent wall ring. Every placement only ever turns a
/// `Floor` cell into something else, and [`Scaffold::save`] /
/// [`Scaffold::load`] roll whole mutations back.
#[derive(Debug, Clone)]
pub struct Scaffold {
    width: usize,
    height: usize,
    tiles: Vec<Tile>,
    saved: Vec<Tile>,
    max_attempts: usize,
    weighted: bool,
}

impl Scaffold {
    /// Build a walled, empty grid and drop the player on it.
    pub fn new<R: Rng>(
        width: usize,
        height: usize,
        max_attempts: usize,
        weighted: bool,
        rng: &mut R,
    ) -> Result<Self> {
        if width < 3 || height < 3 {
            return Err(Error::InvalidConfiguration(format!(
                "A {}x{} grid has no interior",
                width, height
            )));
        }
        if width > MAX_SIZE || height > MAX_SIZE {
            return Err(Error::InvalidConfiguration(format!(
                "Grid size {}x{} exceeds maximum size {}",
                width, height, MAX_SIZE
            )));
        }

        let mut tiles = vec![Tile::Floor; width * height];
        for y in 0..height {
            for x in 0..width {
                if x == 0 || y == 0 || x == width - 1 || y == height - 1 {
                    tiles[y * width + x] = Tile::Wall;
                }
            }
        }

        let mut scaffold = Scaffold {
            width,
            height,
            saved: tiles.clone(),
            tiles,
            max_attempts,
            weighted,
        };
        scaffold.place(Placement::Player, rng)?;
        scaffold.save();
        Ok(scaffold)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn tile(&self, pos: Position) -> Tile {
        self.tiles[pos.y * self.width + pos.x]
    }

    pub fn wall_count(&self) -> usize {
        self.tiles.iter().filter(|&&t| t == Tile::Wall).count()
    }

    pub fn border_wall_count(&self) -> usize {
        2 * (self.width + self.height) - 4
    }

    pub fn interior_cells(&self) -> usize {
        (self.width - 2) * (self.height - 2)
    }

    pub fn box_count(&self) -> usize {
        self.tiles.iter().filter(|t| t.is_box()).count()
    }

    pub fn goal_count(&self) -> usize {
        self.tiles.iter().filter(|t| t.is_goal()).count()
    }

    /// Snapshot the grid.
    pub fn save(&mut self) {
        self.saved.clone_from(&self.tiles);
    }

    /// Restore the last snapshot.
    pub fn load(&mut self) {
        self.tiles.clone_from(&self.saved);
    }

    pub fn to_board(&self) -> Result<Board> {
        Board::from_tiles(self.width, self.height, self.tiles.clone())
    }

    pub fn place_box<R: Rng>(&mut self, rng: &mut R) -> Result<Position> {
        self.place(Placement::Box, rng)
    }

    pub fn place_wall<R: Rng>(&mut self, rng: &mut R) -> Result<Position> {
        self.place(Placement::Wall, rng)
    }

    pub fn place_goal<R: Rng>(&mut self, rng: &mut R) -> Result<Position> {
        self.place(Placement::Goal, rng)
    }

    /// Place a box and a goal together, leaving the grid untouched if either
    /// one finds no cell.
    pub fn place_pair<R: Rng>(&mut self, rng: &mut R) -> Result<()> {
        let box_pos = self.place_box(rng)?;
        if let Err(err) = self.place_goal(rng) {
            self.set(box_pos, Tile::Floor);
            return Err(err);
        }
        Ok(())
    }

    /// Turn one floor cell into `kind`. Weighted choice first when enabled,
    /// then up to `max_attempts` uniform random trials.
    pub fn place<R: Rng>(&mut self, kind: Placement, rng: &mut R) -> Result<Position> {
        if self.weighted {
            if let Some(pos) = self.weighted_pick(kind, rng) {
                self.set(pos, kind.tile());
                return Ok(pos);
            }
        }

        for _ in 0..self.max_attempts {
            let pos = Position::new(rng.gen_range(0..self.width), rng.gen_range(0..self.height));
            if self.tile(pos) == Tile::Floor {
                self.set(pos, kind.tile());
                return Ok(pos);
            }
        }
        Err(Error::NoPlacementFound)
    }

    fn set(&mut self, pos: Position, tile: Tile) {
        self.tiles[pos.y * self.width + pos.x] = tile;
    }

    fn weighted_pick<R: Rng>(&self, kind: Placement, rng: &mut R) -> Option<Position> {
        let mut candidates = Vec::new();
        let mut weights = Vec::new();
        for (i, &tile) in self.tiles.iter().enumerate() {
            if tile != Tile::Floor {
                continue;
            }
            let pos = Position::new(i % self.width, i / self.width);
            let weight = self.weight(kind, pos);
            if weight > 0.0 {
                candidates.push(pos);
                weights.push(weight);
            }
        }

        // Fails when there are no candidates
        let dist = WeightedIndex::new(&weights).ok()?;
        Some(candidates[dist.sample(rng)])
    }

    fn weight(&self, kind: Placement, pos: Position) -> f64 {
        let center = self.center_distance(pos);
        match kind {
            Placement::Player => 1.0 - 0.5 * center,
            Placement::Box => {
                if self.is_corner(pos) {
                    return 0.0;
                }
                let moderate = (1.0 - 1.5 * (center - 0.5).abs()).max(0.05);
                moderate / (1.0 + self.crowding(pos, Tile::is_box) as f64)
            }
            Placement::Goal => {
                let moderate = (1.0 - (center - 0.5).abs()).max(0.05);
                moderate / (1.0 + self.crowding(pos, Tile::is_goal) as f64)
            }
            Placement::Wall => {
                let mut weight = 1.0;
                if self.border_distance(pos) == 0 {
                    weight *= 1.5;
                }
                let inner_walls = self.crowding(pos, |t| t == Tile::Wall) as f64;
                weight /= 1.0 + 0.25 * inner_walls;
                if self.is_sole_link(pos) {
                    weight *= SOLE_LINK_FACTOR;
                }
                weight
            }
        }
    }

    /// Manhattan distance to the grid center, scaled to [0, 1].
    fn center_distance(&self, pos: Position) -> f64 {
        let cx = (self.width - 1) as f64 / 2.0;
        let cy = (self.height - 1) as f64 / 2.0;
        let d = (pos.x as f64 - cx).abs() + (pos.y as f64 - cy).abs();
        d / (cx + cy).max(1.0)
    }

    /// Steps from the inner edge of the wall ring.
    fn border_distance(&self, pos: Position) -> usize {
        (pos.x - 1)
            .min(pos.y - 1)
            .min(self.width - 2 - pos.x)
            .min(self.height - 2 - pos.y)
    }

    fn offset(&self, pos: Position, (dx, dy): (isize, isize)) -> Option<Position> {
        let x = pos.x.checked_add_signed(dx)?;
        let y = pos.y.checked_add_signed(dy)?;
        (x < self.width && y < self.height).then_some(Position::new(x, y))
    }

    fn is_wall_at(&self, pos: Position, delta: (isize, isize)) -> bool {
        self.offset(pos, delta).is_none_or(|p| self.tile(p) == Tile::Wall)
    }

    fn is_corner(&self, pos: Position) -> bool {
        (0..4).any(|i| {
            self.is_wall_at(pos, ORTHOGONAL[i]) && self.is_wall_at(pos, ORTHOGONAL[(i + 1) % 4])
        })
    }

    fn crowding(&self, pos: Position, pred: impl Fn(Tile) -> bool) -> usize {
        RING.iter()
            .filter_map(|&delta| self.offset(pos, delta))
            .filter(|&p| self.is_interior(p) && pred(self.tile(p)))
            .count()
    }

    fn is_interior(&self, pos: Position) -> bool {
        pos.x > 0 && pos.y > 0 && pos.x < self.width - 1 && pos.y < self.height - 1
    }

    /// True if walling `pos` would split the open cells around it into
    /// regions that no longer reach each other.
    fn is_sole_link(&self, pos: Position) -> bool {
        let ring: ArrayVec<bool, 8> = RING.iter().map(|&d| !self.is_wall_at(pos, d)).collect();
        let runs = (0..8).filter(|&i| ring[i] && !ring[(i + 7) % 8]).count();
        if runs <= 1 {
            return false;
        }

        let open: ArrayVec<Position, 4> = ORTHOGONAL
            .iter()
            .filter_map(|&d| self.offset(pos, d))
            .filter(|&p| self.tile(p) != Tile::Wall)
            .collect();
        if open.len() < 2 {
            return false;
        }

        let mut seen = vec![false; self.tiles.len()];
        seen[pos.y * self.width + pos.x] = true;
        seen[open[0].y * self.width + open[0].x] = true;
        let mut queue = VecDeque::from([open[0]]);
        while let Some(cur) = queue.pop_front() {
            for &delta in ORTHOGONAL.iter() {
                let Some(next) = self.offset(cur, delta) else {
                    continue;
                };
                let idx = next.y * self.width + next.x;
                if !seen[idx] && self.tile(next) != Tile::Wall {
                    seen[idx] = true;
                    queue.push_back(next);
                }
            }
        }

        open[1..].iter().any(|p| !seen[p.y * self.width + p.x])
    }
}
