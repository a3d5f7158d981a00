use log::debug;
use rand::Rng;
use rand::seq::SliceRandom;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

use crate::board::{ALL_DIRECTIONS, Board, Direction, MAX_SIZE, Position, Push, Tile};
use crate::error::{Error, Result};

/// Smallest grid every template can be laid out on.
pub const MIN_WIDTH: usize = 5;
pub const MIN_HEIGHT: usize = 3;

/// Structural layouts, from most to least involved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Template {
    Corridor,
    Rooms,
    Linear,
    Minimal,
}

impl Template {
    pub const ALL: [Template; 4] = [
        Template::Corridor,
        Template::Rooms,
        Template::Linear,
        Template::Minimal,
    ];

    pub fn complexity(self) -> f64 {
        match self {
            Template::Corridor => 0.8,
            Template::Rooms => 0.6,
            Template::Linear => 0.4,
            Template::Minimal => 0.2,
        }
    }

    /// How many boxes the template tries to fit on a grid.
    pub fn box_target(self, width: usize, height: usize) -> usize {
        let span = width + height;
        match self {
            Template::Corridor => (span / 6).max(2),
            Template::Rooms => (span / 8).max(2),
            Template::Linear => (span / 10).max(1),
            Template::Minimal => 1,
        }
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Template::Corridor => write!(f, "corridor"),
            Template::Rooms => write!(f, "rooms"),
            Template::Linear => write!(f, "linear"),
            Template::Minimal => write!(f, "minimal"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FallbackLevel {
    pub board: Board,
    /// Exact: one planned push per box, and every box starts off its goal
    pub min_steps: usize,
    pub pushes: Vec<Push>,
    pub wall_count: usize,
    pub template: Template,
    pub complexity: f64,
}

/// Template-based generator that never runs a search.
///
/// Each box is laid out on a straight lane of three free cells (pusher,
/// box, goal), and a lane is only kept if replaying every planned push in
/// order still wins. That replay is the whole correctness argument.
#[derive(Debug, Clone)]
pub struct FallbackGenerator {
    width: usize,
    height: usize,
    min_wall_ratio: f64,
    max_wall_ratio: f64,
}

impl FallbackGenerator {
    pub fn new(width: usize, height: usize, min_wall_ratio: f64, max_wall_ratio: f64) -> Result<Self> {
        if width < MIN_WIDTH || height < MIN_HEIGHT {
            return Err(Error::InvalidConfiguration(format!(
                "Grid {}x{} is smaller than the minimum {}x{}",
                width, height, MIN_WIDTH, MIN_HEIGHT
            )));
        }
        if width > MAX_SIZE || height > MAX_SIZE {
            return Err(Error::InvalidConfiguration(format!(
                "Grid {}x{} exceeds maximum size {}",
                width, height, MAX_SIZE
            )));
        }
        Ok(FallbackGenerator {
            width,
            height,
            min_wall_ratio,
            max_wall_ratio,
        })
    }

    /// Template nearest to `complexity`, capped lower as time runs out.
    pub fn select_template(&self, complexity: f64, time_remaining: Duration) -> Template {
        let cap = if time_remaining < Duration::from_millis(500) {
            0.3
        } else if time_remaining < Duration::from_millis(1500) {
            0.5
        } else {
            1.0
        };
        let target = complexity.min(cap);

        let mut best = Template::Minimal;
        let mut best_diff = f64::INFINITY;
        for template in Template::ALL {
            let diff = (template.complexity() - target).abs();
            if diff < best_diff {
                best_diff = diff;
                best = template;
            }
        }
        best
    }

    pub fn generate<R: Rng>(
        &self,
        complexity: f64,
        time_remaining: Duration,
        rng: &mut R,
    ) -> Result<FallbackLevel> {
        let template = self.select_template(complexity, time_remaining);
        self.generate_template(template, rng)
    }

    pub fn generate_template<R: Rng>(&self, template: Template, rng: &mut R) -> Result<FallbackLevel> {
        let mut canvas = match template {
            Template::Corridor => self.corridor(rng),
            Template::Rooms => self.rooms(rng),
            Template::Linear => self.linear(rng),
            Template::Minimal => Canvas::open(self.width, self.height),
        };

        let plan = if template == Template::Minimal {
            canvas.minimal_lane()
        } else {
            let floor = canvas.cells_where(|t| t == Tile::Floor);
            let Some(&player) = floor.choose(rng) else {
                return self.generate_template(Template::Minimal, rng);
            };
            canvas.set(player, Tile::Player);
            canvas.place_lanes(template.box_target(self.width, self.height), rng)
        };

        if plan.is_empty() {
            debug!("{} template fit no lanes, using minimal", template);
            return self.generate_template(Template::Minimal, rng);
        }

        self.adjust_walls(&mut canvas, &plan, rng);

        let board = Board::from_tiles(self.width, self.height, canvas.tiles)?;
        debug!(
            "fallback {} level with {} boxes, {} walls",
            template,
            plan.len(),
            board.wall_count()
        );
        Ok(FallbackLevel {
            wall_count: board.wall_count(),
            min_steps: plan.len(),
            board,
            pushes: plan,
            template,
            complexity: template.complexity(),
        })
    }

    /// One or two full-width rows with a vertical run off them; the run
    /// spans the grid (L) or stops at the rows (T).
    fn corridor<R: Rng>(&self, rng: &mut R) -> Canvas {
        let mut canvas = Canvas::walled(self.width, self.height);
        let mid_x = self.width / 2;
        let mid_y = self.height / 2;

        for x in 1..self.width - 1 {
            canvas.carve(Position::new(x, mid_y));
            if mid_y >= 2 {
                canvas.carve(Position::new(x, mid_y - 1));
            }
        }

        let (top, bottom) = if rng.gen_bool(0.5) {
            (1, self.height - 2)
        } else {
            ((self.height / 3).max(1), mid_y)
        };
        for y in top..=bottom {
            canvas.carve(Position::new(mid_x, y));
        }
        canvas
    }

    /// Two or three rectangular rooms chained by L-shaped connectors.
    fn rooms<R: Rng>(&self, rng: &mut R) -> Canvas {
        let mut canvas = Canvas::walled(self.width, self.height);
        let count = (self.width * self.height / 20).clamp(2, 3);
        let max_size = (self.width - 2).min(self.height - 2).min(5);
        let min_size = max_size.min(3);

        let mut centers = Vec::with_capacity(count);
        for _ in 0..count {
            let w = rng.gen_range(min_size..=max_size);
            let h = rng.gen_range(min_size..=max_size);
            let x0 = rng.gen_range(1..=self.width - 1 - w);
            let y0 = rng.gen_range(1..=self.height - 1 - h);
            for y in y0..y0 + h {
                for x in x0..x0 + w {
                    canvas.carve(Position::new(x, y));
                }
            }
            centers.push(Position::new(x0 + w / 2, y0 + h / 2));
        }

        for pair in centers.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            for x in a.x.min(b.x)..=a.x.max(b.x) {
                canvas.carve(Position::new(x, a.y));
            }
            for y in a.y.min(b.y)..=a.y.max(b.y) {
                canvas.carve(Position::new(b.x, y));
            }
        }
        canvas
    }

    /// A path across the grid that drifts up or down one row at a time.
    fn linear<R: Rng>(&self, rng: &mut R) -> Canvas {
        let mut canvas = Canvas::walled(self.width, self.height);
        let mut y = self.height / 2;

        for x in 1..self.width - 1 {
            canvas.carve(Position::new(x, y));
            if x > 2 && rng.gen_bool(0.3) {
                let next = if rng.gen_bool(0.5) { y - 1 } else { y + 1 };
                if next >= 1 && next < self.height - 1 {
                    y = next;
                    canvas.carve(Position::new(x, y));
                }
            }
        }
        canvas
    }

    /// Steer the interior wall ratio into the configured band. Opening walls
    /// only adds walkable space, so only new walls are checked against the
    /// plan.
    fn adjust_walls<R: Rng>(&self, canvas: &mut Canvas, plan: &[Push], rng: &mut R) {
        let interior = canvas.interior_cells() as f64;
        let mut walls = canvas.inner_walls();

        while walls as f64 / interior > self.max_wall_ratio {
            let mut candidates = canvas.open_wall_candidates();
            if candidates.is_empty() {
                break;
            }
            candidates.shuffle(rng);
            for pos in candidates {
                if walls as f64 / interior <= self.max_wall_ratio {
                    break;
                }
                canvas.set(pos, Tile::Floor);
                walls -= 1;
            }
        }

        if (walls as f64 / interior) < self.min_wall_ratio {
            let mut floor = canvas.cells_where(|t| t == Tile::Floor);
            floor.shuffle(rng);
            for pos in floor {
                if walls as f64 / interior >= self.min_wall_ratio {
                    break;
                }
                canvas.set(pos, Tile::Wall);
                if canvas.plan_holds(plan) {
                    walls += 1;
                } else {
                    canvas.set(pos, Tile::Floor);
                }
            }
        }
    }
}

/// Raw tile grid a template is drawn on.
struct Canvas {
    width: usize,
    height: usize,
    tiles: Vec<Tile>,
}

impl Canvas {
    fn walled(width: usize, height: usize) -> Self {
        Canvas {
            width,
            height,
            tiles: vec![Tile::Wall; width * height],
        }
    }

    fn open(width: usize, height: usize) -> Self {
        let mut canvas = Self::walled(width, height);
        for y in 1..height - 1 {
            for x in 1..width - 1 {
                canvas.carve(Position::new(x, y));
            }
        }
        canvas
    }

    fn get(&self, pos: Position) -> Tile {
        self.tiles[pos.y * self.width + pos.x]
    }

    fn set(&mut self, pos: Position, tile: Tile) {
        self.tiles[pos.y * self.width + pos.x] = tile;
    }

    fn is_interior(&self, pos: Position) -> bool {
        pos.x > 0 && pos.y > 0 && pos.x < self.width - 1 && pos.y < self.height - 1
    }

    fn carve(&mut self, pos: Position) {
        if self.is_interior(pos) {
            self.set(pos, Tile::Floor);
        }
    }

    fn step(&self, pos: Position, dir: Direction) -> Option<Position> {
        let (dx, dy) = dir.delta();
        let x = pos.x.checked_add_signed(dx)?;
        let y = pos.y.checked_add_signed(dy)?;
        (x < self.width && y < self.height).then_some(Position::new(x, y))
    }

    fn interior_cells(&self) -> usize {
        (self.width - 2) * (self.height - 2)
    }

    fn inner_walls(&self) -> usize {
        self.cells_where(|t| t == Tile::Wall)
            .into_iter()
            .filter(|&p| self.is_interior(p))
            .count()
    }

    fn cells_where(&self, pred: impl Fn(Tile) -> bool) -> Vec<Position> {
        (0..self.tiles.len())
            .map(|i| Position::new(i % self.width, i / self.width))
            .filter(|&p| pred(self.get(p)))
            .collect()
    }

    /// Interior walls touching open space.
    fn open_wall_candidates(&self) -> Vec<Position> {
        self.cells_where(|t| t == Tile::Wall)
            .into_iter()
            .filter(|&p| self.is_interior(p))
            .filter(|&p| {
                ALL_DIRECTIONS
                    .iter()
                    .any(|&d| self.step(p, d).is_some_and(|n| self.get(n) != Tile::Wall))
            })
            .collect()
    }

    /// Player, box and goal side by side on the center row.
    fn minimal_lane(&mut self) -> Vec<Push> {
        let cx = self.width / 2;
        let cy = self.height / 2;
        self.set(Position::new(cx - 1, cy), Tile::Player);
        self.set(Position::new(cx, cy), Tile::Box);
        self.set(Position::new(cx + 1, cy), Tile::Goal);
        vec![Push {
            box_pos: Position::new(cx, cy),
            direction: Direction::Right,
        }]
    }

    /// Lay out up to `count` lanes on free floor, keeping only those that
    /// leave the whole plan replayable.
    fn place_lanes<R: Rng>(&mut self, count: usize, rng: &mut R) -> Vec<Push> {
        let mut lanes = Vec::new();
        for pos in self.cells_where(|t| t == Tile::Floor) {
            for dir in ALL_DIRECTIONS {
                lanes.push((pos, dir));
            }
        }
        lanes.shuffle(rng);

        let mut plan = Vec::with_capacity(count);
        for (box_pos, direction) in lanes {
            if plan.len() >= count {
                break;
            }
            let (Some(pusher), Some(goal)) = (
                self.step(box_pos, direction.opposite()),
                self.step(box_pos, direction),
            ) else {
                continue;
            };
            let pusher_free = matches!(self.get(pusher), Tile::Floor | Tile::Player);
            if self.get(box_pos) != Tile::Floor || self.get(goal) != Tile::Floor || !pusher_free {
                continue;
            }

            self.set(box_pos, Tile::Box);
            self.set(goal, Tile::Goal);
            plan.push(Push { box_pos, direction });
            if !self.plan_holds(&plan) {
                plan.pop();
                self.set(box_pos, Tile::Floor);
                self.set(goal, Tile::Floor);
            }
        }
        plan
    }

    /// Replay the planned pushes in order and check they win.
    fn plan_holds(&self, plan: &[Push]) -> bool {
        let Ok(mut board) = Board::from_tiles(self.width, self.height, self.tiles.clone()) else {
            return false;
        };
        for push in plan {
            board.flood_fill_reachable();
            match board.apply_push(*push) {
                Some(next) => board = next,
                None => return false,
            }
        }
        board.is_win()
    }
}
