use serde::Serialize;
use std::fmt;

use crate::error::{Error, Result};

pub const MAX_SIZE: usize = 64;

/// Role of a single grid cell. Exactly one per cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tile {
    Wall,
    Floor,
    Goal,
    Box,
    BoxOnGoal,
    Player,
    PlayerOnGoal,
}

impl Tile {
    pub fn is_box(self) -> bool {
        matches!(self, Tile::Box | Tile::BoxOnGoal)
    }

    pub fn is_player(self) -> bool {
        matches!(self, Tile::Player | Tile::PlayerOnGoal)
    }

    pub fn is_goal(self) -> bool {
        matches!(self, Tile::Goal | Tile::BoxOnGoal | Tile::PlayerOnGoal)
    }

    /// Free cell the player can step onto.
    pub fn is_walkable(self) -> bool {
        matches!(self, Tile::Floor | Tile::Goal)
    }

    /// Cell a box can never be pushed into.
    pub fn blocks_box(self) -> bool {
        matches!(self, Tile::Wall | Tile::Box | Tile::BoxOnGoal)
    }

    /// The tile left behind once a box or the player moves off this cell.
    pub fn vacated(self) -> Tile {
        if self.is_goal() { Tile::Goal } else { Tile::Floor }
    }

    pub fn with_box(self) -> Tile {
        if self.is_goal() { Tile::BoxOnGoal } else { Tile::Box }
    }

    pub fn with_player(self) -> Tile {
        if self.is_goal() {
            Tile::PlayerOnGoal
        } else {
            Tile::Player
        }
    }

    pub fn from_char(ch: char) -> Option<Tile> {
        match ch {
            '#' => Some(Tile::Wall),
            ' ' | '-' | '_' => Some(Tile::Floor),
            '.' => Some(Tile::Goal),
            '$' => Some(Tile::Box),
            '*' => Some(Tile::BoxOnGoal),
            '@' => Some(Tile::Player),
            '+' => Some(Tile::PlayerOnGoal),
            _ => None,
        }
    }

    pub fn to_char(self) -> char {
        match self {
            Tile::Wall => '#',
            Tile::Floor => ' ',
            Tile::Goal => '.',
            Tile::Box => '$',
            Tile::BoxOnGoal => '*',
            Tile::Player => '@',
            Tile::PlayerOnGoal => '+',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

pub const ALL_DIRECTIONS: [Direction; 4] = [
    Direction::Up,
    Direction::Down,
    Direction::Left,
    Direction::Right,
];

impl Direction {
    pub fn delta(self) -> (isize, isize) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }

    pub fn opposite(self) -> Direction {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }

    /// Single-letter form used for move strings (`u`, `d`, `l`, `r`).
    pub fn to_char(self) -> char {
        match self {
            Direction::Up => 'u',
            Direction::Down => 'd',
            Direction::Left => 'l',
            Direction::Right => 'r',
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => write!(f, "Up"),
            Direction::Down => write!(f, "Down"),
            Direction::Left => write!(f, "Left"),
            Direction::Right => write!(f, "Right"),
        }
    }
}

/// Grid coordinate: `x` is the column, `y` the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Position {
    pub x: usize,
    pub y: usize,
}

impl Position {
    pub fn new(x: usize, y: usize) -> Self {
        Position { x, y }
    }

    pub fn manhattan(self, other: Position) -> usize {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// One box push: the box standing at `box_pos` moves one cell in `direction`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Push {
    pub box_pos: Position,
    pub direction: Direction,
}

impl fmt::Display for Push {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.box_pos, self.direction)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// Wall ahead, or a box that cannot move
    Blocked,
    Walked,
    Pushed(Push),
}

/// One complete role assignment over a rectangular grid.
///
/// `player` always names the cell the player actually stands on. After
/// [`Board::flood_fill_reachable`] every cell the player could walk to is
/// also marked as a player tile; that marked region is what equality and
/// push validity are defined over.
#[derive(Debug, Clone)]
pub struct Board {
    width: usize,
    height: usize,
    tiles: Vec<Tile>,
    player: Position,
}

impl PartialEq for Board {
    fn eq(&self, other: &Self) -> bool {
        self.width == other.width && self.height == other.height && self.tiles == other.tiles
    }
}

impl Eq for Board {}

impl Board {
    /// Build a board from a row-major tile buffer holding exactly one player tile.
    pub fn from_tiles(width: usize, height: usize, tiles: Vec<Tile>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidLevel("Empty board".to_string()));
        }
        if width > MAX_SIZE || height > MAX_SIZE {
            return Err(Error::InvalidLevel(format!(
                "Board size {}x{} exceeds maximum size {}",
                width, height, MAX_SIZE
            )));
        }
        if tiles.len() != width * height {
            return Err(Error::InvalidLevel(format!(
                "Expected {} tiles for a {}x{} board, got {}",
                width * height,
                width,
                height,
                tiles.len()
            )));
        }

        let mut players = tiles.iter().enumerate().filter(|(_, t)| t.is_player());
        let (player_idx, _) = players
            .next()
            .ok_or_else(|| Error::InvalidLevel("No player found on board".to_string()))?;
        if players.next().is_some() {
            return Err(Error::InvalidLevel("Multiple players found".to_string()));
        }

        Ok(Board {
            width,
            height,
            tiles,
            player: Position::new(player_idx % width, player_idx / width),
        })
    }

    /// Parse a Sokoban board from text format.
    ///
    /// Characters:
    /// - `#` = Wall
    /// - ` ` = Floor (empty space)
    /// - `.` = Goal (target location for boxes)
    /// - `$` = Box
    /// - `@` = Player
    /// - `*` = Box on goal
    /// - `+` = Player on goal
    ///
    /// Short lines are padded with floor.
    pub fn from_text(text: &str) -> Result<Self> {
        let lines: Vec<&str> = text.lines().collect();

        if lines.is_empty() {
            return Err(Error::InvalidLevel("Empty board".to_string()));
        }

        let height = lines.len();
        let width = lines
            .iter()
            .map(|line| line.chars().count())
            .max()
            .unwrap_or(0);

        if width > MAX_SIZE {
            return Err(Error::InvalidLevel(format!(
                "Board width {} exceeds maximum size {}",
                width, MAX_SIZE
            )));
        }
        if height > MAX_SIZE {
            return Err(Error::InvalidLevel(format!(
                "Board height {} exceeds maximum size {}",
                height, MAX_SIZE
            )));
        }

        let mut tiles = vec![Tile::Floor; width * height];
        let mut box_count = 0;
        let mut goal_count = 0;

        for (y, line) in lines.iter().enumerate() {
            for (x, ch) in line.chars().enumerate() {
                let tile = Tile::from_char(ch).ok_or_else(|| {
                    Error::InvalidLevel(format!(
                        "Invalid character '{}' at position ({}, {})",
                        ch, x, y
                    ))
                })?;
                if tile.is_box() {
                    box_count += 1;
                }
                if tile.is_goal() {
                    goal_count += 1;
                }
                tiles[y * width + x] = tile;
            }
        }

        // Validate that the number of goals matches the number of boxes
        if goal_count != box_count {
            return Err(Error::InvalidLevel(format!(
                "Goal count ({}) does not match box count ({})",
                goal_count, box_count
            )));
        }

        Self::from_tiles(width, height, tiles)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn player(&self) -> Position {
        self.player
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn index(&self, pos: Position) -> usize {
        pos.y * self.width + pos.x
    }

    pub fn position(&self, index: usize) -> Position {
        Position::new(index % self.width, index / self.width)
    }

    pub fn tile(&self, pos: Position) -> Tile {
        self.tiles[self.index(pos)]
    }

    fn set_tile(&mut self, pos: Position, tile: Tile) {
        let idx = self.index(pos);
        self.tiles[idx] = tile;
    }

    /// Move from `pos` one cell in `dir`.
    /// Returns None if the new position falls outside the grid.
    pub fn neighbor(&self, pos: Position, dir: Direction) -> Option<Position> {
        let (dx, dy) = dir.delta();
        let x = pos.x.checked_add_signed(dx)?;
        let y = pos.y.checked_add_signed(dy)?;
        (x < self.width && y < self.height).then_some(Position::new(x, y))
    }

    /// Positions of all boxes in row-major order.
    pub fn box_positions(&self) -> Vec<Position> {
        self.positions_where(Tile::is_box)
    }

    /// Positions of all goals (covered or not) in row-major order.
    pub fn goal_positions(&self) -> Vec<Position> {
        self.positions_where(Tile::is_goal)
    }

    fn positions_where(&self, pred: impl Fn(Tile) -> bool) -> Vec<Position> {
        self.tiles
            .iter()
            .enumerate()
            .filter(|(_, t)| pred(**t))
            .map(|(i, _)| self.position(i))
            .collect()
    }

    pub fn box_count(&self) -> usize {
        self.tiles.iter().filter(|t| t.is_box()).count()
    }

    pub fn wall_count(&self) -> usize {
        self.tiles.iter().filter(|&&t| t == Tile::Wall).count()
    }

    /// First player-marked cell in row-major order. Identifies the reachable
    /// region of a flood-filled board.
    pub fn canonical_player_pos(&self) -> Position {
        self.tiles
            .iter()
            .position(|t| t.is_player())
            .map(|i| self.position(i))
            .unwrap_or(self.player)
    }

    /// Check if no box is left off a goal (win condition)
    pub fn is_win(&self) -> bool {
        !self.tiles.contains(&Tile::Box)
    }

    /// Drop flood-fill marks, keeping only the player's own cell.
    pub fn clear_reachable(&mut self) {
        let player_idx = self.index(self.player);
        for (i, tile) in self.tiles.iter_mut().enumerate() {
            if i == player_idx {
                *tile = tile.with_player();
            } else if tile.is_player() {
                *tile = tile.vacated();
            }
        }
    }

    /// Mark every floor or goal cell reachable from the player (without
    /// crossing walls or boxes) as a player tile. Idempotent.
    pub fn flood_fill_reachable(&mut self) {
        let mut stack: Vec<Position> = self
            .tiles
            .iter()
            .enumerate()
            .filter(|(_, t)| t.is_player())
            .map(|(i, _)| self.position(i))
            .collect();

        while let Some(pos) = stack.pop() {
            for dir in ALL_DIRECTIONS {
                if let Some(next) = self.neighbor(pos, dir) {
                    let tile = self.tile(next);
                    if tile.is_walkable() {
                        self.set_tile(next, tile.with_player());
                        stack.push(next);
                    }
                }
            }
        }
    }

    /// Step the player one cell, pushing a box if one is ahead and the cell
    /// beyond it is free.
    pub fn move_player(&mut self, dir: Direction) -> MoveOutcome {
        self.clear_reachable();

        let Some(next) = self.neighbor(self.player, dir) else {
            return MoveOutcome::Blocked;
        };

        let ahead = self.tile(next);
        if ahead == Tile::Wall {
            return MoveOutcome::Blocked;
        }

        let outcome = if ahead.is_box() {
            let Some(beyond) = self.neighbor(next, dir) else {
                return MoveOutcome::Blocked;
            };
            let beyond_tile = self.tile(beyond);
            if beyond_tile.blocks_box() {
                return MoveOutcome::Blocked;
            }
            self.set_tile(beyond, beyond_tile.with_box());
            self.set_tile(next, ahead.vacated());
            MoveOutcome::Pushed(Push {
                box_pos: next,
                direction: dir,
            })
        } else {
            MoveOutcome::Walked
        };

        let old = self.player;
        self.set_tile(old, self.tile(old).vacated());
        self.set_tile(next, self.tile(next).with_player());
        self.player = next;
        outcome
    }

    /// Non-mutating push used by the solver.
    ///
    /// Valid iff the cell behind the box (opposite to `dir`) is player-marked,
    /// `pos` holds a box and the destination is not a wall or another box.
    /// The returned board owns its own tiles and carries no flood-fill marks.
    pub fn push_box(&self, pos: Position, dir: Direction) -> Option<Board> {
        let pusher = self.neighbor(pos, dir.opposite())?;
        let dest = self.neighbor(pos, dir)?;

        if !self.tile(pusher).is_player()
            || !self.tile(pos).is_box()
            || self.tile(dest).blocks_box()
        {
            return None;
        }

        let mut next = self.clone();
        for tile in next.tiles.iter_mut() {
            if tile.is_player() {
                *tile = tile.vacated();
            }
        }
        next.set_tile(dest, next.tile(dest).with_box());
        next.set_tile(pos, next.tile(pos).vacated().with_player());
        next.player = pos;
        Some(next)
    }

    pub fn apply_push(&self, push: Push) -> Option<Board> {
        self.push_box(push.box_pos, push.direction)
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.tiles.chunks(self.width) {
            let line: String = row.iter().map(|t| t.to_char()).collect();
            // Trim trailing spaces to match original input format
            writeln!(f, "{}", line.trim_end())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_board() {
        let input = "####\n\
                     # .#\n\
                     #  ###\n\
                     #*@  #\n\
                     #  $ #\n\
                     #  ###\n\
                     ####";
        let board = Board::from_text(input).unwrap();

        assert_eq!(board.width(), 6);
        assert_eq!(board.height(), 7);
        assert_eq!(board.player(), Position::new(2, 3));
        assert_eq!(board.box_count(), 2);
        assert_eq!(board.goal_positions().len(), 2);
    }

    #[test]
    fn test_no_player() {
        assert!(Board::from_text("####\n#  #\n####").is_err());
    }

    #[test]
    fn test_multiple_players() {
        assert!(Board::from_text("####\n#@@#\n####").is_err());
    }

    #[test]
    fn test_goal_box_count_validation() {
        assert!(Board::from_text("####\n#..#\n# $@#\n####").is_err());
        assert!(Board::from_text("####\n#$$#\n# .@#\n####").is_err());
        assert!(Board::from_text("####\n#$.#\n# * #\n# @#\n####").is_ok());
    }

    #[test]
    fn test_player_on_goal() {
        let board = Board::from_text("#####\n#$+ #\n#$. #\n#####").unwrap();
        assert_eq!(board.player(), Position::new(2, 1));
        assert_eq!(board.tile(Position::new(2, 1)), Tile::PlayerOnGoal);
    }

    #[test]
    fn test_display_round_trip() {
        let input = "####\n# .#\n#  ###\n#*@  #\n#  $ #\n#  ###\n####";
        let board = Board::from_text(input).unwrap();
        assert_eq!(board.to_string().trim_end(), input);
    }

    #[test]
    fn test_is_win() {
        assert!(Board::from_text("####\n#*@#\n####").unwrap().is_win());
        assert!(!Board::from_text("####\n#$.#\n# @#\n####").unwrap().is_win());
    }

    #[test]
    fn test_move_into_wall_is_noop() {
        let mut board = Board::from_text("####\n#@ #\n####").unwrap();
        let before = board.clone();
        assert_eq!(board.move_player(Direction::Left), MoveOutcome::Blocked);
        assert_eq!(board, before);
        assert_eq!(board.player(), Position::new(1, 1));
    }

    #[test]
    fn test_move_walks_and_pushes() {
        let mut board = Board::from_text("######\n#@ $.#\n######").unwrap();
        assert_eq!(board.move_player(Direction::Right), MoveOutcome::Walked);
        assert_eq!(board.player(), Position::new(2, 1));

        let outcome = board.move_player(Direction::Right);
        assert_eq!(
            outcome,
            MoveOutcome::Pushed(Push {
                box_pos: Position::new(3, 1),
                direction: Direction::Right
            })
        );
        assert_eq!(board.tile(Position::new(4, 1)), Tile::BoxOnGoal);
        assert_eq!(board.tile(Position::new(3, 1)), Tile::Player);
        assert_eq!(board.tile(Position::new(2, 1)), Tile::Floor);
        assert!(board.is_win());
    }

    #[test]
    fn test_move_off_goal_restores_goal() {
        let mut board = Board::from_text("######\n#+$  #\n######").unwrap();
        board.move_player(Direction::Right);
        assert_eq!(board.tile(Position::new(1, 1)), Tile::Goal);
        assert_eq!(board.tile(Position::new(2, 1)), Tile::Player);
        assert_eq!(board.tile(Position::new(3, 1)), Tile::Box);
    }

    #[test]
    fn test_move_push_blocked() {
        let mut board = Board::from_text("#######\n#@$$..#\n#######").unwrap();
        let before = board.clone();
        assert_eq!(board.move_player(Direction::Right), MoveOutcome::Blocked);
        assert_eq!(board, before);

        let mut board = Board::from_text("#####\n#@$##\n# . #\n#####").unwrap();
        assert_eq!(board.move_player(Direction::Right), MoveOutcome::Blocked);
    }

    #[test]
    fn test_flood_fill_marks_region() {
        let mut board = Board::from_text("######\n#@ $ #\n# ####\n#.   #\n######").unwrap();
        board.flood_fill_reachable();
        assert_eq!(board.tile(Position::new(2, 1)), Tile::Player);
        assert_eq!(board.tile(Position::new(1, 3)), Tile::PlayerOnGoal);
        assert_eq!(board.tile(Position::new(4, 3)), Tile::Player);
        // Behind the box is not reachable
        assert_eq!(board.tile(Position::new(4, 1)), Tile::Floor);
        assert_eq!(board.player(), Position::new(1, 1));
    }

    #[test]
    fn test_flood_fill_idempotent() {
        let mut board = Board::from_text("#######\n#@ $ .#\n# #  ##\n#######").unwrap();
        board.flood_fill_reachable();
        let once = board.clone();
        board.flood_fill_reachable();
        assert_eq!(board, once);
    }

    #[test]
    fn test_clone_is_independent() {
        let board = Board::from_text("######\n#@$ .#\n######").unwrap();
        let mut copy = board.clone();
        assert_eq!(copy, board);
        copy.move_player(Direction::Right);
        assert_ne!(copy, board);
        assert_eq!(board.tile(Position::new(2, 1)), Tile::Box);
    }

    #[test]
    fn test_push_box_requires_reachable_pusher() {
        let mut board = Board::from_text("#######\n#@ $ .#\n#######").unwrap();
        let box_pos = Position::new(3, 1);

        // Before flood fill the pusher cell (2, 1) is plain floor
        assert!(board.push_box(box_pos, Direction::Right).is_none());

        board.flood_fill_reachable();
        let pushed = board.push_box(box_pos, Direction::Right).unwrap();
        assert_eq!(pushed.tile(Position::new(4, 1)), Tile::Box);
        assert_eq!(pushed.tile(Position::new(3, 1)), Tile::Player);
        assert_eq!(pushed.tile(Position::new(1, 1)), Tile::Floor);
        assert_eq!(pushed.player(), box_pos);

        // Pusher would have to stand at (4, 1), which lies behind the box
        assert!(board.push_box(box_pos, Direction::Left).is_none());
        // No box at the source cell
        assert!(board.push_box(Position::new(2, 1), Direction::Right).is_none());
    }

    #[test]
    fn test_push_box_blocked_destination() {
        let mut board = Board::from_text("#######\n#@$$..#\n#######").unwrap();
        board.flood_fill_reachable();
        assert!(board.push_box(Position::new(2, 1), Direction::Right).is_none());

        let mut board = Board::from_text("#####\n#@$##\n#  .#\n#####").unwrap();
        board.flood_fill_reachable();
        assert!(board.push_box(Position::new(2, 1), Direction::Right).is_none());
        assert!(board.push_box(Position::new(2, 1), Direction::Down).is_none());
    }

    #[test]
    fn test_push_box_does_not_alias_parent() {
        let mut board = Board::from_text("######\n#@$ .#\n######").unwrap();
        board.flood_fill_reachable();
        let before = board.clone();
        let _ = board.push_box(Position::new(2, 1), Direction::Right).unwrap();
        assert_eq!(board, before);
    }

    #[test]
    fn test_box_count_conserved_under_pushes() {
        let mut board = Board::from_text("#######\n#     #\n# $$  #\n# @.. #\n#######").unwrap();
        let count = board.box_count();
        let moves = [
            Direction::Up,
            Direction::Up,
            Direction::Right,
            Direction::Down,
            Direction::Left,
            Direction::Down,
            Direction::Right,
            Direction::Right,
        ];
        for dir in moves {
            board.move_player(dir);
            assert_eq!(board.box_count(), count);
        }
    }

    #[test]
    fn test_neighbor_bounds() {
        let board = Board::from_text("###\n#@#\n###").unwrap();
        assert_eq!(board.neighbor(Position::new(0, 0), Direction::Up), None);
        assert_eq!(board.neighbor(Position::new(2, 1), Direction::Right), None);
        assert_eq!(
            board.neighbor(Position::new(1, 1), Direction::Down),
            Some(Position::new(1, 2))
        );
    }
}
