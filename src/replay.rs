use std::collections::VecDeque;

use crate::board::{ALL_DIRECTIONS, Board, Direction, MoveOutcome, Position, Push};

/// One player move in a full walk-and-push replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub direction: Direction,
    pub is_push: bool,
}

/// Expand a push trace into the individual player moves that perform it.
///
/// Between pushes the shortest walk to the pushing cell is used. Returns
/// None if some push cannot be reached or performed.
pub fn expand_moves(initial: &Board, pushes: &[Push]) -> Option<Vec<Step>> {
    let mut board = initial.clone();
    board.clear_reachable();
    let mut steps = Vec::new();

    for push in pushes {
        let pusher = board.neighbor(push.box_pos, push.direction.opposite())?;
        for direction in walk_path(&board, pusher)? {
            if board.move_player(direction) != MoveOutcome::Walked {
                return None;
            }
            steps.push(Step {
                direction,
                is_push: false,
            });
        }

        match board.move_player(push.direction) {
            MoveOutcome::Pushed(done) if done == *push => steps.push(Step {
                direction: push.direction,
                is_push: true,
            }),
            _ => return None,
        }
    }

    Some(steps)
}

/// LURD notation of a push trace: lowercase walks, uppercase pushes.
pub fn lurd(initial: &Board, pushes: &[Push]) -> Option<String> {
    let steps = expand_moves(initial, pushes)?;
    Some(
        steps
            .iter()
            .map(|s| {
                let c = s.direction.to_char();
                if s.is_push { c.to_ascii_uppercase() } else { c }
            })
            .collect(),
    )
}

/// Shortest walk from the player to `target` over free cells.
fn walk_path(board: &Board, target: Position) -> Option<Vec<Direction>> {
    let start = board.player();
    if start == target {
        return Some(Vec::new());
    }

    let mut came_from: Vec<Option<(usize, Direction)>> = vec![None; board.tiles().len()];
    let mut seen = vec![false; board.tiles().len()];
    let mut queue = VecDeque::new();
    seen[board.index(start)] = true;
    queue.push_back(start);

    while let Some(pos) = queue.pop_front() {
        for dir in ALL_DIRECTIONS {
            let Some(next) = board.neighbor(pos, dir) else {
                continue;
            };
            let idx = board.index(next);
            if seen[idx] || !board.tile(next).is_walkable() {
                continue;
            }
            seen[idx] = true;
            came_from[idx] = Some((board.index(pos), dir));
            if next == target {
                return Some(unwind(board, &came_from, idx));
            }
            queue.push_back(next);
        }
    }

    None
}

fn unwind(board: &Board, came_from: &[Option<(usize, Direction)>], mut idx: usize) -> Vec<Direction> {
    let start = board.index(board.player());
    let mut path = Vec::new();
    while idx != start {
        match came_from[idx] {
            Some((prev, dir)) => {
                path.push(dir);
                idx = prev;
            }
            None => break,
        }
    }
    path.reverse();
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_single_push() {
        let board = Board::from_text("#####\n#@$.#\n#####").unwrap();
        let push = Push {
            box_pos: Position::new(2, 1),
            direction: Direction::Right,
        };
        let steps = expand_moves(&board, &[push]).unwrap();
        assert_eq!(
            steps,
            vec![Step {
                direction: Direction::Right,
                is_push: true
            }]
        );
    }

    #[test]
    fn test_expand_walks_around_box() {
        // Player has to walk around to the right of the box to push it left
        let board = Board::from_text("######\n#.$@ #\n#    #\n######").unwrap();
        let push = Push {
            box_pos: Position::new(2, 1),
            direction: Direction::Left,
        };
        let steps = expand_moves(&board, &[push]).unwrap();
        assert_eq!(steps.len(), 1);
        assert!(steps[0].is_push);

        let board = Board::from_text("######\n#@$ .#\n#    #\n######").unwrap();
        let pushes = [
            Push {
                box_pos: Position::new(2, 1),
                direction: Direction::Right,
            },
            Push {
                box_pos: Position::new(3, 1),
                direction: Direction::Right,
            },
        ];
        let steps = expand_moves(&board, &pushes).unwrap();
        assert_eq!(steps.len(), 2);
        assert!(steps.iter().all(|s| s.is_push));
    }

    #[test]
    fn test_expand_counts_walking() {
        let board = Board::from_text("######\n#  $.#\n#@   #\n######").unwrap();
        let push = Push {
            box_pos: Position::new(3, 1),
            direction: Direction::Right,
        };
        let steps = expand_moves(&board, &[push]).unwrap();
        // Up and right to (2, 1), then the push
        assert_eq!(steps.len(), 3);
        assert_eq!(steps.iter().filter(|s| s.is_push).count(), 1);
    }

    #[test]
    fn test_expand_rejects_unreachable_push() {
        let board = Board::from_text("#####\n#@$.#\n#####").unwrap();
        let push = Push {
            box_pos: Position::new(2, 1),
            direction: Direction::Left,
        };
        assert!(expand_moves(&board, &[push]).is_none());
    }

    #[test]
    fn test_lurd_marks_pushes_uppercase() {
        let board = Board::from_text("######\n#  $.#\n#@   #\n######").unwrap();
        let push = Push {
            box_pos: Position::new(3, 1),
            direction: Direction::Right,
        };
        assert_eq!(lurd(&board, &[push]).unwrap(), "urR");
    }
}
