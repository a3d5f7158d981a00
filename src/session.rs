use std::collections::VecDeque;

use crate::board::{Board, Direction, MoveOutcome};
use crate::level::Level;

const MAX_HISTORY: usize = 100;

/// Interactive play on one level: moves, undo and reset.
#[derive(Debug, Clone)]
pub struct PlaySession {
    initial: Board,
    current: Board,
    history: VecDeque<(Board, usize, usize)>,
    moves: usize,
    pushes: usize,
}

impl PlaySession {
    pub fn new(board: &Board) -> Self {
        let mut initial = board.clone();
        initial.clear_reachable();
        PlaySession {
            current: initial.clone(),
            initial,
            history: VecDeque::new(),
            moves: 0,
            pushes: 0,
        }
    }

    /// Try to step the player. Blocked moves change nothing and are not
    /// recorded.
    pub fn move_player(&mut self, dir: Direction) -> MoveOutcome {
        let before = self.current.clone();
        let outcome = self.current.move_player(dir);
        if outcome == MoveOutcome::Blocked {
            return outcome;
        }

        if self.history.len() == MAX_HISTORY {
            self.history.pop_front();
        }
        self.history.push_back((before, self.moves, self.pushes));
        self.moves += 1;
        if let MoveOutcome::Pushed(_) = outcome {
            self.pushes += 1;
        }
        outcome
    }

    /// Step back one move. Returns false when there is nothing to undo.
    pub fn undo(&mut self) -> bool {
        match self.history.pop_back() {
            Some((board, moves, pushes)) => {
                self.current = board;
                self.moves = moves;
                self.pushes = pushes;
                true
            }
            None => false,
        }
    }

    pub fn reset(&mut self) {
        self.current = self.initial.clone();
        self.history.clear();
        self.moves = 0;
        self.pushes = 0;
    }

    pub fn is_solved(&self) -> bool {
        self.current.is_win()
    }

    pub fn board(&self) -> &Board {
        &self.current
    }

    pub fn level(&self) -> Level {
        Level::from_board(&self.current)
    }

    pub fn moves(&self) -> usize {
        self.moves
    }

    pub fn pushes(&self) -> usize {
        self.pushes
    }

    pub fn can_undo(&self) -> bool {
        !self.history.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(text: &str) -> PlaySession {
        PlaySession::new(&Board::from_text(text).unwrap())
    }

    #[test]
    fn test_move_and_solve() {
        let mut session = session("######\n#@$ .#\n######");
        assert!(matches!(session.move_player(Direction::Right), MoveOutcome::Pushed(_)));
        assert!(!session.is_solved());
        session.move_player(Direction::Right);
        assert!(session.is_solved());
        assert_eq!(session.moves(), 2);
        assert_eq!(session.pushes(), 2);
    }

    #[test]
    fn test_blocked_move_is_not_recorded() {
        let mut session = session("#####\n#@$.#\n#####");
        assert_eq!(session.move_player(Direction::Up), MoveOutcome::Blocked);
        assert_eq!(session.moves(), 0);
        assert!(!session.can_undo());
    }

    #[test]
    fn test_undo_restores_counts() {
        let mut session = session("#######\n#@ $ .#\n#######");
        let start = session.board().clone();
        session.move_player(Direction::Right);
        session.move_player(Direction::Right);
        assert_eq!((session.moves(), session.pushes()), (2, 1));

        assert!(session.undo());
        assert_eq!((session.moves(), session.pushes()), (1, 0));
        assert!(session.undo());
        assert_eq!(session.board(), &start);
        assert!(!session.undo());
    }

    #[test]
    fn test_history_is_bounded() {
        let mut session = session("#####\n#@  #\n#$. #\n#####");
        for i in 0..(MAX_HISTORY + 20) {
            let dir = if i % 2 == 0 { Direction::Right } else { Direction::Left };
            session.move_player(dir);
        }
        let mut undone = 0;
        while session.undo() {
            undone += 1;
        }
        assert_eq!(undone, MAX_HISTORY);
    }

    #[test]
    fn test_reset() {
        let mut session = session("######\n#@$ .#\n######");
        let start = session.level();
        session.move_player(Direction::Right);
        session.reset();
        assert_eq!(session.level(), start);
        assert_eq!(session.moves(), 0);
        assert!(!session.can_undo());
    }
}
