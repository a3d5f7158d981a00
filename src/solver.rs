use log::{debug, trace};
use std::collections::VecDeque;

use crate::board::{ALL_DIRECTIONS, Board, Push};
use crate::error::{Error, Result};
use crate::heuristic::Heuristic;
use crate::registry::{NodeId, Registry};

/// Ceilings bounding a single solver run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolverLimits {
    /// Frontier nodes popped before giving up
    pub max_iterations: usize,
    /// Registered configurations before giving up
    pub max_nodes: usize,
    /// Nodes expanded per call to [`Solver::step`]
    pub batch_size: usize,
    /// Iterations between frontier re-sorts
    pub resort_interval: usize,
    /// Nodes deeper than this are skipped
    pub max_depth: usize,
}

impl Default for SolverLimits {
    fn default() -> Self {
        SolverLimits {
            max_iterations: 10_000,
            max_nodes: 25_000,
            batch_size: 50,
            resort_interval: 100,
            max_depth: 80,
        }
    }
}

/// Ordered push trace from the initial board to a solved board.
///
/// `states[0]` is the initial board and `states[i + 1]` is the result of
/// `pushes[i]`. Walking between pushes is not represented.
#[derive(Debug, Clone)]
pub struct Solution {
    states: Vec<Board>,
    pushes: Vec<Push>,
}

impl Solution {
    /// Rebuild a trace by replaying `pushes` from `initial`.
    pub fn from_pushes(initial: &Board, pushes: &[Push]) -> Option<Solution> {
        let mut state = initial.clone();
        state.clear_reachable();
        let mut states = vec![state.clone()];
        for push in pushes {
            state.flood_fill_reachable();
            state = state.apply_push(*push)?;
            states.push(state.clone());
        }
        Some(Solution {
            states,
            pushes: pushes.to_vec(),
        })
    }

    pub fn states(&self) -> &[Board] {
        &self.states
    }

    pub fn pushes(&self) -> &[Push] {
        &self.pushes
    }

    pub fn min_steps(&self) -> usize {
        self.pushes.len()
    }

    pub fn initial(&self) -> &Board {
        &self.states[0]
    }
}

#[derive(Debug, Clone)]
pub enum SolveResult {
    Solved(Solution),
    /// The frontier emptied without a win
    Impossible,
    /// A ceiling was hit first; solvability is unknown
    Cutoff,
}

impl SolveResult {
    pub fn into_result(self) -> Result<Solution> {
        match self {
            SolveResult::Solved(solution) => Ok(solution),
            SolveResult::Impossible => Err(Error::SolverUnsolvable),
            SolveResult::Cutoff => Err(Error::SolverBudgetExceeded),
        }
    }
}

/// Outcome of one batch of search.
#[derive(Debug, Clone)]
pub enum SolveStep {
    Pending,
    Done(SolveResult),
}

enum Expansion {
    Open,
    Full,
    Won(NodeId),
}

/// Best-first push search over flood-filled configurations.
///
/// Successors of a configuration are exactly its valid box pushes; walking
/// is compressed away because push validity only depends on the reachable
/// region. The frontier is FIFO between periodic re-sorts by
/// `estimate + depth`.
pub struct Solver<H: Heuristic> {
    registry: Registry,
    frontier: VecDeque<NodeId>,
    estimates: Vec<usize>,
    heuristic: H,
    limits: SolverLimits,
    iterations: usize,
    next_resort: usize,
    done: Option<SolveResult>,
}

impl<H: Heuristic> Solver<H> {
    pub fn new(board: &Board, heuristic: H, limits: SolverLimits) -> Self {
        let mut root = board.clone();
        root.flood_fill_reachable();
        let root_won = root.is_win();
        let estimate = heuristic.estimate(&root);

        let mut solver = Solver {
            registry: Registry::new(),
            frontier: VecDeque::new(),
            estimates: Vec::new(),
            heuristic,
            limits,
            iterations: 0,
            next_resort: 0,
            done: None,
        };

        match solver.register(root, 0, None, None, estimate) {
            Some(root_id) if root_won => {
                solver.done = Some(SolveResult::Solved(solver.solution(root_id)));
            }
            Some(root_id) => solver.frontier.push_back(root_id),
            None => solver.done = Some(SolveResult::Cutoff),
        }
        solver
    }

    /// Run the search to completion.
    pub fn run(&mut self) -> SolveResult {
        loop {
            if let SolveStep::Done(result) = self.step() {
                return result;
            }
        }
    }

    /// Expand one batch of frontier nodes.
    pub fn step(&mut self) -> SolveStep {
        if let Some(result) = &self.done {
            return SolveStep::Done(result.clone());
        }

        match self.explore_batch() {
            Some(result) => {
                self.done = Some(result.clone());
                SolveStep::Done(result)
            }
            None => SolveStep::Pending,
        }
    }

    /// Frontier nodes popped so far
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Configurations registered so far
    pub fn nodes_registered(&self) -> usize {
        self.registry.len()
    }

    fn iteration_ceiling(&self) -> Option<SolveResult> {
        if self.iterations < self.limits.max_iterations {
            return None;
        }
        debug!(
            "solver hit iteration ceiling {} ({} nodes)",
            self.limits.max_iterations,
            self.registry.len()
        );
        Some(SolveResult::Cutoff)
    }

    fn node_ceiling(&self) -> SolveResult {
        debug!(
            "solver hit node ceiling {} after {} iterations",
            self.limits.max_nodes, self.iterations
        );
        SolveResult::Cutoff
    }

    fn is_full(&self) -> bool {
        self.registry.len() >= self.limits.max_nodes
    }

    fn explore_batch(&mut self) -> Option<SolveResult> {
        if let Some(cutoff) = self.iteration_ceiling() {
            return Some(cutoff);
        }
        if self.frontier.is_empty() {
            debug!(
                "solver exhausted frontier after {} iterations ({} nodes)",
                self.iterations,
                self.registry.len()
            );
            return Some(SolveResult::Impossible);
        }

        if self.iterations >= self.next_resort {
            self.sort_frontier();
            self.next_resort = self.iterations + self.limits.resort_interval.max(1);
        }

        let batch = self.limits.batch_size.max(1).min(self.frontier.len());
        for _ in 0..batch {
            if let Some(cutoff) = self.iteration_ceiling() {
                return Some(cutoff);
            }
            let Some(id) = self.frontier.pop_front() else {
                break;
            };
            self.iterations += 1;
            if self.iterations % 1000 == 0 {
                trace!(
                    "solver at {} iterations, frontier {}, nodes {}",
                    self.iterations,
                    self.frontier.len(),
                    self.registry.len()
                );
            }

            let depth = self.registry.node(id).depth;
            if depth > self.limits.max_depth {
                continue;
            }

            match self.expand(id, depth) {
                Expansion::Open => {}
                Expansion::Full => return Some(self.node_ceiling()),
                Expansion::Won(win_id) => {
                    let solution = self.solution(win_id);
                    debug!(
                        "solver found {} pushes after {} iterations ({} nodes)",
                        solution.min_steps(),
                        self.iterations,
                        self.registry.len()
                    );
                    return Some(SolveResult::Solved(solution));
                }
            }
        }

        None
    }

    fn sort_frontier(&mut self) {
        let estimates = &self.estimates;
        let registry = &self.registry;
        self.frontier
            .make_contiguous()
            .sort_by_key(|&id| estimates[id] + registry.node(id).depth);
    }

    /// Push every box in every direction. Stops at the first winning
    /// successor, or when the registry reaches its node ceiling.
    fn expand(&mut self, id: NodeId, depth: usize) -> Expansion {
        let mut candidates: Vec<(usize, Board, Push)> = Vec::new();
        let mut win: Option<(Board, Push)> = None;

        let board = &self.registry.node(id).board;
        'boxes: for pos in board.box_positions() {
            for dir in ALL_DIRECTIONS {
                let Some(mut next) = board.push_box(pos, dir) else {
                    continue;
                };
                next.flood_fill_reachable();
                if next.is_deadlock() || self.registry.contains(&next) {
                    continue;
                }

                let push = Push {
                    box_pos: pos,
                    direction: dir,
                };
                if next.is_win() {
                    win = Some((next, push));
                    break 'boxes;
                }
                let estimate = self.heuristic.estimate(&next);
                candidates.push((estimate, next, push));
            }
        }

        if let Some((next, push)) = win {
            return match self.register(next, depth + 1, Some(id), Some(push), 0) {
                Some(win_id) => Expansion::Won(win_id),
                None => Expansion::Full,
            };
        }

        candidates.sort_by_key(|(estimate, _, _)| *estimate);
        for (estimate, next, push) in candidates {
            match self.register(next, depth + 1, Some(id), Some(push), estimate) {
                Some(child) => self.frontier.push_back(child),
                None if self.is_full() => return Expansion::Full,
                None => {}
            }
        }
        Expansion::Open
    }

    fn register(
        &mut self,
        board: Board,
        depth: usize,
        parent: Option<NodeId>,
        push: Option<Push>,
        estimate: usize,
    ) -> Option<NodeId> {
        // The node ceiling is hard: a full registry takes nothing more
        if self.is_full() {
            return None;
        }
        let id = self.registry.insert(board, depth, parent, push)?;
        self.estimates.push(estimate);
        Some(id)
    }

    fn solution(&self, id: NodeId) -> Solution {
        let path = self.registry.path_to(id);
        let mut states = Vec::with_capacity(path.len());
        let mut pushes = Vec::with_capacity(path.len().saturating_sub(1));
        for node_id in path {
            let node = self.registry.node(node_id);
            let mut state = node.board.clone();
            state.clear_reachable();
            states.push(state);
            if let Some(push) = node.push {
                pushes.push(push);
            }
        }
        Solution { states, pushes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heuristic::{ManhattanHeuristic, NullHeuristic};

    fn solve(text: &str) -> SolveResult {
        let board = Board::from_text(text).unwrap();
        Solver::new(&board, ManhattanHeuristic::new(), SolverLimits::default()).run()
    }

    fn replay(solution: &Solution) -> Board {
        let mut board = solution.initial().clone();
        for push in solution.pushes() {
            board.flood_fill_reachable();
            board = board.apply_push(*push).expect("push in trace must be valid");
        }
        board
    }

    #[test]
    fn test_solve_simple() {
        let SolveResult::Solved(solution) = solve("#####\n#@$.#\n#####") else {
            panic!("expected a solution");
        };
        assert_eq!(solution.min_steps(), 1);
        assert!(replay(&solution).is_win());
    }

    #[test]
    fn test_solve_already_solved() {
        let SolveResult::Solved(solution) = solve("####\n#@*#\n####") else {
            panic!("expected a solution");
        };
        assert_eq!(solution.min_steps(), 0);
        assert_eq!(solution.states().len(), 1);
    }

    #[test]
    fn test_solve_two_moves() {
        let SolveResult::Solved(solution) = solve("######\n#@$ .#\n######") else {
            panic!("expected a solution");
        };
        assert_eq!(solution.min_steps(), 2);
        assert!(replay(&solution).is_win());
    }

    #[test]
    fn test_open_five_by_five() {
        let text = ["     ", "     ", " @$ .", "     ", "     "].join("\n");
        let SolveResult::Solved(solution) = solve(&text) else {
            panic!("expected a solution");
        };
        assert_eq!(solution.min_steps(), 2);
    }

    #[test]
    fn test_cornered_box_is_impossible() {
        let text = "#####\n#$  #\n#  .#\n#  @#\n#####";
        assert!(Board::from_text(text).unwrap().is_corner_deadlock());
        assert!(matches!(solve(text), SolveResult::Impossible));
    }

    #[test]
    fn test_trace_replays_to_win() {
        let text = "#######\n#     #\n# $$  #\n# @.. #\n#######";
        let initial = Board::from_text(text).unwrap();
        let SolveResult::Solved(solution) = solve(text) else {
            panic!("expected a solution");
        };

        assert_eq!(solution.initial(), &initial);
        assert_eq!(solution.states().len(), solution.min_steps() + 1);
        assert!(replay(&solution).is_win());
        for state in solution.states() {
            assert_eq!(state.box_count(), initial.box_count());
            assert!(!state.is_deadlock());
        }
    }

    #[test]
    fn test_from_pushes_matches_search_trace() {
        let text = "#######\n#     #\n# $$  #\n# @.. #\n#######";
        let board = Board::from_text(text).unwrap();
        let SolveResult::Solved(solution) = solve(text) else {
            panic!("expected a solution");
        };
        let rebuilt = Solution::from_pushes(&board, solution.pushes()).unwrap();
        assert_eq!(rebuilt.states(), solution.states());

        let bad = Push {
            box_pos: crate::board::Position::new(1, 1),
            direction: crate::board::Direction::Up,
        };
        assert!(Solution::from_pushes(&board, &[bad]).is_none());
    }

    #[test]
    fn test_iteration_budget_gives_cutoff() {
        let board = Board::from_text("#######\n#@$  .#\n#######").unwrap();
        let limits = SolverLimits {
            max_iterations: 1,
            ..SolverLimits::default()
        };
        let result = Solver::new(&board, ManhattanHeuristic::new(), limits).run();
        assert!(matches!(result, SolveResult::Cutoff));
        assert!(matches!(
            result.into_result(),
            Err(Error::SolverBudgetExceeded)
        ));
    }

    #[test]
    fn test_node_budget_gives_cutoff() {
        let board = Board::from_text("#######\n#     #\n# $$  #\n# @.. #\n#######").unwrap();
        let limits = SolverLimits {
            max_nodes: 1,
            ..SolverLimits::default()
        };
        let result = Solver::new(&board, ManhattanHeuristic::new(), limits).run();
        assert!(matches!(result, SolveResult::Cutoff));
    }

    #[test]
    fn test_node_ceiling_is_never_exceeded() {
        let board = Board::from_text("#######\n#     #\n# $$  #\n# @.. #\n#######").unwrap();
        for max_nodes in [0, 1, 2, 5] {
            let limits = SolverLimits {
                max_nodes,
                ..SolverLimits::default()
            };
            let mut solver = Solver::new(&board, ManhattanHeuristic::new(), limits);
            let result = solver.run();
            assert!(matches!(result, SolveResult::Cutoff));
            assert!(solver.nodes_registered() <= max_nodes);
        }
    }

    #[test]
    fn test_iteration_ceiling_holds_inside_batch() {
        let board = Board::from_text("#######\n#     #\n# $$  #\n# @.. #\n#######").unwrap();
        let limits = SolverLimits {
            max_iterations: 3,
            batch_size: 50,
            ..SolverLimits::default()
        };
        let mut solver = Solver::new(&board, NullHeuristic::new(), limits);
        assert!(matches!(solver.run(), SolveResult::Cutoff));
        assert_eq!(solver.iterations(), 3);
    }

    #[test]
    fn test_step_reports_pending_batches() {
        let board = Board::from_text("########\n#@$   .#\n########").unwrap();
        let limits = SolverLimits {
            batch_size: 1,
            ..SolverLimits::default()
        };
        let mut solver = Solver::new(&board, NullHeuristic::new(), limits);
        assert!(matches!(solver.step(), SolveStep::Pending));

        let mut steps = 1;
        let solution = loop {
            steps += 1;
            if let SolveStep::Done(result) = solver.step() {
                break result.into_result().unwrap();
            }
        };
        assert_eq!(solution.min_steps(), 4);
        assert!(steps > 2);
        // Finished solvers keep answering with the same result
        assert!(matches!(solver.step(), SolveStep::Done(SolveResult::Solved(_))));
    }
}
