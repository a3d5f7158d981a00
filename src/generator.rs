use log::{debug, info, trace, warn};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::time::{Duration, Instant};

use crate::board::{Board, Push};
use crate::config::GeneratorConfig;
use crate::error::{Error, Result};
use crate::fallback::{FallbackGenerator, FallbackLevel, Template};
use crate::heuristic::ManhattanHeuristic;
use crate::level::Level;
use crate::quality::{Evaluation, QualityEvaluator, QualityLevel};
use crate::scaffold::Scaffold;
use crate::solver::{SolveResult, SolveStep, Solution, Solver};

/// Where a generated level came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Best-scoring candidate of the search
    Search,
    /// Most recent solvable candidate, the best one being too short
    LatestValid,
    Fallback(Template),
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneratedLevel {
    pub level: Level,
    #[serde(skip)]
    pub board: Board,
    pub min_steps: usize,
    pub iterations_used: usize,
    pub wall_count: usize,
    pub quality_score: f64,
    pub quality_level: QualityLevel,
    pub provenance: Provenance,
    pub solution: Vec<Push>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Progress {
    pub iteration: usize,
    pub max_iterations: usize,
    pub percent: usize,
    pub best_score: Option<f64>,
    #[serde(skip)]
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
pub enum TaskStep {
    Pending(Progress),
    Finished(GeneratedLevel),
}

/// Procedural level generator for one grid size.
pub struct LevelGenerator {
    config: GeneratorConfig,
    width: usize,
    height: usize,
    rng: ChaCha8Rng,
    evaluator: QualityEvaluator,
    fallback: FallbackGenerator,
}

impl LevelGenerator {
    pub fn new(width: usize, height: usize, config: GeneratorConfig) -> Result<Self> {
        let ratios_ok = (0.0..=1.0).contains(&config.min_wall_ratio)
            && (0.0..=1.0).contains(&config.max_wall_ratio)
            && config.min_wall_ratio <= config.max_wall_ratio
            && config.fallback_min_wall_ratio <= config.fallback_max_wall_ratio;
        if !ratios_ok {
            return Err(Error::InvalidConfiguration(
                "Wall ratios must lie in [0, 1] with min <= max".to_string(),
            ));
        }

        let fallback = FallbackGenerator::new(
            width,
            height,
            config.fallback_min_wall_ratio,
            config.fallback_max_wall_ratio,
        )?;
        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        Ok(LevelGenerator {
            evaluator: QualityEvaluator::new(width, height, config.difficulty),
            config,
            width,
            height,
            rng,
            fallback,
        })
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Begin a generation attempt. The task holds the generator until it is
    /// dropped, so attempts can never overlap.
    pub fn start(&mut self, max_iterations: usize) -> GenerationTask<'_> {
        GenerationTask {
            generator: self,
            phase: Phase::Mutate,
            scaffold: None,
            started: Instant::now(),
            iteration: 0,
            max_iterations,
            best: None,
            latest: None,
        }
    }

    /// Run a generation attempt to completion, reporting progress after
    /// every iteration and solver batch.
    pub fn generate_level(
        &mut self,
        max_iterations: usize,
        mut progress: Option<&mut dyn FnMut(&Progress)>,
    ) -> Result<GeneratedLevel> {
        let mut task = self.start(max_iterations);
        loop {
            match task.step()? {
                TaskStep::Pending(p) => {
                    if let Some(callback) = progress.as_deref_mut() {
                        callback(&p);
                    }
                }
                TaskStep::Finished(level) => return Ok(level),
            }
        }
    }
}

#[derive(Debug, Clone)]
struct Candidate {
    board: Board,
    solution: Solution,
    evaluation: Option<Evaluation>,
    wall_count: usize,
}

impl Candidate {
    fn score(&self) -> f64 {
        self.evaluation.as_ref().map_or(0.0, |e| e.score)
    }

    /// Higher score wins, then more pushes, then more walls.
    fn beats(&self, other: &Candidate) -> bool {
        let (a, b) = (self.score(), other.score());
        if a != b {
            return a > b;
        }
        let (sa, sb) = (self.solution.min_steps(), other.solution.min_steps());
        if sa != sb {
            return sa > sb;
        }
        self.wall_count > other.wall_count
    }
}

enum Phase {
    Mutate,
    Solving {
        board: Board,
        solver: Box<Solver<ManhattanHeuristic>>,
    },
    Done(Box<GeneratedLevel>),
}

/// One in-flight generation attempt, advanced by [`GenerationTask::step`].
pub struct GenerationTask<'a> {
    generator: &'a mut LevelGenerator,
    phase: Phase,
    scaffold: Option<Scaffold>,
    started: Instant,
    iteration: usize,
    max_iterations: usize,
    best: Option<Candidate>,
    latest: Option<Candidate>,
}

impl GenerationTask<'_> {
    /// Do one unit of work: a scaffold mutation or one solver batch.
    pub fn step(&mut self) -> Result<TaskStep> {
        match std::mem::replace(&mut self.phase, Phase::Mutate) {
            Phase::Done(level) => {
                let finished = TaskStep::Finished((*level).clone());
                self.phase = Phase::Done(level);
                Ok(finished)
            }
            Phase::Mutate => self.begin_iteration(),
            Phase::Solving { board, mut solver } => match solver.step() {
                SolveStep::Pending => {
                    self.phase = Phase::Solving { board, solver };
                    Ok(TaskStep::Pending(self.progress()))
                }
                SolveStep::Done(result) => self.end_iteration(board, result),
            },
        }
    }

    fn progress(&self) -> Progress {
        Progress {
            iteration: self.iteration,
            max_iterations: self.max_iterations,
            percent: (self.iteration * 100 / self.max_iterations.max(1)).min(100),
            best_score: self.best.as_ref().map(Candidate::score),
            elapsed: self.started.elapsed(),
        }
    }

    fn begin_iteration(&mut self) -> Result<TaskStep> {
        let elapsed = self.started.elapsed();
        if elapsed >= self.generator.config.max_generation_time {
            let err = Error::GenerationTimeout { elapsed };
            warn!("{} after {} iterations", err, self.iteration);
            return self.finish();
        }
        if self.iteration >= self.max_iterations {
            info!("iteration budget of {} used up", self.max_iterations);
            return self.finish();
        }

        let generator = &mut *self.generator;
        let scaffold = match &mut self.scaffold {
            Some(scaffold) => scaffold,
            slot @ None => {
                match Scaffold::new(
                    generator.width,
                    generator.height,
                    generator.config.max_generation_attempts_per_placement,
                    generator.config.weighted_placement,
                    &mut generator.rng,
                ) {
                    Ok(scaffold) => slot.insert(scaffold),
                    Err(err) => {
                        warn!("could not build scaffold: {}", err);
                        return self.finish();
                    }
                }
            }
        };

        mutate(scaffold, &generator.config, self.iteration, &mut generator.rng);

        let board = match scaffold.to_board() {
            Ok(board) if scaffold.box_count() > 0 && scaffold.box_count() == scaffold.goal_count() => board,
            Ok(_) => {
                trace!("scaffold has no usable boxes, rolling back");
                scaffold.load();
                self.iteration += 1;
                return Ok(TaskStep::Pending(self.progress()));
            }
            Err(err) => {
                debug!("scaffold is not a board: {}", err);
                scaffold.load();
                self.iteration += 1;
                return Ok(TaskStep::Pending(self.progress()));
            }
        };

        let solver = Solver::new(&board, ManhattanHeuristic::new(), generator.config.solver_limits());
        self.phase = Phase::Solving {
            board,
            solver: Box::new(solver),
        };
        Ok(TaskStep::Pending(self.progress()))
    }

    fn end_iteration(&mut self, board: Board, result: SolveResult) -> Result<TaskStep> {
        let Some(scaffold) = self.scaffold.as_mut() else {
            return self.finish();
        };

        match result {
            SolveResult::Impossible => {
                trace!("iteration {}: unsolvable, rolling back", self.iteration);
                scaffold.load();
            }
            SolveResult::Cutoff => {
                debug!("iteration {}: {}, rolling back", self.iteration, Error::SolverBudgetExceeded);
                scaffold.load();
            }
            SolveResult::Solved(solution) if solution.min_steps() == 0 => {
                scaffold.load();
            }
            SolveResult::Solved(solution) => {
                scaffold.save();
                let wall_count = scaffold.wall_count();
                let evaluation =
                    match self.generator.evaluator.evaluate(&board, &solution, wall_count) {
                        Ok(evaluation) => Some(evaluation),
                        Err(err) => {
                            warn!("iteration {}: {}", self.iteration, err);
                            None
                        }
                    };
                let candidate = Candidate {
                    board,
                    solution,
                    evaluation,
                    wall_count,
                };
                trace!(
                    "iteration {}: solved in {} pushes, score {:.3}",
                    self.iteration,
                    candidate.solution.min_steps(),
                    candidate.score()
                );

                if self.best.as_ref().is_none_or(|best| candidate.beats(best)) {
                    debug!(
                        "new best at iteration {}: {} pushes, {} walls, score {:.3}",
                        self.iteration,
                        candidate.solution.min_steps(),
                        candidate.wall_count,
                        candidate.score()
                    );
                    self.best = Some(candidate.clone());
                }

                let high_quality = candidate
                    .evaluation
                    .as_ref()
                    .is_some_and(|e| e.is_high_quality);
                self.latest = Some(candidate);

                self.iteration += 1;
                if high_quality && self.iteration >= self.generator.config.min_iterations_before_early_exit {
                    info!("high quality level after {} iterations", self.iteration);
                    return self.finish();
                }
                return Ok(TaskStep::Pending(self.progress()));
            }
        }

        self.iteration += 1;
        Ok(TaskStep::Pending(self.progress()))
    }

    /// Settle on a result: the best candidate, the latest one, or a
    /// fallback template.
    fn finish(&mut self) -> Result<TaskStep> {
        let min_best_steps = self.generator.config.min_best_steps;
        let chosen = match (self.best.take(), self.latest.take()) {
            (Some(best), _) if best.solution.min_steps() >= min_best_steps => {
                Some((best, Provenance::Search))
            }
            (_, Some(latest)) => Some((latest, Provenance::LatestValid)),
            (Some(best), None) => Some((best, Provenance::LatestValid)),
            (None, None) => None,
        };

        let level = match chosen {
            Some((candidate, provenance)) => self.candidate_level(candidate, provenance),
            None => {
                let remaining = self
                    .generator
                    .config
                    .max_generation_time
                    .saturating_sub(self.started.elapsed());
                info!("no solvable candidate, using fallback template");
                let generator = &mut *self.generator;
                let fallback = generator.fallback.generate(
                    generator.config.fallback_complexity,
                    remaining,
                    &mut generator.rng,
                )?;
                self.fallback_level(fallback)
            }
        };

        info!(
            "generated {}x{} level: {} pushes, {} walls, quality {} ({:.3}), {:?}",
            level.level.width,
            level.level.height,
            level.min_steps,
            level.wall_count,
            level.quality_level,
            level.quality_score,
            level.provenance
        );
        self.phase = Phase::Done(Box::new(level.clone()));
        Ok(TaskStep::Finished(level))
    }

    fn candidate_level(&self, candidate: Candidate, provenance: Provenance) -> GeneratedLevel {
        let (quality_score, quality_level) = match &candidate.evaluation {
            Some(e) => (e.score, e.quality_level),
            None => (0.0, QualityLevel::Unacceptable),
        };
        GeneratedLevel {
            level: Level::from_board(&candidate.board),
            min_steps: candidate.solution.min_steps(),
            iterations_used: self.iteration,
            wall_count: candidate.wall_count,
            quality_score,
            quality_level,
            provenance,
            solution: candidate.solution.pushes().to_vec(),
            board: candidate.board,
        }
    }

    fn fallback_level(&self, fallback: FallbackLevel) -> GeneratedLevel {
        let evaluation = Solution::from_pushes(&fallback.board, &fallback.pushes).and_then(|s| {
            self.generator
                .evaluator
                .evaluate(&fallback.board, &s, fallback.wall_count)
                .ok()
        });
        let (quality_score, quality_level) = match evaluation {
            Some(e) => (e.score, e.quality_level),
            None => (0.0, QualityLevel::Unacceptable),
        };
        GeneratedLevel {
            level: Level::from_board(&fallback.board),
            min_steps: fallback.min_steps,
            iterations_used: self.iteration,
            wall_count: fallback.wall_count,
            quality_score,
            quality_level,
            provenance: Provenance::Fallback(fallback.template),
            solution: fallback.pushes,
            board: fallback.board,
        }
    }
}

/// Grow the scaffold by one mutation, steering the wall count into the
/// configured band. Placement failures only make the mutation smaller.
fn mutate<R: Rng>(scaffold: &mut Scaffold, config: &GeneratorConfig, iteration: usize, rng: &mut R) {
    let walls = scaffold.wall_count();
    let border = scaffold.border_wall_count();
    let interior = scaffold.interior_cells() as f64;
    let low = border + (config.min_wall_ratio * interior) as usize;
    let high = border + (config.max_wall_ratio * interior) as usize;

    if walls < low {
        trace!("walls {} below band {}..{}: adding walls", walls, low, high);
        for _ in 0..2 {
            placed("wall", scaffold.place_wall(rng));
        }
        if rng.gen_bool(0.3) {
            placed("box and goal", scaffold.place_pair(rng));
        }
    } else if walls >= high {
        trace!("walls {} above band {}..{}: adding a box", walls, low, high);
        placed("box and goal", scaffold.place_pair(rng));
    } else if iteration < config.early_wall_iterations || rng.gen_bool(config.wall_priority_ratio) {
        trace!("walls {} in band: wall first", walls);
        placed("wall", scaffold.place_wall(rng));
        if rng.gen_bool(0.2) {
            placed("box and goal", scaffold.place_pair(rng));
        }
    } else {
        trace!("walls {} in band: boxes first", walls);
        let pairs = if rng.gen_bool(0.3) { 2 } else { 1 };
        for _ in 0..pairs {
            placed("box and goal", scaffold.place_pair(rng));
        }
    }

    if scaffold.box_count() == 0 {
        placed("box and goal", scaffold.place_pair(rng));
    }
}

fn placed<T>(what: &str, result: Result<T>) -> bool {
    match result {
        Ok(_) => true,
        Err(err) => {
            trace!("{} not placed: {}", what, err);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay::expand_moves;

    fn seeded(seed: u64) -> GeneratorConfig {
        GeneratorConfig {
            seed: Some(seed),
            ..GeneratorConfig::default()
        }
    }

    fn assert_playable(generated: &GeneratedLevel) {
        let level = &generated.level;
        assert_eq!(level.boxes.len(), level.targets.len());
        assert!(!level.boxes.is_empty());
        assert_eq!(generated.solution.len(), generated.min_steps);
        assert_eq!(generated.wall_count, level.wall_count());

        let board = level.to_board().unwrap();
        let steps = expand_moves(&board, &generated.solution).expect("solution must replay");
        let mut replayed = board.clone();
        for step in steps {
            replayed.move_player(step.direction);
        }
        assert!(replayed.is_win());
    }

    #[test]
    fn test_ten_by_ten_always_succeeds() {
        for seed in 0..3 {
            let mut generator = LevelGenerator::new(10, 10, seeded(seed)).unwrap();
            let started = Instant::now();
            let generated = generator.generate_level(40, None).unwrap();
            assert!(started.elapsed() < generator.config().max_generation_time + Duration::from_secs(5));
            assert_eq!((generated.level.width, generated.level.height), (10, 10));
            assert!(generated.iterations_used <= 40);
            assert_playable(&generated);
        }
    }

    #[test]
    fn test_zero_budget_falls_back() {
        let config = GeneratorConfig {
            max_generation_time: Duration::ZERO,
            ..seeded(1)
        };
        let mut generator = LevelGenerator::new(10, 10, config).unwrap();
        let generated = generator.generate_level(100, None).unwrap();
        assert!(matches!(generated.provenance, Provenance::Fallback(_)));
        assert_eq!(generated.iterations_used, 0);
        assert_playable(&generated);
    }

    #[test]
    fn test_zero_iterations_falls_back() {
        let mut generator = LevelGenerator::new(8, 6, seeded(2)).unwrap();
        let generated = generator.generate_level(0, None).unwrap();
        assert!(matches!(generated.provenance, Provenance::Fallback(_)));
        assert_playable(&generated);
    }

    #[test]
    fn test_task_steps_until_finished() {
        let mut generator = LevelGenerator::new(7, 7, seeded(5)).unwrap();
        let mut task = generator.start(10);
        assert!(matches!(task.step().unwrap(), TaskStep::Pending(_)));

        let generated = loop {
            match task.step().unwrap() {
                TaskStep::Pending(progress) => assert!(progress.percent <= 100),
                TaskStep::Finished(level) => break level,
            }
        };
        assert_playable(&generated);
        // A finished task keeps handing back the same level
        let TaskStep::Finished(again) = task.step().unwrap() else {
            panic!("finished task went back to pending");
        };
        assert_eq!(again.level, generated.level);
    }

    #[test]
    fn test_progress_callback() {
        let mut generator = LevelGenerator::new(8, 8, seeded(9)).unwrap();
        let mut calls = 0;
        let mut last_iteration = 0;
        let mut callback = |p: &Progress| {
            calls += 1;
            assert!(p.iteration >= last_iteration);
            last_iteration = p.iteration;
        };
        generator.generate_level(15, Some(&mut callback)).unwrap();
        assert!(calls > 0);
    }

    #[test]
    fn test_same_seed_same_level() {
        let a = LevelGenerator::new(9, 9, seeded(42))
            .unwrap()
            .generate_level(20, None)
            .unwrap();
        let b = LevelGenerator::new(9, 9, seeded(42))
            .unwrap()
            .generate_level(20, None)
            .unwrap();
        assert_eq!(a.level, b.level);
        assert_eq!(a.min_steps, b.min_steps);
        assert_eq!(a.provenance, b.provenance);
    }

    #[test]
    fn test_invalid_configuration() {
        assert!(matches!(
            LevelGenerator::new(4, 4, GeneratorConfig::default()),
            Err(Error::InvalidConfiguration(_))
        ));
        let config = GeneratorConfig {
            min_wall_ratio: 0.5,
            max_wall_ratio: 0.2,
            ..GeneratorConfig::default()
        };
        assert!(LevelGenerator::new(10, 10, config).is_err());
    }

    #[test]
    fn test_mutate_survives_full_grid() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        // The single interior cell holds the player
        let mut scaffold = Scaffold::new(3, 3, 10, true, &mut rng).unwrap();
        let before = scaffold.tiles().to_vec();

        assert!(!placed("wall", scaffold.place_wall(&mut rng)));
        assert!(!placed("box and goal", scaffold.place_pair(&mut rng)));
        mutate(&mut scaffold, &GeneratorConfig::default(), 0, &mut rng);
        assert_eq!(scaffold.tiles(), &before[..]);
    }

    #[test]
    fn test_candidate_ordering() {
        let board = Board::from_text("######\n#@$ .#\n######").unwrap();
        let solution = Solution::from_pushes(
            &board,
            &[
                Push {
                    box_pos: crate::board::Position::new(2, 1),
                    direction: crate::board::Direction::Right,
                },
                Push {
                    box_pos: crate::board::Position::new(3, 1),
                    direction: crate::board::Direction::Right,
                },
            ],
        )
        .unwrap();
        let short = Solution::from_pushes(&board, &solution.pushes()[..1]).unwrap();

        let long = Candidate {
            board: board.clone(),
            solution,
            evaluation: None,
            wall_count: 10,
        };
        let brief = Candidate {
            board: board.clone(),
            solution: short,
            evaluation: None,
            wall_count: 12,
        };
        // Equal scores: more pushes wins over more walls
        assert!(long.beats(&brief));
        assert!(!brief.beats(&long));
    }
}
