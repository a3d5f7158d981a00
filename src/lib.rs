//! Procedural Sokoban level generation.
//!
//! [`LevelGenerator`] mutates a walled grid, solves each candidate with a
//! push-level best-first [`Solver`], scores solvable candidates with a
//! [`QualityEvaluator`] and falls back to a template level when the search
//! comes up empty.

pub mod board;
pub mod config;
pub mod deadlocks;
pub mod error;
pub mod fallback;
pub mod generator;
pub mod heuristic;
pub mod level;
pub mod levels;
pub mod quality;
pub mod registry;
pub mod replay;
pub mod scaffold;
pub mod session;
pub mod solver;
pub mod zobrist;

pub use board::{Board, Direction, MoveOutcome, Position, Push, Tile};
pub use config::{Difficulty, GeneratorConfig};
pub use error::{Error, Result};
pub use fallback::{FallbackGenerator, FallbackLevel, Template};
pub use generator::{
    GeneratedLevel, GenerationTask, LevelGenerator, Progress, Provenance, TaskStep,
};
pub use heuristic::{Heuristic, ManhattanHeuristic, NullHeuristic};
pub use level::Level;
pub use levels::Levels;
pub use quality::{Evaluation, Metrics, QualityEvaluator, QualityLevel};
pub use session::PlaySession;
pub use solver::{Solution, SolveResult, SolveStep, Solver, SolverLimits};
