use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::solver::SolverLimits;

/// Target difficulty. Scales the step-length window the evaluator rewards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    /// Fraction of the grid area used as the base step threshold.
    pub fn step_multiplier(self) -> f64 {
        match self {
            Difficulty::Easy => 0.25,
            Difficulty::Medium => 0.35,
            Difficulty::Hard => 0.45,
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Difficulty::Easy => write!(f, "easy"),
            Difficulty::Medium => write!(f, "medium"),
            Difficulty::Hard => write!(f, "hard"),
        }
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            _ => Err(format!("Unknown difficulty '{}'", s)),
        }
    }
}

/// Every tunable of a generation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratorConfig {
    pub max_solver_iterations: usize,
    pub max_nodes_in_memory: usize,
    pub solver_batch_size: usize,
    pub solver_resort_interval: usize,
    pub solver_max_depth: usize,
    /// Lower edge of the interior wall band
    pub min_wall_ratio: f64,
    /// Upper edge of the interior wall band
    pub max_wall_ratio: f64,
    /// Chance of a wall-first mutation inside the band once the early phase is over
    pub wall_priority_ratio: f64,
    pub early_wall_iterations: usize,
    pub fallback_min_wall_ratio: f64,
    pub fallback_max_wall_ratio: f64,
    pub max_generation_attempts_per_placement: usize,
    pub max_generation_time: Duration,
    pub min_iterations_before_early_exit: usize,
    /// Best-by-quality candidates shorter than this lose to the latest valid one
    pub min_best_steps: usize,
    pub fallback_complexity: f64,
    pub difficulty: Difficulty,
    pub weighted_placement: bool,
    pub seed: Option<u64>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        GeneratorConfig {
            max_solver_iterations: 5000,
            max_nodes_in_memory: 25_000,
            solver_batch_size: 50,
            solver_resort_interval: 100,
            solver_max_depth: 80,
            min_wall_ratio: 0.10,
            max_wall_ratio: 0.45,
            wall_priority_ratio: 0.4,
            early_wall_iterations: 40,
            fallback_min_wall_ratio: 0.10,
            fallback_max_wall_ratio: 0.60,
            max_generation_attempts_per_placement: 1000,
            max_generation_time: Duration::from_secs(10),
            min_iterations_before_early_exit: 30,
            min_best_steps: 2,
            fallback_complexity: 0.6,
            difficulty: Difficulty::Medium,
            weighted_placement: true,
            seed: None,
        }
    }
}

impl GeneratorConfig {
    pub fn easy() -> Self {
        GeneratorConfig {
            difficulty: Difficulty::Easy,
            max_wall_ratio: 0.35,
            fallback_complexity: 0.4,
            ..Self::default()
        }
    }

    pub fn medium() -> Self {
        Self::default()
    }

    pub fn hard() -> Self {
        GeneratorConfig {
            difficulty: Difficulty::Hard,
            max_solver_iterations: 10_000,
            max_nodes_in_memory: 50_000,
            min_wall_ratio: 0.15,
            fallback_complexity: 0.8,
            ..Self::default()
        }
    }

    pub fn for_difficulty(difficulty: Difficulty) -> Self {
        match difficulty {
            Difficulty::Easy => Self::easy(),
            Difficulty::Medium => Self::medium(),
            Difficulty::Hard => Self::hard(),
        }
    }

    pub fn solver_limits(&self) -> SolverLimits {
        SolverLimits {
            max_iterations: self.max_solver_iterations,
            max_nodes: self.max_nodes_in_memory,
            batch_size: self.solver_batch_size,
            resort_interval: self.solver_resort_interval,
            max_depth: self.solver_max_depth,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_set_difficulty() {
        assert_eq!(GeneratorConfig::easy().difficulty, Difficulty::Easy);
        assert_eq!(GeneratorConfig::medium(), GeneratorConfig::default());
        assert_eq!(GeneratorConfig::hard().difficulty, Difficulty::Hard);
        assert!(Difficulty::Easy.step_multiplier() < Difficulty::Hard.step_multiplier());
    }

    #[test]
    fn test_solver_limits() {
        let limits = GeneratorConfig::default().solver_limits();
        assert_eq!(limits.max_iterations, 5000);
        assert_eq!(limits.max_nodes, 25_000);
        assert_eq!(limits.max_depth, 80);
    }

    #[test]
    fn test_parse_difficulty() {
        assert_eq!("HARD".parse::<Difficulty>(), Ok(Difficulty::Hard));
        assert!("extreme".parse::<Difficulty>().is_err());
        assert_eq!(Difficulty::Easy.to_string(), "easy");
    }
}
