use fnv::FnvHashMap;
use serde::Serialize;
use std::fmt;

use crate::board::{Board, Direction, Position};
use crate::config::Difficulty;
use crate::error::{Error, Result};
use crate::replay;
use crate::solver::Solution;

const STEP_WEIGHT: f64 = 0.35;
const SPATIAL_WEIGHT: f64 = 0.25;
const PATH_WEIGHT: f64 = 0.20;
const WALL_WEIGHT: f64 = 0.12;
const EFFICIENCY_WEIGHT: f64 = 0.08;

const PATTERN_LENGTH: usize = 3;

/// Per-axis scores, each in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Metrics {
    pub step_complexity: f64,
    pub spatial_distribution: f64,
    pub path_diversity: f64,
    pub wall_density: f64,
    pub solution_efficiency: f64,
}

impl Metrics {
    pub fn weighted_score(&self) -> f64 {
        self.step_complexity * STEP_WEIGHT
            + self.spatial_distribution * SPATIAL_WEIGHT
            + self.path_diversity * PATH_WEIGHT
            + self.wall_density * WALL_WEIGHT
            + self.solution_efficiency * EFFICIENCY_WEIGHT
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityLevel {
    Unacceptable,
    Poor,
    Acceptable,
    Good,
    High,
    Excellent,
}

impl QualityLevel {
    pub fn classify(score: f64, step_complexity: f64) -> Self {
        if score >= 0.8 && step_complexity >= 0.7 {
            QualityLevel::Excellent
        } else if score >= 0.7 && step_complexity >= 0.6 {
            QualityLevel::High
        } else if score >= 0.6 && step_complexity >= 0.5 {
            QualityLevel::Good
        } else if score >= 0.5 && step_complexity >= 0.4 {
            QualityLevel::Acceptable
        } else if score >= 0.3 {
            QualityLevel::Poor
        } else {
            QualityLevel::Unacceptable
        }
    }
}

impl fmt::Display for QualityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QualityLevel::Excellent => "excellent",
            QualityLevel::High => "high",
            QualityLevel::Good => "good",
            QualityLevel::Acceptable => "acceptable",
            QualityLevel::Poor => "poor",
            QualityLevel::Unacceptable => "unacceptable",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Evaluation {
    pub score: f64,
    pub metrics: Metrics,
    pub quality_level: QualityLevel,
    pub is_high_quality: bool,
    pub is_acceptable: bool,
    pub suggestions: Vec<String>,
}

/// Scores solved candidates for one grid size and difficulty.
#[derive(Debug, Clone)]
pub struct QualityEvaluator {
    width: usize,
    height: usize,
    base_step_threshold: usize,
    max_reasonable_steps: usize,
}

impl QualityEvaluator {
    pub fn new(width: usize, height: usize, difficulty: Difficulty) -> Self {
        let area = (width * height) as f64;
        let base_step_threshold = ((area * difficulty.step_multiplier()).floor() as usize).max(1);
        QualityEvaluator {
            width,
            height,
            base_step_threshold,
            max_reasonable_steps: base_step_threshold * 3,
        }
    }

    pub fn base_step_threshold(&self) -> usize {
        self.base_step_threshold
    }

    /// Push counts scoring a full 1.0 on step length.
    pub fn ideal_window(&self) -> (usize, usize) {
        (self.base_step_threshold * 2, self.max_reasonable_steps)
    }

    pub fn evaluate(&self, board: &Board, solution: &Solution, wall_count: usize) -> Result<Evaluation> {
        if board.width() != self.width || board.height() != self.height {
            return Err(Error::Evaluation(format!(
                "Board is {}x{}, evaluator expects {}x{}",
                board.width(),
                board.height(),
                self.width,
                self.height
            )));
        }

        let steps = replay::expand_moves(board, solution.pushes()).ok_or_else(|| {
            Error::Evaluation("Solution does not replay on the board".to_string())
        })?;
        let directions: Vec<Direction> = solution.pushes().iter().map(|p| p.direction).collect();
        let push_share = if steps.is_empty() {
            0.0
        } else {
            solution.min_steps() as f64 / steps.len() as f64
        };

        let metrics = Metrics {
            step_complexity: self.step_complexity(&directions),
            spatial_distribution: self.spatial_distribution(board),
            path_diversity: path_diversity(&directions),
            wall_density: self.wall_density(wall_count),
            solution_efficiency: solution_efficiency(solution.min_steps(), push_share),
        };
        let score = metrics.weighted_score();

        Ok(Evaluation {
            score,
            metrics,
            quality_level: QualityLevel::classify(score, metrics.step_complexity),
            is_high_quality: score >= 0.7 && metrics.step_complexity >= 0.6,
            is_acceptable: score >= 0.5 && metrics.step_complexity >= 0.4,
            suggestions: suggestions(&metrics),
        })
    }

    /// Solution-length score in bands around the threshold `T`: 0.2 below
    /// `T / 2`, 0.5 below `T`, a ramp from 0.8 to 1.0 up to `2T`, 1.0 up to
    /// the reasonable maximum and a slow decay past it, floored at 0.6.
    pub fn step_length_score(&self, steps: usize) -> f64 {
        let threshold = self.base_step_threshold as f64;
        let max = self.max_reasonable_steps as f64;
        let steps = steps as f64;

        if steps < threshold * 0.5 {
            0.2
        } else if steps < threshold {
            0.5
        } else if steps <= threshold * 2.0 {
            0.8 + (steps - threshold) / threshold * 0.2
        } else if steps <= max {
            1.0
        } else {
            (1.0 - (steps - max) / max * 0.4).max(0.6)
        }
    }

    fn step_complexity(&self, directions: &[Direction]) -> f64 {
        if directions.is_empty() {
            return 0.0;
        }
        let length = self.step_length_score(directions.len());
        (length * 0.7 + pattern_complexity(directions) * 0.3).min(1.0)
    }

    fn spatial_distribution(&self, board: &Board) -> f64 {
        let boxes = board.box_positions();
        let goals = board.goal_positions();
        if boxes.is_empty() || goals.is_empty() {
            return 0.0;
        }

        self.spread(&boxes) * 0.4 + self.spread(&goals) * 0.4 + self.separation(&boxes, &goals) * 0.2
    }

    /// Mean pairwise distance against half the grid diagonal.
    fn spread(&self, positions: &[Position]) -> f64 {
        if positions.len() <= 1 {
            return 1.0;
        }

        let mut total = 0;
        let mut pairs = 0;
        for (i, a) in positions.iter().enumerate() {
            for b in &positions[i + 1..] {
                total += a.manhattan(*b);
                pairs += 1;
            }
        }

        let diagonal = (self.width + self.height).saturating_sub(2).max(1) as f64;
        let mean = total as f64 / pairs as f64;
        (mean / (diagonal * 0.5)).min(1.0)
    }

    fn separation(&self, boxes: &[Position], goals: &[Position]) -> f64 {
        let total: usize = boxes
            .iter()
            .filter_map(|b| goals.iter().map(|g| b.manhattan(*g)).min())
            .sum();
        let mean = total as f64 / boxes.len() as f64;
        let ideal = ((self.width + self.height) / 4).max(2) as f64;

        if mean < 1.0 {
            0.2
        } else if mean > ideal * 2.0 {
            0.3
        } else {
            (mean / ideal).min(1.0)
        }
    }

    fn wall_density(&self, wall_count: usize) -> f64 {
        let total = self.width * self.height;
        let inner = self.width.saturating_sub(2) * self.height.saturating_sub(2);
        if inner == 0 {
            return 0.0;
        }
        let border = total - inner;
        let density = wall_count.saturating_sub(border) as f64 / inner as f64;

        if density < 0.1 {
            0.3
        } else if density > 0.8 {
            0.2
        } else if density <= 0.6 {
            0.5 + density / 0.6 * 0.5
        } else {
            (1.0 - (density - 0.6) / 0.2 * 0.6).max(0.4)
        }
    }
}

/// Variety of 3-push direction patterns, minus a penalty for patterns that
/// keep coming back.
fn pattern_complexity(directions: &[Direction]) -> f64 {
    if directions.len() < PATTERN_LENGTH {
        return 0.0;
    }

    let mut counts: FnvHashMap<&[Direction], usize> = FnvHashMap::default();
    for window in directions.windows(PATTERN_LENGTH) {
        *counts.entry(window).or_default() += 1;
    }

    let total = directions.len() - PATTERN_LENGTH + 1;
    let diversity = counts.len() as f64 / total as f64;
    let penalty: f64 = counts
        .values()
        .filter(|&&n| n > 2)
        .map(|&n| (n - 2) as f64 * 0.1)
        .sum();

    (diversity - penalty.min(0.5)).clamp(0.0, 1.0)
}

/// Direction changes per push, best in a middle band.
fn path_diversity(directions: &[Direction]) -> f64 {
    if directions.len() < 4 {
        return 0.0;
    }

    let changes = directions.windows(2).filter(|w| w[0] != w[1]).count();
    let ratio = changes as f64 / (directions.len() - 1) as f64;

    let score = if ratio < 0.2 {
        ratio / 0.2 * 0.5
    } else if ratio <= 0.7 {
        0.5 + (ratio - 0.2) / 0.5 * 0.5
    } else {
        (1.0 - (ratio - 0.7) / 0.3 * 0.4).max(0.6)
    };
    score.min(1.0)
}

/// Share of player moves that are pushes, best in a middle band.
fn solution_efficiency(pushes: usize, push_share: f64) -> f64 {
    if pushes == 0 {
        return 0.0;
    }
    if push_share < 0.2 {
        0.3
    } else if push_share > 0.8 {
        0.4
    } else {
        (push_share / 0.5).min(1.0)
    }
}

fn suggestions(metrics: &Metrics) -> Vec<String> {
    let mut out = Vec::new();
    if metrics.step_complexity < 0.5 {
        out.push("Increase complexity with more obstacles or boxes".to_string());
    }
    if metrics.spatial_distribution < 0.5 {
        out.push("Spread boxes and goals out instead of clustering them".to_string());
    }
    if metrics.path_diversity < 0.5 {
        out.push("Vary push directions to avoid monotonous solutions".to_string());
    }
    if metrics.wall_density < 0.4 {
        out.push("Rebalance wall density between openness and obstruction".to_string());
    }
    out
}
