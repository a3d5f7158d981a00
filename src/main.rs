use clap::{Args, Parser, Subcommand, ValueEnum};
use log::info;
use std::io::Write;
use std::time::{Duration, Instant};

use sokogen::replay::lurd;
use sokogen::{
    Board, Difficulty, GeneratedLevel, GeneratorConfig, Heuristic, LevelGenerator, Levels,
    ManhattanHeuristic, NullHeuristic, Progress, Push, Solution, SolveResult, Solver, SolverLimits,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum HeuristicType {
    Manhattan,
    Null,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DifficultyArg {
    Easy,
    Medium,
    Hard,
}

impl From<DifficultyArg> for Difficulty {
    fn from(arg: DifficultyArg) -> Self {
        match arg {
            DifficultyArg::Easy => Difficulty::Easy,
            DifficultyArg::Medium => Difficulty::Medium,
            DifficultyArg::Hard => Difficulty::Hard,
        }
    }
}

#[derive(Parser)]
#[command(name = "sokogen")]
#[command(about = "A procedural Sokoban level generator and solver", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate new levels
    Generate(GenerateArgs),
    /// Solve levels from an XSB file
    Solve(SolveArgs),
}

#[derive(Args)]
struct GenerateArgs {
    /// Grid width, walls included
    #[arg(short = 'W', long, default_value = "10")]
    width: usize,

    /// Grid height, walls included
    #[arg(short = 'H', long, default_value = "10")]
    height: usize,

    /// Maximum mutate-and-solve iterations per level
    #[arg(short = 'i', long, default_value = "200")]
    iterations: usize,

    /// Number of levels to generate
    #[arg(short = 'c', long, default_value = "1")]
    count: usize,

    /// Seed for reproducible output
    #[arg(short, long)]
    seed: Option<u64>,

    /// Wall-clock budget per level in milliseconds
    #[arg(short = 't', long)]
    time_ms: Option<u64>,

    #[arg(short, long, value_enum, default_value = "medium")]
    difficulty: DifficultyArg,

    /// Override the solver's node ceiling
    #[arg(short = 'n', long)]
    max_nodes: Option<usize>,

    /// Emit levels as JSON instead of XSB
    #[arg(long)]
    json: bool,

    /// Print the solution step-by-step
    #[arg(short, long)]
    print_solution: bool,

    /// Report search progress on stderr
    #[arg(long)]
    progress: bool,
}

#[derive(Args)]
struct SolveArgs {
    /// Path to the levels file (XSB format)
    #[arg(value_name = "FILE")]
    levels_file: String,

    /// Level number to solve (1-indexed), or start of range
    #[arg(value_name = "LEVEL")]
    level_start: usize,

    /// Optional end of level range (inclusive, 1-indexed)
    #[arg(value_name = "LEVEL_END")]
    level_end: Option<usize>,

    /// Print the solution step-by-step
    #[arg(short, long)]
    print_solution: bool,

    /// Maximum number of configurations to keep before giving up
    #[arg(short = 'n', long, default_value = "1000000")]
    max_nodes: usize,

    /// Maximum number of node expansions before giving up
    #[arg(short = 'i', long, default_value = "1000000")]
    max_iterations: usize,

    /// Pushes beyond this depth are not explored
    #[arg(short = 'd', long, default_value = "500")]
    max_depth: usize,

    /// Heuristic to use for solving
    #[arg(short = 'H', long, value_enum, default_value = "manhattan")]
    heuristic: HeuristicType,
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("Error: {}", message);
    std::process::exit(1);
}

/// Step-by-step rendering of a push trace, or None if it does not replay.
fn render_solution(initial: &Board, pushes: &[Push]) -> Option<String> {
    let solution = Solution::from_pushes(initial, pushes)?;
    let total = pushes.len();

    let mut out = format!("\nStarting position:\n{}", solution.initial());
    for (count, (push, state)) in pushes.iter().zip(&solution.states()[1..]).enumerate() {
        out.push_str(&format!(
            "Push {} ({}/{}):\n{}",
            push,
            count + 1,
            total,
            state
        ));
    }
    out.push_str(&format!("moves: {}\n", lurd(initial, pushes)?));
    Some(out)
}

fn print_solution(initial: &Board, pushes: &[Push]) {
    match render_solution(initial, pushes) {
        Some(text) => print!("{}", text),
        None => fail("solution does not replay on its level"),
    }
}

struct LevelStats {
    solved: bool,
    steps: usize,
    states_explored: usize,
    elapsed_ms: u128,
}

fn solve_level_helper<H: Heuristic>(
    level_num: usize,
    board: &Board,
    heuristic: H,
    limits: SolverLimits,
    print: bool,
) -> LevelStats {
    let mut solver = Solver::new(board, heuristic, limits);
    let start = Instant::now();
    let result = solver.run();
    let elapsed_ms = start.elapsed().as_millis();
    let states_explored = solver.nodes_registered();

    let (solved_char, steps, solved) = match &result {
        SolveResult::Solved(solution) => ('Y', solution.min_steps(), true),
        SolveResult::Cutoff => ('N', 0, false),
        SolveResult::Impossible => ('X', 0, false),
    };

    println!(
        "level: {:<3}  solved: {}  steps: {:<5}  states: {:<12}  elapsed: {} ms",
        level_num, solved_char, steps, states_explored, elapsed_ms
    );

    if print {
        if let SolveResult::Solved(solution) = result {
            print_solution(board, solution.pushes());
        }
    }

    LevelStats {
        solved,
        steps,
        states_explored,
        elapsed_ms,
    }
}

fn solve(args: SolveArgs) {
    let levels = match Levels::from_file(&args.levels_file) {
        Ok(levels) => levels,
        Err(e) => fail(format!("loading levels: {}", e)),
    };

    let level_end = args.level_end.unwrap_or(args.level_start);

    if args.level_start == 0 {
        fail("level numbers must be at least 1");
    }
    if level_end < args.level_start {
        fail("level end must be >= level start");
    }
    if level_end > levels.len() {
        fail(format!(
            "level {} not found (file contains {} levels)",
            level_end,
            levels.len()
        ));
    }

    let num_levels = level_end - args.level_start + 1;
    if args.print_solution && num_levels > 1 {
        fail("solution printing only supported when solving a single level");
    }

    let limits = SolverLimits {
        max_iterations: args.max_iterations,
        max_nodes: args.max_nodes,
        max_depth: args.max_depth,
        ..SolverLimits::default()
    };

    let mut total_solved = 0;
    let mut total_steps = 0;
    let mut total_states = 0;
    let mut total_time_ms = 0;

    for (level_num, board) in levels
        .iter()
        .enumerate()
        .map(|(i, b)| (i + 1, b))
        .skip(args.level_start - 1)
        .take(num_levels)
    {
        let stats = match args.heuristic {
            HeuristicType::Manhattan => solve_level_helper(
                level_num,
                board,
                ManhattanHeuristic::new(),
                limits,
                args.print_solution,
            ),
            HeuristicType::Null => solve_level_helper(
                level_num,
                board,
                NullHeuristic::new(),
                limits,
                args.print_solution,
            ),
        };

        if stats.solved {
            total_solved += 1;
        }
        total_steps += stats.steps;
        total_states += stats.states_explored;
        total_time_ms += stats.elapsed_ms;
    }

    if num_levels > 1 {
        println!("---");
        println!(
            "solved: {:>3}/{:<3}        steps: {:<5}  states: {:<12}  elapsed: {} ms",
            total_solved, num_levels, total_steps, total_states, total_time_ms
        );
    }
}

fn generate(args: GenerateArgs) {
    if args.json && args.print_solution {
        fail("solution printing is not supported with --json");
    }

    let mut config = GeneratorConfig::for_difficulty(args.difficulty.into());
    config.seed = args.seed;
    if let Some(ms) = args.time_ms {
        config.max_generation_time = Duration::from_millis(ms);
    }
    if let Some(max_nodes) = args.max_nodes {
        config.max_nodes_in_memory = max_nodes;
    }

    let mut generator = match LevelGenerator::new(args.width, args.height, config) {
        Ok(generator) => generator,
        Err(e) => fail(e),
    };

    let mut report_progress = |p: &Progress| {
        eprint!(
            "\riteration {}/{} ({}%)  best: {:.3}",
            p.iteration,
            p.max_iterations,
            p.percent,
            p.best_score.unwrap_or(0.0)
        );
        let _ = std::io::stderr().flush();
    };

    let mut generated: Vec<GeneratedLevel> = Vec::with_capacity(args.count);
    let mut total_steps = 0;
    let mut total_time_ms = 0;

    for level_num in 1..=args.count {
        let start = Instant::now();
        let progress: Option<&mut dyn FnMut(&Progress)> = if args.progress {
            Some(&mut report_progress)
        } else {
            None
        };
        let level = match generator.generate_level(args.iterations, progress) {
            Ok(level) => level,
            Err(e) => fail(e),
        };
        let elapsed_ms = start.elapsed().as_millis();
        if args.progress {
            eprintln!();
        }
        info!("level {} generated via {:?}", level_num, level.provenance);

        total_steps += level.min_steps;
        total_time_ms += elapsed_ms;

        if !args.json {
            println!(
                "level: {:<3}  steps: {:<5}  walls: {:<4}  score: {:.3} ({})  iterations: {:<5}  elapsed: {} ms",
                level_num,
                level.min_steps,
                level.wall_count,
                level.quality_score,
                level.quality_level,
                level.iterations_used,
                elapsed_ms
            );
            println!("{}", level.board);
            if args.print_solution {
                print_solution(&level.board, &level.solution);
            }
        }
        generated.push(level);
    }

    if args.json {
        match serde_json::to_string_pretty(&generated) {
            Ok(json) => println!("{}", json),
            Err(e) => fail(e),
        }
    } else if args.count > 1 {
        println!("---");
        println!(
            "generated: {:<3}  steps: {:<5}  elapsed: {} ms",
            args.count, total_steps, total_time_ms
        );
    }
}

fn main() {
    env_logger::init();

    match Cli::parse().command {
        Command::Generate(args) => generate(args),
        Command::Solve(args) => solve(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sokogen::{Direction, Position};

    #[test]
    fn test_render_solution_with_walk_before_push() {
        let board = Board::from_text("######\n#  $.#\n#@   #\n######").unwrap();
        let mut solver = Solver::new(&board, ManhattanHeuristic::new(), SolverLimits::default());
        let solution = solver.run().into_result().unwrap();

        let text = render_solution(&board, solution.pushes()).unwrap();
        assert!(text.contains("Push (3, 1) Right (1/1):\n######\n#  @*#\n#    #\n######\n"));
        assert!(text.ends_with("moves: urR\n"));
    }

    #[test]
    fn test_render_solution_rejects_bad_trace() {
        let board = Board::from_text("#####\n#@$.#\n#####").unwrap();
        let push = Push {
            box_pos: Position::new(2, 1),
            direction: Direction::Left,
        };
        assert!(render_solution(&board, &[push]).is_none());
    }
}
