use std::fmt;
use std::io;
use std::time::Duration;

/// Errors produced while building, solving or generating levels.
///
/// Only `InvalidConfiguration` ever escapes [`crate::LevelGenerator::generate_level`];
/// the other variants are recovered inside the generation loop and show up in logs.
#[derive(Debug)]
pub enum Error {
    /// The wall-clock budget for a generation attempt ran out
    GenerationTimeout { elapsed: Duration },
    /// The solver hit its iteration or node ceiling before reaching a conclusion
    SolverBudgetExceeded,
    /// The solver exhausted the frontier without finding a win
    SolverUnsolvable,
    /// A scaffold placement found no free floor cell within its trial budget
    NoPlacementFound,
    /// The quality evaluator was handed inconsistent input
    Evaluation(String),
    /// The requested grid cannot hold any level
    InvalidConfiguration(String),
    /// Invalid level content
    InvalidLevel(String),
    /// IO error when reading from file
    Io(io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::GenerationTimeout { elapsed } => {
                write!(f, "Generation timed out after {} ms", elapsed.as_millis())
            }
            Error::SolverBudgetExceeded => write!(f, "Solver budget exceeded"),
            Error::SolverUnsolvable => write!(f, "Level is unsolvable"),
            Error::NoPlacementFound => write!(f, "No free floor cell found for placement"),
            Error::Evaluation(msg) => write!(f, "Evaluation error: {}", msg),
            Error::InvalidConfiguration(msg) => write!(f, "Invalid configuration: {}", msg),
            Error::InvalidLevel(msg) => write!(f, "Invalid level: {}", msg),
            Error::Io(err) => write!(f, "IO error: {}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = Error::GenerationTimeout {
            elapsed: Duration::from_millis(1500),
        };
        assert_eq!(err.to_string(), "Generation timed out after 1500 ms");
        assert_eq!(
            Error::InvalidConfiguration("grid 2x2".to_string()).to_string(),
            "Invalid configuration: grid 2x2"
        );
    }
}
