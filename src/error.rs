//! Error type shared by the parser, the graph model and the solvers.

use std::fmt;

/// Errors surfaced while loading an instance or configuring the solver
#[derive(Debug)]
pub enum SolverError {
    /// The input file does not follow the expected layout
    MalformedInput(String),
    /// No path exists between two vertices
    DisconnectedGraph { from: usize, to: usize },
    /// Bad configuration file or `key=value` parameter
    InvalidConfig(String),
    /// Some files of a batch run could not be solved
    BatchFailed { failed: usize, total: usize },
    Io(std::io::Error),
}

impl SolverError {
    pub fn malformed<S: Into<String>>(msg: S) -> Self {
        SolverError::MalformedInput(msg.into())
    }
}

impl fmt::Display for SolverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverError::MalformedInput(msg) => write!(f, "malformed input: {}", msg),
            SolverError::DisconnectedGraph { from, to } => {
                write!(f, "graph is disconnected: no path from {} to {}", from, to)
            }
            SolverError::InvalidConfig(msg) => write!(f, "invalid configuration: {}", msg),
            SolverError::BatchFailed { failed, total } => {
                write!(f, "{} of {} instances failed", failed, total)
            }
            SolverError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for SolverError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SolverError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SolverError {
    fn from(e: std::io::Error) -> Self {
        SolverError::Io(e)
    }
}

pub type Result<T> = std::result::Result<T, SolverError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = SolverError::BatchFailed { failed: 2, total: 5 };
        assert_eq!(err.to_string(), "2 of 5 instances failed");
        let err = SolverError::DisconnectedGraph { from: 0, to: 3 };
        assert_eq!(err.to_string(), "graph is disconnected: no path from 0 to 3");
    }

    #[test]
    fn test_io_error_keeps_source() {
        let err: SolverError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, SolverError::Io(_)));
        assert!(std::error::Error::source(&err).is_some());
    }
}
