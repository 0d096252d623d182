//! Error type shared by the loader, the converter and the CLI.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Process exit codes, one per error kind.
pub const EXIT_OK: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_USAGE: i32 = 2;
pub const EXIT_INPUT_OPEN: i32 = 3;
pub const EXIT_OUTPUT_OPEN: i32 = 4;
pub const EXIT_MALFORMED_INPUT: i32 = 5;
pub const EXIT_INVALID_TOUR: i32 = 6;

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("usage error: {0}")]
    Usage(String),
    #[error("cannot open {} for reading: {source}", .path.display())]
    InputOpen { path: PathBuf, source: io::Error },
    #[error("cannot open {} for writing: {source}", .path.display())]
    OutputOpen { path: PathBuf, source: io::Error },
    #[error("malformed input: {0}")]
    MalformedInput(String),
    #[error("invalid tour: {0}")]
    InvalidTour(String),
    #[error("{failed} of {total} conversion(s) failed")]
    BatchFailed { failed: usize, total: usize },
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, ConvertError>;

impl ConvertError {
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage(message.into())
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedInput(message.into())
    }

    pub fn invalid_tour(message: impl Into<String>) -> Self {
        Self::InvalidTour(message.into())
    }

    pub fn input_open(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::InputOpen {
            path: path.into(),
            source,
        }
    }

    pub fn output_open(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::OutputOpen {
            path: path.into(),
            source,
        }
    }

    /// Exit status reported by the command-line tool for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            ConvertError::Usage(_) => EXIT_USAGE,
            ConvertError::InputOpen { .. } => EXIT_INPUT_OPEN,
            ConvertError::OutputOpen { .. } => EXIT_OUTPUT_OPEN,
            ConvertError::MalformedInput(_) => EXIT_MALFORMED_INPUT,
            ConvertError::InvalidTour(_) => EXIT_INVALID_TOUR,
            ConvertError::BatchFailed { .. } | ConvertError::Io(_) => EXIT_FAILURE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct() {
        let errors = [
            ConvertError::usage("x"),
            ConvertError::input_open("a.dat", io::Error::from(io::ErrorKind::NotFound)),
            ConvertError::output_open("a.atsp", io::Error::from(io::ErrorKind::PermissionDenied)),
            ConvertError::malformed("x"),
            ConvertError::invalid_tour("x"),
            ConvertError::Io(io::Error::from(io::ErrorKind::Other)),
        ];
        let mut codes: Vec<i32> = errors.iter().map(|e| e.exit_code()).collect();
        assert!(codes.iter().all(|&c| c != EXIT_OK));
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_open_error_message_names_path() {
        let err = ConvertError::input_open(
            "DAT/small/a.dat",
            io::Error::from(io::ErrorKind::NotFound),
        );
        assert!(err.to_string().contains("DAT/small/a.dat"));
        assert!(err.to_string().contains("for reading"));
    }
}
