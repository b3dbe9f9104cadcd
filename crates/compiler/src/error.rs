//! Compiler error type.
//!
//! Every fallible operation in the pipeline returns `Result<T, CompileError>`.
//! There is no structured recovery: the first error a stage produces is
//! propagated straight up to the driver, which prints it, cleans up the
//! in-progress output file and exits with status 1.

use std::fmt;

/// A fatal diagnostic, optionally tied to a source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    pub line: Option<usize>,
    pub message: String,
}

impl CompileError {
    pub fn new(message: impl Into<String>) -> Self {
        CompileError {
            line: None,
            message: message.into(),
        }
    }

    pub fn at(line: usize, message: impl Into<String>) -> Self {
        CompileError {
            line: Some(line),
            message: message.into(),
        }
    }

    /// Mirrors the original compiler's `fatald(s, d)`: message plus an
    /// integer (a token kind, a type code, ...).
    pub fn with_value(message: impl Into<String>, value: impl fmt::Display) -> Self {
        CompileError::new(format!("{}: {}", message.into(), value))
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{} on line {}", self.message, line),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for CompileError {}

pub type CResult<T> = Result<T, CompileError>;
