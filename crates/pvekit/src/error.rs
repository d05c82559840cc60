//! Error types for the apply pipeline.
//!
//! Step failures and timeouts are NOT errors: they are reported through
//! [`StepResult`](crate::StepResult) and [`ApplyResult`](crate::ApplyResult).
//! The variants here cover contract violations at the API boundary and
//! filesystem failures while writing transcripts or snapshots.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while building or running a plan.
#[derive(Debug, Error)]
pub enum Error {
    /// A command was given with no program and no arguments
    #[error("command argv must not be empty")]
    EmptyArgv,

    /// The program name (argv[0]) is blank
    #[error("command program name must not be blank")]
    EmptyProgram,

    /// A plan step was given without a title
    #[error("plan step title must not be empty")]
    EmptyTitle,

    /// Live execution was requested without a command adapter
    #[error("live execution requires a command adapter")]
    MissingAdapter,

    /// Reading or writing a transcript or snapshot failed
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        /// File or directory being accessed
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Wrap an I/O error with the path it happened at.
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error is a caller contract violation rather than an
    /// environment failure.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Self::EmptyArgv | Self::EmptyProgram | Self::EmptyTitle | Self::MissingAdapter
        )
    }
}

/// Result type for apply pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;
