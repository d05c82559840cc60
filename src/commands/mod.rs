pub mod apply;
pub mod bundle;
pub mod plan;
pub mod snapshot;

use thiserror::Error;

/// Failures that map to a specific process exit code
#[derive(Debug, Error)]
pub enum CliError {
    /// The plan file or configuration could not be used
    #[error("{0}")]
    InvalidInput(String),

    /// A live apply stopped at a failing step
    #[error("apply failed at step {index}/{total}: {title} (rc={returncode})")]
    ApplyFailed {
        index: usize,
        total: usize,
        title: String,
        returncode: i32,
    },
}

impl CliError {
    pub fn invalid(err: &anyhow::Error) -> Self {
        Self::InvalidInput(format!("{err:#}"))
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            Self::InvalidInput(_) => 2,
            Self::ApplyFailed { .. } => 4,
        }
    }
}

/// Exit code for an error returned by a command
pub fn exit_code(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<CliError>()
        .map(CliError::exit_code)
        .unwrap_or(1)
}
