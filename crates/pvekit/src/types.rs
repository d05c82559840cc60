//! Plan and result value types exchanged between the pipeline components.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Return code reserved for "the command exceeded its time bound".
///
/// Matches the exit status of coreutils `timeout(1)` so downstream tooling
/// can tell timeouts apart from ordinary non-zero exits.
pub const TIMEOUT_RETURNCODE: i32 = 124;

/// Return code used when the program could not be started at all.
pub const SPAWN_FAILURE_RETURNCODE: i32 = 127;

/// Return code synthesized for steps in preview mode.
pub const PREVIEW_RETURNCODE: i32 = 0;

// ============================================================================
// PlanStep
// ============================================================================

/// One external command with a human-readable title.
///
/// Invariants are checked on construction and on deserialization:
/// the title is non-empty, argv is non-empty and argv[0] is not blank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawPlanStep")]
pub struct PlanStep {
    title: String,
    argv: Vec<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPlanStep {
    title: String,
    argv: Vec<String>,
}

impl TryFrom<RawPlanStep> for PlanStep {
    type Error = Error;

    fn try_from(raw: RawPlanStep) -> Result<Self> {
        Self::new(raw.title, raw.argv)
    }
}

impl PlanStep {
    /// Create a validated plan step.
    pub fn new<I, S>(title: impl Into<String>, argv: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let title = title.into();
        let argv: Vec<String> = argv.into_iter().map(Into::into).collect();

        if title.trim().is_empty() {
            return Err(Error::EmptyTitle);
        }
        validate_argv(&argv)?;

        Ok(Self { title, argv })
    }

    /// Display title of the step.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Full command vector, program first.
    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    /// The program to execute (argv[0]).
    pub fn program(&self) -> &str {
        &self.argv[0]
    }

    /// Arguments after the program name.
    pub fn args(&self) -> &[String] {
        &self.argv[1..]
    }

    /// The command rendered as a single shell-quoted line.
    pub fn command_line(&self) -> String {
        self.argv
            .iter()
            .map(|a| shell_quote(a))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for PlanStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.title, self.command_line())
    }
}

/// Check the argv contract shared by plan steps and direct adapter calls.
pub(crate) fn validate_argv<S: AsRef<str>>(argv: &[S]) -> Result<()> {
    match argv.first() {
        None => Err(Error::EmptyArgv),
        Some(program) if program.as_ref().trim().is_empty() => Err(Error::EmptyProgram),
        Some(_) => Ok(()),
    }
}

/// Quote a single argument for POSIX shells.
///
/// Arguments made only of safe characters are returned unchanged; anything
/// else is wrapped in single quotes with embedded quotes escaped.
pub fn shell_quote(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg.chars().all(|c| {
            c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '/' | ':' | '=' | ',' | '@' | '%' | '+')
        });

    if safe {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

// ============================================================================
// StepResult
// ============================================================================

/// Outcome of one attempted step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepResult {
    /// Whether the command exited with status 0
    pub ok: bool,
    /// Exit status, or [`TIMEOUT_RETURNCODE`] when the time bound expired
    pub returncode: i32,
    /// Combined stdout and stderr (possibly empty, never absent)
    pub output: String,
}

impl StepResult {
    /// Build a result from a completed process.
    pub fn from_exit(returncode: i32, output: impl Into<String>) -> Self {
        Self {
            ok: returncode == 0,
            returncode,
            output: output.into(),
        }
    }

    /// Build a failed result with an explicit return code.
    pub fn failure(returncode: i32, output: impl Into<String>) -> Self {
        Self {
            ok: false,
            returncode,
            output: output.into(),
        }
    }

    /// Build the synthesized success used by preview mode.
    pub fn preview(step: &PlanStep) -> Self {
        Self {
            ok: true,
            returncode: PREVIEW_RETURNCODE,
            output: format!("preview: {}", step.command_line()),
        }
    }

    /// Whether this outcome reports an expired time bound.
    pub fn is_timeout(&self) -> bool {
        !self.ok && self.returncode == TIMEOUT_RETURNCODE
    }
}

// ============================================================================
// ApplyResult
// ============================================================================

/// Aggregate outcome of one executor run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplyResult {
    ok: bool,
    results: Vec<StepResult>,
    log_path: PathBuf,
}

impl ApplyResult {
    /// Aggregate step outcomes; `ok` is derived, never supplied.
    pub(crate) fn new(results: Vec<StepResult>, log_path: PathBuf) -> Self {
        let ok = results.iter().all(|r| r.ok);
        Self {
            ok,
            results,
            log_path,
        }
    }

    /// True iff every attempted step succeeded.
    pub fn ok(&self) -> bool {
        self.ok
    }

    /// Outcomes of the attempted steps, in order.
    pub fn results(&self) -> &[StepResult] {
        &self.results
    }

    /// Location of the run transcript.
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// The failing step outcome and its 1-based index, if the run aborted.
    pub fn failure(&self) -> Option<(usize, &StepResult)> {
        self.results
            .iter()
            .enumerate()
            .find(|(_, r)| !r.ok)
            .map(|(i, r)| (i + 1, r))
    }

    /// Consume the result, returning the step outcomes.
    pub fn into_results(self) -> Vec<StepResult> {
        self.results
    }
}

// ============================================================================
// RollbackSnapshot
// ============================================================================

/// Handle to a captured pre-mutation configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RollbackSnapshot {
    vmid: u32,
    path: PathBuf,
}

impl RollbackSnapshot {
    /// Reference an existing snapshot file.
    pub fn new(vmid: u32, path: impl Into<PathBuf>) -> Self {
        Self {
            vmid,
            path: path.into(),
        }
    }

    /// Identifier of the target VM.
    pub fn vmid(&self) -> u32 {
        self.vmid
    }

    /// Location of the snapshot file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
