//! # pvekit
//!
//! Apply pipeline for provisioning virtual machines on a Proxmox VE host.
//!
//! A provisioning run is an ordered list of [`PlanStep`]s, each one external
//! command. This crate executes such a list while guarding the host against
//! half-applied changes:
//!
//! - **Snapshot first**: [`RollbackManager::create_snapshot`] records the
//!   VM's current configuration (or the fact that there is none) before
//!   anything is mutated.
//! - **Strict order, stop on failure**: the [`Executor`] runs one step at a
//!   time and aborts at the first step that does not succeed. Later steps
//!   are never started.
//! - **Bounded waits**: every command runs under a timeout. An expired
//!   timeout is reported as return code [`TIMEOUT_RETURNCODE`] (124), never
//!   as a panic or error.
//! - **Always a record**: each run writes a transcript file, even when it
//!   aborts or has zero steps.
//!
//! ## Example
//!
//! ```no_run
//! use pvekit::{ExecutionMode, Executor, PlanStep, ProxmoxAdapter, RollbackManager, rollback_hints};
//!
//! let steps = vec![
//!     PlanStep::new("Create VM", ["qm", "create", "900", "--name", "macos-sequoia"])?,
//!     PlanStep::new("Start VM", ["qm", "start", "900"])?,
//! ];
//!
//! let adapter = ProxmoxAdapter::new();
//! let snapshot = RollbackManager::new(&adapter, "generated/snapshots").create_snapshot(900)?;
//!
//! let result = Executor::new("generated/logs").apply(&steps, ExecutionMode::Live(&adapter))?;
//! if !result.ok() {
//!     for hint in rollback_hints(&snapshot) {
//!         eprintln!("{hint}");
//!     }
//! }
//! # Ok::<(), pvekit::Error>(())
//! ```
//!
//! ## Preview mode
//!
//! [`ExecutionMode::Preview`] walks the same steps, fires the same progress
//! events and writes the same transcript, but invokes nothing and reports
//! every step as successful. It explains a plan; it does not validate it.

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Command adapter for the hypervisor binaries.
pub mod adapter;
/// Error types for the apply pipeline.
pub mod error;
/// Sequential plan executor.
pub mod executor;
/// Progress events and sinks.
pub mod progress;
/// Snapshots and recovery guidance.
pub mod rollback;
/// Process execution boundary.
pub mod runner;
/// Bash script export.
pub mod script;
/// Plan and result value types.
pub mod types;

pub use adapter::{DEFAULT_TIMEOUT, ProxmoxAdapter};
pub use error::{Error, Result};
pub use executor::{ExecutionMode, Executor};
pub use progress::{NoProgress, ProgressSink, StepEvent};
pub use rollback::{NO_CONFIG_SENTINEL, RollbackManager, rollback_hints};
pub use runner::{CommandRunner, ProcessRunner};
pub use script::render_script;
pub use types::{
    ApplyResult, PREVIEW_RETURNCODE, PlanStep, RollbackSnapshot, SPAWN_FAILURE_RETURNCODE,
    StepResult, TIMEOUT_RETURNCODE, shell_quote,
};
