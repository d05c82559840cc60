//! Proxmox VE command adapter.
//!
//! Wraps a [`CommandRunner`] with a default time bound and convenience
//! entry points for the host-management binaries.

use crate::error::Result;
use crate::runner::{CommandRunner, ProcessRunner};
use crate::types::{StepResult, validate_argv};
use std::time::Duration;

/// Default bound on a single external command.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// VM control binary.
pub const QM: &str = "qm";
/// Storage manager binary.
pub const PVESM: &str = "pvesm";
/// API shell binary.
pub const PVESH: &str = "pvesh";

/// Executes external commands on the hypervisor host.
///
/// A single call is a single attempt: no retries and no interpretation of
/// what the command means.
pub struct ProxmoxAdapter {
    runner: Box<dyn CommandRunner>,
    timeout: Duration,
}

impl ProxmoxAdapter {
    /// Create an adapter that spawns real processes with [`DEFAULT_TIMEOUT`].
    pub fn new() -> Self {
        Self::with_runner(Box::new(ProcessRunner::new()))
    }

    /// Create an adapter over a custom runner (useful for testing).
    pub fn with_runner(runner: Box<dyn CommandRunner>) -> Self {
        Self {
            runner,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Replace the default time bound used by [`run`](Self::run).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The default time bound applied to each command.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run a command with the adapter's default time bound.
    ///
    /// Non-zero exits, timeouts and start failures are reported in the
    /// returned [`StepResult`]; only an empty argv is an error.
    pub fn run<S: AsRef<str>>(&self, argv: &[S]) -> Result<StepResult> {
        self.run_with_timeout(argv, self.timeout)
    }

    /// Run a command with an explicit time bound.
    pub fn run_with_timeout<S: AsRef<str>>(
        &self,
        argv: &[S],
        timeout: Duration,
    ) -> Result<StepResult> {
        validate_argv(argv)?;
        let argv: Vec<String> = argv.iter().map(|a| a.as_ref().to_string()).collect();
        Ok(self.runner.execute(&argv, timeout))
    }

    /// Run `qm` with the given arguments.
    pub fn qm<S: AsRef<str>>(&self, args: &[S]) -> Result<StepResult> {
        self.run(&prepend(QM, args))
    }

    /// Run `pvesm` with the given arguments.
    pub fn pvesm<S: AsRef<str>>(&self, args: &[S]) -> Result<StepResult> {
        self.run(&prepend(PVESM, args))
    }

    /// Run `pvesh` with the given arguments.
    pub fn pvesh<S: AsRef<str>>(&self, args: &[S]) -> Result<StepResult> {
        self.run(&prepend(PVESH, args))
    }
}

impl Default for ProxmoxAdapter {
    fn default() -> Self {
        Self::new()
    }
}

fn prepend<S: AsRef<str>>(binary: &str, args: &[S]) -> Vec<String> {
    std::iter::once(binary.to_string())
        .chain(args.iter().map(|a| a.as_ref().to_string()))
        .collect()
}


#[cfg(test)]
mod tests {
    use super::testing::scripted_adapter;
    use super::*;
    use crate::error::Error;
    use crate::types::TIMEOUT_RETURNCODE;

    #[test]
    fn test_run_passes_outcome_through() {
        let (adapter, calls) = scripted_adapter(vec![StepResult::from_exit(1, "fail")]);
        let result = adapter.run(&["qm", "status", "999"]).unwrap();
        assert!(!result.ok);
        assert_eq!(result.returncode, 1);
        assert!(result.output.contains("fail"));
        assert_eq!(calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_run_uses_default_timeout() {
        let (adapter, calls) = scripted_adapter(vec![]);
        adapter.run(&["qm", "list"]).unwrap();
        assert_eq!(calls.lock().unwrap()[0].1, DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_with_timeout_overrides_default() {
        let (adapter, calls) = scripted_adapter(vec![]);
        let adapter = adapter.with_timeout(Duration::from_secs(5));
        adapter.run(&["qm", "list"]).unwrap();
        adapter
            .run_with_timeout(&["qm", "list"], Duration::from_millis(50))
            .unwrap();

        let calls = calls.lock().unwrap();
        assert_eq!(calls[0].1, Duration::from_secs(5));
        assert_eq!(calls[1].1, Duration::from_millis(50));
    }

    #[test]
    fn test_timeout_outcome_is_not_an_error() {
        let (adapter, _) = scripted_adapter(vec![StepResult::failure(
            TIMEOUT_RETURNCODE,
            "partial\ncommand timed out after 300s",
        )]);
        let result = adapter.run(&["qm", "status", "900"]).unwrap();
        assert!(!result.ok);
        assert_eq!(result.returncode, 124);
        assert!(result.output.contains("timed out"));
    }

    #[test]
    fn test_run_rejects_empty_argv() {
        let (adapter, calls) = scripted_adapter(vec![]);
        let empty: [&str; 0] = [];
        assert!(matches!(adapter.run(&empty), Err(Error::EmptyArgv)));
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_pvesm_wraps_binary() {
        let (adapter, calls) = scripted_adapter(vec![]);
        let result = adapter.pvesm(&["status"]).unwrap();
        assert!(result.ok);
        assert_eq!(calls.lock().unwrap()[0].0, ["pvesm", "status"]);
    }

    #[test]
    fn test_pvesh_wraps_binary() {
        let (adapter, calls) = scripted_adapter(vec![]);
        adapter.pvesh(&["get", "/cluster/nextid"]).unwrap();
        assert_eq!(calls.lock().unwrap()[0].0, ["pvesh", "get", "/cluster/nextid"]);
    }

    #[test]
    fn test_qm_wraps_binary() {
        let (adapter, calls) = scripted_adapter(vec![]);
        adapter.qm(&["config", "900"]).unwrap();
        assert_eq!(calls.lock().unwrap()[0].0, ["qm", "config", "900"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_real_adapter_times_out() {
        let adapter = ProxmoxAdapter::new().with_timeout(Duration::from_millis(200));
        let result = adapter.run(&["sleep", "5"]).unwrap();
        assert_eq!(result.returncode, TIMEOUT_RETURNCODE);
        assert!(result.output.contains("timed out"));
    }
}
