//! Process execution boundary.
//!
//! The [`CommandRunner`] trait is the narrow capability the adapter, the
//! executor and the rollback manager depend on, allowing for different
//! implementations (real processes, scripted fakes in tests).

use crate::types::{SPAWN_FAILURE_RETURNCODE, StepResult, TIMEOUT_RETURNCODE};
use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// How often a running child is polled for exit.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// How long to wait for pipe readers after the child is gone.
///
/// Descendants that inherited the pipes can keep them open past the
/// child's exit; output they write after this window is dropped.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Executes one external command with a bounded wait.
///
/// Implementations must never panic or return early on command failure:
/// every terminal condition (exit, timeout, start failure) is folded into
/// the returned [`StepResult`]. `argv` is guaranteed non-empty by callers.
pub trait CommandRunner: Send + Sync {
    /// Run `argv` to completion or until `timeout` expires.
    fn execute(&self, argv: &[String], timeout: Duration) -> StepResult;
}

/// Runner that spawns real processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    /// Create a new process runner.
    pub fn new() -> Self {
        Self
    }
}

impl CommandRunner for ProcessRunner {
    fn execute(&self, argv: &[String], timeout: Duration) -> StepResult {
        let (program, args) = match argv.split_first() {
            Some(split) => split,
            None => return StepResult::failure(SPAWN_FAILURE_RETURNCODE, "empty command"),
        };

        log::debug!("exec: {} (timeout {:?})", argv.join(" "), timeout);

        let mut child = match Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                log::warn!("failed to start {}: {}", program, e);
                return StepResult::failure(
                    SPAWN_FAILURE_RETURNCODE,
                    format!("failed to start {program}: {e}"),
                );
            }
        };

        let stdout = child.stdout.take().map(PipeCapture::spawn);
        let stderr = child.stderr.take().map(PipeCapture::spawn);

        let waited = wait_with_deadline(&mut child, Instant::now() + timeout);

        let stdout = stdout.map(|p| p.finish(DRAIN_GRACE)).unwrap_or_default();
        let stderr = stderr.map(|p| p.finish(DRAIN_GRACE)).unwrap_or_default();
        let output = combine_output(&stdout, &stderr);

        match waited {
            Wait::Exited(status) => StepResult::from_exit(exit_code(status), output),
            Wait::TimedOut => {
                log::warn!("timed out after {:?}: {}", timeout, argv.join(" "));
                StepResult::failure(TIMEOUT_RETURNCODE, append_line(output, &timeout_marker(timeout)))
            }
            Wait::Failed(e) => StepResult::failure(
                -1,
                append_line(output, &format!("failed waiting for {program}: {e}")),
            ),
        }
    }
}

/// The marker placed in the output of a timed-out command.
pub fn timeout_marker(timeout: Duration) -> String {
    format!("command timed out after {timeout:?}")
}

enum Wait {
    Exited(ExitStatus),
    TimedOut,
    Failed(std::io::Error),
}

/// Poll the child until it exits or the deadline passes; kill and reap it
/// on expiry.
fn wait_with_deadline(child: &mut Child, deadline: Instant) -> Wait {
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Wait::Exited(status),
            Ok(None) => {
                let now = Instant::now();
                if now >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Wait::TimedOut;
                }
                thread::sleep(POLL_INTERVAL.min(deadline - now));
            }
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Wait::Failed(e);
            }
        }
    }
}

#[cfg(unix)]
fn exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|sig| 128 + sig))
        .unwrap_or(-1)
}

#[cfg(not(unix))]
fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

/// Background reader that accumulates a pipe into a shared buffer, so
/// whatever arrived before a timeout can still be reported.
struct PipeCapture {
    buf: Arc<Mutex<Vec<u8>>>,
    handle: JoinHandle<()>,
}

impl PipeCapture {
    fn spawn<R: Read + Send + 'static>(mut pipe: R) -> Self {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&buf);
        let handle = thread::spawn(move || {
            let mut chunk = [0u8; 8192];
            loop {
                match pipe.read(&mut chunk) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => match sink.lock() {
                        Ok(mut locked) => locked.extend_from_slice(&chunk[..n]),
                        Err(poisoned) => poisoned.into_inner().extend_from_slice(&chunk[..n]),
                    },
                }
            }
        });
        Self { buf, handle }
    }

    /// Wait up to `grace` for EOF, then return what was captured.
    fn finish(self, grace: Duration) -> String {
        let deadline = Instant::now() + grace;
        while !self.handle.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        if self.handle.is_finished() {
            let _ = self.handle.join();
        }

        let bytes = match self.buf.lock() {
            Ok(locked) => locked.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

/// Merge stdout and stderr; stderr follows on its own line when present.
pub(crate) fn combine_output(stdout: &str, stderr: &str) -> String {
    if stderr.is_empty() {
        stdout.to_string()
    } else if stdout.is_empty() {
        stderr.to_string()
    } else {
        append_line(stdout.to_string(), stderr)
    }
}

fn append_line(mut text: String, line: &str) -> String {
    if !text.is_empty() && !text.ends_with('\n') {
        text.push('\n');
    }
    text.push_str(line);
    text
}
