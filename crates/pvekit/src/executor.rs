//! Plan executor.
//!
//! Runs steps strictly in order, stopping at the first step whose outcome
//! is not ok. Every run writes a transcript with one line per attempted
//! step; the file exists on return whatever the outcome.

use crate::adapter::ProxmoxAdapter;
use crate::error::{Error, Result};
use crate::progress::{NoProgress, ProgressSink, StepEvent};
use crate::types::{ApplyResult, PlanStep, StepResult};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Maximum characters of step output kept in a transcript line.
const EXCERPT_CHARS: usize = 240;

/// How steps are carried out.
#[derive(Clone, Copy)]
pub enum ExecutionMode<'a> {
    /// Report what would run; nothing is invoked and every step succeeds
    Preview,
    /// Invoke each step through the adapter
    Live(&'a ProxmoxAdapter),
}

impl<'a> ExecutionMode<'a> {
    /// Select a mode from an `execute` flag.
    ///
    /// Live mode without an adapter is rejected.
    pub fn from_flag(execute: bool, adapter: Option<&'a ProxmoxAdapter>) -> Result<Self> {
        match (execute, adapter) {
            (false, _) => Ok(Self::Preview),
            (true, Some(adapter)) => Ok(Self::Live(adapter)),
            (true, None) => Err(Error::MissingAdapter),
        }
    }

    /// Whether this mode invokes external commands.
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live(_))
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Preview => "preview",
            Self::Live(_) => "live",
        }
    }
}

/// Drives plan steps to completion or first failure.
#[derive(Debug, Clone)]
pub struct Executor {
    log_dir: PathBuf,
}

impl Executor {
    /// Create an executor that writes transcripts under `log_dir`.
    ///
    /// The directory is created on first use.
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
        }
    }

    /// Directory receiving transcripts.
    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Run `steps` without progress reporting.
    pub fn apply(&self, steps: &[PlanStep], mode: ExecutionMode<'_>) -> Result<ApplyResult> {
        self.apply_with_progress(steps, mode, &mut NoProgress)
    }

    /// Run `steps`, reporting each one to `progress`.
    ///
    /// Step failures are reported in the returned [`ApplyResult`]; the only
    /// error is failing to write the transcript.
    pub fn apply_with_progress(
        &self,
        steps: &[PlanStep],
        mode: ExecutionMode<'_>,
        progress: &mut dyn ProgressSink,
    ) -> Result<ApplyResult> {
        let total = steps.len();
        let mut transcript = Transcript::create(&self.log_dir)?;

        log::info!(
            "applying {} step(s) in {} mode, transcript {}",
            total,
            mode.label(),
            transcript.path.display()
        );

        let mut results = Vec::with_capacity(total);

        for (offset, step) in steps.iter().enumerate() {
            let index = offset + 1;
            progress.on_event(StepEvent::Starting { index, total, step });

            let result = match mode {
                ExecutionMode::Preview => StepResult::preview(step),
                ExecutionMode::Live(adapter) => adapter.run(step.argv())?,
            };

            transcript.record(index, total, step, &result)?;
            progress.on_event(StepEvent::Finished {
                index,
                total,
                step,
                result: &result,
            });

            let (ok, returncode) = (result.ok, result.returncode);
            results.push(result);

            if !ok {
                log::warn!(
                    "step {}/{} '{}' failed (rc={}), aborting",
                    index,
                    total,
                    step.title(),
                    returncode
                );
                break;
            }
        }

        let outcome = ApplyResult::new(results, transcript.path);

        log::info!(
            "apply {}: {}/{} step(s) attempted",
            if outcome.ok() { "completed" } else { "aborted" },
            outcome.results().len(),
            total
        );

        Ok(outcome)
    }
}

/// Line-oriented run log, flushed after every record.
struct Transcript {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl Transcript {
    fn create(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;

        let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
        let (path, file) = create_unique(dir, &format!("apply-{stamp}"), "log")?;

        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    /// Append one step record and flush it before the next step starts.
    fn record(&mut self, index: usize, total: usize, step: &PlanStep, result: &StepResult) -> Result<()> {
        writeln!(self.writer, "{}", format_record(index, total, step, result))
            .and_then(|()| self.writer.flush())
            .map_err(|e| Error::io(&self.path, e))
    }
}

/// One transcript record: index, title, flag, return code and an excerpt.
///
/// Always a single line, even when the title or output span several.
fn format_record(index: usize, total: usize, step: &PlanStep, result: &StepResult) -> String {
    format!(
        "[{}/{}] {} | {} | rc={} | {}",
        index,
        total,
        single_line(step.title()),
        if result.ok { "ok" } else { "FAIL" },
        result.returncode,
        excerpt(&result.output)
    )
}

/// Collapse every whitespace run, newlines included, to one space.
fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Collapse whitespace to single spaces and cap the length.
fn excerpt(output: &str) -> String {
    let collapsed = single_line(output);
    if collapsed.chars().count() <= EXCERPT_CHARS {
        collapsed
    } else {
        let mut cut: String = collapsed.chars().take(EXCERPT_CHARS).collect();
        cut.push_str("...");
        cut
    }
}

/// Create `<stem>.<ext>` in `dir`, adding a counter if the name is taken.
pub(crate) fn create_unique(dir: &Path, stem: &str, ext: &str) -> Result<(PathBuf, File)> {
    let mut attempt = 0u32;
    loop {
        let name = if attempt == 0 {
            format!("{stem}.{ext}")
        } else {
            format!("{stem}-{attempt}.{ext}")
        };
        let path = dir.join(name);

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => attempt += 1,
            Err(e) => return Err(Error::io(path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::testing::scripted_adapter;
    use crate::runner::CommandRunner;
    use crate::types::TIMEOUT_RETURNCODE;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tempfile::TempDir;

    fn steps(n: usize) -> Vec<PlanStep> {
        (1..=n)
            .map(|i| PlanStep::new(format!("Step {i}"), ["echo", &i.to_string()]).unwrap())
            .collect()
    }

    fn transcript_lines(path: &Path) -> Vec<String> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(String::from)
            .collect()
    }

    /// Records (index, has_result) for every event.
    fn recorder(log: &mut Vec<(usize, bool)>) -> impl FnMut(StepEvent<'_>) + '_ {
        move |event| log.push((event.index(), event.result().is_some()))
    }

    #[test]
    fn test_preview_never_invokes_runner() {
        let tmp = TempDir::new().unwrap();
        let (adapter, calls) = scripted_adapter(vec![]);
        let plan = steps(3);

        let mode = ExecutionMode::from_flag(false, Some(&adapter)).unwrap();
        let result = Executor::new(tmp.path()).apply(&plan, mode).unwrap();

        assert!(result.ok());
        assert_eq!(result.results().len(), 3);
        assert!(result.results().iter().all(|r| r.ok));
        assert!(result.results()[0].output.starts_with("preview: echo 1"));
        assert!(calls.lock().unwrap().is_empty());
        assert!(result.log_path().exists());
    }

    #[test]
    fn test_preview_reports_success_for_commands_that_would_fail() {
        let tmp = TempDir::new().unwrap();
        let plan = vec![PlanStep::new("Bogus", ["definitely-not-a-binary", "--nope"]).unwrap()];
        let result = Executor::new(tmp.path())
            .apply(&plan, ExecutionMode::Preview)
            .unwrap();
        assert!(result.ok());
    }

    #[test]
    fn test_preview_with_callback_fires_twice_per_step() {
        let tmp = TempDir::new().unwrap();
        let plan = steps(1);
        let mut log = Vec::new();

        let result = Executor::new(tmp.path())
            .apply_with_progress(&plan, ExecutionMode::Preview, &mut recorder(&mut log))
            .unwrap();

        assert!(result.ok());
        assert_eq!(log, [(1, false), (1, true)]);
    }

    #[test]
    fn test_zero_steps_is_vacuously_ok_and_writes_transcript() {
        let tmp = TempDir::new().unwrap();
        let (adapter, _) = scripted_adapter(vec![]);
        let result = Executor::new(tmp.path())
            .apply(&[], ExecutionMode::Live(&adapter))
            .unwrap();
        assert!(result.ok());
        assert!(result.results().is_empty());
        assert!(result.log_path().exists());
        assert!(transcript_lines(result.log_path()).is_empty());
    }

    #[test]
    fn test_live_all_success() {
        let tmp = TempDir::new().unwrap();
        let (adapter, calls) = scripted_adapter(vec![]);
        let plan = steps(3);
        let mut log = Vec::new();

        let result = Executor::new(tmp.path())
            .apply_with_progress(&plan, ExecutionMode::Live(&adapter), &mut recorder(&mut log))
            .unwrap();

        assert!(result.ok());
        assert_eq!(result.results().len(), 3);
        assert_eq!(transcript_lines(result.log_path()).len(), 3);
        assert_eq!(log.len(), 6);
        assert_eq!(calls.lock().unwrap().len(), 3);
        assert_eq!(calls.lock().unwrap()[2].0, ["echo", "3"]);
    }

    #[test]
    fn test_live_failure_aborts_remaining_steps() {
        let tmp = TempDir::new().unwrap();
        let (adapter, calls) = scripted_adapter(vec![
            StepResult::from_exit(0, "ok"),
            StepResult::from_exit(1, "error"),
        ]);
        let plan = steps(3);
        let mut log = Vec::new();

        let result = Executor::new(tmp.path())
            .apply_with_progress(&plan, ExecutionMode::Live(&adapter), &mut recorder(&mut log))
            .unwrap();

        assert!(!result.ok());
        assert_eq!(result.results().len(), 2);
        assert!(result.results()[0].ok);
        assert!(!result.results()[1].ok);
        assert_eq!(calls.lock().unwrap().len(), 2);
        assert_eq!(log, [(1, false), (1, true), (2, false), (2, true)]);
        assert!(log.iter().all(|(index, _)| *index != 3));

        let lines = transcript_lines(result.log_path());
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("Step 2"));
        assert!(lines[1].contains("FAIL"));
        assert!(lines[1].contains("rc=1"));
    }

    #[test]
    fn test_first_step_failure_yields_single_result() {
        let tmp = TempDir::new().unwrap();
        let (adapter, _) = scripted_adapter(vec![StepResult::from_exit(2, "")]);
        let result = Executor::new(tmp.path())
            .apply(&steps(4), ExecutionMode::Live(&adapter))
            .unwrap();
        assert!(!result.ok());
        assert_eq!(result.results().len(), 1);
        assert_eq!(result.failure().map(|(i, _)| i), Some(1));
    }

    #[test]
    fn test_timeout_is_a_failing_step() {
        let tmp = TempDir::new().unwrap();
        let (adapter, _) = scripted_adapter(vec![StepResult::failure(
            TIMEOUT_RETURNCODE,
            "command timed out after 300s",
        )]);
        let result = Executor::new(tmp.path())
            .apply(&steps(2), ExecutionMode::Live(&adapter))
            .unwrap();
        assert!(!result.ok());
        assert_eq!(result.results().len(), 1);
        assert!(result.results()[0].is_timeout());
        assert!(transcript_lines(result.log_path())[0].contains("rc=124"));
    }

    #[test]
    fn test_transcript_records_each_attempted_step_in_order() {
        let tmp = TempDir::new().unwrap();
        let (adapter, _) = scripted_adapter(vec![
            StepResult::from_exit(0, "line one\nline two"),
            StepResult::from_exit(0, ""),
        ]);
        let result = Executor::new(tmp.path())
            .apply(&steps(2), ExecutionMode::Live(&adapter))
            .unwrap();

        let lines = transcript_lines(result.log_path());
        assert_eq!(lines[0], "[1/2] Step 1 | ok | rc=0 | line one line two");
        assert!(lines[1].starts_with("[2/2] Step 2 | ok | rc=0"));
    }

    #[test]
    fn test_multiline_title_stays_on_one_transcript_line() {
        let tmp = TempDir::new().unwrap();
        let plan = vec![
            PlanStep::new("Create\nVM", ["qm", "create", "900"]).unwrap(),
            PlanStep::new("Start", ["qm", "start", "900"]).unwrap(),
        ];
        let result = Executor::new(tmp.path())
            .apply(&plan, ExecutionMode::Preview)
            .unwrap();

        let lines = transcript_lines(result.log_path());
        assert_eq!(lines.len(), result.results().len());
        assert_eq!(lines[0], "[1/2] Create VM | ok | rc=0 | preview: qm create 900");
        assert!(lines[1].starts_with("[2/2] Start | ok"));
    }

    /// Counts transcript lines already on disk whenever a command runs.
    struct TranscriptWatcher {
        log_dir: PathBuf,
        seen: Arc<Mutex<Vec<usize>>>,
    }

    impl CommandRunner for TranscriptWatcher {
        fn execute(&self, _argv: &[String], _timeout: Duration) -> StepResult {
            let lines = fs::read_dir(&self.log_dir)
                .unwrap()
                .map(|entry| transcript_lines(&entry.unwrap().path()).len())
                .sum();
            self.seen.lock().unwrap().push(lines);
            StepResult::from_exit(0, "ok")
        }
    }

    #[test]
    fn test_step_record_is_flushed_before_next_step_runs() {
        let tmp = TempDir::new().unwrap();
        let log_dir = tmp.path().join("logs");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let adapter = ProxmoxAdapter::with_runner(Box::new(TranscriptWatcher {
            log_dir: log_dir.clone(),
            seen: Arc::clone(&seen),
        }));

        let result = Executor::new(&log_dir)
            .apply(&steps(3), ExecutionMode::Live(&adapter))
            .unwrap();

        assert!(result.ok());
        assert_eq!(*seen.lock().unwrap(), [0, 1, 2]);
        assert_eq!(transcript_lines(result.log_path()).len(), 3);
    }

    #[test]
    fn test_transcript_names_do_not_collide() {
        let tmp = TempDir::new().unwrap();
        let executor = Executor::new(tmp.path());
        let first = executor.apply(&steps(1), ExecutionMode::Preview).unwrap();
        let second = executor.apply(&steps(1), ExecutionMode::Preview).unwrap();
        assert_ne!(first.log_path(), second.log_path());
        assert!(first.log_path().exists());
        assert!(second.log_path().exists());
    }

    #[test]
    fn test_log_dir_is_created() {
        let tmp = TempDir::new().unwrap();
        let nested = tmp.path().join("generated").join("logs");
        let result = Executor::new(&nested)
            .apply(&steps(1), ExecutionMode::Preview)
            .unwrap();
        assert!(result.log_path().starts_with(&nested));
    }

    #[test]
    fn test_mode_from_flag() {
        let (adapter, _) = scripted_adapter(vec![]);
        assert!(!ExecutionMode::from_flag(false, None).unwrap().is_live());
        assert!(ExecutionMode::from_flag(true, Some(&adapter)).unwrap().is_live());
        assert!(matches!(
            ExecutionMode::from_flag(true, None),
            Err(Error::MissingAdapter)
        ));
    }

    #[test]
    fn test_excerpt_is_bounded() {
        let long = "x".repeat(1000);
        let cut = excerpt(&long);
        assert_eq!(cut.chars().count(), EXCERPT_CHARS + 3);
        assert!(cut.ends_with("..."));
        assert_eq!(excerpt("  a \n\t b  "), "a b");
    }
}
