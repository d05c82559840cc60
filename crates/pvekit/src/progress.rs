//! Progress reporting for plan execution.

use crate::types::{PlanStep, StepResult};

/// A single progress notification from the executor.
///
/// Every attempted step produces exactly one `Starting` followed by one
/// `Finished`. Steps skipped after an abort produce neither. `index` is
/// 1-based.
#[derive(Debug, Clone, Copy)]
pub enum StepEvent<'a> {
    /// The step is about to run
    Starting {
        /// Position of the step (1-based)
        index: usize,
        /// Number of steps submitted
        total: usize,
        /// The step
        step: &'a PlanStep,
    },
    /// The step's outcome is known
    Finished {
        /// Position of the step (1-based)
        index: usize,
        /// Number of steps submitted
        total: usize,
        /// The step
        step: &'a PlanStep,
        /// Its outcome
        result: &'a StepResult,
    },
}

impl<'a> StepEvent<'a> {
    /// Position of the step (1-based).
    pub fn index(&self) -> usize {
        match self {
            Self::Starting { index, .. } | Self::Finished { index, .. } => *index,
        }
    }

    /// Number of steps submitted.
    pub fn total(&self) -> usize {
        match self {
            Self::Starting { total, .. } | Self::Finished { total, .. } => *total,
        }
    }

    /// The step this event is about.
    pub fn step(&self) -> &'a PlanStep {
        match self {
            Self::Starting { step, .. } | Self::Finished { step, .. } => *step,
        }
    }

    /// The outcome, present only on `Finished`.
    pub fn result(&self) -> Option<&'a StepResult> {
        match self {
            Self::Starting { .. } => None,
            Self::Finished { result, .. } => Some(*result),
        }
    }
}

/// Receives executor progress.
pub trait ProgressSink {
    /// Handle one event.
    fn on_event(&mut self, event: StepEvent<'_>);
}

impl<F> ProgressSink for F
where
    F: FnMut(StepEvent<'_>),
{
    fn on_event(&mut self, event: StepEvent<'_>) {
        self(event);
    }
}

/// Sink that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_event(&mut self, _event: StepEvent<'_>) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_accessors() {
        let step = PlanStep::new("Start", ["qm", "start", "900"]).unwrap();
        let result = StepResult::from_exit(0, "");

        let starting = StepEvent::Starting {
            index: 1,
            total: 2,
            step: &step,
        };
        assert_eq!(starting.index(), 1);
        assert_eq!(starting.total(), 2);
        assert_eq!(starting.step().title(), "Start");
        assert!(starting.result().is_none());

        let finished = StepEvent::Finished {
            index: 1,
            total: 2,
            step: &step,
            result: &result,
        };
        assert!(finished.result().is_some_and(|r| r.ok));
    }

    #[test]
    fn test_closure_is_a_sink() {
        let step = PlanStep::new("Start", ["qm", "start", "900"]).unwrap();
        let mut seen = Vec::new();
        {
            let mut sink = |event: StepEvent<'_>| seen.push(event.index());
            sink.on_event(StepEvent::Starting {
                index: 3,
                total: 3,
                step: &step,
            });
        }
        assert_eq!(seen, [3]);
    }
}
