//! Console progress for plan runs.

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use pvekit::{ProgressSink, StepEvent};

/// Drives a progress bar and prints one status line per finished step.
pub struct ConsoleProgress {
    bar: Option<ProgressBar>,
    verbose: bool,
}

impl ConsoleProgress {
    pub fn new(verbose: bool) -> Self {
        Self { bar: None, verbose }
    }

    fn bar(&mut self, total: usize) -> &ProgressBar {
        self.bar.get_or_insert_with(|| {
            let bar = ProgressBar::new(total as u64);
            if let Ok(style) = ProgressStyle::with_template("  {spinner:.cyan} [{pos}/{len}] {msg}") {
                bar.set_style(style);
            }
            bar.enable_steady_tick(std::time::Duration::from_millis(120));
            bar
        })
    }

    /// Clear the bar once the run is over
    pub fn finish(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}

impl ProgressSink for ConsoleProgress {
    fn on_event(&mut self, event: StepEvent<'_>) {
        let verbose = self.verbose;
        let bar = self.bar(event.total());

        match event.result() {
            None => bar.set_message(event.step().title().to_string()),
            Some(result) => {
                let symbol = if result.ok {
                    "✓".green()
                } else if result.is_timeout() {
                    "⏱".yellow()
                } else {
                    "✗".red()
                };
                bar.println(format!(
                    "  {} [{}/{}] {}",
                    symbol,
                    event.index(),
                    event.total(),
                    event.step().title()
                ));
                if (verbose || !result.ok) && !result.output.trim().is_empty() {
                    for line in result.output.trim_end().lines() {
                        bar.println(format!("      {}", line.dimmed()));
                    }
                }
                bar.inc(1);
            }
        }
    }
}

impl Drop for ConsoleProgress {
    fn drop(&mut self) {
        self.finish();
    }
}
