//! Export a plan as a standalone bash script.

use crate::types::{PlanStep, shell_quote};

/// Render `steps` as a bash script that stops at the first failing command.
///
/// `label` is written into the header comment only; every line of it is
/// commented out.
pub fn render_script(label: &str, steps: &[PlanStep]) -> String {
    let mut script = String::from("#!/usr/bin/env bash\n");
    for line in label.split(['\n', '\r']) {
        script.push_str(&format!("# {line}\n"));
    }
    script.push_str("set -euo pipefail\n");

    for (i, step) in steps.iter().enumerate() {
        let banner = format!("[{}/{}] {}", i + 1, steps.len(), step.title());
        script.push('\n');
        script.push_str(&format!("echo {}\n", shell_quote(&banner)));
        script.push_str(&step.command_line());
        script.push('\n');
    }

    script
}
