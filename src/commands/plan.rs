//! `pveforge plan` - show a plan and optionally export it as a script

use anyhow::{Context as AnyhowContext, Result};
use std::fs;
use std::path::Path;

use super::CliError;
use crate::Context;
use crate::cli::PlanArgs;
use crate::plan_file::PlanFile;
use crate::ui;

pub fn run(ctx: &Context, args: PlanArgs) -> Result<()> {
    let plan = PlanFile::load(&args.plan).map_err(|e| CliError::invalid(&e))?;

    if !ctx.quiet {
        print_plan(&plan);
    }

    if let Some(out) = &args.script_out {
        write_script(&plan, out)?;
        ui::success(&format!("Script written to {}", out.display()));
    }

    Ok(())
}

/// Print the numbered steps with their command lines
pub fn print_plan(plan: &PlanFile) {
    ui::header(&format!("Plan: {}", plan.label()));

    if plan.steps.is_empty() {
        ui::dim("(no steps)");
        return;
    }

    let total = plan.steps.len();
    for (i, step) in plan.steps.iter().enumerate() {
        ui::step(i + 1, total, step.title());
        ui::dim(&step.command_line());
    }
}

/// Render the plan as a bash script and make it executable
pub fn write_script(plan: &PlanFile, out: &Path) -> Result<()> {
    let script = pvekit::render_script(&plan.label(), &plan.steps);

    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(out, script).with_context(|| format!("Failed to write {}", out.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(out, fs::Permissions::from_mode(0o755))
            .with_context(|| format!("Failed to mark {} executable", out.display()))?;
    }

    Ok(())
}
