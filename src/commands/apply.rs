//! `pveforge apply` - preview or run a plan
//!
//! Live runs always capture a rollback snapshot first. A failing step
//! aborts the run, prints recovery hints and exits with code 4.

use anyhow::{Context as AnyhowContext, Result};
use colored::Colorize;
use pvekit::{
    ApplyResult, ExecutionMode, Executor, ProxmoxAdapter, RollbackManager, RollbackSnapshot,
    rollback_hints,
};
use serde::Serialize;
use std::time::Duration;

use super::CliError;
use super::plan::print_plan;
use crate::Context;
use crate::cli::ApplyArgs;
use crate::plan_file::PlanFile;
use crate::progress::ConsoleProgress;
use crate::ui;

/// Machine-readable result of `apply --json`
#[derive(Debug, Serialize)]
struct ApplyReport<'a> {
    mode: &'static str,
    result: &'a ApplyResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    snapshot: Option<&'a RollbackSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rollback_hints: Option<[String; 3]>,
}

pub fn run(ctx: &Context, args: ApplyArgs) -> Result<()> {
    let plan = PlanFile::load(&args.plan).map_err(|e| CliError::invalid(&e))?;
    let executor = Executor::new(ctx.settings.log_dir());

    if !args.execute {
        return preview(ctx, &plan, &executor, args.json);
    }

    let vmid = plan.vmid.ok_or_else(|| {
        CliError::InvalidInput("a live apply needs `vmid` in the plan file".to_string())
    })?;
    let timeout = args
        .timeout
        .map(Duration::from_secs)
        .unwrap_or_else(|| ctx.settings.command_timeout());

    // The plan is always shown before asking for confirmation
    if !args.json && (!ctx.quiet || !args.yes) {
        print_plan(&plan);
    }

    if !args.yes && !confirm_proceed()? {
        println!();
        println!("  {} Aborted", "✗".red());
        return Ok(());
    }

    let adapter = ProxmoxAdapter::new().with_timeout(timeout);

    let snapshot = RollbackManager::new(&adapter, ctx.settings.snapshot_dir())
        .create_snapshot(vmid)
        .context("Failed to write rollback snapshot")?;
    log::info!("Rollback snapshot at {}", snapshot.path().display());

    let mode = ExecutionMode::from_flag(true, Some(&adapter))?;
    let progress = if args.json {
        None
    } else {
        console_progress(ctx, ctx.verbose > 0)
    };
    let result = match progress {
        Some(mut progress) => {
            println!();
            ui::kv("Snapshot", &snapshot.path().display().to_string());
            println!();
            let result = executor.apply_with_progress(&plan.steps, mode, &mut progress)?;
            progress.finish();
            result
        }
        None => executor.apply(&plan.steps, mode)?,
    };

    let hints = (!result.ok()).then(|| rollback_hints(&snapshot));

    if args.json {
        print_json(&ApplyReport {
            mode: "live",
            result: &result,
            snapshot: Some(&snapshot),
            rollback_hints: hints.clone(),
        })?;
    } else {
        print_summary(&result, plan.steps.len());
        if let Some(hints) = &hints {
            println!();
            ui::warn("Recovery:");
            for hint in hints {
                println!("    • {}", hint);
            }
        }
    }

    match result.failure() {
        Some((index, failed)) => Err(CliError::ApplyFailed {
            index,
            total: plan.steps.len(),
            title: plan.steps[index - 1].title().to_string(),
            returncode: failed.returncode,
        }
        .into()),
        None => Ok(()),
    }
}

fn preview(ctx: &Context, plan: &PlanFile, executor: &Executor, json: bool) -> Result<()> {
    let mode = ExecutionMode::from_flag(false, None)?;

    if json {
        let result = executor.apply(&plan.steps, mode)?;
        return print_json(&ApplyReport {
            mode: "preview",
            result: &result,
            snapshot: None,
            rollback_hints: None,
        });
    }

    let Some(mut progress) = console_progress(ctx, true) else {
        executor.apply(&plan.steps, mode)?;
        return Ok(());
    };

    ui::header(&format!("Preview: {}", plan.label()));
    let result = executor.apply_with_progress(&plan.steps, mode, &mut progress)?;
    progress.finish();

    println!();
    ui::info("Preview only - nothing was executed. Re-run with --execute to apply.");
    ui::kv("Transcript", &result.log_path().display().to_string());
    Ok(())
}

/// Console progress for a run, or `None` when output is silenced
fn console_progress(ctx: &Context, show_output: bool) -> Option<ConsoleProgress> {
    (!ctx.quiet).then(|| ConsoleProgress::new(show_output))
}

fn print_json(report: &ApplyReport<'_>) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("Failed to serialize result")?;
    println!("{json}");
    Ok(())
}

/// Confirm with user
fn confirm_proceed() -> Result<bool> {
    use dialoguer::Confirm;

    let confirmed = Confirm::new()
        .with_prompt("Run these commands on this host?")
        .default(false)
        .interact()?;

    Ok(confirmed)
}

/// Print final summary
fn print_summary(result: &ApplyResult, total: usize) {
    println!();
    if result.ok() {
        println!("  {} Plan applied successfully!", "✓".green().bold());
    } else {
        println!("  {} Plan aborted", "✗".red().bold());
    }

    let attempted = result.results().len();
    println!("    • {} of {} steps run", attempted, total);
    if attempted < total {
        println!("    • {} steps {}", total - attempted, "not started".yellow());
    }
    if let Some((index, failed)) = result.failure() {
        let reason = if failed.is_timeout() { "timed out" } else { "failed" };
        println!(
            "    • step {} {} (rc={})",
            index,
            reason.red(),
            failed.returncode
        );
    }
    println!("    • transcript: {}", result.log_path().display());
}
