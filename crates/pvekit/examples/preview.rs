//! Example: preview a plan without touching the host
//!
//! Run with: cargo run -p pvekit --example preview

use pvekit::{ExecutionMode, Executor, PlanStep, StepEvent};

fn main() -> pvekit::Result<()> {
    let steps = vec![
        PlanStep::new("Create VM shell", ["qm", "create", "900", "--name", "macos-sequoia"])?,
        PlanStep::new("Attach recovery image", ["qm", "set", "900", "--ide0", "local:iso/sequoia-recovery.iso,media=cdrom"])?,
        PlanStep::new("Start VM", ["qm", "start", "900"])?,
    ];

    let log_dir = std::env::temp_dir().join("pvekit-preview");
    let mut on_event = |event: StepEvent<'_>| match event.result() {
        None => println!("[{}/{}] {}", event.index(), event.total(), event.step().title()),
        Some(result) => println!("    {}", result.output),
    };

    let result = Executor::new(&log_dir).apply_with_progress(&steps, ExecutionMode::Preview, &mut on_event)?;

    println!();
    println!("ok: {}", result.ok());
    println!("transcript: {}", result.log_path().display());

    Ok(())
}
