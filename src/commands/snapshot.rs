//! `pveforge snapshot` - capture a VM's configuration on demand

use anyhow::{Context as AnyhowContext, Result};
use pvekit::{NO_CONFIG_SENTINEL, ProxmoxAdapter, RollbackManager, rollback_hints};
use std::fs;

use crate::Context;
use crate::cli::SnapshotArgs;
use crate::ui;

pub fn run(ctx: &Context, args: SnapshotArgs) -> Result<()> {
    let adapter = ProxmoxAdapter::new().with_timeout(ctx.settings.command_timeout());
    let snapshot = RollbackManager::new(&adapter, ctx.settings.snapshot_dir())
        .create_snapshot(args.vmid)
        .context("Failed to write rollback snapshot")?;

    let captured = fs::read_to_string(snapshot.path())
        .map(|text| !text.contains(NO_CONFIG_SENTINEL))
        .unwrap_or(false);

    if captured {
        ui::success(&format!("Captured configuration of VM {}", args.vmid));
    } else {
        ui::warn(&format!("VM {} has no configuration to capture", args.vmid));
    }
    ui::kv("Snapshot", &snapshot.path().display().to_string());

    if !ctx.quiet {
        println!();
        for hint in rollback_hints(&snapshot) {
            ui::dim(&hint);
        }
    }

    Ok(())
}
