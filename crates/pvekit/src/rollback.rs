//! Pre-mutation snapshots and recovery guidance.
//!
//! The snapshot is taken with `qm config <vmid>` before any step runs. A
//! VM that does not exist yet is the normal first-run case, so a failed
//! capture still produces a snapshot file carrying [`NO_CONFIG_SENTINEL`].

use crate::adapter::ProxmoxAdapter;
use crate::error::{Error, Result};
use crate::executor::create_unique;
use crate::types::RollbackSnapshot;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Written to the snapshot file when no configuration could be captured.
pub const NO_CONFIG_SENTINEL: &str = "No existing VM config captured";

/// Captures VM configuration ahead of a live apply.
pub struct RollbackManager<'a> {
    adapter: &'a ProxmoxAdapter,
    snapshot_dir: PathBuf,
}

impl<'a> RollbackManager<'a> {
    /// Create a manager writing snapshots under `snapshot_dir`.
    pub fn new(adapter: &'a ProxmoxAdapter, snapshot_dir: impl Into<PathBuf>) -> Self {
        Self {
            adapter,
            snapshot_dir: snapshot_dir.into(),
        }
    }

    /// Directory receiving snapshot files.
    pub fn snapshot_dir(&self) -> &Path {
        &self.snapshot_dir
    }

    /// Capture the current configuration of `vmid`.
    ///
    /// Never fails because the query failed; only writing the snapshot
    /// file can produce an error.
    pub fn create_snapshot(&self, vmid: u32) -> Result<RollbackSnapshot> {
        let vmid_arg = vmid.to_string();
        let capture = self.adapter.qm(&["config", vmid_arg.as_str()])?;

        let content = if capture.ok {
            log::info!("captured existing config for VM {}", vmid);
            capture.output
        } else {
            log::info!(
                "no config captured for VM {} (rc={}), recording sentinel",
                vmid,
                capture.returncode
            );
            format!(
                "# {NO_CONFIG_SENTINEL}\n# vmid: {vmid}\n# query returned {}: {}\n",
                capture.returncode,
                capture.output.split_whitespace().collect::<Vec<_>>().join(" ")
            )
        };

        let dir = &self.snapshot_dir;
        fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;

        let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
        let (path, mut file) = create_unique(dir, &format!("vm-{vmid}-{stamp}"), "conf")?;
        file.write_all(content.as_bytes())
            .and_then(|()| file.flush())
            .map_err(|e| Error::io(&path, e))?;

        Ok(RollbackSnapshot::new(vmid, path))
    }
}

/// Operator instructions for restoring the state recorded in `snapshot`.
///
/// Guidance only; nothing is restored.
pub fn rollback_hints(snapshot: &RollbackSnapshot) -> [String; 3] {
    [
        format!(
            "Pre-apply configuration snapshot: {}",
            snapshot.path().display()
        ),
        format!(
            "To start over: qm stop {0} && qm destroy {0} --purge, then recreate VM {0} from the snapshot",
            snapshot.vmid()
        ),
        "Review the apply transcript before retrying; no changes were rolled back automatically."
            .to_string(),
    ]
}
