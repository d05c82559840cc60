//! Plan files: the step list handed to the apply pipeline
//!
//! ```toml
//! vmid = 900
//! name = "macos-sequoia"
//!
//! [[steps]]
//! title = "Create VM shell"
//! argv = ["qm", "create", "900", "--name", "macos-sequoia"]
//! ```

use anyhow::{Context, Result};
use pvekit::PlanStep;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlanFile {
    /// Target VM; required for a live apply
    #[serde(default)]
    pub vmid: Option<u32>,

    /// Display name
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub steps: Vec<PlanStep>,
}

impl PlanFile {
    /// Load and validate a plan file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read plan {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid plan {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Human label used in headers and exported scripts
    pub fn label(&self) -> String {
        match (&self.name, self.vmid) {
            (Some(name), Some(vmid)) => format!("{name} (vmid {vmid})"),
            (Some(name), None) => name.clone(),
            (None, Some(vmid)) => format!("vmid {vmid}"),
            (None, None) => "unnamed plan".to_string(),
        }
    }
}
