//! `pveforge bundle` - pack transcripts and snapshots for support

use anyhow::{Context as AnyhowContext, Result, bail};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use crate::Context;
use crate::ui;

pub fn run(ctx: &Context) -> Result<()> {
    let sources = [
        ("logs", ctx.settings.log_dir()),
        ("snapshots", ctx.settings.snapshot_dir()),
    ];
    let bundle = export_bundle(&ctx.settings.bundle_dir(), &sources)?;

    let size = fs::metadata(&bundle).map(|m| m.len()).unwrap_or(0);
    ui::success(&format!(
        "Support bundle written to {} ({})",
        bundle.display(),
        ui::format_size(size)
    ));
    Ok(())
}

/// Write `support-bundle-<timestamp>.tar.gz` into `out_dir` holding each
/// existing source directory under its archive name.
pub fn export_bundle(out_dir: &Path, sources: &[(&str, PathBuf)]) -> Result<PathBuf> {
    let present: Vec<_> = sources.iter().filter(|(_, dir)| dir.is_dir()).collect();
    if present.is_empty() {
        bail!("Nothing to bundle: no transcript or snapshot directories exist yet");
    }

    fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;

    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    let path = out_dir.join(format!("support-bundle-{stamp}.tar.gz"));
    let file =
        File::create(&path).with_context(|| format!("Failed to create {}", path.display()))?;

    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (name, dir) in present {
        log::debug!("Bundling {} as {}", dir.display(), name);
        builder
            .append_dir_all(name, dir)
            .with_context(|| format!("Failed to add {} to bundle", dir.display()))?;
    }
    builder
        .into_inner()
        .and_then(GzEncoder::finish)
        .with_context(|| format!("Failed to finish {}", path.display()))?;

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use tempfile::TempDir;

    #[test]
    fn test_export_bundle() {
        let tmp = TempDir::new().unwrap();
        let logs = tmp.path().join("generated").join("logs");
        fs::create_dir_all(&logs).unwrap();
        fs::write(logs.join("apply-1.log"), "[1/1] Start | ok | rc=0 | ").unwrap();

        let out = tmp.path().join("generated");
        let bundle = export_bundle(
            &out,
            &[
                ("logs", logs.clone()),
                ("snapshots", tmp.path().join("missing")),
            ],
        )
        .unwrap();

        assert!(bundle.exists());
        let name = bundle.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("support-bundle-"));
        assert!(name.ends_with(".tar.gz"));

        let mut archive = tar::Archive::new(GzDecoder::new(File::open(&bundle).unwrap()));
        let entries: Vec<String> = archive
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().to_string_lossy().to_string())
            .collect();
        assert!(entries.iter().any(|e| e == "logs/apply-1.log"));
    }

    #[test]
    fn test_export_bundle_requires_sources() {
        let tmp = TempDir::new().unwrap();
        let result = export_bundle(tmp.path(), &[("logs", tmp.path().join("none"))]);
        assert!(result.is_err());
    }
}
