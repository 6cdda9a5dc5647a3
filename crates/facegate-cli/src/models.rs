//! `facegate check-models`: verifies the landmark model the engine loads at start-up.

use std::path::PathBuf;

use anyhow::{bail, Result};
use facegate_models::{ModelIntegrityError, LANDMARK_MODEL};
use facegate_service::Config;

/// The flag wins over the configured (`FACEGATE_MODEL_DIR` or data dir) directory.
fn resolve_model_dir(flag: Option<String>, config: &Config) -> PathBuf {
    flag.map(PathBuf::from)
        .unwrap_or_else(|| config.model_dir.clone())
}

pub fn run(model_dir: Option<String>) -> Result<()> {
    let config = Config::from_env();
    let dir = resolve_model_dir(model_dir, &config);

    println!("Model directory: {}", dir.display());

    match facegate_models::inspect_landmark_model(&dir, config.landmark_model_sha256.as_deref()) {
        Ok(report) => {
            let verdict = if report.pinned { "checksum ok" } else { "not pinned" };
            println!("  {} present, {} bytes ({verdict})", LANDMARK_MODEL.name, report.bytes);
            println!("  sha256: {}", report.sha256);
            Ok(())
        }
        Err(ModelIntegrityError::Missing(_)) => {
            println!("  {} missing", LANDMARK_MODEL.name);
            println!("  run `facegate setup-models` to install it");
            bail!("landmark model not installed; liveness checks will be skipped or refused")
        }
        Err(e) => Err(e.into()),
    }
}
