//! Enrollment administration: `status`, `list`, `revoke`, `reset`, `export`.

use std::fs;

use anyhow::{bail, Context, Result};
use serde::Serialize;

use facegate_service::{Config, EnrollmentInfo, EnrollmentStore};

async fn open_store(config: &Config) -> Result<EnrollmentStore> {
    EnrollmentStore::open(&config.db_path)
        .await
        .with_context(|| format!("failed to open enrollment store {}", config.db_path.display()))
}

pub async fn status() -> Result<()> {
    let config = Config::from_env();
    let store = open_store(&config).await?;
    let enrolled = store.count_all().await.context("failed to count enrollments")?;

    let landmark_model = match facegate_models::check_landmark_model(
        &config.model_dir,
        config.landmark_model_sha256.as_deref(),
    ) {
        Ok(path) => serde_json::json!({ "loaded": true, "path": path }),
        Err(e) => serde_json::json!({ "loaded": false, "reason": e.to_string() }),
    };

    let report = serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "db_path": config.db_path,
        "enrolled": enrolled,
        "landmark_model": landmark_model,
        "match_tolerance": config.match_tolerance,
        "detector_model": config.detector_model.as_str(),
        "liveness_policy": config.liveness_policy.as_str(),
        "pipeline_timeout_secs": config.pipeline_timeout_secs,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

pub async fn list() -> Result<()> {
    let config = Config::from_env();
    let store = open_store(&config).await?;
    let users = store.list().await.context("failed to list enrollments")?;

    if users.is_empty() {
        println!("No enrolled users.");
        return Ok(());
    }
    println!("{:<24} {:<26} UPDATED", "USER", "CREATED");
    for u in &users {
        println!("{:<24} {:<26} {}", u.user_id, u.created_at, u.updated_at);
    }
    println!();
    println!("{} user(s) enrolled.", users.len());
    Ok(())
}

pub async fn revoke(user: &str) -> Result<()> {
    let config = Config::from_env();
    let store = open_store(&config).await?;
    if store.clear(user).await.context("failed to revoke enrollment")? {
        tracing::info!(user_id = user, "enrollment revoked");
        println!("Revoked enrollment for {user}.");
        Ok(())
    } else {
        bail!("no enrollment found for {user}")
    }
}

pub async fn reset(confirmed: bool) -> Result<()> {
    if !confirmed {
        bail!("refusing to remove all enrollments without --yes");
    }
    let config = Config::from_env();
    let store = open_store(&config).await?;
    let removed = store.clear_all().await.context("failed to clear enrollments")?;
    tracing::warn!(removed, "all enrollments removed");
    println!("Removed {removed} enrollment(s).");
    Ok(())
}

#[derive(Serialize)]
struct ExportReport {
    exported_at: String,
    total: usize,
    users: Vec<EnrollmentInfo>,
}

fn export_report(users: Vec<EnrollmentInfo>, exported_at: String) -> ExportReport {
    ExportReport {
        exported_at,
        total: users.len(),
        users,
    }
}

pub async fn export(output: Option<String>) -> Result<()> {
    let config = Config::from_env();
    let store = open_store(&config).await?;
    let users = store.list().await.context("failed to list enrollments")?;

    let report = export_report(users, chrono::Utc::now().to_rfc3339());
    let json = serde_json::to_string_pretty(&report)?;

    match output {
        Some(path) => {
            fs::write(&path, json + "\n").with_context(|| format!("failed to write {path}"))?;
            println!("Exported {} user(s) to {path}.", report.total);
        }
        None => println!("{json}"),
    }
    Ok(())
}
