//! Centralized home-based storage paths for postflow persistence.
//!
//! Everything lives under `~/.postflow/` (or `$POSTFLOW_HOME` when set):
//! - `sessions/<id>.json` - Session snapshots
//! - `logs/<id>/events.jsonl` - Structured event log per session
//! - `images/` - Generated images
//! - `outbox/` - Published posts
//! - `config.yaml` - Optional user configuration

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

const POSTFLOW_DIR: &str = ".postflow";

/// Environment variable that relocates the storage root.
pub const POSTFLOW_HOME_ENV: &str = "POSTFLOW_HOME";

/// Returns the storage root, creating it if missing.
///
/// # Errors
///
/// Returns an error if:
/// - Home directory cannot be determined
/// - Directory creation fails
pub fn postflow_home_dir() -> Result<PathBuf> {
    let root = storage_root()?;
    fs::create_dir_all(&root)
        .with_context(|| format!("Failed to create postflow directory: {}", root.display()))?;
    Ok(root)
}

/// Resolves the storage root without touching the filesystem.
fn storage_root() -> Result<PathBuf> {
    match std::env::var_os(POSTFLOW_HOME_ENV) {
        Some(custom) if !custom.is_empty() => Ok(PathBuf::from(custom)),
        _ => Ok(dirs::home_dir()
            .context("Could not determine home directory for post storage")?
            .join(POSTFLOW_DIR)),
    }
}

fn subdir(name: &str) -> Result<PathBuf> {
    let dir = postflow_home_dir()?.join(name);
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create {} directory: {}", name, dir.display()))?;
    Ok(dir)
}

/// Returns the sessions directory: `~/.postflow/sessions/`
pub fn sessions_dir() -> Result<PathBuf> {
    subdir("sessions")
}

/// Returns the log directory for one session: `~/.postflow/logs/<session-id>/`
pub fn session_logs_dir(session_id: &str) -> Result<PathBuf> {
    let dir = subdir("logs")?.join(session_id);
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create session log directory: {}", dir.display()))?;
    Ok(dir)
}

/// Returns the generated image directory: `~/.postflow/images/`
pub fn images_dir() -> Result<PathBuf> {
    subdir("images")
}

/// Returns the outbox directory: `~/.postflow/outbox/`
pub fn outbox_dir() -> Result<PathBuf> {
    subdir("outbox")
}

/// Returns the user config path: `~/.postflow/config.yaml` (not created).
pub fn user_config_path() -> Result<PathBuf> {
    Ok(postflow_home_dir()?.join("config.yaml"))
}
