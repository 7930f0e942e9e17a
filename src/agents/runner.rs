//! Shared process runner for command-backed collaborators.
//!
//! Spawns the command, enforces the call timeout and classifies failures
//! into transient and permanent collaborator errors.

use crate::domain::failure::{looks_like_network_error, CollaboratorError, FailureKind};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Configuration for one command invocation.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Collaborator name for errors and logs
    pub name: String,
    /// Overall execution timeout
    pub timeout: Duration,
    /// Treat empty stdout as a (transient) failure
    pub require_output: bool,
}

impl RunnerConfig {
    pub fn new(name: impl Into<String>, timeout: Duration) -> Self {
        Self {
            name: name.into(),
            timeout,
            require_output: true,
        }
    }

    pub fn allow_empty_output(mut self) -> Self {
        self.require_output = false;
        self
    }
}

/// Runs a command to completion and returns its trimmed stdout.
///
/// The child is killed if the timeout elapses.
pub async fn run_command(
    mut command: Command,
    config: &RunnerConfig,
) -> Result<String, CollaboratorError> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = command
        .spawn()
        .map_err(|e| FailureKind::SpawnFailed(e.to_string()).into_error(&config.name, ""))?;

    let output = match tokio::time::timeout(config.timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            return Err(CollaboratorError::transient(
                &config.name,
                format!("failed to collect output: {}", e),
            ))
        }
        Err(_) => {
            return Err(CollaboratorError::Timeout {
                collaborator: config.name.clone(),
                after: config.timeout,
            })
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    debug!(
        collaborator = %config.name,
        status = ?output.status.code(),
        stdout_bytes = stdout.len(),
        "command finished"
    );

    if !output.status.success() {
        let detail = last_line(&stderr);
        let kind = if looks_like_network_error(&stderr) {
            FailureKind::Network
        } else {
            FailureKind::ProcessExit(output.status.code().unwrap_or(-1))
        };
        return Err(kind.into_error(&config.name, &detail));
    }

    if config.require_output && stdout.is_empty() {
        return Err(FailureKind::EmptyOutput.into_error(&config.name, &last_line(&stderr)));
    }

    Ok(stdout)
}

fn last_line(text: &str) -> String {
    text.lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .map(|l| l.chars().take(200).collect())
        .unwrap_or_default()
}
