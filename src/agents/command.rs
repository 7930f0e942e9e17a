//! Command-line backed collaborators.

use super::runner::{run_command, RunnerConfig};
use super::{ContentGenerator, GenerationRequest, ImageGenerator, SearchProvider, SearchResult};
use crate::config::{AgentConfig, CommandConfig, ImageProviderConfig};
use crate::domain::failure::CollaboratorError;
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;
use uuid::Uuid;

/// Runs an agent CLI with its configured args followed by the prompt.
#[derive(Debug, Clone)]
pub struct CommandContentGenerator {
    name: String,
    command: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandContentGenerator {
    pub fn new(name: &str, config: &AgentConfig, timeout: Duration) -> Self {
        Self {
            name: name.to_string(),
            command: config.command.clone(),
            args: config.args.clone(),
            timeout,
        }
    }
}

#[async_trait]
impl ContentGenerator for CommandContentGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, CollaboratorError> {
        let mut cmd = Command::new(&self.command);
        for arg in &self.args {
            cmd.arg(arg);
        }
        cmd.arg(request.combined_prompt());

        run_command(cmd, &RunnerConfig::new(&self.name, self.timeout)).await
    }
}

/// Runs an image tool that writes the image to `{output}`.
#[derive(Debug, Clone)]
pub struct CommandImageGenerator {
    name: String,
    command: String,
    args: Vec<String>,
    output_dir: PathBuf,
    timeout: Duration,
}

impl CommandImageGenerator {
    pub fn new(config: &ImageProviderConfig, output_dir: PathBuf, default_timeout: Duration) -> Self {
        Self {
            name: config.name.clone(),
            command: config.command.clone(),
            args: config.args.clone(),
            output_dir,
            timeout: config
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(default_timeout),
        }
    }
}

#[async_trait]
impl ImageGenerator for CommandImageGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, prompt: &str) -> Result<Option<PathBuf>, CollaboratorError> {
        let output = self.output_dir.join(format!("{}.png", Uuid::new_v4()));
        let output_str = output.to_string_lossy();

        let mut cmd = Command::new(&self.command);
        for arg in &self.args {
            cmd.arg(arg.replace("{prompt}", prompt).replace("{output}", &output_str));
        }

        let config = RunnerConfig::new(&self.name, self.timeout).allow_empty_output();
        run_command(cmd, &config).await?;

        let written = tokio::fs::metadata(&output)
            .await
            .map(|m| m.is_file() && m.len() > 0)
            .unwrap_or(false);
        Ok(written.then_some(output))
    }
}

/// Runs a search tool that prints a JSON array of results.
#[derive(Debug, Clone)]
pub struct CommandSearchProvider {
    command: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandSearchProvider {
    pub fn new(config: &CommandConfig, default_timeout: Duration) -> Self {
        Self {
            command: config.command.clone(),
            args: config.args.clone(),
            timeout: config
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(default_timeout),
        }
    }
}

#[async_trait]
impl SearchProvider for CommandSearchProvider {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, CollaboratorError> {
        let mut cmd = Command::new(&self.command);
        for arg in &self.args {
            cmd.arg(arg.replace("{query}", query));
        }

        let stdout = run_command(cmd, &RunnerConfig::new("search", self.timeout)).await?;
        serde_json::from_str(&stdout).map_err(|e| {
            CollaboratorError::permanent("search", format!("unreadable search output: {}", e))
        })
    }
}
