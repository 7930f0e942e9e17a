use crate::domain::failure::RetryPolicy;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkflowConfig {
    pub agents: HashMap<String, AgentConfig>,
    pub workflow: PhaseConfigs,
    /// Retry and timeout policy applied by collaborator adapters.
    #[serde(default)]
    pub failure_policy: RetryPolicy,
    #[serde(default)]
    pub publisher: PublisherConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AgentConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Per-call timeout; falls back to `failure_policy.call_timeout_secs`.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PhaseConfigs {
    #[serde(default = "default_max_revisions")]
    pub max_revisions: u32,
    /// Strategy used when the caller does not choose one.
    #[serde(default)]
    pub use_multi_agent: bool,
    pub generation: SingleAgentPhase,
    pub revision: SingleAgentPhase,
    #[serde(default)]
    pub pipeline: Option<PipelineConfig>,
    #[serde(default)]
    pub images: ImagesConfig,
    #[serde(default)]
    pub search: Option<CommandConfig>,
}

fn default_max_revisions() -> u32 {
    2
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SingleAgentPhase {
    pub agent: String,
}

/// Agent pipeline model selection and inner-loop bounds.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Agent for research, strategy, SEO and visual stages.
    pub fast_agent: String,
    /// Agent for the write and edit stages.
    pub powerful_agent: String,
    #[serde(default = "default_max_revisions")]
    pub max_revisions: u32,
    /// Revised content shorter than this (in characters) is discarded.
    #[serde(default = "default_min_revised_length")]
    pub min_revised_length: usize,
}

fn default_min_revised_length() -> usize {
    50
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ImagesConfig {
    #[serde(default)]
    pub providers: Vec<ImageProviderConfig>,
}

/// An image provider command. `{prompt}` and `{output}` in `args` are
/// substituted with the image prompt and the target file path.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ImageProviderConfig {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// A generic external command; `{query}` in `args` is substituted.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CommandConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PublisherConfig {
    /// Overrides `~/.postflow/outbox/`.
    #[serde(default)]
    pub outbox_dir: Option<PathBuf>,
}

impl WorkflowConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file as YAML: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn default_config() -> Self {
        const DEFAULT_WORKFLOW_YAML: &str = include_str!("../workflow.yaml");

        serde_yaml::from_str(DEFAULT_WORKFLOW_YAML)
            .expect("Failed to parse embedded workflow.yaml - this is a bug in the workflow.yaml file")
    }

    pub fn validate(&self) -> Result<()> {
        self.require_agent("Generation", &self.workflow.generation.agent)?;
        self.require_agent("Revision", &self.workflow.revision.agent)?;

        if let Some(pipeline) = &self.workflow.pipeline {
            self.validate_pipeline(pipeline)?;
        }

        for provider in &self.workflow.images.providers {
            if provider.command.trim().is_empty() {
                anyhow::bail!("Image provider '{}' has an empty command", provider.name);
            }
        }

        if let Some(search) = &self.workflow.search {
            if search.command.trim().is_empty() {
                anyhow::bail!("Search command must not be empty");
            }
        }

        self.failure_policy.validate()?;

        Ok(())
    }

    /// Checks the pipeline section on its own, so callers can degrade to
    /// single-shot generation when only the pipeline is misconfigured.
    pub fn validate_pipeline(&self, pipeline: &PipelineConfig) -> Result<()> {
        self.require_agent("Pipeline fast", &pipeline.fast_agent)?;
        self.require_agent("Pipeline powerful", &pipeline.powerful_agent)?;
        Ok(())
    }

    fn require_agent(&self, role: &str, name: &str) -> Result<()> {
        if !self.agents.contains_key(name) {
            anyhow::bail!("{} agent '{}' not found in agents configuration", role, name);
        }
        Ok(())
    }

    pub fn get_agent(&self, name: &str) -> Option<&AgentConfig> {
        self.agents.get(name)
    }

    /// Effective timeout for an agent: its own override or the policy default.
    pub fn agent_timeout(&self, agent: &AgentConfig) -> Duration {
        agent
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or_else(|| self.failure_policy.call_timeout())
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
