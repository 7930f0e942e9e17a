//! Collaborator contracts consumed by the workflow and their shipped
//! implementations.
//!
//! The engine and the agent pipeline only see the traits defined here. The
//! command-backed implementations run external CLI tools, the retry adapter
//! adds bounded backoff for transient failures and the outbox publisher
//! records published posts on disk.

pub mod command;
pub mod outbox;
pub mod retry;
pub mod runner;
pub mod search;

use crate::domain::failure::CollaboratorError;
use crate::domain::types::ExternalPostId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub use command::{CommandContentGenerator, CommandImageGenerator, CommandSearchProvider};
pub use outbox::OutboxPublisher;
pub use retry::{RetryingContentGenerator, RetryingSearchProvider};

/// One text-generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// What the call is for (`generate`, `revise`, `research`, ...); used in logs.
    pub purpose: String,
    pub system_prompt: Option<String>,
    pub prompt: String,
}

impl GenerationRequest {
    pub fn new(purpose: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            purpose: purpose.into(),
            system_prompt: None,
            prompt: prompt.into(),
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    /// System prompt and prompt joined for tools that take a single text.
    pub fn combined_prompt(&self) -> String {
        match &self.system_prompt {
            Some(system) if !system.trim().is_empty() => format!("{}\n\n{}", system, self.prompt),
            _ => self.prompt.clone(),
        }
    }
}

/// Produces text for a prompt. Must be safe to retry.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, request: &GenerationRequest) -> Result<String, CollaboratorError>;
}

/// Produces an image file for a prompt, or nothing.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<Option<PathBuf>, CollaboratorError>;
}

/// Sends a finished post to its destination. Not retried by the workflow.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn post(
        &self,
        text: &str,
        hashtags: &[String],
        image_path: Option<&Path>,
    ) -> Result<ExternalPostId, CollaboratorError>;
}

/// A single web search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub url: String,
    #[serde(default)]
    pub score: f64,
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, CollaboratorError>;
}
