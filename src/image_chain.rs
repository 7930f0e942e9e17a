//! Ordered image provider fallback chain.

use crate::agents::{CommandImageGenerator, ImageGenerator};
use crate::config::WorkflowConfig;
use crate::structured_logger::StructuredLogger;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Tries each provider once, in order. The first image wins.
#[derive(Clone, Default)]
pub struct ImageProviderChain {
    providers: Vec<Arc<dyn ImageGenerator>>,
}

impl ImageProviderChain {
    pub fn new(providers: Vec<Arc<dyn ImageGenerator>>) -> Self {
        Self { providers }
    }

    pub fn from_config(config: &WorkflowConfig, output_dir: PathBuf) -> Self {
        let providers = config
            .workflow
            .images
            .providers
            .iter()
            .map(|provider| {
                Arc::new(CommandImageGenerator::new(
                    provider,
                    output_dir.clone(),
                    config.failure_policy.call_timeout(),
                )) as Arc<dyn ImageGenerator>
            })
            .collect();
        Self::new(providers)
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Returns the first generated image, or `None` when every provider failed.
    /// Provider errors never escape.
    pub async fn generate(&self, prompt: &str, logger: &StructuredLogger) -> Option<PathBuf> {
        for provider in &self.providers {
            match provider.generate(prompt).await {
                Ok(Some(path)) => {
                    logger.log_collaborator_call(provider.name(), "image", true);
                    info!(provider = provider.name(), path = %path.display(), "image generated");
                    return Some(path);
                }
                Ok(None) => {
                    logger.log_collaborator_call(provider.name(), "image", false);
                    warn!(provider = provider.name(), "image provider produced no image");
                }
                Err(err) => {
                    logger.log_collaborator_call(provider.name(), "image", false);
                    warn!(provider = provider.name(), error = %err, "image provider failed");
                }
            }
        }
        None
    }
}
