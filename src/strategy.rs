//! Content generation strategies.
//!
//! The engine asks a [`ContentGenerationStrategy`] for drafts and revisions
//! without knowing whether a single generator call or the multi-agent
//! pipeline produces them.

use crate::agents::search::gather_context;
use crate::agents::{
    CommandContentGenerator, CommandSearchProvider, ContentGenerator, RetryingContentGenerator,
    RetryingSearchProvider, SearchProvider,
};
use crate::config::WorkflowConfig;
use crate::domain::failure::CollaboratorError;
use crate::domain::types::{normalize_hashtags, Degradation, PostDraft, PostType, Preferences};
use crate::pipeline::parsing::{self, Parsed};
use crate::pipeline::{prompts, AgentPipeline};
use crate::state::WorkflowState;
use crate::structured_logger::StructuredLogger;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

/// What to write about.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationInput {
    pub topic: String,
    pub post_type: PostType,
    pub preferences: Preferences,
    pub include_image: bool,
}

impl GenerationInput {
    pub fn new(
        topic: impl Into<String>,
        post_type: PostType,
        preferences: Preferences,
        include_image: bool,
    ) -> Self {
        Self {
            topic: topic.into(),
            post_type,
            preferences,
            include_image,
        }
    }

    pub fn from_state(state: &WorkflowState) -> Self {
        Self::new(
            state.topic.clone(),
            state.post_type,
            state.preferences.clone(),
            state.include_image,
        )
    }
}

#[async_trait]
pub trait ContentGenerationStrategy: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(
        &self,
        input: &GenerationInput,
        logger: &StructuredLogger,
    ) -> Result<PostDraft, CollaboratorError>;

    /// Produces a replacement draft. The post type never changes.
    async fn revise(
        &self,
        draft: &PostDraft,
        feedback: &str,
        logger: &StructuredLogger,
    ) -> Result<PostDraft, CollaboratorError>;
}

// ---------------------------------------------------------------------------
// Single-shot

/// One generator call per draft, one per revision.
pub struct SingleShotStrategy {
    generator: Arc<dyn ContentGenerator>,
    reviser: Arc<dyn ContentGenerator>,
    search: Option<Arc<dyn SearchProvider>>,
}

impl SingleShotStrategy {
    pub fn new(generator: Arc<dyn ContentGenerator>, reviser: Arc<dyn ContentGenerator>) -> Self {
        Self {
            generator,
            reviser,
            search: None,
        }
    }

    pub fn with_search(mut self, search: Option<Arc<dyn SearchProvider>>) -> Self {
        self.search = search;
        self
    }
}

fn degrade(degradations: &mut Vec<Degradation>, stage: &str, reason: String, logger: &StructuredLogger) {
    warn!(stage, reason = %reason, "generation degraded");
    logger.log_degradation(stage, &reason);
    degradations.push(Degradation::new(stage, reason));
}

#[async_trait]
impl ContentGenerationStrategy for SingleShotStrategy {
    fn name(&self) -> &str {
        "single_shot"
    }

    async fn generate(
        &self,
        input: &GenerationInput,
        logger: &StructuredLogger,
    ) -> Result<PostDraft, CollaboratorError> {
        let mut degradations = Vec::new();
        let mut results = Vec::new();
        if let Some(search) = &self.search {
            let (found, degraded) =
                gather_context(search.as_ref(), &input.topic, input.post_type).await;
            if let Some(reason) = degraded {
                degrade(&mut degradations, "search", reason, logger);
            }
            results = found;
        }

        let request = prompts::single_shot(
            &input.topic,
            input.post_type,
            &input.preferences,
            input.include_image,
            &results,
        );
        let raw = self.generator.generate(&request).await;
        logger.log_collaborator_call(self.generator.name(), &request.purpose, raw.is_ok());
        let raw = raw?;

        let (content, hashtags, image_prompt) = match parsing::parse_post(&raw) {
            Parsed::Structured(post) => (post.content, post.hashtags, post.image_prompt),
            Parsed::Fallback { reason } => {
                degrade(&mut degradations, "generate", reason, logger);
                let (body, tags) = parsing::split_hashtags(&raw);
                (body, tags, None)
            }
        };
        if content.trim().is_empty() {
            return Err(CollaboratorError::permanent(
                self.generator.name(),
                "generator returned no post content",
            ));
        }

        let mut hashtags = normalize_hashtags(&hashtags);
        if hashtags.is_empty() {
            degrade(&mut degradations, "hashtags", "no hashtags generated".into(), logger);
            hashtags = input.post_type.canned_hashtags();
        }

        let mut draft = PostDraft::new(content.trim(), input.post_type)
            .with_hashtags(hashtags)
            .with_image_prompt(image_prompt.filter(|_| input.include_image));
        draft.metadata.degradations = degradations;
        info!(strategy = self.name(), chars = draft.content.chars().count(), "draft generated");
        Ok(draft)
    }

    async fn revise(
        &self,
        draft: &PostDraft,
        feedback: &str,
        logger: &StructuredLogger,
    ) -> Result<PostDraft, CollaboratorError> {
        let request = prompts::revise(draft, feedback);
        let raw = self.reviser.generate(&request).await;
        logger.log_collaborator_call(self.reviser.name(), &request.purpose, raw.is_ok());
        let raw = raw?;

        let mut metadata = draft.metadata.clone();
        let (content, hashtags, image_prompt) = match parsing::parse_post(&raw) {
            Parsed::Structured(post) => (post.content, post.hashtags, post.image_prompt),
            Parsed::Fallback { reason } => {
                degrade(&mut metadata.degradations, "revise", reason, logger);
                let (body, tags) = parsing::split_hashtags(&raw);
                (body, tags, None)
            }
        };
        if content.trim().is_empty() {
            return Err(CollaboratorError::permanent(
                self.reviser.name(),
                "reviser returned no post content",
            ));
        }

        let hashtags = match normalize_hashtags(&hashtags) {
            tags if tags.is_empty() => draft.hashtags.clone(),
            tags => tags,
        };
        // Only drafts that had an image prompt keep one.
        let image_prompt = draft
            .image_prompt()
            .map(|previous| image_prompt.unwrap_or_else(|| previous.to_string()));

        Ok(PostDraft::new(content.trim(), draft.post_type)
            .with_hashtags(hashtags)
            .with_image_prompt(image_prompt)
            .with_metadata(metadata))
    }
}

// ---------------------------------------------------------------------------
// Multi-agent

/// Runs the agent pipeline, falling back to single-shot generation when the
/// pipeline fails. Revisions always use the single-shot reviser.
pub struct MultiAgentStrategy {
    pipeline: AgentPipeline,
    fallback: SingleShotStrategy,
}

impl MultiAgentStrategy {
    pub fn new(pipeline: AgentPipeline, fallback: SingleShotStrategy) -> Self {
        Self { pipeline, fallback }
    }
}

#[async_trait]
impl ContentGenerationStrategy for MultiAgentStrategy {
    fn name(&self) -> &str {
        "multi_agent"
    }

    async fn generate(
        &self,
        input: &GenerationInput,
        logger: &StructuredLogger,
    ) -> Result<PostDraft, CollaboratorError> {
        match self.pipeline.run(input, logger).await {
            Ok(draft) => Ok(draft),
            Err(err) => {
                let reason = format!("pipeline failed, used single-shot generation: {}", err);
                warn!(error = %err, "agent pipeline failed, falling back to single-shot");
                logger.log_degradation("pipeline", &reason);
                let mut draft = self.fallback.generate(input, logger).await?;
                draft
                    .metadata
                    .degradations
                    .insert(0, Degradation::new("pipeline", reason));
                Ok(draft)
            }
        }
    }

    async fn revise(
        &self,
        draft: &PostDraft,
        feedback: &str,
        logger: &StructuredLogger,
    ) -> Result<PostDraft, CollaboratorError> {
        self.fallback.revise(draft, feedback, logger).await
    }
}

// ---------------------------------------------------------------------------
// Construction from configuration

fn command_generator(config: &WorkflowConfig, agent_name: &str) -> Result<Arc<dyn ContentGenerator>> {
    let agent = config
        .get_agent(agent_name)
        .with_context(|| format!("Agent '{}' not found in agents configuration", agent_name))?;
    let generator = CommandContentGenerator::new(agent_name, agent, config.agent_timeout(agent));
    Ok(Arc::new(RetryingContentGenerator::new(
        generator,
        config.failure_policy.clone(),
    )))
}

fn command_search(config: &WorkflowConfig) -> Option<Arc<dyn SearchProvider>> {
    config.workflow.search.as_ref().map(|search| {
        let provider = CommandSearchProvider::new(search, config.failure_policy.call_timeout());
        Arc::new(RetryingSearchProvider::new(
            provider,
            config.failure_policy.clone(),
        )) as Arc<dyn SearchProvider>
    })
}

/// Builds the strategy for a session.
///
/// A multi-agent request with a missing or invalid pipeline section yields
/// the single-shot strategy instead of an error.
pub fn build_strategy(
    config: &WorkflowConfig,
    use_multi_agent: bool,
) -> Result<Arc<dyn ContentGenerationStrategy>> {
    let search = command_search(config);
    let single = SingleShotStrategy::new(
        command_generator(config, &config.workflow.generation.agent)?,
        command_generator(config, &config.workflow.revision.agent)?,
    )
    .with_search(search.clone());

    if !use_multi_agent {
        return Ok(Arc::new(single));
    }

    match build_pipeline(config, search) {
        Ok(pipeline) => Ok(Arc::new(MultiAgentStrategy::new(pipeline, single))),
        Err(err) => {
            warn!(error = %err, "agent pipeline unavailable, using single-shot generation");
            Ok(Arc::new(single))
        }
    }
}

fn build_pipeline(
    config: &WorkflowConfig,
    search: Option<Arc<dyn SearchProvider>>,
) -> Result<AgentPipeline> {
    let pipeline = config
        .workflow
        .pipeline
        .as_ref()
        .context("No pipeline section in workflow configuration")?;
    config.validate_pipeline(pipeline)?;

    Ok(AgentPipeline::new(
        command_generator(config, &pipeline.fast_agent)?,
        command_generator(config, &pipeline.powerful_agent)?,
    )
    .with_search(search)
    .with_limits(pipeline.max_revisions, pipeline.min_revised_length))
}

#[cfg(test)]
#[path = "tests/strategy_tests.rs"]
mod tests;
