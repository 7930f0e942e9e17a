//! Multi-agent content pipeline.
//!
//! Research -> Strategy -> Write -> Edit -> (Write again | SEO) -> Visual -> Finalize.
//!
//! Every stage makes exactly one generator call. Malformed stage output is
//! recovered with a typed fallback and recorded as a degradation; a failed
//! generator call aborts the run and is returned to the caller.

pub mod parsing;
pub mod prompts;
pub mod state;

pub use state::AgentState;

use crate::agents::search::gather_context;
use crate::agents::{ContentGenerator, GenerationRequest, SearchProvider};
use crate::domain::failure::CollaboratorError;
use crate::domain::types::PostDraft;
use crate::strategy::GenerationInput;
use crate::structured_logger::StructuredLogger;
use parsing::{EditStatus, Parsed};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const DEFAULT_PIPELINE_REVISIONS: u32 = 2;
pub const DEFAULT_MIN_REVISED_LENGTH: usize = 50;

pub struct AgentPipeline {
    /// Research, strategy, SEO and visual.
    fast: Arc<dyn ContentGenerator>,
    /// Write and edit.
    powerful: Arc<dyn ContentGenerator>,
    search: Option<Arc<dyn SearchProvider>>,
    max_revisions: u32,
    min_revised_length: usize,
}

impl AgentPipeline {
    pub fn new(fast: Arc<dyn ContentGenerator>, powerful: Arc<dyn ContentGenerator>) -> Self {
        Self {
            fast,
            powerful,
            search: None,
            max_revisions: DEFAULT_PIPELINE_REVISIONS,
            min_revised_length: DEFAULT_MIN_REVISED_LENGTH,
        }
    }

    pub fn with_search(mut self, search: Option<Arc<dyn SearchProvider>>) -> Self {
        self.search = search;
        self
    }

    pub fn with_limits(mut self, max_revisions: u32, min_revised_length: usize) -> Self {
        self.max_revisions = max_revisions;
        self.min_revised_length = min_revised_length;
        self
    }

    pub async fn run(
        &self,
        input: &GenerationInput,
        logger: &StructuredLogger,
    ) -> Result<PostDraft, CollaboratorError> {
        let mut state = AgentState::new(input, self.max_revisions);
        info!(topic = %state.topic, post_type = %state.post_type, "pipeline started");

        self.gather_search_context(&mut state, logger).await;
        self.research(&mut state, logger).await?;
        self.strategy(&mut state, logger).await?;

        loop {
            self.write(&mut state, logger).await?;
            self.edit(&mut state, logger).await?;

            if state.should_loop() {
                state.revision_count += 1;
                debug!(
                    revision = state.revision_count,
                    max = state.max_revisions,
                    "editor requested another write"
                );
                continue;
            }
            if state.needs_revision {
                // Loop budget exhausted: accept the latest draft.
                warn!(max = state.max_revisions, "edit loop limit reached, forcing approval");
                state.needs_revision = false;
                logger.log_stage("edit", "forced_approval");
            }
            break;
        }

        self.seo(&mut state, logger).await?;
        self.visual(&mut state, logger).await?;

        state.record("Finalized post");
        logger.log_stage("finalize", "ok");
        let draft = state.finalize();
        if draft.content.trim().is_empty() {
            return Err(CollaboratorError::permanent(
                "pipeline",
                "pipeline produced empty content",
            ));
        }
        info!(
            chars = draft.content.chars().count(),
            revisions = draft.metadata.pipeline_revisions,
            degraded = draft.metadata.degradations.len(),
            "pipeline finished"
        );
        Ok(draft)
    }

    async fn call(
        &self,
        generator: &dyn ContentGenerator,
        request: GenerationRequest,
        logger: &StructuredLogger,
    ) -> Result<String, CollaboratorError> {
        let result = generator.generate(&request).await;
        logger.log_collaborator_call(generator.name(), &request.purpose, result.is_ok());
        result
    }

    async fn gather_search_context(&self, state: &mut AgentState, logger: &StructuredLogger) {
        let Some(provider) = &self.search else {
            return;
        };
        let (results, degraded) =
            gather_context(provider.as_ref(), &state.topic, state.post_type).await;
        if let Some(reason) = degraded {
            state.degrade("search", reason, logger);
        }
        state.search_results = results;
    }

    async fn research(
        &self,
        state: &mut AgentState,
        logger: &StructuredLogger,
    ) -> Result<(), CollaboratorError> {
        let raw = self
            .call(self.fast.as_ref(), prompts::research(state), logger)
            .await?;
        match parsing::parse_research(&raw) {
            Parsed::Structured(findings) => {
                state.research_summary = findings.research_summary;
                state.key_insights = findings.key_insights;
            }
            Parsed::Fallback { reason } => {
                state.degrade("research", reason, logger);
                state.research_summary = raw.trim().to_string();
                state.key_insights = Vec::new();
            }
        }
        state.record(format!(
            "Research complete: {} insights",
            state.key_insights.len()
        ));
        logger.log_stage("research", "ok");
        Ok(())
    }

    async fn strategy(
        &self,
        state: &mut AgentState,
        logger: &StructuredLogger,
    ) -> Result<(), CollaboratorError> {
        let raw = self
            .call(self.fast.as_ref(), prompts::strategy(state), logger)
            .await?;
        match parsing::parse_strategy(&raw) {
            Parsed::Structured(plan) => {
                state.target_audience = plan.target_audience;
                state.tone_guidelines = plan.tone_guidelines;
                state.content_outline = plan.content_outline;
                state.content_strategy = plan.content_strategy;
            }
            Parsed::Fallback { reason } => {
                state.degrade("strategy", reason, logger);
                state.content_strategy = raw.trim().to_string();
                state.content_outline = raw.trim().to_string();
            }
        }
        state.record("Strategy complete");
        logger.log_stage("strategy", "ok");
        Ok(())
    }

    async fn write(
        &self,
        state: &mut AgentState,
        logger: &StructuredLogger,
    ) -> Result<(), CollaboratorError> {
        let raw = self
            .call(self.powerful.as_ref(), prompts::write(state), logger)
            .await?;
        state.draft_content = raw.trim().to_string();
        state.revised_content.clear();
        state.record(format!(
            "Draft written ({} chars)",
            state.draft_content.chars().count()
        ));
        logger.log_stage("write", "ok");
        Ok(())
    }

    async fn edit(
        &self,
        state: &mut AgentState,
        logger: &StructuredLogger,
    ) -> Result<(), CollaboratorError> {
        let raw = self
            .call(self.powerful.as_ref(), prompts::edit(state), logger)
            .await?;
        match parsing::parse_edit(&raw) {
            Parsed::Structured(verdict) => {
                state.editor_feedback = verdict.feedback;
                let revised = self.accept_revision(verdict.revised_content, &state.draft_content);
                state.revised_content = revised;
                state.needs_revision = verdict.status == EditStatus::NeedsRevision;
            }
            Parsed::Fallback { reason } => {
                state.degrade("edit", reason, logger);
                state.editor_feedback.clear();
                state.revised_content = state.draft_content.clone();
                state.needs_revision = false;
            }
        }

        let outcome = if state.needs_revision {
            "needs_revision"
        } else {
            "approved"
        };
        let preview: String = if state.editor_feedback.is_empty() {
            "Approved".to_string()
        } else {
            state.editor_feedback.chars().take(100).collect()
        };
        state.record(format!("Editing complete: {}", preview));
        logger.log_stage("edit", outcome);
        Ok(())
    }

    /// Short or missing revisions are treated as truncated output; the draft is kept.
    fn accept_revision(&self, revised: Option<String>, draft: &str) -> String {
        match revised {
            Some(text) if text.chars().count() >= self.min_revised_length => text,
            _ => draft.to_string(),
        }
    }

    async fn seo(
        &self,
        state: &mut AgentState,
        logger: &StructuredLogger,
    ) -> Result<(), CollaboratorError> {
        let raw = self
            .call(self.fast.as_ref(), prompts::seo(state), logger)
            .await?;
        match parsing::parse_seo(&raw) {
            Parsed::Structured(advice) => {
                state.hashtags = advice.hashtags;
                state.seo_notes = advice.seo_notes;
            }
            Parsed::Fallback { reason } => {
                state.degrade("seo", reason, logger);
                state.hashtags = state.post_type.canned_hashtags();
                state.seo_notes = "Standard hashtags applied".to_string();
            }
        }
        state.record(format!("SEO complete: {} hashtags", state.hashtags.len()));
        logger.log_stage("seo", "ok");
        Ok(())
    }

    async fn visual(
        &self,
        state: &mut AgentState,
        logger: &StructuredLogger,
    ) -> Result<(), CollaboratorError> {
        if !state.include_image {
            state.image_prompt = None;
            logger.log_stage("visual", "skipped");
            return Ok(());
        }
        let raw = self
            .call(self.fast.as_ref(), prompts::visual(state), logger)
            .await?;
        let prompt = raw.trim();
        if prompt.is_empty() {
            state.degrade("visual", "empty image prompt", logger);
            state.image_prompt = None;
        } else {
            state.image_prompt = Some(prompt.to_string());
        }
        state.record("Visual prompt ready");
        logger.log_stage("visual", "ok");
        Ok(())
    }
}
