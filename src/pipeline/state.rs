//! Working state threaded through the agent pipeline stages.

use crate::agents::SearchResult;
use crate::domain::types::{
    normalize_hashtags, Degradation, DraftMetadata, PostDraft, PostType, Preferences,
};
use crate::strategy::GenerationInput;
use crate::structured_logger::StructuredLogger;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Pipeline-internal superset of a draft. Lives for one pipeline run and is
/// collapsed into a [`PostDraft`] by [`AgentState::finalize`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    pub topic: String,
    pub post_type: PostType,
    pub preferences: Preferences,
    pub include_image: bool,

    pub search_results: Vec<SearchResult>,

    // Research
    pub research_summary: String,
    pub key_insights: Vec<String>,

    // Strategy
    pub content_strategy: String,
    pub target_audience: String,
    pub tone_guidelines: String,
    pub content_outline: String,

    // Write / edit loop
    pub draft_content: String,
    pub editor_feedback: String,
    pub revised_content: String,
    pub revision_count: u32,
    pub max_revisions: u32,
    pub needs_revision: bool,

    // SEO and visual
    pub hashtags: Vec<String>,
    pub seo_notes: String,
    pub image_prompt: Option<String>,

    /// One short line per completed stage.
    pub messages: Vec<String>,
    pub degradations: Vec<Degradation>,
}

impl AgentState {
    pub fn new(input: &GenerationInput, max_revisions: u32) -> Self {
        Self {
            topic: input.topic.clone(),
            post_type: input.post_type,
            preferences: input.preferences.clone(),
            include_image: input.include_image,
            search_results: Vec::new(),
            research_summary: String::new(),
            key_insights: Vec::new(),
            content_strategy: String::new(),
            target_audience: String::new(),
            tone_guidelines: String::new(),
            content_outline: String::new(),
            draft_content: String::new(),
            editor_feedback: String::new(),
            revised_content: String::new(),
            revision_count: 0,
            max_revisions,
            needs_revision: false,
            hashtags: Vec::new(),
            seo_notes: String::new(),
            image_prompt: None,
            messages: Vec::new(),
            degradations: Vec::new(),
        }
    }

    /// True when the editor asked for changes and the loop budget allows another write.
    pub fn should_loop(&self) -> bool {
        self.needs_revision && self.revision_count < self.max_revisions
    }

    pub fn record(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    /// Records a stage fallback in the draft metadata, the session log and tracing.
    pub fn degrade(&mut self, stage: &str, reason: impl Into<String>, logger: &StructuredLogger) {
        let reason = reason.into();
        warn!(stage, reason = %reason, "pipeline stage degraded");
        logger.log_degradation(stage, &reason);
        self.degradations.push(Degradation::new(stage, reason));
    }

    /// Text the later stages work on: the edited version when present.
    pub fn current_content(&self) -> &str {
        if self.revised_content.trim().is_empty() {
            self.draft_content.trim()
        } else {
            self.revised_content.trim()
        }
    }

    pub fn finalize(self) -> PostDraft {
        let content = self.current_content().to_string();
        let image_prompt = if self.include_image {
            self.image_prompt
        } else {
            None
        };
        let metadata = DraftMetadata {
            research_summary: self.research_summary,
            strategy_notes: self.content_strategy,
            seo_notes: self.seo_notes,
            pipeline_revisions: self.revision_count,
            stage_messages: self.messages.len(),
            degradations: self.degradations,
        };

        PostDraft::new(content, self.post_type)
            .with_hashtags(normalize_hashtags(&self.hashtags))
            .with_image_prompt(image_prompt)
            .with_metadata(metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(include_image: bool) -> GenerationInput {
        GenerationInput::new(
            "Our team shipped a new search index",
            PostType::AiNews,
            Preferences::default(),
            include_image,
        )
    }

    #[test]
    fn test_should_loop_respects_budget() {
        let mut state = AgentState::new(&input(false), 2);
        assert!(!state.should_loop());
        state.needs_revision = true;
        assert!(state.should_loop());
        state.revision_count = 2;
        assert!(!state.should_loop());
    }

    #[test]
    fn test_finalize_prefers_revised_content() {
        let mut state = AgentState::new(&input(true), 2);
        state.draft_content = "draft".into();
        state.revised_content = "  edited  ".into();
        state.hashtags = vec!["#AI".into(), "AI".into(), "Rust".into()];
        state.image_prompt = Some("server racks at dawn".into());
        state.record("Research complete");
        state.revision_count = 1;

        let draft = state.finalize();
        assert_eq!(draft.content, "edited");
        assert_eq!(draft.hashtags, vec!["AI", "Rust"]);
        assert_eq!(draft.image_prompt(), Some("server racks at dawn"));
        assert_eq!(draft.metadata.pipeline_revisions, 1);
        assert_eq!(draft.metadata.stage_messages, 1);
    }

    #[test]
    fn test_finalize_drops_image_prompt_without_image() {
        let mut state = AgentState::new(&input(false), 2);
        state.draft_content = "draft".into();
        state.image_prompt = Some("unused".into());
        let draft = state.finalize();
        assert_eq!(draft.content, "draft");
        assert_eq!(draft.image_prompt, None);
    }

    #[test]
    fn test_degrade_is_recorded() {
        let logger = StructuredLogger::discard("s");
        let mut state = AgentState::new(&input(false), 2);
        state.degrade("seo", "no hashtags", &logger);
        assert_eq!(state.degradations, vec![Degradation::new("seo", "no hashtags")]);
    }
}
