//! Read-only summary of a workflow for listings and CLI display.

use crate::domain::types::{PostType, TimestampUtc};
use crate::state::{Phase, WorkflowState};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateSnapshot {
    pub session_id: String,
    pub phase: Phase,
    pub topic: String,
    pub post_type: PostType,
    pub revision_count: u32,
    pub max_revisions: u32,
    pub has_draft: bool,
    pub has_image: bool,
    pub posted: bool,
    pub error: Option<String>,
    pub updated_at: TimestampUtc,
}

impl From<&WorkflowState> for StateSnapshot {
    fn from(state: &WorkflowState) -> Self {
        Self {
            session_id: state.session_id.to_string(),
            phase: state.phase.clone(),
            topic: state.topic.clone(),
            post_type: state.post_type,
            revision_count: state.revision_count,
            max_revisions: state.max_revisions,
            has_draft: state.draft.is_some(),
            has_image: state.image_path.is_some(),
            posted: state.posted,
            error: state.error.clone(),
            updated_at: state.updated_at,
        }
    }
}
