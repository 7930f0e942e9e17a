//! Commands that can mutate workflow state.
//!
//! All state changes MUST go through the state machine's `apply()` method.

use crate::domain::types::{ExternalPostId, PostDraft};
use crate::state::Decision;
use std::path::PathBuf;

/// Commands that can mutate workflow state.
#[derive(Debug, Clone)]
pub enum StateCommand {
    /// A non-empty draft is available; moves on to imaging or approval.
    ContentReady { draft: PostDraft },
    /// Image step finished; `None` means no image (non-fatal).
    ImageStepComplete { path: Option<PathBuf> },
    /// The reviewer decided on the draft awaiting approval.
    ApplyDecision { decision: Decision },
    /// The strategy produced a revised draft; increments the revision counter.
    RevisionComplete { draft: PostDraft },
    /// The publisher accepted the post.
    PublishSucceeded { external_id: ExternalPostId },
    /// A step failed unrecoverably; terminates with a user-facing message.
    StepFailed { message: String },
}

impl StateCommand {
    /// Short name for logs; drafts are not written out in full.
    pub fn name(&self) -> &'static str {
        match self {
            StateCommand::ContentReady { .. } => "ContentReady",
            StateCommand::ImageStepComplete { .. } => "ImageStepComplete",
            StateCommand::ApplyDecision { .. } => "ApplyDecision",
            StateCommand::RevisionComplete { .. } => "RevisionComplete",
            StateCommand::PublishSucceeded { .. } => "PublishSucceeded",
            StateCommand::StepFailed { .. } => "StepFailed",
        }
    }
}
