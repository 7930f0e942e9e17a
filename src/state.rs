use crate::domain::errors::WorkflowError;
use crate::domain::types::{ExternalPostId, PostDraft, PostType, Preferences, SessionId, TimestampUtc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// How a workflow ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    Success { external_id: ExternalPostId },
    Rejected { reason: String },
    Error { message: String },
}

impl Termination {
    pub fn label(&self) -> &'static str {
        match self {
            Termination::Success { .. } => "success",
            Termination::Rejected { .. } => "rejected",
            Termination::Error { .. } => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    GeneratingContent,
    GeneratingImage,
    AwaitingApproval,
    Revising,
    Publishing,
    Terminated(Termination),
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Terminated(_))
    }

    /// Upper-case tag used in CLI output and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Phase::GeneratingContent => "GENERATING_CONTENT",
            Phase::GeneratingImage => "GENERATING_IMAGE",
            Phase::AwaitingApproval => "AWAITING_APPROVAL",
            Phase::Revising => "REVISING",
            Phase::Publishing => "PUBLISHING",
            Phase::Terminated(_) => "TERMINATED",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Terminated(termination) => write!(f, "TERMINATED({})", termination.label()),
            other => f.write_str(other.label()),
        }
    }
}

/// A human decision on the draft awaiting approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "feedback", rename_all = "snake_case")]
pub enum Decision {
    Approved,
    Rejected,
    Revise(String),
}

impl Decision {
    /// Maps the caller's `(approved, feedback)` pair onto a decision.
    ///
    /// `approved` wins over feedback; blank feedback without approval is a rejection.
    pub fn from_input(approved: bool, feedback: Option<&str>) -> Self {
        if approved {
            return Decision::Approved;
        }
        match feedback.map(str::trim) {
            Some(text) if !text.is_empty() => Decision::Revise(text.to_string()),
            _ => Decision::Rejected,
        }
    }
}

/// The last decision recorded against the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalDecision {
    pub approved: bool,
    pub feedback: String,
}

impl From<&Decision> for ApprovalDecision {
    fn from(decision: &Decision) -> Self {
        match decision {
            Decision::Approved => Self {
                approved: true,
                feedback: String::new(),
            },
            Decision::Rejected => Self {
                approved: false,
                feedback: String::new(),
            },
            Decision::Revise(feedback) => Self {
                approved: false,
                feedback: feedback.clone(),
            },
        }
    }
}

/// Aggregate state of one post workflow run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub session_id: SessionId,
    pub phase: Phase,
    pub topic: String,
    pub post_type: PostType,
    #[serde(default)]
    pub preferences: Preferences,
    pub include_image: bool,
    #[serde(default)]
    pub use_multi_agent: bool,
    #[serde(default)]
    pub draft: Option<PostDraft>,
    #[serde(default)]
    pub image_path: Option<PathBuf>,
    pub revision_count: u32,
    pub max_revisions: u32,
    #[serde(default)]
    pub approval_decision: Option<ApprovalDecision>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub posted: bool,
    #[serde(default)]
    pub external_id: Option<ExternalPostId>,
    /// Set by a completed revision so the next content step keeps the revised draft.
    #[serde(default)]
    pub revised_draft_pending: bool,
    pub created_at: TimestampUtc,
    pub updated_at: TimestampUtc,
}

impl WorkflowState {
    pub fn new(
        topic: &str,
        post_type: PostType,
        preferences: Preferences,
        include_image: bool,
        max_revisions: u32,
    ) -> Self {
        let now = TimestampUtc::now();
        Self {
            session_id: SessionId::new(),
            phase: Phase::GeneratingContent,
            topic: topic.trim().to_string(),
            post_type,
            preferences,
            include_image,
            use_multi_agent: false,
            draft: None,
            image_path: None,
            revision_count: 0,
            max_revisions,
            approval_decision: None,
            error: None,
            posted: false,
            external_id: None,
            revised_draft_pending: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_multi_agent(mut self, use_multi_agent: bool) -> Self {
        self.use_multi_agent = use_multi_agent;
        self
    }

    pub fn set_updated_at(&mut self) {
        self.updated_at = TimestampUtc::now();
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    /// True while another reviewer-requested revision is allowed.
    pub fn can_revise(&self) -> bool {
        self.revision_count < self.max_revisions
    }

    pub fn termination(&self) -> Option<&Termination> {
        match &self.phase {
            Phase::Terminated(termination) => Some(termination),
            _ => None,
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self.termination(), Some(Termination::Rejected { .. }))
    }

    pub fn transition(&mut self, to: Phase) -> Result<(), WorkflowError> {
        let valid = matches!(
            (&self.phase, &to),
            (Phase::GeneratingContent, Phase::GeneratingImage)
                | (Phase::GeneratingContent, Phase::AwaitingApproval)
                | (Phase::GeneratingImage, Phase::AwaitingApproval)
                | (Phase::AwaitingApproval, Phase::Publishing)
                | (Phase::AwaitingApproval, Phase::Revising)
                | (Phase::AwaitingApproval, Phase::Terminated(Termination::Rejected { .. }))
                | (Phase::Revising, Phase::GeneratingContent)
                | (Phase::Publishing, Phase::Terminated(Termination::Success { .. }))
        ) || (!self.phase.is_terminal()
            && matches!(to, Phase::Terminated(Termination::Error { .. })));

        if valid {
            self.phase = to;
            Ok(())
        } else {
            Err(WorkflowError::invalid_transition(format!(
                "Invalid state transition from {} to {}",
                self.phase, to
            )))
        }
    }
}

#[cfg(test)]
#[path = "tests/state_tests.rs"]
mod tests;
