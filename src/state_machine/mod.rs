//! Centralized state machine for workflow state management.
//!
//! This module provides the ONLY place where workflow state transitions happen.
//! The state machine owns the state, validates commands against the current
//! phase, emits events and logs both to the session's structured log.

mod commands;
mod events;
mod snapshot;

pub use commands::StateCommand;
pub use events::StateEvent;
pub use snapshot::StateSnapshot;

use crate::domain::errors::WorkflowError;
use crate::state::{ApprovalDecision, Decision, Phase, Termination, WorkflowState};
use crate::structured_logger::StructuredLogger;
use std::sync::Arc;
use tracing::debug;

/// Reason recorded when a revise request arrives after the last allowed revision.
pub const REVISION_LIMIT_REASON: &str = "revision limit reached";
/// Reason recorded when the reviewer rejects without feedback.
pub const REJECTED_REASON: &str = "rejected by reviewer";

pub struct WorkflowStateMachine {
    state: WorkflowState,
    logger: Arc<StructuredLogger>,
    seq: u64,
}

impl WorkflowStateMachine {
    pub fn new(state: WorkflowState, logger: Arc<StructuredLogger>) -> Self {
        Self {
            state,
            logger,
            seq: 0,
        }
    }

    /// All mutations go through this single method.
    pub fn apply(&mut self, command: StateCommand) -> Result<Vec<StateEvent>, WorkflowError> {
        self.seq += 1;
        self.logger.log_command(self.seq, &command);
        debug!(
            session = %self.state.session_id,
            phase = %self.state.phase,
            command = command.name(),
            "applying command"
        );

        let events = self.apply_internal(command)?;

        for event in &events {
            self.logger.log_event(self.seq, event);
        }
        self.state.set_updated_at();
        Ok(events)
    }

    fn apply_internal(&mut self, command: StateCommand) -> Result<Vec<StateEvent>, WorkflowError> {
        use StateCommand::*;
        use StateEvent::*;

        match command {
            ContentReady { draft } => {
                self.require_phase(Phase::GeneratingContent, "ContentReady")?;
                if draft.content.trim().is_empty() {
                    return Err(WorkflowError::invalid_transition(
                        "Cannot accept a draft with empty content",
                    ));
                }
                let replaced = DraftReplaced {
                    content_chars: draft.content.chars().count(),
                    hashtags: draft.hashtags.len(),
                };
                self.state.draft = Some(draft);
                self.state.revised_draft_pending = false;
                let next = if self.state.include_image {
                    Phase::GeneratingImage
                } else {
                    // Stale image from a previous round must not survive a text-only round.
                    self.state.image_path = None;
                    Phase::AwaitingApproval
                };
                let changed = self.change_phase(next)?;
                Ok(vec![replaced, changed])
            }

            ImageStepComplete { path } => {
                self.require_phase(Phase::GeneratingImage, "ImageStepComplete")?;
                let image_event = match &path {
                    Some(p) => ImageAttached { path: p.clone() },
                    None => ImageSkipped,
                };
                self.state.image_path = path;
                let changed = self.change_phase(Phase::AwaitingApproval)?;
                Ok(vec![image_event, changed])
            }

            ApplyDecision { decision } => {
                self.require_phase(Phase::AwaitingApproval, "resume")?;
                let approval = ApprovalDecision::from(&decision);
                let recorded = DecisionRecorded {
                    approved: approval.approved,
                    feedback_preview: preview(&approval.feedback),
                };
                self.state.approval_decision = Some(approval);
                let next = match decision {
                    Decision::Approved => Phase::Publishing,
                    Decision::Revise(_) if self.state.can_revise() => Phase::Revising,
                    Decision::Revise(_) => Phase::Terminated(Termination::Rejected {
                        reason: REVISION_LIMIT_REASON.to_string(),
                    }),
                    Decision::Rejected => Phase::Terminated(Termination::Rejected {
                        reason: REJECTED_REASON.to_string(),
                    }),
                };
                let changed = self.change_phase(next)?;
                Ok(vec![recorded, changed])
            }

            RevisionComplete { draft } => {
                self.require_phase(Phase::Revising, "RevisionComplete")?;
                if !self.state.can_revise() {
                    return Err(WorkflowError::invalid_transition(format!(
                        "Revision count {} already at limit {}",
                        self.state.revision_count, self.state.max_revisions
                    )));
                }
                let replaced = DraftReplaced {
                    content_chars: draft.content.chars().count(),
                    hashtags: draft.hashtags.len(),
                };
                self.state.draft = Some(draft);
                self.state.revision_count += 1;
                self.state.approval_decision = None;
                self.state.revised_draft_pending = true;
                let changed = self.change_phase(Phase::GeneratingContent)?;
                Ok(vec![
                    replaced,
                    RevisionCountIncremented {
                        new_value: self.state.revision_count,
                    },
                    changed,
                ])
            }

            PublishSucceeded { external_id } => {
                self.require_phase(Phase::Publishing, "PublishSucceeded")?;
                let published = Published {
                    external_id: external_id.to_string(),
                };
                self.state.posted = true;
                self.state.external_id = Some(external_id.clone());
                let changed =
                    self.change_phase(Phase::Terminated(Termination::Success { external_id }))?;
                Ok(vec![published, changed])
            }

            StepFailed { message } => {
                if self.state.is_terminal() {
                    return Err(WorkflowError::invalid_transition(format!(
                        "Cannot fail a workflow that is already {}",
                        self.state.phase
                    )));
                }
                self.state.error = Some(message.clone());
                let changed = self.change_phase(Phase::Terminated(Termination::Error {
                    message: message.clone(),
                }))?;
                Ok(vec![ErrorOccurred { error: message }, changed])
            }
        }
    }

    fn require_phase(&self, expected: Phase, operation: &str) -> Result<(), WorkflowError> {
        if self.state.phase != expected {
            return Err(WorkflowError::invalid_transition(format!(
                "Cannot {} in phase {} (expected {})",
                operation, self.state.phase, expected
            )));
        }
        Ok(())
    }

    fn change_phase(&mut self, to: Phase) -> Result<StateEvent, WorkflowError> {
        let from = self.state.phase.clone();
        self.state.transition(to)?;
        Ok(StateEvent::PhaseChanged {
            from,
            to: self.state.phase.clone(),
        })
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn phase(&self) -> &Phase {
        &self.state.phase
    }

    pub fn logger(&self) -> &Arc<StructuredLogger> {
        &self.logger
    }

    pub fn into_state(self) -> WorkflowState {
        self.state
    }
}

fn preview(feedback: &str) -> String {
    if feedback.chars().count() > 50 {
        format!("{}...", feedback.chars().take(50).collect::<String>())
    } else {
        feedback.to_string()
    }
}
