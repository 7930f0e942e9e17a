use super::PhaseContext;
use crate::domain::errors::WorkflowError;
use crate::state_machine::{StateCommand, WorkflowStateMachine};
use tracing::info;

/// Asks the strategy for a revised draft using the reviewer's feedback.
pub async fn run_revision_phase(
    machine: &mut WorkflowStateMachine,
    ctx: &PhaseContext<'_>,
) -> Result<(), WorkflowError> {
    let logger = machine.logger().clone();
    let state = machine.state();
    let feedback = state
        .approval_decision
        .as_ref()
        .map(|d| d.feedback.clone())
        .unwrap_or_default();

    let command = match state.draft.clone() {
        None => StateCommand::StepFailed {
            message: "Revision failed: there is no draft to revise".to_string(),
        },
        Some(draft) => {
            info!(
                session = %state.session_id,
                revision = state.revision_count + 1,
                max = state.max_revisions,
                "revising draft"
            );
            match ctx.strategy.revise(&draft, &feedback, &logger).await {
                Ok(revised) if !revised.content.trim().is_empty() => {
                    StateCommand::RevisionComplete { draft: revised }
                }
                Ok(_) => StateCommand::StepFailed {
                    message: "Revision failed: revised content is empty".to_string(),
                },
                Err(err) => StateCommand::StepFailed {
                    message: format!("Revision failed: {}", err),
                },
            }
        }
    };
    machine.apply(command)?;
    Ok(())
}
