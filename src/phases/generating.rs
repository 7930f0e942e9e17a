use super::PhaseContext;
use crate::domain::errors::WorkflowError;
use crate::state_machine::{StateCommand, WorkflowStateMachine};
use crate::strategy::GenerationInput;
use tracing::info;

/// Produces the draft for this round.
///
/// After a revision the revised draft is already in place and is accepted
/// as is; otherwise the strategy generates a fresh one.
pub async fn run_generation_phase(
    machine: &mut WorkflowStateMachine,
    ctx: &PhaseContext<'_>,
) -> Result<(), WorkflowError> {
    let logger = machine.logger().clone();
    let state = machine.state();

    let draft = if state.revised_draft_pending {
        state
            .draft
            .clone()
            .ok_or_else(|| "revised draft is missing".to_string())
    } else {
        info!(
            session = %state.session_id,
            strategy = ctx.strategy.name(),
            "generating content"
        );
        let input = GenerationInput::from_state(state);
        ctx.strategy
            .generate(&input, &logger)
            .await
            .map_err(|e| e.to_string())
    };

    let command = match draft {
        Ok(draft) if !draft.content.trim().is_empty() => StateCommand::ContentReady { draft },
        Ok(_) => StateCommand::StepFailed {
            message: "Content generation failed: generated content is empty".to_string(),
        },
        Err(reason) => StateCommand::StepFailed {
            message: format!("Content generation failed: {}", reason),
        },
    };
    machine.apply(command)?;
    Ok(())
}
