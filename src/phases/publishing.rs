use super::PhaseContext;
use crate::domain::errors::WorkflowError;
use crate::domain::types::normalize_hashtags;
use crate::state_machine::{StateCommand, WorkflowStateMachine};
use tracing::{info, warn};

/// Sends the approved draft to the publisher exactly once. Failures are terminal.
pub async fn run_publish_phase(
    machine: &mut WorkflowStateMachine,
    ctx: &PhaseContext<'_>,
) -> Result<(), WorkflowError> {
    let logger = machine.logger().clone();
    let state = machine.state();

    let command = match &state.draft {
        None => StateCommand::StepFailed {
            message: "Publishing failed: there is no draft to publish".to_string(),
        },
        Some(draft) => {
            let hashtags = normalize_hashtags(&draft.hashtags);
            let result = ctx
                .publisher
                .post(&draft.publish_text(), &hashtags, state.image_path.as_deref())
                .await;
            logger.log_collaborator_call("publisher", "publish", result.is_ok());
            match result {
                Ok(external_id) => {
                    info!(session = %state.session_id, external_id = %external_id, "post published");
                    StateCommand::PublishSucceeded { external_id }
                }
                Err(err) => {
                    warn!(session = %state.session_id, error = %err, "publishing failed");
                    StateCommand::StepFailed {
                        message: format!("Publishing failed: {}", err),
                    }
                }
            }
        }
    };
    machine.apply(command)?;
    Ok(())
}
