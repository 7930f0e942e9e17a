use super::PhaseContext;
use crate::domain::errors::WorkflowError;
use crate::state_machine::{StateCommand, WorkflowStateMachine};
use tracing::warn;

/// Tries the image provider chain. Never fails the workflow: a missing
/// prompt or an exhausted chain continues without an image.
pub async fn run_image_phase(
    machine: &mut WorkflowStateMachine,
    ctx: &PhaseContext<'_>,
) -> Result<(), WorkflowError> {
    let logger = machine.logger().clone();
    let prompt = machine
        .state()
        .draft
        .as_ref()
        .and_then(|d| d.image_prompt())
        .map(str::to_string);

    let path = match prompt {
        Some(prompt) => {
            let path = ctx.images.generate(&prompt, &logger).await;
            if path.is_none() {
                logger.log_degradation("image", "no image provider produced an image");
            }
            path
        }
        None => {
            warn!(session = %machine.state().session_id, "draft has no image prompt, skipping image");
            logger.log_degradation("image", "draft has no image prompt");
            None
        }
    };

    machine.apply(StateCommand::ImageStepComplete { path })?;
    Ok(())
}
