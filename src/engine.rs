//! Workflow engine: drives a workflow from creation to the approval pause
//! and from a human decision to completion or another generation round.
//!
//! The engine assumes it is invoked at most once at a time per session.
//! Serializing concurrent resumes is the session layer's job.

use crate::agents::Publisher;
use crate::domain::errors::WorkflowError;
use crate::image_chain::ImageProviderChain;
use crate::phases::{
    run_generation_phase, run_image_phase, run_publish_phase, run_revision_phase, PhaseContext,
};
use crate::state::{Decision, Phase, WorkflowState};
use crate::state_machine::{StateCommand, WorkflowStateMachine};
use crate::strategy::ContentGenerationStrategy;
use crate::structured_logger::StructuredLogger;
use std::sync::Arc;
use tracing::info;

pub struct WorkflowEngine {
    images: ImageProviderChain,
    publisher: Arc<dyn Publisher>,
}

impl WorkflowEngine {
    pub fn new(images: ImageProviderChain, publisher: Arc<dyn Publisher>) -> Self {
        Self { images, publisher }
    }

    /// Runs a new workflow until it awaits approval or terminates.
    pub async fn start(
        &self,
        state: WorkflowState,
        strategy: &dyn ContentGenerationStrategy,
        logger: Arc<StructuredLogger>,
    ) -> Result<WorkflowState, WorkflowError> {
        if state.phase != Phase::GeneratingContent {
            return Err(WorkflowError::invalid_transition(format!(
                "Cannot start a workflow in phase {}",
                state.phase
            )));
        }
        info!(session = %state.session_id, topic = %state.topic, "starting workflow");

        let mut machine = WorkflowStateMachine::new(state, logger);
        self.drive(&mut machine, strategy).await?;
        Ok(machine.into_state())
    }

    /// Applies a human decision to a paused workflow and drives it onward.
    ///
    /// Fails with `InvalidTransition` unless the workflow awaits approval, so
    /// a repeated approval can never publish twice.
    pub async fn resume(
        &self,
        state: WorkflowState,
        decision: Decision,
        strategy: &dyn ContentGenerationStrategy,
        logger: Arc<StructuredLogger>,
    ) -> Result<WorkflowState, WorkflowError> {
        let mut machine = WorkflowStateMachine::new(state, logger);
        machine.apply(StateCommand::ApplyDecision { decision })?;
        self.drive(&mut machine, strategy).await?;
        Ok(machine.into_state())
    }

    async fn drive(
        &self,
        machine: &mut WorkflowStateMachine,
        strategy: &dyn ContentGenerationStrategy,
    ) -> Result<(), WorkflowError> {
        let ctx = PhaseContext {
            strategy,
            images: &self.images,
            publisher: self.publisher.as_ref(),
        };

        loop {
            let phase = machine.phase().clone();
            match phase {
                Phase::GeneratingContent => run_generation_phase(machine, &ctx).await?,
                Phase::GeneratingImage => run_image_phase(machine, &ctx).await?,
                Phase::Revising => run_revision_phase(machine, &ctx).await?,
                Phase::Publishing => run_publish_phase(machine, &ctx).await?,
                Phase::AwaitingApproval | Phase::Terminated(_) => {
                    info!(
                        session = %machine.state().session_id,
                        phase = %phase,
                        revision = machine.state().revision_count,
                        "workflow run returned"
                    );
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/engine_tests.rs"]
mod tests;
