//! Engine-facing API: start a post session, resume it with a decision, and
//! inspect stored sessions.
//!
//! Each call loads the session, drives the engine and commits the result
//! with compare-and-swap. Work on one session is serialized by a per-session
//! async mutex inside the process and by the store's session lock across
//! processes, both held from load to commit.

use crate::agents::OutboxPublisher;
use crate::config::WorkflowConfig;
use crate::domain::errors::WorkflowError;
use crate::domain::types::{ExternalPostId, PostDraft, Preferences, SessionId};
use crate::engine::WorkflowEngine;
use crate::image_chain::ImageProviderChain;
use crate::paths;
use crate::session_store::{FileSessionStore, SessionLock, SessionStore};
use crate::state::{Decision, Phase, Termination, WorkflowState};
use crate::state_machine::StateSnapshot;
use crate::strategy::{build_strategy, ContentGenerationStrategy};
use crate::structured_logger::StructuredLogger;
use crate::validation::{validate_post_type, validate_topic, ValidationError};
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
}

/// Where per-session JSONL logs go.
#[derive(Debug, Clone)]
pub enum SessionLogs {
    /// `~/.postflow/logs/<session-id>/`
    Home,
    /// `<dir>/<session-id>/`
    Dir(PathBuf),
    Discard,
}

#[derive(Debug, Clone, Serialize)]
pub struct StartOutcome {
    pub session_id: SessionId,
    pub phase: Phase,
    pub draft: Option<PostDraft>,
    pub image_path: Option<PathBuf>,
    pub error: Option<String>,
}

impl From<&WorkflowState> for StartOutcome {
    fn from(state: &WorkflowState) -> Self {
        Self {
            session_id: state.session_id.clone(),
            phase: state.phase.clone(),
            draft: state.draft.clone(),
            image_path: state.image_path.clone(),
            error: state.error.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResumeOutcome {
    pub session_id: SessionId,
    pub phase: Phase,
    /// The new draft when the session is awaiting approval again.
    pub draft: Option<PostDraft>,
    pub image_path: Option<PathBuf>,
    pub posted: bool,
    pub rejected: bool,
    pub external_id: Option<ExternalPostId>,
    pub error: Option<String>,
}

impl From<&WorkflowState> for ResumeOutcome {
    fn from(state: &WorkflowState) -> Self {
        let awaiting = state.phase == Phase::AwaitingApproval;
        Self {
            session_id: state.session_id.clone(),
            phase: state.phase.clone(),
            draft: state.draft.clone().filter(|_| awaiting),
            image_path: state.image_path.clone().filter(|_| awaiting),
            posted: state.posted,
            rejected: state.is_rejected(),
            external_id: state.external_id.clone(),
            error: match state.termination() {
                Some(Termination::Error { message }) => Some(message.clone()),
                _ => None,
            },
        }
    }
}

pub struct PostService {
    engine: WorkflowEngine,
    store: Arc<dyn SessionStore>,
    single: Arc<dyn ContentGenerationStrategy>,
    multi: Arc<dyn ContentGenerationStrategy>,
    max_revisions: u32,
    logs: SessionLogs,
    session_locks: Mutex<HashMap<SessionId, Arc<tokio::sync::Mutex<()>>>>,
}

impl PostService {
    pub fn new(
        engine: WorkflowEngine,
        store: Arc<dyn SessionStore>,
        single: Arc<dyn ContentGenerationStrategy>,
        multi: Arc<dyn ContentGenerationStrategy>,
        max_revisions: u32,
    ) -> Self {
        Self {
            engine,
            store,
            single,
            multi,
            max_revisions,
            logs: SessionLogs::Discard,
            session_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_session_logs(mut self, logs: SessionLogs) -> Self {
        self.logs = logs;
        self
    }

    /// Wires the command-line collaborators and home-based storage.
    pub fn from_config(config: &WorkflowConfig) -> anyhow::Result<Self> {
        let outbox = match &config.publisher.outbox_dir {
            Some(dir) => dir.clone(),
            None => paths::outbox_dir()?,
        };
        let engine = WorkflowEngine::new(
            ImageProviderChain::from_config(config, paths::images_dir()?),
            Arc::new(OutboxPublisher::new(outbox)),
        );
        let store = Arc::new(FileSessionStore::new(paths::sessions_dir()?));

        Ok(Self::new(
            engine,
            store,
            build_strategy(config, false)?,
            build_strategy(config, true)?,
            config.workflow.max_revisions,
        )
        .with_session_logs(SessionLogs::Home))
    }

    /// Validates the request, creates a session and runs it to the approval pause.
    pub async fn start(
        &self,
        topic: &str,
        post_type: &str,
        preferences: Preferences,
        include_image: bool,
        use_multi_agent: bool,
    ) -> Result<StartOutcome, ServiceError> {
        let topic = validate_topic(topic)?;
        let post_type = validate_post_type(post_type)?;

        let state = WorkflowState::new(
            &topic,
            post_type,
            preferences,
            include_image,
            self.max_revisions,
        )
        .with_multi_agent(use_multi_agent);
        let session_id = state.session_id.clone();

        let lock = self.session_lock(&session_id)?;
        let _guard = lock.lock().await;
        let _held = self.hold_session(&session_id).await?;
        let version = self.store.put(&state)?;

        let logger = self.open_logger(&session_id);
        let strategy = self.strategy(use_multi_agent);
        info!(session = %session_id, strategy = strategy.name(), "session started");

        let state = self.engine.start(state, strategy.as_ref(), logger).await?;
        self.store.compare_and_swap(version, &state)?;
        if state.is_terminal() {
            self.forget_lock(&session_id);
        }
        Ok(StartOutcome::from(&state))
    }

    /// Applies the reviewer's decision to a paused session.
    ///
    /// `approved` wins; otherwise non-blank feedback asks for a revision and
    /// anything else rejects the draft.
    pub async fn resume(
        &self,
        session_id: &SessionId,
        approved: bool,
        feedback: Option<&str>,
    ) -> Result<ResumeOutcome, ServiceError> {
        let lock = self.session_lock(session_id)?;
        let _guard = lock.lock().await;
        let _held = self.hold_session(session_id).await?;

        let Some(record) = self.store.get(session_id)? else {
            self.forget_lock(session_id);
            return Err(WorkflowError::SessionNotFound {
                session_id: session_id.to_string(),
            }
            .into());
        };
        let decision = Decision::from_input(approved, feedback);
        let strategy = self.strategy(record.state.use_multi_agent);

        let logger = self.open_logger(session_id);
        logger.increment_run_id();
        info!(session = %session_id, decision = ?decision, "resuming session");

        let state = self
            .engine
            .resume(record.state, decision, strategy.as_ref(), logger)
            .await?;
        self.store.compare_and_swap(record.version, &state)?;
        if state.is_terminal() {
            self.forget_lock(session_id);
        }
        Ok(ResumeOutcome::from(&state))
    }

    pub fn get(&self, session_id: &SessionId) -> Result<WorkflowState, ServiceError> {
        let record = self
            .store
            .get(session_id)?
            .ok_or_else(|| WorkflowError::SessionNotFound {
                session_id: session_id.to_string(),
            })?;
        Ok(record.state)
    }

    pub fn list(&self) -> Result<Vec<StateSnapshot>, ServiceError> {
        Ok(self.store.list()?)
    }

    /// Stops tracking a session. Nothing else is held for it.
    pub fn abandon(&self, session_id: &SessionId) -> Result<bool, ServiceError> {
        self.forget_lock(session_id);
        Ok(self.store.remove(session_id)?)
    }

    fn strategy(&self, use_multi_agent: bool) -> Arc<dyn ContentGenerationStrategy> {
        if use_multi_agent {
            self.multi.clone()
        } else {
            self.single.clone()
        }
    }

    fn session_lock(
        &self,
        session_id: &SessionId,
    ) -> Result<Arc<tokio::sync::Mutex<()>>, WorkflowError> {
        let mut locks = self
            .session_locks
            .lock()
            .map_err(|_| WorkflowError::storage("session lock table poisoned"))?;
        Ok(locks.entry(session_id.clone()).or_default().clone())
    }

    /// Terminal sessions never run again, so their mutex can go.
    fn forget_lock(&self, session_id: &SessionId) {
        if let Ok(mut locks) = self.session_locks.lock() {
            locks.remove(session_id);
        }
    }

    /// Takes the store's session lock without blocking the runtime.
    async fn hold_session(&self, session_id: &SessionId) -> Result<SessionLock, WorkflowError> {
        let store = self.store.clone();
        let id = session_id.clone();
        tokio::task::spawn_blocking(move || store.lock_session(&id))
            .await
            .map_err(|e| WorkflowError::storage(format!("session lock task failed: {}", e)))?
    }

    #[cfg(test)]
    fn tracked_locks(&self) -> usize {
        self.session_locks.lock().map(|locks| locks.len()).unwrap_or(0)
    }

    fn open_logger(&self, session_id: &SessionId) -> Arc<StructuredLogger> {
        let id = session_id.to_string();
        let opened = match &self.logs {
            SessionLogs::Home => {
                paths::session_logs_dir(&id).and_then(|dir| StructuredLogger::new(&id, &dir))
            }
            SessionLogs::Dir(root) => StructuredLogger::new(&id, &root.join(&id)),
            SessionLogs::Discard => Ok(StructuredLogger::discard(&id)),
        };
        match opened {
            Ok(logger) => {
                if let Some(path) = logger.path() {
                    debug!(session = logger.session_id(), path = %path.display(), "session log opened");
                }
                Arc::new(logger)
            }
            Err(err) => {
                warn!(session = %id, error = %err, "session log unavailable, continuing without it");
                Arc::new(StructuredLogger::discard(&id))
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/service_tests.rs"]
mod tests;
