//! Domain model shared by the engine, the pipeline and the session layer.
//!
//! - **Types** (`types.rs`): posts, drafts, identifiers
//! - **Errors** (`errors.rs`): workflow-level failures callers branch on
//! - **Failure** (`failure.rs`): collaborator failures and the retry policy

pub mod errors;
pub mod failure;
pub mod types;

pub use errors::WorkflowError;
pub use failure::{CollaboratorError, RetryPolicy};
pub use types::{
    Degradation, DraftMetadata, ExternalPostId, PostDraft, PostType, Preferences, SessionId,
    TimestampUtc,
};
