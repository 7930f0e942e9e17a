//! Events emitted by the state machine after processing commands.
//!
//! These are for logging and notification purposes only.

use crate::state::Phase;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum StateEvent {
    /// Phase changed from one phase to another
    PhaseChanged { from: Phase, to: Phase },
    /// The draft was replaced wholesale
    DraftReplaced { content_chars: usize, hashtags: usize },
    /// An image was attached to the session
    ImageAttached { path: PathBuf },
    /// The image step produced nothing
    ImageSkipped,
    /// Reviewer decision recorded
    DecisionRecorded { approved: bool, feedback_preview: String },
    /// Revision counter was incremented
    RevisionCountIncremented { new_value: u32 },
    /// Post was published
    Published { external_id: String },
    /// An error occurred
    ErrorOccurred { error: String },
}
