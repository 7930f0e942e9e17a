//! Input validation performed before a workflow is started.

use crate::domain::types::PostType;
use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

pub const MIN_TOPIC_LENGTH: usize = 10;
pub const MAX_TOPIC_LENGTH: usize = 500;

/// Characters that interfere with prompt templating.
const DANGEROUS_CHARS_PATTERN: &str = r"[<>{}|\\^`]";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Topic cannot be empty")]
    EmptyTopic,
    #[error("Topic must be at least 10 characters long")]
    TopicTooShort,
    #[error("Topic must not exceed 500 characters")]
    TopicTooLong,
    #[error("Topic contains invalid characters. Please remove: < > {{ }} | \\ ^ `")]
    DangerousCharacters,
    #[error("{0}")]
    InvalidPostType(String),
}

fn dangerous_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(DANGEROUS_CHARS_PATTERN).expect("dangerous chars pattern is valid"))
}

/// Validates a topic and returns it trimmed.
pub fn validate_topic(topic: &str) -> Result<String, ValidationError> {
    let trimmed = topic.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyTopic);
    }
    let length = trimmed.chars().count();
    if length < MIN_TOPIC_LENGTH {
        return Err(ValidationError::TopicTooShort);
    }
    if length > MAX_TOPIC_LENGTH {
        return Err(ValidationError::TopicTooLong);
    }
    if dangerous_chars().is_match(trimmed) {
        return Err(ValidationError::DangerousCharacters);
    }
    Ok(trimmed.to_string())
}

pub fn validate_post_type(post_type: &str) -> Result<PostType, ValidationError> {
    post_type
        .parse::<PostType>()
        .map_err(ValidationError::InvalidPostType)
}
