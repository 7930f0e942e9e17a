//! Strongly typed domain primitives for the post workflow.
//!
//! These newtypes and value objects are shared by the engine, the agent
//! pipeline and the session layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for a post session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Creates a new random session ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parses a session ID from its string form.
    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier returned by the publishing destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalPostId(pub String);

impl ExternalPostId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ExternalPostId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for ExternalPostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The kind of post being written. Drawn from a fixed allowed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostType {
    AiNews,
    PersonalMilestone,
}

impl PostType {
    pub const ALL: [PostType; 2] = [PostType::AiNews, PostType::PersonalMilestone];

    pub fn as_str(&self) -> &'static str {
        match self {
            PostType::AiNews => "ai_news",
            PostType::PersonalMilestone => "personal_milestone",
        }
    }

    /// Hashtags used when the SEO stage cannot produce any.
    pub fn canned_hashtags(&self) -> Vec<String> {
        let tags: &[&str] = match self {
            PostType::AiNews => &[
                "AI",
                "ArtificialIntelligence",
                "Technology",
                "Innovation",
                "FutureOfWork",
            ],
            PostType::PersonalMilestone => &[
                "CareerGrowth",
                "ProfessionalDevelopment",
                "Leadership",
                "Success",
            ],
        };
        tags.iter().map(|t| t.to_string()).collect()
    }
}

impl fmt::Display for PostType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PostType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "ai_news" => Ok(PostType::AiNews),
            "personal_milestone" => Ok(PostType::PersonalMilestone),
            other => Err(format!(
                "Invalid post type '{}'. Must be one of: {}",
                other,
                PostType::ALL
                    .iter()
                    .map(|t| t.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            )),
        }
    }
}

/// Free-form user preferences (tone, length, audience...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Preferences(pub BTreeMap<String, String>);

impl Preferences {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Renders preferences as `key: value` lines for prompts.
    pub fn describe(&self) -> String {
        if self.0.is_empty() {
            return "none".to_string();
        }
        self.0
            .iter()
            .map(|(k, v)| format!("{}: {}", k, v))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A stage that fell back instead of producing its expected result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Degradation {
    pub stage: String,
    pub reason: String,
}

impl Degradation {
    pub fn new(stage: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            reason: reason.into(),
        }
    }
}

/// Opaque generation metadata carried alongside a draft.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DraftMetadata {
    #[serde(default)]
    pub research_summary: String,
    #[serde(default)]
    pub strategy_notes: String,
    #[serde(default)]
    pub seo_notes: String,
    /// Inner editor loop count when produced by the agent pipeline.
    #[serde(default)]
    pub pipeline_revisions: u32,
    #[serde(default)]
    pub stage_messages: usize,
    #[serde(default)]
    pub degradations: Vec<Degradation>,
}

/// The current generated post. Replaced wholesale on every revision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostDraft {
    pub content: String,
    pub hashtags: Vec<String>,
    pub image_prompt: Option<String>,
    pub post_type: PostType,
    #[serde(default)]
    pub metadata: DraftMetadata,
}

impl PostDraft {
    pub fn new(content: impl Into<String>, post_type: PostType) -> Self {
        Self {
            content: content.into(),
            hashtags: Vec::new(),
            image_prompt: None,
            post_type,
            metadata: DraftMetadata::default(),
        }
    }

    pub fn with_hashtags(mut self, hashtags: Vec<String>) -> Self {
        self.hashtags = hashtags;
        self
    }

    pub fn with_image_prompt(mut self, prompt: Option<String>) -> Self {
        self.image_prompt = prompt.filter(|p| !p.trim().is_empty());
        self
    }

    pub fn with_metadata(mut self, metadata: DraftMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Returns the image prompt if one is present and non-blank.
    pub fn image_prompt(&self) -> Option<&str> {
        self.image_prompt
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }

    /// Formats the text sent to the publishing destination:
    /// content, a blank line, then `#`-prefixed hashtags.
    pub fn publish_text(&self) -> String {
        let tags = normalize_hashtags(&self.hashtags);
        if tags.is_empty() {
            return self.content.trim().to_string();
        }
        let rendered = tags
            .iter()
            .map(|t| format!("#{}", t))
            .collect::<Vec<_>>()
            .join(" ");
        format!("{}\n\n{}", self.content.trim(), rendered)
    }
}

/// Strips leading `#`, whitespace and empties, dropping duplicates in order.
pub fn normalize_hashtags(tags: &[String]) -> Vec<String> {
    let mut seen = Vec::<String>::new();
    for tag in tags {
        let cleaned: String = tag
            .trim()
            .trim_start_matches('#')
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        if cleaned.is_empty() {
            continue;
        }
        if !seen.iter().any(|s| s.eq_ignore_ascii_case(&cleaned)) {
            seen.push(cleaned);
        }
    }
    seen
}

/// UTC timestamp used for state bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimestampUtc(pub DateTime<Utc>);

impl TimestampUtc {
    pub fn now() -> Self {
        Self(Utc::now())
    }
}

impl Default for TimestampUtc {
    fn default() -> Self {
        Self::now()
    }
}

impl fmt::Display for TimestampUtc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}
