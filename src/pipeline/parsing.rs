//! Typed result contracts for each pipeline stage.
//!
//! Model output is free-form text that is expected to contain a JSON object.
//! Each parser either returns the typed payload or a [`Parsed::Fallback`]
//! carrying the reason, and the stage applies its own fallback value.

use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::OnceLock;

/// Outcome of parsing one stage's output.
#[derive(Debug, Clone, PartialEq)]
pub enum Parsed<T> {
    Structured(T),
    Fallback { reason: String },
}

impl<T> Parsed<T> {
    fn fallback(reason: impl Into<String>) -> Self {
        Parsed::Fallback {
            reason: reason.into(),
        }
    }
}

/// Returns the first JSON object embedded in `raw` that deserializes as `T`.
fn extract_object<T: DeserializeOwned>(raw: &str) -> Result<T, String> {
    let mut last_error = "no JSON object in response".to_string();
    for (start, _) in raw.match_indices('{') {
        let Some(rest) = raw.get(start..) else {
            continue;
        };
        match serde_json::Deserializer::from_str(rest)
            .into_iter::<T>()
            .next()
        {
            Some(Ok(value)) => return Ok(value),
            Some(Err(e)) => last_error = format!("malformed JSON: {}", e),
            None => {}
        }
    }
    Err(last_error)
}

/// Renders a JSON value as prompt text: strings verbatim, anything else as JSON.
fn canonical_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Research

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResearchFindings {
    #[serde(default, alias = "summary")]
    pub research_summary: String,
    #[serde(default, alias = "insights")]
    pub key_insights: Vec<String>,
}

pub fn parse_research(raw: &str) -> Parsed<ResearchFindings> {
    match extract_object::<ResearchFindings>(raw) {
        Ok(findings) if !findings.research_summary.trim().is_empty() => {
            Parsed::Structured(findings)
        }
        Ok(_) => Parsed::fallback("research summary missing"),
        Err(reason) => Parsed::fallback(reason),
    }
}

// ---------------------------------------------------------------------------
// Strategy

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyPlan {
    pub target_audience: String,
    pub tone_guidelines: String,
    /// Outline as text; structured outlines are rendered as JSON.
    pub content_outline: String,
    /// The whole strategy object, as JSON.
    pub content_strategy: String,
}

pub fn parse_strategy(raw: &str) -> Parsed<StrategyPlan> {
    let object = match extract_object::<Map<String, Value>>(raw) {
        Ok(object) => object,
        Err(reason) => return Parsed::fallback(reason),
    };
    let field = |name: &str| object.get(name).map(canonical_text).unwrap_or_default();
    let plan = StrategyPlan {
        target_audience: field("target_audience"),
        tone_guidelines: field("tone_guidelines"),
        content_outline: field("content_outline"),
        content_strategy: Value::Object(object.clone()).to_string(),
    };
    if plan.content_outline.is_empty() {
        return Parsed::fallback("content outline missing");
    }
    Parsed::Structured(plan)
}

// ---------------------------------------------------------------------------
// Edit

/// Token the editor uses to accept a draft.
pub const APPROVAL_TOKEN: &str = "APPROVED";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditStatus {
    Approved,
    NeedsRevision,
}

impl EditStatus {
    /// Loose match: exact token, or the token anywhere in the status, ignoring case.
    pub fn from_status(status: &str) -> Self {
        if status == APPROVAL_TOKEN || status.to_uppercase().contains(APPROVAL_TOKEN) {
            EditStatus::Approved
        } else {
            EditStatus::NeedsRevision
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EditVerdict {
    pub status: EditStatus,
    pub feedback: String,
    pub revised_content: Option<String>,
}

#[derive(Deserialize)]
struct EditPayload {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    feedback: Option<Value>,
    #[serde(default)]
    revised_content: Option<String>,
}

pub fn parse_edit(raw: &str) -> Parsed<EditVerdict> {
    match extract_object::<EditPayload>(raw) {
        Ok(payload) => Parsed::Structured(EditVerdict {
            // A missing status counts as approval.
            status: payload
                .status
                .as_deref()
                .map(EditStatus::from_status)
                .unwrap_or(EditStatus::Approved),
            feedback: payload.feedback.as_ref().map(canonical_text).unwrap_or_default(),
            revised_content: payload
                .revised_content
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty()),
        }),
        Err(reason) => Parsed::fallback(reason),
    }
}

// ---------------------------------------------------------------------------
// SEO

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SeoAdvice {
    #[serde(default)]
    pub hashtags: Vec<String>,
    #[serde(default)]
    pub seo_notes: String,
}

pub fn parse_seo(raw: &str) -> Parsed<SeoAdvice> {
    match extract_object::<SeoAdvice>(raw) {
        Ok(advice) if advice.hashtags.iter().any(|t| !t.trim().is_empty()) => {
            Parsed::Structured(advice)
        }
        Ok(_) => Parsed::fallback("no hashtags in response"),
        Err(reason) => Parsed::fallback(reason),
    }
}

// ---------------------------------------------------------------------------
// Single-shot post

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GeneratedPost {
    pub content: String,
    #[serde(default)]
    pub hashtags: Vec<String>,
    #[serde(default)]
    pub image_prompt: Option<String>,
}

pub fn parse_post(raw: &str) -> Parsed<GeneratedPost> {
    match extract_object::<GeneratedPost>(raw) {
        Ok(post) if !post.content.trim().is_empty() => Parsed::Structured(post),
        Ok(_) => Parsed::fallback("post content missing"),
        Err(reason) => Parsed::fallback(reason),
    }
}

fn hashtag_regex() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"#(\w+)").expect("hashtag pattern is valid"))
}

/// Splits plain-text output into body and inline hashtags.
///
/// Lines made only of hashtags are removed from the body.
pub fn split_hashtags(raw: &str) -> (String, Vec<String>) {
    let tags = hashtag_regex()
        .captures_iter(raw)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
        .collect();

    let body = raw
        .lines()
        .filter(|line| {
            let words: Vec<&str> = line.split_whitespace().collect();
            words.is_empty() || !words.iter().all(|w| w.starts_with('#'))
        })
        .collect::<Vec<_>>()
        .join("\n");

    (body.trim().to_string(), tags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_research_with_surrounding_prose() {
        let raw = r#"Sure! Here you go:
{"research_summary": "Indexes got faster", "key_insights": ["a", "b"]}
Hope this helps."#;
        let Parsed::Structured(findings) = parse_research(raw) else {
            panic!("expected structured research");
        };
        assert_eq!(findings.research_summary, "Indexes got faster");
        assert_eq!(findings.key_insights, vec!["a", "b"]);
    }

    #[test]
    fn test_research_skips_leading_braces() {
        let raw = r#"Use {topic} carefully. {"summary": "ok"}"#;
        assert!(matches!(parse_research(raw), Parsed::Structured(_)));
    }

    #[test]
    fn test_research_plain_text_falls_back() {
        assert!(matches!(
            parse_research("just some text"),
            Parsed::Fallback { .. }
        ));
    }

    #[test]
    fn test_strategy_canonicalizes_structured_outline() {
        let raw = r#"{"target_audience": "engineers", "tone_guidelines": "plain",
                      "content_outline": ["hook", "story", "ask"]}"#;
        let Parsed::Structured(plan) = parse_strategy(raw) else {
            panic!("expected structured strategy");
        };
        assert_eq!(plan.target_audience, "engineers");
        assert_eq!(plan.content_outline, r#"["hook","story","ask"]"#);
        assert!(plan.content_strategy.contains("tone_guidelines"));
    }

    #[test]
    fn test_strategy_without_outline_falls_back() {
        assert!(matches!(
            parse_strategy(r#"{"target_audience": "x"}"#),
            Parsed::Fallback { .. }
        ));
    }

    #[test]
    fn test_edit_status_matching_is_loose() {
        assert_eq!(EditStatus::from_status("APPROVED"), EditStatus::Approved);
        assert_eq!(EditStatus::from_status("approved with nits"), EditStatus::Approved);
        assert_eq!(EditStatus::from_status("NEEDS_REVISION"), EditStatus::NeedsRevision);
    }

    #[test]
    fn test_edit_defaults_to_approved() {
        let Parsed::Structured(verdict) = parse_edit(r#"{"feedback": "fine"}"#) else {
            panic!("expected verdict");
        };
        assert_eq!(verdict.status, EditStatus::Approved);
        assert_eq!(verdict.feedback, "fine");
        assert_eq!(verdict.revised_content, None);
    }

    #[test]
    fn test_edit_needs_revision() {
        let raw = r#"{"status": "NEEDS_REVISION", "feedback": "tighten", "revised_content": "  "}"#;
        let Parsed::Structured(verdict) = parse_edit(raw) else {
            panic!("expected verdict");
        };
        assert_eq!(verdict.status, EditStatus::NeedsRevision);
        assert_eq!(verdict.revised_content, None);
    }

    #[test]
    fn test_seo_requires_hashtags() {
        assert!(matches!(
            parse_seo(r#"{"hashtags": [], "seo_notes": "x"}"#),
            Parsed::Fallback { .. }
        ));
        let Parsed::Structured(advice) = parse_seo(r#"{"hashtags": ["AI"], "seo_notes": "x"}"#)
        else {
            panic!("expected advice");
        };
        assert_eq!(advice.hashtags, vec!["AI"]);
    }

    #[test]
    fn test_post_parsing() {
        let raw = r#"```json
{"content": "We shipped it.", "hashtags": ["AI"], "image_prompt": "a rocket"}
```"#;
        let Parsed::Structured(post) = parse_post(raw) else {
            panic!("expected post");
        };
        assert_eq!(post.content, "We shipped it.");
        assert_eq!(post.image_prompt.as_deref(), Some("a rocket"));
    }

    #[test]
    fn test_split_hashtags() {
        let (body, tags) = split_hashtags("We shipped #search today.\n\n#AI #Rust\n");
        assert_eq!(body, "We shipped #search today.");
        assert_eq!(tags, vec!["search", "AI", "Rust"]);
    }

    proptest! {
        #[test]
        fn parsers_never_panic(raw in ".{0,200}") {
            let _ = parse_research(&raw);
            let _ = parse_strategy(&raw);
            let _ = parse_edit(&raw);
            let _ = parse_seo(&raw);
            let _ = parse_post(&raw);
            let _ = split_hashtags(&raw);
        }
    }
}
