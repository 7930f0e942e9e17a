//! Prompt construction for the pipeline stages and the single-shot strategy.

use super::state::AgentState;
use crate::agents::search::{format_results, RESEARCH_CONTEXT_RESULTS};
use crate::agents::{GenerationRequest, SearchResult};
use crate::domain::types::{PostDraft, PostType, Preferences};

fn audience_for(post_type: PostType) -> &'static str {
    match post_type {
        PostType::AiNews => "AI and technology news",
        PostType::PersonalMilestone => "personal career milestones",
    }
}

pub fn research(state: &AgentState) -> GenerationRequest {
    let context = if state.search_results.is_empty() {
        "No external search results available. Use your knowledge to provide insights."
            .to_string()
    } else {
        state
            .search_results
            .iter()
            .take(RESEARCH_CONTEXT_RESULTS)
            .enumerate()
            .map(|(i, r)| format!("Source {}: {}\n{}", i + 1, r.title, r.content))
            .collect::<Vec<_>>()
            .join("\n\n")
    };

    GenerationRequest::new(
        "research",
        format!(
            "Topic: {}\n\nAvailable information:\n{}\n\nUser preferences:\n{}\n\n\
             Reply with JSON: {{\"research_summary\": \"...\", \"key_insights\": [\"...\"]}}",
            state.topic,
            context,
            state.preferences.describe()
        ),
    )
    .with_system_prompt(format!(
        "You are a research analyst for {} posts. Extract a concise summary and 3-5 key \
         insights: recent developments, unique angles, supporting data.",
        audience_for(state.post_type)
    ))
}

pub fn strategy(state: &AgentState) -> GenerationRequest {
    GenerationRequest::new(
        "strategy",
        format!(
            "Topic: {}\nResearch summary: {}\nKey insights:\n- {}\nUser preferences:\n{}\n\n\
             Reply with JSON: {{\"target_audience\": \"...\", \"tone_guidelines\": \"...\", \
             \"content_outline\": \"...\"}}",
            state.topic,
            state.research_summary,
            state.key_insights.join("\n- "),
            state.preferences.describe()
        ),
    )
    .with_system_prompt(
        "You are a content strategist for professional social posts. Decide the audience, \
         the tone and a short outline with a hook, a body and a call to action.",
    )
}

pub fn write(state: &AgentState) -> GenerationRequest {
    let mut prompt = format!(
        "Topic: {}\nTarget audience: {}\nTone: {}\nOutline:\n{}\nKey insights:\n- {}\n\n\
         Write the post text only. No hashtags.",
        state.topic,
        state.target_audience,
        state.tone_guidelines,
        state.content_outline,
        state.key_insights.join("\n- ")
    );
    if state.revision_count > 0 && !state.editor_feedback.trim().is_empty() {
        prompt.push_str(&format!(
            "\n\nThis is revision #{}. Previous editor feedback: {}",
            state.revision_count, state.editor_feedback
        ));
    }

    GenerationRequest::new("write", prompt).with_system_prompt(format!(
        "You are a professional writer of {} posts. Keep it under 1300 characters, \
         with short paragraphs and a clear call to action.",
        audience_for(state.post_type)
    ))
}

pub fn edit(state: &AgentState) -> GenerationRequest {
    GenerationRequest::new(
        "edit",
        format!(
            "Topic: {}\nStrategy: {}\nRevision {} of {}\n\nDraft:\n{}\n\n\
             Reply with JSON: {{\"status\": \"APPROVED\" or \"NEEDS_REVISION\", \
             \"feedback\": \"...\", \"revised_content\": \"...\"}}",
            state.topic,
            state.content_strategy,
            state.revision_count,
            state.max_revisions,
            state.draft_content
        ),
    )
    .with_system_prompt(
        "You are a demanding editor. Check clarity, accuracy and engagement. Approve drafts \
         that are ready; otherwise explain what to change and provide an improved version.",
    )
}

pub fn seo(state: &AgentState) -> GenerationRequest {
    GenerationRequest::new(
        "seo",
        format!(
            "Post type: {}\nPost:\n{}\n\n\
             Reply with JSON: {{\"hashtags\": [\"...\"], \"seo_notes\": \"...\"}} \
             with 3-5 hashtags without the # sign.",
            state.post_type,
            state.current_content()
        ),
    )
    .with_system_prompt("You optimize professional posts for discovery.")
}

pub fn visual(state: &AgentState) -> GenerationRequest {
    GenerationRequest::new(
        "visual",
        format!(
            "Topic: {}\nPost:\n{}\n\nDescribe one image for this post in a single prompt \
             for an image model. Reply with the prompt only.",
            state.topic,
            state.current_content()
        ),
    )
    .with_system_prompt("You are a visual designer for professional social media.")
}

/// One-call generation of a complete post.
pub fn single_shot(
    topic: &str,
    post_type: PostType,
    preferences: &Preferences,
    include_image: bool,
    search_results: &[SearchResult],
) -> GenerationRequest {
    let image_field = if include_image {
        ", \"image_prompt\": \"...\""
    } else {
        ""
    };
    GenerationRequest::new(
        "generate",
        format!(
            "Topic: {}\nPost type: {}\nUser preferences:\n{}\n\nRecent context:\n{}\n\n\
             Reply with JSON: {{\"content\": \"...\", \"hashtags\": [\"...\"]{}}}",
            topic,
            post_type,
            preferences.describe(),
            format_results(search_results),
            image_field
        ),
    )
    .with_system_prompt(format!(
        "You write engaging professional posts about {}.",
        audience_for(post_type)
    ))
}

pub fn revise(draft: &PostDraft, feedback: &str) -> GenerationRequest {
    GenerationRequest::new(
        "revise",
        format!(
            "Original post:\n{}\n\nHashtags: {}\nImage prompt: {}\nPost type: {}\n\n\
             Reviewer feedback: {}\n\n\
             Reply with JSON: {{\"content\": \"...\", \"hashtags\": [\"...\"], \
             \"image_prompt\": \"...\"}}",
            draft.content,
            draft.hashtags.join(", "),
            draft.image_prompt().unwrap_or("none"),
            draft.post_type,
            feedback
        ),
    )
    .with_system_prompt("You revise professional posts according to reviewer feedback.")
}
