use crate::domain::types::PostDraft;
use crate::state_machine::StateSnapshot;
use std::fmt::Write;
use std::path::Path;

pub fn truncate_for_summary(text: &str, max_len: usize) -> String {
    let cleaned = text.replace('\n', " ");
    if cleaned.chars().count() <= max_len {
        return cleaned;
    }
    let mut truncated: String = cleaned.chars().take(max_len.saturating_sub(3)).collect();
    truncated.push_str("...");
    truncated
}

/// Human-readable draft block for the terminal.
pub fn render_draft(draft: &PostDraft, image_path: Option<&Path>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "----- draft ({}) -----", draft.post_type);
    let _ = writeln!(out, "{}", draft.publish_text());
    let _ = writeln!(out, "----------------------");
    if let Some(prompt) = draft.image_prompt() {
        let _ = writeln!(out, "image prompt: {}", prompt);
    }
    if let Some(path) = image_path {
        let _ = writeln!(out, "image: {}", path.display());
    }
    for degradation in &draft.metadata.degradations {
        let _ = writeln!(
            out,
            "degraded: {} ({})",
            degradation.stage, degradation.reason
        );
    }
    out
}

pub fn render_session_row(snapshot: &StateSnapshot) -> String {
    format!(
        "{}  {:<20} {:<18} rev {}/{}  {}  {}",
        snapshot.session_id,
        snapshot.phase.to_string(),
        snapshot.post_type.as_str(),
        snapshot.revision_count,
        snapshot.max_revisions,
        snapshot.updated_at.0.format("%Y-%m-%d %H:%M"),
        truncate_for_summary(&snapshot.topic, 40),
    )
}
