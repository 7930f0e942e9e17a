//! Search context gathering for research.
//!
//! Several queries are issued per topic; hits are merged, deduplicated by URL
//! and ranked by score. Search is optional and never fails the caller.

use super::{SearchProvider, SearchResult};
use crate::domain::types::PostType;
use tracing::{info, warn};

/// Upper bound on results kept per topic.
pub const MAX_SEARCH_RESULTS: usize = 7;
/// Results handed to the research stage.
pub const RESEARCH_CONTEXT_RESULTS: usize = 5;

/// Queries issued for a topic, chosen by post type.
pub fn queries_for(topic: &str, post_type: PostType) -> Vec<String> {
    match post_type {
        PostType::AiNews => vec![
            format!("latest AI news {}", topic),
            format!("recent developments in {}", topic),
            format!("{} technology trends", topic),
            format!("{} AI advancements", topic),
        ],
        PostType::PersonalMilestone => vec![
            format!("{} best practices", topic),
            format!("{} implementation examples", topic),
            format!("current {} standards", topic),
        ],
    }
}

/// Deduplicates by URL (keeping the best score) and sorts by score, descending.
pub fn rank_results(mut results: Vec<SearchResult>, limit: usize) -> Vec<SearchResult> {
    results.sort_by(|a, b| b.score.total_cmp(&a.score));
    let mut ranked: Vec<SearchResult> = Vec::new();
    for result in results {
        if result.url.trim().is_empty() || ranked.iter().any(|r| r.url == result.url) {
            continue;
        }
        ranked.push(result);
        if ranked.len() == limit {
            break;
        }
    }
    ranked
}

/// Runs every query for the topic. Failed queries are skipped.
///
/// Returns the ranked results and, when nothing could be fetched because
/// every query failed, the reason.
pub async fn gather_context(
    provider: &dyn SearchProvider,
    topic: &str,
    post_type: PostType,
) -> (Vec<SearchResult>, Option<String>) {
    let queries = queries_for(topic, post_type);
    let mut all = Vec::new();
    let mut failures = Vec::new();

    for query in &queries {
        match provider.search(query).await {
            Ok(results) => all.extend(results),
            Err(err) => {
                warn!(query = %query, error = %err, "search query failed");
                failures.push(err.summary());
            }
        }
    }

    let ranked = rank_results(all, MAX_SEARCH_RESULTS);
    info!(topic, results = ranked.len(), "search context gathered");

    let degraded = (failures.len() == queries.len())
        .then(|| format!("search unavailable: {}", failures.join("; ")));
    (ranked, degraded)
}

/// Formats results as numbered context blocks for prompts.
pub fn format_results(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return "No recent web search results available.".to_string();
    }
    results
        .iter()
        .enumerate()
        .map(|(i, r)| {
            format!(
                "--- SEARCH RESULT {} ---\nTitle: {}\nURL: {}\nRelevance: {:.2}\n\n{}\n",
                i + 1,
                r.title,
                r.url,
                r.score,
                r.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
