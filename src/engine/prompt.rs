//! System prompt assembly
//!
//! Builds the persona system prompt from the persona context, the merged
//! retrieval context, and the conversation's recent searches. The recent
//! searches are injected as an explicit instruction so the model does not
//! repeat a search the conversation already ran.

use crate::retrieval::{ConfidenceLevel, RetrievalResponse};
use crate::types::PersonaContext;

/// Longest retrieval snippet included in the prompt
const CONTEXT_SNIPPET_MAX: usize = 600;

/// Derive a short conversation title from the opening query
pub fn derive_title(query: &str) -> String {
    let collapsed = query.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut title: String = collapsed.chars().take(48).collect();
    if collapsed.chars().count() > 48 {
        title.push('…');
    }
    if title.is_empty() {
        title.push_str("New conversation");
    }
    title
}

/// Assemble the system prompt for one generation session.
pub fn build_system_prompt(
    persona: &PersonaContext,
    retrieval: &RetrievalResponse,
    recent_queries: &[String],
) -> String {
    let mut sections = Vec::new();

    let name = if persona.name.is_empty() {
        "the user's digital clone"
    } else {
        persona.name.as_str()
    };
    sections.push(format!(
        "You are {name}, a digital clone that answers in the first person, \
         drawing on the personal knowledge below when it is relevant."
    ));

    if !persona.description.is_empty() {
        sections.push(format!("Persona: {}", persona.description));
    }

    sections.push(knowledge_section(retrieval));

    if !recent_queries.is_empty() {
        let mut lines = vec![
            "Searches already run in this conversation; do NOT repeat any of them:".to_string(),
        ];
        for query in recent_queries {
            lines.push(format!("- {query}"));
        }
        sections.push(lines.join("\n"));
    }

    sections.join("\n\n")
}

fn knowledge_section(retrieval: &RetrievalResponse) -> String {
    if retrieval.results.is_empty() {
        return "No personal knowledge matched this query. Answer from general knowledge, \
                and use the search tools if more context would help."
            .to_string();
    }

    let confidence = match retrieval.confidence {
        ConfidenceLevel::High => "high",
        ConfidenceLevel::Medium => "medium",
        ConfidenceLevel::Low => "low",
        ConfidenceLevel::None => "none",
    };

    let mut lines = vec![format!(
        "Personal knowledge context (confidence: {confidence}):"
    )];
    for result in &retrieval.results {
        let snippet: String = result.content.chars().take(CONTEXT_SNIPPET_MAX).collect();
        lines.push(format!("- [{}] {}", result.source, snippet.replace('\n', " ")));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::RetrievalResult;

    fn persona() -> PersonaContext {
        PersonaContext {
            name: "Alex".to_string(),
            description: "Software engineer, direct tone".to_string(),
            user_id: "user-1".to_string(),
            app_id: None,
        }
    }

    fn response_with(results: Vec<RetrievalResult>) -> RetrievalResponse {
        let mut response = RetrievalResponse::empty("q");
        response.total_results = results.len();
        response.results = results;
        response
    }

    fn result(content: &str) -> RetrievalResult {
        RetrievalResult {
            id: "r1".to_string(),
            content: content.to_string(),
            relevance_score: 0.9,
            source: "memory".to_string(),
            result_type: None,
            created_at: None,
            metadata: serde_json::Value::Null,
        }
    }

    #[test]
    fn test_prompt_includes_persona() {
        let prompt = build_system_prompt(&persona(), &response_with(vec![]), &[]);
        assert!(prompt.contains("You are Alex"));
        assert!(prompt.contains("direct tone"));
    }

    #[test]
    fn test_prompt_empty_retrieval_falls_back() {
        let prompt = build_system_prompt(&persona(), &response_with(vec![]), &[]);
        assert!(prompt.contains("No personal knowledge matched"));
    }

    #[test]
    fn test_prompt_includes_context_lines() {
        let prompt = build_system_prompt(
            &persona(),
            &response_with(vec![result("remote work is fine")]),
            &[],
        );
        assert!(prompt.contains("[memory] remote work is fine"));
    }

    #[test]
    fn test_prompt_lists_recent_queries() {
        let prompt = build_system_prompt(
            &persona(),
            &response_with(vec![]),
            &["AI news (cached)".to_string(), "weather".to_string()],
        );
        assert!(prompt.contains("do NOT repeat"));
        assert!(prompt.contains("- AI news (cached)"));
        assert!(prompt.contains("- weather"));
    }

    #[test]
    fn test_derive_title_truncates() {
        let title = derive_title(&"word ".repeat(30));
        assert!(title.chars().count() <= 49);
        assert!(title.ends_with('…'));
    }

    #[test]
    fn test_derive_title_short_query() {
        assert_eq!(derive_title("  Remote   work?  "), "Remote work?");
    }

    #[test]
    fn test_derive_title_empty() {
        assert_eq!(derive_title("   "), "New conversation");
    }
}
