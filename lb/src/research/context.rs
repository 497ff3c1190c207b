//! Research context rendered into the generation prompt

use crate::config::ResearchConfig;
use crate::workflow::WorkflowState;

/// First `max_chars` characters of `text`, with "..." appended when cut
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// Summarize the research held on the state for the generation prompt
///
/// Returns `None` when research produced nothing worth including.
pub fn research_context(state: &WorkflowState, config: &ResearchConfig) -> Option<String> {
    let mut sections = Vec::new();

    let packages: Vec<String> = state
        .package_names
        .iter()
        .filter_map(|name| state.package_info.get(name).map(|info| (name, info)))
        .map(|(name, info)| {
            let mut line = format!("- {} {}", name, info.version);
            if !info.summary.is_empty() {
                line.push_str(&format!(": {}", info.summary));
            }
            if let Some(docs) = &info.docs_url {
                line.push_str(&format!(" (docs: {})", docs));
            }
            line
        })
        .collect();
    if !packages.is_empty() {
        sections.push(format!("Current package versions:\n{}", packages.join("\n")));
    }

    let findings: Vec<String> = state
        .research_results
        .iter()
        .map(|r| {
            format!(
                "- [{}] {}: {} ({})",
                r.package,
                r.title,
                truncate_chars(r.snippet.trim(), config.snippet_prompt_chars),
                r.url
            )
        })
        .collect();
    if !findings.is_empty() {
        sections.push(format!("Search findings:\n{}", findings.join("\n")));
    }

    let docs = state.doc_content.trim();
    if !docs.is_empty() {
        sections.push(format!(
            "Documentation excerpts:\n{}",
            truncate_chars(docs, config.doc_prompt_chars)
        ));
    }

    (!sections.is_empty()).then(|| sections.join("\n\n"))
}
