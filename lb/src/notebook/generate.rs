//! Cell generation and parsing of the model's answer

use std::sync::Arc;

use serde_json::{Value, json};
use tracing::{debug, info, warn};

use super::cell::{CellKind, GeneratedCells, NotebookCell};
use crate::config::ResearchConfig;
use crate::llm::{LlmClient, complete_text};
use crate::prompts::{PromptLoader, SYSTEM_PROMPT};
use crate::research::research_context;
use crate::workflow::WorkflowState;

/// Generates lesson cells from the approved outline and research
pub struct NotebookGenerator {
    llm: Arc<dyn LlmClient>,
    prompts: Arc<PromptLoader>,
    research: ResearchConfig,
    max_tokens: u32,
}

impl NotebookGenerator {
    pub fn new(llm: Arc<dyn LlmClient>, prompts: Arc<PromptLoader>, research: ResearchConfig, max_tokens: u32) -> Self {
        Self {
            llm,
            prompts,
            research,
            max_tokens,
        }
    }

    /// Fill `state.cells`; unapproved states get an empty cell list
    pub async fn generate(&self, mut state: WorkflowState) -> WorkflowState {
        debug!(approved = state.approved, "NotebookGenerator::generate: called");
        if !state.approved {
            debug!("NotebookGenerator::generate: not approved, skipping");
            state.cells = GeneratedCells::default();
            return state;
        }

        info!(topic = %state.topic, "Generating notebook cells");
        let raw = match self.complete(&state).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Cell generation failed, using fallback cells");
                String::new()
            }
        };

        state.cells = match parse_cells(&raw) {
            Some(cells) => {
                info!(cells = cells.len(), "Parsed generated cells");
                GeneratedCells::Parsed(cells)
            }
            None => {
                warn!(raw_len = raw.len(), "Generated output is not a cell list, using fallback cells");
                GeneratedCells::Unparsed { raw }
            }
        };
        state
    }

    async fn complete(&self, state: &WorkflowState) -> eyre::Result<String> {
        let research = research_context(state, &self.research);
        debug!(has_research = research.is_some(), "NotebookGenerator::complete: called");

        let prompt = self.prompts.render(
            "generate",
            &json!({
                "topic": state.topic,
                "outline": state.outline,
                "research": research,
            }),
        )?;
        Ok(complete_text(&self.llm, SYSTEM_PROMPT, &prompt, self.max_tokens).await?)
    }
}

/// Remove a surrounding Markdown code fence (with or without a language tag)
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Drop the info string ("json") on the opening fence line
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Read the model's answer as a list of cells
///
/// Accepts a JSON array of cells or an object with a `cells` array. Returns
/// `None` when nothing usable could be read, including an empty list.
pub fn parse_cells(raw: &str) -> Option<Vec<NotebookCell>> {
    debug!(raw_len = raw.len(), "parse_cells: called");
    let text = strip_code_fences(raw);

    let value = serde_json::from_str::<Value>(text).ok().or_else(|| {
        // Prose around the array: retry on the outermost brackets
        let start = text.find('[')?;
        let end = text.rfind(']')?;
        (start < end)
            .then(|| serde_json::from_str::<Value>(&text[start..=end]).ok())
            .flatten()
    })?;

    let items = match &value {
        Value::Array(items) => items,
        Value::Object(map) => map.get("cells")?.as_array()?,
        _ => return None,
    };

    let cells: Vec<NotebookCell> = items.iter().filter_map(parse_cell).collect();
    debug!(items = items.len(), cells = cells.len(), "parse_cells: parsed");
    (!cells.is_empty()).then_some(cells)
}

fn parse_cell(item: &Value) -> Option<NotebookCell> {
    let kind = item
        .get("cell_type")
        .or_else(|| item.get("type"))
        .and_then(Value::as_str)?;
    let kind = match kind.trim().to_lowercase().as_str() {
        "code" | "python" => CellKind::Code,
        "markdown" | "md" | "text" => CellKind::Markdown,
        other => {
            debug!(%other, "parse_cell: unknown cell type, skipping");
            return None;
        }
    };

    let text = match item.get("source")? {
        Value::String(s) => s.clone(),
        Value::Array(lines) => {
            let lines: Vec<&str> = lines.iter().filter_map(Value::as_str).collect();
            if lines.iter().any(|l| l.ends_with('\n')) {
                lines.concat()
            } else {
                lines.join("\n")
            }
        }
        _ => return None,
    };

    Some(NotebookCell::new(kind, &text))
}
