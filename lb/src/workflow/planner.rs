//! Clarify, Plan and Revise steps

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info, warn};

use super::WorkflowState;
use crate::llm::{LlmClient, complete_text};
use crate::prompts::{PromptLoader, SYSTEM_PROMPT};

const CLARIFY_MAX_TOKENS: u32 = 64;

/// Produces and revises the lesson outline
pub struct Planner {
    llm: Arc<dyn LlmClient>,
    prompts: Arc<PromptLoader>,
    max_tokens: u32,
}

impl Planner {
    pub fn new(llm: Arc<dyn LlmClient>, prompts: Arc<PromptLoader>, max_tokens: u32) -> Self {
        Self {
            llm,
            prompts,
            max_tokens,
        }
    }

    /// Keep a supplied topic, otherwise ask the model for one
    pub async fn clarify(&self, mut state: WorkflowState) -> WorkflowState {
        debug!(topic = %state.topic, "Planner::clarify: called");
        if !state.topic.trim().is_empty() {
            debug!("Planner::clarify: topic supplied");
            return state;
        }

        match self.ask("clarify", &json!({}), CLARIFY_MAX_TOKENS).await {
            Ok(text) => {
                state.topic = clean_topic(&text);
                info!(topic = %state.topic, "Derived topic");
            }
            Err(e) => warn!(error = %e, "Topic suggestion failed, continuing without a topic"),
        }
        state
    }

    /// Draft the outline for the topic
    pub async fn plan(&self, mut state: WorkflowState) -> WorkflowState {
        debug!(topic = %state.topic, "Planner::plan: called");
        match self.ask("plan", &json!({"topic": state.topic}), self.max_tokens).await {
            Ok(outline) => {
                info!(outline_len = outline.len(), "Outline generated");
                state.outline = outline;
            }
            Err(e) => {
                warn!(error = %e, "Outline generation failed");
                state.outline = String::new();
            }
        }
        state
    }

    /// Apply pending feedback to the outline
    ///
    /// `feedback` and `needs_feedback` are cleared whatever happens; a failed
    /// or empty answer keeps the previous outline.
    pub async fn revise(&self, mut state: WorkflowState) -> WorkflowState {
        debug!(needs_feedback = state.needs_feedback, "Planner::revise: called");
        let feedback = std::mem::take(&mut state.feedback);
        state.needs_feedback = false;

        if feedback.trim().is_empty() {
            debug!("Planner::revise: no feedback to apply");
            return state;
        }

        let context = json!({
            "topic": state.topic,
            "outline": state.outline,
            "feedback": feedback,
        });
        match self.ask("revise", &context, self.max_tokens).await {
            Ok(outline) if !outline.is_empty() => {
                info!(outline_len = outline.len(), "Outline revised");
                state.outline = outline;
            }
            Ok(_) => warn!("Revision returned nothing, keeping previous outline"),
            Err(e) => warn!(error = %e, "Outline revision failed, keeping previous outline"),
        }
        state
    }

    async fn ask(&self, template: &str, context: &serde_json::Value, max_tokens: u32) -> eyre::Result<String> {
        let prompt = self.prompts.render(template, context)?;
        Ok(complete_text(&self.llm, SYSTEM_PROMPT, &prompt, max_tokens).await?)
    }
}

/// First non-empty line, without surrounding quotes or trailing period
fn clean_topic(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("")
        .trim_matches(|c| c == '"' || c == '\'')
        .trim_end_matches('.')
        .trim()
        .to_string()
}
