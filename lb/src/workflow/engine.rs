//! Workflow orchestrator
//!
//! A fixed set of named steps wired by conditional transitions:
//!
//! ```text
//! Clarify -> Plan -> Approve -+-> Research -> Generate -> Save -> Done
//!                     ^       |   (skipped when research is disabled)
//!                     |       +-> Revise --+
//!                     +--------------------+
//!                             +-> Done (quit)
//! ```

use std::sync::Arc;

use eyre::{Context, Result};
use tracing::{debug, info};

use super::approval::{ApprovalState, HumanInput, apply_decision, request_decision};
use super::planner::Planner;
use super::WorkflowState;
use crate::config::Config;
use crate::llm::LlmClient;
use crate::notebook::{NotebookGenerator, NotebookWriter};
use crate::prompts::PromptLoader;
use crate::research::ResearchAggregator;

/// Named workflow steps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Clarify,
    Plan,
    Approve,
    Revise,
    Research,
    Generate,
    Save,
    Done,
}

/// Step that follows `step`, given where approval stands
pub fn next_step(step: Step, approval: ApprovalState, research_enabled: bool) -> Step {
    match step {
        Step::Clarify => Step::Plan,
        Step::Plan => Step::Approve,
        Step::Approve => match approval {
            ApprovalState::Approved if research_enabled => Step::Research,
            ApprovalState::Approved => Step::Generate,
            ApprovalState::Revising => Step::Revise,
            ApprovalState::Quit => Step::Done,
            // No decision recorded; ask again
            ApprovalState::Planned => Step::Approve,
        },
        Step::Revise => Step::Approve,
        Step::Research => Step::Generate,
        Step::Generate => Step::Save,
        Step::Save | Step::Done => Step::Done,
    }
}

/// Runs one topic through every step
pub struct Workflow {
    planner: Planner,
    research: Option<ResearchAggregator>,
    generator: NotebookGenerator,
    writer: NotebookWriter,
}

impl Workflow {
    pub fn new(
        planner: Planner,
        research: Option<ResearchAggregator>,
        generator: NotebookGenerator,
        writer: NotebookWriter,
    ) -> Self {
        Self {
            planner,
            research,
            generator,
            writer,
        }
    }

    /// Wire the steps with HTTP-backed research collaborators
    pub fn from_config(llm: Arc<dyn LlmClient>, prompts: Arc<PromptLoader>, config: &Config) -> Result<Self> {
        debug!(research_enabled = config.research.enabled, "Workflow::from_config: called");
        let research = if config.research.enabled {
            Some(
                ResearchAggregator::from_config(llm.clone(), prompts.clone(), config)
                    .context("Failed to set up research")?,
            )
        } else {
            None
        };

        Ok(Self::new(
            Planner::new(llm.clone(), prompts.clone(), config.llm.max_tokens),
            research,
            NotebookGenerator::new(llm, prompts, config.research.clone(), config.llm.max_tokens),
            NotebookWriter::new(&config.output.dir),
        ))
    }

    /// Drive the state from Clarify to Done
    ///
    /// Only a failing input device is an error; every other failure is
    /// absorbed by the step it happened in.
    pub async fn run(&self, mut state: WorkflowState, input: &mut dyn HumanInput) -> Result<WorkflowState> {
        let mut step = Step::Clarify;
        let mut approval = ApprovalState::Planned;

        while step != Step::Done {
            info!(?step, "Running step");
            state = match step {
                Step::Clarify => self.planner.clarify(state).await,
                Step::Plan => self.planner.plan(state).await,
                Step::Approve => {
                    let decision = request_decision(&state, input).context("Failed to read approval decision")?;
                    approval = approval.transition(&decision);
                    apply_decision(state, decision)
                }
                Step::Revise => {
                    let state = self.planner.revise(state).await;
                    approval = approval.revised();
                    state
                }
                Step::Research => match &self.research {
                    Some(research) => research.run(state).await,
                    None => state,
                },
                Step::Generate => self.generator.generate(state).await,
                Step::Save => self.writer.save(state),
                Step::Done => state,
            };

            step = next_step(step, approval, self.research.is_some());
            debug!(?step, ?approval, "Workflow::run: next step");
        }

        info!(
            approved = state.approved,
            notebook = ?state.notebook_file,
            "Workflow finished"
        );
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResearchConfig;
    use crate::llm::client::mock::MockLlmClient;
    use crate::notebook::GeneratedCells;
    use crate::workflow::ScriptedInput;

    fn workflow(mock: Arc<MockLlmClient>, dir: &std::path::Path) -> Workflow {
        let prompts = Arc::new(PromptLoader::embedded_only());
        Workflow::new(
            Planner::new(mock.clone(), prompts.clone(), 1024),
            None,
            NotebookGenerator::new(mock, prompts, ResearchConfig::default(), 1024),
            NotebookWriter::new(dir),
        )
    }

    #[test]
    fn test_next_step() {
        use ApprovalState::*;
        assert_eq!(next_step(Step::Clarify, Planned, true), Step::Plan);
        assert_eq!(next_step(Step::Plan, Planned, true), Step::Approve);
        assert_eq!(next_step(Step::Approve, Approved, true), Step::Research);
        assert_eq!(next_step(Step::Approve, Approved, false), Step::Generate);
        assert_eq!(next_step(Step::Approve, Revising, true), Step::Revise);
        assert_eq!(next_step(Step::Approve, Quit, true), Step::Done);
        assert_eq!(next_step(Step::Revise, Planned, true), Step::Approve);
        assert_eq!(next_step(Step::Research, Approved, true), Step::Generate);
        assert_eq!(next_step(Step::Generate, Approved, true), Step::Save);
        assert_eq!(next_step(Step::Save, Approved, true), Step::Done);
    }

    #[tokio::test]
    async fn test_run_revise_then_approve() {
        let temp = tempfile::tempdir().unwrap();
        let mock = Arc::new(MockLlmClient::with_texts(&[
            "1. Arrays",
            "1. Arrays\n2. Broadcasting",
            r##"[{"cell_type": "markdown", "source": "# NumPy"}]"##,
        ]));
        let mut input = ScriptedInput::new(["r", "Add broadcasting", "a"]);

        let state = workflow(mock.clone(), temp.path())
            .run(WorkflowState::new("Intro to NumPy"), &mut input)
            .await
            .unwrap();

        assert!(state.approved);
        assert_eq!(state.outline, "1. Arrays\n2. Broadcasting");
        assert!(state.feedback.is_empty());
        assert!(!state.needs_feedback);
        assert!(matches!(&state.cells, GeneratedCells::Parsed(cells) if cells.len() == 1));
        assert_eq!(state.notebook_file, Some(temp.path().join("Intro_to_NumPy.ipynb")));
        assert_eq!(mock.call_count(), 3);
        // Shown twice: the original outline and the revision
        assert_eq!(input.shown().iter().filter(|s| s.contains("Proposed outline")).count(), 2);
    }

    #[tokio::test]
    async fn test_run_quit_writes_nothing() {
        let temp = tempfile::tempdir().unwrap();
        let mock = Arc::new(MockLlmClient::with_texts(&["1. Arrays"]));
        let mut input = ScriptedInput::new(["q"]);

        let state = workflow(mock.clone(), temp.path())
            .run(WorkflowState::new("Intro to NumPy"), &mut input)
            .await
            .unwrap();

        assert!(!state.approved);
        assert!(state.cells.is_empty());
        assert!(state.notebook_file.is_none());
        assert_eq!(mock.call_count(), 1);
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
    }
}
