//! Approval checkpoint: the approve / revise / quit state machine
//!
//! ```text
//! PLANNED --approve--> APPROVED   (terminal)
//! PLANNED --feedback-> REVISING --revised--> PLANNED
//! PLANNED --quit-----> QUIT       (terminal)
//! ```

use std::collections::VecDeque;

use colored::Colorize;
use eyre::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::debug;

use super::WorkflowState;

const MENU_PROMPT: &str = "[a]pprove / [r]evise / [q]uit > ";
const FEEDBACK_PROMPT: &str = "What should change? > ";

/// A human decision at the checkpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Feedback(String),
    Quit,
}

/// Where the plan stands in the approval loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalState {
    Planned,
    Approved,
    Revising,
    Quit,
}

impl ApprovalState {
    /// Apply a human decision; only `Planned` accepts one
    pub fn transition(self, decision: &Decision) -> Self {
        match (self, decision) {
            (Self::Planned, Decision::Approve) => Self::Approved,
            (Self::Planned, Decision::Feedback(_)) => Self::Revising,
            (Self::Planned, Decision::Quit) => Self::Quit,
            (state, _) => {
                debug!(?state, "ApprovalState::transition: decision ignored outside Planned");
                state
            }
        }
    }

    /// The outline was regenerated
    pub fn revised(self) -> Self {
        match self {
            Self::Revising => Self::Planned,
            state => state,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Quit)
    }
}

/// Record a decision on the state
///
/// approve: `(approved, needs_feedback) = (true, false)`,
/// feedback: `(false, true)` with the text stored,
/// quit: `(false, false)`.
pub fn apply_decision(mut state: WorkflowState, decision: Decision) -> WorkflowState {
    debug!(?decision, "apply_decision: called");
    match decision {
        Decision::Approve => {
            state.approved = true;
            state.needs_feedback = false;
        }
        Decision::Feedback(text) => {
            state.approved = false;
            state.needs_feedback = true;
            state.feedback = text.trim().to_string();
        }
        Decision::Quit => {
            state.approved = false;
            state.needs_feedback = false;
        }
    }
    state
}

/// Menu entries, before feedback text is collected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Choice {
    Approve,
    Revise,
    Quit,
}

fn parse_choice(input: &str) -> Option<Choice> {
    match input.trim().to_lowercase().as_str() {
        "a" | "approve" | "y" | "yes" => Some(Choice::Approve),
        "r" | "revise" | "f" | "feedback" | "n" | "no" => Some(Choice::Revise),
        "q" | "quit" | "exit" => Some(Choice::Quit),
        _ => None,
    }
}

/// Interactive device the checkpoint talks to
pub trait HumanInput {
    /// Display text to the human
    fn show(&mut self, text: &str);

    /// Read one line; `Ok(None)` at end of input
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>>;
}

/// Terminal input with line editing
#[derive(Default)]
pub struct TerminalInput {
    editor: Option<DefaultEditor>,
}

impl TerminalInput {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HumanInput for TerminalInput {
    fn show(&mut self, text: &str) {
        println!("{}", text);
    }

    fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        if self.editor.is_none() {
            let editor = DefaultEditor::new().map_err(|e| eyre::eyre!("Failed to initialize readline: {}", e))?;
            self.editor = Some(editor);
        }
        let Some(editor) = self.editor.as_mut() else {
            return Err(eyre::eyre!("Readline editor unavailable"));
        };

        match editor.readline(prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = editor.add_history_entry(line.trim());
                }
                Ok(Some(line))
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                debug!("TerminalInput::read_line: end of input");
                println!();
                Ok(None)
            }
            Err(err) => Err(eyre::eyre!("Readline error: {}", err)),
        }
    }
}

/// Replays a fixed script of answers; runs out as end of input
#[derive(Debug, Default)]
pub struct ScriptedInput {
    lines: VecDeque<String>,
    shown: Vec<String>,
    prompts: Vec<String>,
}

impl ScriptedInput {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Everything shown so far
    pub fn shown(&self) -> &[String] {
        &self.shown
    }

    /// Every prompt read so far
    pub fn prompts(&self) -> &[String] {
        &self.prompts
    }

    /// Answers not yet consumed
    pub fn remaining(&self) -> usize {
        self.lines.len()
    }
}

impl HumanInput for ScriptedInput {
    fn show(&mut self, text: &str) {
        self.shown.push(text.to_string());
    }

    fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        self.prompts.push(prompt.to_string());
        Ok(self.lines.pop_front())
    }
}

/// Render the plan awaiting approval
pub fn render_plan(state: &WorkflowState) -> String {
    let outline = if state.outline.trim().is_empty() {
        "(no outline generated)"
    } else {
        state.outline.trim()
    };

    format!(
        "\n{} {}\n\n{}\n{}\n",
        "Topic:".bold(),
        state.topic,
        "Proposed outline:".bold(),
        outline
    )
}

/// Show the plan and ask until a valid decision comes back
///
/// End of input at any prompt is a quit.
pub fn request_decision(state: &WorkflowState, input: &mut dyn HumanInput) -> Result<Decision> {
    debug!(topic = %state.topic, "request_decision: called");
    input.show(&render_plan(state));

    loop {
        let Some(line) = input.read_line(MENU_PROMPT)? else {
            debug!("request_decision: end of input at menu");
            return Ok(Decision::Quit);
        };

        match parse_choice(&line) {
            Some(Choice::Approve) => return Ok(Decision::Approve),
            Some(Choice::Quit) => return Ok(Decision::Quit),
            Some(Choice::Revise) => return read_feedback(input),
            None => {
                debug!(%line, "request_decision: unrecognized choice");
                input.show(&format!(
                    "{} '{}'. Enter a, r or q.",
                    "Unrecognized choice".yellow(),
                    line.trim()
                ));
            }
        }
    }
}

fn read_feedback(input: &mut dyn HumanInput) -> Result<Decision> {
    loop {
        let Some(line) = input.read_line(FEEDBACK_PROMPT)? else {
            debug!("read_feedback: end of input");
            return Ok(Decision::Quit);
        };

        let text = line.trim();
        if !text.is_empty() {
            return Ok(Decision::Feedback(text.to_string()));
        }
        input.show("Feedback cannot be empty.");
    }
}
