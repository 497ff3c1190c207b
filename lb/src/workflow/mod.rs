//! Workflow: shared state, approval loop, planning steps and the orchestrator

mod approval;
mod engine;
mod planner;
mod state;

pub use approval::{
    ApprovalState, Decision, HumanInput, ScriptedInput, TerminalInput, apply_decision, render_plan, request_decision,
};
pub use engine::{Step, Workflow, next_step};
pub use planner::Planner;
pub use state::WorkflowState;
