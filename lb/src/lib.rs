//! LessonBuilder - human-in-the-loop lesson notebook builder
//!
//! Takes a topic through a linear pipeline and writes a Jupyter notebook:
//!
//! Clarify → Plan → Approve (↔ Revise) → Research → Generate → Save
//!
//! # Modules
//!
//! - [`workflow`] - Shared state, approval state machine, orchestrator
//! - [`research`] - Research aggregator (package metadata, search, docs)
//! - [`notebook`] - Cell generation and `.ipynb` writing
//! - [`llm`] - LLM client trait and Anthropic/OpenAI implementations
//! - [`prompts`] - Prompt templates
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod config;
pub mod llm;
pub mod notebook;
pub mod prompts;
pub mod research;
pub mod workflow;

// Re-export commonly used types
pub use config::{Config, LlmConfig, OutputConfig, ResearchConfig, SearchSettings};
pub use llm::{AnthropicClient, CompletionRequest, CompletionResponse, LlmClient, LlmError, OpenAIClient, create_client};
pub use notebook::{CellKind, GeneratedCells, Notebook, NotebookCell, NotebookError, NotebookGenerator, NotebookWriter};
pub use prompts::PromptLoader;
pub use research::{
    PackageInfo, PackageRegistry, PageFetcher, ResearchAggregator, ResearchError, ResearchResult, SearchHit,
    SearchProvider,
};
pub use workflow::{Decision, HumanInput, ScriptedInput, TerminalInput, Workflow, WorkflowState};
