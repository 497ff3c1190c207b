//! Prompt Template System
//!
//! Loads and renders `.pmt` (prompt template) files for each workflow step.
//!
//! Template loading chain:
//! 1. `.lessonbuilder/prompts/{name}.pmt` (user override)
//! 2. Embedded fallback in code
//!
//! Templates use Handlebars syntax for variable substitution.

pub mod embedded;
mod loader;

pub use loader::PromptLoader;

/// System prompt shared by every completion call
pub const SYSTEM_PROMPT: &str = "You are an experienced Python instructor who designs hands-on Jupyter notebook lessons. \
     Follow the requested output format exactly.";
