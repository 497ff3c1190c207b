//! Embedded prompts
//!
//! These are compiled into the binary from .pmt files at build time.

use tracing::debug;

/// Topic suggestion when none was supplied
pub const CLARIFY: &str = include_str!("../../prompts/clarify.pmt");

/// Lesson outline
pub const PLAN: &str = include_str!("../../prompts/plan.pmt");

/// Outline revision from human feedback
pub const REVISE: &str = include_str!("../../prompts/revise.pmt");

/// Few-shot package name extraction
pub const EXTRACT_PACKAGES: &str = include_str!("../../prompts/extract-packages.pmt");

/// Notebook cell generation
pub const GENERATE: &str = include_str!("../../prompts/generate.pmt");

/// Get the embedded prompt by name
pub fn get_embedded(name: &str) -> Option<&'static str> {
    debug!(%name, "get_embedded: called");
    match name {
        "clarify" => Some(CLARIFY),
        "plan" => Some(PLAN),
        "revise" => Some(REVISE),
        "extract-packages" => Some(EXTRACT_PACKAGES),
        "generate" => Some(GENERATE),
        _ => {
            debug!("get_embedded: no match found");
            None
        }
    }
}
