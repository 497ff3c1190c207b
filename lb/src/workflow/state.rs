//! The record threaded through every workflow step

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::notebook::GeneratedCells;
use crate::research::{PackageInfo, ResearchResult};

/// State owned by whichever step is running
///
/// Each step takes the state by value and hands it back; nothing else holds it.
#[derive(Debug, Clone, Default)]
pub struct WorkflowState {
    /// Lesson topic, supplied or derived by Clarify
    pub topic: String,
    /// Free-text lesson plan, written by Plan and Revise
    pub outline: String,
    /// Set only by an explicit human approval
    pub approved: bool,
    /// The human asked for a revision that has not been applied yet
    pub needs_feedback: bool,
    /// Pending revision request, cleared once applied
    pub feedback: String,

    // Owned by the research aggregator
    pub package_names: Vec<String>,
    pub research_results: Vec<ResearchResult>,
    pub package_info: BTreeMap<String, PackageInfo>,
    pub doc_content: String,

    pub cells: GeneratedCells,
    /// Written notebook, `None` until a save succeeds
    pub notebook_file: Option<PathBuf>,
    pub save_error: Option<String>,
}

impl WorkflowState {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            ..Self::default()
        }
    }
}
