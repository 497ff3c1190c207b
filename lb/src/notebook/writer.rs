//! Notebook document writing and reading

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use super::cell::{GeneratedCells, NotebookCell};
use super::error::NotebookError;
use crate::workflow::WorkflowState;

pub const NBFORMAT: u32 = 4;
pub const NBFORMAT_MINOR: u32 = 4;
pub const NOTEBOOK_EXTENSION: &str = "ipynb";

/// Stem used when nothing of the topic survives sanitizing
const DEFAULT_STEM: &str = "lesson";

/// An nbformat 4 document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notebook {
    pub cells: Vec<NotebookCell>,
    #[serde(default)]
    pub metadata: NotebookMetadata,
    pub nbformat: u32,
    pub nbformat_minor: u32,
}

/// Notebook-level metadata; missing entries read back as the Python 3 defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotebookMetadata {
    pub kernelspec: KernelSpec,
    pub language_info: LanguageInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelSpec {
    pub display_name: String,
    pub language: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageInfo {
    pub name: String,
}

impl Default for NotebookMetadata {
    fn default() -> Self {
        Self {
            kernelspec: KernelSpec {
                display_name: "Python 3".to_string(),
                language: "python".to_string(),
                name: "python3".to_string(),
            },
            language_info: LanguageInfo {
                name: "python".to_string(),
            },
        }
    }
}

impl Notebook {
    pub fn new(cells: Vec<NotebookCell>) -> Self {
        Self {
            cells,
            metadata: NotebookMetadata::default(),
            nbformat: NBFORMAT,
            nbformat_minor: NBFORMAT_MINOR,
        }
    }
}

/// File name for a topic: letters, digits, `_` and `-` only, plus the extension
pub fn notebook_filename(topic: &str) -> String {
    let stem: String = topic
        .trim()
        .chars()
        .map(|c| if matches!(c, ' ' | '/' | '\\') { '_' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'))
        .collect();

    let stem = if stem.is_empty() { DEFAULT_STEM } else { stem.as_str() };
    format!("{}.{}", stem, NOTEBOOK_EXTENSION)
}

/// Serialize a notebook to `path`
pub fn write_notebook(path: &Path, notebook: &Notebook) -> Result<(), NotebookError> {
    debug!(?path, cells = notebook.cells.len(), "write_notebook: called");
    if notebook.cells.is_empty() {
        return Err(NotebookError::EmptyCells);
    }

    let mut json = serde_json::to_string_pretty(notebook)?;
    json.push('\n');
    fs::write(path, json).map_err(|e| NotebookError::io(path, e))
}

/// Parse an nbformat 4 notebook
///
/// Markdown and code cells only; a `raw` cell is a JSON error.
pub fn read_notebook(path: &Path) -> Result<Notebook, NotebookError> {
    debug!(?path, "read_notebook: called");
    let content = fs::read_to_string(path).map_err(|e| NotebookError::io(path, e))?;
    let notebook: Notebook = serde_json::from_str(&content)?;

    if notebook.nbformat != NBFORMAT {
        return Err(NotebookError::UnsupportedFormat(notebook.nbformat));
    }
    Ok(notebook)
}

/// The Save step
pub struct NotebookWriter {
    output_dir: PathBuf,
}

impl NotebookWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Write the generated cells; failures are recorded on the state, never returned
    pub fn save(&self, mut state: WorkflowState) -> WorkflowState {
        debug!(approved = state.approved, "NotebookWriter::save: called");
        if !state.approved || state.cells.is_empty() {
            debug!("NotebookWriter::save: nothing to save");
            return state;
        }

        let cells = match &state.cells {
            GeneratedCells::Parsed(cells) => cells.clone(),
            GeneratedCells::Unparsed { .. } => {
                info!("Writing fallback cells for unparsed generator output");
                state.cells.resolve(&state.topic, &state.outline)
            }
        };

        match self.write(&state.topic, cells) {
            Ok(path) => {
                info!(path = %path.display(), "Notebook saved");
                state.notebook_file = Some(path);
                state.save_error = None;
            }
            Err(e) => {
                error!(error = %e, "Failed to save notebook");
                state.notebook_file = None;
                state.save_error = Some(e.to_string());
            }
        }
        state
    }

    fn write(&self, topic: &str, cells: Vec<NotebookCell>) -> Result<PathBuf, NotebookError> {
        fs::create_dir_all(&self.output_dir).map_err(|e| NotebookError::io(&self.output_dir, e))?;
        let path = self.output_dir.join(notebook_filename(topic));
        write_notebook(&path, &Notebook::new(cells))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notebook::CellKind;
    use proptest::prelude::*;

    fn approved_with(cells: GeneratedCells) -> WorkflowState {
        let mut state = WorkflowState::new("Intro to NumPy");
        state.outline = "1. Arrays".to_string();
        state.approved = true;
        state.cells = cells;
        state
    }

    #[test]
    fn test_notebook_filename() {
        assert_eq!(notebook_filename("Intro to NumPy"), "Intro_to_NumPy.ipynb");
        assert_eq!(notebook_filename("Intro: NumPy/Pandas!"), "Intro_NumPy_Pandas.ipynb");
        assert_eq!(notebook_filename(r"C:\temp\x"), "C_temp_x.ipynb");
        assert_eq!(notebook_filename("../../etc/passwd"), "__etc_passwd.ipynb");
        assert_eq!(notebook_filename("???"), "lesson.ipynb");
        assert_eq!(notebook_filename(""), "lesson.ipynb");
    }

    proptest! {
        #[test]
        fn prop_filename_is_allow_listed(topic in ".*") {
            let name = notebook_filename(&topic);
            let stem = name.strip_suffix(".ipynb").unwrap();
            prop_assert!(!stem.is_empty());
            prop_assert!(stem.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'));
        }
    }

    #[test]
    fn test_save_round_trip() {
        let temp = tempfile::tempdir().unwrap();
        let cells = vec![
            NotebookCell::markdown("# Intro to NumPy\nArrays"),
            NotebookCell::code("import numpy as np\nnp.arange(3)"),
        ];
        let writer = NotebookWriter::new(temp.path());

        let state = writer.save(approved_with(GeneratedCells::Parsed(cells.clone())));

        let path = state.notebook_file.clone().unwrap();
        assert_eq!(path, temp.path().join("Intro_to_NumPy.ipynb"));
        assert!(state.save_error.is_none());

        let notebook = read_notebook(&path).unwrap();
        assert_eq!(notebook.cells, cells);
        assert_eq!(notebook.nbformat, 4);
        assert_eq!(notebook.nbformat_minor, 4);
        assert_eq!(notebook.metadata.kernelspec.name, "python3");
    }

    #[test]
    fn test_save_document_schema() {
        let temp = tempfile::tempdir().unwrap();
        let writer = NotebookWriter::new(temp.path());
        let state = writer.save(approved_with(GeneratedCells::Parsed(vec![NotebookCell::code("x = 1")])));

        let raw = fs::read_to_string(state.notebook_file.unwrap()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["nbformat"], 4);
        assert_eq!(json["metadata"]["kernelspec"]["language"], "python");
        assert_eq!(json["cells"][0]["cell_type"], "code");
        assert!(json["cells"][0]["execution_count"].is_null());
        assert_eq!(json["cells"][0]["outputs"], serde_json::json!([]));
    }

    #[test]
    fn test_save_unparsed_writes_fallback() {
        let temp = tempfile::tempdir().unwrap();
        let writer = NotebookWriter::new(temp.path().join("nested/out"));
        let state = writer.save(approved_with(GeneratedCells::Unparsed {
            raw: "garbage".to_string(),
        }));

        let notebook = read_notebook(state.notebook_file.as_ref().unwrap()).unwrap();
        assert_eq!(notebook.cells.len(), 3);
        assert!(notebook.cells[0].text().contains("Intro to NumPy"));
        assert!(notebook.cells[2].text().contains("garbage"));
    }

    #[test]
    fn test_save_skips_unapproved_and_empty() {
        let temp = tempfile::tempdir().unwrap();
        let writer = NotebookWriter::new(temp.path());

        let mut unapproved = approved_with(GeneratedCells::Parsed(vec![NotebookCell::code("x")]));
        unapproved.approved = false;
        assert!(writer.save(unapproved).notebook_file.is_none());

        let empty = writer.save(approved_with(GeneratedCells::default()));
        assert!(empty.notebook_file.is_none());
        assert!(empty.save_error.is_none());
        assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_save_failure_is_recorded() {
        let temp = tempfile::tempdir().unwrap();
        // A file where the output directory should be
        let blocker = temp.path().join("blocker");
        fs::write(&blocker, "not a directory").unwrap();
        let writer = NotebookWriter::new(&blocker);

        let state = writer.save(approved_with(GeneratedCells::Parsed(vec![NotebookCell::code("x")])));
        assert!(state.notebook_file.is_none());
        assert!(state.save_error.is_some());
    }

    #[test]
    fn test_read_jupyter_written_notebook() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("jupyter.ipynb");
        fs::write(
            &path,
            r##"{"cells": [
                {"cell_type": "markdown", "id": "a1", "metadata": {}, "source": "# Title\nBody"},
                {"cell_type": "code", "execution_count": 2, "metadata": {"tags": []},
                 "outputs": [{"output_type": "stream", "name": "stdout", "text": ["hi\n"]}],
                 "source": ["print('hi')"]}
            ], "metadata": {}, "nbformat": 4, "nbformat_minor": 5}"##,
        )
        .unwrap();

        let notebook = read_notebook(&path).unwrap();
        assert_eq!(notebook.cells.len(), 2);
        assert_eq!(notebook.cells[0].source().to_vec(), vec!["# Title\n".to_string(), "Body".to_string()]);
        assert_eq!(notebook.cells[1].kind(), CellKind::Code);
        assert_eq!(notebook.cells[1].text(), "print('hi')");
        assert_eq!(notebook.metadata, NotebookMetadata::default());
        assert_eq!(notebook.nbformat_minor, 5);
    }

    #[test]
    fn test_read_rejects_other_formats() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("old.ipynb");
        fs::write(
            &path,
            r#"{"cells": [], "metadata": {"kernelspec": {"display_name": "", "language": "", "name": ""},
                "language_info": {"name": ""}}, "nbformat": 3, "nbformat_minor": 0}"#,
        )
        .unwrap();
        assert!(matches!(read_notebook(&path), Err(NotebookError::UnsupportedFormat(3))));
    }
}
