//! Notebook cells and the tagged generation result

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Kind of a cell, as written in `cell_type`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    Markdown,
    Code,
}

impl CellKind {
    /// Language tag carried in each cell's metadata
    pub fn language(&self) -> &'static str {
        match self {
            CellKind::Markdown => "markdown",
            CellKind::Code => "python",
        }
    }
}

/// Per-cell metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CellMetadata {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub language: String,
}

/// One notebook cell in nbformat 4 shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cell_type", rename_all = "lowercase")]
pub enum NotebookCell {
    Markdown {
        #[serde(default)]
        metadata: CellMetadata,
        #[serde(deserialize_with = "source_lines")]
        source: Vec<String>,
    },
    Code {
        execution_count: Option<u32>,
        #[serde(default)]
        metadata: CellMetadata,
        #[serde(default)]
        outputs: Vec<Value>,
        #[serde(deserialize_with = "source_lines")]
        source: Vec<String>,
    },
}

/// nbformat allows `source` as a list of lines or a single string
fn source_lines<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Source {
        Lines(Vec<String>),
        Text(String),
    }

    Ok(match Source::deserialize(deserializer)? {
        Source::Lines(lines) => lines,
        Source::Text(text) => text.split_inclusive('\n').map(str::to_string).collect(),
    })
}

impl NotebookCell {
    pub fn markdown(text: &str) -> Self {
        Self::Markdown {
            metadata: CellMetadata {
                language: CellKind::Markdown.language().to_string(),
            },
            source: split_source(text),
        }
    }

    /// A fresh code cell: never executed, no outputs
    pub fn code(text: &str) -> Self {
        Self::Code {
            execution_count: None,
            metadata: CellMetadata {
                language: CellKind::Code.language().to_string(),
            },
            outputs: Vec::new(),
            source: split_source(text),
        }
    }

    pub fn new(kind: CellKind, text: &str) -> Self {
        match kind {
            CellKind::Markdown => Self::markdown(text),
            CellKind::Code => Self::code(text),
        }
    }

    pub fn kind(&self) -> CellKind {
        match self {
            Self::Markdown { .. } => CellKind::Markdown,
            Self::Code { .. } => CellKind::Code,
        }
    }

    pub fn source(&self) -> &[String] {
        match self {
            Self::Markdown { source, .. } | Self::Code { source, .. } => source,
        }
    }

    /// The source lines joined back into one string
    pub fn text(&self) -> String {
        self.source().concat()
    }

    pub fn language(&self) -> &str {
        match self {
            Self::Markdown { metadata, .. } | Self::Code { metadata, .. } => &metadata.language,
        }
    }
}

/// Split cell text into nbformat source lines
///
/// Every line keeps its `\n` except the last; trailing newlines are dropped.
pub fn split_source(text: &str) -> Vec<String> {
    text.trim_end_matches(['\n', '\r'])
        .split_inclusive('\n')
        .map(str::to_string)
        .collect()
}

/// What the generation step produced
///
/// `Unparsed` keeps the raw model output when it could not be read as cells;
/// `resolve` turns it into the fallback lesson.
#[derive(Debug, Clone, PartialEq)]
pub enum GeneratedCells {
    Parsed(Vec<NotebookCell>),
    Unparsed { raw: String },
}

impl Default for GeneratedCells {
    fn default() -> Self {
        Self::Parsed(Vec::new())
    }
}

impl GeneratedCells {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Parsed(cells) => cells.is_empty(),
            Self::Unparsed { .. } => false,
        }
    }

    pub fn is_parsed(&self) -> bool {
        matches!(self, Self::Parsed(_))
    }

    /// Cells to write: parsed cells as-is, or the three-cell fallback
    pub fn resolve(&self, topic: &str, outline: &str) -> Vec<NotebookCell> {
        match self {
            Self::Parsed(cells) => cells.clone(),
            Self::Unparsed { raw } => fallback_cells(topic, outline, raw),
        }
    }
}

/// Title, outline and raw output as three markdown cells
pub fn fallback_cells(topic: &str, outline: &str, raw: &str) -> Vec<NotebookCell> {
    let title = if topic.trim().is_empty() { "Lesson" } else { topic.trim() };
    let outline = if outline.trim().is_empty() {
        "(no outline generated)"
    } else {
        outline.trim()
    };
    let raw = if raw.trim().is_empty() {
        "(the generator returned no content)"
    } else {
        raw.trim()
    };

    vec![
        NotebookCell::markdown(&format!("# {}", title)),
        NotebookCell::markdown(&format!("## Lesson Outline\n\n{}", outline)),
        NotebookCell::markdown(&format!("## Generated Content\n\n{}", raw)),
    ]
}
