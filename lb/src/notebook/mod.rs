//! Notebook cells, generation and the `.ipynb` document

mod cell;
mod error;
mod generate;
mod writer;

pub use cell::{CellKind, CellMetadata, GeneratedCells, NotebookCell, fallback_cells, split_source};
pub use error::NotebookError;
pub use generate::{NotebookGenerator, parse_cells, strip_code_fences};
pub use writer::{
    KernelSpec, LanguageInfo, NBFORMAT, NBFORMAT_MINOR, NOTEBOOK_EXTENSION, Notebook, NotebookMetadata, NotebookWriter,
    notebook_filename, read_notebook, write_notebook,
};
