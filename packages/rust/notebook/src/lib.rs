//! Notebook documents: reading, writing and tag filtering.
//!
//! Notebooks are nbformat v4 JSON. Reading is lenient about fields nbdocs
//! does not use; writing produces the same layout nbformat does (one-space
//! indentation, line-split sources, trailing newline).

pub mod model;
pub mod tags;

use std::path::Path;

use serde::Serialize;
use tracing::debug;

use nbdocs_shared::{NbDocsError, Result};

pub use model::{
    Cell, CellMetadata, CodeCell, KernelSpec, LanguageInfo, MimeBundle, MultilineString,
    Notebook, NotebookMetadata, Output, TextCell, bundle_text,
};
pub use tags::{REMOVE_CELL_TAG, REMOVE_INPUT_TAG, REMOVE_OUTPUT_TAG, RemovalStats, remove_tagged};

/// The only major format version nbdocs understands.
pub const SUPPORTED_NBFORMAT: u32 = 4;

/// Read a notebook from disk.
pub fn read_notebook(path: &Path) -> Result<Notebook> {
    let content = std::fs::read_to_string(path).map_err(|e| NbDocsError::io(path, e))?;
    parse_notebook(&content)
        .map_err(|e| NbDocsError::parse(format!("{}: {e}", path.display())))
}

/// Parse a notebook from its JSON text.
pub fn parse_notebook(content: &str) -> Result<Notebook> {
    let notebook: Notebook = serde_json::from_str(content)
        .map_err(|e| NbDocsError::parse(format!("invalid notebook JSON: {e}")))?;

    if notebook.nbformat != SUPPORTED_NBFORMAT {
        return Err(NbDocsError::parse(format!(
            "unsupported nbformat {}.{} (expected {SUPPORTED_NBFORMAT}.x)",
            notebook.nbformat, notebook.nbformat_minor
        )));
    }

    Ok(notebook)
}

/// Serialize a notebook the way nbformat writes it.
pub fn to_notebook_json(notebook: &Notebook) -> Result<String> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b" ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    notebook
        .serialize(&mut ser)
        .map_err(|e| NbDocsError::parse(format!("notebook serialization failed: {e}")))?;

    let mut json = String::from_utf8(buf)
        .map_err(|e| NbDocsError::parse(format!("notebook serialization failed: {e}")))?;
    json.push('\n');
    Ok(json)
}

/// Overwrite `path` with `notebook`.
pub fn write_notebook(path: &Path, notebook: &Notebook) -> Result<()> {
    let json = to_notebook_json(notebook)?;
    std::fs::write(path, json).map_err(|e| NbDocsError::io(path, e))?;
    debug!(path = %path.display(), "wrote notebook");
    Ok(())
}
