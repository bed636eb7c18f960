//! Tag-driven removal of cells, outputs and inputs.
//!
//! Tag names are fixed; tag your cells with `remove_cell`, `remove_output`
//! or `remove_input` to control what the rendered page shows.

use tracing::debug;

use crate::model::{Cell, Notebook};

/// Drop the whole cell.
pub const REMOVE_CELL_TAG: &str = "remove_cell";

/// Clear the cell's outputs.
pub const REMOVE_OUTPUT_TAG: &str = "remove_output";

/// Hide the cell's source.
pub const REMOVE_INPUT_TAG: &str = "remove_input";

/// What [`remove_tagged`] changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemovalStats {
    pub cells_removed: usize,
    pub outputs_cleared: usize,
    pub inputs_hidden: usize,
}

/// Apply the removal tags to `notebook` in place.
pub fn remove_tagged(notebook: &mut Notebook) -> RemovalStats {
    let mut stats = RemovalStats::default();

    let before = notebook.cells.len();
    notebook
        .cells
        .retain(|cell| !cell.metadata().has_tag(REMOVE_CELL_TAG));
    stats.cells_removed = before - notebook.cells.len();

    for cell in &mut notebook.cells {
        if let Cell::Code(code) = cell {
            if code.metadata.has_tag(REMOVE_OUTPUT_TAG) {
                code.outputs.clear();
                code.execution_count = None;
                stats.outputs_cleared += 1;
            }
        }

        if cell.metadata().has_tag(REMOVE_INPUT_TAG) {
            cell.hide_source();
            stats.inputs_hidden += 1;
        }
    }

    if stats != RemovalStats::default() {
        debug!(?stats, "applied removal tags");
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Output;

    fn tagged_notebook() -> Notebook {
        serde_json::from_str(
            r#"{
            "nbformat": 4, "nbformat_minor": 5, "metadata": {},
            "cells": [
                {"cell_type": "code", "metadata": {"tags": ["remove_cell"]}, "source": "secret()", "execution_count": 1,
                 "outputs": [{"output_type": "stream", "name": "stdout", "text": "hidden\n"}]},
                {"cell_type": "code", "metadata": {"tags": ["remove_output"]}, "source": "noisy()", "execution_count": 2,
                 "outputs": [{"output_type": "stream", "name": "stdout", "text": "noise\n"}]},
                {"cell_type": "code", "metadata": {"tags": ["remove_input"]}, "source": "plot()", "execution_count": 3,
                 "outputs": [{"output_type": "stream", "name": "stdout", "text": "shown\n"}]},
                {"cell_type": "markdown", "metadata": {"tags": ["remove_cell"]}, "source": "draft"},
                {"cell_type": "markdown", "metadata": {}, "source": "kept"}
            ]
        }"#,
        )
        .unwrap()
    }

    #[test]
    fn removal_tags_apply() {
        let mut nb = tagged_notebook();
        let stats = remove_tagged(&mut nb);

        assert_eq!(
            stats,
            RemovalStats {
                cells_removed: 2,
                outputs_cleared: 1,
                inputs_hidden: 1,
            }
        );
        assert_eq!(nb.cells.len(), 3);
        assert!(nb.cells.iter().all(|c| c.source() != "secret()"));

        let Cell::Code(noisy) = &nb.cells[0] else {
            panic!("expected code cell");
        };
        assert!(noisy.outputs.is_empty());
        assert!(noisy.execution_count.is_none());
        assert!(!noisy.source_hidden);

        let Cell::Code(plot) = &nb.cells[1] else {
            panic!("expected code cell");
        };
        assert!(plot.source_hidden);
        assert!(matches!(&plot.outputs[0], Output::Stream { .. }));
    }

    #[test]
    fn untagged_notebook_is_untouched() {
        let mut nb = tagged_notebook();
        for cell in &mut nb.cells {
            match cell {
                Cell::Code(c) => c.metadata.tags.clear(),
                Cell::Markdown(c) | Cell::Raw(c) => c.metadata.tags.clear(),
            }
        }
        let original = nb.clone();

        assert_eq!(remove_tagged(&mut nb), RemovalStats::default());
        assert_eq!(nb, original);
    }
}
