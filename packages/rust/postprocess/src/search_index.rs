//! Search-index cleanup.
//!
//! The site builder indexes page text, including the inline plotly figure
//! scripts and the notebook CSS loader. Both are stripped from every
//! record's `text` so search results stay readable.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::{debug, instrument};

use nbdocs_shared::{NbDocsError, Result};

static PLOTLY_ENV_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)window\.PLOTLYENV.*?\)\s*?\}\s*?").expect("valid regex")
});

static CSS_LOADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\(function \(global, factory.*?(Example:)").expect("valid regex")
});

/// Remove `window.PLOTLYENV ... ) }` figure snippets.
pub fn strip_plotly_env(text: &str) -> String {
    PLOTLY_ENV_RE.replace_all(text, "").into_owned()
}

/// Remove the `(function (global, factory ...` loader, keeping `Example:`.
pub fn strip_css_loader(text: &str) -> String {
    CSS_LOADER_RE.replace_all(text, "${1}").into_owned()
}

/// Strip every record of a parsed search index in place.
///
/// Returns how many records changed.
pub fn strip_search_index_value(index: &mut Value) -> Result<usize> {
    let docs = index
        .get_mut("docs")
        .and_then(Value::as_array_mut)
        .ok_or_else(|| NbDocsError::validation("search index has no `docs` array"))?;

    let mut changed = 0;
    for (i, record) in docs.iter_mut().enumerate() {
        let text = record
            .as_object_mut()
            .ok_or_else(|| NbDocsError::validation(format!("search record {i} is not an object")))?
            .get_mut("text")
            .ok_or_else(|| NbDocsError::validation(format!("search record {i} has no `text`")))?;

        let Value::String(current) = text else {
            return Err(NbDocsError::validation(format!(
                "search record {i} has a non-string `text`"
            )));
        };

        let stripped = strip_css_loader(&strip_plotly_env(current));
        if stripped != *current {
            *current = stripped;
            changed += 1;
        }
    }

    Ok(changed)
}

/// Strip the search index at `path`, overwriting it compactly.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn strip_search_index_file(path: &Path) -> Result<usize> {
    let content = std::fs::read_to_string(path).map_err(|e| NbDocsError::io(path, e))?;
    let mut index: Value = serde_json::from_str(&content)
        .map_err(|e| NbDocsError::parse(format!("{}: {e}", path.display())))?;

    let changed = strip_search_index_value(&mut index)?;

    let json = serde_json::to_string(&index)
        .map_err(|e| NbDocsError::parse(format!("search index serialization failed: {e}")))?;
    std::fs::write(path, json).map_err(|e| NbDocsError::io(path, e))?;

    debug!(changed, "stripped search index");
    Ok(changed)
}
