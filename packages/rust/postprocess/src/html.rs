//! Plotly bootstrap stripping for built HTML pages.
//!
//! Notebook pages carry a full copy of plotly.js inside a Jupyter output
//! wrapper and wrap every figure in a RequireJS loader. The passes below
//! remove both so the page loads plotly from a `<script src>` tag instead.
//! The transform works on text; HTML is never parsed.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, instrument};
use walkdir::WalkDir;

use nbdocs_shared::{NbDocsError, Result};

static OUTPUT_WRAPPER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?s)<div class="jp-RenderedHTMLCommon jp-RenderedHTML jp-OutputArea-output " data-mime-type="text/html">\s*?<script type="text/javascript">.*?</script>\s*?</div>"#,
    )
    .expect("valid regex")
});

static REQUIRE_PREAMBLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(<script type="text/javascript">)\s*?require\(\["plotly"\], function\(Plotly\) \{\s*?(window\.PLOTLYENV)"#,
    )
    .expect("valid regex")
});

static THEN_CONTINUATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\)\.then\(function\(\)\{.*?(</script>)").expect("valid regex")
});

// ---------------------------------------------------------------------------
// Passes
// ---------------------------------------------------------------------------

/// Remove Jupyter output wrappers that hold nothing but an inline script.
pub fn strip_plotly_wrappers(html: &str) -> String {
    OUTPUT_WRAPPER_RE.replace_all(html, "").into_owned()
}

/// Remove the `require(["plotly"], function(Plotly) {` opener of figure scripts.
pub fn strip_require_preamble(html: &str) -> String {
    REQUIRE_PREAMBLE_RE
        .replace_all(html, "${1}${2}")
        .into_owned()
}

/// Replace each `).then(function(){ ...` tail with `)}`, keeping `</script>`.
pub fn collapse_then_continuation(html: &str) -> String {
    THEN_CONTINUATION_RE
        .replace_all(html, ")}${1}")
        .into_owned()
}

/// Apply all three passes in order.
pub fn strip_plotly_bootstrap(html: &str) -> String {
    let mut result = strip_plotly_wrappers(html);
    result = strip_require_preamble(&result);
    result = collapse_then_continuation(&result);
    result
}

// ---------------------------------------------------------------------------
// Site walk
// ---------------------------------------------------------------------------

/// Strip every `*.html` file under `site_dir`, returning how many changed.
#[instrument(skip_all, fields(site = %site_dir.display()))]
pub fn strip_site_html(site_dir: &Path) -> Result<usize> {
    let mut rewritten = 0;

    for entry in WalkDir::new(site_dir).follow_links(true) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(site_dir).to_path_buf();
            match e.into_io_error() {
                Some(source) => NbDocsError::io(path, source),
                None => NbDocsError::validation(format!(
                    "filesystem loop under {}",
                    site_dir.display()
                )),
            }
        })?;

        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().is_none_or(|ext| ext != "html") {
            continue;
        }

        if strip_html_file(path)? {
            rewritten += 1;
        }
    }

    debug!(rewritten, "stripped site html");
    Ok(rewritten)
}

/// Strip one HTML file in place. Returns whether it changed.
pub fn strip_html_file(path: &Path) -> Result<bool> {
    let html = std::fs::read_to_string(path).map_err(|e| NbDocsError::io(path, e))?;
    let stripped = strip_plotly_bootstrap(&html);
    if stripped == html {
        return Ok(false);
    }

    std::fs::write(path, stripped).map_err(|e| NbDocsError::io(path, e))?;
    debug!(path = %path.display(), "rewrote html");
    Ok(true)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
