//! Notebook-to-Markdown rendering.
//!
//! Renders a (tag-filtered) notebook the way the notebook ecosystem's
//! Markdown exporter does: markdown cells verbatim, code input as fenced
//! blocks, outputs by MIME priority, and binary outputs extracted into
//! named resources referenced from the page.

mod cleanup;

use std::sync::LazyLock;

use base64::Engine as _;
use regex::Regex;
use tracing::{debug, instrument};

use nbdocs_notebook::{Cell, CodeCell, MimeBundle, Notebook, Output, TextCell, bundle_text};
use nbdocs_shared::{NbDocsError, Result};

/// MIME types tried for display outputs, highest priority first.
pub const DISPLAY_PRIORITY: &[&str] = &[
    "text/html",
    "text/markdown",
    "image/svg+xml",
    "text/latex",
    "image/png",
    "image/jpeg",
    "text/plain",
];

/// MIME types extracted into resource files, with their extensions.
const EXTRACTED_TYPES: &[(&str, &str)] = &[
    ("image/png", "png"),
    ("image/jpeg", "jpg"),
    ("image/svg+xml", "svg"),
    ("application/pdf", "pdf"),
];

/// Raw cell formats that pass through into Markdown.
const RAW_PASSTHROUGH: &[&str] = &["", "text/markdown", "text/html"];

/// Cell magics that switch the fence language.
const MAGIC_LANGUAGES: &[(&str, &str)] = &[
    ("%%R", "r"),
    ("%%bash", "bash"),
    ("%%cython", "cython"),
    ("%%javascript", "javascript"),
    ("%%julia", "julia"),
    ("%%latex", "latex"),
    ("%%octave", "octave"),
    ("%%perl", "perl"),
    ("%%ruby", "ruby"),
    ("%%sh", "sh"),
    ("%%sql", "sql"),
];

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Options for rendering one notebook.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Prefix of extracted resource names, usually the notebook stem.
    pub resource_key: String,
}

/// A binary output extracted from the notebook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    /// File name, e.g. `analysis_3_0.png`.
    pub name: String,
    /// Decoded payload.
    pub data: Vec<u8>,
}

/// Result of rendering a notebook.
#[derive(Debug, Clone)]
pub struct Rendered {
    /// The Markdown page.
    pub markdown: String,
    /// Extracted resources, in cell/output order.
    pub resources: Vec<Resource>,
}

// ---------------------------------------------------------------------------
// Renderer
// ---------------------------------------------------------------------------

/// Render `notebook` to Markdown and extract its binary outputs.
#[instrument(skip(notebook), fields(key = %opts.resource_key, cells = notebook.cells.len()))]
pub fn render(notebook: &Notebook, opts: &RenderOptions) -> Result<Rendered> {
    let language = notebook.language().unwrap_or("");
    let mut chunks: Vec<String> = Vec::new();
    let mut resources: Vec<Resource> = Vec::new();

    for (cell_index, cell) in notebook.cells.iter().enumerate() {
        match cell {
            Cell::Markdown(text) => {
                if !text.source_hidden {
                    chunks.push(text.source.as_str().to_string());
                }
            }
            Cell::Raw(text) => {
                if !text.source_hidden && raw_passes_through(text) {
                    chunks.push(text.source.as_str().to_string());
                }
            }
            Cell::Code(code) => {
                render_code_cell(
                    code,
                    cell_index,
                    language,
                    opts,
                    &mut chunks,
                    &mut resources,
                )?;
            }
        }
    }

    let markdown = cleanup::join_chunks(&chunks);

    debug!(
        len = markdown.len(),
        resources = resources.len(),
        "notebook rendered"
    );

    Ok(Rendered {
        markdown,
        resources,
    })
}

fn render_code_cell(
    code: &CodeCell,
    cell_index: usize,
    language: &str,
    opts: &RenderOptions,
    chunks: &mut Vec<String>,
    resources: &mut Vec<Resource>,
) -> Result<()> {
    if !code.source_hidden {
        let source = code.source.as_str();
        let fence_lang = magic_language(source).unwrap_or(language);
        chunks.push(format!("```{fence_lang}\n{source}\n```"));
    }

    for (output_index, output) in code.outputs.iter().enumerate() {
        match output {
            Output::Stream { text, .. } => chunks.push(indent(text.as_str())),
            Output::Error { traceback, .. } => {
                let lines: Vec<String> = traceback.iter().map(|l| strip_ansi(l)).collect();
                chunks.push(indent(&lines.join("\n")));
            }
            Output::DisplayData { data, .. } | Output::ExecuteResult { data, .. } => {
                let names = extract_resources(data, cell_index, output_index, opts, resources)?;
                if let Some(chunk) = render_bundle(data, &names) {
                    chunks.push(chunk);
                }
            }
        }
    }

    Ok(())
}

/// Pick the highest-priority representation of a display bundle.
fn render_bundle(data: &MimeBundle, names: &[(&'static str, String)]) -> Option<String> {
    let mime = DISPLAY_PRIORITY.iter().find(|m| data.contains_key(**m))?;
    let resource = |mime: &str| {
        names
            .iter()
            .find(|(m, _)| *m == mime)
            .map(|(_, name)| path_to_url(name))
    };

    match *mime {
        "image/svg+xml" => resource("image/svg+xml").map(|url| format!("![svg]({url})")),
        "image/png" => resource("image/png").map(|url| format!("![png]({url})")),
        "image/jpeg" => resource("image/jpeg").map(|url| format!("![jpeg]({url})")),
        "text/plain" => bundle_text(data, mime).map(|t| indent(&t)),
        other => bundle_text(data, other),
    }
}

/// Decode every extractable payload of a bundle into `resources`.
fn extract_resources(
    data: &MimeBundle,
    cell_index: usize,
    output_index: usize,
    opts: &RenderOptions,
    resources: &mut Vec<Resource>,
) -> Result<Vec<(&'static str, String)>> {
    let mut names = Vec::new();

    for (mime, ext) in EXTRACTED_TYPES {
        let Some(payload) = bundle_text(data, mime) else {
            continue;
        };

        let bytes = if *mime == "image/svg+xml" {
            payload.into_bytes()
        } else {
            let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
            base64::engine::general_purpose::STANDARD
                .decode(compact.as_bytes())
                .map_err(|e| {
                    NbDocsError::parse(format!(
                        "cell {cell_index} output {output_index}: invalid base64 {mime}: {e}"
                    ))
                })?
        };

        let name = format!("{}_{cell_index}_{output_index}.{ext}", opts.resource_key);
        debug!(%name, size = bytes.len(), "extracted resource");
        resources.push(Resource {
            name: name.clone(),
            data: bytes,
        });
        names.push((*mime, name));
    }

    Ok(names)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn raw_passes_through(cell: &TextCell) -> bool {
    let format = cell
        .metadata
        .extra
        .get("raw_mimetype")
        .or_else(|| cell.metadata.extra.get("format"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_lowercase();
    RAW_PASSTHROUGH.contains(&format.as_str())
}

/// Fence language implied by a leading cell magic.
fn magic_language(source: &str) -> Option<&'static str> {
    let first = source.lines().next()?.split_whitespace().next()?;
    MAGIC_LANGUAGES
        .iter()
        .find(|(magic, _)| *magic == first)
        .map(|(_, lang)| *lang)
}

/// Indent every non-empty line by four spaces.
fn indent(text: &str) -> String {
    text.trim_end_matches('\n')
        .lines()
        .map(|line| {
            if line.trim().is_empty() {
                String::new()
            } else {
                format!("    {line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Remove ANSI escape sequences (tracebacks are colourised).
fn strip_ansi(text: &str) -> String {
    static ANSI_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\x1b\[[0-?]*[ -/]*[@-~]").expect("valid regex"));

    ANSI_RE.replace_all(text, "").into_owned()
}

/// Percent-encode a relative resource path for use in a link.
fn path_to_url(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for byte in path.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
