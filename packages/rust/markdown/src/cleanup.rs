//! Assembly of rendered chunks into the final Markdown page.
//!
//! Normalisation happens only at chunk boundaries. The inside of a chunk
//! (markdown cell source, fenced code, indented output) is never rewritten.

/// Join rendered chunks with one blank line between them.
///
/// Blank lines at the edges of each chunk are dropped, empty chunks are
/// skipped, and the page ends with exactly one newline.
pub(crate) fn join_chunks(chunks: &[String]) -> String {
    let parts: Vec<&str> = chunks
        .iter()
        .map(|chunk| trim_blank_edges(chunk))
        .filter(|chunk| !chunk.is_empty())
        .collect();

    if parts.is_empty() {
        return String::new();
    }

    let mut page = parts.join("\n\n");
    page.push('\n');
    page
}

/// Strip whole blank lines from the start and trailing whitespace from the end.
///
/// Indentation of the first non-blank line is kept.
fn trim_blank_edges(chunk: &str) -> &str {
    let mut start = 0;
    for line in chunk.split_inclusive('\n') {
        if !line.trim().is_empty() {
            break;
        }
        start += line.len();
    }
    chunk[start..].trim_end()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
