//! nbformat v4 document model.
//!
//! Only the fields nbdocs reads are typed; everything else is carried in
//! `extra` maps so a write-back does not lose data.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Tag marking a cell whose error output is expected.
pub const RAISES_EXCEPTION_TAG: &str = "raises-exception";

/// MIME type → payload, as stored in display outputs.
pub type MimeBundle = Map<String, Value>;

// ---------------------------------------------------------------------------
// MultilineString
// ---------------------------------------------------------------------------

/// Text stored either as one string or as a list of lines.
///
/// Always written back as a list of lines, the way nbformat does.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "MultilineRepr", into = "MultilineRepr")]
pub struct MultilineString(pub String);

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum MultilineRepr {
    One(String),
    Lines(Vec<String>),
}

impl From<MultilineRepr> for MultilineString {
    fn from(repr: MultilineRepr) -> Self {
        match repr {
            MultilineRepr::One(s) => Self(s),
            MultilineRepr::Lines(lines) => Self(lines.concat()),
        }
    }
}

impl From<MultilineString> for MultilineRepr {
    fn from(s: MultilineString) -> Self {
        Self::Lines(s.0.split_inclusive('\n').map(String::from).collect())
    }
}

impl From<&str> for MultilineString {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl MultilineString {
    /// The joined text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// Notebook
// ---------------------------------------------------------------------------

/// A notebook document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notebook {
    /// Ordered cells.
    pub cells: Vec<Cell>,
    /// Notebook-level metadata.
    #[serde(default)]
    pub metadata: NotebookMetadata,
    /// Major format version.
    pub nbformat: u32,
    /// Minor format version.
    pub nbformat_minor: u32,
}

/// Notebook-level metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotebookMetadata {
    /// Kernel the notebook was written for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kernelspec: Option<KernelSpec>,
    /// Language of the kernel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_info: Option<LanguageInfo>,
    /// Everything else.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `metadata.kernelspec`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `metadata.language_info`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageInfo {
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Notebook {
    /// Language used to fence code cells.
    pub fn language(&self) -> Option<&str> {
        self.metadata
            .language_info
            .as_ref()
            .map(|li| li.name.as_str())
            .or_else(|| {
                self.metadata
                    .kernelspec
                    .as_ref()
                    .and_then(|ks| ks.language.as_deref())
            })
            .filter(|lang| !lang.is_empty())
    }

    /// First unexpected error output, as `(cell index, ename, evalue)`.
    pub fn first_error(&self) -> Option<(usize, &str, &str)> {
        self.cells.iter().enumerate().find_map(|(idx, cell)| {
            let Cell::Code(code) = cell else {
                return None;
            };
            if code.metadata.has_tag(RAISES_EXCEPTION_TAG) {
                return None;
            }
            code.outputs.iter().find_map(|out| match out {
                Output::Error { ename, evalue, .. } => Some((idx, ename.as_str(), evalue.as_str())),
                _ => None,
            })
        })
    }
}

// ---------------------------------------------------------------------------
// Cells
// ---------------------------------------------------------------------------

/// A notebook cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cell_type", rename_all = "lowercase")]
pub enum Cell {
    Code(CodeCell),
    Markdown(TextCell),
    Raw(TextCell),
}

/// Per-cell metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CellMetadata {
    /// Free-form tags controlling rendering.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CellMetadata {
    /// Whether the cell carries `tag`.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// A code cell with its outputs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodeCell {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub metadata: CellMetadata,
    #[serde(default)]
    pub outputs: Vec<Output>,
    pub source: MultilineString,
    /// Set by tag filtering; never persisted.
    #[serde(skip)]
    pub source_hidden: bool,
}

/// A markdown or raw cell.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextCell {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub metadata: CellMetadata,
    pub source: MultilineString,
    /// Set by tag filtering; never persisted.
    #[serde(skip)]
    pub source_hidden: bool,
}

impl Cell {
    /// Cell metadata.
    pub fn metadata(&self) -> &CellMetadata {
        match self {
            Self::Code(c) => &c.metadata,
            Self::Markdown(c) | Self::Raw(c) => &c.metadata,
        }
    }

    /// Cell source text.
    pub fn source(&self) -> &str {
        match self {
            Self::Code(c) => c.source.as_str(),
            Self::Markdown(c) | Self::Raw(c) => c.source.as_str(),
        }
    }

    /// Hide the source when rendering.
    pub fn hide_source(&mut self) {
        match self {
            Self::Code(c) => c.source_hidden = true,
            Self::Markdown(c) | Self::Raw(c) => c.source_hidden = true,
        }
    }

    /// Whether the source is hidden when rendering.
    pub fn source_hidden(&self) -> bool {
        match self {
            Self::Code(c) => c.source_hidden,
            Self::Markdown(c) | Self::Raw(c) => c.source_hidden,
        }
    }
}

// ---------------------------------------------------------------------------
// Outputs
// ---------------------------------------------------------------------------

/// A code cell output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "output_type", rename_all = "snake_case")]
pub enum Output {
    Stream {
        name: String,
        text: MultilineString,
    },
    DisplayData {
        data: MimeBundle,
        #[serde(default)]
        metadata: Map<String, Value>,
    },
    ExecuteResult {
        execution_count: Option<u32>,
        data: MimeBundle,
        #[serde(default)]
        metadata: Map<String, Value>,
    },
    Error {
        ename: String,
        evalue: String,
        #[serde(default)]
        traceback: Vec<String>,
    },
}

/// Text of a bundle entry, joining line lists and stringifying JSON payloads.
pub fn bundle_text(bundle: &MimeBundle, mime: &str) -> Option<String> {
    match bundle.get(mime)? {
        Value::String(s) => Some(s.clone()),
        Value::Array(parts) => Some(
            parts
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .concat(),
        ),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}
