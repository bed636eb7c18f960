//! Core domain types shared by the conversion, build and cleanup stages.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current schema version for the conversion ledger format.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// GeneratedFile
// ---------------------------------------------------------------------------

/// A generated Markdown page registered with the site builder.
///
/// Paths follow the MkDocs file model: `src_uri` is relative to the docs
/// dir and always uses `/`, `dest_uri` is the published HTML location
/// relative to the site dir.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedFile {
    /// Path of the page relative to the docs dir (e.g. `blog/sub/a.md`).
    pub src_uri: String,
    /// Absolute path of the page under the docs dir.
    pub abs_src_path: PathBuf,
    /// Published path relative to the site dir (e.g. `blog/sub/a/index.html`).
    pub dest_uri: String,
    /// Absolute published path under the site dir.
    pub abs_dest_path: PathBuf,
    /// Public URL of the page, relative to the site root.
    pub url: String,
    /// Whether directory-style URLs were used to derive `dest_uri`.
    pub use_directory_urls: bool,
}

impl GeneratedFile {
    /// Build a record for `src_uri` inside `src_dir`, published into `dest_dir`.
    pub fn new(src_uri: &str, src_dir: &Path, dest_dir: &Path, use_directory_urls: bool) -> Self {
        let src_uri = src_uri.replace('\\', "/");
        let dest_uri = dest_uri_for(&src_uri, use_directory_urls);
        let url = url_for(&dest_uri, use_directory_urls);

        Self {
            abs_src_path: join_uri(src_dir, &src_uri),
            abs_dest_path: join_uri(dest_dir, &dest_uri),
            src_uri,
            dest_uri,
            url,
            use_directory_urls,
        }
    }
}

/// Split a `/`-separated URI into `(parent, file name)`.
fn split_uri(uri: &str) -> (&str, &str) {
    match uri.rfind('/') {
        Some(idx) => (&uri[..idx], &uri[idx + 1..]),
        None => ("", uri),
    }
}

fn dest_uri_for(src_uri: &str, use_directory_urls: bool) -> String {
    let (parent, file_name) = split_uri(src_uri);
    let stem = match file_name.rsplit_once('.') {
        Some((stem, _)) => stem,
        None => file_name,
    };
    let stem = if stem == "README" { "index" } else { stem };

    let tail = if !use_directory_urls || stem == "index" {
        format!("{stem}.html")
    } else {
        format!("{stem}/index.html")
    };

    if parent.is_empty() {
        tail
    } else {
        format!("{parent}/{tail}")
    }
}

fn url_for(dest_uri: &str, use_directory_urls: bool) -> String {
    let (parent, file_name) = split_uri(dest_uri);
    if use_directory_urls && file_name == "index.html" {
        if parent.is_empty() {
            String::new()
        } else {
            format!("{parent}/")
        }
    } else {
        dest_uri.to_string()
    }
}

fn join_uri(base: &Path, uri: &str) -> PathBuf {
    uri.split('/')
        .filter(|part| !part.is_empty())
        .fold(base.to_path_buf(), |acc, part| acc.join(part))
}

// ---------------------------------------------------------------------------
// SiteFiles
// ---------------------------------------------------------------------------

/// The site builder's ordered file manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SiteFiles(pub Vec<GeneratedFile>);

impl SiteFiles {
    /// Append a generated page.
    pub fn append(&mut self, file: GeneratedFile) {
        self.0.push(file);
    }

    /// Number of registered pages.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no page has been registered.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over registered pages in registration order.
    pub fn iter(&self) -> std::slice::Iter<'_, GeneratedFile> {
        self.0.iter()
    }
}

// ---------------------------------------------------------------------------
// ConversionReport
// ---------------------------------------------------------------------------

/// A resource extracted from notebook outputs and written to both trees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRecord {
    /// File name of the resource (e.g. `a_1_0.png`).
    pub name: String,
    /// Copy next to the generated page in the docs tree.
    pub src_path: PathBuf,
    /// Copy next to the published page in the site tree.
    pub dest_path: PathBuf,
    /// Payload size in bytes.
    pub size_bytes: usize,
    /// SHA-256 of the payload.
    pub sha256: String,
}

/// A cell failure that was logged and tolerated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionErrorRecord {
    /// Notebook that failed.
    pub notebook: PathBuf,
    /// Index of the failing cell.
    pub cell_index: usize,
    /// Exception name.
    pub ename: String,
    /// Exception value.
    pub evalue: String,
}

/// Everything a conversion run produced.
///
/// Serialized as the ledger that `clean` consumes; `written` is the only
/// set of files cleanup may delete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionReport {
    /// Schema version for forward compatibility.
    pub schema_version: u32,
    /// Identifier of this run.
    pub run_id: Uuid,
    /// When the run started.
    pub created_at: DateTime<Utc>,
    /// Absolute docs dir the pages were registered against.
    pub docs_dir: PathBuf,
    /// Absolute output dir the Markdown was generated into.
    pub output_dir: PathBuf,
    /// Pages registered with the site builder.
    pub files: SiteFiles,
    /// Files written under the docs dir, in write order.
    pub written: Vec<PathBuf>,
    /// Extracted resources.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<ResourceRecord>,
    /// Tolerated execution failures.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub execution_errors: Vec<ExecutionErrorRecord>,
}

impl ConversionReport {
    /// Start an empty report for a run.
    pub fn new(docs_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            run_id: Uuid::now_v7(),
            created_at: Utc::now(),
            docs_dir: docs_dir.into(),
            output_dir: output_dir.into(),
            files: SiteFiles::default(),
            written: Vec::new(),
            resources: Vec::new(),
            execution_errors: Vec::new(),
        }
    }
}
