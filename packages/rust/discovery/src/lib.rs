//! Directory resolution and notebook discovery.
//!
//! Before converting, nbdocs resolves the configured directories to
//! absolute paths and walks the input dir for `*.ipynb` files. Hidden
//! entries (`.ipynb_checkpoints` and friends) are never visited, the same
//! way a shell glob skips dot-files.

use std::path::{Component, Path, PathBuf};

use nbdocs_shared::{AppConfig, NbDocsError, Result};
use tracing::{debug, instrument};
use walkdir::WalkDir;

/// Extension of notebook documents.
pub const NOTEBOOK_EXTENSION: &str = "ipynb";

/// Extension of generated pages.
pub const MARKDOWN_EXTENSION: &str = "md";

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

/// Absolute directories of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    /// Directory of the config file.
    pub config_dir: PathBuf,
    /// Documentation source directory.
    pub docs_dir: PathBuf,
    /// Built site directory.
    pub site_dir: PathBuf,
    /// Where notebooks are discovered.
    pub input_dir: PathBuf,
    /// Where Markdown is generated (inside `docs_dir`).
    pub output_dir: PathBuf,
    /// Descend into subdirectories of `input_dir`.
    pub recursive: bool,
    /// MkDocs URL style of the site.
    pub use_directory_urls: bool,
}

/// Where a notebook's Markdown goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotebookTarget {
    /// Absolute path of the generated Markdown file.
    pub md_path: PathBuf,
    /// The same path relative to the docs dir, `/`-separated.
    pub src_uri: String,
}

impl Layout {
    /// Resolve the configured directories.
    ///
    /// `docs_dir`, `site_dir` and a relative `input_dir` resolve against the
    /// config file's directory; `output_dir` resolves against `docs_dir`.
    #[instrument(skip_all, fields(config = %config.config_file_path.display()))]
    pub fn resolve(config: &AppConfig) -> Result<Self> {
        let config_dir = absolutize(&config.config_dir())?;
        let docs_dir = resolve_dir(&config_dir, &config.site.docs_dir)?;
        let site_dir = resolve_dir(&config_dir, &config.site.site_dir)?;
        let input_dir = resolve_dir(&config_dir, &config.notebooks.input_dir)?;
        let output_dir = resolve_dir(&docs_dir, &config.notebooks.output_dir)?;

        if output_dir == docs_dir {
            return Err(NbDocsError::config(format!(
                "output dir {} must be a subdirectory of the docs dir",
                output_dir.display()
            )));
        }

        if !output_dir.starts_with(&docs_dir) {
            return Err(NbDocsError::config(format!(
                "output dir {} is outside the docs dir {}",
                output_dir.display(),
                docs_dir.display()
            )));
        }

        let layout = Self {
            config_dir,
            docs_dir,
            site_dir,
            input_dir,
            output_dir,
            recursive: config.notebooks.recursive,
            use_directory_urls: config.site.use_directory_urls,
        };

        debug!(?layout, "resolved directories");
        Ok(layout)
    }

    /// Mirror `notebook`'s position under the input dir into the output dir.
    pub fn target_for(&self, notebook: &Path) -> Result<NotebookTarget> {
        let parent = notebook.parent().unwrap_or(Path::new(""));
        let subdir = parent.strip_prefix(&self.input_dir).map_err(|_| {
            NbDocsError::validation(format!(
                "{} is not inside the input dir {}",
                notebook.display(),
                self.input_dir.display()
            ))
        })?;

        let stem = notebook
            .file_stem()
            .ok_or_else(|| {
                NbDocsError::validation(format!("{} has no file name", notebook.display()))
            })?
            .to_string_lossy();

        let md_path = self
            .output_dir
            .join(subdir)
            .join(format!("{stem}.{MARKDOWN_EXTENSION}"));

        let rel = md_path.strip_prefix(&self.docs_dir).map_err(|_| {
            NbDocsError::validation(format!(
                "{} is not inside the docs dir {}",
                md_path.display(),
                self.docs_dir.display()
            ))
        })?;

        let src_uri = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        Ok(NotebookTarget { md_path, src_uri })
    }

    /// Start a single-pass walk over the notebooks of this layout.
    pub fn notebooks(&self) -> NotebookFinder {
        NotebookFinder::new(&self.input_dir, self.recursive)
    }
}

// ---------------------------------------------------------------------------
// NotebookFinder
// ---------------------------------------------------------------------------

/// Lazy iterator over `*.ipynb` files, in filesystem enumeration order.
pub struct NotebookFinder {
    walker: walkdir::FilterEntry<walkdir::IntoIter, fn(&walkdir::DirEntry) -> bool>,
}

impl NotebookFinder {
    /// Walk `root`; only its direct children unless `recursive`.
    pub fn new(root: &Path, recursive: bool) -> Self {
        let max_depth = if recursive { usize::MAX } else { 1 };
        let walker = WalkDir::new(root)
            .min_depth(1)
            .max_depth(max_depth)
            .follow_links(true)
            .into_iter()
            .filter_entry(is_visible as fn(&walkdir::DirEntry) -> bool);

        Self { walker }
    }
}

impl Iterator for NotebookFinder {
    type Item = PathBuf;

    fn next(&mut self) -> Option<PathBuf> {
        loop {
            let entry = match self.walker.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    debug!(error = %e, "skipping unreadable entry");
                    continue;
                }
            };

            if entry.file_type().is_file()
                && entry.path().extension().is_some_and(|ext| ext == NOTEBOOK_EXTENSION)
            {
                return Some(entry.into_path());
            }
        }
    }
}

fn is_visible(entry: &walkdir::DirEntry) -> bool {
    !entry.file_name().to_string_lossy().starts_with('.')
}

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

/// Join `path` onto `base` unless absolute, normalise, and canonicalise
/// when the directory exists.
pub fn resolve_dir(base: &Path, path: &Path) -> Result<PathBuf> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    };
    let normalized = normalize(&absolutize(&joined)?);

    Ok(std::fs::canonicalize(&normalized).unwrap_or(normalized))
}

fn absolutize(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).map_err(|e| NbDocsError::io(path, e))
}

/// Lexically resolve `.` and `..` components.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                // `..` at the root is the root.
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }
    out
}
