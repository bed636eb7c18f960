//! Pipeline configuration for nbdocs.
//!
//! Project config lives at `nbdocs.toml` next to the documentation sources.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{NbDocsError, Result};

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = "nbdocs.toml";

/// Default ledger file name, written beside the config file.
pub const LEDGER_FILE_NAME: &str = ".nbdocs-ledger.json";

// ---------------------------------------------------------------------------
// Config structs (matching nbdocs.toml schema)
// ---------------------------------------------------------------------------

/// Top-level pipeline config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Site builder directories.
    #[serde(default)]
    pub site: SiteConfig,

    /// Notebook discovery settings.
    #[serde(default)]
    pub notebooks: NotebookConfig,

    /// Optional notebook execution.
    #[serde(default)]
    pub execute: ExecuteConfig,

    /// External build and post-processing.
    #[serde(default)]
    pub build: BuildConfig,

    /// Where this config was loaded from. Relative directories resolve
    /// against its parent.
    #[serde(skip)]
    pub config_file_path: PathBuf,
}

/// `[site]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Documentation source directory.
    #[serde(default = "default_docs_dir")]
    pub docs_dir: PathBuf,

    /// Built site directory.
    #[serde(default = "default_site_dir")]
    pub site_dir: PathBuf,

    /// Whether pages are published as `<name>/index.html`.
    #[serde(default = "default_true")]
    pub use_directory_urls: bool,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            docs_dir: default_docs_dir(),
            site_dir: default_site_dir(),
            use_directory_urls: true,
        }
    }
}

fn default_docs_dir() -> PathBuf {
    "docs".into()
}
fn default_site_dir() -> PathBuf {
    "site".into()
}
fn default_true() -> bool {
    true
}

/// `[notebooks]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotebookConfig {
    /// Where notebooks are discovered, relative to the config file.
    #[serde(default = "default_input_dir")]
    pub input_dir: PathBuf,

    /// Where Markdown is generated, relative to the docs dir.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Descend into subdirectories of the input dir.
    #[serde(default = "default_true")]
    pub recursive: bool,
}

impl Default for NotebookConfig {
    fn default() -> Self {
        Self {
            input_dir: default_input_dir(),
            output_dir: default_output_dir(),
            recursive: true,
        }
    }
}

fn default_input_dir() -> PathBuf {
    "docs/blogsource/".into()
}
fn default_output_dir() -> PathBuf {
    "blog/".into()
}

/// `[execute]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteConfig {
    /// Run notebooks before converting them.
    #[serde(default)]
    pub enabled: bool,

    /// Kernel working directory (defaults to the input dir).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_path: Option<PathBuf>,

    /// Kernel override; the notebook's own kernelspec is used otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kernel_name: Option<String>,

    /// Per-cell timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    /// Persist executed notebooks back to their source path.
    #[serde(default)]
    pub write_back: bool,

    /// Abort the whole run on the first failing cell.
    #[serde(default = "default_true")]
    pub exit_on_error: bool,

    /// Python interpreter that drives the kernel.
    #[serde(default = "default_python_cmd")]
    pub python_cmd: String,
}

impl Default for ExecuteConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            run_path: None,
            kernel_name: None,
            timeout: None,
            write_back: false,
            exit_on_error: true,
            python_cmd: default_python_cmd(),
        }
    }
}

fn default_python_cmd() -> String {
    "python3".into()
}

/// `[build]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// External site builder command line, e.g. `["mkdocs", "build"]`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,

    /// Search index location, relative to the site dir.
    #[serde(default = "default_search_index")]
    pub search_index: PathBuf,

    /// Strip plot bootstrap scripts from every built HTML page.
    #[serde(default = "default_true")]
    pub strip_html: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            search_index: default_search_index(),
            strip_html: true,
        }
    }
}

fn default_search_index() -> PathBuf {
    PathBuf::from("search").join("search_index.json")
}

// ---------------------------------------------------------------------------
// Execution options (runtime, derived from [execute])
// ---------------------------------------------------------------------------

/// Runtime execution options handed to the kernel engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecuteOptions {
    /// Kernel working directory; `None` means the input dir.
    pub run_path: Option<PathBuf>,
    /// Kernel override.
    pub kernel_name: Option<String>,
    /// Per-cell timeout in seconds.
    pub timeout: Option<u64>,
    /// Persist the executed notebook to its source path.
    pub write_back: bool,
    /// Propagate the first cell failure instead of recording it.
    pub exit_on_error: bool,
    /// Python interpreter that drives the kernel.
    pub python_cmd: String,
}

impl From<&ExecuteConfig> for ExecuteOptions {
    fn from(config: &ExecuteConfig) -> Self {
        Self {
            run_path: config.run_path.clone(),
            kernel_name: config.kernel_name.clone(),
            timeout: config.timeout,
            write_back: config.write_back,
            exit_on_error: config.exit_on_error,
            python_cmd: config.python_cmd.clone(),
        }
    }
}

impl AppConfig {
    /// Directory containing the config file; the base for relative paths.
    pub fn config_dir(&self) -> PathBuf {
        match self.config_file_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// Execution options, or `None` when execution is disabled.
    pub fn execute_options(&self) -> Option<ExecuteOptions> {
        self.execute
            .enabled
            .then(|| ExecuteOptions::from(&self.execute))
    }

    /// Default ledger path beside the config file.
    pub fn ledger_path(&self) -> PathBuf {
        self.config_dir().join(LEDGER_FILE_NAME)
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Load the config from `path`, or from `./nbdocs.toml` when `None`.
///
/// A missing default file yields defaults; an explicitly named file must exist.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(p) => load_config_from(p),
        None => {
            let default_path = PathBuf::from(CONFIG_FILE_NAME);
            if default_path.exists() {
                load_config_from(&default_path)
            } else {
                tracing::debug!(path = ?default_path, "config file not found, using defaults");
                Ok(AppConfig {
                    config_file_path: default_path,
                    ..AppConfig::default()
                })
            }
        }
    }
}

/// Load the config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| NbDocsError::io(path, e))?;

    let mut config: AppConfig = toml::from_str(&content).map_err(|e| {
        NbDocsError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    config.config_file_path = path.to_path_buf();
    Ok(config)
}

/// Write a default config file at `path`. Refuses to overwrite.
pub fn init_config(path: &Path) -> Result<PathBuf> {
    if path.exists() {
        return Err(NbDocsError::config(format!(
            "{} already exists",
            path.display()
        )));
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| NbDocsError::io(parent, e))?;
    }

    let content = toml::to_string_pretty(&AppConfig::default())
        .map_err(|e| NbDocsError::config(e.to_string()))?;

    std::fs::write(path, content).map_err(|e| NbDocsError::io(path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path.to_path_buf())
}
