//! Shared types, error model, and configuration for nbdocs.
//!
//! This crate is the foundation depended on by all other nbdocs crates.
//! It provides:
//! - [`NbDocsError`]: the unified error type
//! - Domain types ([`GeneratedFile`], [`SiteFiles`], [`ConversionReport`])
//! - Configuration ([`AppConfig`], [`ExecuteOptions`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, BuildConfig, CONFIG_FILE_NAME, ExecuteConfig, ExecuteOptions, LEDGER_FILE_NAME,
    NotebookConfig, SiteConfig, init_config, load_config, load_config_from,
};
pub use error::{NbDocsError, Result};
pub use types::{
    CURRENT_SCHEMA_VERSION, ConversionReport, ExecutionErrorRecord, GeneratedFile,
    ResourceRecord, SiteFiles,
};
