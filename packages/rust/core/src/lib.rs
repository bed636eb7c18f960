//! Core pipeline orchestration for nbdocs.
//!
//! This crate ties together discovery, execution, rendering and
//! post-processing into the `convert`, `clean` and `build` workflows.

pub mod build;
pub mod cleanup;
pub mod execute;
pub mod ledger;
pub mod pipeline;

pub use build::{BuildOutcome, BuildPlan, build_site, run_build_command};
pub use cleanup::{CleanupSummary, cleanup, cleanup_report};
pub use execute::{JupyterExecutor, NotebookExecutor, apply_executed};
pub use ledger::{read_ledger, remove_ledger, write_ledger};
pub use pipeline::{ProgressReporter, SilentProgress, convert_notebooks};
