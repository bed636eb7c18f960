//! Full `build` orchestration around an external site builder.
//!
//! convert → ledger → site builder → post-processing → cleanup. The ledger
//! is written before the builder runs and removed only after cleanup, so a
//! failed build can still be cleaned with `nbdocs clean`.

use std::path::Path;
use std::time::Instant;

use tokio::process::Command;
use tracing::{debug, info, instrument};

use nbdocs_discovery::Layout;
use nbdocs_shared::{BuildConfig, ConversionReport, ExecuteOptions, NbDocsError, Result};

use crate::cleanup::{CleanupSummary, cleanup_report};
use crate::execute::NotebookExecutor;
use crate::ledger::{remove_ledger, write_ledger};
use crate::pipeline::{ProgressReporter, convert_notebooks};

/// Inputs of one `build` run.
#[derive(Debug, Clone, Copy)]
pub struct BuildPlan<'a> {
    pub layout: &'a Layout,
    pub build: &'a BuildConfig,
    pub ledger_path: &'a Path,
    pub execute: Option<&'a ExecuteOptions>,
}

/// What a `build` run did.
#[derive(Debug)]
pub struct BuildOutcome {
    pub report: ConversionReport,
    /// Whether an external builder ran.
    pub built: bool,
    /// HTML pages rewritten by the plotly stripper.
    pub html_rewritten: usize,
    /// Search records changed, or `None` when there was no index.
    pub search_records_stripped: Option<usize>,
    pub cleanup: CleanupSummary,
}

/// Run `command` (program followed by its arguments) in `cwd`.
///
/// Output is inherited so the builder's own logging reaches the terminal.
#[instrument(skip_all, fields(cmd = ?command, cwd = %cwd.display()))]
pub async fn run_build_command(command: &[String], cwd: &Path) -> Result<()> {
    let (program, args) = command
        .split_first()
        .ok_or_else(|| NbDocsError::validation("build command is empty"))?;

    let started = Instant::now();
    let status = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .status()
        .await
        .map_err(|e| NbDocsError::Build(format!("failed to spawn `{program}`: {e}")))?;

    if !status.success() {
        return Err(NbDocsError::Build(format!("`{program}` exited with {status}")));
    }

    debug!(elapsed_ms = started.elapsed().as_millis() as u64, "site builder finished");
    Ok(())
}

/// Convert, build, post-process and clean up.
#[instrument(skip_all, fields(site = %plan.layout.site_dir.display()))]
pub async fn build_site<E: NotebookExecutor>(
    plan: BuildPlan<'_>,
    executor: &E,
    progress: &dyn ProgressReporter,
) -> Result<BuildOutcome> {
    let report = convert_notebooks(plan.layout, executor, plan.execute, progress).await?;
    write_ledger(plan.ledger_path, &report)?;

    let built = if plan.build.command.is_empty() {
        info!("no build command configured, skipping site build");
        false
    } else {
        progress.phase("Building site");
        run_build_command(&plan.build.command, &plan.layout.config_dir).await?;
        true
    };

    progress.phase("Post-processing site");
    let html_rewritten = if plan.build.strip_html && plan.layout.site_dir.is_dir() {
        nbdocs_postprocess::strip_site_html(&plan.layout.site_dir)?
    } else {
        0
    };

    let index_path = plan.layout.site_dir.join(&plan.build.search_index);
    let search_records_stripped = if index_path.is_file() {
        Some(nbdocs_postprocess::strip_search_index_file(&index_path)?)
    } else {
        debug!(path = %index_path.display(), "no search index");
        None
    };

    progress.phase("Cleaning up");
    let cleanup = cleanup_report(&report)?;
    remove_ledger(plan.ledger_path)?;

    info!(
        notebooks = report.files.len(),
        html_rewritten,
        files_removed = cleanup.files_removed,
        "build complete"
    );

    Ok(BuildOutcome {
        report,
        built,
        html_rewritten,
        search_records_stripped,
        cleanup,
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use nbdocs_shared::AppConfig;

    use crate::execute::JupyterExecutor;
    use crate::pipeline::SilentProgress;

    fn project() -> (PathBuf, Layout) {
        let root = std::env::temp_dir().join(format!("nbdocs-build-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(root.join("docs/blogsource")).unwrap();
        std::fs::create_dir_all(root.join("docs/blog")).unwrap();
        let root = std::fs::canonicalize(&root).unwrap();
        std::fs::write(
            root.join("docs/blogsource/post.ipynb"),
            r##"{"nbformat": 4, "nbformat_minor": 5, "metadata": {},
                "cells": [{"cell_type": "markdown", "metadata": {}, "source": "# Post"}]}"##,
        )
        .unwrap();

        let config = AppConfig {
            config_file_path: root.join("nbdocs.toml"),
            ..AppConfig::default()
        };
        let layout = Layout::resolve(&config).unwrap();
        (root, layout)
    }

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".into(), "-c".into(), script.into()]
    }

    #[tokio::test]
    async fn build_command_failure_is_build_error() {
        let err = run_build_command(&sh("exit 3"), &std::env::temp_dir())
            .await
            .unwrap_err();
        assert!(matches!(err, NbDocsError::Build(_)));
    }

    #[tokio::test]
    async fn empty_build_command_is_rejected() {
        assert!(run_build_command(&[], &std::env::temp_dir()).await.is_err());
    }

    #[tokio::test]
    async fn full_build_strips_and_cleans() {
        let (root, layout) = project();
        let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../../fixtures");
        let script = format!(
            "mkdir -p site/search site/blog/post && test -f docs/blog/post.md \
             && cp {} site/search/search_index.json && cp {} site/blog/post/index.html",
            fixtures.join("search/search_index.json").display(),
            fixtures.join("html/plotly.html").display(),
        );
        let build = BuildConfig {
            command: sh(&script),
            ..BuildConfig::default()
        };
        let ledger = root.join(".nbdocs-ledger.json");

        let outcome = build_site(
            BuildPlan {
                layout: &layout,
                build: &build,
                ledger_path: &ledger,
                execute: None,
            },
            &JupyterExecutor,
            &SilentProgress,
        )
        .await
        .unwrap();

        assert!(outcome.built);
        assert_eq!(outcome.html_rewritten, 1);
        assert_eq!(outcome.search_records_stripped, Some(2));
        assert_eq!(outcome.cleanup.files_removed, 1);
        assert!(!layout.output_dir.exists());
        assert!(!ledger.exists());

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn failed_build_keeps_ledger_and_pages() {
        let (root, layout) = project();
        let build = BuildConfig {
            command: sh("exit 1"),
            ..BuildConfig::default()
        };
        let ledger = root.join(".nbdocs-ledger.json");

        let err = build_site(
            BuildPlan {
                layout: &layout,
                build: &build,
                ledger_path: &ledger,
                execute: None,
            },
            &JupyterExecutor,
            &SilentProgress,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, NbDocsError::Build(_)));
        assert!(ledger.exists());
        assert!(layout.output_dir.join("post.md").exists());

        let _ = std::fs::remove_dir_all(&root);
    }
}
