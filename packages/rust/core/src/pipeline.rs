//! End-to-end `convert` pipeline: discover → execute → filter → render → write.

use std::path::{Path, PathBuf};
use std::time::Instant;

use sha2::{Digest, Sha256};
use tracing::{debug, error, info, instrument};

use nbdocs_discovery::{Layout, resolve_dir};
use nbdocs_markdown::RenderOptions;
use nbdocs_notebook::{read_notebook, remove_tagged, write_notebook};
use nbdocs_shared::{
    ConversionReport, ExecuteOptions, ExecutionErrorRecord, GeneratedFile, NbDocsError,
    ResourceRecord, Result,
};

use crate::execute::NotebookExecutor;

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when a notebook has been converted (1-based counter).
    fn notebook_converted(&self, src_uri: &str, current: usize);
    /// Called when the pipeline completes.
    fn done(&self, report: &ConversionReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn notebook_converted(&self, _src_uri: &str, _current: usize) {}
    fn done(&self, _report: &ConversionReport) {}
}

/// Convert every notebook of `layout` into Markdown under the output dir.
///
/// Notebooks are processed one at a time in discovery order. When
/// `execute` is set, each notebook is run through `executor` first. A
/// cell failure aborts the run if `exit_on_error` is set; otherwise it is
/// logged, recorded in the report, and conversion continues with the
/// partially executed notebook.
///
/// Any filesystem error aborts the run. Files written for earlier
/// notebooks are left in place.
#[instrument(skip_all, fields(input = %layout.input_dir.display(), output = %layout.output_dir.display()))]
pub async fn convert_notebooks<E: NotebookExecutor>(
    layout: &Layout,
    executor: &E,
    execute: Option<&ExecuteOptions>,
    progress: &dyn ProgressReporter,
) -> Result<ConversionReport> {
    let start = Instant::now();
    let mut report = ConversionReport::new(&layout.docs_dir, &layout.output_dir);

    let exec_cwd = match execute {
        Some(opts) => Some(match &opts.run_path {
            Some(run_path) => resolve_dir(&layout.config_dir, run_path)?,
            None => layout.input_dir.clone(),
        }),
        None => None,
    };

    progress.phase("Converting notebooks");

    for (i, nb_path) in layout.notebooks().enumerate() {
        let i = i + 1;
        let target = layout.target_for(&nb_path)?;
        let file = GeneratedFile::new(
            &target.src_uri,
            &layout.docs_dir,
            &layout.site_dir,
            layout.use_directory_urls,
        );

        info!("({i}) {} => {}", nb_path.display(), file.src_uri);

        let mut notebook = read_notebook(&nb_path)?;

        // --- Execution ---
        if let (Some(opts), Some(cwd)) = (execute, exec_cwd.as_deref()) {
            debug!(i, "notebook execution start");
            let ts = Instant::now();

            match executor.execute(&mut notebook, cwd, opts).await {
                Ok(()) => {
                    debug!(i, elapsed_ms = ts.elapsed().as_millis() as u64, "notebook execution finish");
                }
                Err(NbDocsError::CellExecution {
                    cell_index,
                    ename,
                    evalue,
                }) if !opts.exit_on_error => {
                    error!(
                        i,
                        elapsed_ms = ts.elapsed().as_millis() as u64,
                        "notebook execution error: cell {cell_index} raised {ename}: {evalue}"
                    );
                    report.execution_errors.push(ExecutionErrorRecord {
                        notebook: nb_path.clone(),
                        cell_index,
                        ename,
                        evalue,
                    });
                }
                Err(e) => return Err(e),
            }

            if opts.write_back {
                debug!(i, "save notebook");
                write_notebook(&nb_path, &notebook)?;
            }
        }

        // --- Tag filtering and rendering ---
        remove_tagged(&mut notebook);

        let resource_key = nb_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let rendered = nbdocs_markdown::render(&notebook, &RenderOptions { resource_key })?;

        // --- Write page and resources ---
        write_file(&target.md_path, rendered.markdown.as_bytes())?;

        let src_dir = parent_dir(&file.abs_src_path);
        let dest_dir = parent_dir(&file.abs_dest_path);

        for resource in &rendered.resources {
            let src_path = src_dir.join(&resource.name);
            let dest_path = dest_dir.join(&resource.name);

            write_file(&src_path, &resource.data)?;
            report.written.push(src_path.clone());

            debug!(
                i,
                size_bytes = resource.data.len(),
                name = %resource.name,
                dest = %dest_path.display(),
                "resource output"
            );
            write_file(&dest_path, &resource.data)?;

            report.resources.push(ResourceRecord {
                name: resource.name.clone(),
                src_path,
                dest_path,
                size_bytes: resource.data.len(),
                sha256: format!("{:x}", Sha256::digest(&resource.data)),
            });
        }

        report.written.push(file.abs_src_path.clone());
        progress.notebook_converted(&file.src_uri, i);
        report.files.append(file);
    }

    progress.done(&report);

    info!(
        notebooks = report.files.len(),
        resources = report.resources.len(),
        execution_errors = report.execution_errors.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "convert pipeline complete"
    );

    Ok(report)
}

fn parent_dir(path: &Path) -> PathBuf {
    path.parent().map(Path::to_path_buf).unwrap_or_default()
}

/// Write `data` to `path`, creating parent directories as needed.
fn write_file(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| NbDocsError::io(parent, e))?;
    }
    std::fs::write(path, data).map_err(|e| NbDocsError::io(path, e))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use nbdocs_notebook::{Cell, MultilineString, Notebook, Output};
    use nbdocs_shared::AppConfig;

    const PNG: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

    /// Appends a stream output to each code cell; a cell whose source
    /// contains `raise` fails instead.
    #[derive(Default)]
    struct ScriptedExecutor {
        calls: Mutex<Vec<PathBuf>>,
    }

    impl NotebookExecutor for ScriptedExecutor {
        async fn execute(
            &self,
            notebook: &mut Notebook,
            cwd: &Path,
            _opts: &ExecuteOptions,
        ) -> Result<()> {
            self.calls.lock().unwrap().push(cwd.to_path_buf());

            for (idx, cell) in notebook.cells.iter_mut().enumerate() {
                let Cell::Code(code) = cell else { continue };
                if code.source.as_str().contains("raise") {
                    code.outputs = vec![Output::Error {
                        ename: "RuntimeError".into(),
                        evalue: "scripted".into(),
                        traceback: vec!["RuntimeError: scripted".into()],
                    }];
                    return Err(NbDocsError::CellExecution {
                        cell_index: idx,
                        ename: "RuntimeError".into(),
                        evalue: "scripted".into(),
                    });
                }
                code.outputs = vec![Output::Stream {
                    name: "stdout".into(),
                    text: MultilineString::from("executed\n"),
                }];
            }
            Ok(())
        }
    }

    struct Project {
        root: PathBuf,
        layout: Layout,
    }

    impl Project {
        fn new() -> Self {
            let root = std::env::temp_dir().join(format!("nbdocs-pipeline-{}", uuid::Uuid::now_v7()));
            std::fs::create_dir_all(root.join("docs/blogsource")).unwrap();
            std::fs::create_dir_all(root.join("docs/blog")).unwrap();
            let root = std::fs::canonicalize(&root).unwrap();

            let config = AppConfig {
                config_file_path: root.join("nbdocs.toml"),
                ..AppConfig::default()
            };
            let layout = Layout::resolve(&config).unwrap();
            Self { root, layout }
        }

        fn add_notebook(&self, rel: &str, cells: &str) -> PathBuf {
            let path = self.layout.input_dir.join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(
                &path,
                format!(
                    r#"{{"nbformat": 4, "nbformat_minor": 5,
                        "metadata": {{"language_info": {{"name": "python"}}}},
                        "cells": {cells}}}"#
                ),
            )
            .unwrap();
            path
        }
    }

    impl Drop for Project {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.root);
        }
    }

    fn exec_opts(exit_on_error: bool, write_back: bool) -> ExecuteOptions {
        ExecuteOptions {
            run_path: None,
            kernel_name: None,
            timeout: None,
            write_back,
            exit_on_error,
            python_cmd: "python3".into(),
        }
    }

    #[tokio::test]
    async fn converts_nested_notebook_with_resources() {
        let project = Project::new();
        project.add_notebook(
            "sub/a.ipynb",
            &format!(
                r#"[{{"cell_type": "code", "metadata": {{}}, "source": "plot()", "execution_count": 1,
                     "outputs": [{{"output_type": "display_data", "metadata": {{}}, "data": {{"image/png": "{PNG}"}}}}]}}]"#
            ),
        );
        let executor = ScriptedExecutor::default();

        let report = convert_notebooks(&project.layout, &executor, None, &SilentProgress)
            .await
            .unwrap();

        let docs = &project.layout.docs_dir;
        let site = &project.layout.site_dir;
        let md = docs.join("blog/sub/a.md");
        let png_src = docs.join("blog/sub/a_0_0.png");
        let png_dest = site.join("blog/sub/a/a_0_0.png");

        assert!(executor.calls.lock().unwrap().is_empty());
        assert_eq!(report.files.len(), 1);
        let file = report.files.iter().next().unwrap();
        assert_eq!(file.src_uri, "blog/sub/a.md");
        assert_eq!(file.dest_uri, "blog/sub/a/index.html");
        assert_eq!(file.url, "blog/sub/a/");

        assert_eq!(report.written, vec![png_src.clone(), md.clone()]);
        assert!(std::fs::read_to_string(&md).unwrap().contains("![png](a_0_0.png)"));
        assert!(png_src.exists());
        assert!(png_dest.exists());

        assert_eq!(report.resources.len(), 1);
        assert_eq!(report.resources[0].dest_path, png_dest);
        assert_eq!(report.resources[0].sha256.len(), 64);
    }

    #[tokio::test]
    async fn execution_runs_in_input_dir() {
        let project = Project::new();
        project.add_notebook(
            "ok.ipynb",
            r#"[{"cell_type": "code", "metadata": {}, "source": "print(1)", "execution_count": null, "outputs": []}]"#,
        );
        let executor = ScriptedExecutor::default();
        let opts = exec_opts(true, false);

        let report = convert_notebooks(&project.layout, &executor, Some(&opts), &SilentProgress)
            .await
            .unwrap();

        assert_eq!(*executor.calls.lock().unwrap(), vec![project.layout.input_dir.clone()]);
        assert!(report.execution_errors.is_empty());
        let md = std::fs::read_to_string(project.layout.docs_dir.join("blog/ok.md")).unwrap();
        assert!(md.contains("    executed"));
    }

    #[tokio::test]
    async fn exit_on_error_aborts_run() {
        let project = Project::new();
        project.add_notebook(
            "bad.ipynb",
            r#"[{"cell_type": "code", "metadata": {}, "source": "raise RuntimeError()", "execution_count": null, "outputs": []}]"#,
        );
        let opts = exec_opts(true, true);

        let err = convert_notebooks(
            &project.layout,
            &ScriptedExecutor::default(),
            Some(&opts),
            &SilentProgress,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, NbDocsError::CellExecution { cell_index: 0, .. }));
        assert!(!project.layout.docs_dir.join("blog/bad.md").exists());

        // no write-back on abort
        let on_disk = read_notebook(&project.layout.input_dir.join("bad.ipynb")).unwrap();
        let Cell::Code(code) = &on_disk.cells[0] else { panic!() };
        assert!(code.outputs.is_empty());
    }

    #[tokio::test]
    async fn recoverable_error_is_recorded_and_written_back() {
        let project = Project::new();
        let nb_path = project.add_notebook(
            "partial.ipynb",
            r#"[
            {"cell_type": "code", "metadata": {}, "source": "setup()", "execution_count": null, "outputs": []},
            {"cell_type": "code", "metadata": {}, "source": "raise ValueError()", "execution_count": null, "outputs": []},
            {"cell_type": "code", "metadata": {}, "source": "never()", "execution_count": null, "outputs": []}
        ]"#,
        );
        let opts = exec_opts(false, true);

        let report = convert_notebooks(
            &project.layout,
            &ScriptedExecutor::default(),
            Some(&opts),
            &SilentProgress,
        )
        .await
        .unwrap();

        assert_eq!(
            report.execution_errors,
            vec![ExecutionErrorRecord {
                notebook: nb_path.clone(),
                cell_index: 1,
                ename: "RuntimeError".into(),
                evalue: "scripted".into(),
            }]
        );
        assert_eq!(report.files.len(), 1);

        let on_disk = read_notebook(&nb_path).unwrap();
        let Cell::Code(first) = &on_disk.cells[0] else { panic!() };
        assert!(matches!(&first.outputs[0], Output::Stream { .. }));
        let Cell::Code(failed) = &on_disk.cells[1] else { panic!() };
        assert!(matches!(&failed.outputs[0], Output::Error { .. }));
        let Cell::Code(last) = &on_disk.cells[2] else { panic!() };
        assert!(last.outputs.is_empty());

        let md = std::fs::read_to_string(project.layout.docs_dir.join("blog/partial.md")).unwrap();
        assert!(md.contains("    RuntimeError: scripted"));
    }

    #[tokio::test]
    async fn removal_tags_apply_before_rendering() {
        let project = Project::new();
        std::fs::copy(
            Path::new(env!("CARGO_MANIFEST_DIR")).join("../../../fixtures/notebooks/tags.ipynb"),
            project.layout.input_dir.join("tags.ipynb"),
        )
        .unwrap();

        let report = convert_notebooks(
            &project.layout,
            &ScriptedExecutor::default(),
            None,
            &SilentProgress,
        )
        .await
        .unwrap();

        let md = std::fs::read_to_string(project.layout.docs_dir.join("blog/tags.md")).unwrap();
        assert!(!md.contains("SECRET"));
        assert!(md.contains("VISIBLE_OUTPUT"));
        assert_eq!(report.resources[0].name, "tags_3_0.png");
        assert_eq!(report.written.len(), 2);
    }
}
