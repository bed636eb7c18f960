//! Notebook execution through the Jupyter kernel client.
//!
//! nbdocs does not talk to kernels itself. [`JupyterExecutor`] pipes the
//! notebook through a small `nbclient` driver run by the configured Python
//! interpreter and reads the executed notebook back from stdout.

use std::future::Future;
use std::path::Path;
use std::process::Stdio;
use std::time::Instant;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, instrument};

use nbdocs_notebook::{Notebook, parse_notebook, to_notebook_json};
use nbdocs_shared::{ExecuteOptions, NbDocsError, Result};

/// Exit status of [`DRIVER`] when a cell raised.
pub const CELL_FAILURE_EXIT: i32 = 3;

/// Executes the notebook on stdin and writes it to stdout.
///
/// Execution stops at the first failing cell (cells tagged
/// `raises-exception` excepted); the partial notebook is still written and
/// the exit status is [`CELL_FAILURE_EXIT`]. Arguments: timeout, kernel
/// name, each empty when unset.
pub const DRIVER: &str = r#"import sys
import nbformat
from nbclient import NotebookClient
from nbclient.exceptions import CellExecutionError

nb = nbformat.read(sys.stdin, as_version=4)
opts = {}
if sys.argv[1]:
    opts["timeout"] = int(sys.argv[1])
if sys.argv[2]:
    opts["kernel_name"] = sys.argv[2]

status = 0
try:
    NotebookClient(nb, resources={"metadata": {"path": "."}}, **opts).execute()
except CellExecutionError:
    status = 3

nbformat.write(nb, sys.stdout)
sys.exit(status)
"#;

/// Runs the code cells of a notebook in order.
pub trait NotebookExecutor: Send + Sync {
    /// Execute `notebook` in place with `cwd` as the kernel's working directory.
    ///
    /// On a cell failure the notebook keeps its partial state (outputs up to
    /// and including the failing cell) and [`NbDocsError::CellExecution`] is
    /// returned. Any other error leaves the notebook untouched.
    fn execute(
        &self,
        notebook: &mut Notebook,
        cwd: &Path,
        opts: &ExecuteOptions,
    ) -> impl Future<Output = Result<()>> + Send;
}

// ---------------------------------------------------------------------------
// JupyterExecutor
// ---------------------------------------------------------------------------

/// Executes notebooks with `nbclient`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JupyterExecutor;

impl JupyterExecutor {
    /// Arguments passed after the Python interpreter.
    pub fn build_args(opts: &ExecuteOptions) -> Vec<String> {
        vec![
            "-c".into(),
            DRIVER.into(),
            opts.timeout.map(|t| t.to_string()).unwrap_or_default(),
            opts.kernel_name.clone().unwrap_or_default(),
        ]
    }
}

impl NotebookExecutor for JupyterExecutor {
    #[instrument(skip_all, fields(cwd = %cwd.display()))]
    async fn execute(
        &self,
        notebook: &mut Notebook,
        cwd: &Path,
        opts: &ExecuteOptions,
    ) -> Result<()> {
        let started = Instant::now();
        let input = to_notebook_json(notebook)?;

        let mut child = Command::new(&opts.python_cmd)
            .args(Self::build_args(opts))
            .current_dir(cwd)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                NbDocsError::Execution(format!(
                    "failed to spawn `{}`: {e}. Is Python with nbclient installed?",
                    opts.python_cmd
                ))
            })?;

        let mut stdin = child.stdin.take().ok_or_else(|| {
            NbDocsError::Execution("failed to capture kernel client stdin".into())
        })?;
        stdin
            .write_all(input.as_bytes())
            .await
            .map_err(|e| NbDocsError::Execution(format!("failed to write notebook: {e}")))?;
        drop(stdin);

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| NbDocsError::Execution(format!("kernel client wait error: {e}")))?;

        let cell_failed = output.status.code() == Some(CELL_FAILURE_EXIT);
        if !output.status.success() && !cell_failed {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let last = stderr.trim().lines().last().unwrap_or("no output");
            return Err(NbDocsError::Execution(format!(
                "`{}` exited with {}: {last}",
                opts.python_cmd, output.status
            )));
        }

        let stdout = String::from_utf8(output.stdout)
            .map_err(|e| NbDocsError::Execution(format!("executed notebook is not UTF-8: {e}")))?;
        let executed = parse_notebook(&stdout)
            .map_err(|e| NbDocsError::Execution(format!("unreadable executed notebook: {e}")))?;

        debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            cell_failed,
            "notebook executed"
        );

        apply_executed(notebook, executed, cell_failed)
    }
}

/// Replace `notebook` with its executed form.
///
/// When the client stopped on a failing cell, the partial notebook is kept
/// and the first unexpected error becomes [`NbDocsError::CellExecution`].
pub fn apply_executed(notebook: &mut Notebook, executed: Notebook, cell_failed: bool) -> Result<()> {
    let failure = executed
        .first_error()
        .map(|(idx, ename, evalue)| (idx, ename.to_string(), evalue.to_string()));

    if !cell_failed {
        *notebook = executed;
        return Ok(());
    }

    let Some((cell_index, ename, evalue)) = failure else {
        return Err(NbDocsError::Execution(
            "kernel client reported a cell failure but no error output".into(),
        ));
    };
    *notebook = executed;

    Err(NbDocsError::CellExecution {
        cell_index,
        ename,
        evalue,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use nbdocs_notebook::{Cell, Output};

    fn opts() -> ExecuteOptions {
        ExecuteOptions {
            run_path: None,
            kernel_name: None,
            timeout: None,
            write_back: false,
            exit_on_error: true,
            python_cmd: "python3".into(),
        }
    }

    fn notebook(cells: &str) -> Notebook {
        parse_notebook(&format!(
            r#"{{"nbformat": 4, "nbformat_minor": 5, "metadata": {{}}, "cells": {cells}}}"#
        ))
        .unwrap()
    }

    const BEFORE: &str = r#"[
        {"cell_type": "code", "metadata": {}, "source": "a", "execution_count": null, "outputs": []},
        {"cell_type": "code", "metadata": {}, "source": "boom()", "execution_count": null, "outputs": []},
        {"cell_type": "code", "metadata": {}, "source": "write_file()", "execution_count": null, "outputs": []}
    ]"#;

    const STOPPED: &str = r#"[
        {"cell_type": "code", "metadata": {}, "source": "a", "execution_count": 1, "outputs": []},
        {"cell_type": "code", "metadata": {}, "source": "boom()", "execution_count": 2,
         "outputs": [{"output_type": "error", "ename": "NameError", "evalue": "name 'boom' is not defined", "traceback": []}]},
        {"cell_type": "code", "metadata": {}, "source": "write_file()", "execution_count": null, "outputs": []}
    ]"#;

    #[test]
    fn args_without_overrides() {
        assert_eq!(JupyterExecutor::build_args(&opts()), ["-c", DRIVER, "", ""]);
    }

    #[test]
    fn args_with_timeout_and_kernel() {
        let opts = ExecuteOptions {
            timeout: Some(600),
            kernel_name: Some("python3".into()),
            ..opts()
        };
        assert_eq!(
            JupyterExecutor::build_args(&opts),
            ["-c", DRIVER, "600", "python3"]
        );
    }

    #[test]
    fn driver_stops_at_first_failure() {
        assert!(!DRIVER.contains("allow_errors"));
        assert!(DRIVER.contains("except CellExecutionError:"));
        assert!(DRIVER.contains(&format!("status = {CELL_FAILURE_EXIT}")));
    }

    #[test]
    fn successful_execution_replaces_notebook() {
        let mut nb = notebook(
            r#"[{"cell_type": "code", "metadata": {}, "source": "1", "execution_count": null, "outputs": []}]"#,
        );
        let executed = notebook(
            r#"[{"cell_type": "code", "metadata": {}, "source": "1", "execution_count": 1,
                 "outputs": [{"output_type": "execute_result", "execution_count": 1, "metadata": {}, "data": {"text/plain": "1"}}]}]"#,
        );
        apply_executed(&mut nb, executed.clone(), false).unwrap();
        assert_eq!(nb, executed);
    }

    #[test]
    fn cell_failure_keeps_partial_notebook() {
        let mut nb = notebook(BEFORE);
        let err = apply_executed(&mut nb, notebook(STOPPED), true).unwrap_err();
        assert!(matches!(
            &err,
            NbDocsError::CellExecution { cell_index: 1, ename, .. } if ename == "NameError"
        ));

        let Cell::Code(failed) = &nb.cells[1] else { panic!() };
        assert!(matches!(&failed.outputs[0], Output::Error { .. }));
        let Cell::Code(last) = &nb.cells[2] else { panic!() };
        assert_eq!(last.execution_count, None);
    }

    #[test]
    fn cell_failure_without_error_output_is_execution_error() {
        let mut nb = notebook(BEFORE);
        let err = apply_executed(&mut nb, notebook(BEFORE), true).unwrap_err();
        assert!(matches!(err, NbDocsError::Execution(_)));
    }

    #[tokio::test]
    async fn missing_interpreter_is_execution_error() {
        let mut nb = notebook("[]");
        let opts = ExecuteOptions {
            python_cmd: format!("nbdocs-no-such-python-{}", uuid::Uuid::now_v7()),
            ..opts()
        };
        let err = JupyterExecutor
            .execute(&mut nb, &std::env::temp_dir(), &opts)
            .await
            .unwrap_err();
        assert!(matches!(err, NbDocsError::Execution(_)));
    }

    /// Stand-in interpreter that swallows stdin, prints `stdout` and exits
    /// with `status`.
    #[cfg(unix)]
    fn fake_interpreter(dir: &Path, stdout: &str, status: i32) -> String {
        use std::os::unix::fs::PermissionsExt;

        std::fs::write(dir.join("out.ipynb"), stdout).unwrap();
        let script = dir.join("python");
        std::fs::write(
            &script,
            format!(
                "#!/bin/sh\ncat > /dev/null\ncat '{}'\nexit {status}\n",
                dir.join("out.ipynb").display()
            ),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        script.display().to_string()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stopped_run_maps_to_cell_execution() {
        let dir = std::env::temp_dir().join(format!("nbdocs-exec-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        let stopped = format!(
            r#"{{"nbformat": 4, "nbformat_minor": 5, "metadata": {{}}, "cells": {STOPPED}}}"#
        );
        let opts = ExecuteOptions {
            python_cmd: fake_interpreter(&dir, &stopped, CELL_FAILURE_EXIT),
            ..opts()
        };

        let mut nb = notebook(BEFORE);
        let err = JupyterExecutor.execute(&mut nb, &dir, &opts).await.unwrap_err();

        assert!(matches!(err, NbDocsError::CellExecution { cell_index: 1, .. }));
        let Cell::Code(last) = &nb.cells[2] else { panic!() };
        assert!(last.outputs.is_empty());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn other_exit_status_is_execution_error() {
        let dir = std::env::temp_dir().join(format!("nbdocs-exec-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        let opts = ExecuteOptions {
            python_cmd: fake_interpreter(&dir, "", 1),
            ..opts()
        };

        let mut nb = notebook(BEFORE);
        let before = nb.clone();
        let err = JupyterExecutor.execute(&mut nb, &dir, &opts).await.unwrap_err();

        assert!(matches!(err, NbDocsError::Execution(_)));
        assert_eq!(nb, before);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
