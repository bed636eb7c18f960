//! Removal of generated files after the site has been built.
//!
//! Only files listed in the conversion ledger are deleted. Directories are
//! pruned only when empty and only along the paths of deleted files, so
//! anything foreign in the output tree survives.

use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument, warn};

use nbdocs_shared::{ConversionReport, NbDocsError, Result};

/// What [`cleanup`] removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupSummary {
    /// Ledger files deleted.
    pub files_removed: usize,
    /// Ledger files that were already gone.
    pub files_missing: usize,
    /// Directories removed, deepest first.
    pub dirs_removed: Vec<PathBuf>,
}

/// Delete the files a conversion run wrote and prune the emptied directories.
pub fn cleanup_report(report: &ConversionReport) -> Result<CleanupSummary> {
    cleanup(&report.written, &report.output_dir, &report.docs_dir)
}

/// Delete `written` in order, prune the emptied parents of those files
/// below `output_dir`, then `output_dir` and its empty parents up to (not
/// including) `docs_dir`.
///
/// A file that is already gone is only warned about; any other deletion
/// failure aborts. Directory removal never fails the call.
#[instrument(skip(written), fields(files = written.len()))]
pub fn cleanup(written: &[PathBuf], output_dir: &Path, docs_dir: &Path) -> Result<CleanupSummary> {
    let mut summary = CleanupSummary::default();

    for file in written {
        debug!(path = %file.display(), "remove");
        match std::fs::remove_file(file) {
            Ok(()) => summary.files_removed += 1,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(path = %file.display(), "generated file already removed");
                summary.files_missing += 1;
            }
            Err(e) => return Err(NbDocsError::io(file, e)),
        }
    }

    prune_written_parents(written, output_dir, &mut summary);
    prune_upwards(output_dir, docs_dir, &mut summary);

    debug!(?summary, "cleanup finished");
    Ok(summary)
}

/// Remove the empty directories strictly between `root` and each written
/// file, deepest first.
fn prune_written_parents(written: &[PathBuf], root: &Path, summary: &mut CleanupSummary) {
    let mut dirs: BTreeSet<(usize, PathBuf)> = BTreeSet::new();
    for file in written {
        for dir in file.ancestors().skip(1) {
            if dir == root || !dir.starts_with(root) {
                break;
            }
            dirs.insert((dir.components().count(), dir.to_path_buf()));
        }
    }

    for (_, dir) in dirs.into_iter().rev() {
        if std::fs::remove_dir(&dir).is_ok() {
            debug!(path = %dir.display(), "removed empty dir");
            summary.dirs_removed.push(dir);
        }
    }
}

/// Remove `dir`, then each empty parent, stopping at `stop`.
fn prune_upwards(dir: &Path, stop: &Path, summary: &mut CleanupSummary) {
    let mut current = Some(dir);

    while let Some(path) = current {
        if path == stop || !path.starts_with(stop) {
            break;
        }

        match std::fs::remove_dir(path) {
            Ok(()) => {
                debug!(path = %path.display(), "removed dir");
                summary.dirs_removed.push(path.to_path_buf());
            }
            Err(e) => {
                // The first failure is the output dir itself; parents are quiet.
                if path == dir {
                    warn!(path = %path.display(), error = %e, "could not remove output dir");
                } else {
                    debug!(path = %path.display(), error = %e, "stopped pruning");
                }
                break;
            }
        }

        current = path.parent();
    }
}
