//! Persistence of [`ConversionReport`]s between `convert` and `clean`.

use std::path::Path;

use tracing::debug;

use nbdocs_shared::{CURRENT_SCHEMA_VERSION, ConversionReport, NbDocsError, Result};

/// Write `report` as pretty JSON to `path`.
pub fn write_ledger(path: &Path, report: &ConversionReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report)
        .map_err(|e| NbDocsError::parse(format!("ledger serialization failed: {e}")))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| NbDocsError::io(parent, e))?;
    }
    std::fs::write(path, json).map_err(|e| NbDocsError::io(path, e))?;

    debug!(path = %path.display(), files = report.written.len(), "wrote ledger");
    Ok(())
}

/// Read a ledger written by [`write_ledger`].
pub fn read_ledger(path: &Path) -> Result<ConversionReport> {
    let content = std::fs::read_to_string(path).map_err(|e| NbDocsError::io(path, e))?;
    let report: ConversionReport = serde_json::from_str(&content)
        .map_err(|e| NbDocsError::parse(format!("{}: {e}", path.display())))?;

    if report.schema_version > CURRENT_SCHEMA_VERSION {
        return Err(NbDocsError::validation(format!(
            "ledger schema version {} is newer than supported {CURRENT_SCHEMA_VERSION}",
            report.schema_version
        )));
    }
    Ok(report)
}

/// Delete the ledger file; a missing ledger is fine.
pub fn remove_ledger(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(NbDocsError::io(path, e)),
    }
}
