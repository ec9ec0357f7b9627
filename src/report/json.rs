use super::types::ReportDocument;
use crate::error::{HarnessError, Result};
use std::path::Path;

/// Machine-readable copy of the report
pub fn write(document: &ReportDocument, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(document)
        .map_err(|e| HarnessError::Report(format!("cannot serialize report: {}", e)))?;
    std::fs::write(path, json)?;
    log::info!("JSON report saved to: {}", path.display());
    Ok(())
}
