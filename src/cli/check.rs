//! `pipeliner-schema check` - Decode and validate a definition
//!
//! Reports decode errors (with the path of the offending node) and
//! validation errors such as a step declaring two variants.
//!
//! ## Example
//!
//! ```bash
//! pipeliner-schema check pipeline.yaml
//! # Exit code 0: No errors found
//! # Exit code 1: Decode or validation errors found
//! ```

use anyhow::Result;
use pipeliner_schema::ValidationError;
use std::path::Path;

use super::document::load_document;

/// Decodes a document and returns its validation errors
pub fn check_file(file: &Path) -> Result<Vec<ValidationError>> {
    tracing::debug!("Checking: {}", file.display());
    let document = load_document(file)?;
    Ok(document.diagnostics())
}

/// Checks a document, printing diagnostics and failing if there are any
pub fn check_pipeline(file: &Path) -> Result<()> {
    let diagnostics = check_file(file)?;

    if diagnostics.is_empty() {
        tracing::info!("Pipeline definition is valid: {}", file.display());
        return Ok(());
    }

    for diagnostic in &diagnostics {
        eprintln!("{}: {diagnostic}", file.display());
    }
    anyhow::bail!(
        "{} validation error(s) in {}",
        diagnostics.len(),
        file.display()
    );
}
