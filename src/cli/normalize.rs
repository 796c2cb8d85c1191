//! `pipeliner-schema normalize` - Re-emit a definition in canonical form
//!
//! Decodes every step (resolving shorthands and the flattened matrix
//! form) and prints the structured representation.
//!
//! ## Usage
//!
//! ```bash
//! pipeliner-schema normalize pipeline.yaml --format json
//! ```

use anyhow::{Context, Result};
use pipeliner_schema::OutputFormat;
use std::fs;
use std::path::Path;

use super::document::{Document, load_document};

/// Options for the normalize command
#[derive(Debug, Clone, Copy)]
pub struct NormalizeConfig {
    /// Output format
    pub format: OutputFormat,
    /// Expand matrix strategies into one step per cell
    pub expand: bool,
}

/// Loads, decodes and re-encodes a document file
pub fn normalize_file(file: &Path, config: NormalizeConfig) -> Result<String> {
    tracing::debug!("Normalizing: {}", file.display());
    let document = load_document(file)?;
    render(document, config)
}

/// Encodes a decoded document in the requested format
pub fn render(document: Document, config: NormalizeConfig) -> Result<String> {
    let document = if config.expand {
        document.expand()
    } else {
        document
    };
    let value = document.encode().context("Failed to encode document")?;

    match config.format {
        OutputFormat::Yaml => serde_yaml::to_string(&value).context("Failed to render YAML"),
        OutputFormat::Json => {
            serde_json::to_string_pretty(&value).context("Failed to render JSON")
        }
    }
}

/// Writes normalized output to a file
pub fn save_output(output: &str, output_path: &Path) -> Result<()> {
    fs::write(output_path, output)
        .with_context(|| format!("Failed to write output to: {}", output_path.display()))?;
    tracing::info!("Normalized output written to {}", output_path.display());
    Ok(())
}
