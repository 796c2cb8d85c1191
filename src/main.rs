//! pipeliner-schema - normalize and check pipeline step definitions
//!
//! ## Commands
//!
//! - `pipeliner-schema normalize` - Print a definition in canonical form
//! - `pipeliner-schema check` - Decode and validate a definition
//! - `pipeliner-schema completions` - Generate shell completions
//!
//! ## Quick Start
//!
//! ```bash
//! # Resolve shorthands and flattened matrices
//! pipeliner-schema normalize pipeline.yaml --format json
//!
//! # One step per matrix cell
//! pipeliner-schema normalize pipeline.yaml --expand
//!
//! # Report decode errors and conflicting step variants
//! pipeliner-schema check pipeline.yaml
//! ```
//!
//! Set `PIPELINER_SCHEMA_DEBUG` (or pass `--verbose`) to enable logging;
//! `PIPELINER_SCHEMA_LOG` sets the level.

use std::process::ExitCode;

mod cli;

fn main() -> ExitCode {
    match cli::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
