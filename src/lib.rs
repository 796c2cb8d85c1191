//! # Pipeliner Schema - flexible decoding of pipeline definitions
//!
//! Pipeline authors write the same concept in several shapes: a step may
//! be a bare command list or a structured object with one variant field,
//! and a strategy matrix mixes free-form axes with the reserved
//! `include`/`exclude` keys in one flat map. This crate decides which
//! shape was used, normalizes it into one canonical representation and
//! re-encodes that representation in the flattened, human-friendly form.
//!
//! ## Quick Start
//!
//! ```rust
//! use pipeliner_schema::schema::{Validate, decode_step};
//! use serde_json::json;
//!
//! let step = decode_step(&json!({
//!     "name": "test",
//!     "run": {"script": "go test ./..."},
//!     "strategy": {"matrix": {"go": ["1.21", "1.22"], "exclude": [{"go": "1.21"}]}}
//! }))
//! .unwrap();
//!
//! assert!(step.validate().is_ok());
//! assert_eq!(step.expand_matrix().len(), 1);
//! ```
//!
//! ## Features
//!
//! - **Shape-probing decode**: shorthand first, structured mapping second
//! - **Reserved-key carve-out**: `include`/`exclude` never become axes
//! - **Precise errors**: every failure names the path of the bad node
//! - **Validation stage**: conflicting or missing step variants are
//!   reported explicitly instead of being resolved silently
//!
//! ## License
//!
//! Licensed under either of
//! - Apache License, Version 2.0 ([LICENSE-APACHE](LICENSE-APACHE) or <https://www.apache.org/licenses/LICENSE-2.0>)
//! - MIT license ([LICENSE-MIT](LICENSE-MIT) or <https://opensource.org/licenses/MIT>)
//!
//! at your option.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod infrastructure;
pub mod schema;

// Re-export commonly used types
pub use infrastructure::{Config, ConfigError, OutputFormat, init_logging};
pub use schema::{
    DecodeError, DecodePath, Matrix, Step, StepKind, StepPayload, StringOrInt, StringOrList,
    Strategy, Validate, ValidationError, decode_matrix, decode_step,
};

/// Version of the pipeliner-schema crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
