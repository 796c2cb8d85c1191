//! Infrastructure layer
//!
//! Configuration and logging for the command-line surface.

mod config;
mod logging;

pub use config::{Config, ConfigError, OutputFormat};
pub use logging::init_logging;
