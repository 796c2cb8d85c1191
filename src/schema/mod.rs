//! Pipeline schema domain
//!
//! This module contains the flexible-schema decoders for steps and
//! execution strategies, the canonical types they produce, and the
//! validation that runs on decoded steps.
//!
//! Decoding works on an already parsed [`serde_json::Value`] tree. The
//! same types also implement serde's `Deserialize`/`Serialize`, so YAML
//! can be decoded directly with `serde_yaml`.
//!
//! ```rust
//! use pipeliner_schema::schema::{StepKind, decode_step};
//! use serde_json::json;
//!
//! let step = decode_step(&json!(["go build", "go test"])).unwrap();
//! assert_eq!(step.kinds(), vec![StepKind::Run]);
//! ```

mod coerce;
mod errors;
mod fields;
mod matrix;
mod payload;
mod step;
mod strategy;
mod validation;

pub use coerce::{
    DurationError, StringOrInt, StringOrList, decode_string_or_int, decode_string_or_list,
};
pub use errors::{DecodeError, DecodePath, DecodeResult};
pub use matrix::{Cell, EXCLUDE, INCLUDE, Matrix, decode_matrix};
pub use payload::{
    Concurrency, Container, ContainerSpec, Delegate, FailureAction, FailureStrategy,
    PluginInvocation, QueueScope, Report, Shell, Status, StepAction, StepApproval, StepBarrier,
    StepGroup, StepQueue, StepRun, StepTemplate, StepTest, TestIntelligence, TestSplitting,
};
pub use step::{Context, Step, StepKind, StepPayload, decode_step};
pub use strategy::{ForLoop, Strategy, WhileLoop};
pub use validation::{Validate, ValidationError, ValidationResult, validate_steps};
