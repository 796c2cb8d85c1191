//! Error types for schema decoding
//!
//! Every decode failure carries the [`DecodePath`] of the node that
//! failed, so a mismatch deep inside a nested group is reported at its
//! exact location instead of at the top-level step.

use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// One component of a [`DecodePath`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Segment {
    Key(String),
    Index(usize),
}

/// Location of a node inside the decoded value tree.
///
/// Rendered in a JSONPath-like form: `$`, `$.group.steps[1].run`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct DecodePath {
    segments: Vec<Segment>,
}

impl DecodePath {
    /// Path of the document root
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Returns the path of a mapping entry below this node
    #[must_use]
    pub fn key(&self, key: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(Segment::Key(key.into()));
        Self { segments }
    }

    /// Returns the path of a list element below this node
    #[must_use]
    pub fn index(&self, index: usize) -> Self {
        let mut segments = self.segments.clone();
        segments.push(Segment::Index(index));
        Self { segments }
    }

    /// Returns true for the document root
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }
}

impl fmt::Display for DecodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("$")?;
        for segment in &self.segments {
            match segment {
                Segment::Key(key) => write!(f, ".{key}")?,
                Segment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

/// Errors produced while decoding a generic value tree
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The node's shape matches no accepted form for its target
    #[error("type mismatch at {path}: {reason}")]
    TypeMismatch {
        /// Location of the offending node.
        path: DecodePath,
        /// What was expected and what was found.
        reason: String,
    },

    /// A reserved `include`/`exclude` key is not a list of string maps
    #[error("malformed reserved key `{key}` at {path}: {reason}")]
    MalformedReservedKey {
        /// Location of the mapping holding the reserved key.
        path: DecodePath,
        /// The reserved key (`include` or `exclude`).
        key: String,
        /// Underlying decode failure.
        reason: String,
    },
}

impl DecodeError {
    pub(crate) fn type_mismatch(path: &DecodePath, reason: impl fmt::Display) -> Self {
        Self::TypeMismatch {
            path: path.clone(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn unexpected(path: &DecodePath, expected: &str, found: &Value) -> Self {
        Self::type_mismatch(path, format!("expected {expected}, found {}", kind_of(found)))
    }

    pub(crate) fn malformed_reserved_key(
        path: &DecodePath,
        key: &str,
        reason: impl fmt::Display,
    ) -> Self {
        Self::MalformedReservedKey {
            path: path.clone(),
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Location of the node that failed to decode
    #[must_use]
    pub fn path(&self) -> &DecodePath {
        match self {
            Self::TypeMismatch { path, .. } | Self::MalformedReservedKey { path, .. } => path,
        }
    }

    /// Returns true if this is a [`DecodeError::TypeMismatch`]
    #[must_use]
    pub fn is_type_mismatch(&self) -> bool {
        matches!(self, Self::TypeMismatch { .. })
    }

    /// Returns true if this is a [`DecodeError::MalformedReservedKey`]
    #[must_use]
    pub fn is_malformed_reserved_key(&self) -> bool {
        matches!(self, Self::MalformedReservedKey { .. })
    }
}

/// Result alias for decode operations
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Human-readable name of a value's shape
pub(crate) fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}
