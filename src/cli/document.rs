//! Pipeline documents on disk
//!
//! A document is either a single step or a mapping with a `steps` list.
//! The file is parsed as YAML (which also accepts JSON) into a generic
//! value tree and handed to the schema decoders.

use anyhow::{Context, Result};
use pipeliner_schema::schema::{
    DecodePath, Step, ValidationError, decode_step, validate_steps,
};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

/// A decoded pipeline document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Document {
    /// The whole file is one step
    Single(Step),
    /// The file holds a `steps` list
    Steps(Vec<Step>),
}

impl Document {
    /// Decodes an already parsed value tree
    pub fn decode(value: &Value) -> Result<Self> {
        if let Some(Value::Array(items)) = value.get("steps") {
            let path = DecodePath::root().key("steps");
            let steps = items
                .iter()
                .enumerate()
                .map(|(index, item)| Step::decode(item, &path.index(index)))
                .collect::<Result<Vec<_>, _>>()?;
            tracing::debug!(count = steps.len(), "decoded step list");
            return Ok(Self::Steps(steps));
        }

        let step = decode_step(value)?;
        tracing::debug!(kinds = ?step.kinds(), "decoded single step");
        Ok(Self::Single(step))
    }

    /// Expands every matrix strategy into one step per cell
    #[must_use]
    pub fn expand(self) -> Self {
        match self {
            Self::Single(step) => {
                let mut expanded = step.expand_matrix();
                if expanded.len() == 1 {
                    Self::Single(expanded.remove(0))
                } else {
                    Self::Steps(expanded)
                }
            }
            Self::Steps(steps) => {
                Self::Steps(steps.iter().flat_map(Step::expand_matrix).collect())
            }
        }
    }

    /// Encodes the normalized document
    pub fn encode(&self) -> Result<Value> {
        match self {
            Self::Single(step) => Ok(step.encode()?),
            Self::Steps(steps) => {
                let encoded = steps
                    .iter()
                    .map(Step::encode)
                    .collect::<Result<Vec<_>, _>>()?;
                let mut map = Map::new();
                map.insert("steps".to_string(), Value::Array(encoded));
                Ok(Value::Object(map))
            }
        }
    }

    /// Runs step validation over the whole document
    #[must_use]
    pub fn diagnostics(&self) -> Vec<ValidationError> {
        match self {
            Self::Single(step) => step.diagnostics(&DecodePath::root()),
            Self::Steps(steps) => validate_steps(steps, &DecodePath::root().key("steps")),
        }
    }
}

/// Reads and decodes a document file
pub fn load_document(file: &Path) -> Result<Document> {
    if !file.exists() {
        anyhow::bail!("Pipeline file not found: {}", file.display());
    }

    let content = fs::read_to_string(file)
        .with_context(|| format!("Failed to read file: {}", file.display()))?;
    let value: Value = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse file: {}", file.display()))?;

    Document::decode(&value).with_context(|| format!("Failed to decode: {}", file.display()))
}
