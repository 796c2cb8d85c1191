//! Execution strategy: matrix, loop and parallelism settings for a step.

use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use super::errors::{DecodePath, DecodeResult};
use super::fields::Fields;
use super::matrix::Matrix;

/// Strategy attached to a step or stage
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Strategy {
    /// Matrix expansion
    pub matrix: Option<Matrix>,
    /// Fixed number of iterations
    pub for_loop: Option<ForLoop>,
    /// Conditional loop
    pub while_loop: Option<WhileLoop>,
    /// Upper bound on concurrently running instances
    pub max_parallel: Option<u64>,
    /// Stop remaining instances after the first failure
    pub fail_fast: Option<bool>,
}

/// `for` loop strategy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForLoop {
    /// Number of iterations
    pub iterations: u64,
}

/// `while` loop strategy
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WhileLoop {
    /// Condition evaluated before each iteration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    /// Iteration limit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iterations: Option<u64>,
}

impl Strategy {
    /// Creates a matrix strategy
    #[must_use]
    pub fn matrix(matrix: Matrix) -> Self {
        Self {
            matrix: Some(matrix),
            ..Self::default()
        }
    }

    /// Decodes a strategy mapping
    pub fn decode(value: &Value, path: &DecodePath) -> DecodeResult<Self> {
        let fields = Fields::new(value, path, "a strategy mapping")?;
        Ok(Self {
            matrix: fields.decode("matrix", Matrix::decode)?,
            for_loop: fields.get("for")?,
            while_loop: fields.get("while")?,
            max_parallel: fields.get("max-parallel")?,
            fail_fast: fields.get("fail-fast")?,
        })
    }

    /// Returns true if no strategy field is set
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.matrix.is_none()
            && self.for_loop.is_none()
            && self.while_loop.is_none()
            && self.max_parallel.is_none()
            && self.fail_fast.is_none()
    }
}

impl Serialize for Strategy {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        if let Some(matrix) = &self.matrix {
            map.serialize_entry("matrix", matrix)?;
        }
        if let Some(for_loop) = &self.for_loop {
            map.serialize_entry("for", for_loop)?;
        }
        if let Some(while_loop) = &self.while_loop {
            map.serialize_entry("while", while_loop)?;
        }
        if let Some(max_parallel) = &self.max_parallel {
            map.serialize_entry("max-parallel", max_parallel)?;
        }
        if let Some(fail_fast) = &self.fail_fast {
            map.serialize_entry("fail-fast", fail_fast)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Strategy {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::decode(&value, &DecodePath::root()).map_err(serde::de::Error::custom)
    }
}
