//! Matrix execution strategy.
//!
//! On the wire a matrix is one flat mapping: every key is an axis name
//! mapped to a list of values, except the reserved `include` and
//! `exclude` keys which hold explicit extra cells and cell patterns to
//! drop from the cartesian product.
//!
//! ```yaml
//! matrix:
//!   os: [linux, macos]
//!   arch: [amd64, arm64]
//!   exclude:
//!     - os: macos
//!       arch: amd64
//!   include:
//!     - os: windows
//!       arch: amd64
//! ```

use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::errors::{DecodeError, DecodePath, DecodeResult};

/// Reserved key holding extra cells
pub const INCLUDE: &str = "include";
/// Reserved key holding cell patterns to remove
pub const EXCLUDE: &str = "exclude";

/// One concrete combination of axis values
pub type Cell = BTreeMap<String, String>;

/// Matrix strategy: axes, explicit includes and excluded patterns
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Matrix {
    /// Axis name to its ordered values
    pub axis: BTreeMap<String, Vec<String>>,
    /// Extra cells added outside the cartesian product
    pub include: Vec<Cell>,
    /// Patterns removed from the cartesian product
    pub exclude: Vec<Cell>,
}

impl Matrix {
    /// Creates an empty matrix
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an axis
    #[must_use]
    pub fn with_axis<I, S>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.axis
            .insert(name.into(), values.into_iter().map(Into::into).collect());
        self
    }

    /// Adds an explicit extra cell
    #[must_use]
    pub fn with_include(mut self, cell: Cell) -> Self {
        self.include.push(cell);
        self
    }

    /// Adds an exclusion pattern
    #[must_use]
    pub fn with_exclude(mut self, pattern: Cell) -> Self {
        self.exclude.push(pattern);
        self
    }

    /// Decodes the flattened wire form.
    ///
    /// Reserved keys are removed and decoded first; everything left over
    /// is an axis. A malformed reserved key is a hard error rather than a
    /// reason to reinterpret it as an axis.
    pub fn decode(value: &Value, path: &DecodePath) -> DecodeResult<Self> {
        let Value::Object(map) = value else {
            return Err(DecodeError::unexpected(path, "a matrix mapping", value));
        };
        let mut remaining = map.clone();

        let exclude = take_reserved(&mut remaining, EXCLUDE, path)?;
        let include = take_reserved(&mut remaining, INCLUDE, path)?;

        let mut axis = BTreeMap::new();
        for (name, values) in &remaining {
            let values = Vec::<String>::deserialize(values)
                .map_err(|err| DecodeError::type_mismatch(&path.key(name.as_str()), err))?;
            axis.insert(name.clone(), values);
        }

        tracing::trace!(
            %path,
            axes = axis.len(),
            include = include.len(),
            exclude = exclude.len(),
            "decoded matrix"
        );

        Ok(Self {
            axis,
            include,
            exclude,
        })
    }

    /// Encodes back to the flattened wire form.
    ///
    /// Axes come out sorted by name; empty `include`/`exclude` are omitted.
    #[must_use]
    pub fn encode(&self) -> Value {
        let mut map = Map::new();
        for (name, values) in &self.axis {
            map.insert(
                name.clone(),
                Value::Array(values.iter().cloned().map(Value::String).collect()),
            );
        }
        if !self.include.is_empty() {
            map.insert(INCLUDE.to_string(), encode_cells(&self.include));
        }
        if !self.exclude.is_empty() {
            map.insert(EXCLUDE.to_string(), encode_cells(&self.exclude));
        }
        Value::Object(map)
    }

    /// Returns true if the matrix declares nothing
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.axis.is_empty() && self.include.is_empty() && self.exclude.is_empty()
    }

    /// Expands the matrix into its cells.
    ///
    /// The cartesian product of all axes (in axis-name order) minus every
    /// cell matched by an exclude pattern, followed by the include entries
    /// in declaration order.
    #[must_use]
    pub fn cells(&self) -> Vec<Cell> {
        let mut cells = Vec::new();
        if !self.axis.is_empty() {
            let axes: Vec<(&String, &Vec<String>)> = self.axis.iter().collect();
            self.cartesian_product(&axes, &mut Cell::new(), &mut cells);
        }
        cells.extend(self.include.iter().cloned());
        cells
    }

    /// Number of cells [`Matrix::cells`] yields
    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.cells().len()
    }

    fn cartesian_product(
        &self,
        axes: &[(&String, &Vec<String>)],
        current: &mut Cell,
        results: &mut Vec<Cell>,
    ) {
        let Some(((name, values), rest)) = axes.split_first() else {
            if !self.is_excluded(current) {
                results.push(current.clone());
            }
            return;
        };

        for value in *values {
            current.insert((*name).clone(), value.clone());
            self.cartesian_product(rest, current, results);
        }
        current.remove(*name);
    }

    fn is_excluded(&self, cell: &Cell) -> bool {
        self.exclude.iter().any(|pattern| {
            !pattern.is_empty() && pattern.iter().all(|(key, value)| cell.get(key) == Some(value))
        })
    }
}

fn take_reserved(
    map: &mut Map<String, Value>,
    key: &str,
    path: &DecodePath,
) -> DecodeResult<Vec<Cell>> {
    match map.remove(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(raw) => Vec::<Cell>::deserialize(&raw)
            .map_err(|err| DecodeError::malformed_reserved_key(path, key, err)),
    }
}

fn encode_cells(cells: &[Cell]) -> Value {
    Value::Array(
        cells
            .iter()
            .map(|cell| {
                Value::Object(
                    cell.iter()
                        .map(|(key, value)| (key.clone(), Value::String(value.clone())))
                        .collect(),
                )
            })
            .collect(),
    )
}

impl Serialize for Matrix {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.encode().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Matrix {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::decode(&value, &DecodePath::root()).map_err(serde::de::Error::custom)
    }
}

/// Decodes a matrix node at the document root; see [`Matrix::decode`]
pub fn decode_matrix(value: &Value) -> DecodeResult<Matrix> {
    Matrix::decode(value, &DecodePath::root())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use serde_json::json;

    fn cell(pairs: &[(&str, &str)]) -> Cell {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_decode_axes_only() {
        let matrix = decode_matrix(&json!({"os": ["linux", "macos"], "go": ["1.21"]})).unwrap();
        assert_eq!(
            matrix,
            Matrix::new()
                .with_axis("os", ["linux", "macos"])
                .with_axis("go", ["1.21"])
        );
        assert!(matrix.include.is_empty());
        assert!(matrix.exclude.is_empty());
    }

    #[test]
    fn test_decode_include_is_not_an_axis() {
        let matrix = decode_matrix(&json!({
            "include": [{"a": "3"}],
            "a": ["1", "2"]
        }))
        .unwrap();
        assert_eq!(matrix.axis.len(), 1);
        assert_eq!(matrix.axis["a"], vec!["1".to_string(), "2".to_string()]);
        assert!(!matrix.axis.contains_key(INCLUDE));
        assert_eq!(matrix.include, vec![cell(&[("a", "3")])]);
    }

    #[test]
    fn test_decode_exclude_and_include() {
        let matrix = decode_matrix(&json!({
            "os": ["linux", "macos"],
            "exclude": [{"os": "macos"}],
            "include": [{"os": "windows", "arch": "amd64"}]
        }))
        .unwrap();
        assert_eq!(matrix.exclude, vec![cell(&[("os", "macos")])]);
        assert_eq!(
            matrix.include,
            vec![cell(&[("os", "windows"), ("arch", "amd64")])]
        );
        assert!(!matrix.axis.contains_key(EXCLUDE));
    }

    #[test]
    fn test_decode_exclude_list_of_strings_is_malformed() {
        let err = decode_matrix(&json!({"os": ["linux"], "exclude": ["linux"]})).unwrap_err();
        assert!(err.is_malformed_reserved_key());
        assert!(matches!(&err, DecodeError::MalformedReservedKey { key, .. } if key == EXCLUDE));
    }

    #[test]
    fn test_decode_include_with_nested_values_is_malformed() {
        let err = decode_matrix(&json!({"include": [{"os": ["linux"]}]})).unwrap_err();
        assert!(matches!(&err, DecodeError::MalformedReservedKey { key, .. } if key == INCLUDE));
    }

    #[test]
    fn test_decode_axis_mapping_is_type_mismatch() {
        let err = decode_matrix(&json!({"os": {"linux": "yes"}})).unwrap_err();
        assert!(err.is_type_mismatch());
        assert_eq!(err.path().to_string(), "$.os");
    }

    #[test]
    fn test_decode_non_mapping_is_type_mismatch() {
        let err = decode_matrix(&json!(["linux"])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "type mismatch at $: expected a matrix mapping, found a list"
        );
    }

    #[test]
    fn test_encode_omits_empty_reserved_keys() {
        let matrix = decode_matrix(&json!({"os": ["linux"], "include": [], "exclude": []})).unwrap();
        assert_eq!(matrix.encode(), json!({"os": ["linux"]}));
    }

    #[test]
    fn test_encode_sorted_axes_then_reserved() {
        let matrix = Matrix::new()
            .with_axis("b", ["2"])
            .with_axis("a", ["1"])
            .with_include(cell(&[("a", "9")]))
            .with_exclude(cell(&[("b", "2")]));
        let encoded = serde_json::to_string(&matrix.encode()).unwrap();
        assert_eq!(
            encoded,
            r#"{"a":["1"],"b":["2"],"include":[{"a":"9"}],"exclude":[{"b":"2"}]}"#
        );
    }

    #[test]
    fn test_decode_from_yaml() {
        let yaml = "os: [linux, macos]\nexclude:\n  - os: macos\n";
        let matrix: Matrix = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(matrix.axis["os"].len(), 2);
        assert_eq!(matrix.exclude.len(), 1);
    }

    #[test]
    fn test_cells_cartesian_product() {
        let matrix = Matrix::new()
            .with_axis("os", ["linux", "macos"])
            .with_axis("arch", ["amd64", "arm64"]);
        let cells = matrix.cells();
        assert_eq!(cells.len(), 4);
        assert_eq!(cells[0], cell(&[("arch", "amd64"), ("os", "linux")]));
        assert_eq!(cells[3], cell(&[("arch", "arm64"), ("os", "macos")]));
    }

    #[test]
    fn test_cells_exclude_then_include() {
        let matrix = Matrix::new()
            .with_axis("os", ["linux", "macos"])
            .with_axis("arch", ["amd64", "arm64"])
            .with_exclude(cell(&[("os", "macos"), ("arch", "arm64")]))
            .with_include(cell(&[("os", "windows"), ("arch", "amd64")]));
        let cells = matrix.cells();
        assert_eq!(cells.len(), 4);
        assert!(!cells.contains(&cell(&[("os", "macos"), ("arch", "arm64")])));
        assert_eq!(cells[3], cell(&[("os", "windows"), ("arch", "amd64")]));
    }

    #[test]
    fn test_cells_include_only() {
        let matrix = Matrix::new().with_include(cell(&[("os", "linux")]));
        assert_eq!(matrix.cell_count(), 1);
    }

    #[test]
    fn test_cells_empty_axis_yields_nothing() {
        let matrix = Matrix::new().with_axis("os", Vec::<String>::new());
        assert!(matrix.cells().is_empty());
    }

    proptest! {
        #[test]
        fn prop_axis_only_mapping_decodes_to_axis(
            axes in proptest::collection::btree_map(
                "[a-z]{1,8}".prop_filter("reserved", |k| k != INCLUDE && k != EXCLUDE),
                proptest::collection::vec("[a-z0-9.]{0,6}", 0..4),
                0..5,
            )
        ) {
            let input: Map<String, Value> = axes
                .iter()
                .map(|(k, v)| (k.clone(), json!(v)))
                .collect();
            let matrix = decode_matrix(&Value::Object(input)).unwrap();
            prop_assert_eq!(&matrix.axis, &axes);
            prop_assert!(matrix.include.is_empty());
            prop_assert!(matrix.exclude.is_empty());
        }
    }
}
