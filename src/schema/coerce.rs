//! Flexible scalar coercion
//!
//! Authors may write several fields either as a single scalar or as a
//! list (`needs: build` vs `needs: [build, lint]`), and durations either
//! as a bare number of seconds or as a duration string. The types here
//! normalize those shapes into one canonical form and encode it back.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::{self, Deserialize, Deserializer, SeqAccess, Visitor};
use serde::ser::{Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use super::errors::{DecodeError, DecodePath, DecodeResult};

/// A value authored as either one string or a list of strings.
///
/// The canonical form is always the list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct StringOrList(Vec<String>);

impl StringOrList {
    /// Creates an empty list
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes a generic node: a string becomes a one-element list, a
    /// list of strings is taken as-is
    pub fn decode(value: &Value, path: &DecodePath) -> DecodeResult<Self> {
        Self::deserialize(value).map_err(|err| DecodeError::type_mismatch(path, err))
    }

    /// Encodes the canonical form back to a generic node.
    ///
    /// Always emits a list, even for a single element.
    #[must_use]
    pub fn encode(&self) -> Value {
        Value::Array(self.0.iter().cloned().map(Value::String).collect())
    }

    /// Returns the items as a slice
    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Consumes the wrapper and returns the items
    #[must_use]
    pub fn into_vec(self) -> Vec<String> {
        self.0
    }

    /// Returns true if there are no items
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of items
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates over the items
    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }
}

impl From<Vec<String>> for StringOrList {
    fn from(items: Vec<String>) -> Self {
        Self(items)
    }
}

impl From<&str> for StringOrList {
    fn from(item: &str) -> Self {
        Self(vec![item.to_string()])
    }
}

impl<S: Into<String>> FromIterator<S> for StringOrList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl<'a> IntoIterator for &'a StringOrList {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl Serialize for StringOrList {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

struct StringOrListVisitor;

impl<'de> Visitor<'de> for StringOrListVisitor {
    type Value = StringOrList;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a string or a list of strings")
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
        Ok(StringOrList(vec![value.to_string()]))
    }

    fn visit_string<E: de::Error>(self, value: String) -> Result<Self::Value, E> {
        Ok(StringOrList(vec![value]))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element::<String>()? {
            items.push(item);
        }
        Ok(StringOrList(items))
    }
}

impl<'de> Deserialize<'de> for StringOrList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(StringOrListVisitor)
    }
}

/// A value authored as either an integer or a string, typically a
/// timeout given as seconds or as a duration string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum StringOrInt {
    /// Not set
    #[default]
    Absent,
    /// Integer form
    Int(i64),
    /// String form
    String(String),
}

/// Errors converting a [`StringOrInt`] into a [`Duration`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DurationError {
    /// Negative number of seconds
    #[error("duration cannot be negative: {0}")]
    Negative(i64),

    /// String that is neither a number nor a duration expression
    #[error("invalid duration: '{0}'")]
    Invalid(String),

    /// Duration too large to represent
    #[error("duration out of range: '{0}'")]
    Overflow(String),
}

static DURATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:\d+(?:\.\d+)?(?:ns|us|µs|ms|s|m|h))+$").expect("valid duration regex")
});

static DURATION_PART: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d+(?:\.\d+)?)(ns|us|µs|ms|s|m|h)").expect("valid duration part regex")
});

impl StringOrInt {
    /// Decodes a generic node: null, an integer or a string
    pub fn decode(value: &Value, path: &DecodePath) -> DecodeResult<Self> {
        Self::deserialize(value).map_err(|err| DecodeError::type_mismatch(path, err))
    }

    /// Encodes back to a generic node; `Absent` becomes null
    #[must_use]
    pub fn encode(&self) -> Value {
        match self {
            Self::Absent => Value::Null,
            Self::Int(value) => Value::from(*value),
            Self::String(value) => Value::String(value.clone()),
        }
    }

    /// Returns true when no value was authored
    #[must_use]
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// Interprets the value as a duration.
    ///
    /// Integers are seconds. Strings are either a bare number of seconds
    /// or a sequence of `<number><unit>` parts such as `1h30m` or `250ms`.
    pub fn to_duration(&self) -> Result<Option<Duration>, DurationError> {
        match self {
            Self::Absent => Ok(None),
            Self::Int(seconds) => u64::try_from(*seconds)
                .map(|secs| Some(Duration::from_secs(secs)))
                .map_err(|_| DurationError::Negative(*seconds)),
            Self::String(raw) => parse_duration(raw.trim()).map(Some),
        }
    }
}

fn parse_duration(raw: &str) -> Result<Duration, DurationError> {
    if let Ok(seconds) = raw.parse::<u64>() {
        return Ok(Duration::from_secs(seconds));
    }
    if !DURATION.is_match(raw) {
        return Err(DurationError::Invalid(raw.to_string()));
    }

    let mut total = 0f64;
    for part in DURATION_PART.captures_iter(raw) {
        let amount: f64 = part[1]
            .parse()
            .map_err(|_| DurationError::Invalid(raw.to_string()))?;
        let unit = match &part[2] {
            "ns" => 1e-9,
            "us" | "µs" => 1e-6,
            "ms" => 1e-3,
            "s" => 1.0,
            "m" => 60.0,
            _ => 3600.0,
        };
        total += amount * unit;
    }
    Duration::try_from_secs_f64(total).map_err(|_| DurationError::Overflow(raw.to_string()))
}

impl From<i64> for StringOrInt {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for StringOrInt {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl fmt::Display for StringOrInt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => Ok(()),
            Self::Int(value) => write!(f, "{value}"),
            Self::String(value) => f.write_str(value),
        }
    }
}

impl Serialize for StringOrInt {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Absent => serializer.serialize_none(),
            Self::Int(value) => serializer.serialize_i64(*value),
            Self::String(value) => serializer.serialize_str(value),
        }
    }
}

struct StringOrIntVisitor;

impl<'de> Visitor<'de> for StringOrIntVisitor {
    type Value = StringOrInt;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an integer or a string")
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(StringOrInt::Absent)
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(StringOrInt::Absent)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserializer.deserialize_any(self)
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<Self::Value, E> {
        Ok(StringOrInt::Int(value))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Self::Value, E> {
        i64::try_from(value)
            .map(StringOrInt::Int)
            .map_err(|_| E::invalid_value(de::Unexpected::Unsigned(value), &self))
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
        Ok(StringOrInt::String(value.to_string()))
    }

    fn visit_string<E: de::Error>(self, value: String) -> Result<Self::Value, E> {
        Ok(StringOrInt::String(value))
    }
}

impl<'de> Deserialize<'de> for StringOrInt {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(StringOrIntVisitor)
    }
}

/// Decodes a string-or-list node; see [`StringOrList::decode`]
pub fn decode_string_or_list(value: &Value) -> DecodeResult<StringOrList> {
    StringOrList::decode(value, &DecodePath::root())
}

/// Decodes a string-or-int node; see [`StringOrInt::decode`]
pub fn decode_string_or_int(value: &Value) -> DecodeResult<StringOrInt> {
    StringOrInt::decode(value, &DecodePath::root())
}

/// Deserializes either a single `T` or a list of `T` into a `Vec<T>`
pub(crate) fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    #[derive(serde::Deserialize)]
    #[serde(untagged)]
    enum OneOrMany<T> {
        Many(Vec<T>),
        One(T),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::Many(items) => items,
        OneOrMany::One(item) => vec![item],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_string_or_list_from_bare_string() {
        let list = decode_string_or_list(&json!("build")).unwrap();
        assert_eq!(list.as_slice(), ["build".to_string()]);
    }

    #[test]
    fn test_string_or_list_from_list() {
        let list = decode_string_or_list(&json!(["build", "lint"])).unwrap();
        assert_eq!(list, StringOrList::from_iter(["build", "lint"]));
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_string_or_list_empty_list() {
        let list = decode_string_or_list(&json!([])).unwrap();
        assert!(list.is_empty());
    }

    #[test]
    fn test_string_or_list_rejects_other_shapes() {
        for value in [json!(1), json!(true), json!(null), json!({"a": "b"}), json!(["a", 1])] {
            let err = decode_string_or_list(&value).unwrap_err();
            assert!(err.is_type_mismatch(), "{value} should not decode");
        }
    }

    #[test]
    fn test_string_or_list_encodes_as_list() {
        let list = StringOrList::from("build");
        assert_eq!(list.encode(), json!(["build"]));
    }

    #[test]
    fn test_string_or_list_from_yaml() {
        let list: StringOrList = serde_yaml::from_str("build").unwrap();
        assert_eq!(list, StringOrList::from("build"));
        let list: StringOrList = serde_yaml::from_str("- a\n- b\n").unwrap();
        assert_eq!(list, StringOrList::from_iter(["a", "b"]));
    }

    #[test]
    fn test_string_or_int_variants() {
        assert_eq!(decode_string_or_int(&json!(null)).unwrap(), StringOrInt::Absent);
        assert_eq!(decode_string_or_int(&json!(30)).unwrap(), StringOrInt::Int(30));
        assert_eq!(
            decode_string_or_int(&json!("10m")).unwrap(),
            StringOrInt::String("10m".to_string())
        );
    }

    #[test]
    fn test_string_or_int_rejects_other_shapes() {
        for value in [json!(1.5), json!(true), json!(["10m"]), json!({"s": 1})] {
            assert!(decode_string_or_int(&value).unwrap_err().is_type_mismatch());
        }
    }

    #[test]
    fn test_string_or_int_encode() {
        assert_eq!(StringOrInt::Absent.encode(), json!(null));
        assert_eq!(StringOrInt::Int(5).encode(), json!(5));
        assert_eq!(StringOrInt::from("1h").encode(), json!("1h"));
    }

    #[test]
    fn test_duration_from_int_and_number_string() {
        assert_eq!(
            StringOrInt::Int(90).to_duration().unwrap(),
            Some(Duration::from_secs(90))
        );
        assert_eq!(
            StringOrInt::from("90").to_duration().unwrap(),
            Some(Duration::from_secs(90))
        );
        assert_eq!(StringOrInt::Absent.to_duration().unwrap(), None);
    }

    #[test]
    fn test_duration_expressions() {
        assert_eq!(
            StringOrInt::from("1m30s").to_duration().unwrap(),
            Some(Duration::from_secs(90))
        );
        assert_eq!(
            StringOrInt::from("1h").to_duration().unwrap(),
            Some(Duration::from_secs(3600))
        );
        assert_eq!(
            StringOrInt::from("250ms").to_duration().unwrap(),
            Some(Duration::from_millis(250))
        );
    }

    #[test]
    fn test_duration_invalid() {
        assert_eq!(
            StringOrInt::from("abc").to_duration(),
            Err(DurationError::Invalid("abc".to_string()))
        );
        assert_eq!(
            StringOrInt::Int(-1).to_duration(),
            Err(DurationError::Negative(-1))
        );
    }

    #[test]
    fn test_duration_overflow() {
        assert_eq!(
            StringOrInt::from("99999999999999999999h").to_duration(),
            Err(DurationError::Overflow("99999999999999999999h".to_string()))
        );
        assert_eq!(
            StringOrInt::from("99999999999999999999").to_duration(),
            Err(DurationError::Invalid("99999999999999999999".to_string()))
        );
    }

    proptest! {
        #[test]
        fn prop_string_or_list_round_trip(items in proptest::collection::vec(".*", 0..8)) {
            let list = StringOrList::from(items.clone());
            let decoded = decode_string_or_list(&list.encode()).unwrap();
            prop_assert_eq!(decoded.into_vec(), items);
        }

        #[test]
        fn prop_bare_string_is_single_item(item in ".*") {
            let decoded = decode_string_or_list(&Value::String(item.clone())).unwrap();
            prop_assert_eq!(decoded.into_vec(), vec![item]);
        }
    }
}
