//! Field-level access to a mapping node.
//!
//! Each field is decoded on its own so a failure names the exact key,
//! and an explicit `null` is treated the same as an absent key.

use serde::Deserialize;
use serde_json::{Map, Value};

use super::errors::{DecodeError, DecodePath, DecodeResult};

pub(crate) struct Fields<'a> {
    map: &'a Map<String, Value>,
    path: &'a DecodePath,
}

impl<'a> Fields<'a> {
    /// Views `value` as a mapping, failing with a type mismatch otherwise
    pub(crate) fn new(value: &'a Value, path: &'a DecodePath, what: &str) -> DecodeResult<Self> {
        match value {
            Value::Object(map) => Ok(Self { map, path }),
            other => Err(DecodeError::unexpected(path, what, other)),
        }
    }

    /// Raw value of a field; `None` when missing or null
    pub(crate) fn raw(&self, key: &str) -> Option<&'a Value> {
        self.map.get(key).filter(|value| !value.is_null())
    }

    /// Decodes a field with its serde implementation
    pub(crate) fn get<T>(&self, key: &str) -> DecodeResult<Option<T>>
    where
        T: Deserialize<'a>,
    {
        self.raw(key)
            .map(|value| {
                T::deserialize(value)
                    .map_err(|err| DecodeError::type_mismatch(&self.path.key(key), err))
            })
            .transpose()
    }

    /// Decodes a field with a dedicated decoder that tracks its own paths
    pub(crate) fn decode<T, F>(&self, key: &str, decoder: F) -> DecodeResult<Option<T>>
    where
        F: FnOnce(&'a Value, &DecodePath) -> DecodeResult<T>,
    {
        self.raw(key)
            .map(|value| decoder(value, &self.path.key(key)))
            .transpose()
    }
}
