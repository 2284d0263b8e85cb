//! Records: mappings from field name to [`Value`].
//!
//! Records within one collection need not share a field set. Mappers read
//! fields through the shape-checked accessors here ([`Record::require`],
//! [`Record::nested`], ...) so that a missing or mis-shaped field surfaces as an
//! [`Error::Shape`] naming the field, instead of a panic deep inside a transform.
//!
//! An empty flat sequence also satisfies a nested requirement: JSON renders
//! both as `[]`, so a record read back from JSON cannot tell them apart.

use crate::error::{Error, Result};
use crate::value::{Scalar, Shape, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Shape contract a mapper places on one field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShapeReq {
    /// Field must be present; any shape.
    Any,
    Scalar,
    Sequence,
    Nested,
    /// Either a flat or a nested sequence.
    SequenceLike,
}

impl ShapeReq {
    #[must_use]
    pub const fn accepts(self, shape: Shape) -> bool {
        matches!(
            (self, shape),
            (Self::Any, _)
                | (Self::Scalar, Shape::Scalar)
                | (Self::Sequence | Self::SequenceLike, Shape::Sequence)
                | (Self::Nested | Self::SequenceLike, Shape::Nested)
        )
    }
}

impl From<Shape> for ShapeReq {
    fn from(shape: Shape) -> Self {
        match shape {
            Shape::Scalar => Self::Scalar,
            Shape::Sequence => Self::Sequence,
            Shape::Nested => Self::Nested,
        }
    }
}

impl fmt::Display for ShapeReq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Any => "any value",
            Self::Scalar => "scalar",
            Self::Sequence => "sequence",
            Self::Nested => "nested sequence",
            Self::SequenceLike => "sequence or nested sequence",
        })
    }
}

/// An ordered mapping of unique field names to values.
///
/// Fields iterate in key order, which keeps record output deterministic.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: BTreeMap<String, Value>,
}

impl Record {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Insert or replace a field, returning the previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(name.into(), value.into())
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.fields.remove(name)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Keep only the fields for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(&str, &Value) -> bool) {
        self.fields.retain(|k, v| keep(k, v));
    }

    /// Fetch a field and check its shape.
    ///
    /// # Errors
    ///
    /// [`Error::Shape`] if the field is missing or its shape is not accepted by `req`.
    pub fn require(&self, name: &str, req: ShapeReq) -> Result<&Value> {
        match self.fields.get(name) {
            Some(value) if fits(value, req) => Ok(value),
            found => Err(mismatch(name, req, found)),
        }
    }

    /// Fetch a scalar field.
    ///
    /// # Errors
    ///
    /// [`Error::Shape`] if the field is missing or not a scalar.
    pub fn scalar(&self, name: &str) -> Result<&Scalar> {
        match self.fields.get(name) {
            Some(Value::Scalar(s)) => Ok(s),
            found => Err(mismatch(name, ShapeReq::Scalar, found)),
        }
    }

    /// Fetch a flat sequence field.
    ///
    /// # Errors
    ///
    /// [`Error::Shape`] if the field is missing or not a flat sequence.
    pub fn sequence(&self, name: &str) -> Result<&[Scalar]> {
        match self.fields.get(name) {
            Some(Value::Sequence(s)) => Ok(s),
            found => Err(mismatch(name, ShapeReq::Sequence, found)),
        }
    }

    /// Fetch a nested sequence field.
    ///
    /// # Errors
    ///
    /// [`Error::Shape`] if the field is missing or not a nested sequence.
    pub fn nested(&self, name: &str) -> Result<&[Vec<Scalar>]> {
        match self.fields.get(name) {
            Some(Value::Nested(n)) => Ok(n),
            Some(Value::Sequence(s)) if s.is_empty() => Ok(&[]),
            found => Err(mismatch(name, ShapeReq::Nested, found)),
        }
    }

    /// Remove a field after checking its shape.
    ///
    /// An empty flat sequence taken as [`ShapeReq::Nested`] comes back as an
    /// empty [`Value::Nested`].
    ///
    /// # Errors
    ///
    /// [`Error::Shape`] if the field is missing or its shape is not accepted by `req`.
    pub fn take(&mut self, name: &str, req: ShapeReq) -> Result<Value> {
        match self.fields.remove(name) {
            Some(Value::Sequence(s)) if s.is_empty() && req == ShapeReq::Nested => {
                Ok(Value::Nested(Vec::new()))
            }
            Some(value) if req.accepts(value.shape()) => Ok(value),
            Some(value) => {
                let err = mismatch(name, req, Some(&value));
                self.fields.insert(name.to_string(), value);
                Err(err)
            }
            None => Err(mismatch(name, req, None)),
        }
    }

    /// Build a record from a JSON object.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidValue`] if the JSON is not an object or a field does not
    /// fit the scalar / sequence / nested-sequence model.
    pub fn from_json(json: serde_json::Value) -> Result<Self> {
        serde_json::from_value(json).map_err(|e| Error::InvalidValue {
            field: String::from("<record>"),
            message: e.to_string(),
        })
    }

    /// Render the record as a JSON object.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

fn fits(value: &Value, req: ShapeReq) -> bool {
    req.accepts(value.shape())
        || (req == ShapeReq::Nested && matches!(value, Value::Sequence(s) if s.is_empty()))
}

fn mismatch(name: &str, req: ShapeReq, found: Option<&Value>) -> Error {
    Error::Shape {
        field: name.to_string(),
        expected: req,
        found: found.map(Value::shape),
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = std::collections::btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}
