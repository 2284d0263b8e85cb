//! Field values carried by a [`Record`](crate::record::Record).
//!
//! A field holds one of three shapes:
//! - [`Value::Scalar`]: a single [`Scalar`]
//! - [`Value::Sequence`]: a flat, ordered sequence of scalars
//! - [`Value::Nested`]: a sequence of flat sequences (one level of nesting)
//!
//! Shapes are not declared up front. Each mapper states the shape it needs for
//! the fields it reads, and the stage checks it before the record reaches the
//! mapper (see [`ShapeReq`](crate::record::ShapeReq)).
//!
//! Values serialize *untagged*, so JSON maps onto them directly:
//!
//! ```
//! use ironsmash::value::{Scalar, Value};
//!
//! let v: Value = serde_json::from_str("[[1, 2], [3]]").unwrap();
//! assert_eq!(v, Value::nested_ints(vec![vec![1, 2], vec![3]]));
//!
//! let s: Value = serde_json::from_str("\"hello\"").unwrap();
//! assert_eq!(s, Value::Scalar(Scalar::from("hello")));
//! ```

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

/// A single leaf value.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(OrderedFloat<f64>),
    Str(String),
}

impl Scalar {
    /// The integer inside, if this is an `Int`.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric view of the scalar: ints and floats convert, bools become 0/1.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(v.into_inner()),
            Self::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Self::Null | Self::Str(_) => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Short type label used in error messages.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Str(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Scalar {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Self::Float(OrderedFloat(v))
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

/// The runtime shape of a [`Value`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Shape {
    Scalar,
    Sequence,
    Nested,
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Scalar => "scalar",
            Self::Sequence => "sequence",
            Self::Nested => "nested sequence",
        })
    }
}

/// A field value: scalar, flat sequence, or sequence of sequences.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Scalar(Scalar),
    Sequence(Vec<Scalar>),
    Nested(Vec<Vec<Scalar>>),
}

impl Value {
    #[must_use]
    pub const fn shape(&self) -> Shape {
        match self {
            Self::Scalar(_) => Shape::Scalar,
            Self::Sequence(_) => Shape::Sequence,
            Self::Nested(_) => Shape::Nested,
        }
    }

    /// Number of outer items for sequence-shaped values; `None` for scalars.
    #[must_use]
    pub fn outer_len(&self) -> Option<usize> {
        match self {
            Self::Scalar(_) => None,
            Self::Sequence(s) => Some(s.len()),
            Self::Nested(n) => Some(n.len()),
        }
    }

    /// Sub-range `[range.start, range.end)` of the outer items.
    ///
    /// Returns `None` for scalars or when the range is out of bounds.
    #[must_use]
    pub fn slice(&self, range: Range<usize>) -> Option<Self> {
        match self {
            Self::Scalar(_) => None,
            Self::Sequence(s) => s.get(range).map(|items| Self::Sequence(items.to_vec())),
            Self::Nested(n) => n.get(range).map(|items| Self::Nested(items.to_vec())),
        }
    }

    #[must_use]
    pub const fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Self::Scalar(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_sequence(&self) -> Option<&[Scalar]> {
        match self {
            Self::Sequence(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_nested(&self) -> Option<&[Vec<Scalar>]> {
        match self {
            Self::Nested(n) => Some(n),
            _ => None,
        }
    }

    /// Flat sequence of integers.
    #[must_use]
    pub fn ints(values: Vec<i64>) -> Self {
        Self::Sequence(values.into_iter().map(Scalar::Int).collect())
    }

    /// Nested sequence of integers.
    #[must_use]
    pub fn nested_ints(values: Vec<Vec<i64>>) -> Self {
        Self::Nested(
            values
                .into_iter()
                .map(|inner| inner.into_iter().map(Scalar::Int).collect())
                .collect(),
        )
    }

    /// Integer view of a flat sequence; `None` if any item is not an `Int`.
    #[must_use]
    pub fn to_ints(&self) -> Option<Vec<i64>> {
        self.as_sequence()?.iter().map(Scalar::as_i64).collect()
    }

    /// Integer view of a nested sequence; `None` if any item is not an `Int`.
    #[must_use]
    pub fn to_nested_ints(&self) -> Option<Vec<Vec<i64>>> {
        self.as_nested()?
            .iter()
            .map(|inner| inner.iter().map(Scalar::as_i64).collect())
            .collect()
    }
}

impl From<Scalar> for Value {
    fn from(s: Scalar) -> Self {
        Self::Scalar(s)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Scalar(Scalar::Int(v))
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Scalar(Scalar::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Scalar(Scalar::from(v))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Scalar(Scalar::Bool(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Scalar(Scalar::from(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Scalar(Scalar::Str(v))
    }
}

impl From<Vec<Scalar>> for Value {
    fn from(v: Vec<Scalar>) -> Self {
        Self::Sequence(v)
    }
}

impl From<Vec<Vec<Scalar>>> for Value {
    fn from(v: Vec<Vec<Scalar>>) -> Self {
        Self::Nested(v)
    }
}
