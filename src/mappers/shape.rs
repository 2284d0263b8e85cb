//! Reshaping and thresholding single fields.

use crate::error::{Error, Result};
use crate::mapper::{FieldRequirement, Mapper};
use crate::record::{Record, ShapeReq};
use crate::value::{Scalar, Value};

/// Turns a nested field into a flat one. Flat fields are left as they are.
#[derive(Debug)]
pub struct FlattenMapper {
    field: String,
}

impl FlattenMapper {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }
}

impl Mapper for FlattenMapper {
    fn name(&self) -> &str {
        "flatten"
    }

    fn requirements(&self) -> Vec<FieldRequirement> {
        vec![FieldRequirement::sequence_like(self.field.clone())]
    }

    fn transform(&self, mut record: Record) -> Result<Vec<Record>> {
        let flat = match record.take(&self.field, ShapeReq::SequenceLike)? {
            Value::Nested(nested) => Value::Sequence(nested.concat()),
            other => other,
        };
        record.insert(self.field.clone(), flat);
        Ok(vec![record])
    }
}

/// Maps numbers to `1` above a threshold and `0` otherwise.
///
/// Works on a scalar or on every item of a flat sequence.
#[derive(Debug)]
pub struct BinarizerMapper {
    field: String,
    threshold: f64,
}

impl BinarizerMapper {
    /// # Errors
    ///
    /// [`Error::Config`] if `threshold` is NaN.
    pub fn new(field: impl Into<String>, threshold: f64) -> Result<Self> {
        if threshold.is_nan() {
            return Err(Error::config("binarizer threshold must be a number"));
        }
        Ok(Self {
            field: field.into(),
            threshold,
        })
    }

    fn binarize(&self, value: &Scalar) -> Result<Scalar> {
        let v = value.as_f64().ok_or_else(|| Error::InvalidValue {
            field: self.field.clone(),
            message: format!("cannot binarize a {}", value.type_name()),
        })?;
        Ok(Scalar::Int(i64::from(v > self.threshold)))
    }
}

impl Mapper for BinarizerMapper {
    fn name(&self) -> &str {
        "binarizer"
    }

    fn requirements(&self) -> Vec<FieldRequirement> {
        vec![FieldRequirement::any(self.field.clone())]
    }

    fn transform(&self, mut record: Record) -> Result<Vec<Record>> {
        let binarized = match record.require(&self.field, ShapeReq::Any)? {
            Value::Scalar(s) => Value::Scalar(self.binarize(s)?),
            Value::Sequence(items) => Value::Sequence(
                items
                    .iter()
                    .map(|s| self.binarize(s))
                    .collect::<Result<_>>()?,
            ),
            Value::Nested(_) => {
                return Err(Error::Shape {
                    field: self.field.clone(),
                    expected: ShapeReq::Sequence,
                    found: Some(crate::value::Shape::Nested),
                });
            }
        };
        record.insert(self.field.clone(), binarized);
        Ok(vec![record])
    }
}
