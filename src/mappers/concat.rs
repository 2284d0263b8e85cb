//! Flattening nested fields into one sequence per record.

use crate::error::{Error, Result};
use crate::mapper::{FieldRequirement, Mapper};
use crate::record::{Record, ShapeReq};
use crate::value::{Shape, Value};

/// Concatenates the sub-sequences of nested fields, in order.
///
/// With explicit fields, each must be nested. Without, every nested field of
/// the record is concatenated. All concatenated fields must share one outer
/// length; fields not concatenated pass through unchanged.
#[derive(Debug, Default)]
pub struct ConcatenateMapper {
    fields: Option<Vec<String>>,
}

impl ConcatenateMapper {
    #[must_use]
    pub const fn new(fields: Option<Vec<String>>) -> Self {
        Self { fields }
    }

    /// Concatenate exactly these fields.
    pub fn fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Some(fields.into_iter().map(Into::into).collect()))
    }

    /// Concatenate every nested field.
    #[must_use]
    pub const fn all_nested() -> Self {
        Self::new(None)
    }

    fn designated(&self, record: &Record) -> Vec<String> {
        match &self.fields {
            Some(fields) => fields.clone(),
            None => record
                .iter()
                .filter(|(_, value)| value.shape() == Shape::Nested)
                .map(|(name, _)| name.to_string())
                .collect(),
        }
    }
}

impl Mapper for ConcatenateMapper {
    fn name(&self) -> &str {
        "concatenate"
    }

    fn requirements(&self) -> Vec<FieldRequirement> {
        self.fields
            .iter()
            .flatten()
            .map(|f| FieldRequirement::nested(f.clone()))
            .collect()
    }

    fn transform(&self, mut record: Record) -> Result<Vec<Record>> {
        let fields = self.designated(&record);
        let Some((reference, rest)) = fields.split_first() else {
            return Ok(vec![record]);
        };
        let expected = record.nested(reference)?.len();
        for field in rest {
            let found = record.nested(field)?.len();
            if found != expected {
                return Err(Error::FieldShapeMismatch {
                    field: field.clone(),
                    reference: reference.clone(),
                    expected,
                    found,
                });
            }
        }
        for field in &fields {
            if let Value::Nested(nested) = record.take(field, ShapeReq::Nested)? {
                record.insert(field.clone(), Value::Sequence(nested.concat()));
            }
        }
        Ok(vec![record])
    }
}
