//! Selecting and creating fields.

use crate::error::{Error, Result};
use crate::mapper::{FieldRequirement, Mapper};
use crate::record::{Record, ShapeReq};
use crate::value::{Scalar, Value};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Keeps only some fields, or drops some fields.
#[derive(Debug)]
pub struct ChangeFieldsMapper {
    keep: Option<BTreeSet<String>>,
    drop: Option<BTreeSet<String>>,
}

impl ChangeFieldsMapper {
    /// Exactly one of `keep` and `drop` must be given.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] if both or neither are given.
    pub fn new(keep: Option<Vec<String>>, drop: Option<Vec<String>>) -> Result<Self> {
        match (&keep, &drop) {
            (Some(_), Some(_)) | (None, None) => Err(Error::config(
                "change_fields needs exactly one of `keep` and `drop`",
            )),
            _ => Ok(Self {
                keep: keep.map(|k| k.into_iter().collect()),
                drop: drop.map(|d| d.into_iter().collect()),
            }),
        }
    }

    /// Keep only these fields; each must be present.
    pub fn keep<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keep: Some(fields.into_iter().map(Into::into).collect()),
            drop: None,
        }
    }

    /// Drop these fields where present.
    pub fn drop<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keep: None,
            drop: Some(fields.into_iter().map(Into::into).collect()),
        }
    }
}

impl Mapper for ChangeFieldsMapper {
    fn name(&self) -> &str {
        "change_fields"
    }

    fn requirements(&self) -> Vec<FieldRequirement> {
        self.keep
            .iter()
            .flatten()
            .map(|f| FieldRequirement::any(f.clone()))
            .collect()
    }

    fn transform(&self, mut record: Record) -> Result<Vec<Record>> {
        match (&self.keep, &self.drop) {
            (Some(keep), _) => record.retain(|name, _| keep.contains(name)),
            (None, Some(drop)) => record.retain(|name, _| !drop.contains(name)),
            (None, None) => {}
        }
        Ok(vec![record])
    }
}

/// Computes a field value from the whole record.
pub type ValueFn = dyn Fn(&Record) -> Result<Value> + Send + Sync;

enum FieldSource {
    Constant(Value),
    /// One copy of `item` per outer item of `like`.
    ShapedLike { item: Scalar, like: String },
    Computed(Arc<ValueFn>),
}

impl fmt::Debug for FieldSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constant(value) => f.debug_tuple("Constant").field(value).finish(),
            Self::ShapedLike { item, like } => f
                .debug_struct("ShapedLike")
                .field("item", item)
                .field("like", like)
                .finish(),
            Self::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

/// Writes a field: a constant, one copy of a constant per item of another
/// field, or a value computed from the record.
#[derive(Debug)]
pub struct MakeFieldMapper {
    field: String,
    source: FieldSource,
    requirements: Vec<FieldRequirement>,
}

impl MakeFieldMapper {
    pub fn new(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            source: FieldSource::Constant(value.into()),
            requirements: Vec::new(),
        }
    }

    /// Write a sequence holding `value` once per outer item of `like_field`.
    pub fn shaped_like(
        field: impl Into<String>,
        value: impl Into<Scalar>,
        like_field: impl Into<String>,
    ) -> Self {
        let like: String = like_field.into();
        Self {
            field: field.into(),
            requirements: vec![FieldRequirement::sequence_like(like.clone())],
            source: FieldSource::ShapedLike {
                item: value.into(),
                like,
            },
        }
    }

    /// Write whatever `value_fn` returns for the incoming record.
    ///
    /// ```
    /// use ironsmash::*;
    ///
    /// let count = MakeFieldMapper::computed("n_tokens", |r: &Record| {
    ///     Ok(Value::from(r.sequence("input_ids")?.len() as i64))
    /// })
    /// .requiring(FieldRequirement::sequence("input_ids"));
    /// let out = count.transform(Record::new().with("input_ids", Value::ints(vec![5, 6])))?;
    /// assert_eq!(out[0].scalar("n_tokens")?.as_i64(), Some(2));
    /// # Ok::<(), ironsmash::Error>(())
    /// ```
    pub fn computed<F>(field: impl Into<String>, value_fn: F) -> Self
    where
        F: Fn(&Record) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            field: field.into(),
            source: FieldSource::Computed(Arc::new(value_fn)),
            requirements: Vec::new(),
        }
    }

    /// Declare a field the value function reads.
    #[must_use]
    pub fn requiring(mut self, requirement: FieldRequirement) -> Self {
        self.requirements.push(requirement);
        self
    }
}

impl Mapper for MakeFieldMapper {
    fn name(&self) -> &str {
        "make_field"
    }

    fn requirements(&self) -> Vec<FieldRequirement> {
        self.requirements.clone()
    }

    fn transform(&self, mut record: Record) -> Result<Vec<Record>> {
        let value = match &self.source {
            FieldSource::Constant(value) => value.clone(),
            FieldSource::ShapedLike { item, like } => {
                let len = record
                    .require(like, ShapeReq::SequenceLike)?
                    .outer_len()
                    .unwrap_or_default();
                Value::Sequence(vec![item.clone(); len])
            }
            FieldSource::Computed(value_fn) => value_fn(&record)?,
        };
        record.insert(self.field.clone(), value);
        Ok(vec![record])
    }
}
