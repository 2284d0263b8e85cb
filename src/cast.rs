//! The tensor-casting collaborator.
//!
//! At the end of a pipeline, fields are handed to a numeric backend. The engine
//! only knows the contract: a [`TensorCaster`] turns a flat or nested value and
//! a [`NumericKind`] into an opaque tensor. [`DenseCaster`] is a small
//! row-major implementation that also converts back with
//! [`DenseTensor::to_value`], which is what the round-trip tests rely on.

use crate::error::{Error, Result};
use crate::record::{Record, ShapeReq};
use crate::value::{Scalar, Value};
use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Element type requested from the caster.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericKind {
    Int64,
    Int32,
    Float32,
    Float64,
    Bool,
}

/// Maps a value plus a numeric kind to a backend tensor.
pub trait TensorCaster {
    type Tensor;

    /// # Errors
    ///
    /// Whatever the backend rejects (non-numeric items, ragged nesting, ...).
    fn cast(&self, value: &Value, kind: NumericKind) -> anyhow::Result<Self::Tensor>;
}

/// Cast several fields of one record.
///
/// # Errors
///
/// [`Error::Shape`] for a missing field, [`Error::Collaborator`] when the
/// caster rejects a field.
pub fn cast_fields<C: TensorCaster>(
    record: &Record,
    fields: &[(&str, NumericKind)],
    caster: &C,
) -> Result<BTreeMap<String, C::Tensor>> {
    fields
        .iter()
        .map(|&(name, kind)| {
            let value = record.require(name, ShapeReq::Any)?;
            let tensor = caster
                .cast(value, kind)
                .with_context(|| format!("casting field `{name}` to {kind:?}"))
                .map_err(Error::Collaborator)?;
            Ok((name.to_string(), tensor))
        })
        .collect()
}

/// Row-major dense tensor with `f64` storage.
#[derive(Clone, Debug, PartialEq)]
pub struct DenseTensor {
    kind: NumericKind,
    shape: Vec<usize>,
    data: Vec<f64>,
}

impl DenseTensor {
    #[must_use]
    pub const fn kind(&self) -> NumericKind {
        self.kind
    }

    /// Empty for a scalar, `[n]` for a flat sequence, `[rows, cols]` for nested.
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    #[must_use]
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Convert back into a record value of the tensor's kind.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let item = |v: f64| self.scalar(v);
        match self.shape.as_slice() {
            [] => Value::Scalar(self.data.first().copied().map_or(Scalar::Null, item)),
            [_] => Value::Sequence(self.data.iter().copied().map(item).collect()),
            [rows, cols, ..] => Value::Nested(if *cols == 0 {
                vec![Vec::new(); *rows]
            } else {
                self.data
                    .chunks(*cols)
                    .map(|row| row.iter().copied().map(item).collect())
                    .collect()
            }),
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn scalar(&self, v: f64) -> Scalar {
        match self.kind {
            NumericKind::Int64 | NumericKind::Int32 => Scalar::Int(v as i64),
            NumericKind::Float32 | NumericKind::Float64 => Scalar::from(v),
            NumericKind::Bool => Scalar::Bool(v != 0.0),
        }
    }
}

/// Casts values into [`DenseTensor`]s. Ragged nested values are rejected.
#[derive(Clone, Copy, Debug, Default)]
pub struct DenseCaster;

impl DenseCaster {
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    fn element(item: &Scalar, kind: NumericKind) -> anyhow::Result<f64> {
        let Some(v) = item.as_f64() else {
            bail!("cannot cast a {} to a number", item.type_name());
        };
        Ok(match kind {
            NumericKind::Float64 => v,
            NumericKind::Float32 => f64::from(v as f32),
            NumericKind::Bool => f64::from(u8::from(v != 0.0)),
            NumericKind::Int64 | NumericKind::Int32 => {
                if v.fract() != 0.0 {
                    bail!("{v} is not an integer");
                }
                if kind == NumericKind::Int32
                    && (v < f64::from(i32::MIN) || v > f64::from(i32::MAX))
                {
                    bail!("{v} does not fit in int32");
                }
                v
            }
        })
    }
}

impl TensorCaster for DenseCaster {
    type Tensor = DenseTensor;

    fn cast(&self, value: &Value, kind: NumericKind) -> anyhow::Result<DenseTensor> {
        let (shape, items): (Vec<usize>, Vec<&Scalar>) = match value {
            Value::Scalar(s) => (Vec::new(), vec![s]),
            Value::Sequence(seq) => (vec![seq.len()], seq.iter().collect()),
            Value::Nested(rows) => {
                let cols = rows.first().map_or(0, Vec::len);
                if let Some(bad) = rows.iter().position(|row| row.len() != cols) {
                    bail!(
                        "ragged nested sequence: row {bad} has {} items, row 0 has {cols}",
                        rows[bad].len()
                    );
                }
                (vec![rows.len(), cols], rows.iter().flatten().collect())
            }
        };
        let data = items
            .into_iter()
            .enumerate()
            .map(|(i, item)| Self::element(item, kind).with_context(|| format!("item {i}")))
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(DenseTensor { kind, shape, data })
    }
}
