//! Padding sequences to a uniform length.
//!
//! A [`PaddingMapper`] pads one field: the single sequence of a flat field, or
//! every sub-sequence of a nested one. The target length is fixed
//! (`pad_to_length`) or the longest sequence found in the length-reference
//! field of the record being padded. Padding never truncates: a sequence
//! longer than the target is [`Error::PaddingTooShort`].
//!
//! Masks are padded by a companion built with [`PaddingMapper::mask_companion`].
//! It measures the *sequence* field, not the mask, so both fields reach the
//! same lengths whichever of the two runs first.
//!
//! ```
//! use ironsmash::*;
//! use ironsmash::mappers::padding::{PaddingConfig, PaddingMapper};
//!
//! let pad = PaddingMapper::new(PaddingConfig::new("input_ids", 0))?;
//! let record = Record::new().with("input_ids", Value::nested_ints(vec![vec![1, 2, 3], vec![4, 5]]));
//! let out = pad.transform(record)?;
//! assert_eq!(out[0].get("input_ids"), Some(&Value::nested_ints(vec![vec![1, 2, 3], vec![4, 5, 0]])));
//! # Ok::<(), ironsmash::Error>(())
//! ```

use crate::error::{Error, Result};
use crate::mapper::{FieldRequirement, Mapper};
use crate::mappers::tokenize::Tokenizer;
use crate::record::{Record, ShapeReq};
use crate::value::{Scalar, Value};
use serde::{Deserialize, Serialize};

/// Where pad values go.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PadSide {
    #[default]
    Append,
    Prepend,
}

/// Parameters of [`PaddingMapper`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaddingConfig {
    pub field: String,
    pub pad_value: Scalar,
    #[serde(default)]
    pub side: PadSide,
    /// Field measured for the target length; the padded field itself if unset.
    #[serde(default)]
    pub length_reference: Option<String>,
    #[serde(default)]
    pub pad_to_length: Option<usize>,
}

impl PaddingConfig {
    pub fn new(field: impl Into<String>, pad_value: impl Into<Scalar>) -> Self {
        Self {
            field: field.into(),
            pad_value: pad_value.into(),
            side: PadSide::Append,
            length_reference: None,
            pad_to_length: None,
        }
    }

    /// Pad `field` with the tokenizer's pad id.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] if the tokenizer has no pad id.
    pub fn from_tokenizer(field: impl Into<String>, tokenizer: &dyn Tokenizer) -> Result<Self> {
        let field = field.into();
        let pad = tokenizer.pad_id().ok_or_else(|| {
            Error::config(format!("tokenizer has no pad id to pad `{field}` with"))
        })?;
        Ok(Self::new(field, pad))
    }

    #[must_use]
    pub const fn side(mut self, side: PadSide) -> Self {
        self.side = side;
        self
    }

    #[must_use]
    pub fn length_reference(mut self, field: impl Into<String>) -> Self {
        self.length_reference = Some(field.into());
        self
    }

    #[must_use]
    pub const fn pad_to_length(mut self, length: usize) -> Self {
        self.pad_to_length = Some(length);
        self
    }

    fn reference(&self) -> &str {
        self.length_reference.as_deref().unwrap_or(&self.field)
    }
}

/// Pads a flat or nested sequence field.
#[derive(Debug)]
pub struct PaddingMapper {
    cfg: PaddingConfig,
    name: String,
}

impl PaddingMapper {
    /// # Errors
    ///
    /// [`Error::Config`] if `pad_to_length` is zero.
    pub fn new(cfg: PaddingConfig) -> Result<Self> {
        if cfg.pad_to_length == Some(0) {
            return Err(Error::config("pad_to_length must be at least 1"));
        }
        let name = format!("pad({})", cfg.field);
        Ok(Self { cfg, name })
    }

    #[must_use]
    pub const fn config(&self) -> &PaddingConfig {
        &self.cfg
    }

    /// The mask padder paired with this one: same side, same fixed length, and
    /// measured on this mapper's length reference.
    #[must_use]
    pub fn mask_companion(&self, mask_field: impl Into<String>, mask_pad: impl Into<Scalar>) -> Self {
        let cfg = PaddingConfig {
            field: mask_field.into(),
            pad_value: mask_pad.into(),
            side: self.cfg.side,
            length_reference: Some(self.cfg.reference().to_string()),
            pad_to_length: self.cfg.pad_to_length,
        };
        let name = format!("pad({})", cfg.field);
        Self { cfg, name }
    }

    fn target_length(&self, record: &Record) -> Result<usize> {
        if let Some(fixed) = self.cfg.pad_to_length {
            return Ok(fixed);
        }
        let longest = match record.require(self.cfg.reference(), ShapeReq::SequenceLike)? {
            Value::Sequence(s) => s.len(),
            Value::Nested(n) => n.iter().map(Vec::len).max().unwrap_or(0),
            Value::Scalar(_) => 0,
        };
        Ok(longest)
    }

    fn pad(&self, seq: &mut Vec<Scalar>, target: usize) -> Result<()> {
        if seq.len() > target {
            return Err(Error::PaddingTooShort {
                field: self.cfg.field.clone(),
                length: seq.len(),
                target,
            });
        }
        let fill = std::iter::repeat_n(self.cfg.pad_value.clone(), target - seq.len());
        match self.cfg.side {
            PadSide::Append => seq.extend(fill),
            PadSide::Prepend => {
                seq.splice(0..0, fill);
            }
        }
        Ok(())
    }

    fn check_alignment(&self, record: &Record, value: &Value) -> Result<()> {
        let reference = self.cfg.reference();
        if reference == self.cfg.field {
            return Ok(());
        }
        let expected = record.require(reference, value.shape().into())?;
        if let (Value::Nested(expected), Value::Nested(found)) = (expected, value) {
            if expected.len() != found.len() {
                return Err(Error::FieldShapeMismatch {
                    field: self.cfg.field.clone(),
                    reference: reference.to_string(),
                    expected: expected.len(),
                    found: found.len(),
                });
            }
        }
        Ok(())
    }
}

impl Mapper for PaddingMapper {
    fn name(&self) -> &str {
        &self.name
    }

    fn requirements(&self) -> Vec<FieldRequirement> {
        let mut reqs = vec![FieldRequirement::sequence_like(self.cfg.field.clone())];
        if self.cfg.reference() != self.cfg.field {
            reqs.push(FieldRequirement::sequence_like(self.cfg.reference()));
        }
        reqs
    }

    fn transform(&self, mut record: Record) -> Result<Vec<Record>> {
        let target = self.target_length(&record)?;
        let mut value = record.take(&self.cfg.field, ShapeReq::SequenceLike)?;
        self.check_alignment(&record, &value)?;
        match &mut value {
            Value::Sequence(seq) => self.pad(seq, target)?,
            Value::Nested(nested) => {
                for seq in nested.iter_mut() {
                    self.pad(seq, target)?;
                }
            }
            Value::Scalar(_) => {}
        }
        record.insert(self.cfg.field.clone(), value);
        Ok(vec![record])
    }
}
