//! Attention masks and label layouts.

use crate::error::{Error, Result};
use crate::mapper::{Fanout, FieldRequirement, Mapper};
use crate::mappers::tokenize::ones_like;
use crate::record::{Record, ShapeReq};
use crate::value::{Scalar, Value};
use serde::{Deserialize, Serialize};

/// Default id for masked-out labels.
pub const LABEL_MASK_ID: i64 = -100;

/// Writes an all-ones attention mask shaped like the id field (flat or nested).
#[derive(Debug)]
pub struct MakeAttentionMaskMapper {
    input_field: String,
    output_field: String,
}

impl MakeAttentionMaskMapper {
    pub fn new(input_field: impl Into<String>, output_field: impl Into<String>) -> Self {
        Self {
            input_field: input_field.into(),
            output_field: output_field.into(),
        }
    }
}

impl Default for MakeAttentionMaskMapper {
    fn default() -> Self {
        Self::new("input_ids", "attention_mask")
    }
}

impl Mapper for MakeAttentionMaskMapper {
    fn name(&self) -> &str {
        "make_attention_mask"
    }

    fn requirements(&self) -> Vec<FieldRequirement> {
        vec![FieldRequirement::sequence_like(self.input_field.clone())]
    }

    fn transform(&self, mut record: Record) -> Result<Vec<Record>> {
        let mask = ones_like(record.require(&self.input_field, ShapeReq::SequenceLike)?);
        record.insert(self.output_field.clone(), mask);
        Ok(vec![record])
    }
}

/// How [`LabelsMaskerMapper`] spreads labels over records.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaskStrategy {
    /// Keep every label active; the record passes through.
    #[default]
    All,
    /// One record per active label, with every other label masked.
    One,
}

/// Splits a record's labels so that each output carries one active label.
///
/// Labels already equal to the mask id are never activated. A record with no
/// active labels yields no output under [`MaskStrategy::One`].
///
/// Under [`MaskStrategy::One`] the expansion follows the label count, so the
/// mapper is a boundary unless [`max_labels`](Self::max_labels) bounds it.
#[derive(Debug)]
pub struct LabelsMaskerMapper {
    field: String,
    strategy: MaskStrategy,
    label_mask_id: i64,
    max_labels: Option<usize>,
}

impl LabelsMaskerMapper {
    pub fn new(field: impl Into<String>, strategy: MaskStrategy) -> Self {
        Self {
            field: field.into(),
            strategy,
            label_mask_id: LABEL_MASK_ID,
            max_labels: None,
        }
    }

    #[must_use]
    pub const fn label_mask_id(mut self, id: i64) -> Self {
        self.label_mask_id = id;
        self
    }

    /// Bound the number of active labels per record. A record with more
    /// fails the stage with a fanout error.
    #[must_use]
    pub const fn max_labels(mut self, max: usize) -> Self {
        self.max_labels = Some(max);
        self
    }
}

impl Mapper for LabelsMaskerMapper {
    fn name(&self) -> &str {
        "labels_masker"
    }

    fn requirements(&self) -> Vec<FieldRequirement> {
        vec![FieldRequirement::sequence(self.field.clone())]
    }

    fn fanout(&self) -> Fanout {
        match self.strategy {
            MaskStrategy::All => Fanout::OneToOne,
            MaskStrategy::One => Fanout::OneToMany {
                max: self.max_labels,
            },
        }
    }

    fn is_boundary(&self) -> bool {
        self.strategy == MaskStrategy::One && self.max_labels.is_none()
    }

    fn transform(&self, record: Record) -> Result<Vec<Record>> {
        if self.strategy == MaskStrategy::All {
            return Ok(vec![record]);
        }
        let masked = Scalar::Int(self.label_mask_id);
        let labels = record.sequence(&self.field)?.to_vec();
        let out = labels
            .iter()
            .enumerate()
            .filter(|(_, label)| **label != masked)
            .map(|(active, _)| {
                let layout: Vec<Scalar> = labels
                    .iter()
                    .enumerate()
                    .map(|(j, label)| if j == active { label.clone() } else { masked.clone() })
                    .collect();
                record.clone().with(self.field.clone(), layout)
            })
            .collect();
        Ok(out)
    }
}

/// Where a per-sub-sequence value lands in the expanded sequence.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValuePlacement {
    /// First position; the rest are padding.
    #[default]
    First,
    /// Last position; the rest are padding.
    Last,
    /// Every position.
    All,
}

/// Expands one value per sub-sequence into a sequence shaped like that
/// sub-sequence of the `like` field.
///
/// `value_field` must be a flat sequence with one item per sub-sequence of
/// `like_field`; the result is nested.
#[derive(Debug)]
pub struct SingleValueToSequenceMapper {
    value_field: String,
    like_field: String,
    placement: ValuePlacement,
    padding_id: i64,
}

impl SingleValueToSequenceMapper {
    pub fn new(value_field: impl Into<String>, like_field: impl Into<String>) -> Self {
        Self {
            value_field: value_field.into(),
            like_field: like_field.into(),
            placement: ValuePlacement::First,
            padding_id: LABEL_MASK_ID,
        }
    }

    #[must_use]
    pub const fn placement(mut self, placement: ValuePlacement) -> Self {
        self.placement = placement;
        self
    }

    #[must_use]
    pub const fn padding_id(mut self, id: i64) -> Self {
        self.padding_id = id;
        self
    }

    fn expand(&self, value: &Scalar, len: usize) -> Vec<Scalar> {
        let pad = Scalar::Int(self.padding_id);
        (0..len)
            .map(|i| {
                let active = match self.placement {
                    ValuePlacement::First => i == 0,
                    ValuePlacement::Last => i + 1 == len,
                    ValuePlacement::All => true,
                };
                if active { value.clone() } else { pad.clone() }
            })
            .collect()
    }
}

impl Mapper for SingleValueToSequenceMapper {
    fn name(&self) -> &str {
        "single_value_to_sequence"
    }

    fn requirements(&self) -> Vec<FieldRequirement> {
        vec![
            FieldRequirement::sequence(self.value_field.clone()),
            FieldRequirement::nested(self.like_field.clone()),
        ]
    }

    fn transform(&self, mut record: Record) -> Result<Vec<Record>> {
        let values = record.sequence(&self.value_field)?;
        let like = record.nested(&self.like_field)?;
        if values.len() != like.len() {
            return Err(Error::FieldShapeMismatch {
                field: self.value_field.clone(),
                reference: self.like_field.clone(),
                expected: like.len(),
                found: values.len(),
            });
        }
        let expanded: Vec<Vec<Scalar>> = values
            .iter()
            .zip(like)
            .map(|(value, seq)| self.expand(value, seq.len()))
            .collect();
        record.insert(self.value_field.clone(), Value::Nested(expanded));
        Ok(vec![record])
    }
}
