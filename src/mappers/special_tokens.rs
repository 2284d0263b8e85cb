//! Framing sub-sequences with a tokenizer's special tokens.
//!
//! After windowing, each stride holds several sub-sequences that will be
//! joined into one model input. [`SpecialTokensMapper`] inserts the markers in
//! place: BOS before the first sub-sequence, SEP after every sub-sequence but
//! the last, EOS after the last. The id field gets the marker ids, the mask
//! field gets ones, and the token-type field gets the sub-sequence position,
//! so all three stay positionally aligned.

use crate::error::{Error, Result};
use crate::mapper::{FieldRequirement, Mapper};
use crate::mappers::tokenize::{SpecialTokens, Tokenizer};
use crate::record::{Record, ShapeReq};
use crate::value::{Scalar, Value};
use serde::{Deserialize, Serialize};

/// Which kind of field is being framed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialTokensKind {
    TokenIds,
    AttentionMask,
    TokenTypeIds,
}

impl SpecialTokensKind {
    /// Conventional field name for this kind.
    #[must_use]
    pub const fn default_field(self) -> &'static str {
        match self {
            Self::TokenIds => "input_ids",
            Self::AttentionMask => "attention_mask",
            Self::TokenTypeIds => "token_type_ids",
        }
    }
}

/// Inserts special tokens around each sub-sequence of a nested field.
#[derive(Debug)]
pub struct SpecialTokensMapper {
    field: String,
    kind: SpecialTokensKind,
    tokens: SpecialTokens,
    name: String,
}

impl SpecialTokensMapper {
    pub fn new(field: impl Into<String>, kind: SpecialTokensKind, tokens: SpecialTokens) -> Self {
        let field = field.into();
        let name = format!("special_tokens({field})");
        Self {
            field,
            kind,
            tokens,
            name,
        }
    }

    /// Frame the conventional field for `kind` with `tokenizer`'s markers.
    pub fn from_tokenizer(kind: SpecialTokensKind, tokenizer: &dyn Tokenizer) -> Self {
        Self::new(kind.default_field(), kind, tokenizer.special_tokens())
    }

    /// Marker values for sub-sequence `position`, given the marker ids.
    fn marker(&self, ids: &[i64], position: usize) -> Vec<Scalar> {
        match self.kind {
            SpecialTokensKind::TokenIds => ids.iter().copied().map(Scalar::Int).collect(),
            SpecialTokensKind::AttentionMask => vec![Scalar::Int(1); ids.len()],
            SpecialTokensKind::TokenTypeIds => {
                let position = i64::try_from(position).unwrap_or(i64::MAX);
                vec![Scalar::Int(position); ids.len()]
            }
        }
    }
}

impl Mapper for SpecialTokensMapper {
    fn name(&self) -> &str {
        &self.name
    }

    fn requirements(&self) -> Vec<FieldRequirement> {
        vec![FieldRequirement::nested(self.field.clone())]
    }

    fn transform(&self, mut record: Record) -> Result<Vec<Record>> {
        let Value::Nested(sequences) = record.take(&self.field, ShapeReq::Nested)? else {
            return Err(Error::Shape {
                field: self.field.clone(),
                expected: ShapeReq::Nested,
                found: None,
            });
        };
        let count = sequences.len();
        let framed = sequences
            .into_iter()
            .enumerate()
            .map(|(i, seq)| {
                let mut out = Vec::new();
                if i == 0 {
                    out.extend(self.marker(&self.tokens.bos, i));
                }
                out.extend(seq);
                let closing = if i + 1 == count {
                    &self.tokens.eos
                } else {
                    &self.tokens.sep
                };
                out.extend(self.marker(closing, i));
                out
            })
            .collect();
        record.insert(self.field.clone(), Value::Nested(framed));
        Ok(vec![record])
    }
}
