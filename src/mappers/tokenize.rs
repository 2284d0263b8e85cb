//! The tokenizer collaborator and the mapper that drives it.
//!
//! The engine never looks inside a tokenizer: it asks for ids, an optional pad
//! id, and the special ids that frame a multi-sequence input. Real tokenizers
//! live in application code behind [`Tokenizer`].

use crate::error::{Error, Result};
use crate::mapper::{FieldRequirement, Mapper};
use crate::record::{Record, ShapeReq};
use crate::value::{Scalar, Value};
use anyhow::Context;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Special ids placed around sub-sequences when several are joined.
///
/// `bos` opens the first sub-sequence, `sep` follows every sub-sequence but
/// the last, and `eos` closes the last one.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialTokens {
    pub bos: Vec<i64>,
    pub sep: Vec<i64>,
    pub eos: Vec<i64>,
}

impl SpecialTokens {
    /// Length of the longest of the three markers.
    #[must_use]
    pub fn max_len(&self) -> usize {
        self.bos.len().max(self.sep.len()).max(self.eos.len())
    }
}

/// Capability object wrapping an external tokenizer.
pub trait Tokenizer: Send + Sync {
    /// Encode one text into ids, without special tokens.
    ///
    /// # Errors
    ///
    /// Whatever the underlying tokenizer reports.
    fn encode(&self, text: &str) -> anyhow::Result<Vec<i64>>;

    fn pad_id(&self) -> Option<i64> {
        None
    }

    fn special_tokens(&self) -> SpecialTokens {
        SpecialTokens::default()
    }
}

/// Tokenizes a text field.
///
/// A scalar string becomes a flat id sequence; a sequence of strings becomes a
/// nested id sequence with one sub-sequence per string.
pub struct TokenizerMapper {
    tokenizer: Arc<dyn Tokenizer>,
    input_field: String,
    output_field: String,
    max_length: Option<usize>,
    attention_mask_field: Option<String>,
}

impl TokenizerMapper {
    pub fn new(tokenizer: Arc<dyn Tokenizer>, input_field: impl Into<String>) -> Self {
        Self {
            tokenizer,
            input_field: input_field.into(),
            output_field: String::from("input_ids"),
            max_length: None,
            attention_mask_field: None,
        }
    }

    #[must_use]
    pub fn output_field(mut self, field: impl Into<String>) -> Self {
        self.output_field = field.into();
        self
    }

    /// Cut every encoded text to at most `max_length` ids.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] if `max_length` is zero.
    pub fn truncate_to(mut self, max_length: usize) -> Result<Self> {
        if max_length == 0 {
            return Err(Error::config("tokenizer max_length must be at least 1"));
        }
        self.max_length = Some(max_length);
        Ok(self)
    }

    /// Also write an all-ones attention mask shaped like the ids.
    #[must_use]
    pub fn with_attention_mask(mut self, field: impl Into<String>) -> Self {
        self.attention_mask_field = Some(field.into());
        self
    }

    fn encode(&self, text: &Scalar) -> Result<Vec<Scalar>> {
        let Some(text) = text.as_str() else {
            return Err(Error::InvalidValue {
                field: self.input_field.clone(),
                message: format!("expected text, found {}", text.type_name()),
            });
        };
        let mut ids = self
            .tokenizer
            .encode(text)
            .with_context(|| format!("tokenizing field `{}`", self.input_field))?;
        if let Some(max) = self.max_length {
            ids.truncate(max);
        }
        Ok(ids.into_iter().map(Scalar::Int).collect())
    }
}

impl Mapper for TokenizerMapper {
    fn name(&self) -> &str {
        "tokenize"
    }

    fn requirements(&self) -> Vec<FieldRequirement> {
        vec![FieldRequirement::any(self.input_field.clone())]
    }

    fn transform(&self, mut record: Record) -> Result<Vec<Record>> {
        let ids = match record.get(&self.input_field) {
            Some(Value::Scalar(text)) => Value::Sequence(self.encode(text)?),
            Some(Value::Sequence(texts)) => Value::Nested(
                texts
                    .iter()
                    .map(|t| self.encode(t))
                    .collect::<Result<_>>()?,
            ),
            // nested text has no token layout
            found => {
                return Err(Error::Shape {
                    field: self.input_field.clone(),
                    expected: ShapeReq::Sequence,
                    found: found.map(Value::shape),
                });
            }
        };
        if let Some(mask_field) = &self.attention_mask_field {
            record.insert(mask_field.clone(), ones_like(&ids));
        }
        record.insert(self.output_field.clone(), ids);
        Ok(vec![record])
    }
}

/// Replaces tokens made up entirely of characters from chosen Unicode
/// general categories (`Cc`, `Zs`, `So`, ...) with a fixed token.
///
/// Works on flat or nested sequences of strings; other fields are untouched.
#[derive(Debug)]
pub struct ValidUnicodeMapper {
    fields: Vec<String>,
    unwanted: Regex,
    replace_token: String,
}

impl ValidUnicodeMapper {
    /// # Errors
    ///
    /// [`Error::Config`] if no category is given or one is not a Unicode
    /// general category name.
    pub fn new<I, S>(fields: I, categories: &[&str], replace_token: impl Into<String>) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if categories.is_empty() {
            return Err(Error::config("valid_unicode needs at least one category"));
        }
        if let Some(bad) = categories
            .iter()
            .find(|c| c.is_empty() || !c.chars().all(|ch| ch.is_ascii_alphabetic() || ch == '_'))
        {
            return Err(Error::config(format!("`{bad}` is not a Unicode category name")));
        }
        let class: String = categories.iter().map(|c| format!("\\p{{{c}}}")).collect();
        // an empty token has no wanted character either
        let pattern = format!("^[{class}]*$");
        let unwanted = Regex::new(&pattern)
            .map_err(|e| Error::config(format!("invalid Unicode categories {categories:?}: {e}")))?;
        Ok(Self {
            fields: fields.into_iter().map(Into::into).collect(),
            unwanted,
            replace_token: replace_token.into(),
        })
    }

    fn clean(&self, field: &str, tokens: &mut [Scalar]) -> Result<()> {
        for token in tokens {
            let Some(text) = token.as_str() else {
                return Err(Error::InvalidValue {
                    field: field.to_string(),
                    message: format!("expected text, found {}", token.type_name()),
                });
            };
            if self.unwanted.is_match(text) {
                *token = Scalar::from(self.replace_token.as_str());
            }
        }
        Ok(())
    }
}

impl Mapper for ValidUnicodeMapper {
    fn name(&self) -> &str {
        "valid_unicode"
    }

    fn requirements(&self) -> Vec<FieldRequirement> {
        self.fields
            .iter()
            .map(|f| FieldRequirement::sequence_like(f.clone()))
            .collect()
    }

    fn transform(&self, mut record: Record) -> Result<Vec<Record>> {
        for field in &self.fields {
            let mut value = record.take(field, ShapeReq::SequenceLike)?;
            match &mut value {
                Value::Sequence(tokens) => self.clean(field, tokens)?,
                Value::Nested(rows) => {
                    for tokens in rows.iter_mut() {
                        self.clean(field, tokens)?;
                    }
                }
                Value::Scalar(_) => {}
            }
            record.insert(field.clone(), value);
        }
        Ok(vec![record])
    }
}

/// All-ones value with the same shape and lengths as `value`.
pub(crate) fn ones_like(value: &Value) -> Value {
    match value {
        Value::Scalar(_) => Value::Scalar(Scalar::Int(1)),
        Value::Sequence(s) => Value::Sequence(vec![Scalar::Int(1); s.len()]),
        Value::Nested(n) => Value::Nested(
            n.iter()
                .map(|inner| vec![Scalar::Int(1); inner.len()])
                .collect(),
        ),
    }
}
