//! Collating a batch of records into one padded record.
//!
//! Collation is many-to-one, which no mapper can be. It is framed as
//! one-to-one over *pre-grouped* input instead: [`group_records`] turns a
//! batch into a single record whose fields are columns (one item per batch
//! member), and [`CollatorMapper`] pads every column of sequences to a common
//! length.
//!
//! ```
//! use ironsmash::*;
//! use ironsmash::mappers::collate::group_records;
//!
//! let batch = group_records(vec![
//!     Record::new().with("input_ids", Value::ints(vec![5, 6, 7])),
//!     Record::new().with("input_ids", Value::ints(vec![8])),
//! ])?;
//! let out = CollatorMapper::new().field_pad_id("input_ids", 0).transform(batch)?;
//! assert_eq!(
//!     out[0].get("input_ids"),
//!     Some(&Value::nested_ints(vec![vec![5, 6, 7], vec![8, 0, 0]]))
//! );
//! # Ok::<(), ironsmash::Error>(())
//! ```

use crate::error::{Error, Result};
use crate::mapper::Mapper;
use crate::mappers::tokenize::Tokenizer;
use crate::record::Record;
use crate::value::{Scalar, Value};
use log::trace;
use std::collections::BTreeMap;

/// Fields a tokenizer-backed collator knows how to pad, with their pad value.
/// `input_ids` is filled in from the tokenizer.
const TOKENIZER_FIELDS: [(&str, i64); 6] = [
    ("attention_mask", 0),
    ("token_type_ids", 0),
    ("special_tokens_mask", 0),
    ("overflow_to_sample_mapping", 0),
    ("offset_mapping", 0),
    ("length", 0),
];

/// Turn a batch of records into one record of columns.
///
/// A scalar field becomes a flat sequence with one item per record; a flat
/// sequence field becomes a nested sequence with one sub-sequence per record.
///
/// # Errors
///
/// [`Error::InvalidValue`] if the records do not share a field set, or a field
/// is already nested.
pub fn group_records(records: impl IntoIterator<Item = Record>) -> Result<Record> {
    let mut columns: BTreeMap<String, Value> = BTreeMap::new();
    for (position, record) in records.into_iter().enumerate() {
        if position > 0 {
            let odd = columns
                .keys()
                .map(String::as_str)
                .find(|name| !record.contains(name))
                .or_else(|| record.field_names().find(|name| !columns.contains_key(*name)));
            if let Some(field) = odd {
                return Err(Error::InvalidValue {
                    field: field.to_string(),
                    message: format!("record {position} does not share the batch's fields"),
                });
            }
        }
        for (name, value) in record {
            let column = columns.entry(name.clone()).or_insert_with(|| match &value {
                Value::Scalar(_) => Value::Sequence(Vec::new()),
                _ => Value::Nested(Vec::new()),
            });
            match (column, value) {
                (_, Value::Nested(_)) => {
                    return Err(Error::InvalidValue {
                        field: name,
                        message: String::from("nested fields cannot be grouped"),
                    });
                }
                (Value::Sequence(items), Value::Scalar(item)) => items.push(item),
                (Value::Nested(rows), Value::Sequence(row)) => rows.push(row),
                _ => {
                    return Err(Error::InvalidValue {
                        field: name,
                        message: format!("record {position} changes the field's shape"),
                    });
                }
            }
        }
    }
    Ok(columns.into_iter().collect())
}

/// Pads every nested column of a grouped record to one length.
///
/// Each column is padded with its own pad value, falling back to the
/// unknown-field pad value. Flat and scalar columns pass through.
#[derive(Clone, Debug, Default)]
pub struct CollatorMapper {
    fields_pad_ids: BTreeMap<String, Scalar>,
    unk_fields_pad_id: Option<Scalar>,
    pad_to_length: Option<usize>,
}

impl CollatorMapper {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Collator for the usual tokenizer outputs: `input_ids` pads with the
    /// tokenizer's pad id (0 when it has none), masks and type ids with 0.
    #[must_use]
    pub fn from_tokenizer(tokenizer: &dyn Tokenizer) -> Self {
        let mut collator = Self::new().field_pad_id("input_ids", tokenizer.pad_id().unwrap_or(0));
        for (field, pad) in TOKENIZER_FIELDS {
            collator = collator.field_pad_id(field, pad);
        }
        collator
    }

    /// Pad value for one field. Replaces any earlier value for it.
    #[must_use]
    pub fn field_pad_id(mut self, field: impl Into<String>, pad: impl Into<Scalar>) -> Self {
        self.fields_pad_ids.insert(field.into(), pad.into());
        self
    }

    /// Pad value for every field without its own.
    #[must_use]
    pub fn unknown_field_pad_id(mut self, pad: impl Into<Scalar>) -> Self {
        self.unk_fields_pad_id = Some(pad.into());
        self
    }

    /// Pad to a fixed length instead of the longest row.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] if `length` is zero.
    pub fn pad_to_length(mut self, length: usize) -> Result<Self> {
        if length == 0 {
            return Err(Error::config("collator pad_to_length must be at least 1"));
        }
        self.pad_to_length = Some(length);
        Ok(self)
    }

    fn pad_value(&self, field: &str) -> Result<&Scalar> {
        self.fields_pad_ids
            .get(field)
            .or(self.unk_fields_pad_id.as_ref())
            .ok_or_else(|| {
                Error::config(format!(
                    "no pad value for field `{field}` and no unknown-field pad value"
                ))
            })
    }

    fn collate(&self, field: &str, rows: &mut [Vec<Scalar>]) -> Result<()> {
        let longest = rows.iter().map(Vec::len).max().unwrap_or(0);
        let target = match self.pad_to_length {
            Some(fixed) if longest > fixed => {
                return Err(Error::PaddingTooShort {
                    field: field.to_string(),
                    length: longest,
                    target: fixed,
                });
            }
            Some(fixed) => fixed,
            None => longest,
        };
        let pad = self.pad_value(field)?;
        for row in rows.iter_mut() {
            row.resize(target, pad.clone());
        }
        trace!("collated `{field}`: {} rows of {target}", rows.len());
        Ok(())
    }
}

impl Mapper for CollatorMapper {
    fn name(&self) -> &str {
        "collate"
    }

    fn transform(&self, record: Record) -> Result<Vec<Record>> {
        let mut out = Record::new();
        for (name, mut value) in record {
            if let Value::Nested(rows) = &mut value {
                self.collate(&name, rows)?;
            }
            out.insert(name, value);
        }
        Ok(vec![out])
    }
}
