//! Builders for test records.

use crate::record::Record;
use crate::value::{Scalar, Value};

/// Fluent record builder.
///
/// ```
/// use ironsmash::testing::RecordBuilder;
///
/// let r = RecordBuilder::new()
///     .text("title", "hello")
///     .nested_ints("input_ids", vec![vec![1, 2], vec![3]])
///     .build();
/// assert_eq!(r.len(), 2);
/// ```
#[derive(Debug, Default, Clone)]
pub struct RecordBuilder {
    record: Record,
}

impl RecordBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.record.insert(name, value);
        self
    }

    #[must_use]
    pub fn int(self, name: &str, value: i64) -> Self {
        self.field(name, value)
    }

    #[must_use]
    pub fn text(self, name: &str, value: &str) -> Self {
        self.field(name, value)
    }

    #[must_use]
    pub fn texts(self, name: &str, values: &[&str]) -> Self {
        let seq: Vec<Scalar> = values.iter().map(|v| Scalar::from(*v)).collect();
        self.field(name, seq)
    }

    #[must_use]
    pub fn ints(self, name: &str, values: Vec<i64>) -> Self {
        self.field(name, Value::ints(values))
    }

    #[must_use]
    pub fn nested_ints(self, name: &str, values: Vec<Vec<i64>>) -> Self {
        self.field(name, Value::nested_ints(values))
    }

    #[must_use]
    pub fn build(self) -> Record {
        self.record
    }
}

/// Nested integer value with sub-sequences of the given lengths.
///
/// Items count up from 1 across the whole value, so every position is
/// distinct and windows can be told apart.
///
/// ```
/// use ironsmash::testing::nested_of_lengths;
/// use ironsmash::Value;
///
/// assert_eq!(nested_of_lengths(&[2, 1]), Value::nested_ints(vec![vec![1, 2], vec![3]]));
/// ```
#[must_use]
pub fn nested_of_lengths(lengths: &[usize]) -> Value {
    let mut next = 0_i64;
    Value::nested_ints(
        lengths
            .iter()
            .map(|&len| {
                (0..len)
                    .map(|_| {
                        next += 1;
                        next
                    })
                    .collect()
            })
            .collect(),
    )
}
