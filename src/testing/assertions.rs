//! Assertion functions for testing pipeline outputs.

use crate::collection::Collection;
use crate::record::Record;
use crate::value::Value;

/// Assert that two record lists are equal in order and content.
///
/// # Panics
///
/// Panics with the first differing index if the lists differ.
///
/// # Example
///
/// ```
/// use ironsmash::Record;
/// use ironsmash::testing::assert_records_equal;
///
/// let a = vec![Record::new().with("n", 1)];
/// assert_records_equal(&a, &a.clone());
/// ```
pub fn assert_records_equal(actual: &[Record], expected: &[Record]) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "Record count mismatch:\n  Expected: {expected:?}\n  Actual: {actual:?}"
    );
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert_eq!(
            a, e,
            "Record mismatch at index {i}:\n  Expected: {e:?}\n  Actual: {a:?}"
        );
    }
}

/// Assert that every record satisfies `predicate`.
///
/// # Panics
///
/// Panics with the first failing record.
pub fn assert_all<F>(records: &[Record], predicate: F)
where
    F: Fn(&Record) -> bool,
{
    if let Some((i, r)) = records.iter().enumerate().find(|(_, r)| !predicate(r)) {
        panic!("Predicate failed for record {i}: {r:?}");
    }
}

/// Assert a collection's known length.
///
/// # Panics
///
/// Panics if the collection is streaming or has a different length.
pub fn assert_collection_size(collection: &Collection, expected: usize) {
    match collection.len() {
        Some(len) => assert_eq!(
            len, expected,
            "Collection size mismatch: expected {expected}, got {len}"
        ),
        None => panic!("Collection is streaming; its size is unknown"),
    }
}

/// Assert the sub-sequence lengths of a nested field.
///
/// # Panics
///
/// Panics if the field is missing, not nested, or has other lengths.
pub fn assert_nested_lengths(record: &Record, field: &str, expected: &[usize]) {
    let Some(Value::Nested(nested)) = record.get(field) else {
        panic!("Field `{field}` is not a nested sequence in {record:?}");
    };
    let lengths: Vec<usize> = nested.iter().map(Vec::len).collect();
    assert_eq!(
        lengths, expected,
        "Sub-sequence lengths of `{field}` differ"
    );
}
