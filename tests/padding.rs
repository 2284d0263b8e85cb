//! Tests for sequence and mask padding.

use anyhow::Result;
use ironsmash::testing::*;
use ironsmash::*;

fn ids_and_mask() -> Record {
    RecordBuilder::new()
        .nested_ints("input_ids", vec![vec![1, 2, 3], vec![4, 5]])
        .nested_ints("attention_mask", vec![vec![1, 1, 1], vec![1, 1]])
        .build()
}

fn pad_one(mapper: &PaddingMapper, record: Record) -> ironsmash::Result<Record> {
    let mut out = mapper.transform(record)?;
    assert_eq!(out.len(), 1);
    Ok(out.remove(0))
}

#[test]
fn test_pads_to_longest_sub_sequence() -> Result<()> {
    let pad = PaddingMapper::new(PaddingConfig::new("input_ids", 0))?;
    let out = pad_one(&pad, ids_and_mask())?;
    assert_eq!(
        out.get("input_ids"),
        Some(&Value::nested_ints(vec![vec![1, 2, 3], vec![4, 5, 0]]))
    );
    // untouched
    assert_nested_lengths(&out, "attention_mask", &[3, 2]);
    Ok(())
}

#[test]
fn test_prepend() -> Result<()> {
    let pad = PaddingMapper::new(PaddingConfig::new("input_ids", 0).side(PadSide::Prepend))?;
    let out = pad_one(&pad, ids_and_mask())?;
    assert_eq!(
        out.get("input_ids"),
        Some(&Value::nested_ints(vec![vec![1, 2, 3], vec![0, 4, 5]]))
    );
    Ok(())
}

#[test]
fn test_flat_field_to_fixed_length() -> Result<()> {
    let pad = PaddingMapper::new(PaddingConfig::new("input_ids", 0).pad_to_length(4))?;
    let record = Record::new().with("input_ids", Value::ints(vec![7, 8]));
    let out = pad_one(&pad, record)?;
    assert_eq!(out.get("input_ids"), Some(&Value::ints(vec![7, 8, 0, 0])));
    Ok(())
}

#[test]
fn test_fixed_length_on_nested() -> Result<()> {
    let pad = PaddingMapper::new(PaddingConfig::new("input_ids", -1).pad_to_length(4))?;
    let out = pad_one(&pad, ids_and_mask())?;
    assert_eq!(
        out.get("input_ids"),
        Some(&Value::nested_ints(vec![vec![1, 2, 3, -1], vec![4, 5, -1, -1]]))
    );
    Ok(())
}

#[test]
fn test_already_long_enough_is_unchanged() -> Result<()> {
    let pad = PaddingMapper::new(PaddingConfig::new("input_ids", 0).pad_to_length(3))?;
    let record = Record::new().with("input_ids", Value::ints(vec![1, 2, 3]));
    let out = pad_one(&pad, record.clone())?;
    assert_eq!(out, record);
    Ok(())
}

#[test]
fn test_padding_never_truncates() {
    let pad = PaddingMapper::new(PaddingConfig::new("input_ids", 0).pad_to_length(2))
        .expect("valid config");
    let err = pad_one(&pad, ids_and_mask()).unwrap_err();
    assert!(matches!(
        err,
        Error::PaddingTooShort {
            length: 3,
            target: 2,
            ..
        }
    ));
}

#[test]
fn test_zero_length_rejected() {
    let err = PaddingMapper::new(PaddingConfig::new("input_ids", 0).pad_to_length(0)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
}

#[test]
fn test_mask_companion_either_order() -> Result<()> {
    let pad = PaddingMapper::new(PaddingConfig::new("input_ids", 0))?;
    let mask = pad.mask_companion("attention_mask", 0);
    assert_eq!(mask.name(), "pad(attention_mask)");
    assert_eq!(mask.config().length_reference.as_deref(), Some("input_ids"));

    let expected_mask = Value::nested_ints(vec![vec![1, 1, 1], vec![1, 1, 0]]);
    let ids_first = Pipeline::of(pad).then(mask);
    let mask_first = Pipeline::from_stages(ids_first.stages().iter().rev().cloned().collect());

    for pipeline in [&ids_first, &mask_first] {
        let out = pipeline
            .run(Collection::materialized(vec![ids_and_mask()]))?
            .collect_records()?;
        assert_eq!(out[0].get("attention_mask"), Some(&expected_mask), "{pipeline}");
        assert_nested_lengths(&out[0], "input_ids", &[3, 3]);
    }
    Ok(())
}

#[test]
fn test_mask_companion_shares_side_and_length() -> Result<()> {
    let pad = PaddingMapper::new(
        PaddingConfig::new("input_ids", 0)
            .side(PadSide::Prepend)
            .pad_to_length(5),
    )?;
    let mask = pad.mask_companion("attention_mask", 0);
    assert_eq!(mask.config().side, PadSide::Prepend);
    assert_eq!(mask.config().pad_to_length, Some(5));

    let out = pad_one(&mask, ids_and_mask())?;
    assert_eq!(
        out.get("attention_mask"),
        Some(&Value::nested_ints(vec![vec![0, 0, 1, 1, 1], vec![0, 0, 0, 1, 1]]))
    );
    Ok(())
}

#[test]
fn test_companion_outer_length_must_match() {
    let pad = PaddingMapper::new(PaddingConfig::new("input_ids", 0)).expect("valid config");
    let mask = pad.mask_companion("attention_mask", 0);
    let record = RecordBuilder::new()
        .nested_ints("input_ids", vec![vec![1, 2, 3], vec![4, 5]])
        .nested_ints("attention_mask", vec![vec![1, 1, 1]])
        .build();
    let err = pad_one(&mask, record).unwrap_err();
    assert!(matches!(
        err,
        Error::FieldShapeMismatch {
            expected: 2,
            found: 1,
            ..
        }
    ));
}

#[test]
fn test_length_reference_on_flat_fields() -> Result<()> {
    let pad = PaddingMapper::new(
        PaddingConfig::new("labels", LABEL_MASK_ID).length_reference("input_ids"),
    )?;
    let record = RecordBuilder::new()
        .ints("input_ids", vec![5, 6, 7, 8])
        .ints("labels", vec![1])
        .build();
    let out = pad_one(&pad, record)?;
    assert_eq!(out.get("labels"), Some(&Value::ints(vec![1, -100, -100, -100])));
    Ok(())
}

#[test]
fn test_missing_field_named() {
    let pad = PaddingMapper::new(PaddingConfig::new("input_ids", 0)).expect("valid config");
    let err = Pipeline::of(pad)
        .run(Collection::materialized(vec![Record::new().with("other", 1)]))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Shape);
    assert!(err.to_string().contains("input_ids"), "{err}");
}

#[test]
fn test_config_from_json() -> Result<()> {
    let cfg: PaddingConfig =
        serde_json::from_str(r#"{"field": "input_ids", "pad_value": 0, "side": "prepend"}"#)?;
    assert_eq!(cfg.side, PadSide::Prepend);
    assert_eq!(cfg.pad_value, Scalar::Int(0));
    assert_eq!(cfg.pad_to_length, None);
    Ok(())
}

struct NoPadTokenizer;

impl Tokenizer for NoPadTokenizer {
    fn encode(&self, text: &str) -> anyhow::Result<Vec<i64>> {
        Ok(text.split_whitespace().map(|w| i64::try_from(w.len()).unwrap_or(0)).collect())
    }
}

#[test]
fn test_pad_value_from_tokenizer() -> Result<()> {
    let cfg = PaddingConfig::from_tokenizer("input_ids", &WhitespaceTokenizer)?;
    assert_eq!(cfg.pad_value, Scalar::Int(0));
    let out = pad_one(&PaddingMapper::new(cfg)?, ids_and_mask())?;
    assert_eq!(
        out.get("input_ids"),
        Some(&Value::nested_ints(vec![vec![1, 2, 3], vec![4, 5, 0]]))
    );

    let err = PaddingConfig::from_tokenizer("input_ids", &NoPadTokenizer).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
    Ok(())
}
