//! Tests for the helper mappers around the strider.

use anyhow::{Result, bail};
use ironsmash::testing::*;
use ironsmash::*;
use std::sync::Arc;

fn one(mapper: &dyn Mapper, record: Record) -> ironsmash::Result<Record> {
    let mut out = mapper.transform(record)?;
    assert_eq!(out.len(), 1, "`{}` should yield one record", mapper.name());
    Ok(out.remove(0))
}

fn run(mapper: impl Mapper + 'static, record: Record) -> ironsmash::Result<Vec<Record>> {
    Pipeline::of(mapper)
        .run(Collection::materialized(vec![record]))?
        .collect_records()
}

// Special tokens

#[test]
fn test_special_token_ids() -> Result<()> {
    let mapper = SpecialTokensMapper::from_tokenizer(SpecialTokensKind::TokenIds, &WhitespaceTokenizer);
    assert_eq!(mapper.name(), "special_tokens(input_ids)");
    let record = Record::new().with("input_ids", Value::nested_ints(vec![vec![1, 2], vec![3]]));
    let out = one(&mapper, record)?;
    assert_eq!(
        out.get("input_ids"),
        Some(&Value::nested_ints(vec![vec![101, 1, 2, 102], vec![3, 102]]))
    );
    Ok(())
}

#[test]
fn test_special_tokens_single_sub_sequence() -> Result<()> {
    let tokens = SpecialTokens {
        bos: vec![1],
        sep: vec![2],
        eos: vec![3, 3],
    };
    let mapper = SpecialTokensMapper::new("ids", SpecialTokensKind::TokenIds, tokens);
    let out = one(&mapper, Record::new().with("ids", Value::nested_ints(vec![vec![9]])))?;
    assert_eq!(out.get("ids"), Some(&Value::nested_ints(vec![vec![1, 9, 3, 3]])));
    Ok(())
}

#[test]
fn test_special_tokens_mask_and_type_ids_stay_aligned() -> Result<()> {
    let tk = WhitespaceTokenizer;
    let pipeline = Pipeline::of(SpecialTokensMapper::from_tokenizer(SpecialTokensKind::TokenIds, &tk))
        .then(SpecialTokensMapper::from_tokenizer(SpecialTokensKind::AttentionMask, &tk))
        .then(SpecialTokensMapper::from_tokenizer(SpecialTokensKind::TokenTypeIds, &tk));
    let record = RecordBuilder::new()
        .nested_ints("input_ids", vec![vec![5, 6], vec![7], vec![8, 9]])
        .nested_ints("attention_mask", vec![vec![1, 1], vec![1], vec![1, 1]])
        .nested_ints("token_type_ids", vec![vec![0, 0], vec![1], vec![2, 2]])
        .build();
    let out = run_pipeline(&pipeline, record)?;

    assert_eq!(
        out.get("attention_mask"),
        Some(&Value::nested_ints(vec![vec![1, 1, 1, 1], vec![1, 1], vec![1, 1, 1]]))
    );
    assert_eq!(
        out.get("token_type_ids"),
        Some(&Value::nested_ints(vec![vec![0, 0, 0, 0], vec![1, 1], vec![2, 2, 2]]))
    );
    let lengths: Vec<usize> = out.nested("input_ids")?.iter().map(Vec::len).collect();
    assert_eq!(lengths, vec![4, 2, 3]);
    assert_nested_lengths(&out, "attention_mask", &lengths);
    assert_nested_lengths(&out, "token_type_ids", &lengths);
    Ok(())
}

fn run_pipeline(pipeline: &Pipeline, record: Record) -> ironsmash::Result<Record> {
    let mut out = pipeline
        .run(Collection::materialized(vec![record]))?
        .collect_records()?;
    Ok(out.remove(0))
}

// Masks and labels

#[test]
fn test_make_attention_mask() -> Result<()> {
    let nested = one(
        &MakeAttentionMaskMapper::default(),
        Record::new().with("input_ids", nested_of_lengths(&[2, 3])),
    )?;
    assert_eq!(
        nested.get("attention_mask"),
        Some(&Value::nested_ints(vec![vec![1, 1], vec![1, 1, 1]]))
    );

    let flat = one(
        &MakeAttentionMaskMapper::new("ids", "mask"),
        Record::new().with("ids", Value::ints(vec![4, 5])),
    )?;
    assert_eq!(flat.get("mask"), Some(&Value::ints(vec![1, 1])));
    Ok(())
}

#[test]
fn test_labels_masker_one_per_label() -> Result<()> {
    let record = Record::new()
        .with("doc_id", 1)
        .with("labels", Value::ints(vec![0, 1, LABEL_MASK_ID, 2]));
    let out = run(LabelsMaskerMapper::new("labels", MaskStrategy::One), record)?;

    let layouts: Vec<Option<Vec<i64>>> = out
        .iter()
        .map(|r| r.get("labels").and_then(Value::to_ints))
        .collect();
    assert_eq!(
        layouts,
        vec![
            Some(vec![0, -100, -100, -100]),
            Some(vec![-100, 1, -100, -100]),
            Some(vec![-100, -100, -100, 2]),
        ]
    );
    assert_all(&out, |r| r.scalar("doc_id").ok() == Some(&Scalar::Int(1)));
    Ok(())
}

#[test]
fn test_labels_masker_custom_mask_id() -> Result<()> {
    let record = Record::new().with("labels", Value::ints(vec![3, 4]));
    let mapper = LabelsMaskerMapper::new("labels", MaskStrategy::One).label_mask_id(0);
    let out = mapper.transform(record)?;
    assert_eq!(out.len(), 2);
    assert_eq!(out[1].get("labels"), Some(&Value::ints(vec![0, 4])));
    Ok(())
}

#[test]
fn test_labels_masker_all_and_empty() -> Result<()> {
    let record = Record::new().with("labels", Value::ints(vec![0, 1]));
    let out = run(LabelsMaskerMapper::new("labels", MaskStrategy::All), record.clone())?;
    assert_records_equal(&out, &[record]);

    let masked = Record::new().with("labels", Value::ints(vec![LABEL_MASK_ID; 3]));
    let out = run(LabelsMaskerMapper::new("labels", MaskStrategy::One), masked)?;
    assert!(out.is_empty());
    Ok(())
}

#[test]
fn test_labels_masker_boundary_and_bound() -> Result<()> {
    let unbounded = LabelsMaskerMapper::new("labels", MaskStrategy::One);
    assert!(unbounded.is_boundary());
    assert_eq!(unbounded.fanout(), Fanout::OneToMany { max: None });

    let bounded = LabelsMaskerMapper::new("labels", MaskStrategy::One).max_labels(2);
    assert!(!bounded.is_boundary());
    assert_eq!(bounded.fanout(), Fanout::OneToMany { max: Some(2) });
    assert!(!LabelsMaskerMapper::new("labels", MaskStrategy::All).is_boundary());

    let within = Record::new().with("labels", Value::ints(vec![0, LABEL_MASK_ID, 1]));
    assert_eq!(run(bounded, within)?.len(), 2);

    let over = Record::new().with("labels", Value::ints(vec![0, 1, 2]));
    let err = run(
        LabelsMaskerMapper::new("labels", MaskStrategy::One).max_labels(2),
        over,
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Fanout);
    Ok(())
}

#[test]
fn test_single_value_to_sequence_placements() -> Result<()> {
    let record = || {
        RecordBuilder::new()
            .ints("labels", vec![7, 8])
            .nested_ints("input_ids", vec![vec![1, 2, 3], vec![4]])
            .build()
    };
    let cases = [
        (ValuePlacement::First, vec![vec![7, -100, -100], vec![8]]),
        (ValuePlacement::Last, vec![vec![-100, -100, 7], vec![8]]),
        (ValuePlacement::All, vec![vec![7, 7, 7], vec![8]]),
    ];
    for (placement, expected) in cases {
        let mapper = SingleValueToSequenceMapper::new("labels", "input_ids").placement(placement);
        let out = one(&mapper, record())?;
        assert_eq!(out.get("labels"), Some(&Value::nested_ints(expected)), "{placement:?}");
    }

    let mapper = SingleValueToSequenceMapper::new("labels", "input_ids").padding_id(0);
    let out = one(&mapper, record())?;
    assert_eq!(out.get("labels"), Some(&Value::nested_ints(vec![vec![7, 0, 0], vec![8]])));
    Ok(())
}

#[test]
fn test_single_value_to_sequence_edges() -> Result<()> {
    let record = RecordBuilder::new()
        .ints("labels", vec![5])
        .nested_ints("input_ids", vec![vec![]])
        .build();
    let out = one(&SingleValueToSequenceMapper::new("labels", "input_ids"), record)?;
    assert_nested_lengths(&out, "labels", &[0]);

    let mismatched = RecordBuilder::new()
        .ints("labels", vec![5, 6, 7])
        .nested_ints("input_ids", vec![vec![1]])
        .build();
    let err = SingleValueToSequenceMapper::new("labels", "input_ids")
        .transform(mismatched)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FieldShapeMismatch);
    Ok(())
}

// Field selection

#[test]
fn test_change_fields() -> Result<()> {
    let record = || {
        RecordBuilder::new()
            .int("doc_id", 1)
            .text("title", "t")
            .ints("labels", vec![1])
            .build()
    };
    let kept = one(&ChangeFieldsMapper::keep(["doc_id", "labels"]), record())?;
    assert_eq!(kept.field_names().collect::<Vec<_>>(), vec!["doc_id", "labels"]);

    let dropped = one(&ChangeFieldsMapper::drop(["title", "absent"]), record())?;
    assert_eq!(dropped.field_names().collect::<Vec<_>>(), vec!["doc_id", "labels"]);

    let from_lists = ChangeFieldsMapper::new(Some(vec!["title".into()]), None)?;
    assert_eq!(one(&from_lists, record())?.len(), 1);
    Ok(())
}

#[test]
fn test_change_fields_config_and_missing() {
    assert_eq!(
        ChangeFieldsMapper::new(None, None).unwrap_err().kind(),
        ErrorKind::Config
    );
    assert_eq!(
        ChangeFieldsMapper::new(Some(vec![]), Some(vec![])).unwrap_err().kind(),
        ErrorKind::Config
    );
    let err = run(ChangeFieldsMapper::keep(["absent"]), Record::new().with("a", 1)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Shape);
}

#[test]
fn test_make_field() -> Result<()> {
    let out = one(
        &MakeFieldMapper::new("split", "train"),
        Record::new().with("doc_id", 1),
    )?;
    assert_eq!(out.scalar("split")?.as_str(), Some("train"));

    let out = one(
        &MakeFieldMapper::shaped_like("labels", 0, "input_ids"),
        Record::new().with("input_ids", nested_of_lengths(&[2, 2, 1])),
    )?;
    assert_eq!(out.get("labels"), Some(&Value::ints(vec![0, 0, 0])));
    Ok(())
}

#[test]
fn test_make_field_computed() -> Result<()> {
    let mapper = MakeFieldMapper::computed("n_sentences", |r: &Record| {
        let n = r.nested("input_ids")?.len();
        Ok(Value::from(i64::try_from(n).unwrap_or(i64::MAX)))
    })
    .requiring(FieldRequirement::nested("input_ids"));

    let docs = vec![
        Record::new().with("input_ids", nested_of_lengths(&[2, 2, 1])),
        Record::new().with("input_ids", nested_of_lengths(&[4])),
    ];
    let out = Pipeline::of(mapper)
        .run(Collection::streaming(docs))?
        .collect_records()?;
    let counts: Vec<Option<i64>> = out
        .iter()
        .map(|r| r.scalar("n_sentences").ok().and_then(Scalar::as_i64))
        .collect();
    assert_eq!(counts, vec![Some(3), Some(1)]);

    let failing = MakeFieldMapper::computed("x", |r: &Record| Ok(r.require("absent", ShapeReq::Any)?.clone()));
    let err = run(failing, Record::new().with("a", 1)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Shape);
    Ok(())
}

// Shape helpers

#[test]
fn test_flatten() -> Result<()> {
    let out = one(
        &FlattenMapper::new("input_ids"),
        Record::new()
            .with("input_ids", nested_of_lengths(&[2, 1]))
            .with("doc_id", 4),
    )?;
    assert_eq!(out.get("input_ids"), Some(&Value::ints(vec![1, 2, 3])));
    assert_eq!(out.scalar("doc_id")?.as_i64(), Some(4));

    let flat = Record::new().with("input_ids", Value::ints(vec![1]));
    assert_eq!(one(&FlattenMapper::new("input_ids"), flat.clone())?, flat);
    Ok(())
}

#[test]
fn test_binarizer() -> Result<()> {
    let mapper = BinarizerMapper::new("score", 0.5)?;
    let seq = Record::new().with(
        "score",
        vec![Scalar::from(0.2), Scalar::from(0.7), Scalar::Int(1), Scalar::from(0.5)],
    );
    assert_eq!(one(&mapper, seq)?.get("score"), Some(&Value::ints(vec![0, 1, 1, 0])));

    let scalar = Record::new().with("score", 0.9);
    assert_eq!(one(&mapper, scalar)?.scalar("score")?, &Scalar::Int(1));
    Ok(())
}

#[test]
fn test_binarizer_errors() {
    assert_eq!(
        BinarizerMapper::new("score", f64::NAN).unwrap_err().kind(),
        ErrorKind::Config
    );
    let mapper = BinarizerMapper::new("score", 0.5).expect("valid threshold");
    let err = mapper
        .transform(Record::new().with("score", "high"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidValue);
    let err = mapper
        .transform(Record::new().with("score", nested_of_lengths(&[1])))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Shape);
}

// Tokenizer

struct BrokenTokenizer;

impl Tokenizer for BrokenTokenizer {
    fn encode(&self, text: &str) -> anyhow::Result<Vec<i64>> {
        bail!("vocabulary not loaded for {text:?}")
    }
}

#[test]
fn test_tokenize_text_and_sentences() -> Result<()> {
    let tk: Arc<dyn Tokenizer> = Arc::new(WhitespaceTokenizer);
    let mapper = TokenizerMapper::new(Arc::clone(&tk), "text").with_attention_mask("attention_mask");

    let out = one(&mapper, Record::new().with("text", "the cat sat"))?;
    let ids = out.sequence("input_ids")?;
    assert_eq!(ids.len(), 3);
    assert!(ids.iter().all(|id| id.as_i64().is_some_and(|v| v >= WORD_ID_BASE)));
    assert_eq!(out.get("attention_mask"), Some(&Value::ints(vec![1, 1, 1])));
    assert_eq!(out.scalar("text")?.as_str(), Some("the cat sat"));

    let mapper = TokenizerMapper::new(tk, "sentences").output_field("ids");
    let out = one(
        &mapper,
        RecordBuilder::new().texts("sentences", &["a b", "c", ""]).build(),
    )?;
    assert_nested_lengths(&out, "ids", &[2, 1, 0]);
    assert!(!out.contains("attention_mask"));
    Ok(())
}

#[test]
fn test_tokenize_truncates() -> Result<()> {
    let mapper = TokenizerMapper::new(Arc::new(WhitespaceTokenizer), "text").truncate_to(2)?;
    let out = one(&mapper, Record::new().with("text", "one two three four"))?;
    assert_eq!(out.sequence("input_ids")?.len(), 2);

    let err = TokenizerMapper::new(Arc::new(WhitespaceTokenizer), "text")
        .truncate_to(0)
        .err()
        .map(|e| e.kind());
    assert_eq!(err, Some(ErrorKind::Config));
    Ok(())
}

#[test]
fn test_tokenize_errors() {
    let mapper = TokenizerMapper::new(Arc::new(WhitespaceTokenizer), "text");
    let err = mapper.transform(Record::new().with("text", 5)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidValue);

    let nested = Value::Nested(vec![vec![Scalar::from("a")]]);
    let err = mapper.transform(Record::new().with("text", nested)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Shape);

    let broken = TokenizerMapper::new(Arc::new(BrokenTokenizer), "text");
    let err = run(broken, Record::new().with("text", "hello")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Collaborator);
    assert!(format!("{:#}", anyhow::Error::new(err)).contains("vocabulary not loaded"));
}

#[test]
fn test_valid_unicode_replaces_unwanted_tokens() -> Result<()> {
    let mapper = ValidUnicodeMapper::new(["words"], &["Cc", "Zs", "So"], "[UNK]")?;
    let words: Vec<Scalar> = ["the", "\u{7}", "\u{a0}\u{a0}", "cat", "\u{2603}", "snow\u{2603}"]
        .into_iter()
        .map(Scalar::from)
        .collect();
    let record = Record::new()
        .with("words", words)
        .with("title", "\u{7}");
    let out = one(&mapper, record)?;

    let cleaned: Vec<&str> = out.sequence("words")?.iter().filter_map(Scalar::as_str).collect();
    assert_eq!(cleaned, vec!["the", "[UNK]", "[UNK]", "cat", "[UNK]", "snow\u{2603}"]);
    // only the named fields are touched
    assert_eq!(out.scalar("title")?.as_str(), Some("\u{7}"));

    let sentences = Value::Nested(vec![
        vec![Scalar::from("a"), Scalar::from("\u{1}")],
        vec![Scalar::from("\u{3000}")],
    ]);
    let out = one(&mapper, Record::new().with("words", sentences))?;
    assert_eq!(
        out.nested("words")?[1],
        vec![Scalar::from("[UNK]")]
    );
    assert_eq!(out.nested("words")?[0][1], Scalar::from("[UNK]"));
    Ok(())
}

#[test]
fn test_valid_unicode_errors() {
    assert_eq!(
        ValidUnicodeMapper::new(["words"], &[], "?").unwrap_err().kind(),
        ErrorKind::Config
    );
    assert_eq!(
        ValidUnicodeMapper::new(["words"], &["Cc]|.*"], "?").unwrap_err().kind(),
        ErrorKind::Config
    );
    assert_eq!(
        ValidUnicodeMapper::new(["words"], &["NotACategory"], "?").unwrap_err().kind(),
        ErrorKind::Config
    );

    let mapper = ValidUnicodeMapper::new(["words"], &["Cc"], "?").expect("valid categories");
    let err = run(mapper, Record::new().with("words", Value::ints(vec![1]))).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidValue);
}
