//! Tests for the runner: eager batches, parallel execution, and streaming pulls.

use anyhow::Result;
use ironsmash::testing::*;
use ironsmash::*;

fn numbered(n: i64) -> Vec<Record> {
    (0..n).map(|i| RecordBuilder::new().int("n", i).build()).collect()
}

fn square() -> impl Mapper {
    map_fn("square", |r: Record| {
        let n = r.scalar("n")?.as_i64().unwrap_or_default();
        Ok(r.with("sq", n * n))
    })
    .requiring(FieldRequirement::scalar("n"))
}

fn fail_when(modulo: i64, remainder: i64) -> impl Mapper {
    map_fn("picky", move |r: Record| {
        let n = r.scalar("n")?.as_i64().unwrap_or_default();
        if n % modulo == remainder {
            return Err(Error::InvalidValue {
                field: "n".into(),
                message: format!("{n} rejected"),
            });
        }
        Ok(r)
    })
}

#[test]
fn test_default_runner() {
    let r = Runner::default();
    assert_eq!(r.mode, ExecMode::Sequential);
    assert_eq!(r.batch_size, ironsmash::runner::DEFAULT_BATCH_SIZE);
    assert!(r.metrics().is_none());
}

#[test]
fn test_parallel_preserves_order() -> Result<()> {
    let p = Pipeline::of(square());
    let sequential = Runner::sequential()
        .with_batch_size(7)
        .run(&p, Collection::materialized(numbered(1000)))?
        .collect_records()?;
    let parallel = Runner::parallel()
        .with_threads(4)
        .with_batch_size(7)
        .run(&p, Collection::materialized(numbered(1000)))?
        .collect_records()?;

    assert_eq!(parallel.len(), 1000);
    assert_records_equal(&parallel, &sequential);
    assert_eq!(parallel[999].scalar("sq")?.as_i64(), Some(999 * 999));
    Ok(())
}

#[test]
fn test_parallel_error_is_deterministic() {
    let p = Pipeline::of(square()).then(fail_when(100, 37));
    let runner = Runner::parallel().with_threads(4).with_batch_size(10);
    for _ in 0..10 {
        let err = runner
            .run(&p, Collection::materialized(numbered(1000)))
            .unwrap_err();
        assert_eq!(err.stage(), Some((1, "picky", Some(37))));
    }
}

#[test]
fn test_sequential_and_parallel_report_same_error() {
    let p = Pipeline::of(fail_when(50, 13));
    let seq = Runner::sequential()
        .with_batch_size(3)
        .run(&p, Collection::materialized(numbered(200)))
        .unwrap_err();
    let par = Runner::parallel()
        .with_threads(3)
        .with_batch_size(3)
        .run(&p, Collection::materialized(numbered(200)))
        .unwrap_err();
    assert_eq!(seq.stage(), par.stage());
    assert_eq!(seq.to_string(), par.to_string());
}

#[test]
fn test_invalid_runner_config() {
    let p = Pipeline::of(square());
    let err = Runner::default()
        .with_batch_size(0)
        .run(&p, Collection::materialized(numbered(3)))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);

    let err = Runner::default()
        .with_threads(0)
        .run(&p, Collection::materialized(numbered(3)))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
}

#[test]
fn test_exec_mode_from_json() -> Result<()> {
    let mode: ExecMode = serde_json::from_str(r#"{"Parallel":{"threads":2}}"#)?;
    assert_eq!(mode, ExecMode::Parallel { threads: Some(2) });
    let mode: ExecMode = serde_json::from_str(r#""Sequential""#)?;
    assert_eq!(mode, ExecMode::Sequential);
    Ok(())
}

#[test]
fn test_output_length_is_sum_of_expansions() -> Result<()> {
    let expand = flat_map_fn("expand", |r: Record| {
        let n = usize::try_from(r.scalar("n")?.as_i64().unwrap_or_default()).unwrap_or_default();
        Ok(vec![r; n % 3])
    })
    .at_most(2);
    let out = Runner::parallel()
        .with_threads(2)
        .with_batch_size(4)
        .run(&Pipeline::of(expand), Collection::materialized(numbered(30)))?;
    assert!(out.is_materialized());
    // n % 3 over 0..30 sums to 10 * (0 + 1 + 2)
    assert_collection_size(&out, 30);
    Ok(())
}

#[test]
fn test_streaming_stays_streaming_in_parallel_mode() -> Result<()> {
    let out = Runner::parallel()
        .with_threads(2)
        .run(&Pipeline::of(square()), Collection::streaming(numbered(10)))?;
    assert!(out.is_streaming());
    let records = out.collect_records()?;
    assert_eq!(records.len(), 10);
    assert_eq!(records[3].scalar("sq")?.as_i64(), Some(9));
    Ok(())
}

#[test]
fn test_streaming_error_then_end() -> Result<()> {
    let p = Pipeline::of(square()).then(fail_when(5, 2));
    let Collection::Streaming(stream) = p.run(Collection::streaming(numbered(10)))? else {
        panic!("expected a stream");
    };
    let items: Vec<ironsmash::Result<Record>> = stream.into_iter().collect();
    // records 0 and 1 pass, record 2 fails, nothing follows
    assert_eq!(items.len(), 3);
    assert!(items[0].is_ok() && items[1].is_ok());
    let err = items[2].as_ref().unwrap_err();
    assert_eq!(err.stage(), Some((1, "picky", Some(2))));
    Ok(())
}

#[test]
fn test_streaming_matches_materialized() -> Result<()> {
    let p = Pipeline::of(square()).then(flat_map_fn("twice", |r: Record| Ok(vec![r.clone(), r])).at_most(2));
    let eager = p.run(Collection::materialized(numbered(20)))?.collect_records()?;
    let lazy = p.run(Collection::streaming(numbered(20)))?.collect_records()?;
    assert_records_equal(&lazy, &eager);
    Ok(())
}

#[test]
fn test_run_payload() -> Result<()> {
    let p = Pipeline::of(square());
    let out = Runner::default().run_payload(&p, numbered(3))?;
    assert_collection_size(&out, 3);

    let err = Runner::default().run_payload(&p, 17_i32).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    Ok(())
}

#[test]
fn test_apply_single_stage() -> Result<()> {
    let stage = Stage::new(fail_when(2, 1));
    let err = Runner::default()
        .apply_stage(4, &stage, Collection::materialized(numbered(3)))
        .unwrap_err();
    assert_eq!(err.stage(), Some((4, "picky", Some(1))));

    let ok = Runner::default().apply_stage(0, &Stage::new(square()), Collection::materialized(numbered(3)))?;
    assert_collection_size(&ok, 3);
    Ok(())
}
