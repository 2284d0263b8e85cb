//! Tests for run metrics.

use anyhow::Result;
use ironsmash::metrics::{CounterMetric, GaugeMetric, MetricsCollector};
use ironsmash::testing::*;
use ironsmash::*;

fn doubling() -> impl Mapper {
    flat_map_fn("double", |r: Record| Ok(vec![r.clone(), r])).at_most(2)
}

fn records(n: i64) -> Vec<Record> {
    (0..n).map(|i| Record::new().with("n", i)).collect()
}

#[test]
fn test_stage_counters_after_eager_run() -> Result<()> {
    let metrics = MetricsCollector::new();
    let runner = Runner::parallel()
        .with_threads(2)
        .with_batch_size(3)
        .with_metrics(metrics.clone());
    let pipeline = Pipeline::of(doubling()).then(InspectMapper::new("inspect"));
    runner.run(&pipeline, Collection::materialized(records(10)))?;

    assert_eq!(metrics.counter("stage.0.double.records_in"), Some(10));
    assert_eq!(metrics.counter("stage.0.double.records_out"), Some(20));
    assert_eq!(metrics.counter("stage.1.inspect.records_in"), Some(20));
    assert!(metrics.elapsed().is_some());
    Ok(())
}

#[test]
fn test_streaming_counters_advance_on_pull() -> Result<()> {
    let metrics = MetricsCollector::new();
    let runner = Runner::default().with_metrics(metrics.clone());
    let out = runner.run(&Pipeline::of(doubling()), Collection::streaming(records(5)))?;

    assert_eq!(metrics.counter("stage.0.double.records_in"), None);
    let Collection::Streaming(stream) = out else {
        panic!("expected a stream");
    };
    let mut iter = stream.into_iter();
    iter.next().transpose()?;
    assert_eq!(metrics.counter("stage.0.double.records_in"), Some(1));
    assert_eq!(metrics.counter("stage.0.double.records_out"), Some(1));

    let rest = iter.collect::<ironsmash::Result<Vec<_>>>()?;
    assert_eq!(rest.len(), 9);
    assert_eq!(metrics.counter("stage.0.double.records_in"), Some(5));
    assert_eq!(metrics.counter("stage.0.double.records_out"), Some(10));
    Ok(())
}

#[test]
fn test_streaming_run_ends_when_drained() -> Result<()> {
    let metrics = MetricsCollector::new();
    let runner = Runner::default().with_metrics(metrics.clone());
    let out = runner.run(&Pipeline::of(doubling()), Collection::streaming(records(3)))?;
    assert!(metrics.elapsed().is_none());
    assert!(metrics.to_json().get("execution_time_ms").is_none());

    let Collection::Streaming(stream) = out else {
        panic!("expected a stream");
    };
    let mut iter = stream.into_iter();
    iter.next().transpose()?;
    assert!(metrics.elapsed().is_none());

    assert_eq!(iter.by_ref().count(), 5);
    assert!(metrics.elapsed().is_some());
    assert!(metrics.to_json().get("execution_time_ms").is_some());
    assert!(iter.next().is_none());
    Ok(())
}

#[test]
fn test_counters_accumulate_across_runs() -> Result<()> {
    let metrics = MetricsCollector::new();
    let runner = Runner::default().with_metrics(metrics.clone());
    let pipeline = Pipeline::of(doubling());
    runner.run(&pipeline, Collection::materialized(records(2)))?;
    runner.run(&pipeline, Collection::materialized(records(3)))?;
    assert_eq!(metrics.counter("stage.0.double.records_in"), Some(5));
    Ok(())
}

#[test]
fn test_increment_and_set() {
    let metrics = MetricsCollector::new();
    metrics.increment_counter("strides", 2);
    metrics.increment_counter("strides", 3);
    assert_eq!(metrics.counter("strides"), Some(5));
    metrics.set_counter("strides", 1);
    assert_eq!(metrics.counter("strides"), Some(1));

    metrics.register(Box::new(CounterMetric::new("documents")));
    assert_eq!(metrics.counter("documents"), Some(0));
    assert_eq!(CounterMetric::with_value("x", 4).count(), 4);
}

#[test]
fn test_gauge_is_not_a_counter() {
    let metrics = MetricsCollector::new();
    metrics.register(Box::new(
        GaugeMetric::new("mean_stride_len", 12.5).with_description("mean tokens per stride"),
    ));
    metrics.increment_counter("mean_stride_len", 1);

    assert_eq!(metrics.counter("mean_stride_len"), None);
    assert_eq!(
        metrics.snapshot().get("mean_stride_len"),
        Some(&serde_json::json!(12.5))
    );
}

#[test]
fn test_json_report() -> Result<()> {
    let metrics = MetricsCollector::new();
    let runner = Runner::default().with_metrics(metrics.clone());
    runner.run(&Pipeline::of(doubling()), Collection::materialized(records(1)))?;
    metrics.register(Box::new(GaugeMetric::new("g", 1.0).with_description("a gauge")));

    let json = metrics.to_json();
    assert_eq!(json["stage.0.double.records_out"]["value"], 2);
    assert_eq!(json["g"]["description"], "a gauge");
    assert!(json["execution_time_ms"]["value"].is_u64());
    metrics.log_summary();
    Ok(())
}
