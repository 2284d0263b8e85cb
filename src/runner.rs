//! Execution of pipelines over collections.
//!
//! The runner dispatches every stage on the realization of its input:
//!
//! - **Materialized input** is split into batches of [`Runner::batch_size`]
//!   records and processed eagerly. In [`ExecMode::Parallel`] the batches run on
//!   a dedicated rayon pool; output order always equals input order, and when a
//!   batch fails the batches after it are skipped and the failure of the
//!   lowest failing batch is the one reported, so errors are deterministic.
//! - **Streaming input** is wrapped lazily, one stage iterator per stage. No
//!   record is processed until the caller pulls, and each stage buffers at most
//!   the expansion of a single upstream record. Pulling is single-threaded in
//!   either mode.
//!
//! The output of every stage has the same realization as its input.
//!
//! A run over streaming input only ends once its output is drained, so the
//! run's end time and the closing log line are recorded on the last pull.

use crate::collection::{Collection, MaterializedCollection, RecordIter, StreamingCollection};
use crate::error::{Error, Result};
use crate::metrics::MetricsCollector;
use crate::pipeline::Pipeline;
use crate::record::Record;
use crate::stage::{Stage, StageCounters, StageIter};
use log::{debug, info, trace};
use rayon::ThreadPool;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Default number of records per eager batch.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// How materialized batches are scheduled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecMode {
    #[default]
    Sequential,
    /// Batches run on a rayon pool; `threads` defaults to the number of CPUs.
    Parallel { threads: Option<usize> },
}

/// Runs pipelines.
#[derive(Clone, Debug)]
pub struct Runner {
    pub mode: ExecMode,
    pub batch_size: usize,
    metrics: Option<MetricsCollector>,
}

impl Default for Runner {
    fn default() -> Self {
        Self {
            mode: ExecMode::Sequential,
            batch_size: DEFAULT_BATCH_SIZE,
            metrics: None,
        }
    }
}

impl Runner {
    #[must_use]
    pub fn sequential() -> Self {
        Self::default()
    }

    /// Parallel runner with one worker per CPU.
    #[must_use]
    pub fn parallel() -> Self {
        Self {
            mode: ExecMode::Parallel { threads: None },
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.mode = ExecMode::Parallel {
            threads: Some(threads),
        };
        self
    }

    #[must_use]
    pub const fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: MetricsCollector) -> Self {
        self.metrics = Some(metrics);
        self
    }

    #[must_use]
    pub const fn metrics(&self) -> Option<&MetricsCollector> {
        self.metrics.as_ref()
    }

    fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::config("batch_size must be at least 1"));
        }
        if let ExecMode::Parallel { threads: Some(0) } = self.mode {
            return Err(Error::config("parallel mode needs at least one thread"));
        }
        Ok(())
    }

    /// Worker pool for materialized input in parallel mode.
    fn pool_for(&self, input: &Collection) -> Result<Option<ThreadPool>> {
        match (self.mode, input) {
            (ExecMode::Parallel { threads }, Collection::Materialized(_)) => {
                build_pool(threads).map(Some)
            }
            _ => Ok(None),
        }
    }

    /// Run `pipeline` over `input`.
    ///
    /// Materialized input is fully processed before returning. Streaming input
    /// returns a lazy collection; stage errors surface when pulled.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] for an invalid runner, otherwise the first stage
    /// failure wrapped in [`Error::Stage`]. No partial output is returned.
    pub fn run(&self, pipeline: &Pipeline, input: Collection) -> Result<Collection> {
        self.validate()?;
        info!(
            "running {pipeline} on {:?} input ({})",
            input.realization(),
            input
                .len()
                .map_or_else(|| String::from("unknown length"), |n| format!("{n} records"))
        );
        if let Some(m) = &self.metrics {
            m.record_start();
        }
        let pool = self.pool_for(&input)?;

        let mut current = input;
        for (index, stage) in pipeline.stages().iter().enumerate() {
            current = self.dispatch(index, stage, current, pool.as_ref())?;
        }

        match current {
            Collection::Materialized(out) => {
                if let Some(m) = &self.metrics {
                    m.record_end();
                }
                info!("finished {pipeline} ({} records)", out.len());
                Ok(Collection::Materialized(out))
            }
            Collection::Streaming(out) => {
                debug!("{pipeline} ready; stages run as the output is pulled");
                let label = pipeline.to_string();
                let metrics = self.metrics.clone();
                Ok(Collection::Streaming(out.layered(move |upstream| {
                    Box::new(FinishOnDrain::new(upstream, label.clone(), metrics.clone()))
                        as RecordIter
                })))
            }
        }
    }

    /// Adapt a type-erased value into a collection, then run.
    ///
    /// # Errors
    ///
    /// [`Error::TypeMismatch`] if `T` is not a supported collection
    /// realization; otherwise as [`Runner::run`].
    pub fn run_payload<T: Any + Send>(&self, pipeline: &Pipeline, value: T) -> Result<Collection> {
        self.run(pipeline, Collection::adapt(value)?)
    }

    /// Apply one stage at position `index`.
    ///
    /// # Errors
    ///
    /// As [`Runner::run`].
    pub fn apply_stage(&self, index: usize, stage: &Stage, input: Collection) -> Result<Collection> {
        self.validate()?;
        let pool = self.pool_for(&input)?;
        self.dispatch(index, stage, input, pool.as_ref())
    }

    fn dispatch(
        &self,
        index: usize,
        stage: &Stage,
        input: Collection,
        pool: Option<&ThreadPool>,
    ) -> Result<Collection> {
        stage
            .check_contract()
            .map_err(|e| e.at_stage(index, stage.name(), None))?;
        let counters = self
            .metrics
            .clone()
            .map(|m| StageCounters::new(m, index, stage.name()));
        match input {
            Collection::Materialized(m) => {
                let out = self.run_eager(index, stage, m, pool, counters.as_ref())?;
                Ok(Collection::Materialized(out))
            }
            Collection::Streaming(s) => Ok(Collection::Streaming(pull(index, stage, s, counters))),
        }
    }

    fn run_eager(
        &self,
        index: usize,
        stage: &Stage,
        input: MaterializedCollection,
        pool: Option<&ThreadPool>,
        counters: Option<&StageCounters>,
    ) -> Result<MaterializedCollection> {
        let total = input.len();
        debug!("stage #{index} `{}`: {total} records in", stage.name());
        let batches = split_batches(input.into_records(), self.batch_size);

        let out = match pool {
            None => {
                let mut out = Vec::with_capacity(total);
                for (offset, batch) in batches {
                    out.extend(process_batch(index, stage, offset, batch)?);
                }
                out
            }
            Some(pool) => run_parallel(index, stage, batches, pool)?,
        };

        if let Some(c) = counters {
            c.add_in(total as u64);
            c.add_out(out.len() as u64);
        }
        debug!("stage #{index} `{}`: {} records out", stage.name(), out.len());
        Ok(MaterializedCollection::new(out))
    }
}

fn build_pool(threads: Option<usize>) -> Result<ThreadPool> {
    let threads = threads.unwrap_or_else(num_cpus::get).max(1);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| Error::Collaborator(anyhow::Error::new(e).context("starting worker pool")))
}

fn pull(
    index: usize,
    stage: &Stage,
    input: StreamingCollection,
    counters: Option<StageCounters>,
) -> StreamingCollection {
    debug!("stage #{index} `{}`: streaming", stage.name());
    let stage = stage.clone();
    input.layered(move |upstream| {
        Box::new(StageIter::new(
            stage.clone(),
            index,
            upstream,
            counters.clone(),
        )) as RecordIter
    })
}

/// Closes a streaming run when its last stage runs dry.
struct FinishOnDrain {
    inner: RecordIter,
    label: String,
    metrics: Option<MetricsCollector>,
    pulled: usize,
    finished: bool,
}

impl FinishOnDrain {
    fn new(inner: RecordIter, label: String, metrics: Option<MetricsCollector>) -> Self {
        Self {
            inner,
            label,
            metrics,
            pulled: 0,
            finished: false,
        }
    }
}

impl Iterator for FinishOnDrain {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let item = self.inner.next();
        match item {
            Some(Ok(_)) => self.pulled += 1,
            Some(Err(_)) => {}
            None => {
                self.finished = true;
                if let Some(m) = &self.metrics {
                    m.record_end();
                }
                info!("finished {} ({} records pulled)", self.label, self.pulled);
            }
        }
        item
    }
}

/// Split owned records into `(offset, batch)` pairs of at most `size` records.
fn split_batches(records: Vec<Record>, size: usize) -> Vec<(usize, Vec<Record>)> {
    let mut out = Vec::with_capacity(records.len().div_ceil(size));
    let mut iter = records.into_iter();
    let mut offset = 0;
    loop {
        let batch: Vec<Record> = iter.by_ref().take(size).collect();
        if batch.is_empty() {
            break;
        }
        let n = batch.len();
        out.push((offset, batch));
        offset += n;
    }
    out
}

fn process_batch(
    index: usize,
    stage: &Stage,
    offset: usize,
    batch: Vec<Record>,
) -> Result<Vec<Record>> {
    let mut out = Vec::with_capacity(batch.len());
    for (i, record) in batch.into_iter().enumerate() {
        let produced = stage
            .process(record)
            .map_err(|e| e.at_stage(index, stage.name(), Some(offset + i)))?;
        out.extend(produced);
    }
    trace!(
        "stage #{index} `{}`: batch at {offset} produced {} records",
        stage.name(),
        out.len()
    );
    Ok(out)
}

fn run_parallel(
    index: usize,
    stage: &Stage,
    batches: Vec<(usize, Vec<Record>)>,
    pool: &ThreadPool,
) -> Result<Vec<Record>> {
    // Lowest batch number seen failing so far; usize::MAX while none has.
    let failed = AtomicUsize::new(usize::MAX);
    let results: Vec<Option<Result<Vec<Record>>>> = pool.install(|| {
        batches
            .into_par_iter()
            .enumerate()
            .map(|(n, (offset, batch))| {
                if n > failed.load(Ordering::Acquire) {
                    return None;
                }
                let res = process_batch(index, stage, offset, batch);
                if res.is_err() {
                    failed.fetch_min(n, Ordering::AcqRel);
                }
                Some(res)
            })
            .collect()
    });

    // A skipped batch always comes after a failed one, so the first error in
    // batch order is the lowest failure.
    let mut out = Vec::new();
    for res in results.into_iter().flatten() {
        out.extend(res?);
    }
    Ok(out)
}
