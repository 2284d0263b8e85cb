//! Stages: mappers placed in a pipeline.
//!
//! A [`Stage`] is a shared handle to one [`Mapper`]. Before any record flows,
//! [`Stage::check_contract`] refuses a mapper that declares an unbounded
//! expansion without being a boundary mapper. It also owns the per-record
//! contract checks that every execution strategy shares:
//! 1. each declared [`FieldRequirement`](crate::mapper::FieldRequirement) is
//!    checked before the mapper sees the record;
//! 2. the number of produced records is checked against the declared
//!    [`Fanout`].
//!
//! [`StageIter`] is the lazy-pull side of a stage: it pulls one upstream
//! record at a time and buffers only that record's expansion.

use crate::collection::RecordIter;
use crate::error::{Error, Result};
use crate::mapper::{Fanout, Mapper};
use crate::metrics::MetricsCollector;
use crate::record::Record;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

/// A mapper placed in a pipeline. Cloning shares the mapper.
#[derive(Clone)]
pub struct Stage {
    mapper: Arc<dyn Mapper>,
}

impl Stage {
    pub fn new<M: Mapper + 'static>(mapper: M) -> Self {
        Self {
            mapper: Arc::new(mapper),
        }
    }

    #[must_use]
    pub fn from_arc(mapper: Arc<dyn Mapper>) -> Self {
        Self { mapper }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.mapper.name()
    }

    #[must_use]
    pub fn mapper(&self) -> &dyn Mapper {
        self.mapper.as_ref()
    }

    /// True if both handles share the same mapper instance.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.mapper), Arc::as_ptr(&other.mapper))
    }

    /// Check the declaration itself: only boundary mappers may expand a record
    /// without an upper bound.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] for a non-boundary mapper declaring
    /// `OneToMany { max: None }`.
    pub fn check_contract(&self) -> Result<()> {
        match self.mapper.fanout() {
            Fanout::OneToMany { max: None } if !self.mapper.is_boundary() => {
                Err(Error::config(format!(
                    "mapper `{}` declares an unbounded one-to-many fanout but is not a \
                     boundary mapper; declare a bound or mark it as a boundary",
                    self.name()
                )))
            }
            _ => Ok(()),
        }
    }

    /// Check requirements, transform, and check the declared fanout.
    ///
    /// Errors are returned bare; callers attach the stage position.
    pub(crate) fn process(&self, record: Record) -> Result<Vec<Record>> {
        for req in self.mapper.requirements() {
            record.require(&req.name, req.shape)?;
        }
        let out = self.mapper.transform(record)?;
        let declared = self.mapper.fanout();
        let within = match declared {
            Fanout::OneToOne => out.len() == 1,
            Fanout::OneToMany { max: Some(max) } => out.len() <= max,
            Fanout::OneToMany { max: None } => true,
        };
        if within {
            Ok(out)
        } else {
            Err(Error::Fanout {
                mapper: self.name().to_string(),
                declared,
                produced: out.len(),
            })
        }
    }
}

impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stage")
            .field("name", &self.name())
            .field("fanout", &self.mapper.fanout())
            .field("boundary", &self.mapper.is_boundary())
            .finish()
    }
}

/// Counter names a stage reports under.
#[derive(Clone)]
pub(crate) struct StageCounters {
    metrics: MetricsCollector,
    records_in: String,
    records_out: String,
}

impl StageCounters {
    pub(crate) fn new(metrics: MetricsCollector, index: usize, name: &str) -> Self {
        Self {
            metrics,
            records_in: format!("stage.{index}.{name}.records_in"),
            records_out: format!("stage.{index}.{name}.records_out"),
        }
    }

    pub(crate) fn add_in(&self, n: u64) {
        self.metrics.increment_counter(&self.records_in, n);
    }

    pub(crate) fn add_out(&self, n: u64) {
        self.metrics.increment_counter(&self.records_out, n);
    }
}

/// Lazy pull over one stage.
///
/// Holds at most the outputs of a single upstream record. After the first
/// error it yields nothing more.
pub(crate) struct StageIter {
    stage: Stage,
    index: usize,
    upstream: RecordIter,
    pending: VecDeque<Record>,
    position: usize,
    done: bool,
    counters: Option<StageCounters>,
}

impl StageIter {
    pub(crate) fn new(
        stage: Stage,
        index: usize,
        upstream: RecordIter,
        counters: Option<StageCounters>,
    ) -> Self {
        Self {
            stage,
            index,
            upstream,
            pending: VecDeque::new(),
            position: 0,
            done: false,
            counters,
        }
    }
}

impl Iterator for StageIter {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.pending.pop_front() {
                if let Some(c) = &self.counters {
                    c.add_out(1);
                }
                return Some(Ok(record));
            }
            if self.done {
                return None;
            }
            match self.upstream.next() {
                None => {
                    self.done = true;
                    return None;
                }
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e));
                }
                Some(Ok(record)) => {
                    let position = self.position;
                    self.position += 1;
                    if let Some(c) = &self.counters {
                        c.add_in(1);
                    }
                    match self.stage.process(record) {
                        Ok(out) => self.pending.extend(out),
                        Err(e) => {
                            self.done = true;
                            return Some(Err(e.at_stage(
                                self.index,
                                self.stage.name(),
                                Some(position),
                            )));
                        }
                    }
                }
            }
        }
    }
}
