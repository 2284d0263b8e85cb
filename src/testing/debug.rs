//! Debug utilities for inspecting pipelines during test execution.

use crate::error::Result;
use crate::mapper::Mapper;
use crate::record::Record;
use log::debug;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Pass-through stage that logs the records flowing through it.
///
/// The first ten records are logged in full at `debug` level; later ones only
/// bump the count reported by [`InspectMapper::seen`].
///
/// ```
/// use ironsmash::*;
/// use ironsmash::testing::InspectMapper;
///
/// let p = Pipeline::of(InspectMapper::new("input"));
/// let out = p.run(Collection::materialized(vec![Record::new()]))?;
/// assert_eq!(out.len(), Some(1));
/// # Ok::<(), ironsmash::Error>(())
/// ```
#[derive(Debug)]
pub struct InspectMapper {
    label: String,
    seen: AtomicUsize,
}

/// Records logged in full before only counting.
const LOGGED_RECORDS: usize = 10;

impl InspectMapper {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            seen: AtomicUsize::new(0),
        }
    }

    /// Records seen so far.
    #[must_use]
    pub fn seen(&self) -> usize {
        self.seen.load(Ordering::Relaxed)
    }
}

impl Mapper for InspectMapper {
    fn name(&self) -> &str {
        &self.label
    }

    fn transform(&self, record: Record) -> Result<Vec<Record>> {
        let i = self.seen.fetch_add(1, Ordering::Relaxed);
        if i < LOGGED_RECORDS {
            debug!("[inspect: {}] [{i}]: {}", self.label, record.to_json());
        } else if i == LOGGED_RECORDS {
            debug!("[inspect: {}] ... (further records counted only)", self.label);
        }
        Ok(vec![record])
    }
}
