//! Record collections and their two realizations.
//!
//! A [`Collection`] is an ordered multiset of [`Record`]s, realized either as
//! - a [`MaterializedCollection`]: indexable, known length, iterable any
//!   number of times; or
//! - a [`StreamingCollection`]: produced lazily from an upstream source,
//!   unknown length, either single-pass or re-iterable from a factory.
//!
//! The runner dispatches on the variant (see [`Runner`](crate::runner::Runner)):
//! every stage's output has the same realization as its input, and a streaming
//! input is never materialized behind the caller's back. Only the explicit
//! terminal collectors ([`Collection::collect_records`],
//! [`StreamingCollection::collect_materialized`]) drain a stream.

use crate::error::Result;
use crate::record::Record;
use crate::type_token::{TypeTag, adapt_payload};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Lazily produced records. Errors travel in-band and surface when pulled.
pub type RecordIter = Box<dyn Iterator<Item = Result<Record>> + Send>;

type IterFactory = Arc<dyn Fn() -> RecordIter + Send + Sync>;

/// Which realization a collection uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Realization {
    Materialized,
    Streaming,
}

/// In-memory, random-access records.
///
/// Cloning is cheap (the records sit behind an `Arc`), so the same
/// materialized input can be fed to several pipelines without copying.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MaterializedCollection {
    records: Arc<Vec<Record>>,
}

impl MaterializedCollection {
    #[must_use]
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            records: Arc::new(records),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Record> {
        self.records.get(index)
    }

    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    /// Take ownership of the records, copying only if the buffer is shared.
    #[must_use]
    pub fn into_records(self) -> Vec<Record> {
        Arc::try_unwrap(self.records).unwrap_or_else(|shared| shared.as_ref().clone())
    }
}

impl From<Vec<Record>> for MaterializedCollection {
    fn from(records: Vec<Record>) -> Self {
        Self::new(records)
    }
}

impl FromIterator<Record> for MaterializedCollection {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a MaterializedCollection {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

enum StreamSource {
    Once(RecordIter),
    Reiterable(IterFactory),
}

/// Lazily produced records.
///
/// A single-pass stream wraps one iterator and is consumed by iterating it.
/// A re-iterable stream wraps a factory; [`restart`](Self::restart) opens a
/// fresh pass each time, and stages layered on top stay re-iterable.
pub struct StreamingCollection {
    source: StreamSource,
}

impl StreamingCollection {
    /// Single-pass stream over owned records.
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = Record>,
        I::IntoIter: Send + 'static,
    {
        Self::from_results(records.into_iter().map(Ok))
    }

    /// Single-pass stream over fallible records (e.g. a loader that can fail mid-way).
    pub fn from_results<I>(iter: I) -> Self
    where
        I: Iterator<Item = Result<Record>> + Send + 'static,
    {
        Self {
            source: StreamSource::Once(Box::new(iter)),
        }
    }

    /// Re-iterable stream: `factory` is called once per pass.
    pub fn reiterable<F, I>(factory: F) -> Self
    where
        F: Fn() -> I + Send + Sync + 'static,
        I: IntoIterator<Item = Record>,
        I::IntoIter: Send + 'static,
    {
        Self {
            source: StreamSource::Reiterable(Arc::new(move || {
                Box::new(factory().into_iter().map(Ok)) as RecordIter
            })),
        }
    }

    #[must_use]
    pub const fn is_reiterable(&self) -> bool {
        matches!(self.source, StreamSource::Reiterable(_))
    }

    /// Open a new pass over a re-iterable stream; `None` for single-pass streams.
    #[must_use]
    pub fn restart(&self) -> Option<RecordIter> {
        match &self.source {
            StreamSource::Reiterable(factory) => Some(factory()),
            StreamSource::Once(_) => None,
        }
    }

    /// Drain the stream into memory. Stops at the first error.
    ///
    /// # Errors
    ///
    /// The first error yielded by the stream.
    pub fn collect_materialized(self) -> Result<MaterializedCollection> {
        self.into_iter()
            .collect::<Result<Vec<_>>>()
            .map(MaterializedCollection::new)
    }

    /// Wrap every pass of this stream with `layer`, keeping re-iterability.
    pub(crate) fn layered<F>(self, layer: F) -> Self
    where
        F: Fn(RecordIter) -> RecordIter + Send + Sync + 'static,
    {
        let source = match self.source {
            StreamSource::Once(iter) => StreamSource::Once(layer(iter)),
            StreamSource::Reiterable(factory) => {
                StreamSource::Reiterable(Arc::new(move || layer(factory())))
            }
        };
        Self { source }
    }
}

impl IntoIterator for StreamingCollection {
    type Item = Result<Record>;
    type IntoIter = RecordIter;

    fn into_iter(self) -> Self::IntoIter {
        match self.source {
            StreamSource::Once(iter) => iter,
            StreamSource::Reiterable(factory) => factory(),
        }
    }
}

impl fmt::Debug for StreamingCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamingCollection")
            .field("reiterable", &self.is_reiterable())
            .finish_non_exhaustive()
    }
}

/// A collection in one of its two realizations.
#[derive(Debug)]
pub enum Collection {
    Materialized(MaterializedCollection),
    Streaming(StreamingCollection),
}

impl Collection {
    /// Materialized collection over `records`.
    #[must_use]
    pub fn materialized(records: Vec<Record>) -> Self {
        Self::Materialized(MaterializedCollection::new(records))
    }

    /// Single-pass streaming collection over `records`.
    pub fn streaming<I>(records: I) -> Self
    where
        I: IntoIterator<Item = Record>,
        I::IntoIter: Send + 'static,
    {
        Self::Streaming(StreamingCollection::from_records(records))
    }

    /// Adapt any supported realization into a `Collection`.
    ///
    /// ```
    /// use ironsmash::{Collection, Record};
    /// use ironsmash::error::ErrorKind;
    ///
    /// let ok = Collection::adapt(vec![Record::new()]).unwrap();
    /// assert!(ok.is_materialized());
    ///
    /// let err = Collection::adapt(42u8).unwrap_err();
    /// assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    /// ```
    ///
    /// # Errors
    ///
    /// [`Error::TypeMismatch`](crate::Error::TypeMismatch) if `T` has no adapter.
    pub fn adapt<T: Any + Send>(value: T) -> Result<Self> {
        adapt_payload(Box::new(value), TypeTag::of::<T>())
    }

    #[must_use]
    pub const fn realization(&self) -> Realization {
        match self {
            Self::Materialized(_) => Realization::Materialized,
            Self::Streaming(_) => Realization::Streaming,
        }
    }

    #[must_use]
    pub const fn is_materialized(&self) -> bool {
        matches!(self, Self::Materialized(_))
    }

    #[must_use]
    pub const fn is_streaming(&self) -> bool {
        matches!(self, Self::Streaming(_))
    }

    /// Known length; `None` for streams.
    #[must_use]
    pub fn len(&self) -> Option<usize> {
        match self {
            Self::Materialized(m) => Some(m.len()),
            Self::Streaming(_) => None,
        }
    }

    /// Terminal collector: all records, in order.
    ///
    /// # Errors
    ///
    /// The first error yielded by a streaming collection.
    pub fn collect_records(self) -> Result<Vec<Record>> {
        match self {
            Self::Materialized(m) => Ok(m.into_records()),
            Self::Streaming(s) => s.into_iter().collect(),
        }
    }
}

impl From<MaterializedCollection> for Collection {
    fn from(m: MaterializedCollection) -> Self {
        Self::Materialized(m)
    }
}

impl From<StreamingCollection> for Collection {
    fn from(s: StreamingCollection) -> Self {
        Self::Streaming(s)
    }
}

impl From<Vec<Record>> for Collection {
    fn from(records: Vec<Record>) -> Self {
        Self::materialized(records)
    }
}
