//! The [`Mapper`] trait: one transformation stage.
//!
//! A mapper supplies a single per-record semantic ([`Mapper::transform`]) and
//! declares:
//! - the fields it reads and the shape it expects for each
//!   ([`Mapper::requirements`]), checked by the stage before `transform` runs;
//! - how many records it emits per input record ([`Mapper::fanout`]);
//! - whether it is a *boundary* mapper ([`Mapper::is_boundary`]) whose
//!   per-record expansion depends on the data and is unbounded.
//!
//! The runner wraps that one semantic in both execution strategies (eager
//! batches for materialized input, lazy pulls for streams), so a mapper author
//! never writes backend-specific code.
//!
//! For ad-hoc stages, [`map_fn`] and [`flat_map_fn`] lift closures into mappers:
//!
//! ```
//! use ironsmash::*;
//!
//! let upper = map_fn("upper", |mut r: Record| {
//!     let text = r.scalar("text")?.as_str().unwrap_or_default().to_uppercase();
//!     r.insert("text", text);
//!     Ok(r)
//! })
//! .requiring(FieldRequirement::scalar("text"));
//!
//! let out = Pipeline::of(upper)
//!     .run(Collection::materialized(vec![Record::new().with("text", "hi")]))?
//!     .collect_records()?;
//! assert_eq!(out[0].scalar("text")?.as_str(), Some("HI"));
//! # Ok::<(), ironsmash::Error>(())
//! ```

use crate::error::Result;
use crate::record::{Record, ShapeReq};
use std::fmt;

/// Declared number of output records per input record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Fanout {
    /// Exactly one output per input.
    OneToOne,
    /// Any number of outputs; `max` bounds it when the mapper can promise one.
    OneToMany { max: Option<usize> },
}

impl fmt::Display for Fanout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OneToOne => f.write_str("one-to-one"),
            Self::OneToMany { max: None } => f.write_str("one-to-many"),
            Self::OneToMany { max: Some(n) } => write!(f, "one-to-many (at most {n})"),
        }
    }
}

/// A field a mapper reads, with the shape it needs.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FieldRequirement {
    pub name: String,
    pub shape: ShapeReq,
}

impl FieldRequirement {
    pub fn new(name: impl Into<String>, shape: ShapeReq) -> Self {
        Self {
            name: name.into(),
            shape,
        }
    }

    pub fn any(name: impl Into<String>) -> Self {
        Self::new(name, ShapeReq::Any)
    }

    pub fn scalar(name: impl Into<String>) -> Self {
        Self::new(name, ShapeReq::Scalar)
    }

    pub fn sequence(name: impl Into<String>) -> Self {
        Self::new(name, ShapeReq::Sequence)
    }

    pub fn nested(name: impl Into<String>) -> Self {
        Self::new(name, ShapeReq::Nested)
    }

    pub fn sequence_like(name: impl Into<String>) -> Self {
        Self::new(name, ShapeReq::SequenceLike)
    }
}

/// One transformation stage.
///
/// Implementations must be deterministic and must not rely on being called in
/// any particular thread; the parallel runner may call `transform` for
/// different records concurrently (hence `Send + Sync`).
pub trait Mapper: Send + Sync {
    /// Name reported in errors, logs and metrics.
    fn name(&self) -> &str;

    /// Fields read by this mapper and the shape each must have.
    fn requirements(&self) -> Vec<FieldRequirement> {
        Vec::new()
    }

    fn fanout(&self) -> Fanout {
        Fanout::OneToOne
    }

    /// True for mappers that must see a whole upstream record before deciding
    /// where their outputs begin and end (the strider). Streaming execution
    /// buffers exactly one upstream record's expansion for them.
    ///
    /// A mapper declaring `OneToMany { max: None }` must return true here.
    fn is_boundary(&self) -> bool {
        false
    }

    /// Transform one record into its outputs, in order.
    ///
    /// # Errors
    ///
    /// Any [`Error`](crate::Error); it aborts the pipeline run.
    fn transform(&self, record: Record) -> Result<Vec<Record>>;
}

/// One-to-one mapper built from a closure. See [`map_fn`].
pub struct MapFn<F> {
    name: String,
    requirements: Vec<FieldRequirement>,
    f: F,
}

/// Lift `Fn(Record) -> Result<Record>` into a one-to-one [`Mapper`].
pub fn map_fn<F>(name: impl Into<String>, f: F) -> MapFn<F>
where
    F: Fn(Record) -> Result<Record> + Send + Sync,
{
    MapFn {
        name: name.into(),
        requirements: Vec::new(),
        f,
    }
}

impl<F> MapFn<F> {
    /// Declare a field this closure reads.
    #[must_use]
    pub fn requiring(mut self, requirement: FieldRequirement) -> Self {
        self.requirements.push(requirement);
        self
    }
}

impl<F> Mapper for MapFn<F>
where
    F: Fn(Record) -> Result<Record> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn requirements(&self) -> Vec<FieldRequirement> {
        self.requirements.clone()
    }

    fn transform(&self, record: Record) -> Result<Vec<Record>> {
        (self.f)(record).map(|out| vec![out])
    }
}

/// One-to-many mapper built from a closure. See [`flat_map_fn`].
pub struct FlatMapFn<F> {
    name: String,
    requirements: Vec<FieldRequirement>,
    max: Option<usize>,
    boundary: bool,
    f: F,
}

/// Lift `Fn(Record) -> Result<Vec<Record>>` into a one-to-many [`Mapper`].
///
/// The expansion must either be bounded with [`at_most`](FlatMapFn::at_most)
/// or declared data-dependent with [`boundary`](FlatMapFn::boundary); a runner
/// refuses a stage that does neither.
pub fn flat_map_fn<F>(name: impl Into<String>, f: F) -> FlatMapFn<F>
where
    F: Fn(Record) -> Result<Vec<Record>> + Send + Sync,
{
    FlatMapFn {
        name: name.into(),
        requirements: Vec::new(),
        max: None,
        boundary: false,
        f,
    }
}

impl<F> FlatMapFn<F> {
    #[must_use]
    pub fn requiring(mut self, requirement: FieldRequirement) -> Self {
        self.requirements.push(requirement);
        self
    }

    /// Declare an upper bound on outputs per input record.
    #[must_use]
    pub const fn at_most(mut self, max: usize) -> Self {
        self.max = Some(max);
        self
    }

    /// Declare the expansion unbounded and data-dependent.
    #[must_use]
    pub const fn boundary(mut self) -> Self {
        self.boundary = true;
        self
    }
}

impl<F> Mapper for FlatMapFn<F>
where
    F: Fn(Record) -> Result<Vec<Record>> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn requirements(&self) -> Vec<FieldRequirement> {
        self.requirements.clone()
    }

    fn fanout(&self) -> Fanout {
        Fanout::OneToMany { max: self.max }
    }

    fn is_boundary(&self) -> bool {
        self.boundary
    }

    fn transform(&self, record: Record) -> Result<Vec<Record>> {
        (self.f)(record)
    }
}
