//! Error types shared by every stage of a pipeline.
//!
//! All failures are raised where they are detected and propagate unhandled
//! through the pipeline. When a stage fails, the runner wraps the cause in
//! [`Error::Stage`] so the caller learns which stage (position and name) and,
//! where known, which record index failed. [`Error::kind`] looks through that
//! wrapper for matching on the underlying cause.

use crate::mapper::Fanout;
use crate::record::ShapeReq;
use crate::value::Shape;
use thiserror::Error;

/// Convenience result type for pipeline operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Error type returned by mappers, collections and the runner.
#[derive(Debug, Error)]
pub enum Error {
    /// A required field is missing or has the wrong shape for a mapper.
    #[error("field `{field}`: expected {expected}, found {}", found_label(.found))]
    Shape {
        field: String,
        expected: ShapeReq,
        found: Option<Shape>,
    },

    /// No collection adapter exists for the runtime type handed to the engine.
    #[error("type mismatch: expected {expected}, found `{found}`")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// Invalid or contradictory parameters, detected when a mapper or runner is built.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A single sub-sequence is longer than the window length bound.
    #[error("sub-sequence {index} has length {length}, over the window limit of {max_length}")]
    WindowOverflow {
        index: usize,
        length: usize,
        max_length: usize,
    },

    /// An explicit padding length is shorter than an observed sequence.
    #[error("cannot pad field `{field}` to {target}: found a sequence of length {length}")]
    PaddingTooShort {
        field: String,
        length: usize,
        target: usize,
    },

    /// Fields expected to align have different outer lengths.
    #[error("field `{field}` has {found} items but `{reference}` has {expected}")]
    FieldShapeMismatch {
        field: String,
        reference: String,
        expected: usize,
        found: usize,
    },

    /// A field has the right shape but holds values the mapper cannot use.
    #[error("invalid value in field `{field}`: {message}")]
    InvalidValue { field: String, message: String },

    /// A mapper produced a number of records its declared cardinality forbids.
    #[error("mapper `{mapper}` is declared {declared} but produced {produced} records")]
    Fanout {
        mapper: String,
        declared: Fanout,
        produced: usize,
    },

    /// Failure reported by an external collaborator (tokenizer, tensor caster).
    #[error(transparent)]
    Collaborator(#[from] anyhow::Error),

    /// A stage failed; carries its position, name, and the record index if known.
    #[error("stage #{index} `{name}` failed{}: {source}", record_label(.record))]
    Stage {
        index: usize,
        name: String,
        record: Option<usize>,
        #[source]
        source: Box<Error>,
    },
}

/// Discriminant of [`Error`], ignoring the [`Error::Stage`] wrapper.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Shape,
    TypeMismatch,
    Config,
    WindowOverflow,
    PaddingTooShort,
    FieldShapeMismatch,
    InvalidValue,
    Fanout,
    Collaborator,
}

impl Error {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Kind of the underlying failure, looking through stage wrappers.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Shape { .. } => ErrorKind::Shape,
            Self::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            Self::Config(_) => ErrorKind::Config,
            Self::WindowOverflow { .. } => ErrorKind::WindowOverflow,
            Self::PaddingTooShort { .. } => ErrorKind::PaddingTooShort,
            Self::FieldShapeMismatch { .. } => ErrorKind::FieldShapeMismatch,
            Self::InvalidValue { .. } => ErrorKind::InvalidValue,
            Self::Fanout { .. } => ErrorKind::Fanout,
            Self::Collaborator(_) => ErrorKind::Collaborator,
            Self::Stage { source, .. } => source.kind(),
        }
    }

    /// `(index, name, record)` of the failing stage, if this error was raised by a pipeline run.
    #[must_use]
    pub fn stage(&self) -> Option<(usize, &str, Option<usize>)> {
        match self {
            Self::Stage {
                index,
                name,
                record,
                ..
            } => Some((*index, name.as_str(), *record)),
            _ => None,
        }
    }

    /// The innermost cause, with stage wrappers removed.
    #[must_use]
    pub fn root(&self) -> &Self {
        match self {
            Self::Stage { source, .. } => source.root(),
            other => other,
        }
    }

    /// Attach stage identity. Errors that already carry a stage are left untouched.
    pub(crate) fn at_stage(self, index: usize, name: &str, record: Option<usize>) -> Self {
        match self {
            already @ Self::Stage { .. } => already,
            cause => Self::Stage {
                index,
                name: name.to_string(),
                record,
                source: Box::new(cause),
            },
        }
    }
}

fn found_label(found: &Option<Shape>) -> String {
    found.map_or_else(|| String::from("nothing"), |shape| shape.to_string())
}

fn record_label(record: &Option<usize>) -> String {
    record.map_or_else(String::new, |i| format!(" at record {i}"))
}
