//! Type tags and type-erased payloads.
//!
//! This module provides:
//! - [`TypeTag`]: a lightweight runtime type identifier used when reporting
//!   [`Error::TypeMismatch`](crate::Error::TypeMismatch).
//! - [`Payload`]: an opaque, boxed value handed to the engine by code that does
//!   not know (or care) which collection realization it holds.
//! - [`adapt_payload`]: the adapter lookup that turns a payload into a
//!   [`Collection`](crate::collection::Collection), or reports which type had
//!   no adapter.
//!
//! Data loaders that produce collections behind `dyn Any` (plugin boundaries,
//! loaders chosen at runtime) go through here; typed callers build a
//! `Collection` directly.

use crate::collection::{Collection, MaterializedCollection, RecordIter, StreamingCollection};
use crate::error::{Error, Result};
use crate::record::Record;
use std::any::{Any, TypeId, type_name};

/// A type-erased value handed to the engine.
pub type Payload = Box<dyn Any + Send>;

/// A lightweight runtime type tag for debugging and error reporting.
///
/// ```
/// use ironsmash::type_token::TypeTag;
/// let tag = TypeTag::of::<u32>();
/// assert_eq!(tag.name, "u32");
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TypeTag {
    /// Stable Rust type identifier.
    pub id: TypeId,
    /// Human-readable type name (best-effort).
    pub name: &'static str,
}

impl TypeTag {
    /// Construct a tag for `T`.
    #[must_use]
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }
}

/// Find the adapter for a type-erased payload.
///
/// Registered realizations: [`Collection`], [`MaterializedCollection`],
/// `Vec<Record>`, [`StreamingCollection`] and [`RecordIter`]. The `tag` names
/// the payload's static type in the error when none of them match.
///
/// # Errors
///
/// [`Error::TypeMismatch`] if the payload is none of the registered realizations.
pub fn adapt_payload(payload: Payload, tag: TypeTag) -> Result<Collection> {
    let payload = match payload.downcast::<Collection>() {
        Ok(c) => return Ok(*c),
        Err(other) => other,
    };
    let payload = match payload.downcast::<MaterializedCollection>() {
        Ok(m) => return Ok(Collection::Materialized(*m)),
        Err(other) => other,
    };
    let payload = match payload.downcast::<Vec<Record>>() {
        Ok(v) => return Ok(Collection::materialized(*v)),
        Err(other) => other,
    };
    let payload = match payload.downcast::<StreamingCollection>() {
        Ok(s) => return Ok(Collection::Streaming(*s)),
        Err(other) => other,
    };
    match payload.downcast::<RecordIter>() {
        Ok(iter) => Ok(Collection::Streaming(StreamingCollection::from_results(*iter))),
        Err(_) => Err(Error::TypeMismatch {
            expected: "a materialized or streaming record collection",
            found: tag.name,
        }),
    }
}
