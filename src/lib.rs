//! # ironsmash
//!
//! A **composable record pipeline engine** for preparing model inputs. Records
//! are field maps holding scalars, sequences, or sequences of sequences;
//! pipelines are ordered stages (mappers) applied to collections of records,
//! with the same mapper running unchanged over in-memory and streaming data.
//!
//! ## Key Features
//!
//! - **One mapper, two realizations** - materialized collections are processed
//!   in eager batches (optionally in parallel), streaming collections lazily on
//!   pull; the output always keeps the input's realization
//! - **Flat composition** - mappers and pipelines compose in any combination,
//!   always flattening into one associative pipeline
//! - **Checked field contracts** - mappers declare the shape of every field
//!   they read; violations name the field and the failing stage
//! - **Windowing** - cut multi-sentence records into bounded strides by
//!   sub-sequence count and token length, with optional overlap
//! - **Padding and concatenation** - pad sequences and masks in lockstep, then
//!   join each stride's sub-sequences into one flat input
//! - **Collaborator seams** - tokenizers and tensor backends plug in through
//!   small traits
//!
//! ## Quick Start
//!
//! ```
//! use ironsmash::*;
//! use ironsmash::testing::nested_of_lengths;
//!
//! # fn main() -> anyhow::Result<()> {
//! let record = Record::new()
//!     .with("doc_id", 7)
//!     .with("input_ids", nested_of_lengths(&[5, 5, 7]));
//!
//! let strider = MultiSequenceStrider::new(
//!     StriderConfig::new("input_ids").max_stride_count(2).max_length(512),
//! )?;
//! let pipeline = strider
//!     .then(MakeAttentionMaskMapper::default())
//!     .then(ConcatenateMapper::all_nested());
//!
//! let strides = pipeline
//!     .run(Collection::materialized(vec![record]))?
//!     .collect_records()?;
//!
//! assert_eq!(strides.len(), 2);
//! assert_eq!(strides[0].sequence("input_ids")?.len(), 10);
//! assert_eq!(strides[1].sequence("attention_mask")?.len(), 7);
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Concepts
//!
//! ### Records and values
//!
//! A [`Record`] maps field names to [`Value`]s: a [`Scalar`], a flat sequence,
//! or a nested sequence. Records in one collection need not share fields.
//!
//! ### Collections
//!
//! A [`Collection`] is either a [`MaterializedCollection`] (indexable, known
//! length) or a [`StreamingCollection`] (lazy, single-pass or re-iterable).
//! [`Collection::adapt`] turns a type-erased value into one, failing with
//! [`Error::TypeMismatch`] for unsupported types.
//!
//! ### Mappers and pipelines
//!
//! A [`Mapper`] transforms one record into zero or more records and declares
//! its [`Fanout`] and [`FieldRequirement`]s. A [`Pipeline`] is an immutable list
//! of stages built with [`Pipeline::then`], [`MapperExt::then`], or
//! [`compose`].
//!
//! ### Execution
//!
//! [`Pipeline::run`] uses the default sequential [`Runner`]. Configure a runner
//! for parallel batches ([`ExecMode::Parallel`]), a batch size, or
//! [metrics](metrics::MetricsCollector).
//!
//! ## Errors
//!
//! Every failure is an [`Error`]. Failures inside a run are wrapped in
//! [`Error::Stage`] with the stage position, its name, and the record index;
//! [`Error::kind`] looks through the wrapper.
//!
//! ## Logging
//!
//! The crate logs through the [`log`] facade and never installs a logger.

pub mod cast;
pub mod collection;
pub mod error;
pub mod mapper;
pub mod mappers;
pub mod metrics;
pub mod pipeline;
pub mod record;
pub mod runner;
pub mod stage;
pub mod testing;
pub mod type_token;
pub mod value;

pub use cast::{DenseCaster, DenseTensor, NumericKind, TensorCaster, cast_fields};
pub use collection::{
    Collection, MaterializedCollection, Realization, RecordIter, StreamingCollection,
};
pub use error::{Error, ErrorKind, Result};
pub use mapper::{Fanout, FieldRequirement, FlatMapFn, MapFn, Mapper, flat_map_fn, map_fn};
pub use mappers::*;
pub use metrics::MetricsCollector;
pub use pipeline::{IntoStages, MapperExt, Pipeline, compose};
pub use record::{Record, ShapeReq};
pub use runner::{ExecMode, Runner};
pub use stage::Stage;
pub use type_token::{Payload, TypeTag};
pub use value::{Scalar, Shape, Value};
