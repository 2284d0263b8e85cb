//! Testing utilities for ironsmash pipelines.
//!
//! This module provides what the crate's own tests use, for end-users writing
//! tests for their pipelines:
//!
//! - **Assertions**: compare pipeline outputs with expected records
//! - **Builders**: write records and nested fields tersely
//! - **Fixtures**: a deterministic whitespace tokenizer and sample documents
//! - **Debug utilities**: an inspecting stage that logs what flows through it
//!
//! # Quick Start
//!
//! ```
//! use ironsmash::*;
//! use ironsmash::testing::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let input = vec![RecordBuilder::new().nested_ints("ids", vec![vec![1, 2], vec![3]]).build()];
//! let out = Pipeline::of(ConcatenateMapper::all_nested())
//!     .run(Collection::materialized(input))?
//!     .collect_records()?;
//!
//! assert_records_equal(&out, &[RecordBuilder::new().ints("ids", vec![1, 2, 3]).build()]);
//! # Ok(())
//! # }
//! ```

pub mod assertions;
pub mod builders;
pub mod debug;
pub mod fixtures;

pub use assertions::*;
pub use builders::*;
pub use debug::*;
pub use fixtures::*;
