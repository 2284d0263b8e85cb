//! Pipelines: ordered, immutable sequences of stages.
//!
//! Composition always flattens. Whether you join two mappers, a mapper and a
//! pipeline, or two pipelines, the result is one [`Pipeline`] whose stages are
//! the left operand's stages followed by the right operand's, so
//! `(a.then(b)).then(c)` and `a.then(b.then(c))` are the same three-stage
//! pipeline.
//!
//! ```
//! use ironsmash::*;
//!
//! let id = |name: &'static str| map_fn(name, Ok);
//! let left = id("a").then(id("b")).then(id("c"));
//! let right = Pipeline::of(id("a")).then(id("b").then(id("c")));
//! assert_eq!(left.stage_names(), right.stage_names());
//! assert_eq!(left.to_string(), "Pipeline(a -> b -> c)");
//! ```

use crate::collection::Collection;
use crate::error::Result;
use crate::mapper::Mapper;
use crate::runner::Runner;
use crate::stage::Stage;
use std::fmt;

/// Anything that can be appended to a pipeline: a mapper, a stage, or a pipeline.
pub trait IntoStages {
    fn into_stages(self) -> Vec<Stage>;
}

impl<M: Mapper + 'static> IntoStages for M {
    fn into_stages(self) -> Vec<Stage> {
        vec![Stage::new(self)]
    }
}

impl IntoStages for Stage {
    fn into_stages(self) -> Vec<Stage> {
        vec![self]
    }
}

impl IntoStages for Pipeline {
    fn into_stages(self) -> Vec<Stage> {
        self.stages
    }
}

/// An ordered sequence of stages. Cloning is cheap; stages share their mappers.
#[derive(Clone, Default)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    /// Empty pipeline: running it returns the input unchanged.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pipeline made of `first` (a mapper, stage, or another pipeline).
    pub fn of(first: impl IntoStages) -> Self {
        Self {
            stages: first.into_stages(),
        }
    }

    #[must_use]
    pub fn from_stages(stages: Vec<Stage>) -> Self {
        Self { stages }
    }

    /// Append `next` after this pipeline's stages.
    #[must_use]
    pub fn then(mut self, next: impl IntoStages) -> Self {
        self.stages.extend(next.into_stages());
        self
    }

    #[must_use]
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    #[must_use]
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(Stage::name).collect()
    }

    /// Run with the default (sequential) runner.
    ///
    /// # Errors
    ///
    /// The first stage failure, wrapped in [`Error::Stage`](crate::Error::Stage).
    /// Streaming input returns immediately; its errors surface while pulling.
    pub fn run(&self, input: Collection) -> Result<Collection> {
        Runner::default().run(self, input)
    }

    /// Run with an explicit runner.
    ///
    /// # Errors
    ///
    /// See [`Pipeline::run`]; also [`Error::Config`](crate::Error::Config) for
    /// an invalid runner configuration.
    pub fn run_with(&self, runner: &Runner, input: Collection) -> Result<Collection> {
        runner.run(self, input)
    }
}

/// Compose two pipeline pieces into one flat pipeline.
pub fn compose(first: impl IntoStages, second: impl IntoStages) -> Pipeline {
    Pipeline::of(first).then(second)
}

/// `then` on bare mappers, so `a.then(b)` reads the same as on pipelines.
pub trait MapperExt: Mapper + Sized + 'static {
    fn then(self, next: impl IntoStages) -> Pipeline {
        compose(self, next)
    }
}

impl<M: Mapper + 'static> MapperExt for M {}

impl PartialEq for Pipeline {
    fn eq(&self, other: &Self) -> bool {
        self.stages.len() == other.stages.len()
            && self
                .stages
                .iter()
                .zip(&other.stages)
                .all(|(a, b)| a.same_as(b))
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pipeline({})", self.stage_names().join(" -> "))
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stage_names())
            .finish()
    }
}
