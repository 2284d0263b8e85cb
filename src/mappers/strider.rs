//! Multi-sequence windowing ("striding").
//!
//! A record carrying nested sequence fields (one sub-sequence per sentence,
//! say) is cut into *strides*: records holding a contiguous window of those
//! sub-sequences. Windows are bounded by a sub-sequence count, a total length
//! measured on the length-reference field, or both.
//!
//! Window planning is a pure function over the sub-sequence lengths,
//! [`plan_windows`], so the bounds can be checked without building records:
//!
//! ```
//! use ironsmash::mappers::strider::{StriderConfig, plan_windows};
//!
//! let cfg = StriderConfig::new("input_ids").max_stride_count(2).max_length(512);
//! let windows = plan_windows(&[5, 5, 7], &cfg)?;
//! let spans: Vec<_> = windows.iter().map(|w| (w.start, w.end)).collect();
//! assert_eq!(spans, vec![(0, 2), (2, 3)]);
//! # Ok::<(), ironsmash::Error>(())
//! ```

use crate::error::{Error, Result};
use crate::mapper::{Fanout, FieldRequirement, Mapper};
use crate::mappers::tokenize::Tokenizer;
use crate::record::{Record, ShapeReq};
use crate::value::{Scalar, Shape};
use log::warn;
use serde::{Deserialize, Serialize};

/// What to do with a sub-sequence longer than `max_length` on its own.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OversizePolicy {
    /// Fail with [`Error::WindowOverflow`].
    #[default]
    Error,
    /// Emit the sub-sequence alone in its own window, flagged
    /// `truncation_required`, and keep going.
    Isolate,
}

/// Parameters of [`MultiSequenceStrider`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StriderConfig {
    /// Nested field whose sub-sequence lengths drive the length bound.
    pub length_reference_field: String,
    #[serde(default)]
    pub max_stride_count: Option<usize>,
    #[serde(default)]
    pub max_length: Option<usize>,
    /// Trailing sub-sequences of one window repeated at the head of the next.
    #[serde(default)]
    pub overlap: usize,
    /// Added to every sub-sequence length, to budget for special tokens
    /// inserted after windowing.
    #[serde(default)]
    pub extra_length_per_seq: usize,
    #[serde(default)]
    pub oversize: OversizePolicy,
    /// Fields sliced alongside the reference field. `None` slices every
    /// nested field of the record.
    #[serde(default)]
    pub aligned_fields: Option<Vec<String>>,
    /// Boolean field written on every stride with its `truncation_required`
    /// flag. Only valid with [`OversizePolicy::Isolate`].
    #[serde(default)]
    pub flag_field: Option<String>,
}

impl StriderConfig {
    pub fn new(length_reference_field: impl Into<String>) -> Self {
        Self {
            length_reference_field: length_reference_field.into(),
            max_stride_count: None,
            max_length: None,
            overlap: 0,
            extra_length_per_seq: 0,
            oversize: OversizePolicy::Error,
            aligned_fields: None,
            flag_field: None,
        }
    }

    #[must_use]
    pub const fn max_stride_count(mut self, count: usize) -> Self {
        self.max_stride_count = Some(count);
        self
    }

    #[must_use]
    pub const fn max_length(mut self, length: usize) -> Self {
        self.max_length = Some(length);
        self
    }

    #[must_use]
    pub const fn overlap(mut self, overlap: usize) -> Self {
        self.overlap = overlap;
        self
    }

    #[must_use]
    pub const fn extra_length_per_seq(mut self, extra: usize) -> Self {
        self.extra_length_per_seq = extra;
        self
    }

    /// Budget room for the tokenizer's special tokens around every
    /// sub-sequence: twice the longest of BOS, SEP and EOS, since a
    /// sub-sequence may end up first, in the middle, or last.
    #[must_use]
    pub fn with_tokenizer_extra(self, tokenizer: &dyn Tokenizer) -> Self {
        let extra = 2 * tokenizer.special_tokens().max_len();
        self.extra_length_per_seq(extra)
    }

    #[must_use]
    pub const fn oversize(mut self, policy: OversizePolicy) -> Self {
        self.oversize = policy;
        self
    }

    #[must_use]
    pub fn aligned_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aligned_fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn flag_field(mut self, field: impl Into<String>) -> Self {
        self.flag_field = Some(field.into());
        self
    }

    /// Reject bounds that would never close a window or never advance.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        match (self.max_stride_count, self.max_length) {
            (None, None) => {
                return Err(Error::config(
                    "strider needs max_stride_count, max_length, or both",
                ));
            }
            (Some(0), _) => return Err(Error::config("max_stride_count must be at least 1")),
            (_, Some(0)) => return Err(Error::config("max_length must be at least 1")),
            _ => {}
        }
        if let Some(count) = self.max_stride_count {
            if self.overlap >= count {
                return Err(Error::config(format!(
                    "overlap {} must be smaller than max_stride_count {count}",
                    self.overlap
                )));
            }
        }
        if self.flag_field.is_some() && self.oversize != OversizePolicy::Isolate {
            return Err(Error::config(
                "flag_field is only written when oversize policy is `isolate`",
            ));
        }
        Ok(())
    }
}

/// A half-open range `[start, end)` of sub-sequence positions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Window {
    pub start: usize,
    pub end: usize,
    /// The window holds a single sub-sequence longer than `max_length`.
    pub truncation_required: bool,
}

impl Window {
    #[must_use]
    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Plan the windows for sub-sequences of the given lengths.
///
/// Greedy, left to right. Item `i` costs `lengths[i] + extra_length_per_seq`.
/// When adding item `i` would break either bound, the window `[start, i)`
/// closes. The next window starts `overlap` items before `i` (never at or
/// before the previous start) and sheds leading items until item `i` fits.
/// An empty input plans one empty window.
///
/// # Errors
///
/// [`Error::Config`] for an invalid configuration, and
/// [`Error::WindowOverflow`] for an oversized item under
/// [`OversizePolicy::Error`].
pub fn plan_windows(lengths: &[usize], cfg: &StriderConfig) -> Result<Vec<Window>> {
    cfg.validate()?;
    let costs: Vec<usize> = lengths
        .iter()
        .map(|len| len + cfg.extra_length_per_seq)
        .collect();
    let n = costs.len();
    if n == 0 {
        return Ok(vec![Window {
            start: 0,
            end: 0,
            truncation_required: false,
        }]);
    }

    let over_length = |sum: usize| cfg.max_length.is_some_and(|max| sum > max);
    let over_count = |count: usize| cfg.max_stride_count.is_some_and(|max| count > max);

    let mut windows = Vec::new();
    let mut start = 0;
    let mut sum = 0;
    for (i, &cost) in costs.iter().enumerate() {
        if let Some(max_length) = cfg.max_length.filter(|max| cost > *max) {
            if cfg.oversize == OversizePolicy::Error {
                return Err(Error::WindowOverflow {
                    index: i,
                    length: cost,
                    max_length,
                });
            }
            warn!("sub-sequence {i} has length {cost} > {max_length}; placing it alone");
            if start < i {
                windows.push(Window {
                    start,
                    end: i,
                    truncation_required: false,
                });
            }
            windows.push(Window {
                start: i,
                end: i + 1,
                truncation_required: true,
            });
            start = i + 1;
            sum = 0;
            continue;
        }

        if i > start && (over_length(sum + cost) || over_count(i - start + 1)) {
            windows.push(Window {
                start,
                end: i,
                truncation_required: false,
            });
            let mut next = i.saturating_sub(cfg.overlap).max(start + 1);
            sum = costs[next..i].iter().sum();
            while next < i && (over_length(sum + cost) || over_count(i - next + 1)) {
                sum -= costs[next];
                next += 1;
            }
            start = next;
        }
        sum += cost;
    }
    if start < n {
        windows.push(Window {
            start,
            end: n,
            truncation_required: false,
        });
    }
    Ok(windows)
}

/// Splits each record into strides over its nested fields.
///
/// The reference field and the aligned fields are sliced per window; every
/// other field is copied into every stride. Strides come out in window order.
#[derive(Debug)]
pub struct MultiSequenceStrider {
    cfg: StriderConfig,
}

impl MultiSequenceStrider {
    /// # Errors
    ///
    /// [`Error::Config`] if the configuration is invalid.
    pub fn new(cfg: StriderConfig) -> Result<Self> {
        cfg.validate()?;
        Ok(Self { cfg })
    }

    #[must_use]
    pub const fn config(&self) -> &StriderConfig {
        &self.cfg
    }

    /// Names of the fields sliced for `record`, reference first.
    fn windowed_fields(&self, record: &Record) -> Vec<String> {
        let reference = &self.cfg.length_reference_field;
        let mut fields = vec![reference.clone()];
        match &self.cfg.aligned_fields {
            Some(aligned) => fields.extend(aligned.iter().filter(|f| *f != reference).cloned()),
            None => fields.extend(
                record
                    .iter()
                    .filter(|(name, value)| *name != reference && value.shape() == Shape::Nested)
                    .map(|(name, _)| name.to_string()),
            ),
        }
        fields
    }
}

impl Mapper for MultiSequenceStrider {
    fn name(&self) -> &str {
        "multi_sequence_strider"
    }

    fn requirements(&self) -> Vec<FieldRequirement> {
        let mut reqs = vec![FieldRequirement::nested(
            self.cfg.length_reference_field.clone(),
        )];
        if let Some(aligned) = &self.cfg.aligned_fields {
            reqs.extend(
                aligned
                    .iter()
                    .filter(|f| **f != self.cfg.length_reference_field)
                    .map(|f| FieldRequirement::sequence_like(f.clone())),
            );
        }
        reqs
    }

    fn fanout(&self) -> Fanout {
        Fanout::OneToMany { max: None }
    }

    fn is_boundary(&self) -> bool {
        true
    }

    fn transform(&self, record: Record) -> Result<Vec<Record>> {
        let reference = &self.cfg.length_reference_field;
        let lengths: Vec<usize> = record.nested(reference)?.iter().map(Vec::len).collect();
        let windowed = self.windowed_fields(&record);
        for field in &windowed[1..] {
            let found = record
                .require(field, ShapeReq::SequenceLike)?
                .outer_len()
                .unwrap_or_default();
            if found != lengths.len() {
                return Err(Error::FieldShapeMismatch {
                    field: field.clone(),
                    reference: reference.clone(),
                    expected: lengths.len(),
                    found,
                });
            }
        }

        let windows = plan_windows(&lengths, &self.cfg)?;
        windows
            .iter()
            .map(|w| {
                let mut stride = Record::new();
                for (name, value) in record.iter() {
                    let value = if windowed.iter().any(|f| f == name) {
                        value.slice(w.start..w.end).ok_or_else(|| Error::FieldShapeMismatch {
                            field: name.to_string(),
                            reference: reference.clone(),
                            expected: lengths.len(),
                            found: value.outer_len().unwrap_or_default(),
                        })?
                    } else {
                        value.clone()
                    };
                    stride.insert(name, value);
                }
                if let Some(flag) = &self.cfg.flag_field {
                    stride.insert(flag.clone(), Scalar::Bool(w.truncation_required));
                }
                Ok(stride)
            })
            .collect()
    }
}
