//! Concrete mappers.
//!
//! The core trio for building model inputs from multi-sentence documents:
//! - [`strider::MultiSequenceStrider`]: cut nested fields into bounded windows
//! - [`padding::PaddingMapper`]: pad sequences (and, via its companion, masks)
//! - [`concat::ConcatenateMapper`]: join the sub-sequences of each window
//!
//! Around them sit smaller helpers for tokenizing, framing sub-sequences with
//! special tokens, building masks and labels, and selecting or reshaping
//! fields. [`collate::CollatorMapper`] pads a pre-grouped batch.

pub mod collate;
pub mod concat;
pub mod fields;
pub mod masks;
pub mod padding;
pub mod shape;
pub mod special_tokens;
pub mod strider;
pub mod tokenize;

pub use collate::{CollatorMapper, group_records};
pub use concat::ConcatenateMapper;
pub use fields::{ChangeFieldsMapper, MakeFieldMapper, ValueFn};
pub use masks::{
    LABEL_MASK_ID, LabelsMaskerMapper, MakeAttentionMaskMapper, MaskStrategy,
    SingleValueToSequenceMapper, ValuePlacement,
};
pub use padding::{PadSide, PaddingConfig, PaddingMapper};
pub use shape::{BinarizerMapper, FlattenMapper};
pub use special_tokens::{SpecialTokensKind, SpecialTokensMapper};
pub use strider::{MultiSequenceStrider, OversizePolicy, StriderConfig, Window, plan_windows};
pub use tokenize::{SpecialTokens, Tokenizer, TokenizerMapper, ValidUnicodeMapper};
