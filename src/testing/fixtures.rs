//! Pre-built fixtures: a mock tokenizer and sample documents.

use crate::mappers::tokenize::{SpecialTokens, Tokenizer};
use crate::record::Record;
use crate::value::{Scalar, Value};

/// First id handed out to words.
pub const WORD_ID_BASE: i64 = 1000;

/// Deterministic tokenizer: one id per whitespace-separated word.
///
/// Ids are an FNV-1a hash of the word folded into `[1000, 31000)`, so the same
/// word always gets the same id. Special ids follow the BERT layout:
/// BOS `[101]`, SEP `[102]`, EOS `[102]`, pad `0`.
///
/// ```
/// use ironsmash::mappers::Tokenizer;
/// use ironsmash::testing::WhitespaceTokenizer;
///
/// let tk = WhitespaceTokenizer;
/// let ids = tk.encode("the cat the")?;
/// assert_eq!(ids.len(), 3);
/// assert_eq!(ids[0], ids[2]);
/// # Ok::<(), anyhow::Error>(())
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct WhitespaceTokenizer;

impl WhitespaceTokenizer {
    fn word_id(word: &str) -> i64 {
        let mut hash: u32 = 0x811c_9dc5;
        for byte in word.bytes() {
            hash ^= u32::from(byte);
            hash = hash.wrapping_mul(0x0100_0193);
        }
        WORD_ID_BASE + i64::from(hash % 30_000)
    }
}

impl Tokenizer for WhitespaceTokenizer {
    fn encode(&self, text: &str) -> anyhow::Result<Vec<i64>> {
        Ok(text.split_whitespace().map(Self::word_id).collect())
    }

    fn pad_id(&self) -> Option<i64> {
        Some(0)
    }

    fn special_tokens(&self) -> SpecialTokens {
        SpecialTokens {
            bos: vec![101],
            sep: vec![102],
            eos: vec![102],
        }
    }
}

/// Three small multi-sentence documents with an id and per-sentence labels.
///
/// ```
/// use ironsmash::testing::sample_documents;
///
/// let docs = sample_documents();
/// assert_eq!(docs.len(), 3);
/// ```
#[must_use]
pub fn sample_documents() -> Vec<Record> {
    let doc = |id: i64, sentences: &[&str], labels: &[i64]| {
        Record::new()
            .with("doc_id", id)
            .with(
                "sentences",
                sentences
                    .iter()
                    .map(|s| Scalar::from(*s))
                    .collect::<Vec<_>>(),
            )
            .with("labels", Value::ints(labels.to_vec()))
    };
    vec![
        doc(
            1,
            &[
                "rust makes systems programming approachable",
                "ownership replaces the garbage collector",
                "borrowing keeps references safe",
            ],
            &[0, 1, 1],
        ),
        doc(
            2,
            &["pipelines compose small stages", "each stage maps records"],
            &[1, 0],
        ),
        doc(
            3,
            &[
                "windows bound the input length",
                "padding aligns sequences",
                "masks mark real tokens",
                "concatenation joins sub sequences",
            ],
            &[0, 0, 1, 1],
        ),
    ]
}
