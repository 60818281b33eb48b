//! Special-token inventory for wordpiece-style vocabularies.
//!
//! An immutable `Vocab` is constructed once and passed to the offset mapper
//! and decoder explicitly, so nothing in the pipeline depends on a hidden
//! process-wide tokenizer object.

/// Special-token names and the sub-word continuation convention of a
/// wordpiece vocabulary. Immutable after construction.
#[derive(Debug, Clone)]
pub struct Vocab {
    cls: String,
    sep: String,
    pad: String,
    unk: String,
    continuation: String,
}

impl Vocab {
    pub fn new(
        cls: impl Into<String>,
        sep: impl Into<String>,
        pad: impl Into<String>,
        unk: impl Into<String>,
        continuation: impl Into<String>,
    ) -> Self {
        Self {
            cls: cls.into(),
            sep: sep.into(),
            pad: pad.into(),
            unk: unk.into(),
            continuation: continuation.into(),
        }
    }

    /// The BERT-uncased convention: `[CLS]`, `[SEP]`, `[PAD]`, `[UNK]`, `##`.
    pub fn bert_uncased() -> Self {
        Self::new("[CLS]", "[SEP]", "[PAD]", "[UNK]", "##")
    }

    pub fn cls(&self) -> &str {
        &self.cls
    }

    pub fn sep(&self) -> &str {
        &self.sep
    }

    pub fn pad(&self) -> &str {
        &self.pad
    }

    pub fn unk(&self) -> &str {
        &self.unk
    }

    /// Structural tokens that never correspond to context text.
    pub fn is_special(&self, token: &str) -> bool {
        token == self.cls || token == self.sep || token == self.pad
    }

    pub fn is_unknown(&self, token: &str) -> bool {
        token == self.unk
    }

    /// Sub-word continuation pieces (`##ffa`) attach to the preceding piece.
    /// A bare continuation prefix is not a continuation token.
    pub fn is_continuation(&self, token: &str) -> bool {
        token.len() > self.continuation.len() && token.starts_with(&self.continuation)
    }

    /// Strip the continuation prefix; non-continuation tokens pass through.
    pub fn strip_continuation<'a>(&self, token: &'a str) -> &'a str {
        if self.is_continuation(token) {
            &token[self.continuation.len()..]
        } else {
            token
        }
    }
}

impl Default for Vocab {
    fn default() -> Self {
        Self::bert_uncased()
    }
}
