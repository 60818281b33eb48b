//! Token-to-character offset mapping and answer text recovery.
//!
//! Aligns the sub-word tokens of an encoded question-context pair back to
//! character positions in the original context string, so that a decoded
//! token span can be returned as a verbatim substring of the context.

use serde::Serialize;
use tracing::{debug, debug_span};

use crate::vocab::Vocab;

/// Half-open character range `[start, end)` in the original context.
/// Positions are char indices, not byte offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CharSpan {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum OffsetError {
    #[error("token index {index} out of range (offset table holds {len})")]
    IndexOutOfBounds { index: usize, len: usize },
    #[error("token {index} has no character range in the context")]
    NoCharRange { index: usize },
    #[error("token {index} ({token:?}) does not align with the context")]
    Misaligned { index: usize, token: String },
    #[error("segment id table length {segment_ids} does not match token count {tokens}")]
    ShapeMismatch { tokens: usize, segment_ids: usize },
}

/// One question-context pair after tokenization, with per-token character
/// offsets into the original context. Immutable once produced; decoding the
/// same example twice always recovers the same text.
#[derive(Debug, Clone)]
pub struct EncodedExample {
    pub id: String,
    /// Sub-word token sequence: `[CLS] question [SEP] context [SEP] pad...`
    pub tokens: Vec<String>,
    /// 0 = question side (and leading specials), 1 = context side.
    pub segment_ids: Vec<u8>,
    /// Number of non-padding positions.
    pub valid_length: usize,
    /// Original context text, kept for answer recovery.
    pub context: String,
    /// `None` for question tokens, specials, and padding.
    pub offsets: Vec<Option<CharSpan>>,
}

impl EncodedExample {
    /// Build an example and compute its offset table.
    ///
    /// `valid_length` is clamped to the token count; a `segment_ids` table of
    /// a different length than `tokens` is rejected.
    pub fn new(
        id: impl Into<String>,
        tokens: Vec<String>,
        segment_ids: Vec<u8>,
        valid_length: usize,
        context: impl Into<String>,
        vocab: &Vocab,
    ) -> Result<Self, OffsetError> {
        if tokens.len() != segment_ids.len() {
            return Err(OffsetError::ShapeMismatch {
                tokens: tokens.len(),
                segment_ids: segment_ids.len(),
            });
        }
        let context = context.into();
        let valid_length = valid_length.min(tokens.len());
        let offsets = map_offsets(vocab, &tokens, &segment_ids, valid_length, &context)?;
        Ok(Self {
            id: id.into(),
            tokens,
            segment_ids,
            valid_length,
            context,
            offsets,
        })
    }

    /// Recover the context substring covered by the token span
    /// `[start, end]` (inclusive token indices).
    pub fn span_text(&self, start: usize, end: usize) -> Result<String, OffsetError> {
        span_text(&self.context, &self.offsets, start, end)
    }
}

/// Align each in-context token to its character range in `context`.
///
/// Non-context positions (question side, specials, padding) map to `None`.
/// Continuation pieces must directly follow their predecessor; independent
/// tokens may skip whitespace first. Matching is case-insensitive, so an
/// uncased token stream aligns against the original-cased context.
///
/// Unknown-piece tokens consume the maximal alphanumeric run at the cursor
/// (or a single character for symbols) and receive that range; the token
/// text itself carries no information to match against.
pub fn map_offsets(
    vocab: &Vocab,
    tokens: &[String],
    segment_ids: &[u8],
    valid_length: usize,
    context: &str,
) -> Result<Vec<Option<CharSpan>>, OffsetError> {
    let _span = debug_span!("map_offsets", token_count = tokens.len(), valid_length).entered();
    let ctx: Vec<char> = context.chars().collect();
    let mut offsets: Vec<Option<CharSpan>> = vec![None; tokens.len()];
    let mut cursor = 0usize;

    for (index, (token, &segment)) in tokens.iter().zip(segment_ids).enumerate().take(valid_length)
    {
        if segment != 1 || vocab.is_special(token) {
            continue;
        }

        let continuation = vocab.is_continuation(token);
        if !continuation {
            while cursor < ctx.len() && ctx[cursor].is_whitespace() {
                cursor += 1;
            }
        }

        if vocab.is_unknown(token) {
            let start = cursor;
            if cursor < ctx.len() && ctx[cursor].is_alphanumeric() {
                while cursor < ctx.len() && ctx[cursor].is_alphanumeric() {
                    cursor += 1;
                }
            } else if cursor < ctx.len() {
                cursor += 1;
            }
            if cursor == start {
                return Err(OffsetError::Misaligned {
                    index,
                    token: token.clone(),
                });
            }
            offsets[index] = Some(CharSpan { start, end: cursor });
            continue;
        }

        let piece = vocab.strip_continuation(token);
        let start = cursor;
        for pc in piece.chars() {
            if cursor >= ctx.len() || !char_eq_fold(ctx[cursor], pc) {
                return Err(OffsetError::Misaligned {
                    index,
                    token: token.clone(),
                });
            }
            cursor += 1;
        }
        offsets[index] = Some(CharSpan { start, end: cursor });
    }

    debug!(mapped = offsets.iter().filter(|o| o.is_some()).count());
    Ok(offsets)
}

/// Recover the original-context substring spanned by tokens `start..=end`.
///
/// Both endpoints must carry a character range; question and special
/// positions are rejected rather than producing garbage text.
pub fn span_text(
    context: &str,
    offsets: &[Option<CharSpan>],
    start: usize,
    end: usize,
) -> Result<String, OffsetError> {
    let len = offsets.len();
    if start >= len {
        return Err(OffsetError::IndexOutOfBounds { index: start, len });
    }
    if end >= len {
        return Err(OffsetError::IndexOutOfBounds { index: end, len });
    }
    let first = offsets[start].ok_or(OffsetError::NoCharRange { index: start })?;
    let last = offsets[end].ok_or(OffsetError::NoCharRange { index: end })?;
    let from = first.start;
    let to = last.end.max(from);
    Ok(context.chars().skip(from).take(to - from).collect())
}

/// Reassemble sub-word pieces into display text: continuations concatenate
/// onto the preceding piece, independent tokens are joined by single spaces.
///
/// This is the fallback recovery path for callers without the original
/// context; it loses the context's original spacing and casing.
pub fn join_pieces<'a, I>(vocab: &Vocab, pieces: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut out = String::new();
    for piece in pieces {
        if vocab.is_continuation(piece) {
            out.push_str(vocab.strip_continuation(piece));
        } else {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(piece);
        }
    }
    out
}

fn char_eq_fold(a: char, b: char) -> bool {
    a == b || a.to_lowercase().eq(b.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    /// `[CLS] q [SEP] <context tokens> [SEP]`, everything valid.
    fn example(context_tokens: &[&str], context: &str) -> EncodedExample {
        let vocab = Vocab::bert_uncased();
        let mut tokens = vec!["[CLS]".to_string(), "q".to_string(), "[SEP]".to_string()];
        let mut segment_ids = vec![0u8, 0, 0];
        for t in context_tokens {
            tokens.push(t.to_string());
            segment_ids.push(1);
        }
        tokens.push("[SEP]".to_string());
        segment_ids.push(1);
        let valid_length = tokens.len();
        EncodedExample::new("t", tokens, segment_ids, valid_length, context, &vocab)
            .expect("alignment should succeed")
    }

    #[test]
    fn test_map_basic() {
        let ex = example(&["the", "cat", "sat"], "The cat sat");
        // [CLS], "q", [SEP] carry no range
        assert_eq!(ex.offsets[0], None);
        assert_eq!(ex.offsets[1], None);
        assert_eq!(ex.offsets[2], None);
        assert_eq!(ex.offsets[3], Some(CharSpan { start: 0, end: 3 }));
        assert_eq!(ex.offsets[4], Some(CharSpan { start: 4, end: 7 }));
        assert_eq!(ex.offsets[5], Some(CharSpan { start: 8, end: 11 }));
        // Trailing [SEP]
        assert_eq!(ex.offsets[6], None);
    }

    #[test]
    fn test_map_continuations() {
        let ex = example(&["the", "una", "##ffa", "##ble", "man"], "The unaffable man");
        assert_eq!(ex.offsets[4], Some(CharSpan { start: 4, end: 7 }));
        assert_eq!(ex.offsets[5], Some(CharSpan { start: 7, end: 10 }));
        assert_eq!(ex.offsets[6], Some(CharSpan { start: 10, end: 13 }));
        assert_eq!(ex.span_text(4, 6).unwrap(), "unaffable");
    }

    #[test]
    fn test_map_case_insensitive() {
        let ex = example(&["denver", "broncos"], "Denver Broncos");
        assert_eq!(ex.span_text(3, 4).unwrap(), "Denver Broncos");
    }

    #[test]
    fn test_map_punctuation() {
        let ex = example(&["levi", "'", "s", "stadium"], "Levi's Stadium");
        assert_eq!(ex.span_text(3, 6).unwrap(), "Levi's Stadium");
        assert_eq!(ex.span_text(3, 5).unwrap(), "Levi's");
    }

    #[test]
    fn test_map_unknown_token() {
        let ex = example(&["the", "[UNK]", "cat"], "The zzyzx cat");
        assert_eq!(ex.offsets[4], Some(CharSpan { start: 4, end: 9 }));
        assert_eq!(ex.span_text(3, 5).unwrap(), "The zzyzx cat");
    }

    #[test]
    fn test_map_misaligned() {
        let vocab = Vocab::bert_uncased();
        let tokens = toks(&["[CLS]", "[SEP]", "dog"]);
        let err = EncodedExample::new("t", tokens, vec![0, 0, 1], 3, "The cat", &vocab)
            .expect_err("token does not occur in context");
        assert!(matches!(err, OffsetError::Misaligned { index: 2, .. }));
    }

    #[test]
    fn test_map_padding_stays_unmapped() {
        let vocab = Vocab::bert_uncased();
        let tokens = toks(&["[CLS]", "[SEP]", "cat", "[SEP]", "[PAD]", "[PAD]"]);
        let ex =
            EncodedExample::new("t", tokens, vec![0, 0, 1, 1, 1, 1], 4, "cat", &vocab).unwrap();
        assert!(ex.offsets[2].is_some());
        assert_eq!(ex.offsets[4], None);
        assert_eq!(ex.offsets[5], None);
    }

    #[test]
    fn test_shape_mismatch() {
        let vocab = Vocab::bert_uncased();
        let err = EncodedExample::new("t", toks(&["a", "b"]), vec![0], 2, "a b", &vocab)
            .expect_err("segment table too short");
        assert!(matches!(err, OffsetError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_span_text_errors() {
        let ex = example(&["the", "cat"], "The cat");
        let err = ex.span_text(3, 99).unwrap_err();
        assert!(matches!(
            err,
            OffsetError::IndexOutOfBounds { index: 99, .. }
        ));
        // [CLS] position has no range
        let err = ex.span_text(0, 3).unwrap_err();
        assert!(matches!(err, OffsetError::NoCharRange { index: 0 }));
    }

    #[test]
    fn test_span_text_deterministic() {
        let ex = example(&["the", "cat", "sat"], "The cat sat");
        let a = ex.span_text(3, 5).unwrap();
        let b = ex.span_text(3, 5).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, "The cat sat");
    }

    #[test]
    fn test_join_pieces() {
        let vocab = Vocab::bert_uncased();
        assert_eq!(
            join_pieces(&vocab, ["una", "##ffa", "##ble", "man"]),
            "unaffable man"
        );
        assert_eq!(join_pieces(&vocab, ["denver", "broncos"]), "denver broncos");
        assert_eq!(join_pieces(&vocab, []), "");
    }

    #[test]
    fn test_valid_length_clamped() {
        let vocab = Vocab::bert_uncased();
        let ex = EncodedExample::new("t", toks(&["[CLS]"]), vec![0], 99, "x", &vocab).unwrap();
        assert_eq!(ex.valid_length, 1);
    }
}
