//! Shared fixtures for decoder tests.

use crate::model::{InferenceError, ModelOutput, QaModel};
use crate::offsets::EncodedExample;
use crate::vocab::Vocab;

/// The SQuAD Super Bowl 50 paragraph used by the end-to-end scenarios.
pub(crate) const SUPER_BOWL_CONTEXT: &str = "Super Bowl 50 was an American football game \
to determine the champion of the National Football League (NFL) for the 2015 season. \
The American Football Conference (AFC) champion Denver Broncos defeated the National \
Football Conference (NFC) champion Carolina Panthers 24-10 to earn their third Super \
Bowl title. The game was played on February 7, 2016, at Levi's Stadium in the San \
Francisco Bay Area at Santa Clara, California.";

/// Minimal lowercasing whitespace + punctuation splitter, standing in for
/// the external wordpiece tokenizer. Punctuation becomes single-char tokens.
pub(crate) fn basic_tokenize(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut cur = String::new();
    for c in text.chars() {
        if c.is_whitespace() {
            if !cur.is_empty() {
                out.push(std::mem::take(&mut cur));
            }
        } else if c.is_alphanumeric() {
            cur.extend(c.to_lowercase());
        } else {
            if !cur.is_empty() {
                out.push(std::mem::take(&mut cur));
            }
            out.push(c.to_string());
        }
    }
    if !cur.is_empty() {
        out.push(cur);
    }
    out
}

/// Encode a question-context pair the BERT way:
/// `[CLS] question [SEP] context [SEP]`, segment 1 on the context side.
pub(crate) fn encode_example(id: &str, question: &str, context: &str) -> EncodedExample {
    let vocab = Vocab::bert_uncased();
    let mut tokens = vec![vocab.cls().to_string()];
    let mut segment_ids = vec![0u8];
    for t in basic_tokenize(question) {
        tokens.push(t);
        segment_ids.push(0);
    }
    tokens.push(vocab.sep().to_string());
    segment_ids.push(0);
    for t in basic_tokenize(context) {
        tokens.push(t);
        segment_ids.push(1);
    }
    tokens.push(vocab.sep().to_string());
    segment_ids.push(1);
    let valid_length = tokens.len();
    EncodedExample::new(id, tokens, segment_ids, valid_length, context, &vocab)
        .expect("fixture context must align")
}

/// Token span (inclusive) whose recovered text equals `text`.
pub(crate) fn span_for(example: &EncodedExample, text: &str) -> (usize, usize) {
    for start in 0..example.valid_length {
        if example.offsets[start].is_none() {
            continue;
        }
        for end in start..example.valid_length {
            if example.offsets[end].is_none() {
                continue;
            }
            if example
                .span_text(start, end)
                .map(|t| t == text)
                .unwrap_or(false)
            {
                return (start, end);
            }
        }
    }
    panic!("no token span recovers {text:?}");
}

/// Flat zero logits with a peak on the given answer span.
pub(crate) fn peaked_logits(example: &EncodedExample, answer: &str, peak: f32) -> ModelOutput {
    let (start, end) = span_for(example, answer);
    let mut start_logits = vec![0.0f32; example.valid_length];
    let mut end_logits = vec![0.0f32; example.valid_length];
    start_logits[start] = peak;
    end_logits[end] = peak;
    ModelOutput {
        start_logits,
        end_logits,
    }
}

/// Model collaborator returning a canned output, for exercising the trait
/// seam end-to-end.
pub(crate) struct FixtureModel {
    pub output: ModelOutput,
}

impl QaModel for FixtureModel {
    fn infer(
        &self,
        _tokens: &[String],
        _segment_ids: &[u8],
        _valid_length: usize,
    ) -> Result<ModelOutput, InferenceError> {
        Ok(self.output.clone())
    }
}
