//! Answer-span decoding: enumeration, filtering, and ranking of candidate
//! spans from start/end logits.
//!
//! The pipeline is a pure function of (logits, encoded example): enumerate
//! bounded spans over context positions, score by summed logits, drop
//! invalid and duplicate spans, then rank with softmax-normalized
//! confidences. Decoding one example is independent of any other, so
//! callers may batch in any order.

mod enumerate;
pub mod explain;
mod filter;
mod rank;

#[cfg(test)]
pub(crate) mod testutil;

#[cfg(test)]
mod tests;

use std::collections::BTreeMap;

use tracing::{debug, debug_span};

use crate::model::{InferenceError, ModelOutput, QaModel};
use crate::offsets::{EncodedExample, OffsetError};
use crate::settings::settings;
use crate::vocab::Vocab;

pub use enumerate::Candidate;
pub use rank::Prediction;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error(transparent)]
    Offset(#[from] OffsetError),
    #[error(transparent)]
    Inference(#[from] InferenceError),
    #[error("no valid answer span survived filtering")]
    EmptyCandidates,
    #[error("invalid value for {field}: {reason}")]
    InvalidConfig {
        field: &'static str,
        reason: &'static str,
    },
}

/// Decoding parameters. `Default` snapshots the global settings; callers
/// needing different bounds construct their own.
#[derive(Debug, Clone)]
pub struct DecodeConfig {
    /// Maximum answer span length in tokens (K).
    pub max_answer_len: usize,
    /// Candidates retained internally; the softmax normalizes over these.
    pub nbest: usize,
    /// Predictions surfaced to callers.
    pub max_results: usize,
    /// Whether the no-answer sentinel may be surfaced at all.
    pub allow_no_answer: bool,
    /// Margin the sentinel score must clear over the best span before
    /// "no answer" outranks a text span.
    pub null_threshold: f32,
}

impl DecodeConfig {
    pub fn from_settings() -> Self {
        let d = &settings().decoder;
        Self {
            max_answer_len: d.max_answer_len,
            nbest: d.nbest,
            max_results: d.max_results,
            allow_no_answer: d.allow_no_answer,
            null_threshold: d.null_threshold,
        }
    }

    pub fn validate(&self) -> Result<(), DecodeError> {
        if self.max_answer_len == 0 {
            return Err(DecodeError::InvalidConfig {
                field: "max_answer_len",
                reason: "must be positive",
            });
        }
        if self.nbest == 0 {
            return Err(DecodeError::InvalidConfig {
                field: "nbest",
                reason: "must be positive",
            });
        }
        if self.max_results == 0 {
            return Err(DecodeError::InvalidConfig {
                field: "max_results",
                reason: "must be positive",
            });
        }
        if !self.null_threshold.is_finite() {
            return Err(DecodeError::InvalidConfig {
                field: "null_threshold",
                reason: "must be finite",
            });
        }
        Ok(())
    }
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self::from_settings()
    }
}

/// Stateless decoder turning per-token logits into ranked answer strings.
pub struct SpanDecoder {
    vocab: Vocab,
    config: DecodeConfig,
}

impl SpanDecoder {
    pub fn new(vocab: Vocab, config: DecodeConfig) -> Result<Self, DecodeError> {
        config.validate()?;
        Ok(Self { vocab, config })
    }

    pub fn vocab(&self) -> &Vocab {
        &self.vocab
    }

    pub fn config(&self) -> &DecodeConfig {
        &self.config
    }

    /// Decode one example's logits into ranked predictions.
    ///
    /// Returns `EmptyCandidates` when no valid span survives and the
    /// configuration does not allow a no-answer result; the caller decides
    /// whether that becomes an error response or a default answer.
    pub fn decode(
        &self,
        example: &EncodedExample,
        output: &ModelOutput,
    ) -> Result<Vec<Prediction>, DecodeError> {
        let _span = debug_span!("decode", id = %example.id).entered();

        let candidates = enumerate::enumerate_spans(
            example,
            &output.start_logits,
            &output.end_logits,
            self.config.max_answer_len,
        );
        let spans = filter::filter_spans(example, candidates)?;

        // The leading classifier token scores the no-answer sentinel.
        let has_sentinel = example
            .tokens
            .first()
            .is_some_and(|t| t == self.vocab.cls());
        let null_score = if self.config.allow_no_answer && has_sentinel && !output.is_empty() {
            Some(output.start_logits[0] + output.end_logits[0])
        } else {
            None
        };

        if spans.is_empty() && null_score.is_none() {
            return Err(DecodeError::EmptyCandidates);
        }

        let predictions = rank::rank_spans(spans, null_score, &self.config);
        debug!(prediction_count = predictions.len());
        Ok(predictions)
    }

    /// Run the model collaborator, then decode its output.
    pub fn decode_with_model(
        &self,
        model: &dyn QaModel,
        example: &EncodedExample,
    ) -> Result<Vec<Prediction>, DecodeError> {
        let output = model.infer(&example.tokens, &example.segment_ids, example.valid_length)?;
        self.decode(example, &output)
    }

    /// Decode a batch, keyed by example id. Examples are independent; the
    /// first failing decode aborts the batch.
    pub fn decode_batch<'a, I>(
        &self,
        batch: I,
    ) -> Result<BTreeMap<String, Vec<Prediction>>, DecodeError>
    where
        I: IntoIterator<Item = (&'a EncodedExample, &'a ModelOutput)>,
    {
        let mut results = BTreeMap::new();
        for (example, output) in batch {
            let predictions = self.decode(example, output)?;
            results.insert(example.id.clone(), predictions);
        }
        Ok(results)
    }
}
