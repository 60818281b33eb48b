use serde::Serialize;

use super::{enumerate, filter, rank, DecodeConfig, DecodeError};
use crate::model::ModelOutput;
use crate::offsets::EncodedExample;

/// Full diagnostic result for a single decode.
#[derive(Debug, Serialize)]
pub struct ExplainResult {
    pub example_id: String,
    pub sequence_length: usize,
    pub context_token_count: usize,
    /// Sentinel score, present when no-answer is allowed.
    pub null_score: Option<f32>,
    /// Deduplicated spans sorted by score, best first.
    pub spans: Vec<ExplainSpan>,
}

/// A surviving span with its full score breakdown.
#[derive(Debug, Serialize)]
pub struct ExplainSpan {
    pub start: usize,
    pub end: usize,
    pub start_logit: f32,
    pub end_logit: f32,
    pub score: f32,
    pub text: String,
    /// Whether the span made the retained top-nbest set.
    pub retained: bool,
    /// Normalized confidence; only retained spans carry one.
    pub probability: Option<f32>,
}

impl ExplainResult {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Run the decode stages and report every surviving span with its scores,
/// including the ones ranking discards. For debugging ranking regressions;
/// the span table matches the positive-span ranking of
/// [`SpanDecoder::decode`](super::SpanDecoder::decode).
pub fn explain(
    example: &EncodedExample,
    output: &ModelOutput,
    config: &DecodeConfig,
) -> Result<ExplainResult, DecodeError> {
    config.validate()?;

    let candidates = enumerate::enumerate_spans(
        example,
        &output.start_logits,
        &output.end_logits,
        config.max_answer_len,
    );
    let mut spans = filter::filter_spans(example, candidates)?;
    spans.sort_by(|a, b| b.1.score.total_cmp(&a.1.score));

    let retained = spans.len().min(config.nbest);
    let retained_scores: Vec<f32> = spans[..retained].iter().map(|s| s.1.score).collect();
    let probs = rank::softmax(&retained_scores);

    let null_score = if config.allow_no_answer && !output.is_empty() {
        Some(output.start_logits[0] + output.end_logits[0])
    } else {
        None
    };

    let spans = spans
        .into_iter()
        .enumerate()
        .map(|(rank_idx, (text, cand))| ExplainSpan {
            start: cand.start,
            end: cand.end,
            start_logit: output.start_logits.get(cand.start).copied().unwrap_or(0.0),
            end_logit: output.end_logits.get(cand.end).copied().unwrap_or(0.0),
            score: cand.score,
            text,
            retained: rank_idx < retained,
            probability: probs.get(rank_idx).copied(),
        })
        .collect();

    Ok(ExplainResult {
        example_id: example.id.clone(),
        sequence_length: example.valid_length,
        context_token_count: example.offsets.iter().filter(|o| o.is_some()).count(),
        null_score,
        spans,
    })
}
