use tracing::{debug, debug_span};

use crate::offsets::EncodedExample;

/// A candidate answer span: inclusive token indices plus the summed
/// start/end logit score. Fixed-shape so the enumerate/filter/rank pipeline
/// stays allocation-free per item.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub start: usize,
    pub end: usize,
    pub score: f32,
}

/// Enumerate every (start, end) pair with `start <= end`,
/// `end - start + 1 <= max_answer_len`, and both positions mapped to
/// context text. Score = `start_logit[start] + end_logit[end]`.
///
/// The length bound keeps this O(L·K) instead of O(L²); dropping it would
/// both degrade latency and favor maximal-length noise spans. Returns the
/// candidate list unsorted.
pub(super) fn enumerate_spans(
    example: &EncodedExample,
    start_logits: &[f32],
    end_logits: &[f32],
    max_answer_len: usize,
) -> Vec<Candidate> {
    let len = example
        .valid_length
        .min(start_logits.len())
        .min(end_logits.len());
    let _span = debug_span!("enumerate_spans", len, max_answer_len).entered();

    let mut candidates = Vec::new();
    for start in 0..len {
        if example.offsets[start].is_none() {
            continue;
        }
        let limit = start.saturating_add(max_answer_len).min(len);
        for end in start..limit {
            if example.offsets[end].is_none() {
                continue;
            }
            candidates.push(Candidate {
                start,
                end,
                score: start_logits[start] + end_logits[end],
            });
        }
    }

    debug!(candidate_count = candidates.len());
    candidates
}
