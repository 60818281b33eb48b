use std::collections::HashMap;

use tracing::{debug, debug_span};

use super::Candidate;
use crate::offsets::{EncodedExample, OffsetError};

/// A candidate paired with its recovered context text.
pub(super) type TextSpan = (String, Candidate);

/// Drop spans outside the valid context range and deduplicate spans that
/// recover identical text, keeping the preferred occurrence. Output order
/// follows first occurrence in the input, so the pass is deterministic and
/// idempotent.
pub(super) fn filter_spans(
    example: &EncodedExample,
    candidates: Vec<Candidate>,
) -> Result<Vec<TextSpan>, OffsetError> {
    let _span = debug_span!("filter_spans", candidates_in = candidates.len()).entered();

    let mut index_by_text: HashMap<String, usize> = HashMap::new();
    let mut kept: Vec<TextSpan> = Vec::new();

    for cand in candidates {
        // Re-check bounds: callers may construct candidates without
        // going through enumeration.
        if cand.start > cand.end || cand.end >= example.offsets.len() {
            continue;
        }
        if example.offsets[cand.start].is_none() || example.offsets[cand.end].is_none() {
            continue;
        }

        let text = example.span_text(cand.start, cand.end)?;
        match index_by_text.get(&text) {
            Some(&i) => {
                if prefer(&cand, &kept[i].1) {
                    kept[i].1 = cand;
                }
            }
            None => {
                index_by_text.insert(text.clone(), kept.len());
                kept.push((text, cand));
            }
        }
    }

    debug!(spans_out = kept.len());
    Ok(kept)
}

/// Dedup preference: higher score, then lower start index, then shorter span.
fn prefer(a: &Candidate, b: &Candidate) -> bool {
    if a.score != b.score {
        return a.score > b.score;
    }
    if a.start != b.start {
        return a.start < b.start;
    }
    (a.end - a.start) < (b.end - b.start)
}
