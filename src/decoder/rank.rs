use serde::Serialize;
use tracing::{debug, debug_span};

use super::filter::TextSpan;
use super::DecodeConfig;

/// Final output unit: answer text (a substring of the original context,
/// empty for the no-answer sentinel) and its normalized confidence.
///
/// Probabilities are relative confidence among the retained candidates,
/// not absolute: the softmax normalizes over the retained set only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub text: String,
    pub probability: f32,
}

/// Numerically stable softmax: subtract the max before exponentiating.
pub(super) fn softmax(scores: &[f32]) -> Vec<f32> {
    if scores.is_empty() {
        return Vec::new();
    }
    let max = scores.iter().fold(f32::NEG_INFINITY, |m, &s| m.max(s));
    let exps: Vec<f32> = scores.iter().map(|&s| (s - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Sort spans by score descending, retain the top `nbest`, normalize over
/// the retained set, and surface the top `max_results`.
///
/// When a sentinel score is present, "no answer" (empty text) is emitted
/// first only if its margin over the best span clears the threshold; the
/// sentinel then joins the softmax pool so its confidence is comparable.
pub(super) fn rank_spans(
    mut spans: Vec<TextSpan>,
    null_score: Option<f32>,
    config: &DecodeConfig,
) -> Vec<Prediction> {
    let _span = debug_span!("rank_spans", spans_in = spans.len()).entered();

    spans.sort_by(|a, b| b.1.score.total_cmp(&a.1.score));
    spans.truncate(config.nbest);

    let null_wins = match null_score {
        Some(null) => match spans.first() {
            Some(best) => null - best.1.score > config.null_threshold,
            None => true,
        },
        None => false,
    };

    let mut scores: Vec<f32> = Vec::with_capacity(spans.len() + 1);
    if null_wins {
        scores.push(null_score.unwrap_or_default());
    }
    scores.extend(spans.iter().map(|s| s.1.score));
    let probs = softmax(&scores);

    let mut predictions: Vec<Prediction> = Vec::with_capacity(scores.len());
    let mut probs = probs.into_iter();
    if null_wins {
        predictions.push(Prediction {
            text: String::new(),
            probability: probs.next().unwrap_or_default(),
        });
    }
    for ((text, _), probability) in spans.into_iter().zip(probs) {
        predictions.push(Prediction { text, probability });
    }

    predictions.truncate(config.max_results);
    debug!(
        predictions_out = predictions.len(),
        top_probability = predictions.first().map(|p| p.probability)
    );
    predictions
}
