//! Model collaborator interface.
//!
//! The decoder never sees a concrete model type; it depends on one
//! operation producing start/end logits for an encoded sequence. Whatever
//! serving backend is wired in implements [`QaModel`].

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("inference failed: {0}")]
    Backend(String),
    #[error("logit vectors have mismatched lengths: start {start}, end {end}")]
    LogitShape { start: usize, end: usize },
}

/// Raw output of one inference call: one start and one end logit per token
/// position. Consumed immediately by the decoder.
#[derive(Debug, Clone)]
pub struct ModelOutput {
    pub start_logits: Vec<f32>,
    pub end_logits: Vec<f32>,
}

impl ModelOutput {
    pub fn new(start_logits: Vec<f32>, end_logits: Vec<f32>) -> Result<Self, InferenceError> {
        if start_logits.len() != end_logits.len() {
            return Err(InferenceError::LogitShape {
                start: start_logits.len(),
                end: end_logits.len(),
            });
        }
        Ok(Self {
            start_logits,
            end_logits,
        })
    }

    /// Sequence length covered by the logits.
    pub fn len(&self) -> usize {
        self.start_logits.len().min(self.end_logits.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Extract logits from a pair of 1-D candle tensors.
    #[cfg(feature = "candle")]
    pub fn from_tensors(
        start: &candle_core::Tensor,
        end: &candle_core::Tensor,
    ) -> anyhow::Result<Self> {
        let start_logits: Vec<f32> = start
            .to_vec1()
            .map_err(|e| anyhow::anyhow!("start logits to_vec1 failed: {e}"))?;
        let end_logits: Vec<f32> = end
            .to_vec1()
            .map_err(|e| anyhow::anyhow!("end logits to_vec1 failed: {e}"))?;
        Self::new(start_logits, end_logits).map_err(anyhow::Error::from)
    }
}

/// The one operation the decoder needs from a question-answering model.
pub trait QaModel: Send + Sync {
    /// Produce start/end logits for an encoded sequence. The returned
    /// vectors cover at least `valid_length` positions.
    fn infer(
        &self,
        tokens: &[String],
        segment_ids: &[u8],
        valid_length: usize,
    ) -> Result<ModelOutput, InferenceError>;
}
