use crate::preprocess::Tensor;
use async_trait::async_trait;
use ndarray::{Array4, Axis};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Model file not found: {0:?}")]
    ModelNotFound(PathBuf),
    #[error("Invalid model configuration: {0}")]
    InvalidConfig(String),
    #[error("Failed to create inference session: {0}")]
    Runtime(String),
}

#[derive(Error, Debug)]
pub enum PredictionError {
    #[error("Model not loaded. Cannot perform prediction.")]
    NotLoaded,
    #[error("Cannot predict on an empty batch")]
    EmptyBatch,
    #[error("Tensor {index} has shape {actual:?}, expected {expected:?}")]
    ShapeMismatch {
        index: usize,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
    #[error("Model returned {actual} scores for a batch of {expected}")]
    ScoreCountMismatch { expected: usize, actual: usize },
    #[error("Model returned score {score} for frame {index}, outside [0, 1]")]
    InvalidScore { index: usize, score: f32 },
    #[error("Inference failed: {0}")]
    Runtime(String),
}

/// A binary classifier producing one score per input, the probability of the
/// negative class.
///
/// Implementations are shared by every session and must not keep any
/// per-session state between calls.
#[async_trait]
pub trait Classifier: Send + Sync + 'static {
    /// Loads, or reloads, the underlying model. Until the first successful
    /// call, `is_ready` returns false.
    fn load(&self) -> Result<(), LoadError>;

    fn is_ready(&self) -> bool;

    /// Scores are returned in the same order as `batch`.
    async fn predict(&self, batch: Vec<Tensor>) -> Result<Vec<f32>, PredictionError>;
}

/// Stacks `(H, W, C)` tensors along a new leading axis.
pub fn stack_batch(batch: &[Tensor]) -> Result<Array4<f32>, PredictionError> {
    let first = batch.first().ok_or(PredictionError::EmptyBatch)?;
    let expected = first.shape();

    for (index, tensor) in batch.iter().enumerate().skip(1) {
        if tensor.shape() != expected {
            return Err(PredictionError::ShapeMismatch {
                index,
                expected: expected.to_vec(),
                actual: tensor.shape().to_vec(),
            });
        }
    }

    let views: Vec<_> = batch.iter().map(|tensor| tensor.view()).collect();
    ndarray::stack(Axis(0), &views).map_err(|e| PredictionError::Runtime(e.to_string()))
}

/// Checks that `scores` holds exactly one probability per frame of the batch.
pub fn validate_scores(scores: &[f32], batch_size: usize) -> Result<(), PredictionError> {
    if scores.len() != batch_size {
        return Err(PredictionError::ScoreCountMismatch {
            expected: batch_size,
            actual: scores.len(),
        });
    }

    match scores
        .iter()
        .position(|score| !score.is_finite() || !(0.0..=1.0).contains(score))
    {
        Some(index) => Err(PredictionError::InvalidScore {
            index,
            score: scores[index],
        }),
        None => Ok(()),
    }
}
