//! Speaker diarization pipeline.
//!
//! Takes a mono audio buffer and produces non-overlapping, time-ordered
//! segments, each attributed to a speaker identity discovered on the fly:
//! 1. Score speaker-change probabilities with an ONNX segmentation model
//! 2. Cut the buffer into segments at the detected change points
//! 3. Extract a speaker embedding per segment and cluster online

pub mod clustering;
pub mod config;
pub mod embedding;
pub mod engine;
pub mod mel;
pub mod segment;
pub mod segmentation;

#[cfg(test)]
mod pipeline_tests;

pub use config::DiarizeOptions;
pub use engine::DiarizationEngine;
pub use segment::AudioSegment;

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during diarization
#[derive(Debug, Error)]
pub enum DiarizationError {
    #[error("Model not found at path: {0}")]
    ModelNotFound(PathBuf),

    #[error("Failed to load ONNX model: {0}")]
    ModelLoadError(String),

    #[error("Model not initialized; call initialize() first")]
    ModelNotInitialized,

    #[error("ONNX inference failed: {0}")]
    InferenceError(String),

    #[error("Invalid audio input: {0}")]
    InvalidAudio(String),

    #[error("Mel spectrogram computation failed: {0}")]
    MelError(String),
}

/// Compute cosine similarity between two vectors: dot(a,b) / (|a| * |b|).
///
/// Returns 0.0 when either vector has (near-)zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "Vectors must have same length");
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a < 1e-10 || norm_b < 1e-10 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
