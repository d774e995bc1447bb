//! Speaker embedding extraction.
//!
//! The embedding network consumes 80-band log mel features and returns a
//! fixed-length voice-print vector. The network is consumed through the
//! narrow [`EmbeddingModel`] trait so alternative runtimes can be swapped in
//! without touching the clustering or orchestration code.

use std::path::Path;

use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::Value,
};

use super::mel::{MelConfig, MelSpectrogram};
use super::DiarizationError;

/// Minimum input for a reliable embedding: 500 ms at 16 kHz.
/// Shorter segments fail extraction, which callers treat as recoverable.
pub const MIN_EMBED_SAMPLES: usize = 8000;

/// A model that maps an audio window to a speaker embedding vector.
pub trait EmbeddingModel {
    fn infer(&mut self, samples: &[f32]) -> Result<Vec<f32>, DiarizationError>;
}

/// ONNX-backed embedding model (mel frontend + inference session)
pub struct OnnxEmbeddingModel {
    session: Session,
    mel: MelSpectrogram,
}

impl OnnxEmbeddingModel {
    /// Load the embedding network from an ONNX file.
    pub fn load(model_path: &Path) -> Result<Self, DiarizationError> {
        if !model_path.exists() {
            return Err(DiarizationError::ModelNotFound(model_path.to_path_buf()));
        }

        let session = Session::builder()
            .map_err(|e| DiarizationError::ModelLoadError(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| DiarizationError::ModelLoadError(e.to_string()))?
            .commit_from_file(model_path)
            .map_err(|e| DiarizationError::ModelLoadError(e.to_string()))?;

        tracing::info!("Loaded speaker embedding model from {:?}", model_path);

        Ok(Self {
            session,
            mel: MelSpectrogram::new(MelConfig::default()),
        })
    }
}

impl EmbeddingModel for OnnxEmbeddingModel {
    fn infer(&mut self, samples: &[f32]) -> Result<Vec<f32>, DiarizationError> {
        if samples.len() < MIN_EMBED_SAMPLES {
            return Err(DiarizationError::InvalidAudio(format!(
                "segment too short for embedding extraction: {} samples (min: {})",
                samples.len(),
                MIN_EMBED_SAMPLES
            )));
        }

        let mel_spec = self.mel.compute(samples)?;

        let n_frames = mel_spec.len();
        let n_mels = self.mel.n_mels();

        // Network input shape: [batch, n_frames, n_mels]
        let input_data: Vec<f32> = mel_spec.into_iter().flatten().collect();
        let input_shape = [1_usize, n_frames, n_mels];
        let input_tensor = Value::from_array((input_shape, input_data))
            .map_err(|e: ort::Error| DiarizationError::InferenceError(e.to_string()))?;

        let outputs = self
            .session
            .run(ort::inputs![input_tensor])
            .map_err(|e| DiarizationError::InferenceError(e.to_string()))?;

        // Output shape: [batch, embedding_dim]
        let output = outputs
            .iter()
            .next()
            .ok_or_else(|| DiarizationError::InferenceError("no output tensor".to_string()))?;

        let embedding_data = output
            .1
            .try_extract_tensor::<f32>()
            .map_err(|e| DiarizationError::InferenceError(e.to_string()))?;

        let embedding: Vec<f32> = embedding_data.1.iter().copied().collect();

        if embedding.is_empty() {
            return Err(DiarizationError::InferenceError(
                "empty embedding output".to_string(),
            ));
        }

        Ok(embedding)
    }
}
