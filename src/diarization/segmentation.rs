//! Speaker-change detection.
//!
//! The segmentation network scores each frame of a short audio window with
//! the probability that a speaker change occurs there. [`ChangePointDetector`]
//! slides that window over the whole buffer, picks local probability maxima
//! above a sensitivity threshold and reduces them to a sorted, deduplicated
//! list of change timestamps.

use std::path::Path;

use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::Value,
};

use super::DiarizationError;

/// Sliding-window geometry for the segmentation network
const WINDOW_SECS: f32 = 3.2;
const HOP_SECS: f32 = 1.6;

/// Change points closer than this are considered duplicates of one boundary
const MIN_CHANGE_GAP_SECS: f32 = 0.5;

/// A model that maps an audio window to per-frame change probabilities.
pub trait SegmentationModel {
    fn infer(&mut self, window: &[f32]) -> Result<Vec<f32>, DiarizationError>;
}

/// ONNX-backed segmentation model
pub struct OnnxSegmentationModel {
    session: Session,
}

impl OnnxSegmentationModel {
    /// Load the segmentation network from an ONNX file.
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

        tracing::info!("Loaded segmentation model from {:?}", model_path);

        Ok(Self { session })
    }
}

impl SegmentationModel for OnnxSegmentationModel {
    fn infer(&mut self, window: &[f32]) -> Result<Vec<f32>, DiarizationError> {
        if window.is_empty() {
            return Err(DiarizationError::InvalidAudio("empty window".to_string()));
        }

        // The network is trained on peak-normalized input
        let mut input_data = window.to_vec();
        normalize_peak(&mut input_data);

        // Network input shape: [batch, channels, samples]
        let input_shape = [1_usize, 1, input_data.len()];
        let input_tensor = Value::from_array((input_shape, input_data))
            .map_err(|e: ort::Error| DiarizationError::InferenceError(e.to_string()))?;

        let outputs = self
            .session
            .run(ort::inputs![input_tensor])
            .map_err(|e| DiarizationError::InferenceError(e.to_string()))?;

        let output = outputs
            .iter()
            .next()
            .ok_or_else(|| DiarizationError::InferenceError("no output tensor".to_string()))?;

        let probabilities = output
            .1
            .try_extract_tensor::<f32>()
            .map_err(|e| DiarizationError::InferenceError(e.to_string()))?;

        // Flatten whatever frame layout the network emits
        Ok(probabilities.1.iter().copied().collect())
    }
}

/// Scale the window so its absolute peak is 1.0. Near-silent windows are
/// left untouched to avoid amplifying noise.
fn normalize_peak(samples: &mut [f32]) {
    let max = samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
    if max > 1e-6 {
        for s in samples.iter_mut() {
            *s /= max;
        }
    }
}

/// Turns segmentation-model output into a sorted list of change timestamps.
pub struct ChangePointDetector {
    window_size: usize,
    hop_size: usize,
    sample_rate: u32,
}

impl ChangePointDetector {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            window_size: (WINDOW_SECS * sample_rate as f32) as usize,
            hop_size: (HOP_SECS * sample_rate as f32) as usize,
            sample_rate,
        }
    }

    /// Detect speaker-change timestamps (seconds) in the buffer.
    ///
    /// An empty result is valid and means no change was found anywhere.
    pub fn detect(
        &self,
        model: &mut dyn SegmentationModel,
        audio: &[f32],
        sensitivity: f32,
    ) -> Result<Vec<f32>, DiarizationError> {
        let mut change_points = Vec::new();

        let total_windows = if audio.len() > self.window_size {
            (audio.len() - self.window_size) / self.hop_size + 1
        } else {
            0
        };

        let mut start = 0;
        let mut processed = 0usize;
        while start + self.window_size < audio.len() {
            let window = &audio[start..start + self.window_size];
            let probabilities = model.infer(window)?;

            self.collect_peaks(&probabilities, sensitivity, start, &mut change_points);

            processed += 1;
            if processed % 10 == 0 {
                tracing::debug!(
                    "segmentation progress: {:.1}%",
                    processed as f32 / total_windows.max(1) as f32 * 100.0
                );
            }

            start += self.hop_size;
        }

        change_points.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let deduplicated = dedup_close(&change_points, MIN_CHANGE_GAP_SECS);

        tracing::debug!(
            "found {} change points ({} before deduplication)",
            deduplicated.len(),
            change_points.len()
        );

        Ok(deduplicated)
    }

    /// Local probability maxima above the sensitivity become candidates.
    fn collect_peaks(
        &self,
        probabilities: &[f32],
        sensitivity: f32,
        window_start: usize,
        out: &mut Vec<f32>,
    ) {
        if probabilities.len() < 3 {
            return;
        }

        let samples_per_frame = self.window_size / probabilities.len();
        for i in 1..probabilities.len() - 1 {
            if probabilities[i] > sensitivity
                && probabilities[i] > probabilities[i - 1]
                && probabilities[i] > probabilities[i + 1]
            {
                let time =
                    (window_start + i * samples_per_frame) as f32 / self.sample_rate as f32;
                out.push(time);
            }
        }
    }
}

/// Drop change points that fall within `min_gap` seconds of the previous
/// kept one. Input must be sorted.
fn dedup_close(sorted: &[f32], min_gap: f32) -> Vec<f32> {
    let mut kept: Vec<f32> = Vec::with_capacity(sorted.len());
    for &t in sorted {
        if kept.last().map_or(true, |&prev| t - prev > min_gap) {
            kept.push(t);
        }
    }
    kept
}
