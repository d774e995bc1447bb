//! Pipeline orchestration.
//!
//! One engine instance owns both models for the lifetime of a run and drives
//! change-point detection, segment building and speaker clustering in order.
//! The run is single-threaded and synchronous; the clustering loop must stay
//! sequential because each assignment depends on the registry state built by
//! the previous ones.

use std::path::Path;

use tracing::{debug, error, info, warn};

use super::clustering::SpeakerClusterer;
use super::config::DiarizeOptions;
use super::embedding::{EmbeddingModel, OnnxEmbeddingModel};
use super::segment::{build_segments, AudioSegment};
use super::segmentation::{ChangePointDetector, OnnxSegmentationModel, SegmentationModel};
use super::DiarizationError;

/// Sensitivity applied to the segmentation posterior. Deliberately not tied
/// to the clustering threshold option, which governs speaker assignment only.
const SEGMENTATION_SENSITIVITY: f32 = 0.5;

/// Label for segments whose embedding extraction failed: the reserved
/// default speaker with a mid-range confidence.
const FALLBACK_SPEAKER_ID: i32 = 0;
const FALLBACK_CONFIDENCE: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    Initialized,
    Processing,
    Done,
    Failed,
}

/// Orchestrates one diarization run.
pub struct DiarizationEngine {
    segmenter: Option<Box<dyn SegmentationModel>>,
    embedder: Option<Box<dyn EmbeddingModel>>,
    state: EngineState,
}

impl Default for DiarizationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl DiarizationEngine {
    pub fn new() -> Self {
        Self {
            segmenter: None,
            embedder: None,
            state: EngineState::Uninitialized,
        }
    }

    /// Build an engine from pre-constructed models. This is the substitution
    /// seam for alternative inference runtimes and for tests.
    pub fn with_models(
        segmenter: Box<dyn SegmentationModel>,
        embedder: Box<dyn EmbeddingModel>,
    ) -> Self {
        Self {
            segmenter: Some(segmenter),
            embedder: Some(embedder),
            state: EngineState::Initialized,
        }
    }

    /// Load both ONNX models. Failure is fatal for the run.
    pub fn initialize(
        &mut self,
        segmentation_model: &Path,
        embedding_model: &Path,
    ) -> Result<(), DiarizationError> {
        info!("initializing diarization engine");

        let segmenter = OnnxSegmentationModel::load(segmentation_model).map_err(|e| {
            self.state = EngineState::Failed;
            e
        })?;
        let embedder = OnnxEmbeddingModel::load(embedding_model).map_err(|e| {
            self.state = EngineState::Failed;
            e
        })?;

        self.segmenter = Some(Box::new(segmenter));
        self.embedder = Some(Box::new(embedder));
        self.state = EngineState::Initialized;
        Ok(())
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Run the full pipeline and return the labeled segments.
    pub fn process_audio(
        &mut self,
        audio: &[f32],
        options: &DiarizeOptions,
    ) -> Result<Vec<AudioSegment>, DiarizationError> {
        self.process_audio_with_progress(audio, options, |_| {})
    }

    /// Run the full pipeline, reporting clustering progress (0-100) through
    /// the callback after each processed segment.
    ///
    /// Calling this before `initialize` is a programming error and returns
    /// `ModelNotInitialized`. A detection failure mid-run is logged and
    /// yields an empty result so the caller decides how to react.
    pub fn process_audio_with_progress(
        &mut self,
        audio: &[f32],
        options: &DiarizeOptions,
        mut on_progress: impl FnMut(f32),
    ) -> Result<Vec<AudioSegment>, DiarizationError> {
        let (segmenter, embedder) = match (&mut self.segmenter, &mut self.embedder) {
            (Some(segmenter), Some(embedder)) => (segmenter, embedder),
            _ => return Err(DiarizationError::ModelNotInitialized),
        };
        self.state = EngineState::Processing;

        info!(
            "processing audio: {} samples ({:.1} s)",
            audio.len(),
            audio.len() as f32 / options.sample_rate as f32
        );

        if audio.is_empty() {
            self.state = EngineState::Done;
            return Ok(Vec::new());
        }

        let detector = ChangePointDetector::new(options.sample_rate);
        let change_points = match detector.detect(segmenter.as_mut(), audio, SEGMENTATION_SENSITIVITY) {
            Ok(points) => points,
            Err(e) => {
                error!("speaker change detection failed: {}", e);
                self.state = EngineState::Failed;
                return Ok(Vec::new());
            }
        };
        debug!("detected {} speaker change points", change_points.len());

        let mut segments = build_segments(
            audio,
            &change_points,
            options.sample_rate,
            options.min_segment_duration,
        );
        debug!("created {} audio segments", segments.len());

        let total = segments.len();
        let mut clusterer = SpeakerClusterer::new(options.threshold, options.max_speakers);

        for (index, segment) in segments.iter_mut().enumerate() {
            let (speaker_id, confidence) = match embedder.infer(&segment.samples) {
                Ok(embedding) => clusterer.assign(&embedding),
                Err(e) => {
                    // One bad segment must not abort the whole run
                    warn!(
                        "embedding extraction failed for segment {} ({:.2}s-{:.2}s): {}; \
                         assigning default speaker",
                        index, segment.start_time, segment.end_time, e
                    );
                    (FALLBACK_SPEAKER_ID, FALLBACK_CONFIDENCE)
                }
            };
            segment.speaker_id = Some(speaker_id);
            segment.confidence = Some(confidence);

            on_progress((index + 1) as f32 / total as f32 * 100.0);
        }

        info!(
            "assigned {} speakers across {} segments",
            clusterer.speaker_count(),
            total
        );
        self.state = EngineState::Done;
        Ok(segments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoChanges;

    impl SegmentationModel for NoChanges {
        fn infer(&mut self, _window: &[f32]) -> Result<Vec<f32>, DiarizationError> {
            Ok(vec![0.0; 32])
        }
    }

    struct BrokenSegmenter;

    impl SegmentationModel for BrokenSegmenter {
        fn infer(&mut self, _window: &[f32]) -> Result<Vec<f32>, DiarizationError> {
            Err(DiarizationError::InferenceError("broken".to_string()))
        }
    }

    struct ConstantEmbedder;

    impl EmbeddingModel for ConstantEmbedder {
        fn infer(&mut self, _samples: &[f32]) -> Result<Vec<f32>, DiarizationError> {
            Ok(vec![1.0, 0.0, 0.0])
        }
    }

    struct BrokenEmbedder;

    impl EmbeddingModel for BrokenEmbedder {
        fn infer(&mut self, _samples: &[f32]) -> Result<Vec<f32>, DiarizationError> {
            Err(DiarizationError::InvalidAudio("too short".to_string()))
        }
    }

    #[test]
    fn test_process_before_initialize_fails() {
        let mut engine = DiarizationEngine::new();
        let result = engine.process_audio(&[0.0; 16000], &DiarizeOptions::default());
        assert!(matches!(result, Err(DiarizationError::ModelNotInitialized)));
        assert_eq!(engine.state(), EngineState::Uninitialized);
    }

    #[test]
    fn test_initialize_with_missing_models_fails() {
        let mut engine = DiarizationEngine::new();
        let result = engine.initialize(
            Path::new("/nonexistent/segmentation.onnx"),
            Path::new("/nonexistent/embedding.onnx"),
        );
        assert!(matches!(result, Err(DiarizationError::ModelNotFound(_))));
        assert_eq!(engine.state(), EngineState::Failed);
    }

    #[test]
    fn test_empty_audio_yields_empty_result() {
        let mut engine =
            DiarizationEngine::with_models(Box::new(NoChanges), Box::new(ConstantEmbedder));
        let segments = engine.process_audio(&[], &DiarizeOptions::default()).unwrap();
        assert!(segments.is_empty());
        assert_eq!(engine.state(), EngineState::Done);
    }

    #[test]
    fn test_no_change_points_yields_single_labeled_segment() {
        let mut engine =
            DiarizationEngine::with_models(Box::new(NoChanges), Box::new(ConstantEmbedder));
        let audio = vec![0.1f32; 16000 * 4];
        let segments = engine.process_audio(&audio, &DiarizeOptions::default()).unwrap();

        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].speaker_id, Some(0));
        assert_eq!(segments[0].confidence, Some(1.0));
    }

    #[test]
    fn test_detection_failure_is_logged_not_thrown() {
        let mut engine =
            DiarizationEngine::with_models(Box::new(BrokenSegmenter), Box::new(ConstantEmbedder));
        let audio = vec![0.1f32; 16000 * 10];
        let segments = engine.process_audio(&audio, &DiarizeOptions::default()).unwrap();

        assert!(segments.is_empty());
        assert_eq!(engine.state(), EngineState::Failed);
    }

    #[test]
    fn test_embedder_failure_falls_back_to_default_speaker() {
        let mut engine =
            DiarizationEngine::with_models(Box::new(NoChanges), Box::new(BrokenEmbedder));
        let audio = vec![0.1f32; 16000 * 4];
        let segments = engine.process_audio(&audio, &DiarizeOptions::default()).unwrap();

        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].speaker_id, Some(0));
        assert_eq!(segments[0].confidence, Some(0.5));
        assert_eq!(engine.state(), EngineState::Done);
    }

    #[test]
    fn test_progress_reaches_one_hundred_percent() {
        let mut engine =
            DiarizationEngine::with_models(Box::new(NoChanges), Box::new(ConstantEmbedder));
        let audio = vec![0.1f32; 16000 * 4];

        let mut reported = Vec::new();
        engine
            .process_audio_with_progress(&audio, &DiarizeOptions::default(), |pct| {
                reported.push(pct)
            })
            .unwrap();

        assert!(!reported.is_empty());
        assert!((reported.last().unwrap() - 100.0).abs() < 1e-3);
        assert!(reported.windows(2).all(|w| w[1] >= w[0]));
    }
}
