//! End-to-end pipeline tests against stub models.
//!
//! The stubs stand in for the ONNX networks through the model traits, so
//! these tests exercise detection, segment building and clustering together
//! without any model files.

use super::config::DiarizeOptions;
use super::embedding::EmbeddingModel;
use super::engine::DiarizationEngine;
use super::segment::AudioSegment;
use super::segmentation::SegmentationModel;
use super::DiarizationError;

const RATE: u32 = 16000;
const FRAMES_PER_WINDOW: usize = 32;

/// Fires on frames where the mean sample sign flips against the previous
/// frame, mimicking a segmentation network that scores speaker turns.
struct SignFlipSegmenter;

impl SegmentationModel for SignFlipSegmenter {
    fn infer(&mut self, window: &[f32]) -> Result<Vec<f32>, DiarizationError> {
        let frame_len = window.len() / FRAMES_PER_WINDOW;
        let means: Vec<f32> = window
            .chunks(frame_len)
            .take(FRAMES_PER_WINDOW)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect();

        let mut probabilities = vec![0.0; means.len()];
        for i in 1..means.len() {
            if means[i].signum() != means[i - 1].signum() {
                probabilities[i] = 1.0;
            }
        }
        Ok(probabilities)
    }
}

/// Maps positive-mean audio to one fixed voice print and negative-mean audio
/// to an orthogonal one.
struct SignEmbedder;

impl EmbeddingModel for SignEmbedder {
    fn infer(&mut self, samples: &[f32]) -> Result<Vec<f32>, DiarizationError> {
        let mean = samples.iter().sum::<f32>() / samples.len() as f32;
        if mean >= 0.0 {
            Ok(vec![1.0, 0.0])
        } else {
            Ok(vec![0.0, 1.0])
        }
    }
}

/// Peak in every window at a fixed frame, producing periodic change points.
struct PeriodicSegmenter;

impl SegmentationModel for PeriodicSegmenter {
    fn infer(&mut self, _window: &[f32]) -> Result<Vec<f32>, DiarizationError> {
        let mut probabilities = vec![0.0; FRAMES_PER_WINDOW];
        probabilities[8] = 0.9;
        Ok(probabilities)
    }
}

/// A different orthogonal embedding for every call.
struct RotatingEmbedder {
    calls: usize,
    dim: usize,
}

impl EmbeddingModel for RotatingEmbedder {
    fn infer(&mut self, _samples: &[f32]) -> Result<Vec<f32>, DiarizationError> {
        let mut embedding = vec![0.0; self.dim];
        embedding[self.calls % self.dim] = 1.0;
        self.calls += 1;
        Ok(embedding)
    }
}

/// 10 seconds: 5 s of +1.0 followed by 5 s of -1.0, one speaker turn at 5.0 s.
fn two_speaker_audio() -> Vec<f32> {
    let half = (RATE * 5) as usize;
    let mut audio = vec![1.0f32; half];
    audio.extend(vec![-1.0f32; half]);
    audio
}

fn run_two_speaker_pipeline() -> Vec<AudioSegment> {
    let mut engine =
        DiarizationEngine::with_models(Box::new(SignFlipSegmenter), Box::new(SignEmbedder));
    engine
        .process_audio(&two_speaker_audio(), &DiarizeOptions::default())
        .unwrap()
}

fn assert_full_coverage(segments: &[AudioSegment], duration: f32) {
    assert_eq!(segments.first().unwrap().start_time, 0.0);
    assert_eq!(segments.last().unwrap().end_time, duration);
    for pair in segments.windows(2) {
        assert_eq!(pair[0].end_time, pair[1].start_time);
    }
}

#[test]
fn test_two_speaker_scenario() {
    let segments = run_two_speaker_pipeline();

    assert_eq!(segments.len(), 2);
    assert_eq!(segments[0].start_time, 0.0);
    assert_eq!(segments[0].end_time, 5.0);
    assert_eq!(segments[1].start_time, 5.0);
    assert_eq!(segments[1].end_time, 10.0);

    // First-seen speakers, each created with full confidence
    assert_eq!(segments[0].speaker_id, Some(0));
    assert_eq!(segments[1].speaker_id, Some(1));
    assert_eq!(segments[0].confidence, Some(1.0));
    assert_eq!(segments[1].confidence, Some(1.0));
}

#[test]
fn test_two_speaker_scenario_covers_audio() {
    let segments = run_two_speaker_pipeline();
    assert_full_coverage(&segments, 10.0);

    let total_samples: usize = segments.iter().map(|s| s.samples.len()).sum();
    assert_eq!(total_samples, (RATE * 10) as usize);
}

#[test]
fn test_pipeline_is_deterministic() {
    let first = run_two_speaker_pipeline();
    let second = run_two_speaker_pipeline();

    assert_eq!(first.len(), second.len());
    for (a, b) in first.iter().zip(second.iter()) {
        assert_eq!(a.start_time, b.start_time);
        assert_eq!(a.end_time, b.end_time);
        assert_eq!(a.speaker_id, b.speaker_id);
        assert_eq!(a.confidence, b.confidence);
    }
}

#[test]
fn test_speaker_cap_holds_for_many_turns() {
    let mut engine = DiarizationEngine::with_models(
        Box::new(PeriodicSegmenter),
        Box::new(RotatingEmbedder { calls: 0, dim: 8 }),
    );
    let options = DiarizeOptions {
        max_speakers: 2,
        ..Default::default()
    };

    let audio = vec![0.5f32; (RATE * 30) as usize];
    let segments = engine.process_audio(&audio, &options).unwrap();

    assert!(segments.len() > 2);
    assert_full_coverage(&segments, 30.0);

    let mut speaker_ids: Vec<i32> = segments.iter().filter_map(|s| s.speaker_id).collect();
    speaker_ids.sort_unstable();
    speaker_ids.dedup();
    assert!(speaker_ids.len() <= 2, "speaker cap exceeded: {:?}", speaker_ids);
}

#[test]
fn test_all_confidences_within_unit_range() {
    let mut engine = DiarizationEngine::with_models(
        Box::new(PeriodicSegmenter),
        Box::new(RotatingEmbedder { calls: 0, dim: 8 }),
    );
    let options = DiarizeOptions {
        max_speakers: 3,
        ..Default::default()
    };

    let audio = vec![0.5f32; (RATE * 30) as usize];
    let segments = engine.process_audio(&audio, &options).unwrap();

    for segment in &segments {
        let confidence = segment.confidence.unwrap();
        assert!(
            (0.0..=1.0).contains(&confidence),
            "confidence {} out of range",
            confidence
        );
    }
}

#[test]
fn test_forced_merge_with_single_speaker_cap() {
    let mut engine = DiarizationEngine::with_models(
        Box::new(SignFlipSegmenter),
        Box::new(SignEmbedder),
    );
    let options = DiarizeOptions {
        max_speakers: 1,
        ..Default::default()
    };

    let segments = engine.process_audio(&two_speaker_audio(), &options).unwrap();

    assert_eq!(segments.len(), 2);
    for segment in &segments {
        assert_eq!(segment.speaker_id, Some(0));
    }
}
