//! JSON result document.
//!
//! The report goes to stdout (or a file with `--output`); all diagnostics go
//! to stderr so the payload stays machine-readable.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;

use crate::diarization::AudioSegment;

/// One diarized segment as it appears in the JSON output
#[derive(Debug, Clone, Serialize)]
pub struct SegmentRecord {
    pub start_time: f32,
    pub end_time: f32,
    pub speaker_id: i32,
    pub confidence: f32,
}

impl From<&AudioSegment> for SegmentRecord {
    fn from(segment: &AudioSegment) -> Self {
        Self {
            start_time: segment.start_time,
            end_time: segment.end_time,
            speaker_id: segment.speaker_id.unwrap_or(0),
            confidence: segment.confidence.unwrap_or(0.0),
        }
    }
}

/// The complete result document for one run
#[derive(Debug, Clone, Serialize)]
pub struct DiarizationReport {
    pub audio: String,
    pub sample_rate: u32,
    pub duration_seconds: f32,
    pub created_at: DateTime<Utc>,
    pub num_speakers: usize,
    pub segments: Vec<SegmentRecord>,
}

impl DiarizationReport {
    pub fn new(
        audio: &Path,
        sample_rate: u32,
        duration_seconds: f32,
        segments: &[AudioSegment],
    ) -> Self {
        let records: Vec<SegmentRecord> = segments.iter().map(SegmentRecord::from).collect();

        let mut speaker_ids: Vec<i32> = records.iter().map(|r| r.speaker_id).collect();
        speaker_ids.sort_unstable();
        speaker_ids.dedup();

        Self {
            audio: audio.display().to_string(),
            sample_rate,
            duration_seconds,
            created_at: Utc::now(),
            num_speakers: speaker_ids.len(),
            segments: records,
        }
    }

    /// Write the report to the given file, or to stdout when none is given.
    pub fn write(&self, output: Option<&Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize result")?;
        match output {
            Some(path) => std::fs::write(path, json)
                .with_context(|| format!("Failed to write output file {:?}", path))?,
            None => println!("{}", json),
        }
        Ok(())
    }
}
