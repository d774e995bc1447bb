//! Audio segments and the change-point-to-segment builder.

/// A contiguous slice of the input audio attributed to one speaker.
///
/// `speaker_id` and `confidence` stay `None` until the clustering stage
/// fills them in.
#[derive(Debug, Clone)]
pub struct AudioSegment {
    /// Start time in seconds
    pub start_time: f32,
    /// End time in seconds (exclusive)
    pub end_time: f32,
    /// Copy of the sample range belonging to this segment
    pub samples: Vec<f32>,
    pub speaker_id: Option<i32>,
    pub confidence: Option<f32>,
}

impl AudioSegment {
    fn from_range(audio: &[f32], start_time: f32, end_time: f32, sample_rate: u32) -> Self {
        let start = sample_index(start_time, sample_rate, audio.len());
        let end = sample_index(end_time, sample_rate, audio.len());
        Self {
            start_time,
            end_time,
            samples: audio[start..end].to_vec(),
            speaker_id: None,
            confidence: None,
        }
    }

    pub fn duration(&self) -> f32 {
        self.end_time - self.start_time
    }
}

fn sample_index(time: f32, sample_rate: u32, len: usize) -> usize {
    ((time * sample_rate as f32) as usize).min(len)
}

/// Cut the buffer into non-overlapping segments at the change points.
///
/// Candidates shorter than `min_duration` are merged into their predecessor
/// instead of being emitted (a short first candidate folds into the segment
/// that follows it). The trailing segment is always emitted, even below the
/// floor, so the output tiles `[0, duration)` exactly. Empty audio yields an
/// empty sequence; no change points yield a single full-buffer segment.
pub fn build_segments(
    audio: &[f32],
    change_points: &[f32],
    sample_rate: u32,
    min_duration: f32,
) -> Vec<AudioSegment> {
    if audio.is_empty() {
        return Vec::new();
    }

    let total_duration = audio.len() as f32 / sample_rate as f32;
    let mut segments: Vec<AudioSegment> = Vec::new();
    let mut start = 0.0f32;

    for &change in change_points {
        if change <= start {
            continue;
        }
        if change >= total_duration {
            break;
        }

        if change - start < min_duration {
            if let Some(prev) = segments.last_mut() {
                // Too short to stand alone: extend the predecessor over it
                *prev = AudioSegment::from_range(audio, prev.start_time, change, sample_rate);
                start = change;
            }
            // No predecessor: drop the boundary so the span folds into the
            // next segment
        } else {
            segments.push(AudioSegment::from_range(audio, start, change, sample_rate));
            start = change;
        }
    }

    // Trailing segment keeps full coverage even when shorter than the floor
    if start < total_duration {
        segments.push(AudioSegment::from_range(
            audio,
            start,
            total_duration,
            sample_rate,
        ));
    }

    segments
}
