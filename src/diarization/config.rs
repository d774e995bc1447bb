//! Configuration for a diarization run.

/// Options for a single diarization run. Immutable once processing starts.
#[derive(Debug, Clone)]
pub struct DiarizeOptions {
    /// Cosine similarity cutoff for assigning a segment to an existing
    /// speaker (0.0-1.0). Higher values create speakers more eagerly.
    pub threshold: f32,

    /// Hard cap on the number of distinct speaker identities
    pub max_speakers: usize,

    /// Sample rate of the input audio in Hz
    pub sample_rate: u32,

    /// Minimum segment duration in seconds; shorter candidates are merged
    /// into their predecessor
    pub min_segment_duration: f32,

    /// Enable diagnostic logging
    pub verbose: bool,
}

impl Default for DiarizeOptions {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            max_speakers: 10,
            sample_rate: 16000,
            min_segment_duration: 0.5,
            verbose: false,
        }
    }
}
