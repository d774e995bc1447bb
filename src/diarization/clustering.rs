//! Online speaker clustering.
//!
//! Segments are assigned to speakers one at a time, in temporal order, by
//! cosine similarity against running-mean centroids. The pass is greedy and
//! non-revisable: earlier assignments are never reconsidered.

use super::cosine_similarity;

/// One speaker identity: the running mean of all embeddings assigned to it.
#[derive(Debug, Clone)]
struct SpeakerCentroid {
    centroid: Vec<f32>,
    count: u32,
}

impl SpeakerCentroid {
    fn new(embedding: Vec<f32>) -> Self {
        Self {
            centroid: embedding,
            count: 1,
        }
    }

    /// Fold a new embedding into the running mean with weight 1/(count+1).
    fn update(&mut self, embedding: &[f32]) {
        let weight = 1.0 / (self.count + 1) as f32;
        for (c, e) in self.centroid.iter_mut().zip(embedding.iter()) {
            *c += (e - *c) * weight;
        }
        self.count += 1;
    }

    fn similarity(&self, embedding: &[f32]) -> f32 {
        cosine_similarity(&self.centroid, embedding)
    }
}

/// Speaker identities discovered during one run, keyed by id in creation
/// order starting at 0. Append/update only; discarded with the run.
#[derive(Debug, Default)]
pub struct SpeakerRegistry {
    speakers: Vec<SpeakerCentroid>,
}

impl SpeakerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.speakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.speakers.is_empty()
    }

    /// Number of embeddings folded into the given speaker so far
    pub fn assignment_count(&self, speaker_id: i32) -> Option<u32> {
        self.speakers.get(speaker_id as usize).map(|s| s.count)
    }

    fn add(&mut self, embedding: Vec<f32>) -> i32 {
        self.speakers.push(SpeakerCentroid::new(embedding));
        (self.speakers.len() - 1) as i32
    }

    fn best_match(&self, embedding: &[f32]) -> Option<(i32, f32)> {
        self.speakers
            .iter()
            .enumerate()
            .map(|(id, speaker)| (id as i32, speaker.similarity(embedding)))
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
    }

    fn update(&mut self, speaker_id: i32, embedding: &[f32]) {
        self.speakers[speaker_id as usize].update(embedding);
    }
}

/// Assigns embeddings to speakers, bounded by a maximum speaker count.
#[derive(Debug)]
pub struct SpeakerClusterer {
    registry: SpeakerRegistry,
    threshold: f32,
    max_speakers: usize,
}

impl SpeakerClusterer {
    pub fn new(threshold: f32, max_speakers: usize) -> Self {
        Self {
            registry: SpeakerRegistry::new(),
            threshold,
            // The first embedding always creates speaker 0
            max_speakers: max_speakers.max(1),
        }
    }

    /// Assign an embedding to a speaker and return `(speaker_id, confidence)`.
    ///
    /// - empty registry: create speaker 0, confidence 1.0
    /// - best similarity >= threshold: assign and update that centroid,
    ///   confidence = similarity
    /// - room left under the cap: create a new speaker, confidence 1.0
    /// - otherwise forced merge: assign to the best match anyway; the low
    ///   similarity becomes the confidence, flagging an uncertain label
    pub fn assign(&mut self, embedding: &[f32]) -> (i32, f32) {
        match self.registry.best_match(embedding) {
            None => (self.create(embedding), 1.0),
            Some((speaker_id, similarity)) if similarity >= self.threshold => {
                self.registry.update(speaker_id, embedding);
                (speaker_id, similarity.clamp(0.0, 1.0))
            }
            Some(_) if self.registry.len() < self.max_speakers => (self.create(embedding), 1.0),
            Some((speaker_id, similarity)) => {
                tracing::debug!(
                    "speaker cap {} reached; merging into speaker {} (similarity {:.3})",
                    self.max_speakers,
                    speaker_id,
                    similarity
                );
                self.registry.update(speaker_id, embedding);
                (speaker_id, similarity.clamp(0.0, 1.0))
            }
        }
    }

    fn create(&mut self, embedding: &[f32]) -> i32 {
        let speaker_id = self.registry.add(embedding.to_vec());
        tracing::debug!(
            "created speaker {} (total: {})",
            speaker_id,
            self.registry.len()
        );
        speaker_id
    }

    pub fn speaker_count(&self) -> usize {
        self.registry.len()
    }

    pub fn registry(&self) -> &SpeakerRegistry {
        &self.registry
    }
}
