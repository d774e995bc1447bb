//! Audio file loading.
//!
//! Decodes a WAV file into mono f32 samples. Resampling is out of scope;
//! the caller checks the file's rate against the configured one.

use anyhow::{Context, Result};
use std::path::Path;

/// A fully loaded mono audio buffer
pub struct LoadedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl LoadedAudio {
    pub fn duration_seconds(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

/// Load a WAV file and mix it down to mono.
pub fn load_wav(path: &Path) -> Result<LoadedAudio> {
    let reader = hound::WavReader::open(path)
        .with_context(|| format!("Failed to open audio file {:?}", path))?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<_, _>>()
            .context("Failed to decode float samples")?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()
                .context("Failed to decode integer samples")?
        }
    };

    Ok(LoadedAudio {
        samples: mix_to_mono(&interleaved, spec.channels as usize),
        sample_rate: spec.sample_rate,
    })
}

fn mix_to_mono(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}
