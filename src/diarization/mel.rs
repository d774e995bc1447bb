//! Log-mel spectrogram frontend for the speaker embedding model.
//!
//! Converts a raw waveform into the 80-band log mel features the embedding
//! network expects, frames of 25 ms with a 10 ms hop at 16 kHz.

use realfft::{num_complex::Complex, RealFftPlanner, RealToComplex};
use std::f32::consts::PI;
use std::sync::Arc;

use super::DiarizationError;

/// Mel spectrogram parameters
#[derive(Debug, Clone)]
pub struct MelConfig {
    pub sample_rate: u32,
    pub n_fft: usize,
    /// Hop between frames, in samples
    pub hop_length: usize,
    /// Analysis window length, in samples
    pub win_length: usize,
    pub n_mels: usize,
    /// Filterbank frequency range in Hz
    pub fmin: f32,
    pub fmax: f32,
    /// Added before the log for numerical stability
    pub log_offset: f32,
}

impl Default for MelConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            n_fft: 512,
            hop_length: 160, // 10ms at 16kHz
            win_length: 400, // 25ms at 16kHz
            n_mels: 80,
            fmin: 20.0,
            fmax: 7600.0,
            log_offset: 1e-6,
        }
    }
}

/// Mel spectrogram generator with a pre-computed filterbank and FFT plan
pub struct MelSpectrogram {
    config: MelConfig,
    fft: Arc<dyn RealToComplex<f32>>,
    filterbank: Vec<Vec<f32>>,
    window: Vec<f32>,
    fft_input: Vec<f32>,
    fft_output: Vec<Complex<f32>>,
}

impl MelSpectrogram {
    pub fn new(config: MelConfig) -> Self {
        let window = hann_window(config.win_length);
        let filterbank = mel_filterbank(
            config.n_mels,
            config.n_fft / 2 + 1,
            config.sample_rate as f32,
            config.fmin,
            config.fmax,
        );

        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(config.n_fft);
        let fft_input = vec![0.0f32; config.n_fft];
        let fft_output = vec![Complex::new(0.0, 0.0); config.n_fft / 2 + 1];

        Self {
            config,
            fft,
            filterbank,
            window,
            fft_input,
            fft_output,
        }
    }

    /// Compute the log-mel spectrogram as `[frames][n_mels]`.
    pub fn compute(&mut self, audio: &[f32]) -> Result<Vec<Vec<f32>>, DiarizationError> {
        if audio.is_empty() {
            return Err(DiarizationError::InvalidAudio("empty audio".to_string()));
        }

        let n_frames = if audio.len() >= self.config.win_length {
            1 + (audio.len() - self.config.win_length) / self.config.hop_length
        } else {
            1
        };

        let mut frames = Vec::with_capacity(n_frames);
        for frame_idx in 0..n_frames {
            let start = frame_idx * self.config.hop_length;
            let end = (start + self.config.win_length).min(audio.len());

            self.fft_input.fill(0.0);
            for (dst, (&sample, &w)) in self
                .fft_input
                .iter_mut()
                .zip(audio[start..end].iter().zip(self.window.iter()))
            {
                *dst = sample * w;
            }

            self.fft
                .process(&mut self.fft_input, &mut self.fft_output)
                .map_err(|e| DiarizationError::MelError(format!("FFT failed: {}", e)))?;

            let power: Vec<f32> = self
                .fft_output
                .iter()
                .map(|c| c.re * c.re + c.im * c.im)
                .collect();

            let mel_frame: Vec<f32> = self
                .filterbank
                .iter()
                .map(|filter| {
                    let energy: f32 = filter.iter().zip(power.iter()).map(|(f, p)| f * p).sum();
                    (energy + self.config.log_offset).ln()
                })
                .collect();

            frames.push(mel_frame);
        }

        Ok(frames)
    }

    pub fn n_mels(&self) -> usize {
        self.config.n_mels
    }
}

fn hann_window(len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / (len - 1) as f32).cos()))
        .collect()
}

fn hz_to_mel(hz: f32) -> f32 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f32) -> f32 {
    700.0 * (10.0_f32.powf(mel / 2595.0) - 1.0)
}

/// Triangular mel filterbank; each filter is a weight vector over FFT bins.
fn mel_filterbank(
    n_mels: usize,
    n_fft_bins: usize,
    sample_rate: f32,
    fmin: f32,
    fmax: f32,
) -> Vec<Vec<f32>> {
    let mel_min = hz_to_mel(fmin);
    let mel_max = hz_to_mel(fmax);

    // n_mels + 2 edge points, equally spaced on the mel scale
    let bin_points: Vec<f32> = (0..=n_mels + 1)
        .map(|i| mel_min + (mel_max - mel_min) * (i as f32) / ((n_mels + 1) as f32))
        .map(mel_to_hz)
        .map(|hz| (n_fft_bins as f32 - 1.0) * hz / (sample_rate / 2.0))
        .collect();

    (0..n_mels)
        .map(|i| {
            let (left, center, right) = (bin_points[i], bin_points[i + 1], bin_points[i + 2]);
            (0..n_fft_bins)
                .map(|bin| {
                    let bin = bin as f32;
                    if bin >= left && bin < center {
                        (bin - left) / (center - left)
                    } else if bin >= center && bin <= right {
                        (right - bin) / (right - center)
                    } else {
                        0.0
                    }
                })
                .collect()
        })
        .collect()
}
