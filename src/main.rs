use anyhow::{bail, Context, Result};
use clap::Parser;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::info;

use diarize_cli::audio::load_wav;
use diarize_cli::config::Config;
use diarize_cli::diarization::{AudioSegment, DiarizationEngine, DiarizeOptions};
use diarize_cli::output::DiarizationReport;

/// Headless CLI for offline speaker diarization using ONNX models
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the input audio file (WAV)
    #[arg(short, long)]
    audio: PathBuf,

    /// Path to the segmentation model (.onnx)
    #[arg(long)]
    segment_model: Option<PathBuf>,

    /// Path to the speaker embedding model (.onnx)
    #[arg(long)]
    embedding_model: Option<PathBuf>,

    /// Maximum number of distinct speakers
    #[arg(long, default_value = "10")]
    max_speakers: usize,

    /// Similarity cutoff for same-speaker assignment (0.0 - 1.0)
    #[arg(long, default_value = "0.5")]
    threshold: f32,

    /// Expected audio sample rate in Hz
    #[arg(long, default_value = "16000")]
    sample_rate: u32,

    /// Write the JSON result to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Enable verbose logging and progress output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Diagnostics go to stderr; stdout carries the JSON result only
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let (segment_model, embedding_model) = resolve_model_paths(&args)?;

    // Validate everything up front; no partial processing on bad input
    if !args.audio.exists() {
        bail!("Audio file not found: {:?}", args.audio);
    }
    if !segment_model.exists() {
        bail!(
            "Segmentation model not found: {:?}\n\
             Pass --segment-model /path/to/model.onnx or place the model at the default location.",
            segment_model
        );
    }
    if !embedding_model.exists() {
        bail!(
            "Embedding model not found: {:?}\n\
             Pass --embedding-model /path/to/model.onnx or place the model at the default location.",
            embedding_model
        );
    }

    info!("Audio file: {:?}", args.audio);
    info!("Segmentation model: {:?}", segment_model);
    info!("Embedding model: {:?}", embedding_model);
    info!("Max speakers: {}", args.max_speakers);
    info!("Threshold: {}", args.threshold);

    let mut engine = DiarizationEngine::new();
    engine
        .initialize(&segment_model, &embedding_model)
        .context("Failed to initialize diarization engine")?;

    let loaded = load_wav(&args.audio)?;
    if loaded.samples.is_empty() {
        bail!("Audio file is empty: {:?}", args.audio);
    }
    if loaded.sample_rate != args.sample_rate {
        bail!(
            "Audio sample rate is {} Hz but {} Hz was expected; \
             resample the file or pass --sample-rate {}",
            loaded.sample_rate,
            args.sample_rate,
            loaded.sample_rate
        );
    }
    info!(
        "Audio loaded: {} samples ({:.1} s)",
        loaded.samples.len(),
        loaded.duration_seconds()
    );

    let options = DiarizeOptions {
        threshold: args.threshold,
        max_speakers: args.max_speakers,
        sample_rate: args.sample_rate,
        verbose: args.verbose,
        ..Default::default()
    };

    let verbose = options.verbose;
    let segments = engine.process_audio_with_progress(&loaded.samples, &options, |pct| {
        if verbose {
            eprint!("\rSpeaker assignment progress: {:.1}%", pct);
        }
    })?;
    if verbose {
        eprintln!();
    }

    if segments.is_empty() {
        bail!("No segments generated");
    }

    if verbose {
        print_speaker_summary(&segments);
    }

    let report = DiarizationReport::new(
        &args.audio,
        args.sample_rate,
        loaded.duration_seconds(),
        &segments,
    );
    report.write(args.output.as_deref())?;

    info!(
        "Diarization complete: {} segments, {} speakers",
        report.segments.len(),
        report.num_speakers
    );
    Ok(())
}

/// CLI flags win; otherwise fall back to the config file / default models
/// directory.
fn resolve_model_paths(args: &Args) -> Result<(PathBuf, PathBuf)> {
    let config = Config::load(&Config::default_config_file()?)?;

    let segment_model = match &args.segment_model {
        Some(path) => path.clone(),
        None => config.segmentation_model()?,
    };
    let embedding_model = match &args.embedding_model {
        Some(path) => path.clone(),
        None => config.embedding_model()?,
    };
    Ok((segment_model, embedding_model))
}

fn print_speaker_summary(segments: &[AudioSegment]) {
    let mut counts: BTreeMap<i32, usize> = BTreeMap::new();
    for segment in segments {
        *counts.entry(segment.speaker_id.unwrap_or(0)).or_default() += 1;
    }

    eprintln!("Detected {} speakers:", counts.len());
    for (speaker_id, count) in counts {
        eprintln!("  Speaker {}: {} segments", speaker_id, count);
    }
}
