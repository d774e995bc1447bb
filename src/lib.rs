//! Offline speaker diarization: change-point detection, segment building and
//! online speaker clustering over a loaded audio buffer, driven by two ONNX
//! models consumed through narrow inference traits.

pub mod audio;
pub mod config;
pub mod diarization;
pub mod output;
